use anyhow::{Context, Result};
use barflow_indicators::accumulation::{Nvi, Obv, Pvi, WilliamsAd, Wvad};
use barflow_indicators::atr::{Atr, TrueRange};
use barflow_indicators::bollinger::BollingerBands;
use barflow_indicators::composite::{Composite, CompositeMode};
use barflow_indicators::directional::{Adx, DiMinus, DiPlus, DirectionalIndex};
use barflow_indicators::donchian::DonchianChannel;
use barflow_indicators::ema::Ema;
use barflow_indicators::extrema::{Highest, Lowest};
use barflow_indicators::high_low_index::HighLowIndex;
use barflow_indicators::history::DEFAULT_HISTORY_CAPACITY;
use barflow_indicators::keltner::KeltnerChannel;
use barflow_indicators::macd::{Macd, MacdHistogram, MacdSignal};
use barflow_indicators::median::Median;
use barflow_indicators::oscillator::Oma;
use barflow_indicators::ribbon::MaRibbon;
use barflow_indicators::rsi::Rsi;
use barflow_indicators::sma::Sma;
use barflow_indicators::std_dev::StdDev;
use barflow_indicators::stochastic::Stochastic;
use barflow_indicators::vwap::Vwap;
use barflow_indicators::wilder::WilderMa;
use barflow_indicators::zigzag::{Deviation, Peak, Trough, ZigZag};
use barflow_indicators::{Indicator, IndicatorError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;

/// Replay configuration loaded from TOML.
///
/// ```toml
/// history_capacity = 50
///
/// [[indicators]]
/// kind = "sma"
/// length = 20
///
/// [[indicators]]
/// kind = "bollinger"
/// label = "bb20"
/// length = 20
/// multiplier = "2"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    pub indicators: Vec<IndicatorEntry>,
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_multiplier() -> Decimal {
    dec!(2)
}

/// One configured indicator with an optional display label.
#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorEntry {
    pub label: Option<String>,
    #[serde(flatten)]
    pub kind: IndicatorConfig,
}

impl IndicatorEntry {
    /// Display label; falls back to the indicator kind.
    pub fn label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.kind.kind_name().to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorConfig {
    Sma { length: usize },
    Ema { length: usize },
    Wilder { length: usize },
    Median { length: usize },
    Highest { length: usize },
    Lowest { length: usize },
    ZigZag {
        #[serde(default)]
        deviation: Deviation,
    },
    Peak {
        #[serde(default)]
        deviation: Deviation,
    },
    Trough {
        #[serde(default)]
        deviation: Deviation,
    },
    TrueRange,
    Atr { length: usize },
    DiPlus { length: usize },
    DiMinus { length: usize },
    Dx { length: usize },
    Adx { length: usize },
    StdDev { length: usize },
    Bollinger {
        length: usize,
        #[serde(default = "default_multiplier")]
        multiplier: Decimal,
    },
    Keltner {
        length: usize,
        #[serde(default = "default_multiplier")]
        multiplier: Decimal,
    },
    Donchian { length: usize },
    HighLowIndex { length: usize },
    Stochastic { k_period: usize, d_period: usize },
    Rsi { length: usize },
    Macd { fast: usize, slow: usize },
    MacdSignal { fast: usize, slow: usize, signal: usize },
    MacdHistogram { fast: usize, slow: usize, signal: usize },
    Oma { short: usize, long: usize },
    Ribbon { short: usize, long: usize, count: usize },
    Obv,
    Nvi,
    Pvi,
    WilliamsAd,
    Wvad,
    Vwap,
    Composite {
        mode: CompositeMode,
        children: Vec<IndicatorConfig>,
    },
}

/// `(kind, parameters)` for every configurable indicator.
pub const KINDS: &[(&str, &str)] = &[
    ("sma", "length"),
    ("ema", "length"),
    ("wilder", "length"),
    ("median", "length"),
    ("highest", "length"),
    ("lowest", "length"),
    ("zig_zag", "deviation = { percent | absolute }"),
    ("peak", "deviation = { percent | absolute }"),
    ("trough", "deviation = { percent | absolute }"),
    ("true_range", "-"),
    ("atr", "length"),
    ("di_plus", "length"),
    ("di_minus", "length"),
    ("dx", "length"),
    ("adx", "length"),
    ("std_dev", "length"),
    ("bollinger", "length, multiplier"),
    ("keltner", "length, multiplier"),
    ("donchian", "length"),
    ("high_low_index", "length"),
    ("stochastic", "k_period, d_period"),
    ("rsi", "length"),
    ("macd", "fast, slow"),
    ("macd_signal", "fast, slow, signal"),
    ("macd_histogram", "fast, slow, signal"),
    ("oma", "short, long"),
    ("ribbon", "short, long, count"),
    ("obv", "-"),
    ("nvi", "-"),
    ("pvi", "-"),
    ("williams_ad", "-"),
    ("wvad", "-"),
    ("vwap", "-"),
    ("composite", "mode = parallel | sequence, children = [...]"),
];

impl IndicatorConfig {
    pub fn kind_name(&self) -> &'static str {
        match self {
            IndicatorConfig::Sma { .. } => "sma",
            IndicatorConfig::Ema { .. } => "ema",
            IndicatorConfig::Wilder { .. } => "wilder",
            IndicatorConfig::Median { .. } => "median",
            IndicatorConfig::Highest { .. } => "highest",
            IndicatorConfig::Lowest { .. } => "lowest",
            IndicatorConfig::ZigZag { .. } => "zig_zag",
            IndicatorConfig::Peak { .. } => "peak",
            IndicatorConfig::Trough { .. } => "trough",
            IndicatorConfig::TrueRange => "true_range",
            IndicatorConfig::Atr { .. } => "atr",
            IndicatorConfig::DiPlus { .. } => "di_plus",
            IndicatorConfig::DiMinus { .. } => "di_minus",
            IndicatorConfig::Dx { .. } => "dx",
            IndicatorConfig::Adx { .. } => "adx",
            IndicatorConfig::StdDev { .. } => "std_dev",
            IndicatorConfig::Bollinger { .. } => "bollinger",
            IndicatorConfig::Keltner { .. } => "keltner",
            IndicatorConfig::Donchian { .. } => "donchian",
            IndicatorConfig::HighLowIndex { .. } => "high_low_index",
            IndicatorConfig::Stochastic { .. } => "stochastic",
            IndicatorConfig::Rsi { .. } => "rsi",
            IndicatorConfig::Macd { .. } => "macd",
            IndicatorConfig::MacdSignal { .. } => "macd_signal",
            IndicatorConfig::MacdHistogram { .. } => "macd_histogram",
            IndicatorConfig::Oma { .. } => "oma",
            IndicatorConfig::Ribbon { .. } => "ribbon",
            IndicatorConfig::Obv => "obv",
            IndicatorConfig::Nvi => "nvi",
            IndicatorConfig::Pvi => "pvi",
            IndicatorConfig::WilliamsAd => "williams_ad",
            IndicatorConfig::Wvad => "wvad",
            IndicatorConfig::Vwap => "vwap",
            IndicatorConfig::Composite { .. } => "composite",
        }
    }

    /// Constructs the indicator, validating every parameter.
    pub fn build(&self) -> Result<Box<dyn Indicator>, IndicatorError> {
        let indicator: Box<dyn Indicator> = match self {
            IndicatorConfig::Sma { length } => Box::new(Sma::new(*length)?),
            IndicatorConfig::Ema { length } => Box::new(Ema::new(*length)?),
            IndicatorConfig::Wilder { length } => Box::new(WilderMa::new(*length)?),
            IndicatorConfig::Median { length } => Box::new(Median::new(*length)?),
            IndicatorConfig::Highest { length } => Box::new(Highest::new(*length)?),
            IndicatorConfig::Lowest { length } => Box::new(Lowest::new(*length)?),
            IndicatorConfig::ZigZag { deviation } => Box::new(ZigZag::new(*deviation)?),
            IndicatorConfig::Peak { deviation } => Box::new(Peak::new(*deviation)?),
            IndicatorConfig::Trough { deviation } => Box::new(Trough::new(*deviation)?),
            IndicatorConfig::TrueRange => Box::new(TrueRange::new()),
            IndicatorConfig::Atr { length } => Box::new(Atr::new(*length)?),
            IndicatorConfig::DiPlus { length } => Box::new(DiPlus::new(*length)?),
            IndicatorConfig::DiMinus { length } => Box::new(DiMinus::new(*length)?),
            IndicatorConfig::Dx { length } => Box::new(DirectionalIndex::new(*length)?),
            IndicatorConfig::Adx { length } => Box::new(Adx::new(*length)?),
            IndicatorConfig::StdDev { length } => Box::new(StdDev::new(*length)?),
            IndicatorConfig::Bollinger { length, multiplier } => {
                Box::new(BollingerBands::new(*length, *multiplier)?)
            }
            IndicatorConfig::Keltner { length, multiplier } => {
                Box::new(KeltnerChannel::new(*length, *multiplier)?)
            }
            IndicatorConfig::Donchian { length } => Box::new(DonchianChannel::new(*length)?),
            IndicatorConfig::HighLowIndex { length } => Box::new(HighLowIndex::new(*length)?),
            IndicatorConfig::Stochastic { k_period, d_period } => {
                Box::new(Stochastic::new(*k_period, *d_period)?)
            }
            IndicatorConfig::Rsi { length } => Box::new(Rsi::new(*length)?),
            IndicatorConfig::Macd { fast, slow } => Box::new(Macd::new(*fast, *slow)?),
            IndicatorConfig::MacdSignal { fast, slow, signal } => {
                Box::new(MacdSignal::new(*fast, *slow, *signal)?)
            }
            IndicatorConfig::MacdHistogram { fast, slow, signal } => {
                Box::new(MacdHistogram::new(*fast, *slow, *signal)?)
            }
            IndicatorConfig::Oma { short, long } => Box::new(Oma::new(*short, *long)?),
            IndicatorConfig::Ribbon { short, long, count } => {
                Box::new(MaRibbon::new(*short, *long, *count)?)
            }
            IndicatorConfig::Obv => Box::new(Obv::new()),
            IndicatorConfig::Nvi => Box::new(Nvi::new()),
            IndicatorConfig::Pvi => Box::new(Pvi::new()),
            IndicatorConfig::WilliamsAd => Box::new(WilliamsAd::new()),
            IndicatorConfig::Wvad => Box::new(Wvad::new()),
            IndicatorConfig::Vwap => Box::new(Vwap::new()),
            IndicatorConfig::Composite { mode, children } => {
                let children = children
                    .iter()
                    .map(IndicatorConfig::build)
                    .collect::<Result<Vec<_>, _>>()?;
                Box::new(Composite::new(*mode, children)?)
            }
        };
        Ok(indicator)
    }
}

impl ReplayConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: ReplayConfig = toml::from_str(text)?;
        if config.indicators.is_empty() {
            anyhow::bail!("config lists no indicators");
        }
        Ok(config)
    }
}
