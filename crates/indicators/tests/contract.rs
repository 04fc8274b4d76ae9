//! Behaviour every indicator must share: previews leave no trace, the formed
//! flag flips exactly once at the advertised warm-up, and reset replays.

use barflow_indicators::accumulation::{Nvi, Obv, Pvi, WilliamsAd, Wvad};
use barflow_indicators::atr::{Atr, TrueRange};
use barflow_indicators::bollinger::BollingerBands;
use barflow_indicators::composite::Composite;
use barflow_indicators::directional::{Adx, DiMinus, DiPlus, DirectionalIndex};
use barflow_indicators::donchian::DonchianChannel;
use barflow_indicators::ema::Ema;
use barflow_indicators::extrema::{Highest, Lowest};
use barflow_indicators::high_low_index::HighLowIndex;
use barflow_indicators::history::WithHistory;
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
use barflow_indicators::{Bar, Indicator, IndicatorValue, InputValue, ValueKind};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn time(index: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap() + Duration::minutes(index)
}

/// A wandering series with inside bars, gaps and volume swings.
fn bars(count: i64) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let close = Decimal::from(100 + (i * 37) % 17 - 8 + i / 4);
            let high = close + Decimal::from((i * 7) % 5 + 1);
            let low = close - Decimal::from((i * 11) % 4 + 1);
            let open = low + Decimal::from((i * 3) % 3);
            let volume = Decimal::from(1000 + (i * 53) % 400);
            Bar::new(time(i), open, high, low, close, volume)
        })
        .collect()
}

/// Partial versions of `bar` walking from its open toward its close.
fn previews(bar: &Bar) -> Vec<InputValue> {
    [dec!(0.25), dec!(0.75)]
        .iter()
        .map(|fraction| {
            let price = bar.open + (bar.close - bar.open) * fraction;
            let partial = Bar::new(
                bar.timestamp,
                bar.open,
                bar.open.max(price),
                bar.open.min(price),
                price,
                bar.volume * fraction,
            );
            InputValue::bar(partial, false)
        })
        .collect()
}

fn catalogue() -> Vec<Box<dyn Indicator>> {
    let deviation = Deviation::Percent(dec!(3));
    vec![
        Box::new(Sma::new(3).unwrap()),
        Box::new(Ema::new(3).unwrap()),
        Box::new(WilderMa::new(3).unwrap()),
        Box::new(Median::new(3).unwrap()),
        Box::new(Highest::new(3).unwrap()),
        Box::new(Lowest::new(3).unwrap()),
        Box::new(ZigZag::new(deviation).unwrap()),
        Box::new(Peak::new(deviation).unwrap()),
        Box::new(Trough::new(deviation).unwrap()),
        Box::new(TrueRange::new()),
        Box::new(Atr::new(3).unwrap()),
        Box::new(DiPlus::new(3).unwrap()),
        Box::new(DiMinus::new(3).unwrap()),
        Box::new(DirectionalIndex::new(3).unwrap()),
        Box::new(Adx::new(3).unwrap()),
        Box::new(StdDev::new(3).unwrap()),
        Box::new(BollingerBands::new(3, dec!(2)).unwrap()),
        Box::new(KeltnerChannel::new(3, dec!(1.5)).unwrap()),
        Box::new(DonchianChannel::new(3).unwrap()),
        Box::new(HighLowIndex::new(3).unwrap()),
        Box::new(Stochastic::new(3, 2).unwrap()),
        Box::new(Rsi::new(3).unwrap()),
        Box::new(Macd::new(2, 4).unwrap()),
        Box::new(MacdSignal::new(3, 5, 3).unwrap()),
        Box::new(MacdHistogram::new(3, 5, 3).unwrap()),
        Box::new(Oma::new(2, 5).unwrap()),
        Box::new(MaRibbon::new(2, 6, 3).unwrap()),
        Box::new(Obv::new()),
        Box::new(Nvi::new()),
        Box::new(Pvi::new()),
        Box::new(WilliamsAd::new()),
        Box::new(Wvad::new()),
        Box::new(Vwap::new()),
        Box::new(
            Composite::sequence(vec![
                Box::new(Sma::new(3).unwrap()),
                Box::new(Ema::new(2).unwrap()),
            ])
            .unwrap(),
        ),
        Box::new(WithHistory::new(Rsi::new(3).unwrap())),
    ]
}

#[test]
fn previews_are_idempotent_and_leave_state_untouched() {
    let series = bars(30);
    for mut indicator in catalogue() {
        for (i, bar) in series.iter().enumerate() {
            for preview in previews(bar) {
                let before = format!("{indicator:?}");
                let first = indicator.process(&preview);
                let second = indicator.process(&preview);
                assert_eq!(first, second, "{} preview at bar {i}", indicator.name());
                assert_eq!(
                    before,
                    format!("{indicator:?}"),
                    "{} state moved on preview at bar {i}",
                    indicator.name()
                );
            }
            indicator.process(&InputValue::bar(*bar, true));
        }
    }
}

#[test]
fn formed_flips_exactly_at_warm_up() {
    let series = bars(30);
    for mut indicator in catalogue() {
        let needed = indicator.num_values_to_initialize();
        assert!(needed >= 1, "{}", indicator.name());
        assert!(needed <= series.len(), "{}", indicator.name());
        for (i, bar) in series.iter().enumerate() {
            for preview in previews(bar) {
                indicator.process(&preview);
                assert_eq!(
                    indicator.is_formed(),
                    i >= needed,
                    "{} after preview at bar {i}",
                    indicator.name()
                );
            }
            let out = indicator.process(&InputValue::bar(*bar, true));
            assert_eq!(
                indicator.is_formed(),
                i + 1 >= needed,
                "{} after final bar {i} (needs {needed})",
                indicator.name()
            );
            assert_eq!(out.is_formed, indicator.is_formed(), "{}", indicator.name());
        }
    }
}

#[test]
fn reset_replays_identically() {
    let series = bars(25);
    let run = |indicator: &mut Box<dyn Indicator>| -> Vec<IndicatorValue> {
        series
            .iter()
            .map(|bar| {
                for preview in previews(bar) {
                    indicator.process(&preview);
                }
                indicator.process(&InputValue::bar(*bar, true))
            })
            .collect()
    };
    for mut indicator in catalogue() {
        let first = run(&mut indicator);
        indicator.reset();
        assert!(!indicator.is_formed(), "{}", indicator.name());
        let second = run(&mut indicator);
        assert_eq!(first, second, "{}", indicator.name());
    }
}

#[test]
fn empty_input_yields_empty_output() {
    let series = bars(10);
    for mut indicator in catalogue() {
        for bar in &series[..5] {
            indicator.process(&InputValue::bar(*bar, true));
        }
        let before = format!("{indicator:?}");
        let out = indicator.process(&InputValue::empty(time(5), true));
        assert!(out.is_empty(), "{}", indicator.name());
        assert_eq!(out.indicator, indicator.id());
        assert_eq!(before, format!("{indicator:?}"), "{}", indicator.name());
    }
}

#[test]
fn outputs_serialize_for_downstream_consumers() {
    let mut histogram = MacdHistogram::new(3, 5, 3).unwrap();
    let mut last = None;
    for bar in bars(12) {
        last = Some(histogram.process(&InputValue::bar(bar, true)));
    }
    let last = last.unwrap();
    let json = serde_json::to_string(&last).unwrap();
    let decoded: IndicatorValue = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, last);
    assert!(histogram.output(&decoded).is_some());
}

#[test]
fn instances_run_on_separate_threads() {
    let handles: Vec<_> = catalogue()
        .into_iter()
        .map(|mut indicator| {
            std::thread::spawn(move || {
                for bar in bars(30) {
                    indicator.process(&InputValue::bar(bar, true));
                }
                indicator.is_formed()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
}

#[test]
fn only_single_line_indicators_claim_to_chain() {
    for mut indicator in catalogue() {
        let mut last = None;
        for bar in bars(30) {
            last = Some(indicator.process(&InputValue::bar(bar, true)));
        }
        let last = last.unwrap();
        let multi_line = matches!(last.kind, ValueKind::Composite(_));
        assert_eq!(indicator.emits_scalar(), !multi_line, "{}", indicator.name());
    }
}
