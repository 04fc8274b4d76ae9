//! Running-total volume indicators.
//!
//! Each bar contributes an increment computed from the bar and the previous
//! committed bar. Previews return `total + increment` without committing.

use crate::{Indicator, IndicatorState};
use barflow_core::{Bar, IndicatorId, IndicatorValue, InputValue};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt;

/// The per-bar rule of a cumulative indicator.
pub trait AccumulationRule: fmt::Debug + Clone + Default + Send + Sync {
    const NAME: &'static str;

    /// Value of the running total before any bar.
    fn initial(&self) -> Decimal {
        Decimal::ZERO
    }

    /// Increment contributed by `current` given the committed `total`.
    fn increment(&self, total: Decimal, current: &Bar, previous: Option<&Bar>) -> Decimal;
}

/// A running total driven by an [`AccumulationRule`].
#[derive(Debug, Clone)]
pub struct Cumulative<R: AccumulationRule> {
    state: IndicatorState,
    rule: R,
    total: Decimal,
    previous: Option<Bar>,
}

impl<R: AccumulationRule> Cumulative<R> {
    pub fn new() -> Self {
        Self::with_rule(R::default())
    }

    pub fn with_rule(rule: R) -> Self {
        let total = rule.initial();
        Self {
            state: IndicatorState::new(R::NAME),
            rule,
            total,
            previous: None,
        }
    }

    /// Committed running total.
    pub fn value(&self) -> Decimal {
        self.total
    }

    pub fn rule(&self) -> &R {
        &self.rule
    }
}

impl<R: AccumulationRule> Default for Cumulative<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: AccumulationRule> Indicator for Cumulative<R> {
    fn id(&self) -> IndicatorId {
        self.state.id()
    }

    fn name(&self) -> &'static str {
        R::NAME
    }

    fn process(&mut self, input: &InputValue) -> IndicatorValue {
        let Some(bar) = input.as_bar() else {
            return self.state.empty(input);
        };
        let value = self.total + self.rule.increment(self.total, &bar, self.previous.as_ref());
        if input.is_final {
            self.total = value;
            self.previous = Some(bar);
        }
        self.state.scalar(input, value, true)
    }

    fn reset(&mut self) {
        self.total = self.rule.initial();
        self.previous = None;
        self.state.reset();
    }

    fn is_formed(&self) -> bool {
        self.state.is_formed()
    }

    fn num_values_to_initialize(&self) -> usize {
        1
    }
}

/// On-Balance Volume: adds volume on up closes, subtracts it on down closes.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnBalanceVolume;

impl AccumulationRule for OnBalanceVolume {
    const NAME: &'static str = "OBV";

    fn increment(&self, _total: Decimal, current: &Bar, previous: Option<&Bar>) -> Decimal {
        let Some(prev) = previous else {
            return Decimal::ZERO;
        };
        match current.close.cmp(&prev.close) {
            std::cmp::Ordering::Greater => current.volume,
            std::cmp::Ordering::Less => -current.volume,
            std::cmp::Ordering::Equal => Decimal::ZERO,
        }
    }
}

/// Which volume change a volume index reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeTrend {
    Falling,
    Rising,
}

/// Volume index: moves by the percentage close change only on bars whose
/// volume moved in the configured direction. Starts at 1000.
#[derive(Debug, Clone, Copy)]
pub struct VolumeIndex<const RISING: bool>;

impl<const RISING: bool> Default for VolumeIndex<RISING> {
    fn default() -> Self {
        Self
    }
}

impl<const RISING: bool> VolumeIndex<RISING> {
    pub const START: Decimal = dec!(1000);

    pub fn trend(&self) -> VolumeTrend {
        if RISING {
            VolumeTrend::Rising
        } else {
            VolumeTrend::Falling
        }
    }
}

impl<const RISING: bool> AccumulationRule for VolumeIndex<RISING> {
    const NAME: &'static str = if RISING { "PVI" } else { "NVI" };

    fn initial(&self) -> Decimal {
        Self::START
    }

    fn increment(&self, total: Decimal, current: &Bar, previous: Option<&Bar>) -> Decimal {
        let Some(prev) = previous else {
            return Decimal::ZERO;
        };
        let qualifies = if RISING {
            current.volume > prev.volume
        } else {
            current.volume < prev.volume
        };
        if !qualifies || prev.close.is_zero() {
            return Decimal::ZERO;
        }
        total * (current.close - prev.close) / prev.close
    }
}

/// Williams Accumulation/Distribution.
///
/// Up close: `close - min(low, prev close)`; down close: `close - max(high, prev close)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WilliamsAccumulation;

impl AccumulationRule for WilliamsAccumulation {
    const NAME: &'static str = "WAD";

    fn increment(&self, _total: Decimal, current: &Bar, previous: Option<&Bar>) -> Decimal {
        let Some(prev) = previous else {
            return Decimal::ZERO;
        };
        if current.close > prev.close {
            current.close - current.low.min(prev.close)
        } else if current.close < prev.close {
            current.close - current.high.max(prev.close)
        } else {
            Decimal::ZERO
        }
    }
}

/// Williams Variable Accumulation/Distribution: `(close - open) / (high - low) * volume`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WilliamsVariableAccumulation;

impl AccumulationRule for WilliamsVariableAccumulation {
    const NAME: &'static str = "WVAD";

    fn increment(&self, _total: Decimal, current: &Bar, _previous: Option<&Bar>) -> Decimal {
        let range = current.range();
        if range.is_zero() {
            Decimal::ZERO
        } else {
            (current.close - current.open) / range * current.volume
        }
    }
}

pub type Obv = Cumulative<OnBalanceVolume>;
pub type Nvi = Cumulative<VolumeIndex<false>>;
pub type Pvi = Cumulative<VolumeIndex<true>>;
pub type WilliamsAd = Cumulative<WilliamsAccumulation>;
pub type Wvad = Cumulative<WilliamsVariableAccumulation>;
