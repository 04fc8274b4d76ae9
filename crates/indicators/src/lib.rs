pub mod accumulation;
pub mod atr;
pub mod bollinger;
pub mod buffer;
pub mod composite;
pub mod directional;
pub mod donchian;
pub mod ema;
pub mod extrema;
pub mod high_low_index;
pub mod history;
pub mod keltner;
pub mod macd;
pub mod median;
pub mod oscillator;
pub mod ribbon;
pub mod rsi;
pub mod sma;
pub mod std_dev;
pub mod stochastic;
pub mod vwap;
pub mod wilder;
pub mod zigzag;

pub use barflow_core::{
    Bar, CompositeValue, IndicatorError, IndicatorId, IndicatorValue, InputData, InputValue,
    Result, Tick, ValueKind,
};

use rust_decimal::Decimal;
use std::fmt;
use tracing::{debug, trace};

/// A streaming indicator.
///
/// Inputs arrive one at a time. A final input commits state; a non-final input
/// (a preview of the bar still forming) returns what the output *would* be and
/// leaves the indicator exactly as it was, so any number of previews may be
/// interleaved between two finals.
pub trait Indicator: fmt::Debug + Send + Sync {
    fn id(&self) -> IndicatorId;

    /// Short display name, e.g. `"SMA"`.
    fn name(&self) -> &'static str;

    /// Processes one input. Empty inputs yield empty outputs and change nothing.
    fn process(&mut self, input: &InputValue) -> IndicatorValue;

    /// Clears all accumulated state; configuration is kept.
    fn reset(&mut self);

    /// Whether enough final inputs have been seen. Once set, only `reset` clears it.
    fn is_formed(&self) -> bool;

    /// Number of final inputs after which `is_formed` first becomes true.
    fn num_values_to_initialize(&self) -> usize;

    /// Whether each output is a single price that can feed a downstream stage.
    fn emits_scalar(&self) -> bool {
        true
    }
}

impl<I: Indicator + ?Sized> Indicator for Box<I> {
    fn id(&self) -> IndicatorId {
        (**self).id()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn process(&mut self, input: &InputValue) -> IndicatorValue {
        (**self).process(input)
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn is_formed(&self) -> bool {
        (**self).is_formed()
    }

    fn num_values_to_initialize(&self) -> usize {
        (**self).num_values_to_initialize()
    }

    fn emits_scalar(&self) -> bool {
        (**self).emits_scalar()
    }
}

/// Identity and formed latch shared by every indicator.
#[derive(Debug, Clone)]
pub struct IndicatorState {
    id: IndicatorId,
    name: &'static str,
    is_formed: bool,
}

impl IndicatorState {
    pub fn new(name: &'static str) -> Self {
        Self {
            id: IndicatorId::new(),
            name,
            is_formed: false,
        }
    }

    pub fn id(&self) -> IndicatorId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_formed(&self) -> bool {
        self.is_formed
    }

    pub fn reset(&mut self) {
        self.is_formed = false;
        debug!(indicator = self.name, id = %self.id, "reset");
    }

    /// Empty output for `input`; nothing is latched.
    pub fn empty(&self, input: &InputValue) -> IndicatorValue {
        IndicatorValue::empty(self.id, input, self.is_formed)
    }

    /// Builds the output for `input`, latching the formed flag when a final
    /// input completes the warm-up.
    pub fn complete(&mut self, input: &InputValue, kind: ValueKind, formed: bool) -> IndicatorValue {
        if input.is_final && formed && !self.is_formed {
            self.is_formed = true;
            trace!(indicator = self.name, id = %self.id, time = %input.time, "formed");
        }
        IndicatorValue::new(self.id, input.time, input.is_final, self.is_formed, kind)
    }

    pub fn scalar(&mut self, input: &InputValue, value: Decimal, formed: bool) -> IndicatorValue {
        self.complete(input, ValueKind::Scalar(value), formed)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::sma::Sma;
    use crate::testing::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_formed_latches_on_final_only() {
        let mut state = IndicatorState::new("test");
        let preview = state.scalar(&preview_price(0, dec!(1)), dec!(1), true);
        assert!(!preview.is_formed);
        assert!(!state.is_formed());

        let committed = state.scalar(&final_price(0, dec!(1)), dec!(1), true);
        assert!(committed.is_formed);

        let later = state.scalar(&final_price(1, dec!(1)), dec!(1), false);
        assert!(later.is_formed);

        state.reset();
        assert!(!state.is_formed());
    }

    #[test]
    fn test_boxed_indicator_delegates() {
        let mut boxed: Box<dyn Indicator> = Box::new(Sma::new(2).unwrap());
        let id = boxed.id();
        assert_eq!(boxed.name(), "SMA");
        assert_eq!(boxed.num_values_to_initialize(), 2);

        let out = boxed.process(&final_price(0, dec!(4)));
        assert_eq!(out.indicator, id);
        boxed.process(&final_price(1, dec!(6)));
        assert!(boxed.is_formed());
        boxed.reset();
        assert!(!boxed.is_formed());
    }

    #[test]
    fn test_empty_input_is_ignored() {
        let mut sma = Sma::new(1).unwrap();
        let out = sma.process(&InputValue::empty(time(0), true));
        assert!(out.is_empty());
        assert!(!sma.is_formed());
    }
}
