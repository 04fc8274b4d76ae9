use crate::{Indicator, IndicatorState};
use barflow_core::{IndicatorId, IndicatorValue, InputValue};
use rust_decimal::Decimal;

/// Volume Weighted Average Price (VWAP).
///
/// Resets each session. Call `reset()` at session boundaries.
#[derive(Debug, Clone)]
pub struct Vwap {
    state: IndicatorState,
    cumulative_tp_vol: Decimal,
    cumulative_vol: Decimal,
    current: Option<Decimal>,
}

impl Vwap {
    pub const NAME: &'static str = "VWAP";

    pub fn new() -> Self {
        Self {
            state: IndicatorState::new(Self::NAME),
            cumulative_tp_vol: Decimal::ZERO,
            cumulative_vol: Decimal::ZERO,
            current: None,
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        self.current
    }
}

impl Default for Vwap {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for Vwap {
    fn id(&self) -> IndicatorId {
        self.state.id()
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn process(&mut self, input: &InputValue) -> IndicatorValue {
        let Some(bar) = input.as_bar() else {
            return self.state.empty(input);
        };
        let typical_price = bar.typical_price();
        let tp_vol = self.cumulative_tp_vol + typical_price * bar.volume;
        let vol = self.cumulative_vol + bar.volume;

        let vwap = if vol.is_zero() {
            typical_price
        } else {
            tp_vol / vol
        };

        if input.is_final {
            self.cumulative_tp_vol = tp_vol;
            self.cumulative_vol = vol;
            self.current = Some(vwap);
        }
        self.state.scalar(input, vwap, true)
    }

    fn reset(&mut self) {
        self.cumulative_tp_vol = Decimal::ZERO;
        self.cumulative_vol = Decimal::ZERO;
        self.current = None;
        self.state.reset();
    }

    fn is_formed(&self) -> bool {
        self.state.is_formed()
    }

    fn num_values_to_initialize(&self) -> usize {
        1
    }
}
