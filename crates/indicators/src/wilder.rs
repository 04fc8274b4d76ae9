use crate::{Indicator, IndicatorState};
use barflow_core::{check_length, IndicatorId, IndicatorValue, InputValue, Result};
use rust_decimal::Decimal;
use tracing::debug;

/// Wilder's smoothed moving average (also known as SMMA or RMA).
///
/// `value = (prev * (k - 1) + x) / k` with `k` growing from 1 to `length`, so
/// the warm-up values are the running simple mean.
#[derive(Debug, Clone)]
pub struct WilderMa {
    state: IndicatorState,
    len: usize,
    count: usize,
    current: Decimal,
}

impl WilderMa {
    pub const NAME: &'static str = "WilderMA";

    pub fn new(length: usize) -> Result<Self> {
        let len = check_length(Self::NAME, length)?;
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            len,
            count: 0,
            current: Decimal::ZERO,
        })
    }

    pub fn length(&self) -> usize {
        self.len
    }

    pub fn set_length(&mut self, length: usize) -> Result<()> {
        self.len = check_length(Self::NAME, length)?;
        debug!(indicator = Self::NAME, length, "length changed");
        self.reset();
        Ok(())
    }

    pub fn value(&self) -> Option<Decimal> {
        (self.count > 0).then_some(self.current)
    }
}

impl Indicator for WilderMa {
    fn id(&self) -> IndicatorId {
        self.state.id()
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn process(&mut self, input: &InputValue) -> IndicatorValue {
        let Some(price) = input.as_price() else {
            return self.state.empty(input);
        };
        let k = (self.count + 1).min(self.len);
        let weight = Decimal::from(k);
        let value = (self.current * (weight - Decimal::ONE) + price) / weight;

        if input.is_final {
            self.count = k;
            self.current = value;
        }
        let formed = self.count >= self.len;
        self.state.scalar(input, value, formed)
    }

    fn reset(&mut self) {
        self.count = 0;
        self.current = Decimal::ZERO;
        self.state.reset();
    }

    fn is_formed(&self) -> bool {
        self.state.is_formed()
    }

    fn num_values_to_initialize(&self) -> usize {
        self.len
    }
}
