use crate::wilder::WilderMa;
use crate::{Indicator, IndicatorState};
use barflow_core::{check_length, IndicatorId, IndicatorValue, InputValue, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

/// Relative Strength Index (RSI).
/// Uses Wilder's smoothing for average gain/loss.
#[derive(Debug, Clone)]
pub struct Rsi {
    state: IndicatorState,
    prev_value: Option<Decimal>,
    gains: WilderMa,
    losses: WilderMa,
}

impl Rsi {
    pub const NAME: &'static str = "RSI";

    pub fn new(period: usize) -> Result<Self> {
        check_length(Self::NAME, period)?;
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            prev_value: None,
            gains: WilderMa::new(period)?,
            losses: WilderMa::new(period)?,
        })
    }

    pub fn length(&self) -> usize {
        self.gains.length()
    }

    pub fn set_length(&mut self, period: usize) -> Result<()> {
        check_length(Self::NAME, period)?;
        self.gains.set_length(period)?;
        self.losses.set_length(period)?;
        debug!(indicator = Self::NAME, period, "length changed");
        self.reset();
        Ok(())
    }
}

fn rsi_of(avg_gain: Decimal, avg_loss: Decimal) -> Decimal {
    if avg_loss.is_zero() {
        dec!(100)
    } else {
        let rs = avg_gain / avg_loss;
        dec!(100) - (dec!(100) / (Decimal::ONE + rs))
    }
}

impl Indicator for Rsi {
    fn id(&self) -> IndicatorId {
        self.state.id()
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn process(&mut self, input: &InputValue) -> IndicatorValue {
        let Some(value) = input.as_price() else {
            return self.state.empty(input);
        };
        let Some(prev) = self.prev_value else {
            if input.is_final {
                self.prev_value = Some(value);
            }
            return self.state.empty(input);
        };

        let change = value - prev;
        let gain = change.max(Decimal::ZERO);
        let loss = (-change).max(Decimal::ZERO);
        let avg_gain = self
            .gains
            .process(&InputValue::price(gain, input.time, input.is_final));
        let avg_loss = self
            .losses
            .process(&InputValue::price(loss, input.time, input.is_final));

        if input.is_final {
            self.prev_value = Some(value);
        }
        match avg_gain.as_decimal().zip(avg_loss.as_decimal()) {
            Some((g, l)) => {
                let formed = self.gains.is_formed();
                self.state.scalar(input, rsi_of(g, l), formed)
            }
            None => self.state.empty(input),
        }
    }

    fn reset(&mut self) {
        self.prev_value = None;
        self.gains.reset();
        self.losses.reset();
        self.state.reset();
    }

    fn is_formed(&self) -> bool {
        self.state.is_formed()
    }

    fn num_values_to_initialize(&self) -> usize {
        self.gains.num_values_to_initialize() + 1
    }
}
