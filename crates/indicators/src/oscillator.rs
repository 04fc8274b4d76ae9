use crate::sma::Sma;
use crate::{Indicator, IndicatorState};
use barflow_core::{check_periods, IndicatorId, IndicatorValue, InputValue, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

/// Oscillator of Moving Averages: percent spread of a short SMA over a long one.
#[derive(Debug, Clone)]
pub struct Oma {
    state: IndicatorState,
    short: Sma,
    long: Sma,
}

impl Oma {
    pub const NAME: &'static str = "OMA";

    pub fn new(short_period: usize, long_period: usize) -> Result<Self> {
        check_periods(Self::NAME, short_period, long_period)?;
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            short: Sma::new(short_period)?,
            long: Sma::new(long_period)?,
        })
    }

    pub fn short_period(&self) -> usize {
        self.short.length()
    }

    pub fn long_period(&self) -> usize {
        self.long.length()
    }

    pub fn set_short_period(&mut self, period: usize) -> Result<()> {
        self.set_periods(period, self.long.length())
    }

    pub fn set_long_period(&mut self, period: usize) -> Result<()> {
        self.set_periods(self.short.length(), period)
    }

    fn set_periods(&mut self, short_period: usize, long_period: usize) -> Result<()> {
        check_periods(Self::NAME, short_period, long_period)?;
        self.short.set_length(short_period)?;
        self.long.set_length(long_period)?;
        debug!(indicator = Self::NAME, short_period, long_period, "periods changed");
        self.reset();
        Ok(())
    }
}

fn spread(short: Decimal, long: Decimal) -> Decimal {
    if long.is_zero() {
        Decimal::ZERO
    } else {
        (short - long) / long * dec!(100)
    }
}

impl Indicator for Oma {
    fn id(&self) -> IndicatorId {
        self.state.id()
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn process(&mut self, input: &InputValue) -> IndicatorValue {
        let short = self.short.process(input).as_decimal();
        let long = self.long.process(input).as_decimal();
        match short.zip(long) {
            Some((s, l)) => {
                let formed = self.long.is_formed();
                self.state.scalar(input, spread(s, l), formed)
            }
            None => self.state.empty(input),
        }
    }

    fn reset(&mut self) {
        self.short.reset();
        self.long.reset();
        self.state.reset();
    }

    fn is_formed(&self) -> bool {
        self.state.is_formed()
    }

    fn num_values_to_initialize(&self) -> usize {
        self.long.num_values_to_initialize()
    }
}
