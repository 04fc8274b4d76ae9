use crate::composite::{process_children, CompositeMode, Line};
use crate::ema::Ema;
use crate::{Indicator, IndicatorState};
use barflow_core::{
    check_length, check_periods, CompositeValue, IndicatorId, IndicatorValue, InputValue, Result,
    ValueKind,
};
use rust_decimal::Decimal;
use tracing::debug;

/// MACD line (Moving Average Convergence Divergence): fast EMA minus slow EMA.
#[derive(Debug, Clone)]
pub struct Macd {
    state: IndicatorState,
    fast_ema: Ema,
    slow_ema: Ema,
}

impl Macd {
    pub const NAME: &'static str = "MACD";

    pub fn new(fast_period: usize, slow_period: usize) -> Result<Self> {
        check_periods(Self::NAME, fast_period, slow_period)?;
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            fast_ema: Ema::new(fast_period)?,
            slow_ema: Ema::new(slow_period)?,
        })
    }

    /// Standard MACD (12, 26).
    pub fn default_periods() -> Result<Self> {
        Self::new(12, 26)
    }

    pub fn fast_period(&self) -> usize {
        self.fast_ema.length()
    }

    pub fn slow_period(&self) -> usize {
        self.slow_ema.length()
    }

    pub fn set_periods(&mut self, fast_period: usize, slow_period: usize) -> Result<()> {
        check_periods(Self::NAME, fast_period, slow_period)?;
        self.fast_ema.set_length(fast_period)?;
        self.slow_ema.set_length(slow_period)?;
        debug!(indicator = Self::NAME, fast_period, slow_period, "periods changed");
        self.reset();
        Ok(())
    }
}

impl Indicator for Macd {
    fn id(&self) -> IndicatorId {
        self.state.id()
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn process(&mut self, input: &InputValue) -> IndicatorValue {
        let fast = self.fast_ema.process(input).as_decimal();
        let slow = self.slow_ema.process(input).as_decimal();
        match fast.zip(slow) {
            Some((f, s)) => {
                let formed = self.fast_ema.is_formed() && self.slow_ema.is_formed();
                self.state.scalar(input, f - s, formed)
            }
            None => self.state.empty(input),
        }
    }

    fn reset(&mut self) {
        self.fast_ema.reset();
        self.slow_ema.reset();
        self.state.reset();
    }

    fn is_formed(&self) -> bool {
        self.state.is_formed()
    }

    fn num_values_to_initialize(&self) -> usize {
        CompositeMode::Parallel.num_values_to_initialize([
            self.fast_ema.num_values_to_initialize(),
            self.slow_ema.num_values_to_initialize(),
        ])
    }
}

/// MACD output with all three components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacdOutput {
    pub macd: Decimal,
    pub signal: Decimal,
    pub histogram: Decimal,
}

/// MACD line chained into its signal EMA.
#[derive(Debug, Clone)]
pub struct MacdSignal {
    state: IndicatorState,
    macd: Macd,
    signal: Ema,
}

impl MacdSignal {
    pub const NAME: &'static str = "MACD Signal";

    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Result<Self> {
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            macd: Macd::new(fast_period, slow_period)?,
            signal: Ema::new(signal_period)?,
        })
    }

    /// Standard MACD (12, 26, 9).
    pub fn default_periods() -> Result<Self> {
        Self::new(12, 26, 9)
    }

    pub fn macd(&self) -> &Macd {
        &self.macd
    }

    pub fn signal_period(&self) -> usize {
        self.signal.length()
    }

    pub fn set_periods(
        &mut self,
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
    ) -> Result<()> {
        check_length(Self::NAME, signal_period)?;
        self.macd.set_periods(fast_period, slow_period)?;
        self.signal.set_length(signal_period)?;
        self.reset();
        Ok(())
    }

    pub fn macd_line(&self) -> IndicatorId {
        self.macd.id()
    }

    pub fn signal_line(&self) -> IndicatorId {
        self.signal.id()
    }

    fn run(&mut self, input: &InputValue) -> CompositeValue {
        process_children(
            CompositeMode::Sequence,
            &mut [&mut self.macd, &mut self.signal],
            input,
        )
    }
}

impl Indicator for MacdSignal {
    fn id(&self) -> IndicatorId {
        self.state.id()
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn process(&mut self, input: &InputValue) -> IndicatorValue {
        if input.is_empty() {
            return self.state.empty(input);
        }
        let values = self.run(input);
        let formed = self.signal.is_formed();
        self.state.complete(input, ValueKind::Composite(values), formed)
    }

    fn reset(&mut self) {
        self.macd.reset();
        self.signal.reset();
        self.state.reset();
    }

    fn is_formed(&self) -> bool {
        self.state.is_formed()
    }

    fn emits_scalar(&self) -> bool {
        false
    }

    fn num_values_to_initialize(&self) -> usize {
        CompositeMode::Sequence.num_values_to_initialize([
            self.macd.num_values_to_initialize(),
            self.signal.num_values_to_initialize(),
        ])
    }
}

/// MACD line, signal line and their difference (the histogram).
#[derive(Debug, Clone)]
pub struct MacdHistogram {
    state: IndicatorState,
    inner: MacdSignal,
    histogram: Line,
}

impl MacdHistogram {
    pub const NAME: &'static str = "MACD Histogram";

    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Result<Self> {
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            inner: MacdSignal::new(fast_period, slow_period, signal_period)?,
            histogram: Line::new("Histogram"),
        })
    }

    /// Standard MACD (12, 26, 9).
    pub fn default_periods() -> Result<Self> {
        Self::new(12, 26, 9)
    }

    pub fn set_periods(
        &mut self,
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
    ) -> Result<()> {
        self.inner.set_periods(fast_period, slow_period, signal_period)?;
        self.reset();
        Ok(())
    }

    pub fn macd_line(&self) -> IndicatorId {
        self.inner.macd_line()
    }

    pub fn signal_line(&self) -> IndicatorId {
        self.inner.signal_line()
    }

    pub fn histogram_line(&self) -> IndicatorId {
        self.histogram.id()
    }

    /// Decodes all three components from a value this indicator produced.
    pub fn output(&self, value: &IndicatorValue) -> Option<MacdOutput> {
        Some(MacdOutput {
            macd: value.decimal_of(self.macd_line())?,
            signal: value.decimal_of(self.signal_line())?,
            histogram: value.decimal_of(self.histogram_line())?,
        })
    }
}

impl Indicator for MacdHistogram {
    fn id(&self) -> IndicatorId {
        self.state.id()
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn process(&mut self, input: &InputValue) -> IndicatorValue {
        if input.is_empty() {
            return self.state.empty(input);
        }
        let mut values = self.inner.run(input);
        let histogram = values
            .get(self.inner.macd_line())
            .and_then(IndicatorValue::as_decimal)
            .zip(
                values
                    .get(self.inner.signal_line())
                    .and_then(IndicatorValue::as_decimal),
            )
            .map(|(macd, signal)| macd - signal);
        let formed = self.inner.signal.is_formed();
        self.histogram.insert(&mut values, input, histogram, formed);
        self.state.complete(input, ValueKind::Composite(values), formed)
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.state.reset();
    }

    fn is_formed(&self) -> bool {
        self.state.is_formed()
    }

    fn emits_scalar(&self) -> bool {
        false
    }

    fn num_values_to_initialize(&self) -> usize {
        self.inner.num_values_to_initialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use barflow_core::IndicatorError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_macd_rejects_inverted_periods() {
        assert_eq!(
            Macd::new(26, 12).unwrap_err(),
            IndicatorError::InvalidPeriods {
                indicator: "MACD",
                short: 26,
                long: 12
            }
        );
    }

    #[test]
    fn test_macd_constant_series_is_zero() {
        let mut macd = Macd::new(2, 3).unwrap();
        let out = feed(&mut macd, &[dec!(6), dec!(6), dec!(6), dec!(6)]);
        assert_eq!(out[2], Some(Decimal::ZERO));
        assert_eq!(out[3], Some(Decimal::ZERO));
        assert!(macd.is_formed());
        assert_eq!(macd.num_values_to_initialize(), 3);
    }

    #[test]
    fn test_macd_needs_slow_period_data() {
        let mut signal = MacdSignal::new(3, 5, 3).unwrap();
        assert_eq!(signal.num_values_to_initialize(), 7);
        for i in 0..4 {
            let out = signal.process(&final_price(i, Decimal::from(i + 1)));
            assert!(out.get(signal.signal_line()).unwrap().is_empty());
        }
        // slow EMA seeds on the 5th value and the signal starts on the same step
        let out = signal.process(&final_price(4, dec!(5)));
        assert!(out.decimal_of(signal.signal_line()).is_some());
        assert!(!out.is_formed);
    }

    #[test]
    fn test_histogram_is_macd_minus_signal() {
        let mut hist = MacdHistogram::new(2, 3, 2).unwrap();
        let prices = [dec!(1), dec!(2), dec!(4), dec!(8), dec!(16), dec!(8)];
        let out: Vec<_> = prices
            .iter()
            .enumerate()
            .map(|(i, p)| hist.process(&final_price(i as i64, *p)))
            .collect();
        assert!(!out[2].is_formed);
        assert!(out[3].is_formed);
        let last = hist.output(&out[5]).unwrap();
        assert_eq!(last.histogram, last.macd - last.signal);
        assert_eq!(hist.num_values_to_initialize(), 4);
    }
}
