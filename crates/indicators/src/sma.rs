use crate::buffer::WindowedBuffer;
use crate::{Indicator, IndicatorState};
use barflow_core::{check_length, IndicatorId, IndicatorValue, InputValue, Result};
use rust_decimal::Decimal;
use tracing::debug;

/// Simple Moving Average (SMA).
///
/// Values are emitted from the first input, averaged over the full `length`
/// (so warm-up values are damped toward zero).
#[derive(Debug, Clone)]
pub struct Sma {
    state: IndicatorState,
    len: usize,
    buffer: WindowedBuffer,
}

impl Sma {
    pub const NAME: &'static str = "SMA";

    pub fn new(length: usize) -> Result<Self> {
        let len = check_length(Self::NAME, length)?;
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            len,
            buffer: WindowedBuffer::new(len),
        })
    }

    pub fn length(&self) -> usize {
        self.len
    }

    /// Changes the window length and resets.
    pub fn set_length(&mut self, length: usize) -> Result<()> {
        self.len = check_length(Self::NAME, length)?;
        debug!(indicator = Self::NAME, length, "length changed");
        self.buffer = WindowedBuffer::new(self.len);
        self.reset();
        Ok(())
    }

    /// Current committed SMA value, once formed.
    pub fn value(&self) -> Option<Decimal> {
        if self.buffer.is_full() {
            Some(self.buffer.sum() / Decimal::from(self.len))
        } else {
            None
        }
    }
}

impl Indicator for Sma {
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
        let len = Decimal::from(self.len);
        let value = if input.is_final {
            self.buffer.push(price);
            self.buffer.sum() / len
        } else {
            (self.buffer.sum_excluding_oldest() + price) / len
        };
        let formed = self.buffer.is_full();
        self.state.scalar(input, value, formed)
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.state.reset();
    }

    fn is_formed(&self) -> bool {
        self.state.is_formed()
    }

    fn num_values_to_initialize(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use barflow_core::IndicatorError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_sma_basic() {
        let mut sma = Sma::new(3).unwrap();
        let out = feed(&mut sma, &[dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)]);
        assert_eq!(out[2], Some(dec!(2)));
        assert_eq!(out[3], Some(dec!(3)));
        assert_eq!(out[4], Some(dec!(4)));
        assert_eq!(sma.value(), Some(dec!(4)));
    }

    #[test]
    fn test_sma_constant_series() {
        for length in [1, 3, 7] {
            let mut sma = Sma::new(length).unwrap();
            let out = feed(&mut sma, &vec![dec!(1.1); length]);
            assert_eq!(out[length - 1], Some(dec!(1.1)));
            assert!(sma.is_formed());
        }
    }

    #[test]
    fn test_sma_warmup_divides_by_length() {
        let mut sma = Sma::new(3).unwrap();
        let first = sma.process(&final_price(0, dec!(3)));
        assert_eq!(first.as_decimal(), Some(dec!(1)));
        assert!(!first.is_formed);
        assert_eq!(sma.value(), None);
    }

    #[test]
    fn test_sma_preview_then_commit() {
        let mut sma = Sma::new(3).unwrap();
        feed(&mut sma, &[dec!(1), dec!(2), dec!(3)]);

        let preview = sma.process(&preview_price(3, dec!(10)));
        assert_eq!(preview.as_decimal(), Some(dec!(5)));
        assert!(!preview.is_final);

        let committed = sma.process(&final_price(3, dec!(4)));
        assert_eq!(committed.as_decimal(), Some(dec!(3)));
    }

    #[test]
    fn test_sma_preview_before_full() {
        let mut sma = Sma::new(4).unwrap();
        feed(&mut sma, &[dec!(2), dec!(2)]);
        let preview = sma.process(&preview_price(2, dec!(4)));
        assert_eq!(preview.as_decimal(), Some(dec!(2)));
        assert!(!sma.is_formed());
    }

    #[test]
    fn test_sma_reset() {
        let mut sma = Sma::new(2).unwrap();
        feed(&mut sma, &[dec!(10), dec!(20)]);
        assert!(sma.is_formed());
        sma.reset();
        assert!(!sma.is_formed());
        let out = feed(&mut sma, &[dec!(5), dec!(15)]);
        assert_eq!(out[1], Some(dec!(10)));
    }

    #[test]
    fn test_sma_set_length_resets() {
        let mut sma = Sma::new(2).unwrap();
        feed(&mut sma, &[dec!(1), dec!(1)]);
        sma.set_length(3).unwrap();
        assert!(!sma.is_formed());
        assert_eq!(sma.num_values_to_initialize(), 3);
        assert_eq!(
            sma.set_length(0).unwrap_err(),
            IndicatorError::InvalidLength {
                indicator: "SMA",
                value: 0
            }
        );
    }
}
