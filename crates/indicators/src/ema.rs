use crate::buffer::WindowedBuffer;
use crate::{Indicator, IndicatorState};
use barflow_core::{check_length, IndicatorId, IndicatorValue, InputValue, Result};
use rust_decimal::Decimal;
use tracing::debug;

/// Exponential Moving Average (EMA).
///
/// Until formed the output is the simple average over `length` (the SMA seed);
/// afterwards each value moves toward the input by `2 / (length + 1)`.
#[derive(Debug, Clone)]
pub struct Ema {
    state: IndicatorState,
    len: usize,
    multiplier: Decimal,
    /// Seed window, only used until formed.
    seed: WindowedBuffer,
    current: Option<Decimal>,
}

impl Ema {
    pub const NAME: &'static str = "EMA";

    pub fn new(length: usize) -> Result<Self> {
        let len = check_length(Self::NAME, length)?;
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            len,
            multiplier: Self::multiplier_for(len),
            seed: WindowedBuffer::new(len),
            current: None,
        })
    }

    fn multiplier_for(len: usize) -> Decimal {
        Decimal::TWO / (Decimal::from(len) + Decimal::ONE)
    }

    pub fn length(&self) -> usize {
        self.len
    }

    pub fn set_length(&mut self, length: usize) -> Result<()> {
        self.len = check_length(Self::NAME, length)?;
        debug!(indicator = Self::NAME, length, "length changed");
        self.multiplier = Self::multiplier_for(self.len);
        self.seed = WindowedBuffer::new(self.len);
        self.reset();
        Ok(())
    }

    /// Last committed value.
    pub fn value(&self) -> Option<Decimal> {
        self.current
    }
}

impl Indicator for Ema {
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

        let (value, formed) = match (self.state.is_formed(), self.current) {
            (true, Some(prev)) => ((price - prev) * self.multiplier + prev, true),
            _ if input.is_final => {
                self.seed.push(price);
                (self.seed.sum() / len, self.seed.is_full())
            }
            _ => ((self.seed.sum_excluding_oldest() + price) / len, false),
        };

        if input.is_final {
            self.current = Some(value);
        }
        self.state.scalar(input, value, formed)
    }

    fn reset(&mut self) {
        self.seed.clear();
        self.current = None;
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
    use rust_decimal_macros::dec;

    #[test]
    fn test_ema_sma_seed() {
        let mut ema = Ema::new(3).unwrap();
        let out = feed(&mut ema, &[dec!(2), dec!(4), dec!(6)]);
        assert_eq!(out[2], Some(dec!(4)));
        assert!(ema.is_formed());
    }

    #[test]
    fn test_ema_after_seed() {
        let mut ema = Ema::new(3).unwrap();
        feed(&mut ema, &[dec!(2), dec!(4), dec!(6)]);
        // multiplier = 2 / 4 = 0.5; (8 - 4) * 0.5 + 4 = 6
        let out = ema.process(&final_price(3, dec!(8)));
        assert_eq!(out.as_decimal(), Some(dec!(6)));
        assert_eq!(ema.value(), Some(dec!(6)));
    }

    #[test]
    fn test_ema_preview_does_not_commit() {
        let mut ema = Ema::new(3).unwrap();
        feed(&mut ema, &[dec!(2), dec!(4), dec!(6)]);
        let preview = ema.process(&preview_price(3, dec!(100)));
        assert_eq!(preview.as_decimal(), Some(dec!(52)));
        assert_eq!(ema.value(), Some(dec!(4)));
        let out = ema.process(&final_price(3, dec!(8)));
        assert_eq!(out.as_decimal(), Some(dec!(6)));
    }

    #[test]
    fn test_ema_preview_during_seed() {
        let mut ema = Ema::new(2).unwrap();
        ema.process(&final_price(0, dec!(4)));
        let preview = ema.process(&preview_price(1, dec!(6)));
        assert_eq!(preview.as_decimal(), Some(dec!(5)));
        assert!(!preview.is_formed);
        assert!(!ema.is_formed());
    }

    #[test]
    fn test_ema_reset() {
        let mut ema = Ema::new(2).unwrap();
        feed(&mut ema, &[dec!(1), dec!(3)]);
        ema.reset();
        assert_eq!(ema.value(), None);
        assert!(!ema.is_formed());
    }
}
