use crate::buffer::{MaxBuffer, MinBuffer};
use crate::{Indicator, IndicatorState};
use barflow_core::{check_length, IndicatorId, IndicatorValue, InputValue, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

/// Position of the close within the `length`-bar high/low range, 0..=100.
///
/// Returns 50 when the range is zero.
#[derive(Debug, Clone)]
pub struct HighLowIndex {
    state: IndicatorState,
    len: usize,
    highs: MaxBuffer,
    lows: MinBuffer,
}

impl HighLowIndex {
    pub const NAME: &'static str = "HLI";

    pub fn new(length: usize) -> Result<Self> {
        let len = check_length(Self::NAME, length)?;
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            len,
            highs: MaxBuffer::new(len),
            lows: MinBuffer::new(len),
        })
    }

    pub fn length(&self) -> usize {
        self.len
    }

    pub fn set_length(&mut self, length: usize) -> Result<()> {
        self.len = check_length(Self::NAME, length)?;
        debug!(indicator = Self::NAME, length, "length changed");
        self.highs = MaxBuffer::new(self.len);
        self.lows = MinBuffer::new(self.len);
        self.reset();
        Ok(())
    }
}

fn position_in_range(close: Decimal, highest: Decimal, lowest: Decimal) -> Decimal {
    let range = highest - lowest;
    if range.is_zero() {
        dec!(50)
    } else {
        (close - lowest) / range * dec!(100)
    }
}

impl Indicator for HighLowIndex {
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
        let (highest, lowest) = if input.is_final {
            self.highs.push(bar.high);
            self.lows.push(bar.low);
            (
                self.highs.max().unwrap_or(bar.high),
                self.lows.min().unwrap_or(bar.low),
            )
        } else {
            (
                self.highs.max().map_or(bar.high, |h| h.max(bar.high)),
                self.lows.min().map_or(bar.low, |l| l.min(bar.low)),
            )
        };
        let value = position_in_range(bar.close, highest, lowest);
        let formed = self.highs.is_full();
        self.state.scalar(input, value, formed)
    }

    fn reset(&mut self) {
        self.highs.clear();
        self.lows.clear();
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

    #[test]
    fn test_close_position() {
        let mut hli = HighLowIndex::new(2).unwrap();
        let bars = [
            hlc(0, dec!(10), dec!(0), dec!(5)),
            hlc(1, dec!(8), dec!(2), dec!(7.5)),
        ];
        let out = feed_bars(&mut hli, &bars);
        assert_eq!(out[0].as_decimal(), Some(dec!(50)));
        assert_eq!(out[1].as_decimal(), Some(dec!(75)));
        assert!(out[1].is_formed);
    }

    #[test]
    fn test_zero_range_is_fifty() {
        let mut hli = HighLowIndex::new(3).unwrap();
        let flat: Vec<_> = (0..3).map(|i| hlc(i, dec!(4), dec!(4), dec!(4))).collect();
        let out = feed_bars(&mut hli, &flat);
        assert!(out.iter().all(|v| v.as_decimal() == Some(dec!(50))));
    }
}
