use crate::composite::{process_children, CompositeMode};
use crate::wilder::WilderMa;
use crate::{Indicator, IndicatorState};
use barflow_core::{check_length, Bar, IndicatorId, IndicatorValue, InputValue, Result};
use rust_decimal::Decimal;

/// True range: the bar's range extended to the previous close.
/// The first bar has no previous close and uses `high - low`.
#[derive(Debug, Clone)]
pub struct TrueRange {
    state: IndicatorState,
    prev_close: Option<Decimal>,
}

impl TrueRange {
    pub const NAME: &'static str = "TR";

    pub fn new() -> Self {
        Self {
            state: IndicatorState::new(Self::NAME),
            prev_close: None,
        }
    }

    pub fn true_range(bar: &Bar, prev_close: Option<Decimal>) -> Decimal {
        let hl = bar.high - bar.low;
        match prev_close {
            Some(prev_c) => {
                let hc = (bar.high - prev_c).abs();
                let lc = (bar.low - prev_c).abs();
                hl.max(hc).max(lc)
            }
            None => hl,
        }
    }
}

impl Default for TrueRange {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for TrueRange {
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
        let tr = Self::true_range(&bar, self.prev_close);
        if input.is_final {
            self.prev_close = Some(bar.close);
        }
        self.state.scalar(input, tr, true)
    }

    fn reset(&mut self) {
        self.prev_close = None;
        self.state.reset();
    }

    fn is_formed(&self) -> bool {
        self.state.is_formed()
    }

    fn num_values_to_initialize(&self) -> usize {
        1
    }
}

/// Average True Range (ATR): true range smoothed with Wilder's average.
#[derive(Debug, Clone)]
pub struct Atr {
    state: IndicatorState,
    true_range: TrueRange,
    smoothing: WilderMa,
}

impl Atr {
    pub const NAME: &'static str = "ATR";

    pub fn new(length: usize) -> Result<Self> {
        check_length(Self::NAME, length)?;
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            true_range: TrueRange::new(),
            smoothing: WilderMa::new(length)?,
        })
    }

    pub fn length(&self) -> usize {
        self.smoothing.length()
    }

    pub fn set_length(&mut self, length: usize) -> Result<()> {
        check_length(Self::NAME, length)?;
        self.smoothing.set_length(length)?;
        self.reset();
        Ok(())
    }

    /// Last committed ATR.
    pub fn value(&self) -> Option<Decimal> {
        self.smoothing.value()
    }
}

impl Indicator for Atr {
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
        let smoothing_id = self.smoothing.id();
        let stages = process_children(
            CompositeMode::Sequence,
            &mut [&mut self.true_range, &mut self.smoothing],
            input,
        );
        match stages.get(smoothing_id).and_then(IndicatorValue::as_decimal) {
            Some(atr) => {
                let formed = self.smoothing.is_formed();
                self.state.scalar(input, atr, formed)
            }
            None => self.state.empty(input),
        }
    }

    fn reset(&mut self) {
        self.true_range.reset();
        self.smoothing.reset();
        self.state.reset();
    }

    fn is_formed(&self) -> bool {
        self.state.is_formed()
    }

    fn num_values_to_initialize(&self) -> usize {
        CompositeMode::Sequence.num_values_to_initialize([
            self.true_range.num_values_to_initialize(),
            self.smoothing.num_values_to_initialize(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_true_range_uses_previous_close() {
        let mut tr = TrueRange::new();
        let bars = [
            hlc(0, dec!(10), dec!(8), dec!(9)),
            hlc(1, dec!(14), dec!(12), dec!(13)),
            hlc(2, dec!(13), dec!(11.5), dec!(12)),
        ];
        let out: Vec<_> = feed_bars(&mut tr, &bars).iter().map(|v| v.as_decimal()).collect();
        // 10-8; |14-9|; |11.5-13|
        assert_eq!(out, vec![Some(dec!(2)), Some(dec!(5)), Some(dec!(1.5))]);
        assert!(tr.is_formed());
    }

    #[test]
    fn test_atr_hlc() {
        let mut atr = Atr::new(3).unwrap();
        assert_eq!(atr.num_values_to_initialize(), 3);
        let bars = [
            hlc(0, dec!(48.70), dec!(47.79), dec!(48.16)),
            hlc(1, dec!(48.72), dec!(48.14), dec!(48.61)),
            hlc(2, dec!(48.90), dec!(48.39), dec!(48.75)),
        ];
        let out = feed_bars(&mut atr, &bars);
        assert!(!out[1].is_formed);
        assert!(out[2].is_formed);
        // TR: 0.91, 0.58, 0.51
        assert_eq!(out[2].as_decimal(), Some(dec!(2.00) / dec!(3)));
    }

    #[test]
    fn test_atr_wilder_step() {
        let mut atr = Atr::new(2).unwrap();
        let bars = [
            hlc(0, dec!(10), dec!(8), dec!(9)),
            hlc(1, dec!(10), dec!(6), dec!(8)),
            hlc(2, dec!(9), dec!(8), dec!(8.5)),
        ];
        let out = feed_bars(&mut atr, &bars);
        // TR 2, 4 -> 3; next TR 1 -> (3 + 1) / 2
        assert_eq!(out[1].as_decimal(), Some(dec!(3)));
        assert_eq!(out[2].as_decimal(), Some(dec!(2)));
        assert_eq!(atr.value(), Some(dec!(2)));
    }

    #[test]
    fn test_atr_preview_keeps_prev_close() {
        let mut atr = Atr::new(2).unwrap();
        feed_bars(&mut atr, &[hlc(0, dec!(10), dec!(8), dec!(9))]);
        let preview = atr.process(&InputValue::bar(hlc(1, dec!(12), dec!(11), dec!(11)), false));
        // TR |12 - 9| = 3, mean with 2
        assert_eq!(preview.as_decimal(), Some(dec!(2.5)));
        let committed = atr.process(&InputValue::bar(hlc(1, dec!(10), dec!(9), dec!(9.5)), true));
        assert_eq!(committed.as_decimal(), Some(dec!(1.5)));
    }
}
