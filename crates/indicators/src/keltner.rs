use crate::atr::Atr;
use crate::composite::{process_children, CompositeMode, Line};
use crate::ema::Ema;
use crate::{Indicator, IndicatorState};
use barflow_core::{
    check_length, check_positive, CompositeValue, IndicatorId, IndicatorValue, InputValue, Result,
    ValueKind,
};
use rust_decimal::Decimal;
use tracing::debug;

/// Keltner Channel: EMA of close with bands at `multiplier` ATRs.
#[derive(Debug, Clone)]
pub struct KeltnerChannel {
    state: IndicatorState,
    multiplier: Decimal,
    middle: Ema,
    atr: Atr,
    upper: Line,
    lower: Line,
}

impl KeltnerChannel {
    pub const NAME: &'static str = "KC";

    pub fn new(length: usize, multiplier: Decimal) -> Result<Self> {
        check_length(Self::NAME, length)?;
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            multiplier: check_positive(Self::NAME, "multiplier", multiplier)?,
            middle: Ema::new(length)?,
            atr: Atr::new(length)?,
            upper: Line::new("Upper"),
            lower: Line::new("Lower"),
        })
    }

    /// Keltner Channel (20, 2).
    pub fn default_periods() -> Result<Self> {
        Self::new(20, Decimal::TWO)
    }

    pub fn length(&self) -> usize {
        self.middle.length()
    }

    pub fn set_length(&mut self, length: usize) -> Result<()> {
        check_length(Self::NAME, length)?;
        self.middle.set_length(length)?;
        self.atr.set_length(length)?;
        debug!(indicator = Self::NAME, length, "length changed");
        self.reset();
        Ok(())
    }

    pub fn multiplier(&self) -> Decimal {
        self.multiplier
    }

    pub fn set_multiplier(&mut self, multiplier: Decimal) -> Result<()> {
        self.multiplier = check_positive(Self::NAME, "multiplier", multiplier)?;
        debug!(indicator = Self::NAME, %multiplier, "multiplier changed");
        self.reset();
        Ok(())
    }

    pub fn middle_line(&self) -> IndicatorId {
        self.middle.id()
    }

    pub fn upper_line(&self) -> IndicatorId {
        self.upper.id()
    }

    pub fn lower_line(&self) -> IndicatorId {
        self.lower.id()
    }
}

impl Indicator for KeltnerChannel {
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
        let (middle_id, atr_id) = (self.middle.id(), self.atr.id());
        let children = process_children(
            CompositeMode::Parallel,
            &mut [&mut self.middle, &mut self.atr],
            input,
        );
        let formed = self.middle.is_formed() && self.atr.is_formed();
        let offsets = children
            .get(middle_id)
            .and_then(IndicatorValue::as_decimal)
            .zip(children.get(atr_id).and_then(IndicatorValue::as_decimal));

        let mut values = CompositeValue::with_capacity(3);
        if let Some(mid) = children.get(middle_id) {
            values.insert(middle_id, mid.clone());
        }
        let k = self.multiplier;
        self.upper
            .insert(&mut values, input, offsets.map(|(m, a)| m + k * a), formed);
        self.lower
            .insert(&mut values, input, offsets.map(|(m, a)| m - k * a), formed);
        self.state.complete(input, ValueKind::Composite(values), formed)
    }

    fn reset(&mut self) {
        self.middle.reset();
        self.atr.reset();
        self.state.reset();
    }

    fn is_formed(&self) -> bool {
        self.state.is_formed()
    }

    fn emits_scalar(&self) -> bool {
        false
    }

    fn num_values_to_initialize(&self) -> usize {
        CompositeMode::Parallel.num_values_to_initialize([
            self.middle.num_values_to_initialize(),
            self.atr.num_values_to_initialize(),
        ])
    }
}
