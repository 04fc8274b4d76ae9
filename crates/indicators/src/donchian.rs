use crate::composite::{process_children, CompositeMode, Line};
use crate::extrema::{Highest, Lowest};
use crate::{Indicator, IndicatorState};
use barflow_core::{check_length, IndicatorId, IndicatorValue, InputValue, Result, ValueKind};
use rust_decimal::Decimal;
use tracing::debug;

/// Donchian Channel.
///
/// Upper band = highest high over N periods.
/// Lower band = lowest low over N periods.
/// Middle band = (upper + lower) / 2.
#[derive(Debug, Clone)]
pub struct DonchianChannel {
    state: IndicatorState,
    upper: Highest,
    lower: Lowest,
    middle: Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DonchianOutput {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
}

impl DonchianChannel {
    pub const NAME: &'static str = "DC";

    pub fn new(length: usize) -> Result<Self> {
        check_length(Self::NAME, length)?;
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            upper: Highest::new(length)?,
            lower: Lowest::new(length)?,
            middle: Line::new("Middle"),
        })
    }

    pub fn length(&self) -> usize {
        self.upper.length()
    }

    pub fn set_length(&mut self, length: usize) -> Result<()> {
        self.upper.set_length(length)?;
        self.lower.set_length(length)?;
        debug!(indicator = Self::NAME, length, "length changed");
        self.reset();
        Ok(())
    }

    /// Committed channel, once both bands hold a value.
    pub fn output(&self) -> Option<DonchianOutput> {
        match (self.upper.value(), self.lower.value()) {
            (Some(u), Some(l)) => Some(DonchianOutput {
                upper: u,
                middle: (u + l) / Decimal::TWO,
                lower: l,
            }),
            _ => None,
        }
    }

    pub fn upper_line(&self) -> IndicatorId {
        self.upper.id()
    }

    pub fn middle_line(&self) -> IndicatorId {
        self.middle.id()
    }

    pub fn lower_line(&self) -> IndicatorId {
        self.lower.id()
    }
}

impl Indicator for DonchianChannel {
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
        let (upper_id, lower_id) = (self.upper.id(), self.lower.id());
        let mut values = process_children(
            CompositeMode::Parallel,
            &mut [&mut self.upper, &mut self.lower],
            input,
        );
        let middle = values
            .get(upper_id)
            .and_then(IndicatorValue::as_decimal)
            .zip(values.get(lower_id).and_then(IndicatorValue::as_decimal))
            .map(|(u, l)| (u + l) / Decimal::TWO);
        let formed = self.upper.is_formed() && self.lower.is_formed();
        self.middle.insert(&mut values, input, middle, formed);
        self.state.complete(input, ValueKind::Composite(values), formed)
    }

    fn reset(&mut self) {
        self.upper.reset();
        self.lower.reset();
        self.state.reset();
    }

    fn is_formed(&self) -> bool {
        self.state.is_formed()
    }

    fn emits_scalar(&self) -> bool {
        false
    }

    fn num_values_to_initialize(&self) -> usize {
        self.upper.length()
    }
}
