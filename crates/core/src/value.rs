use crate::models::InputValue;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Stable identity of an indicator instance. Composite outputs are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorId(Uuid);

impl IndicatorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for IndicatorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IndicatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Output values
// ---------------------------------------------------------------------------

/// What an indicator produced for one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// No value this step (warm-up of a pivot detector, halted sequence, empty input).
    Empty,
    Scalar(Decimal),
    /// A value that belongs `shift` bars before the input that produced it.
    Shifted { value: Decimal, shift: usize },
    Composite(CompositeValue),
}

/// Output of a single `process` call, stamped with the input's time and
/// finality plus the producer's formed state *after* processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorValue {
    pub indicator: IndicatorId,
    pub time: DateTime<Utc>,
    pub is_final: bool,
    pub is_formed: bool,
    pub kind: ValueKind,
}

impl IndicatorValue {
    pub fn new(
        indicator: IndicatorId,
        time: DateTime<Utc>,
        is_final: bool,
        is_formed: bool,
        kind: ValueKind,
    ) -> Self {
        Self {
            indicator,
            time,
            is_final,
            is_formed,
            kind,
        }
    }

    /// An empty value carrying the timing of `input`.
    pub fn empty(indicator: IndicatorId, input: &InputValue, is_formed: bool) -> Self {
        Self::new(indicator, input.time, input.is_final, is_formed, ValueKind::Empty)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, ValueKind::Empty)
    }

    /// Numeric payload of a scalar or shifted value.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self.kind {
            ValueKind::Scalar(value) | ValueKind::Shifted { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn shift(&self) -> Option<usize> {
        match self.kind {
            ValueKind::Shifted { shift, .. } => Some(shift),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&CompositeValue> {
        match &self.kind {
            ValueKind::Composite(inner) => Some(inner),
            _ => None,
        }
    }

    /// Looks up the entry produced by `child` inside a composite value.
    pub fn get(&self, child: IndicatorId) -> Option<&IndicatorValue> {
        self.as_composite().and_then(|inner| inner.get(child))
    }

    /// Numeric payload of the entry produced by `child`.
    pub fn decimal_of(&self, child: IndicatorId) -> Option<Decimal> {
        self.get(child).and_then(IndicatorValue::as_decimal)
    }

    /// Converts this output into an input for the next stage of a chain.
    /// Composite and empty outputs chain as empty inputs.
    pub fn to_input(&self) -> InputValue {
        match self.as_decimal() {
            Some(price) => InputValue::price(price, self.time, self.is_final),
            None => InputValue::empty(self.time, self.is_final),
        }
    }

    /// Leaf values in output order, descending into nested composites.
    pub fn leaves(&self) -> Vec<&IndicatorValue> {
        match &self.kind {
            ValueKind::Composite(inner) => inner.values().flat_map(|v| v.leaves()).collect(),
            _ => vec![self],
        }
    }
}

/// Ordered child outputs of a composite indicator, keyed by child identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeValue {
    entries: Vec<(IndicatorId, IndicatorValue)>,
}

impl CompositeValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Adds the output of `child`, replacing any earlier entry for it.
    pub fn insert(&mut self, child: IndicatorId, value: IndicatorValue) {
        match self.entries.iter_mut().find(|(id, _)| *id == child) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((child, value)),
        }
    }

    pub fn get(&self, child: IndicatorId) -> Option<&IndicatorValue> {
        self.entries
            .iter()
            .find(|(id, _)| *id == child)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (IndicatorId, &IndicatorValue)> {
        self.entries.iter().map(|(id, value)| (*id, value))
    }

    pub fn values(&self) -> impl Iterator<Item = &IndicatorValue> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
