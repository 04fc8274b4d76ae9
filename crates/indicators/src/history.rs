use crate::Indicator;
use barflow_core::{IndicatorError, IndicatorId, IndicatorValue, InputValue, Result};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use tracing::debug;

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Bounded record of committed (input, output) pairs, newest first.
#[derive(Debug, Clone)]
pub struct HistoryContainer {
    capacity: usize,
    entries: VecDeque<(InputValue, IndicatorValue)>,
}

impl Default for HistoryContainer {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
            entries: VecDeque::with_capacity(DEFAULT_HISTORY_CAPACITY),
        }
    }
}

impl HistoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(IndicatorError::InvalidCapacity);
        }
        Ok(Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        })
    }

    /// Records a committed pair; the oldest pair is dropped once full.
    pub fn push(&mut self, input: InputValue, output: IndicatorValue) {
        self.entries.push_front((input, output));
        self.entries.truncate(self.capacity);
    }

    /// The pair recorded `index` finals ago (0 = newest).
    pub fn get(&self, index: usize) -> Result<&(InputValue, IndicatorValue)> {
        self.entries
            .get(index)
            .ok_or(IndicatorError::HistoryOutOfRange {
                index,
                len: self.entries.len(),
            })
    }

    /// Shrinking the capacity drops the oldest pairs.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        if capacity == 0 {
            return Err(IndicatorError::InvalidCapacity);
        }
        self.capacity = capacity;
        self.entries.truncate(capacity);
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pairs from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &(InputValue, IndicatorValue)> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Wraps an indicator and records every committed pair it produces.
#[derive(Debug, Clone)]
pub struct WithHistory<I> {
    inner: I,
    history: HistoryContainer,
}

impl<I: Indicator> WithHistory<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            history: HistoryContainer::default(),
        }
    }

    pub fn with_capacity(inner: I, capacity: usize) -> Result<Self> {
        debug!(indicator = inner.name(), capacity, "history attached");
        Ok(Self {
            inner,
            history: HistoryContainer::with_capacity(capacity)?,
        })
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }

    /// Reconfiguring the inner indicator through this handle does not clear
    /// the recorded history.
    pub fn inner_mut(&mut self) -> &mut I {
        &mut self.inner
    }

    pub fn into_inner(self) -> I {
        self.inner
    }

    pub fn history(&self) -> &HistoryContainer {
        &self.history
    }

    /// Output recorded `index` finals ago.
    pub fn output_at(&self, index: usize) -> Result<&IndicatorValue> {
        self.history.get(index).map(|(_, output)| output)
    }

    /// Numeric output recorded `index` finals ago; `None` for empty or
    /// composite outputs.
    pub fn value_at(&self, index: usize) -> Result<Option<Decimal>> {
        self.output_at(index).map(IndicatorValue::as_decimal)
    }
}

impl<I: Indicator> Indicator for WithHistory<I> {
    fn id(&self) -> IndicatorId {
        self.inner.id()
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn process(&mut self, input: &InputValue) -> IndicatorValue {
        let output = self.inner.process(input);
        if input.is_final && !input.is_empty() {
            self.history.push(*input, output.clone());
        }
        output
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.history.clear();
    }

    fn is_formed(&self) -> bool {
        self.inner.is_formed()
    }

    fn num_values_to_initialize(&self) -> usize {
        self.inner.num_values_to_initialize()
    }

    fn emits_scalar(&self) -> bool {
        self.inner.emits_scalar()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sma::Sma;
    use crate::testing::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(
            HistoryContainer::with_capacity(0).unwrap_err(),
            IndicatorError::InvalidCapacity
        );
        assert_eq!(HistoryContainer::new().capacity(), DEFAULT_HISTORY_CAPACITY);
    }

    #[test]
    fn test_newest_first_with_eviction() {
        let mut sma = WithHistory::with_capacity(Sma::new(1).unwrap(), 2).unwrap();
        for (i, p) in [dec!(1), dec!(2), dec!(3)].into_iter().enumerate() {
            sma.process(&final_price(i as i64, p));
        }
        assert_eq!(sma.history().len(), 2);
        assert_eq!(sma.value_at(0).unwrap(), Some(dec!(3)));
        assert_eq!(sma.value_at(1).unwrap(), Some(dec!(2)));
        assert_eq!(
            sma.value_at(2).unwrap_err(),
            IndicatorError::HistoryOutOfRange { index: 2, len: 2 }
        );
        let (input, _) = sma.history().get(0).unwrap();
        assert_eq!(input.as_price(), Some(dec!(3)));
    }

    #[test]
    fn test_previews_are_not_recorded() {
        let mut sma = WithHistory::new(Sma::new(2).unwrap());
        sma.process(&final_price(0, dec!(4)));
        sma.process(&preview_price(1, dec!(8)));
        sma.process(&preview_price(1, dec!(9)));
        assert_eq!(sma.history().len(), 1);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut sma = WithHistory::new(Sma::new(1).unwrap());
        sma.process(&final_price(0, dec!(4)));
        sma.reset();
        assert!(sma.history().is_empty());
        assert!(!sma.is_formed());
    }

    #[test]
    fn test_shrinking_capacity_keeps_newest() {
        let mut history = HistoryContainer::new();
        let mut sma = Sma::new(1).unwrap();
        for i in 0..5 {
            let input = final_price(i, Decimal::from(i));
            let output = sma.process(&input);
            history.push(input, output);
        }
        history.set_capacity(2).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.get(0).unwrap().1.as_decimal(), Some(dec!(4)));
        assert!(history.set_capacity(0).is_err());
    }
}
