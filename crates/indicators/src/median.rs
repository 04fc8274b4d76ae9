use crate::{Indicator, IndicatorState};
use barflow_core::{check_length, IndicatorId, IndicatorValue, InputValue, Result};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use tracing::debug;

/// Rolling median over the last `length` prices.
///
/// The window is mirrored in a sorted vector so each step costs one binary
/// search plus a shift rather than a full sort.
#[derive(Debug, Clone)]
pub struct Median {
    state: IndicatorState,
    len: usize,
    window: VecDeque<Decimal>,
    sorted: Vec<Decimal>,
}

impl Median {
    pub const NAME: &'static str = "Median";

    pub fn new(length: usize) -> Result<Self> {
        let len = check_length(Self::NAME, length)?;
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            len,
            window: VecDeque::with_capacity(len),
            sorted: Vec::with_capacity(len),
        })
    }

    pub fn length(&self) -> usize {
        self.len
    }

    pub fn set_length(&mut self, length: usize) -> Result<()> {
        self.len = check_length(Self::NAME, length)?;
        debug!(indicator = Self::NAME, length, "length changed");
        self.reset();
        Ok(())
    }

    /// Median of the committed window; zero while empty.
    pub fn value(&self) -> Decimal {
        median_of(&self.sorted)
    }

    fn evicting(&self) -> Option<Decimal> {
        if self.window.len() >= self.len {
            self.window.front().copied()
        } else {
            None
        }
    }
}

fn insert_sorted(sorted: &mut Vec<Decimal>, value: Decimal) {
    let idx = sorted.partition_point(|v| *v < value);
    sorted.insert(idx, value);
}

fn remove_sorted(sorted: &mut Vec<Decimal>, value: Decimal) {
    if let Ok(idx) = sorted.binary_search(&value) {
        sorted.remove(idx);
    }
}

fn median_of(sorted: &[Decimal]) -> Decimal {
    let n = sorted.len();
    if n == 0 {
        return Decimal::ZERO;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / Decimal::TWO
    }
}

impl Indicator for Median {
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
        let evicted = self.evicting();

        let value = if input.is_final {
            if let Some(old) = evicted {
                self.window.pop_front();
                remove_sorted(&mut self.sorted, old);
            }
            self.window.push_back(price);
            insert_sorted(&mut self.sorted, price);
            median_of(&self.sorted)
        } else {
            let mut scratch = self.sorted.clone();
            if let Some(old) = evicted {
                remove_sorted(&mut scratch, old);
            }
            insert_sorted(&mut scratch, price);
            median_of(&scratch)
        };

        let formed = self.window.len() >= self.len;
        self.state.scalar(input, value, formed)
    }

    fn reset(&mut self) {
        self.window.clear();
        self.sorted.clear();
        self.state.reset();
    }

    fn is_formed(&self) -> bool {
        self.state.is_formed()
    }

    fn num_values_to_initialize(&self) -> usize {
        self.len
    }
}
