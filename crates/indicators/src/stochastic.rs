use crate::composite::{process_children, CompositeMode};
use crate::high_low_index::HighLowIndex;
use crate::sma::Sma;
use crate::{Indicator, IndicatorState};
use barflow_core::{check_length, IndicatorId, IndicatorValue, InputValue, Result, ValueKind};
use rust_decimal::Decimal;
use tracing::debug;

/// Stochastic Oscillator (%K and %D).
///
/// %K = (Close - Lowest Low) / (Highest High - Lowest Low) * 100
/// %D = SMA(%K, d_period), fed only once %K is formed.
#[derive(Debug, Clone)]
pub struct Stochastic {
    state: IndicatorState,
    k: HighLowIndex,
    d: Sma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StochasticOutput {
    pub k: Decimal,
    pub d: Decimal,
}

impl Stochastic {
    pub const NAME: &'static str = "Stoch";

    pub fn new(k_period: usize, d_period: usize) -> Result<Self> {
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            k: HighLowIndex::new(k_period)?,
            d: Sma::new(d_period)?,
        })
    }

    /// Standard Stochastic (14, 3).
    pub fn default_periods() -> Result<Self> {
        Self::new(14, 3)
    }

    pub fn k_period(&self) -> usize {
        self.k.length()
    }

    pub fn d_period(&self) -> usize {
        self.d.length()
    }

    pub fn set_periods(&mut self, k_period: usize, d_period: usize) -> Result<()> {
        check_length(Self::NAME, k_period)?;
        check_length(Self::NAME, d_period)?;
        self.k.set_length(k_period)?;
        self.d.set_length(d_period)?;
        debug!(indicator = Self::NAME, k_period, d_period, "periods changed");
        self.reset();
        Ok(())
    }

    pub fn k_line(&self) -> IndicatorId {
        self.k.id()
    }

    pub fn d_line(&self) -> IndicatorId {
        self.d.id()
    }

    /// Decodes %K and %D from a value this indicator produced.
    pub fn output(&self, value: &IndicatorValue) -> Option<StochasticOutput> {
        Some(StochasticOutput {
            k: value.decimal_of(self.k.id())?,
            d: value.decimal_of(self.d.id())?,
        })
    }
}

impl Indicator for Stochastic {
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
        let values = process_children(CompositeMode::Sequence, &mut [&mut self.k, &mut self.d], input);
        let formed = self.d.is_formed();
        self.state.complete(input, ValueKind::Composite(values), formed)
    }

    fn reset(&mut self) {
        self.k.reset();
        self.d.reset();
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
            self.k.num_values_to_initialize(),
            self.d.num_values_to_initialize(),
        ])
    }
}
