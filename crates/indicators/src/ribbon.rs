use crate::composite::{process_children, CompositeMode};
use crate::sma::Sma;
use crate::{Indicator, IndicatorState};
use barflow_core::{
    check_periods, IndicatorError, IndicatorId, IndicatorValue, InputValue, Result, ValueKind,
};
use tracing::debug;

/// Moving average ribbon: `ribbon_count` SMAs evenly spaced from
/// `short_period` to `long_period`, all fed the same input.
#[derive(Debug, Clone)]
pub struct MaRibbon {
    state: IndicatorState,
    short_period: usize,
    long_period: usize,
    averages: Vec<Sma>,
}

impl MaRibbon {
    pub const NAME: &'static str = "Ribbon";

    pub fn new(short_period: usize, long_period: usize, ribbon_count: usize) -> Result<Self> {
        let averages = Self::build(short_period, long_period, ribbon_count)?;
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            short_period,
            long_period,
            averages,
        })
    }

    fn build(short_period: usize, long_period: usize, ribbon_count: usize) -> Result<Vec<Sma>> {
        check_periods(Self::NAME, short_period, long_period)?;
        if ribbon_count < 2 {
            return Err(IndicatorError::InvalidRibbonCount(ribbon_count));
        }
        let span = long_period - short_period;
        (0..ribbon_count)
            .map(|i| Sma::new(short_period + span * i / (ribbon_count - 1)))
            .collect()
    }

    fn rebuild(&mut self, short_period: usize, long_period: usize, ribbon_count: usize) -> Result<()> {
        self.averages = Self::build(short_period, long_period, ribbon_count)?;
        self.short_period = short_period;
        self.long_period = long_period;
        debug!(
            indicator = Self::NAME,
            short_period, long_period, ribbon_count, "ribbon rebuilt"
        );
        self.reset();
        Ok(())
    }

    pub fn short_period(&self) -> usize {
        self.short_period
    }

    pub fn long_period(&self) -> usize {
        self.long_period
    }

    pub fn ribbon_count(&self) -> usize {
        self.averages.len()
    }

    pub fn set_short_period(&mut self, period: usize) -> Result<()> {
        self.rebuild(period, self.long_period, self.ribbon_count())
    }

    pub fn set_long_period(&mut self, period: usize) -> Result<()> {
        self.rebuild(self.short_period, period, self.ribbon_count())
    }

    pub fn set_ribbon_count(&mut self, count: usize) -> Result<()> {
        self.rebuild(self.short_period, self.long_period, count)
    }

    /// The ribbon's averages, shortest first.
    pub fn averages(&self) -> &[Sma] {
        &self.averages
    }

    pub fn lines(&self) -> Vec<IndicatorId> {
        self.averages.iter().map(Indicator::id).collect()
    }
}

impl Indicator for MaRibbon {
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
        let mut children: Vec<&mut dyn Indicator> = self
            .averages
            .iter_mut()
            .map(|sma| sma as &mut dyn Indicator)
            .collect();
        let values = process_children(CompositeMode::Parallel, &mut children, input);
        let formed = self.averages.iter().all(Indicator::is_formed);
        self.state.complete(input, ValueKind::Composite(values), formed)
    }

    fn reset(&mut self) {
        self.averages.iter_mut().for_each(Indicator::reset);
        self.state.reset();
    }

    fn is_formed(&self) -> bool {
        self.state.is_formed()
    }

    fn emits_scalar(&self) -> bool {
        false
    }

    fn num_values_to_initialize(&self) -> usize {
        CompositeMode::Parallel
            .num_values_to_initialize(self.averages.iter().map(Indicator::num_values_to_initialize))
    }
}
