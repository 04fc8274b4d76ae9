use crate::buffer::{MaxBuffer, MinBuffer};
use crate::{Indicator, IndicatorState};
use barflow_core::{check_length, IndicatorId, IndicatorValue, InputValue, Result};
use rust_decimal::Decimal;
use tracing::debug;

/// Highest high over the last `length` bars (bare prices count as flat bars).
#[derive(Debug, Clone)]
pub struct Highest {
    state: IndicatorState,
    len: usize,
    buffer: MaxBuffer,
}

impl Highest {
    pub const NAME: &'static str = "Highest";

    pub fn new(length: usize) -> Result<Self> {
        let len = check_length(Self::NAME, length)?;
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            len,
            buffer: MaxBuffer::new(len),
        })
    }

    pub fn length(&self) -> usize {
        self.len
    }

    pub fn set_length(&mut self, length: usize) -> Result<()> {
        self.len = check_length(Self::NAME, length)?;
        debug!(indicator = Self::NAME, length, "length changed");
        self.buffer = MaxBuffer::new(self.len);
        self.reset();
        Ok(())
    }

    /// Committed maximum.
    pub fn value(&self) -> Option<Decimal> {
        self.buffer.max()
    }
}

impl Indicator for Highest {
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
        let value = if input.is_final {
            self.buffer.push(bar.high);
            self.buffer.max().unwrap_or(bar.high)
        } else {
            self.buffer.max().map_or(bar.high, |max| max.max(bar.high))
        };
        let formed = self.buffer.is_full();
        self.state.scalar(input, value, formed)
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.state.reset();
    }

    fn is_formed(&self) -> bool {
        self.state.is_formed()
    }

    fn num_values_to_initialize(&self) -> usize {
        self.len
    }
}

/// Lowest low over the last `length` bars.
#[derive(Debug, Clone)]
pub struct Lowest {
    state: IndicatorState,
    len: usize,
    buffer: MinBuffer,
}

impl Lowest {
    pub const NAME: &'static str = "Lowest";

    pub fn new(length: usize) -> Result<Self> {
        let len = check_length(Self::NAME, length)?;
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            len,
            buffer: MinBuffer::new(len),
        })
    }

    pub fn length(&self) -> usize {
        self.len
    }

    pub fn set_length(&mut self, length: usize) -> Result<()> {
        self.len = check_length(Self::NAME, length)?;
        debug!(indicator = Self::NAME, length, "length changed");
        self.buffer = MinBuffer::new(self.len);
        self.reset();
        Ok(())
    }

    /// Committed minimum.
    pub fn value(&self) -> Option<Decimal> {
        self.buffer.min()
    }
}

impl Indicator for Lowest {
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
        let value = if input.is_final {
            self.buffer.push(bar.low);
            self.buffer.min().unwrap_or(bar.low)
        } else {
            self.buffer.min().map_or(bar.low, |min| min.min(bar.low))
        };
        let formed = self.buffer.is_full();
        self.state.scalar(input, value, formed)
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.state.reset();
    }

    fn is_formed(&self) -> bool {
        self.state.is_formed()
    }

    fn num_values_to_initialize(&self) -> usize {
        self.len
    }
}
