use crate::buffer::WindowedBuffer;
use crate::{Indicator, IndicatorState};
use barflow_core::{check_length, IndicatorId, IndicatorValue, InputValue, Result};
use rust_decimal::Decimal;
use tracing::debug;

/// Population standard deviation over the last `length` prices.
#[derive(Debug, Clone)]
pub struct StdDev {
    state: IndicatorState,
    len: usize,
    buffer: WindowedBuffer,
}

impl StdDev {
    pub const NAME: &'static str = "StdDev";

    pub fn new(length: usize) -> Result<Self> {
        let len = check_length(Self::NAME, length)?;
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            len,
            buffer: WindowedBuffer::new(len),
        })
    }

    pub fn length(&self) -> usize {
        self.len
    }

    pub fn set_length(&mut self, length: usize) -> Result<()> {
        self.len = check_length(Self::NAME, length)?;
        debug!(indicator = Self::NAME, length, "length changed");
        self.buffer = WindowedBuffer::new(self.len);
        self.reset();
        Ok(())
    }
}

/// Population standard deviation of `values`; zero for fewer than two values.
fn std_dev_of(values: &[Decimal]) -> Decimal {
    if values.len() < 2 {
        return Decimal::ZERO;
    }
    let n = Decimal::from(values.len());
    let mean = values.iter().sum::<Decimal>() / n;
    let variance = values
        .iter()
        .map(|v| {
            let diff = *v - mean;
            diff * diff
        })
        .sum::<Decimal>()
        / n;
    decimal_sqrt(variance)
}

impl Indicator for StdDev {
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
        let window: Vec<Decimal> = if input.is_final {
            self.buffer.push(price);
            self.buffer.iter().collect()
        } else {
            self.buffer.retained().chain(std::iter::once(price)).collect()
        };
        let value = std_dev_of(&window);
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

/// Newton's method square root for Decimal.
pub fn decimal_sqrt(value: Decimal) -> Decimal {
    if value.is_zero() || value < Decimal::ZERO {
        return Decimal::ZERO;
    }
    let mut guess = value / Decimal::TWO;
    let epsilon = Decimal::new(1, 10); // 0.0000000001
    for _ in 0..100 {
        let next_guess = (guess + value / guess) / Decimal::TWO;
        let diff = (next_guess - guess).abs();
        guess = next_guess;
        if diff < epsilon {
            break;
        }
    }
    guess
}
