use crate::composite::{process_children, CompositeMode, Line};
use crate::sma::Sma;
use crate::std_dev::StdDev;
use crate::{Indicator, IndicatorState};
use barflow_core::{
    check_length, check_positive, CompositeValue, IndicatorId, IndicatorValue, InputValue, Result,
    ValueKind,
};
use rust_decimal::Decimal;
use tracing::debug;

/// Bollinger Bands.
///
/// Emits a composite of the middle band (SMA) and the upper/lower bands at
/// `multiplier` population standard deviations.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    state: IndicatorState,
    multiplier: Decimal,
    middle: Sma,
    deviation: StdDev,
    upper: Line,
    lower: Line,
}

/// Bollinger Bands output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BollingerOutput {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
    pub bandwidth: Decimal,
}

impl BollingerBands {
    pub const NAME: &'static str = "BB";

    pub fn new(length: usize, multiplier: Decimal) -> Result<Self> {
        check_length(Self::NAME, length)?;
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            multiplier: check_positive(Self::NAME, "multiplier", multiplier)?,
            middle: Sma::new(length)?,
            deviation: StdDev::new(length)?,
            upper: Line::new("Upper"),
            lower: Line::new("Lower"),
        })
    }

    /// Standard Bollinger Bands (20, 2).
    pub fn default_periods() -> Result<Self> {
        Self::new(20, Decimal::TWO)
    }

    pub fn length(&self) -> usize {
        self.middle.length()
    }

    pub fn set_length(&mut self, length: usize) -> Result<()> {
        check_length(Self::NAME, length)?;
        self.middle.set_length(length)?;
        self.deviation.set_length(length)?;
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

    /// Decodes the bands from a value this indicator produced.
    pub fn output(&self, value: &IndicatorValue) -> Option<BollingerOutput> {
        let upper = value.decimal_of(self.upper.id())?;
        let lower = value.decimal_of(self.lower.id())?;
        Some(BollingerOutput {
            upper,
            middle: value.decimal_of(self.middle.id())?,
            lower,
            bandwidth: upper - lower,
        })
    }
}

impl Indicator for BollingerBands {
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
        let (middle_id, deviation_id) = (self.middle.id(), self.deviation.id());
        let children = process_children(
            CompositeMode::Parallel,
            &mut [&mut self.middle, &mut self.deviation],
            input,
        );
        let middle = children.get(middle_id).and_then(IndicatorValue::as_decimal);
        let sd = children.get(deviation_id).and_then(IndicatorValue::as_decimal);
        let formed = self.middle.is_formed() && self.deviation.is_formed();

        let mut values = CompositeValue::with_capacity(3);
        if let Some(mid) = children.get(middle_id) {
            values.insert(middle_id, mid.clone());
        }
        let band = middle.zip(sd).map(|(m, s)| (m + self.multiplier * s, m - self.multiplier * s));
        self.upper.insert(&mut values, input, band.map(|b| b.0), formed);
        self.lower.insert(&mut values, input, band.map(|b| b.1), formed);
        self.state.complete(input, ValueKind::Composite(values), formed)
    }

    fn reset(&mut self) {
        self.middle.reset();
        self.deviation.reset();
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
            self.deviation.num_values_to_initialize(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use barflow_core::IndicatorError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bollinger_basic() {
        let mut bb = BollingerBands::new(3, Decimal::TWO).unwrap();
        bb.process(&final_price(0, dec!(10)));
        bb.process(&final_price(1, dec!(11)));
        let value = bb.process(&final_price(2, dec!(12)));
        assert!(value.is_formed);

        let out = bb.output(&value).unwrap();
        assert_eq!(out.middle, dec!(11));
        assert!(out.upper > out.middle);
        assert!(out.lower < out.middle);
        assert_eq!(out.bandwidth, out.upper - out.lower);
    }

    #[test]
    fn test_bollinger_flat_series_collapses() {
        let mut bb = BollingerBands::new(2, Decimal::TWO).unwrap();
        bb.process(&final_price(0, dec!(5)));
        let value = bb.process(&final_price(1, dec!(5)));
        let out = bb.output(&value).unwrap();
        assert_eq!(out.upper, dec!(5));
        assert_eq!(out.lower, dec!(5));
    }

    #[test]
    fn test_bollinger_rejects_bad_multiplier() {
        assert!(matches!(
            BollingerBands::new(20, dec!(0)),
            Err(IndicatorError::NonPositive { .. })
        ));
        let mut bb = BollingerBands::default_periods().unwrap();
        assert!(bb.set_multiplier(dec!(-2)).is_err());
        assert_eq!(bb.multiplier(), Decimal::TWO);
        assert_eq!(bb.num_values_to_initialize(), 20);
    }
}
