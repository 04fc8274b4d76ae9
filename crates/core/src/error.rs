use crate::value::IndicatorId;
use rust_decimal::Decimal;

/// Configuration and lookup errors raised by indicators and their containers.
///
/// Processing itself never fails: malformed input degrades to an empty output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndicatorError {
    #[error("{indicator}: length must be at least 1, got {value}")]
    InvalidLength { indicator: &'static str, value: usize },

    #[error("{indicator}: {parameter} must be positive, got {value}")]
    NonPositive {
        indicator: &'static str,
        parameter: &'static str,
        value: Decimal,
    },

    #[error("{indicator}: short period {short} must be less than long period {long}")]
    InvalidPeriods {
        indicator: &'static str,
        short: usize,
        long: usize,
    },

    #[error("ribbon count must be at least 2, got {0}")]
    InvalidRibbonCount(usize),

    #[error("composite indicator needs at least one child")]
    NoChildren,

    #[error("indicator {0} is not a child of this composite")]
    UnknownChild(IndicatorId),

    #[error("sequence stage {index} ({name}) emits several lines and cannot feed the next stage")]
    UnchainableStage { index: usize, name: &'static str },

    #[error("history capacity must be at least 1")]
    InvalidCapacity,

    #[error("history index {index} out of range ({len} values retained)")]
    HistoryOutOfRange { index: usize, len: usize },
}

pub type Result<T, E = IndicatorError> = std::result::Result<T, E>;

/// Validates a window length (`>= 1`).
pub fn check_length(indicator: &'static str, value: usize) -> Result<usize> {
    if value == 0 {
        return Err(IndicatorError::InvalidLength { indicator, value });
    }
    Ok(value)
}

/// Validates a strictly positive decimal parameter.
pub fn check_positive(
    indicator: &'static str,
    parameter: &'static str,
    value: Decimal,
) -> Result<Decimal> {
    if value <= Decimal::ZERO {
        return Err(IndicatorError::NonPositive {
            indicator,
            parameter,
            value,
        });
    }
    Ok(value)
}

/// Validates a short/long period pair (both `>= 1`, `short < long`).
pub fn check_periods(indicator: &'static str, short: usize, long: usize) -> Result<(usize, usize)> {
    check_length(indicator, short)?;
    check_length(indicator, long)?;
    if short >= long {
        return Err(IndicatorError::InvalidPeriods {
            indicator,
            short,
            long,
        });
    }
    Ok((short, long))
}
