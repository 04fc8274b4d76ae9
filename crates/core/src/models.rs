use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Market Data
// ---------------------------------------------------------------------------

/// A single OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// A bar whose four prices all equal `price`.
    pub fn flat(timestamp: DateTime<Utc>, price: Decimal, volume: Decimal) -> Self {
        Self::new(timestamp, price, price, price, price, volume)
    }

    /// `high - low`.
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    /// Typical price: `(high + low + close) / 3`.
    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / Decimal::from(3)
    }

    /// Median price: `(high + low) / 2`.
    pub fn median_price(&self) -> Decimal {
        (self.high + self.low) / Decimal::TWO
    }
}

/// A single tick (bid/ask/last).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    pub volume: Decimal,
}

impl Tick {
    /// Promotes the tick to a flat bar at its last traded price.
    pub fn to_bar(&self) -> Bar {
        Bar::flat(self.timestamp, self.last, self.volume)
    }
}

// ---------------------------------------------------------------------------
// Indicator input
// ---------------------------------------------------------------------------

/// Payload fed into an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputData {
    /// Nothing usable (e.g. an upstream indicator that produced no value).
    Empty,
    /// A bare price, typically the output of another indicator.
    Price(Decimal),
    Bar(Bar),
}

/// One input to an indicator, stamped with its bar time and whether the bar
/// has closed.
///
/// A non-final input is a preview of the bar still forming: indicators must not
/// commit anything from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputValue {
    pub time: DateTime<Utc>,
    pub is_final: bool,
    pub data: InputData,
}

impl InputValue {
    pub fn bar(bar: Bar, is_final: bool) -> Self {
        Self {
            time: bar.timestamp,
            is_final,
            data: InputData::Bar(bar),
        }
    }

    pub fn tick(tick: &Tick, is_final: bool) -> Self {
        Self::bar(tick.to_bar(), is_final)
    }

    pub fn price(price: Decimal, time: DateTime<Utc>, is_final: bool) -> Self {
        Self {
            time,
            is_final,
            data: InputData::Price(price),
        }
    }

    pub fn empty(time: DateTime<Utc>, is_final: bool) -> Self {
        Self {
            time,
            is_final,
            data: InputData::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.data, InputData::Empty)
    }

    /// Scalar view of the input. Bars yield their close.
    pub fn as_price(&self) -> Option<Decimal> {
        match self.data {
            InputData::Empty => None,
            InputData::Price(price) => Some(price),
            InputData::Bar(bar) => Some(bar.close),
        }
    }

    /// Bar view of the input. Bare prices are promoted to flat, zero-volume bars.
    pub fn as_bar(&self) -> Option<Bar> {
        match self.data {
            InputData::Empty => None,
            InputData::Price(price) => Some(Bar::flat(self.time, price, Decimal::ZERO)),
            InputData::Bar(bar) => Some(bar),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_bar_derived_prices() {
        let bar = Bar::new(ts(), dec!(10), dec!(30), dec!(5), dec!(20), dec!(100));
        assert_eq!(bar.range(), dec!(25));
        assert_eq!(bar.median_price(), dec!(17.5));
        assert_eq!(bar.typical_price(), dec!(55) / dec!(3));
    }

    #[test]
    fn test_price_input_promotes_to_flat_bar() {
        let input = InputValue::price(dec!(42), ts(), false);
        let bar = input.as_bar().unwrap();
        assert_eq!(bar.open, dec!(42));
        assert_eq!(bar.high, dec!(42));
        assert_eq!(bar.low, dec!(42));
        assert_eq!(bar.volume, Decimal::ZERO);
        assert!(!input.is_final);
    }

    #[test]
    fn test_bar_input_price_is_close() {
        let bar = Bar::new(ts(), dec!(1), dec!(4), dec!(0.5), dec!(3), dec!(7));
        let input = InputValue::bar(bar, true);
        assert_eq!(input.as_price(), Some(dec!(3)));
        assert_eq!(input.time, ts());
    }

    #[test]
    fn test_tick_input_uses_last() {
        let tick = Tick {
            timestamp: ts(),
            bid: dec!(99),
            ask: dec!(101),
            last: dec!(100),
            volume: dec!(3),
        };
        let input = InputValue::tick(&tick, false);
        assert_eq!(input.as_price(), Some(dec!(100)));
        assert_eq!(input.as_bar().unwrap().volume, dec!(3));
    }

    #[test]
    fn test_empty_input_has_no_views() {
        let input = InputValue::empty(ts(), true);
        assert!(input.is_empty());
        assert_eq!(input.as_price(), None);
        assert_eq!(input.as_bar(), None);
    }
}
