use crate::{Indicator, IndicatorState};
use barflow_core::{
    check_positive, Bar, IndicatorId, IndicatorValue, InputValue, Result, ValueKind,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Reversal needed to confirm a pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deviation {
    /// Percent of the running extreme, e.g. `5` for 5%.
    Percent(Decimal),
    /// Price units.
    Absolute(Decimal),
}

impl Default for Deviation {
    fn default() -> Self {
        Deviation::Percent(dec!(5))
    }
}

impl Deviation {
    fn validate(self, indicator: &'static str) -> Result<Self> {
        match self {
            Deviation::Percent(p) => check_positive(indicator, "deviation", p).map(Deviation::Percent),
            Deviation::Absolute(a) => check_positive(indicator, "deviation", a).map(Deviation::Absolute),
        }
    }

    /// Threshold in price units measured from `extreme`.
    pub fn threshold(self, extreme: Decimal) -> Decimal {
        match self {
            Deviation::Percent(p) => extreme.abs() * p / dec!(100),
            Deviation::Absolute(a) => a,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PivotKind {
    Peak,
    Trough,
}

/// A confirmed swing extreme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pivot {
    pub kind: PivotKind,
    pub price: Decimal,
    /// Bars between the extreme and the bar that confirmed it.
    pub shift: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Up,
    Down,
}

/// Running swing state. `Copy` so previews can step a scratch copy.
#[derive(Debug, Clone, Copy, Default)]
struct Swing {
    seeded: bool,
    trend: Option<Trend>,
    high: Decimal,
    high_age: usize,
    low: Decimal,
    low_age: usize,
}

impl Swing {
    fn step(&mut self, bar: &Bar, deviation: Deviation) -> Option<Pivot> {
        if !self.seeded {
            *self = Swing {
                seeded: true,
                trend: None,
                high: bar.high,
                high_age: 0,
                low: bar.low,
                low_age: 0,
            };
            return None;
        }
        self.high_age += 1;
        self.low_age += 1;

        match self.trend {
            Some(Trend::Up) => {
                if bar.high > self.high {
                    self.extend_high(bar);
                    None
                } else {
                    self.try_peak(bar, deviation)
                }
            }
            Some(Trend::Down) => {
                if bar.low < self.low {
                    self.extend_low(bar);
                    None
                } else {
                    self.try_trough(bar, deviation)
                }
            }
            None => {
                let new_high = bar.high > self.high;
                let new_low = bar.low < self.low;
                if new_high {
                    self.extend_high(bar);
                }
                if new_low {
                    self.extend_low(bar);
                }
                if !new_high {
                    if let Some(pivot) = self.try_peak(bar, deviation) {
                        return Some(pivot);
                    }
                }
                if !new_low {
                    return self.try_trough(bar, deviation);
                }
                None
            }
        }
    }

    fn extend_high(&mut self, bar: &Bar) {
        self.high = bar.high;
        self.high_age = 0;
    }

    fn extend_low(&mut self, bar: &Bar) {
        self.low = bar.low;
        self.low_age = 0;
    }

    fn try_peak(&mut self, bar: &Bar, deviation: Deviation) -> Option<Pivot> {
        if self.high - bar.low <= deviation.threshold(self.high) {
            return None;
        }
        let pivot = Pivot {
            kind: PivotKind::Peak,
            price: self.high,
            shift: self.high_age,
        };
        self.trend = Some(Trend::Down);
        self.extend_low(bar);
        Some(pivot)
    }

    fn try_trough(&mut self, bar: &Bar, deviation: Deviation) -> Option<Pivot> {
        if bar.high - self.low <= deviation.threshold(self.low) {
            return None;
        }
        let pivot = Pivot {
            kind: PivotKind::Trough,
            price: self.low,
            shift: self.low_age,
        };
        self.trend = Some(Trend::Up);
        self.extend_high(bar);
        Some(pivot)
    }
}

/// Zig-zag core shared by [`ZigZag`], [`Peak`] and [`Trough`]; `filter`
/// selects which confirmed pivots are surfaced.
#[derive(Debug, Clone)]
struct PivotStream {
    state: IndicatorState,
    deviation: Deviation,
    filter: Option<PivotKind>,
    swing: Swing,
    last_pivot: Option<Pivot>,
}

impl PivotStream {
    fn new(name: &'static str, deviation: Deviation, filter: Option<PivotKind>) -> Result<Self> {
        Ok(Self {
            state: IndicatorState::new(name),
            deviation: deviation.validate(name)?,
            filter,
            swing: Swing::default(),
            last_pivot: None,
        })
    }

    fn set_deviation(&mut self, deviation: Deviation) -> Result<()> {
        self.deviation = deviation.validate(self.state.name())?;
        debug!(indicator = self.state.name(), ?deviation, "deviation changed");
        self.reset();
        Ok(())
    }

    fn process(&mut self, input: &InputValue) -> IndicatorValue {
        let Some(bar) = input.as_bar() else {
            return self.state.empty(input);
        };

        let pivot = if input.is_final {
            let pivot = self.swing.step(&bar, self.deviation);
            if let Some(p) = pivot {
                trace!(indicator = self.state.name(), kind = ?p.kind, price = %p.price, shift = p.shift, "pivot confirmed");
                self.last_pivot = Some(p);
            }
            pivot
        } else {
            let mut scratch = self.swing;
            scratch.step(&bar, self.deviation)
        };

        let kind = match pivot {
            Some(p) if self.filter.map_or(true, |wanted| wanted == p.kind) => ValueKind::Shifted {
                value: p.price,
                shift: p.shift,
            },
            _ => ValueKind::Empty,
        };
        let formed = self.swing.seeded;
        self.state.complete(input, kind, formed)
    }

    fn reset(&mut self) {
        self.swing = Swing::default();
        self.last_pivot = None;
        self.state.reset();
    }
}

macro_rules! pivot_indicator {
    ($(#[$doc:meta])* $name:ident, $label:literal, $filter:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name(PivotStream);

        impl $name {
            pub const NAME: &'static str = $label;

            pub fn new(deviation: Deviation) -> Result<Self> {
                PivotStream::new(Self::NAME, deviation, $filter).map(Self)
            }

            pub fn deviation(&self) -> Deviation {
                self.0.deviation
            }

            pub fn set_deviation(&mut self, deviation: Deviation) -> Result<()> {
                self.0.set_deviation(deviation)
            }

            /// Most recent committed pivot of any direction.
            pub fn last_pivot(&self) -> Option<Pivot> {
                self.0.last_pivot
            }
        }

        impl Indicator for $name {
            fn id(&self) -> IndicatorId {
                self.0.state.id()
            }

            fn name(&self) -> &'static str {
                Self::NAME
            }

            fn process(&mut self, input: &InputValue) -> IndicatorValue {
                self.0.process(input)
            }

            fn reset(&mut self) {
                self.0.reset()
            }

            fn is_formed(&self) -> bool {
                self.0.state.is_formed()
            }

            fn num_values_to_initialize(&self) -> usize {
                1
            }
        }
    };
}

pivot_indicator!(
    /// Zig-zag: emits every confirmed pivot as `Shifted(price, bars since extreme)`.
    ZigZag,
    "ZigZag",
    None
);
pivot_indicator!(
    /// Swing highs only.
    Peak,
    "Peak",
    Some(PivotKind::Peak)
);
pivot_indicator!(
    /// Swing lows only.
    Trough,
    "Trough",
    Some(PivotKind::Trough)
);
