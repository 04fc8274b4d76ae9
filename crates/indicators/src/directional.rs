use crate::atr::Atr;
use crate::composite::{chain, process_children, CompositeMode, Line};
use crate::wilder::WilderMa;
use crate::{Indicator, IndicatorState};
use barflow_core::{
    check_length, Bar, CompositeValue, IndicatorId, IndicatorValue, InputValue, Result, ValueKind,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

/// Raw directional movement `(plus, minus)` between two consecutive bars.
///
/// The larger of the up-move and down-move wins if it is positive; ties and
/// inside bars yield zero for both.
pub fn directional_movement(current: &Bar, previous: &Bar) -> (Decimal, Decimal) {
    let up = current.high - previous.high;
    let down = previous.low - current.low;
    let plus = if up > Decimal::ZERO && up > down {
        up
    } else {
        Decimal::ZERO
    };
    let minus = if down > Decimal::ZERO && down > up {
        down
    } else {
        Decimal::ZERO
    };
    (plus, minus)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Plus,
    Minus,
}

/// One directional line: `100 * Wilder(DM) / ATR`.
#[derive(Debug, Clone)]
struct DirectionalLine {
    state: IndicatorState,
    side: Side,
    atr: Atr,
    movement: WilderMa,
    prev_bar: Option<Bar>,
}

impl DirectionalLine {
    fn new(name: &'static str, side: Side, length: usize) -> Result<Self> {
        check_length(name, length)?;
        Ok(Self {
            state: IndicatorState::new(name),
            side,
            atr: Atr::new(length)?,
            movement: WilderMa::new(length)?,
            prev_bar: None,
        })
    }

    fn set_length(&mut self, length: usize) -> Result<()> {
        check_length(self.state.name(), length)?;
        self.atr.set_length(length)?;
        self.movement.set_length(length)?;
        self.reset();
        Ok(())
    }

    fn process(&mut self, input: &InputValue) -> IndicatorValue {
        let Some(bar) = input.as_bar() else {
            return self.state.empty(input);
        };
        let atr = self.atr.process(input);

        let kind = match self.prev_bar {
            Some(prev) => {
                let (plus, minus) = directional_movement(&bar, &prev);
                let dm = match self.side {
                    Side::Plus => plus,
                    Side::Minus => minus,
                };
                let smoothed = self
                    .movement
                    .process(&InputValue::price(dm, input.time, input.is_final));
                match (smoothed.as_decimal(), atr.as_decimal()) {
                    (Some(_), Some(range)) if range.is_zero() => ValueKind::Scalar(Decimal::ZERO),
                    (Some(dm), Some(range)) => ValueKind::Scalar(dec!(100) * dm / range),
                    _ => ValueKind::Empty,
                }
            }
            None => ValueKind::Empty,
        };

        if input.is_final {
            self.prev_bar = Some(bar);
        }
        let formed = self.movement.is_formed() && self.atr.is_formed();
        self.state.complete(input, kind, formed)
    }

    fn reset(&mut self) {
        self.atr.reset();
        self.movement.reset();
        self.prev_bar = None;
        self.state.reset();
    }

    fn num_values_to_initialize(&self) -> usize {
        // movement starts on the second bar
        self.movement.num_values_to_initialize() + 1
    }
}

macro_rules! directional_line {
    ($(#[$doc:meta])* $name:ident, $label:literal, $side:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name(DirectionalLine);

        impl $name {
            pub const NAME: &'static str = $label;

            pub fn new(length: usize) -> Result<Self> {
                DirectionalLine::new(Self::NAME, $side, length).map(Self)
            }

            pub fn length(&self) -> usize {
                self.0.movement.length()
            }

            pub fn set_length(&mut self, length: usize) -> Result<()> {
                self.0.set_length(length)
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
                self.0.num_values_to_initialize()
            }
        }
    };
}

directional_line!(
    /// Positive directional indicator (+DI).
    DiPlus,
    "DI+",
    Side::Plus
);
directional_line!(
    /// Negative directional indicator (-DI).
    DiMinus,
    "DI-",
    Side::Minus
);

/// Directional index: +DI and -DI in parallel plus the derived DX line,
/// `100 * |+DI - -DI| / (+DI + -DI)` (0 when both are zero).
#[derive(Debug, Clone)]
pub struct DirectionalIndex {
    state: IndicatorState,
    plus: DiPlus,
    minus: DiMinus,
    dx: Line,
}

impl DirectionalIndex {
    pub const NAME: &'static str = "DX";

    pub fn new(length: usize) -> Result<Self> {
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            plus: DiPlus::new(length)?,
            minus: DiMinus::new(length)?,
            dx: Line::new("DX"),
        })
    }

    pub fn length(&self) -> usize {
        self.plus.length()
    }

    pub fn set_length(&mut self, length: usize) -> Result<()> {
        self.plus.set_length(length)?;
        self.minus.set_length(length)?;
        debug!(indicator = Self::NAME, length, "length changed");
        self.reset();
        Ok(())
    }

    pub fn plus(&self) -> &DiPlus {
        &self.plus
    }

    pub fn minus(&self) -> &DiMinus {
        &self.minus
    }

    /// Key of the DX entry in this indicator's composite output.
    pub fn dx_line(&self) -> IndicatorId {
        self.dx.id()
    }
}

fn dx_of(plus: Decimal, minus: Decimal) -> Decimal {
    let sum = plus + minus;
    if sum.is_zero() {
        Decimal::ZERO
    } else {
        dec!(100) * (plus - minus).abs() / sum
    }
}

impl Indicator for DirectionalIndex {
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
        let (plus_id, minus_id) = (self.plus.id(), self.minus.id());
        let mut values = process_children(
            CompositeMode::Parallel,
            &mut [&mut self.plus, &mut self.minus],
            input,
        );
        let dx = match (values.get(plus_id), values.get(minus_id)) {
            (Some(p), Some(m)) => p
                .as_decimal()
                .zip(m.as_decimal())
                .map(|(p, m)| dx_of(p, m)),
            _ => None,
        };
        let formed = self.plus.is_formed() && self.minus.is_formed();
        self.dx.insert(&mut values, input, dx, formed);
        self.state.complete(input, ValueKind::Composite(values), formed)
    }

    fn reset(&mut self) {
        self.plus.reset();
        self.minus.reset();
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
            self.plus.num_values_to_initialize(),
            self.minus.num_values_to_initialize(),
        ])
    }
}

/// Average directional index: the DX line smoothed with Wilder's average.
#[derive(Debug, Clone)]
pub struct Adx {
    state: IndicatorState,
    dx: DirectionalIndex,
    smoothing: WilderMa,
}

impl Adx {
    pub const NAME: &'static str = "ADX";

    pub fn new(length: usize) -> Result<Self> {
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            dx: DirectionalIndex::new(length)?,
            smoothing: WilderMa::new(length)?,
        })
    }

    pub fn length(&self) -> usize {
        self.smoothing.length()
    }

    pub fn set_length(&mut self, length: usize) -> Result<()> {
        self.dx.set_length(length)?;
        self.smoothing.set_length(length)?;
        self.reset();
        Ok(())
    }

    pub fn directional_index(&self) -> &DirectionalIndex {
        &self.dx
    }

    /// Key of the smoothed ADX entry in this indicator's composite output.
    pub fn adx_line(&self) -> IndicatorId {
        self.smoothing.id()
    }
}

impl Indicator for Adx {
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
        let dx_value = self.dx.process(input);
        let line = dx_value.decimal_of(self.dx.dx_line());
        let adx = chain(self.dx.is_formed(), line, &mut self.smoothing, input);

        let mut values = CompositeValue::with_capacity(2);
        values.insert(self.dx.id(), dx_value);
        values.insert(self.smoothing.id(), adx);
        let formed = self.smoothing.is_formed();
        self.state.complete(input, ValueKind::Composite(values), formed)
    }

    fn reset(&mut self) {
        self.dx.reset();
        self.smoothing.reset();
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
            self.dx.num_values_to_initialize(),
            self.smoothing.num_values_to_initialize(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    #[test]
    fn test_up_move_wins() {
        let prev = hlc(0, dec!(10), dec!(8), dec!(9));
        let cur = hlc(1, dec!(13), dec!(7), dec!(12));
        // up 3, down 1
        assert_eq!(directional_movement(&cur, &prev), (dec!(3), dec!(0)));
    }

    #[test]
    fn test_down_move_wins() {
        let prev = hlc(0, dec!(10), dec!(8), dec!(9));
        let cur = hlc(1, dec!(10.5), dec!(5), dec!(6));
        assert_eq!(directional_movement(&cur, &prev), (dec!(0), dec!(3)));
    }

    #[test]
    fn test_inside_bar_and_tie_are_zero() {
        let prev = hlc(0, dec!(10), dec!(8), dec!(9));
        let inside = hlc(1, dec!(9.5), dec!(8.5), dec!(9));
        assert_eq!(directional_movement(&inside, &prev), (dec!(0), dec!(0)));
        let outside_tie = hlc(1, dec!(11), dec!(7), dec!(9));
        assert_eq!(directional_movement(&outside_tie, &prev), (dec!(0), dec!(0)));
    }

    #[test]
    fn test_di_lines_exclusive_on_trend() {
        let mut plus = DiPlus::new(2).unwrap();
        let mut minus = DiMinus::new(2).unwrap();
        let bars = [
            hlc(0, dec!(10), dec!(8), dec!(9)),
            hlc(1, dec!(12), dec!(9), dec!(11)),
            hlc(2, dec!(14), dec!(11), dec!(13)),
        ];
        let p = feed_bars(&mut plus, &bars);
        let m = feed_bars(&mut minus, &bars);
        assert!(p[0].is_empty());
        assert!(p[2].as_decimal().unwrap() > Decimal::ZERO);
        assert_eq!(m[2].as_decimal(), Some(Decimal::ZERO));
        assert!(plus.is_formed());
        assert_eq!(plus.num_values_to_initialize(), 3);
    }

    #[test]
    fn test_di_plus_value() {
        let mut plus = DiPlus::new(1).unwrap();
        let bars = [
            hlc(0, dec!(10), dec!(8), dec!(9)),
            hlc(1, dec!(12), dec!(9), dec!(11)),
        ];
        let out = feed_bars(&mut plus, &bars);
        // DM+ 2, TR max(3, |12-9|, |9-9|) = 3
        assert_eq!(out[1].as_decimal(), Some(dec!(200) / dec!(3)));
    }

    #[test]
    fn test_di_zero_range_is_zero() {
        let mut minus = DiMinus::new(1).unwrap();
        let flat = [
            hlc(0, dec!(5), dec!(5), dec!(5)),
            hlc(1, dec!(5), dec!(5), dec!(5)),
        ];
        let out = feed_bars(&mut minus, &flat);
        assert_eq!(out[1].as_decimal(), Some(Decimal::ZERO));
    }

    #[test]
    fn test_dx_line() {
        assert_eq!(dx_of(dec!(30), dec!(10)), dec!(50));
        assert_eq!(dx_of(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);

        let mut dx = DirectionalIndex::new(1).unwrap();
        let bars = [
            hlc(0, dec!(10), dec!(8), dec!(9)),
            hlc(1, dec!(12), dec!(9), dec!(11)),
        ];
        let out = feed_bars(&mut dx, &bars);
        // +DI > 0, -DI = 0
        assert_eq!(out[1].decimal_of(dx.dx_line()), Some(dec!(100)));
        assert_eq!(out[1].decimal_of(dx.minus().id()), Some(Decimal::ZERO));
        assert!(out[1].is_formed);
    }

    #[test]
    fn test_adx_warmup() {
        let mut adx = Adx::new(2).unwrap();
        assert_eq!(adx.num_values_to_initialize(), 4);
        let bars: Vec<_> = (0..4)
            .map(|i| {
                let base = Decimal::from(10 + 2 * i);
                hlc(i, base + dec!(1), base - dec!(1), base)
            })
            .collect();
        let out = feed_bars(&mut adx, &bars);
        assert!(!out[2].is_formed);
        assert!(out[3].is_formed);
        // steady uptrend: DX is 100 every bar
        assert_eq!(out[3].decimal_of(adx.adx_line()), Some(dec!(100)));
    }
}
