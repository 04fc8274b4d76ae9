use crate::{Indicator, IndicatorState};
use barflow_core::{
    CompositeValue, IndicatorError, IndicatorId, IndicatorValue, InputValue, Result, ValueKind,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a composite routes its input through its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeMode {
    /// Every child sees the same input.
    Parallel,
    /// Each child consumes the previous child's output. A child that is not
    /// yet formed, or whose output is empty, halts the chain for this input.
    Sequence,
}

impl CompositeMode {
    /// Default warm-up for children needing `counts` final inputs each.
    ///
    /// Parallel children warm up side by side; in a sequence each stage starts
    /// on the input that formed its predecessor, so consecutive stages share one.
    pub fn num_values_to_initialize<T>(self, counts: T) -> usize
    where
        T: IntoIterator<Item = usize>,
    {
        match self {
            CompositeMode::Parallel => counts.into_iter().max().unwrap_or(0),
            CompositeMode::Sequence => {
                let (sum, n) = counts
                    .into_iter()
                    .fold((0usize, 0usize), |(sum, n), c| (sum + c, n + 1));
                (sum + 1).saturating_sub(n)
            }
        }
    }
}

/// Runs `input` through `children` and collects their outputs in order.
///
/// Children skipped by a halted sequence are reported as empty values.
pub fn process_children(
    mode: CompositeMode,
    children: &mut [&mut dyn Indicator],
    input: &InputValue,
) -> CompositeValue {
    let mut values = CompositeValue::with_capacity(children.len());
    let mut current = *input;
    let mut halted = false;

    for child in children.iter_mut() {
        let id = child.id();
        if halted {
            values.insert(id, IndicatorValue::empty(id, input, child.is_formed()));
            continue;
        }

        let value = child.process(&current);
        if mode == CompositeMode::Sequence {
            if child.is_formed() && !value.is_empty() {
                current = value.to_input();
            } else {
                halted = true;
            }
        }
        values.insert(id, value);
    }

    values
}

/// Feeds an upstream stage's `value` into `next` once that stage is formed;
/// otherwise reports `next` as empty.
pub fn chain(
    upstream_formed: bool,
    value: Option<Decimal>,
    next: &mut dyn Indicator,
    input: &InputValue,
) -> IndicatorValue {
    match value {
        Some(v) if upstream_formed => next.process(&InputValue::price(v, input.time, input.is_final)),
        _ => IndicatorValue::empty(next.id(), input, next.is_formed()),
    }
}

/// An output slot computed by the composite itself rather than by a child
/// (e.g. a band or a histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    id: IndicatorId,
    name: &'static str,
}

impl Line {
    pub fn new(name: &'static str) -> Self {
        Self {
            id: IndicatorId::new(),
            name,
        }
    }

    pub fn id(&self) -> IndicatorId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Inserts this line's value (or an empty entry) into `values`.
    pub fn insert(
        &self,
        values: &mut CompositeValue,
        input: &InputValue,
        value: Option<Decimal>,
        is_formed: bool,
    ) {
        let kind = value.map_or(ValueKind::Empty, ValueKind::Scalar);
        values.insert(
            self.id,
            IndicatorValue::new(self.id, input.time, input.is_final, is_formed, kind),
        );
    }
}

/// When a generic composite counts as formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormedPolicy {
    AllChildren,
    /// Formed once the designated child is.
    Child(IndicatorId),
}

/// A composite over arbitrary boxed children.
#[derive(Debug)]
pub struct Composite {
    state: IndicatorState,
    mode: CompositeMode,
    children: Vec<Box<dyn Indicator>>,
    policy: FormedPolicy,
}

impl Composite {
    pub const NAME: &'static str = "Composite";

    pub fn new(mode: CompositeMode, children: Vec<Box<dyn Indicator>>) -> Result<Self> {
        if children.is_empty() {
            return Err(IndicatorError::NoChildren);
        }
        if mode == CompositeMode::Sequence {
            let upstream = &children[..children.len() - 1];
            if let Some((index, child)) = upstream.iter().enumerate().find(|(_, c)| !c.emits_scalar()) {
                return Err(IndicatorError::UnchainableStage {
                    index,
                    name: child.name(),
                });
            }
        }
        Ok(Self {
            state: IndicatorState::new(Self::NAME),
            mode,
            children,
            policy: FormedPolicy::AllChildren,
        })
    }

    pub fn parallel(children: Vec<Box<dyn Indicator>>) -> Result<Self> {
        Self::new(CompositeMode::Parallel, children)
    }

    pub fn sequence(children: Vec<Box<dyn Indicator>>) -> Result<Self> {
        Self::new(CompositeMode::Sequence, children)
    }

    pub fn with_formed_policy(mut self, policy: FormedPolicy) -> Result<Self> {
        if let FormedPolicy::Child(id) = policy {
            if self.position(id).is_none() {
                return Err(IndicatorError::UnknownChild(id));
            }
        }
        self.policy = policy;
        Ok(self)
    }

    pub fn mode(&self) -> CompositeMode {
        self.mode
    }

    pub fn children(&self) -> &[Box<dyn Indicator>] {
        &self.children
    }

    pub fn child(&self, id: IndicatorId) -> Option<&dyn Indicator> {
        self.position(id).map(|i| self.children[i].as_ref())
    }

    fn position(&self, id: IndicatorId) -> Option<usize> {
        self.children.iter().position(|c| c.id() == id)
    }

    fn children_formed(&self) -> bool {
        match self.policy {
            FormedPolicy::AllChildren => self.children.iter().all(|c| c.is_formed()),
            FormedPolicy::Child(id) => self.child(id).is_some_and(|c| c.is_formed()),
        }
    }
}

impl Indicator for Composite {
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
        let mut refs: Vec<&mut dyn Indicator> = self
            .children
            .iter_mut()
            .map(|c| c.as_mut() as &mut dyn Indicator)
            .collect();
        let values = process_children(self.mode, &mut refs, input);
        let formed = self.children_formed();
        self.state.complete(input, ValueKind::Composite(values), formed)
    }

    fn reset(&mut self) {
        for child in &mut self.children {
            child.reset();
        }
        self.state.reset();
    }

    fn is_formed(&self) -> bool {
        self.state.is_formed()
    }

    fn emits_scalar(&self) -> bool {
        false
    }

    fn num_values_to_initialize(&self) -> usize {
        let counts = self.children.iter().map(|c| c.num_values_to_initialize());
        match self.policy {
            FormedPolicy::AllChildren => self.mode.num_values_to_initialize(counts),
            FormedPolicy::Child(id) => {
                let upto = self.position(id).map_or(self.children.len(), |i| i + 1);
                match self.mode {
                    CompositeMode::Parallel => self.children[upto - 1].num_values_to_initialize(),
                    CompositeMode::Sequence => self.mode.num_values_to_initialize(counts.take(upto)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bollinger::BollingerBands;
    use crate::sma::Sma;
    use crate::testing::*;
    use rust_decimal_macros::dec;

    fn boxed_sma(len: usize) -> Box<dyn Indicator> {
        Box::new(Sma::new(len).unwrap())
    }

    #[test]
    fn test_warmup_formulas() {
        assert_eq!(CompositeMode::Parallel.num_values_to_initialize([3, 5, 2]), 5);
        assert_eq!(CompositeMode::Sequence.num_values_to_initialize([3, 5, 2]), 8);
        assert_eq!(CompositeMode::Sequence.num_values_to_initialize([4]), 4);
        assert_eq!(CompositeMode::Parallel.num_values_to_initialize(Vec::new()), 0);
    }

    #[test]
    fn test_requires_children() {
        assert_eq!(
            Composite::parallel(Vec::new()).unwrap_err(),
            IndicatorError::NoChildren
        );
    }

    #[test]
    fn test_sequence_rejects_multi_line_upstream() {
        let bands: Box<dyn Indicator> = Box::new(BollingerBands::new(2, dec!(2)).unwrap());
        let err = Composite::sequence(vec![bands, boxed_sma(2)]).unwrap_err();
        assert_eq!(
            err,
            IndicatorError::UnchainableStage {
                index: 0,
                name: BollingerBands::NAME
            }
        );

        // a multi-line indicator may still close a sequence or sit in a parallel set
        let bands: Box<dyn Indicator> = Box::new(BollingerBands::new(2, dec!(2)).unwrap());
        let mut tail = Composite::sequence(vec![boxed_sma(2), bands]).unwrap();
        assert_eq!(tail.num_values_to_initialize(), 3);
        for i in 0..3 {
            tail.process(&final_price(i, dec!(5)));
        }
        assert!(tail.is_formed());

        let bands: Box<dyn Indicator> = Box::new(BollingerBands::new(2, dec!(2)).unwrap());
        assert!(Composite::parallel(vec![bands, boxed_sma(2)]).is_ok());
    }

    #[test]
    fn test_parallel_children_see_same_input() {
        let mut composite = Composite::parallel(vec![boxed_sma(1), boxed_sma(2)]).unwrap();
        let ids: Vec<_> = composite.children().iter().map(|c| c.id()).collect();

        composite.process(&final_price(0, dec!(2)));
        let out = composite.process(&final_price(1, dec!(4)));
        assert_eq!(out.decimal_of(ids[0]), Some(dec!(4)));
        assert_eq!(out.decimal_of(ids[1]), Some(dec!(3)));
        assert!(out.is_formed);
        assert_eq!(composite.num_values_to_initialize(), 2);
    }

    #[test]
    fn test_sequence_halts_until_upstream_forms() {
        let mut composite = Composite::sequence(vec![boxed_sma(3), boxed_sma(2)]).unwrap();
        let ids: Vec<_> = composite.children().iter().map(|c| c.id()).collect();
        assert_eq!(composite.num_values_to_initialize(), 4);

        let out = composite.process(&final_price(0, dec!(3)));
        assert_eq!(out.decimal_of(ids[0]), Some(dec!(1)));
        assert!(out.get(ids[1]).unwrap().is_empty());

        composite.process(&final_price(1, dec!(3)));
        let out = composite.process(&final_price(2, dec!(3)));
        // first stage forms here and feeds the second stage in the same step
        assert_eq!(out.decimal_of(ids[0]), Some(dec!(3)));
        assert_eq!(out.decimal_of(ids[1]), Some(dec!(1.5)));
        assert!(!out.is_formed);

        let out = composite.process(&final_price(3, dec!(6)));
        assert_eq!(out.decimal_of(ids[0]), Some(dec!(4)));
        assert_eq!(out.decimal_of(ids[1]), Some(dec!(3.5)));
        assert!(out.is_formed);
    }

    #[test]
    fn test_designated_child_policy() {
        let fast = boxed_sma(1);
        let fast_id = fast.id();
        let mut composite = Composite::parallel(vec![fast, boxed_sma(5)])
            .unwrap()
            .with_formed_policy(FormedPolicy::Child(fast_id))
            .unwrap();
        assert_eq!(composite.num_values_to_initialize(), 1);
        composite.process(&final_price(0, dec!(1)));
        assert!(composite.is_formed());

        let stranger = IndicatorId::new();
        let err = Composite::parallel(vec![boxed_sma(1)])
            .unwrap()
            .with_formed_policy(FormedPolicy::Child(stranger))
            .unwrap_err();
        assert_eq!(err, IndicatorError::UnknownChild(stranger));
    }

    #[test]
    fn test_reset_cascades() {
        let mut composite = Composite::parallel(vec![boxed_sma(1)]).unwrap();
        composite.process(&final_price(0, dec!(1)));
        assert!(composite.children()[0].is_formed());
        composite.reset();
        assert!(!composite.is_formed());
        assert!(!composite.children()[0].is_formed());
    }

    #[test]
    fn test_preview_leaves_children_untouched() {
        let mut composite = Composite::sequence(vec![boxed_sma(2), boxed_sma(2)]).unwrap();
        for i in 0..3 {
            composite.process(&final_price(i, dec!(10)));
        }
        let before = format!("{composite:?}");
        composite.process(&preview_price(3, dec!(50)));
        assert_eq!(format!("{composite:?}"), before);
    }
}
