use rust_decimal::Decimal;
use std::collections::VecDeque;

/// Fixed-capacity FIFO window with a running sum and, when enabled through the
/// const parameters, a running minimum and maximum.
///
/// Pushing into a full window evicts the oldest value.
#[derive(Debug, Clone)]
pub struct WindowedBuffer<const MIN: bool = false, const MAX: bool = false> {
    capacity: usize,
    values: VecDeque<Decimal>,
    sum: Decimal,
    min: Option<Decimal>,
    max: Option<Decimal>,
}

/// Window tracking its minimum.
pub type MinBuffer = WindowedBuffer<true, false>;
/// Window tracking its maximum.
pub type MaxBuffer = WindowedBuffer<false, true>;

impl<const MIN: bool, const MAX: bool> WindowedBuffer<MIN, MAX> {
    /// `capacity` must be at least 1; owners validate their lengths first.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "window capacity must be > 0");
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
            sum: Decimal::ZERO,
            min: None,
            max: None,
        }
    }

    /// Appends `value`, returning the evicted element when the window was full.
    pub fn push(&mut self, value: Decimal) -> Option<Decimal> {
        let evicted = if self.is_full() {
            self.values.pop_front()
        } else {
            None
        };
        if let Some(old) = evicted {
            self.sum -= old;
        }
        self.values.push_back(value);
        self.sum += value;

        if MIN {
            self.min = match (evicted, self.min) {
                (Some(old), Some(min)) if old == min && value > old => {
                    self.values.iter().copied().min()
                }
                (_, Some(min)) => Some(min.min(value)),
                (_, None) => Some(value),
            };
        }
        if MAX {
            self.max = match (evicted, self.max) {
                (Some(old), Some(max)) if old == max && value < old => {
                    self.values.iter().copied().max()
                }
                (_, Some(max)) => Some(max.max(value)),
                (_, None) => Some(value),
            };
        }
        evicted
    }

    pub fn sum(&self) -> Decimal {
        self.sum
    }

    /// Sum of the values that would remain after one more push.
    pub fn sum_excluding_oldest(&self) -> Decimal {
        match self.next_evicted() {
            Some(oldest) => self.sum - oldest,
            None => self.sum,
        }
    }

    /// The element the next push would evict, if the window is full.
    pub fn next_evicted(&self) -> Option<Decimal> {
        if self.is_full() {
            self.values.front().copied()
        } else {
            None
        }
    }

    /// Values in insertion order, skipping the one the next push would evict.
    pub fn retained(&self) -> impl Iterator<Item = Decimal> + '_ {
        let skip = usize::from(self.is_full());
        self.values.iter().copied().skip(skip)
    }

    pub fn oldest(&self) -> Option<Decimal> {
        self.values.front().copied()
    }

    pub fn newest(&self) -> Option<Decimal> {
        self.values.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Decimal> + '_ {
        self.values.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.values.len() >= self.capacity
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.sum = Decimal::ZERO;
        self.min = None;
        self.max = None;
    }
}

impl<const MAX: bool> WindowedBuffer<true, MAX> {
    pub fn min(&self) -> Option<Decimal> {
        self.min
    }
}

impl<const MIN: bool> WindowedBuffer<MIN, true> {
    pub fn max(&self) -> Option<Decimal> {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    mod filling {
        use super::*;

        #[test]
        fn test_sum_grows_until_full() {
            let mut buf: WindowedBuffer = WindowedBuffer::new(3);
            assert_eq!(buf.push(dec!(1)), None);
            assert_eq!(buf.push(dec!(2)), None);
            assert!(!buf.is_full());
            assert_eq!(buf.sum(), dec!(3));
            assert_eq!(buf.sum_excluding_oldest(), dec!(3));
            assert_eq!(buf.next_evicted(), None);
        }
    }

    mod sliding {
        use super::*;

        #[test]
        fn test_push_evicts_oldest() {
            let mut buf: WindowedBuffer = WindowedBuffer::new(3);
            for v in [dec!(1), dec!(2), dec!(3)] {
                buf.push(v);
            }
            assert!(buf.is_full());
            assert_eq!(buf.sum_excluding_oldest(), dec!(5));
            assert_eq!(buf.push(dec!(4)), Some(dec!(1)));
            assert_eq!(buf.sum(), dec!(9));
            assert_eq!(buf.oldest(), Some(dec!(2)));
            assert_eq!(buf.newest(), Some(dec!(4)));
            assert_eq!(buf.retained().collect::<Vec<_>>(), vec![dec!(3), dec!(4)]);
        }

        #[test]
        fn test_min_rescans_when_minimum_evicted() {
            let mut buf = MinBuffer::new(3);
            for v in [dec!(1), dec!(5), dec!(3)] {
                buf.push(v);
            }
            assert_eq!(buf.min(), Some(dec!(1)));
            buf.push(dec!(4));
            assert_eq!(buf.min(), Some(dec!(3)));
            buf.push(dec!(2));
            assert_eq!(buf.min(), Some(dec!(2)));
        }

        #[test]
        fn test_max_rescans_when_maximum_evicted() {
            let mut buf = MaxBuffer::new(2);
            buf.push(dec!(9));
            buf.push(dec!(4));
            assert_eq!(buf.max(), Some(dec!(9)));
            buf.push(dec!(6));
            assert_eq!(buf.max(), Some(dec!(6)));
            buf.push(dec!(1));
            assert_eq!(buf.max(), Some(dec!(6)));
        }

        #[test]
        fn test_single_slot_window() {
            let mut buf = WindowedBuffer::<true, true>::new(1);
            buf.push(dec!(7));
            buf.push(dec!(3));
            assert_eq!(buf.min(), Some(dec!(3)));
            assert_eq!(buf.max(), Some(dec!(3)));
            assert_eq!(buf.sum(), dec!(3));
        }
    }

    #[test]
    fn test_clear() {
        let mut buf = MaxBuffer::new(2);
        buf.push(dec!(1));
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.sum(), Decimal::ZERO);
        assert_eq!(buf.max(), None);
    }
}
