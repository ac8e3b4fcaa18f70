//! Running summary statistics for logged scalars
use num_traits::Float;
use std::iter::{Extend, FromIterator};

/// Running mean and spread of a stream of values.
///
/// Updated one value at a time with Welford's recurrence, so no values are stored.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RunningStats<T> {
    len: u64,
    mean: T,
    /// Sum of squared deviations from the current mean.
    m2: T,
}

impl<T: Float> Default for RunningStats<T> {
    fn default() -> Self {
        Self {
            len: 0,
            mean: T::zero(),
            m2: T::zero(),
        }
    }
}

impl<T: Float> RunningStats<T> {
    /// Mean of the values seen, `None` if there are none.
    pub fn mean(&self) -> Option<T> {
        (self.len > 0).then(|| self.mean)
    }

    /// Population standard deviation, `None` with fewer than two values.
    pub fn std_dev(&self) -> Option<T> {
        if self.len < 2 {
            return None;
        }
        let n = T::from(self.len)?;
        Some((self.m2 / n).sqrt())
    }

    /// Record a value.
    pub fn push(&mut self, value: T) {
        self.len += 1;
        let n = T::from(self.len).unwrap_or_else(T::max_value);
        let delta = value - self.mean;
        self.mean = self.mean + delta / n;
        self.m2 = self.m2 + delta * (value - self.mean);
    }
}

impl<T: Float> Extend<T> for RunningStats<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        iter.into_iter().for_each(|value| self.push(value));
    }
}

impl<T: Float> FromIterator<T> for RunningStats<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut stats = Self::default();
        stats.extend(iter);
        stats
    }
}
