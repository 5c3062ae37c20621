use float_ord::FloatOrd;
use std::{cmp::Ordering, ops::AddAssign};

/// A group of samples represented by their combined mean and their count.
#[derive(Debug, Clone, Copy, Default)]
pub struct Centroid {
    pub(crate) mean: f64,
    pub(crate) count: u64,
}

impl PartialEq for Centroid {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Centroid {}

impl PartialOrd for Centroid {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Centroids order by mean, then by count, so that centroids sharing a mean
/// are always merged in the same order.
impl Ord for Centroid {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        FloatOrd(self.mean)
            .cmp(&FloatOrd(other.mean))
            .then(self.count.cmp(&other.count))
    }
}

impl AddAssign for Centroid {
    /// Absorbs `rhs`, keeping the mean untouched when both share it so that
    /// repeated merges of duplicates never drift.
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        let count = self.count + rhs.count;
        if self.mean != rhs.mean {
            let (lo, hi) = if self.mean < rhs.mean {
                (self.mean, rhs.mean)
            } else {
                (rhs.mean, self.mean)
            };
            // rounding must not push the mean past either input
            self.mean = ((self.mean * self.count as f64 + rhs.mean * rhs.count as f64)
                / count as f64)
                .max(lo)
                .min(hi);
        }
        self.count = count;
    }
}

/// Total sample count of `centroids`, or `None` when it does not fit the
/// signed 64-bit count of the encodings.
pub(crate) fn total_count(centroids: &[Centroid]) -> Option<u64> {
    centroids
        .iter()
        .try_fold(0u64, |total, c| total.checked_add(c.count))
        .filter(|&total| i64::try_from(total).is_ok())
}

impl Centroid {
    #[inline]
    pub fn new(mean: f64, count: u64) -> Self {
        Self { mean, count }
    }

    #[inline]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Sum of the samples this centroid stands for.
    #[inline]
    pub fn sum(&self) -> f64 {
        self.mean * self.count as f64
    }

    #[inline]
    pub(crate) fn half_count(&self) -> f64 {
        self.count as f64 / 2.0
    }
}
