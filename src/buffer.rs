use tracing::{debug, trace};

use crate::centroid::Centroid;
use crate::config::{buffer_size, check_compression, check_percentile, DigestConfig, Query};
use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::{compactor, generate, quantile};

/// Mutable working state of one ongoing aggregation.
///
/// New samples are appended as single-sample centroids to an unsorted tail
/// behind the compacted prefix. When the buffer reaches `10 × compression`
/// centroids it is compacted in place, so the sort cost is paid once per
/// buffer fill rather than once per insert.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationBuffer {
    pub(crate) compression: u32,
    pub(crate) count: u64,
    pub(crate) compactions: u32,
    pub(crate) centroids: Vec<Centroid>,
    /// Length of the sorted, merged prefix of `centroids`.
    pub(crate) compacted: usize,
    pub(crate) query: Query,
}

impl AggregationBuffer {
    pub fn new(compression: u32, query: Query) -> Result<Self> {
        check_compression(i64::from(compression))?;
        query.validate()?;
        Ok(Self {
            compression,
            count: 0,
            compactions: 0,
            centroids: Vec::with_capacity(buffer_size(compression)),
            compacted: 0,
            query,
        })
    }

    pub fn from_config(config: &DigestConfig) -> Result<Self> {
        Self::new(config.compression, config.query.clone())
    }

    /// Total number of samples.
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn compression(&self) -> u32 {
        self.compression
    }

    /// Number of compactions performed so far.
    #[inline]
    pub fn compactions(&self) -> u32 {
        self.compactions
    }

    #[inline]
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Number of centroids currently held, compacted or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    #[inline]
    pub fn is_compacted(&self) -> bool {
        self.compacted == self.centroids.len()
    }

    /// Centroids in their current state; only sorted when [Self::is_compacted].
    #[inline]
    pub fn centroids(&self) -> &[Centroid] {
        &self.centroids
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        buffer_size(self.compression)
    }

    /// Adds a single sample.
    pub fn insert(&mut self, value: f64) {
        self.push(Centroid::new(value, 1));
    }

    /// Adds each of `values`.
    pub fn insert_all(&mut self, values: &[f64]) {
        for &value in values {
            self.insert(value);
        }
    }

    /// Adds a centroid of `count` samples with mean `mean`.
    pub fn insert_weighted(&mut self, mean: f64, count: u64) -> Result<()> {
        if count == 0 {
            return Err(Error::InvalidCount(0));
        }
        self.push(Centroid::new(mean, count));
        Ok(())
    }

    /// Adds `count` copies of `value`, spreading them over centroids sized to
    /// the scale function instead of one oversized centroid.
    pub fn insert_repeated(&mut self, value: f64, count: u64) -> Result<()> {
        match count {
            0 => Err(Error::InvalidCount(0)),
            1 => {
                self.insert(value);
                Ok(())
            }
            _ => {
                for c in generate::centroids(self.compression, value, count) {
                    self.push(c);
                }
                Ok(())
            }
        }
    }

    /// Absorbs all centroids of `digest`, whatever its compression.
    pub fn insert_digest(&mut self, digest: &Digest) {
        for &c in digest.centroids() {
            self.push(c);
        }
    }

    fn push(&mut self, centroid: Centroid) {
        debug_assert!(self.centroids.len() < self.capacity());
        self.centroids.push(centroid);
        self.count += centroid.count;

        // make room for the next insert
        if self.centroids.len() >= self.capacity() {
            trace!(len = self.centroids.len(), "buffer full");
            self.compact();
        }
    }

    /// Sorts and merges the centroids according to the scale function. Does
    /// nothing when there is no unsorted tail.
    pub fn compact(&mut self) {
        if self.is_compacted() {
            return;
        }
        self.check_invariants();

        let before = self.centroids.len();
        compactor::sort(&mut self.centroids, self.count);

        // alternate the scan direction to cancel out positional bias
        self.compactions += 1;
        let reverse = self.compactions % 2 == 1;
        compactor::merge(&mut self.centroids, self.compression, self.count, reverse);
        self.compacted = self.centroids.len();

        debug!(
            before,
            after = self.centroids.len(),
            count = self.count,
            reverse,
            "compacted t-digest buffer"
        );

        self.check_invariants();
        debug_assert!(self.centroids.len() < self.capacity());
    }

    /// Folds `other` into `self`.
    ///
    /// Both sides are compacted first to bound their size; the appended
    /// centroids are left unsorted until the next query or finalization.
    /// The query of `self` is kept.
    pub fn combine(&mut self, mut other: AggregationBuffer) {
        self.compact();
        other.compact();

        if self.centroids.len() + other.centroids.len() >= self.capacity() {
            for c in other.centroids {
                self.push(c);
            }
            return;
        }

        self.centroids.extend_from_slice(&other.centroids);
        self.count += other.count;
        self.compacted = 0;
        self.check_invariants();
    }

    /// Compacts and copies the centroids into an immutable [Digest].
    pub fn finalize(&mut self) -> Digest {
        self.compact();
        Digest::from_compacted(self.compression, self.count, self.centroids.clone())
    }

    /// Estimate of the value at percentile `p`.
    pub fn quantile(&mut self, p: f64) -> Result<Option<f64>> {
        let p = check_percentile(p)?;
        self.compact();
        Ok(quantile::quantile(&self.centroids, self.count, p))
    }

    /// Estimate of the fraction of samples below `value`.
    pub fn quantile_of(&mut self, value: f64) -> Option<f64> {
        self.compact();
        quantile::quantile_of(&self.centroids, self.count, value)
    }

    /// Estimates for every requested percentile, in request order. `None`
    /// when the buffer holds no samples.
    pub fn quantiles(&mut self) -> Option<Vec<f64>> {
        self.compact();
        if self.centroids.is_empty() {
            return None;
        }
        let Self {
            centroids,
            count,
            query,
            ..
        } = self;
        query
            .percentiles()
            .iter()
            .map(|&p| quantile::quantile(centroids, *count, p))
            .collect()
    }

    /// Inverse estimates for every requested value, in request order. `None`
    /// when the buffer holds no samples.
    pub fn quantiles_of(&mut self) -> Option<Vec<f64>> {
        self.compact();
        if self.centroids.is_empty() {
            return None;
        }
        self.query
            .values()
            .iter()
            .map(|&v| quantile::quantile_of(&self.centroids, self.count, v))
            .collect()
    }

    #[inline]
    pub(crate) fn check_invariants(&self) {
        debug_assert!(self.compacted <= self.centroids.len());
        debug_assert!(self.centroids.len() <= self.capacity());
        debug_assert!(self.centroids.iter().all(|c| c.count > 0));
        debug_assert_eq!(
            self.centroids.iter().map(|c| c.count).sum::<u64>(),
            self.count
        );
    }
}
