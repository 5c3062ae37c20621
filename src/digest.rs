use float_ord::FloatOrd;
use tracing::debug;

use crate::buffer::AggregationBuffer;
use crate::centroid::{total_count, Centroid};
use crate::config::{buffer_size, check_compression, check_percentile, Query};
use crate::error::{Error, Result};
use crate::{generate, quantile};

/// Finalized approximation of a sample distribution's [quantile
/// function](https://en.wikipedia.org/wiki/Quantile_function).
///
/// This is the unit of storage and exchange: an ordered sequence of
/// [Centroid]s together with the total count and the compression the
/// centroids were built with. It never changes once constructed; to keep
/// aggregating, reopen it with [Digest::to_buffer].
#[derive(Debug, Clone, PartialEq)]
pub struct Digest {
    compression: u32,
    count: u64,
    centroids: Vec<Centroid>,
}

impl Digest {
    /// Builds a digest from already merged centroids, validating them the
    /// same way a decoded digest is validated.
    pub fn from_centroids(compression: u32, mut centroids: Vec<Centroid>) -> Result<Self> {
        check_compression(i64::from(compression))?;

        if centroids.len() > buffer_size(compression) {
            return Err(Error::malformed(format!(
                "{} centroids exceed the buffer size for compression {}",
                centroids.len(),
                compression
            )));
        }
        if let Some(c) = centroids.iter().find(|c| c.count == 0) {
            return Err(Error::InvalidCount(c.count as i64));
        }

        let count = total_count(&centroids)
            .ok_or_else(|| Error::malformed("centroid counts overflow the total count"))?;

        // equal means may come in any count order after compaction
        if !centroids
            .windows(2)
            .all(|w| FloatOrd(w[0].mean) <= FloatOrd(w[1].mean))
        {
            debug!(compression, "reordering unsorted centroids");
            centroids.sort();
        }

        Ok(Self {
            compression,
            count,
            centroids,
        })
    }

    /// Digest representing `count` occurrences of `value`, built directly
    /// instead of inserting the value `count` times.
    pub fn generate(compression: u32, value: f64, count: u64) -> Result<Self> {
        check_compression(i64::from(compression))?;
        if count == 0 {
            return Err(Error::InvalidCount(0));
        }
        Ok(Self::from_compacted(
            compression,
            count,
            generate::centroids(compression, value, count),
        ))
    }

    /// Wraps centroids produced by compaction; they are trusted to be valid.
    pub(crate) fn from_compacted(compression: u32, count: u64, centroids: Vec<Centroid>) -> Self {
        let digest = Self {
            compression,
            count,
            centroids,
        };
        digest.check_invariants();
        digest
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

    #[inline]
    pub fn centroids(&self) -> &[Centroid] {
        &self.centroids
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    /// Mean of all samples.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| {
            self.centroids.iter().map(Centroid::sum).sum::<f64>() / self.count as f64
        })
    }

    /// Estimate for [quantile](https://en.wikipedia.org/wiki/Quantile) `p`.
    ///
    ///   - `p=0.0` returns the smallest centroid mean
    ///   - `p=0.5` returns the _median_
    ///   - `p=1.0` returns the largest centroid mean
    pub fn quantile(&self, p: f64) -> Result<Option<f64>> {
        let p = check_percentile(p)?;
        Ok(quantile::quantile(&self.centroids, self.count, p))
    }

    /// Estimate of the fraction of samples below `value`.
    pub fn quantile_of(&self, value: f64) -> Option<f64> {
        quantile::quantile_of(&self.centroids, self.count, value)
    }

    /// Mean of the samples between percentiles `low` and `high`.
    pub fn trimmed_mean(&self, low: f64, high: f64) -> Result<Option<f64>> {
        let low = check_percentile(low)?;
        let high = check_percentile(high)?;
        if low >= high {
            return Err(Error::InvalidPercentile(low));
        }
        Ok(quantile::trimmed_mean(&self.centroids, self.count, low, high))
    }

    /// Reopens the digest as a working buffer answering `query`.
    pub fn to_buffer(&self, query: Query) -> Result<AggregationBuffer> {
        let mut buffer = AggregationBuffer::new(self.compression, query)?;
        buffer.insert_digest(self);
        Ok(buffer)
    }

    #[inline]
    fn check_invariants(&self) {
        debug_assert!(self.centroids.len() <= buffer_size(self.compression));
        debug_assert!(self.centroids.iter().all(|c| c.count > 0));
        debug_assert_eq!(
            self.centroids.iter().map(|c| c.count).sum::<u64>(),
            self.count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_digest_holds_all_mass_at_value() {
        let digest = Digest::generate(50, 7.0, 1_000_000).unwrap();
        assert_eq!(digest.count(), 1_000_000);
        assert!(digest.centroids().len() <= 10 * 50);
        assert_eq!(digest.quantile(0.5).unwrap(), Some(7.0));
        assert_eq!(digest.quantile(0.0).unwrap(), Some(7.0));
        assert_eq!(digest.quantile(0.999).unwrap(), Some(7.0));
        assert_eq!(digest.quantile_of(7.0), Some(0.5));
        assert_eq!(digest.mean(), Some(7.0));
    }

    #[test]
    fn generate_validates_arguments() {
        assert_eq!(
            Digest::generate(5, 1.0, 10),
            Err(Error::InvalidCompression(5))
        );
        assert_eq!(Digest::generate(100, 1.0, 0), Err(Error::InvalidCount(0)));
    }

    #[test]
    fn from_centroids_validates() {
        assert_eq!(
            Digest::from_centroids(100, vec![Centroid::new(1.0, 0)]),
            Err(Error::InvalidCount(0))
        );
        assert!(matches!(
            Digest::from_centroids(10, vec![Centroid::new(1.0, 1); 101]),
            Err(Error::Malformed(_))
        ));

        let digest =
            Digest::from_centroids(10, vec![Centroid::new(2.0, 3), Centroid::new(1.0, 1)])
                .unwrap();
        assert_eq!(digest.count(), 4);
        assert_eq!(digest.centroids()[0].mean(), 1.0);

        assert!(matches!(
            Digest::from_centroids(10, vec![Centroid::new(1.0, u64::MAX), Centroid::new(2.0, 1)]),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn unsorted_input_is_ordered_by_mean_then_count() {
        let digest = Digest::from_centroids(
            10,
            vec![
                Centroid::new(2.0, 5),
                Centroid::new(1.0, 1),
                Centroid::new(2.0, 2),
            ],
        )
        .unwrap();
        let counts: Vec<_> = digest.centroids().iter().map(Centroid::count).collect();
        assert_eq!(counts, vec![1, 2, 5]);

        // sorted means keep their count order
        let kept = vec![Centroid::new(1.0, 1), Centroid::new(2.0, 5), Centroid::new(2.0, 2)];
        let digest = Digest::from_centroids(10, kept.clone()).unwrap();
        assert_eq!(digest.centroids(), &kept[..]);
    }

    #[test]
    fn quantile_rejects_out_of_range() {
        let digest = Digest::generate(100, 1.0, 10).unwrap();
        assert_eq!(digest.quantile(1.5), Err(Error::InvalidPercentile(1.5)));
        assert_eq!(digest.quantile(-0.1), Err(Error::InvalidPercentile(-0.1)));
    }

    #[test]
    fn trimmed_mean_ignores_outliers() {
        let mut buffer = AggregationBuffer::new(100, Query::None).unwrap();
        buffer.insert_all(&(1..=1000).map(f64::from).collect::<Vec<_>>());
        buffer.insert_weighted(1e9, 1).unwrap();
        let digest = buffer.finalize();

        let trimmed = digest.trimmed_mean(0.01, 0.99).unwrap().unwrap();
        assert!((trimmed - 500.0).abs() < 10.0, "trimmed mean {trimmed}");
        assert!(digest.mean().unwrap() > 1e6);
        assert_eq!(
            digest.trimmed_mean(0.5, 0.5),
            Err(Error::InvalidPercentile(0.5))
        );
    }

    #[test]
    fn reopened_digest_keeps_count() {
        let digest = Digest::generate(20, 3.0, 500).unwrap();
        let mut buffer = digest.to_buffer(Query::Percentiles(vec![0.5])).unwrap();
        assert_eq!(buffer.count(), 500);
        assert_eq!(buffer.quantiles(), Some(vec![3.0]));
    }
}
