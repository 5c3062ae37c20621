use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MIN_COMPRESSION: u32 = 10;
pub const MAX_COMPRESSION: u32 = 10_000;
pub const DEFAULT_COMPRESSION: u32 = 100;

/// Size of the working buffer, as a multiple of the compression. Larger
/// buffers amortize the sort over more inserts at the cost of memory.
pub const BUFFER_FACTOR: usize = 10;

/// Number of centroids an aggregation buffer holds before it compacts.
#[inline]
pub fn buffer_size(compression: u32) -> usize {
    BUFFER_FACTOR * compression as usize
}

/// What a buffer is asked to answer once aggregation finishes.
///
/// A buffer serves either forward (percentile → value) or inverse
/// (value → percentile) queries, never both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Query {
    #[default]
    None,
    Percentiles(Vec<f64>),
    Values(Vec<f64>),
}

impl Query {
    pub fn validate(&self) -> Result<()> {
        if let Query::Percentiles(percentiles) = self {
            check_percentiles(percentiles)?;
        }
        Ok(())
    }

    pub fn percentiles(&self) -> &[f64] {
        match self {
            Query::Percentiles(p) => p,
            _ => &[],
        }
    }

    pub fn values(&self) -> &[f64] {
        match self {
            Query::Values(v) => v,
            _ => &[],
        }
    }
}

/// Parameters an aggregation is started with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default = "default_compression")]
    pub compression: u32,
    #[serde(default)]
    pub query: Query,
}

fn default_compression() -> u32 {
    DEFAULT_COMPRESSION
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            compression: default_compression(),
            query: Query::None,
        }
    }
}

impl DigestConfig {
    pub fn new(compression: u32, query: Query) -> Result<Self> {
        let config = Self { compression, query };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_compression(i64::from(self.compression))?;
        self.query.validate()
    }
}

pub(crate) fn check_compression(compression: i64) -> Result<u32> {
    if compression < i64::from(MIN_COMPRESSION) || compression > i64::from(MAX_COMPRESSION) {
        return Err(Error::InvalidCompression(compression));
    }
    Ok(compression as u32)
}

pub(crate) fn check_percentile(p: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&p) {
        return Err(Error::InvalidPercentile(p));
    }
    Ok(p)
}

pub(crate) fn check_percentiles(percentiles: &[f64]) -> Result<()> {
    percentiles.iter().try_for_each(|&p| check_percentile(p).map(|_| ()))
}
