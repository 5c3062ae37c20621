//! Binary encodings, in network byte order.
//!
//! Digest (storage / exchange):
//!
//! ```text
//!   flags        i32    FLAG_STORES_MEAN for the current format, 0 for legacy
//!   count        i64
//!   compression  i32
//!   ncentroids   i32
//!   ncentroids × { mean f64 (sum in the legacy format), count i64 }
//! ```
//!
//! Aggregation buffer (working state handed between partial aggregations):
//!
//! ```text
//!   count        i64
//!   compactions  i32
//!   compression  i32
//!   ncentroids   i32
//!   ncompacted   i32
//!   query_kind   u8     0 none, 1 percentiles, 2 values
//!   nquery       i32
//!   nquery × f64
//!   ncentroids × { mean f64, count i64 }
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use float_ord::FloatOrd;
use tracing::debug;

use crate::buffer::AggregationBuffer;
use crate::centroid::{total_count, Centroid};
use crate::config::{buffer_size, check_compression, Query};
use crate::digest::Digest;
use crate::error::{Error, Result};

/// Set when centroids store their mean; legacy digests stored the sum.
pub const FLAG_STORES_MEAN: i32 = 0x0001;

const DIGEST_HEADER_LEN: usize = 4 + 8 + 4 + 4;
const BUFFER_HEADER_LEN: usize = 8 + 4 + 4 + 4 + 4 + 1 + 4;
const CENTROID_LEN: usize = 8 + 8;

const QUERY_NONE: u8 = 0;
const QUERY_PERCENTILES: u8 = 1;
const QUERY_VALUES: u8 = 2;

/// On-disk format of a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Centroids carry the sum of their samples.
    Legacy,
    /// Centroids carry the mean of their samples.
    Current,
}

impl Format {
    pub fn from_flags(flags: i32) -> Result<Self> {
        match flags {
            0 => Ok(Format::Legacy),
            FLAG_STORES_MEAN => Ok(Format::Current),
            other => Err(Error::UnsupportedFormat(other)),
        }
    }

    pub fn flags(self) -> i32 {
        match self {
            Format::Legacy => 0,
            Format::Current => FLAG_STORES_MEAN,
        }
    }

    /// Converts the stored per-centroid value into a mean.
    #[inline]
    pub(crate) fn mean(self, stored: f64, count: u64) -> f64 {
        match self {
            Format::Legacy => stored / count as f64,
            Format::Current => stored,
        }
    }
}

impl Digest {
    /// Encodes the digest in the current format.
    pub fn encode(&self) -> Bytes {
        let mut buf =
            BytesMut::with_capacity(DIGEST_HEADER_LEN + self.centroids().len() * CENTROID_LEN);
        buf.put_i32(Format::Current.flags());
        buf.put_i64(self.count() as i64);
        buf.put_i32(self.compression() as i32);
        buf.put_i32(self.centroids().len() as i32);
        put_centroids(&mut buf, self.centroids());
        buf.freeze()
    }

    /// Decodes a digest, upgrading the legacy format on the fly.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        ensure(buf, DIGEST_HEADER_LEN, "digest header")?;

        let format = Format::from_flags(buf.get_i32())?;
        let count = read_count(buf.get_i64())?;
        let compression = check_compression(i64::from(buf.get_i32()))?;
        let ncentroids = read_len(buf.get_i32(), "centroid count")?;
        check_capacity(ncentroids, compression)?;

        let centroids = get_centroids(&mut buf, ncentroids, format)?;
        if buf.has_remaining() {
            return Err(Error::malformed(format!(
                "{} trailing bytes after digest",
                buf.remaining()
            )));
        }
        if format == Format::Legacy {
            debug!(ncentroids, "upgraded legacy t-digest format");
        }

        validated(count, Digest::from_centroids(compression, centroids)?)
    }
}

impl AggregationBuffer {
    /// Encodes the complete working state, including the unsorted tail, the
    /// requested query and the compaction counter.
    pub fn encode(&self) -> Bytes {
        let (kind, query): (u8, &[f64]) = match &self.query {
            Query::None => (QUERY_NONE, &[]),
            Query::Percentiles(p) => (QUERY_PERCENTILES, p),
            Query::Values(v) => (QUERY_VALUES, v),
        };

        let mut buf = BytesMut::with_capacity(
            BUFFER_HEADER_LEN + query.len() * 8 + self.centroids.len() * CENTROID_LEN,
        );
        buf.put_i64(self.count as i64);
        buf.put_i32(self.compactions as i32);
        buf.put_i32(self.compression as i32);
        buf.put_i32(self.centroids.len() as i32);
        buf.put_i32(self.compacted as i32);
        buf.put_u8(kind);
        buf.put_i32(query.len() as i32);
        for &q in query {
            buf.put_f64(q);
        }
        put_centroids(&mut buf, &self.centroids);
        buf.freeze()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        ensure(buf, BUFFER_HEADER_LEN, "buffer header")?;

        let count = read_count(buf.get_i64())?;
        let compactions = read_len(buf.get_i32(), "compaction count")? as u32;
        let compression = check_compression(i64::from(buf.get_i32()))?;
        let ncentroids = read_len(buf.get_i32(), "centroid count")?;
        let compacted = read_len(buf.get_i32(), "compacted count")?;
        let kind = buf.get_u8();
        let nquery = read_len(buf.get_i32(), "query length")?;

        check_capacity(ncentroids, compression)?;
        if compacted > ncentroids {
            return Err(Error::malformed(format!(
                "{compacted} compacted centroids out of {ncentroids}"
            )));
        }

        ensure(buf, nquery * 8, "query")?;
        let items: Vec<f64> = (0..nquery).map(|_| buf.get_f64()).collect();
        let query = match kind {
            QUERY_NONE if items.is_empty() => Query::None,
            QUERY_PERCENTILES => Query::Percentiles(items),
            QUERY_VALUES => Query::Values(items),
            other => {
                return Err(Error::malformed(format!(
                    "unknown query kind {other} with {nquery} items"
                )))
            }
        };

        let centroids = get_centroids(&mut buf, ncentroids, Format::Current)?;
        if buf.has_remaining() {
            return Err(Error::malformed(format!(
                "{} trailing bytes after buffer",
                buf.remaining()
            )));
        }

        let sum = total_count(&centroids)
            .ok_or_else(|| Error::malformed("centroid counts overflow the total count"))?;
        if sum != count {
            return Err(Error::malformed(format!(
                "header count {count} does not match centroid counts {sum}"
            )));
        }

        if !centroids[..compacted]
            .windows(2)
            .all(|w| FloatOrd(w[0].mean) <= FloatOrd(w[1].mean))
        {
            return Err(Error::malformed("compacted centroids are not sorted"));
        }

        let mut state = AggregationBuffer::new(compression, query)?;
        state.count = count;
        state.compactions = compactions;
        state.centroids.extend(centroids);
        state.compacted = compacted;
        // a full buffer must be merged before it can take further inserts
        if state.len() >= state.capacity() {
            state.compacted = 0;
            state.compact();
        }
        state.check_invariants();
        Ok(state)
    }
}

fn put_centroids(buf: &mut BytesMut, centroids: &[Centroid]) {
    for c in centroids {
        buf.put_f64(c.mean);
        buf.put_i64(c.count as i64);
    }
}

fn get_centroids(buf: &mut &[u8], ncentroids: usize, format: Format) -> Result<Vec<Centroid>> {
    ensure(buf, ncentroids * CENTROID_LEN, "centroids")?;
    (0..ncentroids)
        .map(|_| {
            let stored = buf.get_f64();
            let count = read_centroid_count(buf.get_i64())?;
            Ok(Centroid::new(format.mean(stored, count), count))
        })
        .collect()
}

#[inline]
fn ensure(buf: &[u8], len: usize, what: &str) -> Result<()> {
    if buf.len() < len {
        return Err(Error::malformed(format!(
            "truncated {what}: need {len} bytes, have {}",
            buf.len()
        )));
    }
    Ok(())
}

#[inline]
fn read_len(value: i32, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::malformed(format!("negative {what} {value}")))
}

#[inline]
fn read_count(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::InvalidCount(value))
}

#[inline]
pub(crate) fn read_centroid_count(value: i64) -> Result<u64> {
    match u64::try_from(value) {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(Error::InvalidCount(value)),
    }
}

pub(crate) fn check_capacity(ncentroids: usize, compression: u32) -> Result<()> {
    if ncentroids > buffer_size(compression) {
        return Err(Error::malformed(format!(
            "{ncentroids} centroids exceed the buffer size for compression {compression}"
        )));
    }
    Ok(())
}

/// Checks the decoded header count against the centroids.
pub(crate) fn validated(count: u64, digest: Digest) -> Result<Digest> {
    if digest.count() != count {
        return Err(Error::malformed(format!(
            "header count {count} does not match centroid counts {}",
            digest.count()
        )));
    }
    Ok(digest)
}
