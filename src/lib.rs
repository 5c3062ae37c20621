//! Mergeable t-digest aggregate state
//!
//! A data structure for approximating the [quantile
//! function](https://en.wikipedia.org/wiki/Quantile_function) of a sample
//! distribution, shaped as an aggregate for a query engine: samples stream
//! into an [AggregationBuffer], partial buffers built over disjoint data are
//! folded with [AggregationBuffer::combine], and the result is finalized into
//! an immutable [Digest] with stable binary and text encodings.
//!
//! Centroid sizes are bounded with the k2 scale function, giving high
//! resolution at the tails and coarse resolution around the median.
//!
//! [t-digest
//! paper](https://github.com/tdunning/t-digest/blob/main/docs/t-digest-paper/histo.pdf)
//!
//! ## Example
//!
//! ```rust
//! use pgdigest::{AggregationBuffer, Digest, Query};
//!
//! let mut buffer = AggregationBuffer::new(100, Query::Percentiles(vec![0.5, 0.99])).unwrap();
//! for v in 1..=100_000 {
//!     buffer.insert(f64::from(v));
//! }
//!
//! let estimates = buffer.quantiles().unwrap();
//! let expected = 99_000.0;
//! assert!((estimates[1] - expected).abs() / expected < 0.01);
//!
//! let digest = buffer.finalize();
//! let stored = digest.encode();
//! assert_eq!(Digest::decode(&stored).unwrap(), digest);
//! ```

pub mod aggregate;
mod buffer;
mod centroid;
mod codec;
mod compactor;
mod config;
mod digest;
mod error;
mod generate;
mod quantile;
mod text;

pub use buffer::*;
pub use centroid::*;
pub use codec::{Format, FLAG_STORES_MEAN};
pub use config::*;
pub use digest::*;
pub use error::*;
