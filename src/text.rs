//! Human readable digest encoding:
//!
//! ```text
//! flags 1 count 5 compression 100 centroids 2 (1.5, 2) (4.0, 3)
//! ```
//!
//! Means are written with the shortest representation that parses back to
//! the same `f64`. Text with `flags 0` stores sums instead of means and is
//! upgraded while parsing.

use std::fmt;
use std::str::FromStr;

use crate::centroid::Centroid;
use crate::codec::{check_capacity, read_centroid_count, validated, Format};
use crate::config::check_compression;
use crate::digest::Digest;
use crate::error::{Error, Result};

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "flags {} count {} compression {} centroids {}",
            Format::Current.flags(),
            self.count(),
            self.compression(),
            self.centroids().len()
        )?;
        for c in self.centroids() {
            write!(f, " ({:?}, {})", c.mean(), c.count())?;
        }
        Ok(())
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut rest = s;

        let flags = header_field(&mut rest, "flags")?;
        let format = Format::from_flags(
            i32::try_from(flags).map_err(|_| Error::malformed(format!("flags {flags}")))?,
        )?;
        let count = header_field(&mut rest, "count")?;
        let count = u64::try_from(count).map_err(|_| Error::InvalidCount(count))?;
        let compression = check_compression(header_field(&mut rest, "compression")?)?;
        let ncentroids = header_field(&mut rest, "centroids")?;
        let ncentroids = usize::try_from(ncentroids)
            .map_err(|_| Error::malformed(format!("negative centroid count {ncentroids}")))?;
        check_capacity(ncentroids, compression)?;

        let mut centroids = Vec::with_capacity(ncentroids);
        for i in 0..ncentroids {
            let (stored, count) = centroid(&mut rest)
                .ok_or_else(|| Error::malformed(format!("failed to parse centroid {i}")))?;
            let count = read_centroid_count(count)?;
            centroids.push(Centroid::new(format.mean(stored, count), count));
        }

        if !rest.trim().is_empty() {
            return Err(Error::malformed(format!(
                "unexpected trailing input {:?}",
                rest.trim()
            )));
        }

        validated(count, Digest::from_centroids(compression, centroids)?)
    }
}

/// Parses `<name> <integer>` off the front of `rest`.
fn header_field(rest: &mut &str, name: &str) -> Result<i64> {
    let malformed = || Error::malformed(format!("failed to parse t-digest header field {name:?}"));

    let s = rest.trim_start().strip_prefix(name).ok_or_else(malformed)?;
    let s = s.trim_start();
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '-' || c == '+'))
        .unwrap_or(s.len());
    let value = s[..end].parse().map_err(|_| malformed())?;
    *rest = &s[end..];
    Ok(value)
}

/// Parses ` (<mean>, <count>)` off the front of `rest`.
fn centroid(rest: &mut &str) -> Option<(f64, i64)> {
    let s = rest.trim_start().strip_prefix('(')?;
    let (body, tail) = s.split_once(')')?;
    let (mean, count) = body.split_once(',')?;
    let parsed = (mean.trim().parse().ok()?, count.trim().parse().ok()?);
    *rest = tail;
    Some(parsed)
}
