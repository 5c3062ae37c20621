//! Quantile estimation on sorted, compacted centroids.
//!
//! Each centroid is modelled as covering a stretch of the rank axis
//! proportional to its count and centered on its mean. Neighbouring
//! centroids meet halfway between their centers, so between two means the
//! rank moves by `prev.count / 2 + next.count / 2` and values in between are
//! linearly interpolated.

use crate::centroid::Centroid;

const EPSILON: f64 = 1e-9;

/// Estimates the value at percentile `p` (`0.0 <= p <= 1.0`).
///
/// Returns `None` for an empty digest. The extremes return the first and
/// last centroid mean, and nothing is extrapolated past them.
pub fn quantile(centroids: &[Centroid], total_count: u64, p: f64) -> Option<f64> {
    let first = centroids.first()?;
    let last = centroids.last()?;
    if p <= 0.0 {
        return Some(first.mean);
    }
    if p >= 1.0 {
        return Some(last.mean);
    }

    let goal = p * total_count as f64;

    // find the centroid containing the goal rank
    let mut count = 0.0;
    let mut j = centroids.len() - 1;
    for (i, c) in centroids.iter().enumerate() {
        if count + c.count as f64 > goal {
            j = i;
            break;
        }
        count += c.count as f64;
    }
    let c = &centroids[j];

    let delta = goal - count - c.half_count();
    if delta.abs() < EPSILON {
        return Some(c.mean);
    }

    let on_the_right = delta > 0.0;
    let (prev, next) = if on_the_right {
        match centroids.get(j + 1) {
            Some(next) => {
                count += c.half_count();
                (c, next)
            }
            None => return Some(c.mean),
        }
    } else {
        match j.checked_sub(1).map(|k| &centroids[k]) {
            Some(prev) => {
                count -= prev.half_count();
                (prev, c)
            }
            None => return Some(c.mean),
        }
    };

    let slope = (next.mean - prev.mean) / (next.half_count() + prev.half_count());
    Some(prev.mean + slope * (goal - count))
}

/// Estimates the fraction of samples below `value`, the inverse of
/// [quantile].
///
/// Values below the smallest mean map to `0.0`, above the largest to `1.0`.
/// A value equal to one or more centroid means maps to the middle of their
/// combined count.
pub fn quantile_of(centroids: &[Centroid], total_count: u64, value: f64) -> Option<f64> {
    if centroids.is_empty() {
        return None;
    }
    let n = total_count as f64;

    let mut count = 0.0;
    let mut j = centroids.len();
    for (i, c) in centroids.iter().enumerate() {
        if c.mean >= value {
            j = i;
            break;
        }
        count += c.count as f64;
    }

    let Some(c) = centroids.get(j) else {
        // past the largest
        return Some(1.0);
    };

    if c.mean == value {
        let count_at_value: u64 = centroids[j..]
            .iter()
            .take_while(|c| c.mean == value)
            .map(|c| c.count)
            .sum();
        return Some((count + count_at_value as f64 / 2.0) / n);
    }

    if j == 0 {
        // past the smallest
        return Some(0.0);
    }

    // the value sits between prev.mean (at rank `count`) and c.mean
    let prev = &centroids[j - 1];
    count -= prev.half_count();

    let slope = (c.mean - prev.mean) / (c.half_count() + prev.half_count());
    let x = (value - prev.mean) / slope;

    Some((count + x) / n)
}

/// Mean of the samples between percentiles `low` and `high`.
///
/// Each centroid contributes the part of its count overlapping the rank
/// window `[low · N, high · N]`, assuming its samples are spread uniformly
/// over its stretch of the rank axis.
pub fn trimmed_mean(centroids: &[Centroid], total_count: u64, low: f64, high: f64) -> Option<f64> {
    let n = total_count as f64;
    let (lo, hi) = (low * n, high * n);

    let mut sum = 0.0;
    let mut weight = 0.0;
    let mut count = 0.0;
    for c in centroids {
        let start = count;
        let end = count + c.count as f64;
        count = end;

        if end <= lo {
            continue;
        }
        if start >= hi {
            break;
        }

        let part = end.min(hi) - start.max(lo);
        sum += c.mean * part;
        weight += part;
    }

    (weight > 0.0).then(|| sum / weight)
}
