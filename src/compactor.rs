//! Sorting and merging of centroids under the k2 scale function.
//!
//! Centroids are merged while their size stays below a bound that shrinks
//! towards the tails of the distribution:
//!
//! ```text
//!   z  = proposed_count * compression / (2π · N · ln N)
//!   ok = z <= q0 (1 - q0)  &&  z <= q2 (1 - q2)
//! ```
//!
//! where `q0` and `q2` are the rank fractions at the left and right edge of
//! the merged centroid. This gives small centroids (high resolution) at both
//! tails and coarse ones around the median.

use std::f64::consts::PI;

use crate::centroid::Centroid;

/// `compression / (2π · N · ln N)`, the factor turning a centroid count into
/// its k2 size.
#[inline]
pub(crate) fn normalizer(compression: u32, total_count: u64) -> f64 {
    let n = total_count as f64;
    compression as f64 / (2.0 * PI * n * n.ln())
}

/// Whether a centroid of `proposed` samples, starting after `count_so_far`
/// samples, satisfies the scale function.
#[inline]
pub(crate) fn fits(proposed: u64, count_so_far: u64, total_count: u64, normalizer: f64) -> bool {
    let n = total_count as f64;
    let z = proposed as f64 * normalizer;
    let q0 = count_so_far as f64 / n;
    let q2 = (count_so_far + proposed) as f64 / n;
    z <= q0 * (1.0 - q0) && z <= q2 * (1.0 - q2)
}

/// Sorts centroids by `(mean, count)` and rebalances runs of equal means
/// around the median.
///
/// Below the median we want to merge small centroids first, above it the
/// order has to be flipped, because the merge pass walks from a tail towards
/// the median. Runs entirely past the median are reversed, runs crossing it
/// are split between both halves.
pub fn sort(centroids: &mut [Centroid], total_count: u64) {
    centroids.sort_unstable();

    let median = total_count / 2;
    let mut count_so_far = 0;
    let mut i = 0;
    while i < centroids.len() {
        let mean = centroids[i].mean;
        let mut end = i + 1;
        let mut next_group = count_so_far + centroids[i].count;
        while end < centroids.len() && centroids[end].mean == mean {
            next_group += centroids[end].count;
            end += 1;
        }

        // a single centroid can't be reordered
        if end - i > 1 {
            let run = &mut centroids[i..end];
            if next_group <= median {
                // entirely before the median, ascending count is right
            } else if count_so_far >= median {
                run.reverse();
            } else {
                rebalance(run, median - count_so_far, next_group - median);
            }
        }

        count_so_far = next_group;
        i = end;
    }
}

/// Splits a run of centroids (sorted by ascending count) so that roughly
/// `weight_before / weight_after` of its weight is ordered ascending at the
/// front and the rest descending at the back.
///
/// Centroids are dealt alternately to both ends; each side keeps taking
/// centroids until it moves ahead of the target ratio. Ties go to the side
/// currently filling, which keeps the output deterministic.
fn rebalance(run: &mut [Centroid], weight_before: u64, weight_after: u64) {
    let ratio = weight_before as f64 / weight_after as f64;
    let source = run.to_vec();
    let mut items = source.into_iter();

    let mut count_before = 0.0;
    let mut count_after = 0.0;
    let mut start = 0;
    let mut end = run.len();

    'fill: loop {
        loop {
            let Some(c) = items.next() else { break 'fill };
            run[start] = c;
            start += 1;
            count_before += c.count as f64;
            if count_before > count_after * ratio {
                break;
            }
        }
        loop {
            let Some(c) = items.next() else { break 'fill };
            end -= 1;
            run[end] = c;
            count_after += c.count as f64;
            if count_before < count_after * ratio {
                break;
            }
        }
    }
    debug_assert_eq!(start, end);
}

/// Single merge pass over sorted centroids, left to right, or right to left
/// when `reverse` is set. Surviving centroids stay sorted ascending.
pub fn merge(centroids: &mut Vec<Centroid>, compression: u32, total_count: u64, reverse: bool) {
    if centroids.len() < 2 {
        return;
    }

    if reverse {
        centroids.reverse();
    }

    let normalizer = normalizer(compression, total_count);
    let mut cur = 0;
    let mut count_so_far = 0;
    for i in 1..centroids.len() {
        let candidate = centroids[i];
        let proposed = centroids[cur].count + candidate.count;

        if fits(proposed, count_so_far, total_count, normalizer) {
            centroids[cur] += candidate;
        } else {
            count_so_far += centroids[cur].count;
            cur += 1;
            centroids[cur] = candidate;
        }
    }
    centroids.truncate(cur + 1);

    if reverse {
        centroids.reverse();
    }
}
