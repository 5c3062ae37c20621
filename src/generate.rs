//! Closed-form construction of a digest holding one value many times.
//!
//! Rather than inserting the value `count` times and compacting over and
//! over, the centroid sizes are solved for directly: each next centroid takes
//! the largest weight `x` the k2 scale function allows.
//!
//! With `s` samples already placed, `N` in total and normalizer `n`:
//!
//! ```text
//!   x · n <= q0 (1 - q0)            q0 = s / N           (linear in x)
//!   x · n <= q2 (1 - q2)            q2 = (s + x) / N
//!   => -x² + (N - 2s - n·N²) x + (s·N - s²) >= 0      (quadratic in x)
//! ```
//!
//! The parabola opens downwards, so the quadratic holds between its roots
//! and the larger root is the bound.

use tracing::debug;

use crate::centroid::Centroid;
use crate::compactor::normalizer;

/// Centroids representing `count` copies of `value`, sorted and sized to the
/// scale function of `compression`.
pub fn centroids(compression: u32, value: f64, count: u64) -> Vec<Centroid> {
    if count <= 1 {
        return (count == 1)
            .then(|| Centroid::new(value, 1))
            .into_iter()
            .collect();
    }

    let n = count as f64;
    let normalizer = normalizer(compression, count);

    let mut centroids = Vec::new();
    let mut count_so_far: u64 = 0;
    while count_so_far < count {
        let s = count_so_far as f64;

        let q0 = s / n;
        let linear = q0 * (1.0 - q0) / normalizer;

        let b = n - 2.0 * s - normalizer * n * n;
        let c = s * n - s * s;
        let quadratic = larger_root(-1.0, b, c);

        let proposed = linear.min(quadratic).floor().max(1.0);
        let remaining = count - count_so_far;
        let weight = if proposed >= remaining as f64 {
            remaining
        } else {
            proposed as u64
        };

        centroids.push(Centroid::new(value, weight));
        count_so_far += weight;
    }

    debug!(
        compression,
        count,
        centroids = centroids.len(),
        "generated digest for repeated value"
    );
    centroids
}

/// Larger root of `a·x² + b·x + c`, or `0.0` when there is no real root.
fn larger_root(a: f64, b: f64, c: f64) -> f64 {
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return 0.0;
    }
    let sqrt = discriminant.sqrt();
    let x1 = (-b + sqrt) / (2.0 * a);
    let x2 = (-b - sqrt) / (2.0 * a);
    x1.max(x2)
}
