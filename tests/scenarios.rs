//! End-to-end scenarios: building, merging, storing and querying digests the
//! way a query engine would.

use pgdigest::aggregate;
use pgdigest::{AggregationBuffer, Centroid, Digest, DigestConfig, Error, Query};

const ERR: f64 = 0.01;

fn relative_error(expected: f64, actual: f64) -> f64 {
    (expected - actual).abs() / expected
}

#[test]
fn uniform_values_one_at_a_time() {
    let mut buffer =
        AggregationBuffer::new(100, Query::Percentiles(vec![0.5, 0.99])).unwrap();
    for v in 1..=1000 {
        buffer.insert(f64::from(v));
    }

    let estimates = buffer.quantiles().unwrap();
    assert!((estimates[0] - 500.0).abs() < 5.0, "median {}", estimates[0]);
    assert!(
        estimates[1] >= 990.0 - 5.0 && estimates[1] <= 1000.0,
        "p99 {}",
        estimates[1]
    );
}

#[test]
fn large_uniform_distribution() {
    let mut buffer = AggregationBuffer::new(100, Query::None).unwrap();
    buffer.insert_all(&(1..=1_000_000).map(f64::from).collect::<Vec<_>>());
    let digest = buffer.finalize();

    assert_eq!(digest.quantile(0.0).unwrap(), Some(1.0));
    assert_eq!(digest.quantile(1.0).unwrap(), Some(1_000_000.0));
    for &(p, expected) in &[(0.01, 10_000.0), (0.5, 500_000.0), (0.99, 990_000.0)] {
        let estimate = digest.quantile(p).unwrap().unwrap();
        assert!(
            relative_error(expected, estimate) < ERR,
            "p{p}: expected {expected}, got {estimate}"
        );
    }
}

#[test]
fn skewed_distribution() {
    let mut buffer = AggregationBuffer::new(100, Query::None).unwrap();
    buffer.insert_all(&(1..=600_000).map(f64::from).collect::<Vec<_>>());
    buffer.insert_repeated(1_000_000.0, 400_000).unwrap();

    for &(p, expected) in &[(0.01, 10_000.0), (0.1, 100_000.0), (0.25, 250_000.0)] {
        let estimate = buffer.quantile(p).unwrap().unwrap();
        assert!(
            relative_error(expected, estimate) < ERR,
            "p{p}: expected {expected}, got {estimate}"
        );
    }
    assert_eq!(buffer.quantile(0.99).unwrap(), Some(1_000_000.0));

    let rank = buffer.quantile_of(300_000.0).unwrap();
    assert!((rank - 0.3).abs() < ERR, "rank {rank}");
    // the repeated value sits in the coarse middle of the digest
    let rank = buffer.quantile_of(1_000_000.0).unwrap();
    assert!((rank - 0.8).abs() < 0.05, "rank {rank}");
}

#[test]
fn generated_single_value_digest() {
    let digest = Digest::generate(50, 7.0, 1_000_000).unwrap();
    assert_eq!(digest.count(), 1_000_000);
    assert!(digest.centroids().len() <= 10 * 50);
    assert_eq!(digest.quantile(0.5).unwrap(), Some(7.0));
}

#[test]
fn legacy_digest_recovers_mean() {
    let digest: Digest = "flags 0 count 4 compression 100 centroids 1 (20.0, 4)"
        .parse()
        .unwrap();
    assert_eq!(digest.centroids()[0].mean(), 5.0);

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0i32.to_be_bytes());
    bytes.extend_from_slice(&4i64.to_be_bytes());
    bytes.extend_from_slice(&100i32.to_be_bytes());
    bytes.extend_from_slice(&1i32.to_be_bytes());
    bytes.extend_from_slice(&20.0f64.to_be_bytes());
    bytes.extend_from_slice(&4i64.to_be_bytes());
    let decoded = Digest::decode(&bytes).unwrap();
    assert_eq!(decoded, digest);
}

#[test]
fn absorbing_low_compression_digest() {
    let mut source = AggregationBuffer::new(20, Query::None).unwrap();
    source.insert_all(&(0..50_000).map(|v| f64::from(v % 977)).collect::<Vec<_>>());
    let digest = source.finalize();

    let mut buffer = AggregationBuffer::new(100, Query::None).unwrap();
    buffer.insert_all(&(0..998).map(f64::from).collect::<Vec<_>>());
    buffer.insert_digest(&digest);
    assert_eq!(buffer.count(), 50_998);
    assert!(buffer.len() < 1000);

    let stored = buffer.finalize();
    assert_eq!(stored.count(), 50_998);
    assert!(stored.centroids().len() <= 1000);
}

#[test]
fn sharded_aggregation_matches_single_pass() {
    let values: Vec<f64> = (0..200_000).map(|v| f64::from(v).sin() * 1000.0).collect();
    let config = DigestConfig::new(100, Query::Percentiles(vec![0.1, 0.5, 0.9])).unwrap();

    let mut single = AggregationBuffer::from_config(&config).unwrap();
    single.insert_all(&values);
    let expected = single.quantiles().unwrap();

    // each shard serializes its partial state, as it would between workers
    let partials: Vec<AggregationBuffer> = values
        .chunks(30_000)
        .map(|chunk| {
            let mut partial = AggregationBuffer::from_config(&config).unwrap();
            partial.insert_all(chunk);
            AggregationBuffer::decode(&partial.encode()).unwrap()
        })
        .collect();

    let mut merged = partials
        .into_iter()
        .fold(None, |state, partial| Some(aggregate::combine(state, partial)))
        .unwrap();
    assert_eq!(merged.count(), 200_000);

    // compare the estimates by their true rank
    let mut sorted = values.clone();
    sorted.sort_by(f64::total_cmp);
    let rank = |v: f64| sorted.partition_point(|&x| x < v) as f64 / sorted.len() as f64;

    let estimates = merged.quantiles().unwrap();
    for ((p, e), m) in [0.1, 0.5, 0.9].iter().zip(&expected).zip(&estimates) {
        assert!((rank(*e) - p).abs() < 0.02, "single pass p{p}: {e}");
        assert!((rank(*m) - p).abs() < 0.02, "merged p{p}: {m}");
    }
}

#[test]
fn stored_digests_reaggregate() {
    let digests: Vec<Option<Digest>> = (0..10)
        .map(|shard| {
            let mut buffer = AggregationBuffer::new(100, Query::None).unwrap();
            buffer.insert_all(&(0..10_000).map(|v| f64::from(shard * 10_000 + v)).collect::<Vec<_>>());
            let text = buffer.finalize().to_string();
            Some(text.parse().unwrap())
        })
        .collect();

    let mut state = aggregate::add_digests(None, &digests, &Query::Percentiles(vec![0.25, 0.75]))
        .unwrap()
        .unwrap();
    let estimates = aggregate::final_percentiles(Some(&mut state)).unwrap();
    assert!(relative_error(25_000.0, estimates[0]) < ERR, "{estimates:?}");
    assert!(relative_error(75_000.0, estimates[1]) < ERR, "{estimates:?}");
}

#[test]
fn errors_surface_at_the_boundary() {
    assert_eq!(
        AggregationBuffer::new(10_001, Query::None),
        Err(Error::InvalidCompression(10_001))
    );
    assert_eq!(
        AggregationBuffer::new(100, Query::Percentiles(vec![-0.5])),
        Err(Error::InvalidPercentile(-0.5))
    );
    assert_eq!(
        Digest::from_centroids(100, vec![Centroid::new(1.0, 0)]),
        Err(Error::InvalidCount(0))
    );
    assert!(matches!(
        "flags 1 count".parse::<Digest>(),
        Err(Error::Malformed(_))
    ));

    let message = Error::InvalidCompression(3).to_string();
    assert!(message.contains("[10, 10000]"), "{message}");
}
