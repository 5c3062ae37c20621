//! Aggregate-function call shapes around [AggregationBuffer].
//!
//! A host query engine drives an aggregate through a transition function
//! called once per input row, an optional combine step folding partial
//! states, and a final function. The host passes `None` for NULL arguments
//! and for the state before the first non-NULL row. NULL inputs are skipped:
//! the existing state is handed back unchanged.

use crate::buffer::AggregationBuffer;
use crate::config::{DigestConfig, Query};
use crate::digest::Digest;
use crate::error::{Error, Result};

/// Transition for a single value.
pub fn add_value(
    state: Option<AggregationBuffer>,
    value: Option<f64>,
    config: &DigestConfig,
) -> Result<Option<AggregationBuffer>> {
    let Some(value) = value else {
        return Ok(state);
    };
    let mut state = state_or_new(state, config)?;
    state.insert(value);
    Ok(Some(state))
}

/// Transition for a value repeated `count` times. A NULL count means one.
pub fn add_value_count(
    state: Option<AggregationBuffer>,
    value: Option<f64>,
    count: Option<i64>,
    config: &DigestConfig,
) -> Result<Option<AggregationBuffer>> {
    let Some(value) = value else {
        return Ok(state);
    };
    let count = count.unwrap_or(1);
    let count = u64::try_from(count).map_err(|_| Error::InvalidCount(count))?;
    let mut state = state_or_new(state, config)?;
    state.insert_repeated(value, count)?;
    Ok(Some(state))
}

/// Transition for an array of values; NULL elements are skipped.
pub fn add_values(
    state: Option<AggregationBuffer>,
    values: &[Option<f64>],
    config: &DigestConfig,
) -> Result<Option<AggregationBuffer>> {
    values
        .iter()
        .try_fold(state, |state, &value| add_value(state, value, config))
}

/// Transition absorbing a stored digest. The first digest decides the
/// compression of the state.
pub fn add_digest(
    state: Option<AggregationBuffer>,
    digest: Option<&Digest>,
    query: &Query,
) -> Result<Option<AggregationBuffer>> {
    let Some(digest) = digest else {
        return Ok(state);
    };
    let mut state = match state {
        Some(state) => state,
        None => AggregationBuffer::new(digest.compression(), query.clone())?,
    };
    state.insert_digest(digest);
    Ok(Some(state))
}

/// Transition for an array of digests; NULL elements are skipped.
pub fn add_digests(
    state: Option<AggregationBuffer>,
    digests: &[Option<Digest>],
    query: &Query,
) -> Result<Option<AggregationBuffer>> {
    digests
        .iter()
        .try_fold(state, |state, digest| add_digest(state, digest.as_ref(), query))
}

/// Folds a partial state into another; with no state yet, `other` is taken
/// over as is.
pub fn combine(state: Option<AggregationBuffer>, other: AggregationBuffer) -> AggregationBuffer {
    match state {
        Some(mut state) => {
            state.combine(other);
            state
        }
        None => other,
    }
}

/// Final function returning the estimates for the requested percentiles.
pub fn final_percentiles(state: Option<&mut AggregationBuffer>) -> Option<Vec<f64>> {
    state?.quantiles()
}

/// Final function returning the estimates for the requested values.
pub fn final_percentiles_of(state: Option<&mut AggregationBuffer>) -> Option<Vec<f64>> {
    state?.quantiles_of()
}

/// Final function returning the digest itself.
pub fn final_digest(state: Option<&mut AggregationBuffer>) -> Option<Digest> {
    state.map(AggregationBuffer::finalize)
}

fn state_or_new(
    state: Option<AggregationBuffer>,
    config: &DigestConfig,
) -> Result<AggregationBuffer> {
    match state {
        Some(state) => Ok(state),
        None => AggregationBuffer::from_config(config),
    }
}
