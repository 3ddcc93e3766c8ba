//! Chunked batch operations.

use std::fmt::Display;
use std::future::Future;

use tracing::{debug, error, instrument};

/// Chunk size used when callers have no better number.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Apply `operation` to `items` in contiguous chunks of `chunk_size`.
///
/// Chunks are processed one at a time, in order. The first failing chunk
/// stops the run: its index is logged and its error returned, and later
/// chunks are never started. There is no retry here; wrap `operation` in
/// `run_in_transaction` when chunks should retry.
///
/// A `chunk_size` of zero is treated as one.
///
/// # Errors
///
/// Returns the error of the first chunk that fails.
#[instrument(skip_all, fields(items = items.len(), chunk_size = chunk_size))]
pub async fn run_batched<'a, T, R, E, Op, Fut>(
    items: &'a [T],
    chunk_size: usize,
    mut operation: Op,
) -> Result<Vec<R>, E>
where
    Op: FnMut(&'a [T]) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: Display,
{
    let chunk_size = chunk_size.max(1);
    let total_chunks = items.len().div_ceil(chunk_size);
    let mut results = Vec::with_capacity(total_chunks);

    for (index, chunk) in items.chunks(chunk_size).enumerate() {
        debug!(
            chunk_index = index,
            total_chunks,
            chunk_len = chunk.len(),
            "Processing batch chunk"
        );

        match operation(chunk).await {
            Ok(result) => results.push(result),
            Err(err) => {
                error!(
                    chunk_index = index,
                    total_chunks,
                    error = %err,
                    "Batch chunk failed, abandoning remaining chunks"
                );
                return Err(err);
            }
        }
    }

    Ok(results)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[tokio::test]
    async fn test_splits_into_fixed_chunks_in_order() {
        let items: Vec<u32> = (1..=120).collect();
        let seen = RefCell::new(Vec::new());

        let results: Result<Vec<usize>, String> = run_batched(&items, 50, |chunk| {
            seen.borrow_mut().push(chunk.to_vec());
            let len = chunk.len();
            async move { Ok(len) }
        })
        .await;

        assert_eq!(results.unwrap(), vec![50, 50, 20]);
        let seen = seen.into_inner();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].first(), Some(&1));
        assert_eq!(seen[1].first(), Some(&51));
        assert_eq!(seen[2].last(), Some(&120));
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let items: Vec<u32> = (1..=120).collect();
        let mut calls = 0;

        let result: Result<Vec<()>, String> = run_batched(&items, 50, |chunk| {
            calls += 1;
            let fail = chunk.first() == Some(&51);
            async move {
                if fail {
                    Err("chunk 1 rejected".to_owned())
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert_eq!(result.unwrap_err(), "chunk 1 rejected");
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_empty_input_runs_nothing() {
        let items: Vec<u32> = Vec::new();
        let result: Result<Vec<()>, String> =
            run_batched(&items, DEFAULT_CHUNK_SIZE, |_| async { Ok(()) }).await;
        assert!(result.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_chunk_size_is_one() {
        let items = [1, 2, 3];
        let result: Result<Vec<usize>, String> =
            run_batched(&items, 0, |chunk| async move { Ok(chunk.len()) }).await;
        assert_eq!(result.unwrap(), vec![1, 1, 1]);
    }
}
