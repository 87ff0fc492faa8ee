//! Block-parallel dispatch on scoped threads

use std::num::NonZeroUsize;
use std::thread;

use crate::Error;

/// Returns number of blocks handled by each worker.
///
/// The number of workers is the smaller of the available parallelism and the work group size.
pub(crate) fn chunk_size(block_count: usize, work_group_size: usize) -> usize {
    let workers = thread::available_parallelism()
        .map_or(1, NonZeroUsize::get)
        .min(work_group_size)
        .max(1);
    block_count.div_ceil(workers).max(1)
}

/// Runs `process` on every chunk, each on its own scoped thread except the last one, which runs on
/// the calling thread.
///
/// # Errors
///
/// Returns the first error (in chunk order) returned by `process`.
pub(crate) fn for_each_chunk<T, F>(chunks: impl Iterator<Item = T>, process: F) -> Result<(), Error>
where
    T: Send,
    F: Fn(T) -> Result<(), Error> + Sync,
{
    let mut chunks: Vec<T> = chunks.collect();
    let Some(last) = chunks.pop() else {
        return Ok(());
    };
    let process = &process;
    thread::scope(|scope| {
        let handles: Vec<_> = chunks
            .into_iter()
            .map(|chunk| scope.spawn(move || process(chunk)))
            .collect();
        let inline = process(last);
        let mut result = Ok(());
        for handle in handles {
            let spawned = handle
                .join()
                .unwrap_or_else(|payload| std::panic::resume_unwind(payload));
            if result.is_ok() {
                result = spawned;
            }
        }
        result.and(inline)
    })
}
