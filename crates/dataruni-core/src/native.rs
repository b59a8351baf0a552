//! Bridge from blocking engine calls to async callers

use dataruni_storage::StorageError;

/// Run one native request on the blocking pool and await its completion.
///
/// Dropping the returned future does not abort a request already running.
pub(crate) async fn run<F, T>(request: F) -> dataruni_storage::Result<T>
where
    F: FnOnce() -> dataruni_storage::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(request)
        .await
        .map_err(|e| StorageError::Interrupted(e.to_string()))?
}
