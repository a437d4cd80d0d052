//! Shared utilities for the query client.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Spawn a background task on the current tokio runtime.
///
/// Returns `None` when called outside a runtime; the task is then not started.
pub(crate) fn spawn<F>(task: &'static str, future: F) -> Option<AbortHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => Some(handle.spawn(future).abort_handle()),
        Err(_) => {
            tracing::warn!(task, "no tokio runtime available, background task not started");
            None
        }
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
