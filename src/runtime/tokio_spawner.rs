//! Tokio runtime spawner implementation.

use std::future::Future;
use std::io;

use parking_lot::Mutex;
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

/// Spawns futures on a tokio runtime, optionally owning that runtime.
pub struct TokioSpawner {
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
}

impl TokioSpawner {
    /// Spawn onto an existing runtime owned elsewhere.
    #[must_use]
    pub const fn new(handle: Handle) -> Self {
        Self {
            handle,
            runtime: Mutex::new(None),
        }
    }

    /// Create a spawner with its own multi-threaded runtime.
    ///
    /// # Errors
    ///
    /// Fails if the runtime threads can not be created.
    pub fn with_worker_threads(worker_threads: usize, thread_name: &str) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name(thread_name)
            .enable_all()
            .build()?;
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
        })
    }

    /// Spawn `fut` on the runtime.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(fut)
    }

    /// Handle of the runtime.
    #[must_use]
    pub const fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Stop an owned runtime without waiting for its tasks. Pending tasks are
    /// dropped. Does nothing for a borrowed runtime.
    pub fn shutdown(&self) {
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
    }
}

impl Drop for TokioSpawner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TokioSpawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioSpawner")
            .field("owns_runtime", &self.runtime.lock().is_some())
            .finish()
    }
}
