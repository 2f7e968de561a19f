//! Execution Platform
//!
//! Shared thread pool for background work and asynchronous I/O. One
//! platform is owned by a [`crate::Runtime`] and shared by all of its
//! agents.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

use crate::config::PlatformConfig;

/// Cloneable handle to the shared pool.
#[derive(Clone)]
pub struct ExecutionPlatform {
    inner: Arc<PlatformInner>,
}

struct PlatformInner {
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
}

impl ExecutionPlatform {
    pub fn new(config: &PlatformConfig) -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .max_blocking_threads(config.blocking_threads.max(1))
            .thread_name(config.thread_name.clone())
            .enable_all()
            .build()?;

        tracing::debug!(
            "[platform] Started {} worker threads ({})",
            config.worker_threads,
            config.thread_name
        );

        Ok(Self {
            inner: Arc::new(PlatformInner {
                handle: runtime.handle().clone(),
                runtime: Mutex::new(Some(runtime)),
            }),
        })
    }

    pub fn handle(&self) -> &Handle {
        &self.inner.handle
    }

    /// Run a future on the pool.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.inner.handle.spawn(future)
    }

    /// Run blocking work on the pool's blocking threads.
    pub fn spawn_blocking<F, R>(&self, task: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.inner.handle.spawn_blocking(task)
    }

    /// Block the current thread until `future` completes on the pool.
    ///
    /// Usable from any thread that is not itself driving an async task.
    /// Returns `None` if the pool shut down before the future finished.
    pub fn wait<F>(&self, future: F) -> Option<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        self.inner.handle.spawn(async move {
            let _ = tx.send(future.await);
        });
        rx.recv().ok()
    }
}

impl Drop for PlatformInner {
    fn drop(&mut self) {
        // The last handle may be dropped from a pool thread; a blocking
        // shutdown there would wait on itself.
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
            tracing::debug!("[platform] Shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn platform() -> ExecutionPlatform {
        ExecutionPlatform::new(&PlatformConfig::default()).unwrap()
    }

    #[test]
    fn test_wait_returns_output() {
        let platform = platform();
        let value = platform.wait(async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            21 * 2
        });
        assert_eq!(value, Some(42));
    }

    #[test]
    fn test_spawn_blocking_runs_off_thread() {
        let platform = platform();
        let caller = std::thread::current().id();
        let handle = platform.spawn_blocking(move || std::thread::current().id() != caller);
        let off_thread = platform.wait(handle).unwrap().unwrap();
        assert!(off_thread);
    }
}
