//! Execution pool
//!
//! All subscriber workers run as tasks on one dedicated multi-threaded tokio
//! runtime. A worker is a single task, so its own events are handled one at a
//! time; different workers run in parallel on up to `size` threads no matter
//! how many subscribers exist.

use std::future::Future;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::utils::error::{BrokerError, Result};

#[derive(Debug)]
pub struct ExecutionPool {
    runtime: Option<Runtime>,
    handle: Handle,
    size: usize,
}

impl ExecutionPool {
    pub const DEFAULT_SIZE: usize = 5;

    /// Start a pool with `size` threads. A size of zero is treated as one.
    pub fn new(size: usize) -> Result<Self> {
        let size = size.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(size)
            .thread_name("broker-pool")
            .enable_all()
            .build()
            .map_err(BrokerError::PoolStartup)?;
        let handle = runtime.handle().clone();
        debug!(size, "execution pool started");
        Ok(Self {
            runtime: Some(runtime),
            handle,
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(task)
    }
}

impl Drop for ExecutionPool {
    fn drop(&mut self) {
        // A plain drop would block, which panics when the pool is dropped from async code.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
