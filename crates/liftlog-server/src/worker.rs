//! Background job pool.
//!
//! Work that follows a completed chat turn (transcript merge, extraction,
//! record save, export) runs here so the request that produced it never
//! waits. Jobs are routed to one of a fixed set of shards by a stable hash of
//! their key, so jobs sharing a key run one after another in submission order.
//!
//! Queues are bounded and [`WorkerPool::enqueue`] never blocks: a full shard
//! drops the job with a warning.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Default number of shards.
pub const DEFAULT_WORKERS: usize = 2;

/// Default queue depth per shard.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// A unit of background work.
pub type Job = BoxFuture<'static, ()>;

/// Configuration for the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker tasks, one queue each.
    pub workers: usize,
    /// Maximum queued jobs per worker.
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PoolConfig {
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        Self {
            workers: workers.max(1),
            queue_capacity: queue_capacity.max(1),
        }
    }
}

/// Sharded pool of background workers.
pub struct WorkerPool {
    senders: Mutex<Option<Vec<mpsc::Sender<Job>>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    /// Jobs accepted and not yet finished.
    pending: Arc<AtomicUsize>,
    config: PoolConfig,
}

impl WorkerPool {
    /// Spawn the workers. Must be called inside a tokio runtime.
    pub fn new(config: PoolConfig) -> Self {
        let config = PoolConfig::new(config.workers, config.queue_capacity);
        let pending = Arc::new(AtomicUsize::new(0));
        let mut senders = Vec::with_capacity(config.workers);
        let mut handles = Vec::with_capacity(config.workers);

        for shard in 0..config.workers {
            let (tx, rx) = mpsc::channel::<Job>(config.queue_capacity);
            senders.push(tx);
            handles.push(tokio::spawn(worker_task(shard, rx, Arc::clone(&pending))));
        }

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "Worker pool started"
        );

        Self {
            senders: Mutex::new(Some(senders)),
            handles: Mutex::new(handles),
            pending,
            config,
        }
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Shard a key is routed to.
    pub fn shard_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.config.workers as u64) as usize
    }

    /// Queue `job` on the shard for `key`.
    ///
    /// Returns `false` when the job was dropped because the shard is full or
    /// the pool has shut down.
    pub fn enqueue<F>(&self, key: &str, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shard = self.shard_for(key);
        let guard = self.senders.lock();
        let Some(sender) = guard.as_ref().and_then(|s| s.get(shard)) else {
            warn!(key = %key, "Worker pool is shut down, dropping job");
            return false;
        };

        self.pending.fetch_add(1, Ordering::SeqCst);
        match sender.try_send(Box::pin(job)) {
            Ok(()) => {
                debug!(key = %key, shard, "Job queued");
                true
            }
            Err(e) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                let reason = match e {
                    mpsc::error::TrySendError::Full(_) => "queue full",
                    mpsc::error::TrySendError::Closed(_) => "worker stopped",
                };
                warn!(key = %key, shard, reason, "Dropping background job");
                false
            }
        }
    }

    /// Jobs accepted and not yet finished.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.senders.lock().is_none()
    }

    /// Stop accepting jobs and let workers drain their queues for up to
    /// `grace`. Workers still busy after that are aborted.
    ///
    /// Returns the number of jobs that never finished.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        // Dropping the senders closes every queue once it is drained.
        self.senders.lock().take();
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        if handles.is_empty() {
            return 0;
        }

        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        let drained = tokio::time::timeout(grace, futures::future::join_all(handles)).await;

        let discarded = match drained {
            Ok(_) => 0,
            Err(_) => {
                for abort in aborts {
                    abort.abort();
                }
                self.pending.swap(0, Ordering::SeqCst)
            }
        };

        if discarded > 0 {
            warn!(discarded, "Worker pool shut down with unfinished jobs");
        } else {
            info!("Worker pool drained");
        }
        discarded
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("pending", &self.pending())
            .finish()
    }
}

async fn worker_task(shard: usize, mut rx: mpsc::Receiver<Job>, pending: Arc<AtomicUsize>) {
    debug!(shard, "Worker started");
    while let Some(job) = rx.recv().await {
        if AssertUnwindSafe(job).catch_unwind().await.is_err() {
            error!(shard, "Background job panicked");
        }
        pending.fetch_sub(1, Ordering::SeqCst);
    }
    debug!(shard, "Worker stopped");
}
