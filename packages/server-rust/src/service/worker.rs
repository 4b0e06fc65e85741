//! Background worker for periodic and on-demand maintenance.
//!
//! Provides a generic `BackgroundWorker<R>` that processes tasks from an mpsc
//! channel via a `BackgroundRunnable`, with a periodic tick callback, and the
//! [`OperationSweeper`] that drops expired operation records on each tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::storage::OperationStore;

const TASK_CHANNEL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// BackgroundRunnable trait
// ---------------------------------------------------------------------------

/// Task handler executed by [`BackgroundWorker`].
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    type Task: Send + 'static;

    /// Process a single submitted task.
    async fn run(&mut self, task: Self::Task);

    /// Called on each tick interval. Default is a no-op.
    async fn on_tick(&mut self) {}

    /// Called once when the worker stops. Default is a no-op.
    async fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// BackgroundWorker
// ---------------------------------------------------------------------------

/// Drives a [`BackgroundRunnable`] on its own tokio task.
///
/// The loop polls submitted tasks before ticks and the shutdown signal, so
/// tasks queued before `stop()` are still run. `shutdown()` runs exactly once
/// after the loop exits.
pub struct BackgroundWorker<R: BackgroundRunnable> {
    tx: Option<mpsc::Sender<R::Task>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl<R: BackgroundRunnable> BackgroundWorker<R> {
    /// Spawns the worker loop. The first tick fires one full `tick_interval`
    /// after start.
    pub fn start(mut runnable: R, tick_interval: Duration) -> Self {
        let (tx, mut rx) = mpsc::channel::<R::Task>(TASK_CHANNEL_CAPACITY);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(tick_interval);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticks.tick().await;

            loop {
                tokio::select! {
                    biased;
                    task = rx.recv() => match task {
                        Some(t) => runnable.run(t).await,
                        None => break,
                    },
                    _ = ticks.tick() => runnable.on_tick().await,
                    _ = &mut shutdown_rx => break,
                }
            }

            runnable.shutdown().await;
        });

        Self {
            tx: Some(tx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Submit a task to the worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has been stopped.
    pub async fn submit(&self, task: R::Task) -> anyhow::Result<()> {
        match &self.tx {
            Some(tx) => tx
                .send(task)
                .await
                .map_err(|_| anyhow::anyhow!("worker channel closed")),
            None => Err(anyhow::anyhow!("worker not running")),
        }
    }

    /// Signal shutdown and wait for the worker task to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

// ---------------------------------------------------------------------------
// OperationSweeper
// ---------------------------------------------------------------------------

/// On-demand requests to the [`OperationSweeper`].
#[derive(Debug)]
pub enum SweepTask {
    /// Purge now; the count removed is sent back if a reply channel is given.
    PurgeNow { reply: Option<oneshot::Sender<usize>> },
}

/// Removes expired operation records so memory does not wait on lazy reads.
pub struct OperationSweeper {
    operations: Arc<dyn OperationStore>,
    purged: Arc<AtomicU64>,
}

impl OperationSweeper {
    #[must_use]
    pub fn new(operations: Arc<dyn OperationStore>) -> Self {
        Self {
            operations,
            purged: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Running total of records removed, readable after the sweeper is moved
    /// into a worker.
    #[must_use]
    pub fn purged_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.purged)
    }

    async fn sweep(&self) -> usize {
        match self.operations.purge_expired().await {
            Ok(removed) => {
                self.purged.fetch_add(removed as u64, Ordering::Relaxed);
                if removed > 0 {
                    debug!(removed, "operation sweep");
                }
                removed
            }
            Err(e) => {
                warn!(error = %e, "operation sweep failed");
                0
            }
        }
    }
}

#[async_trait]
impl BackgroundRunnable for OperationSweeper {
    type Task = SweepTask;

    async fn run(&mut self, task: SweepTask) {
        match task {
            SweepTask::PurgeNow { reply } => {
                let removed = self.sweep().await;
                if let Some(reply) = reply {
                    let _ = reply.send(removed);
                }
            }
        }
    }

    async fn on_tick(&mut self) {
        self.sweep().await;
    }

    async fn shutdown(&mut self) {
        debug!(
            total_purged = self.purged.load(Ordering::Relaxed),
            "operation sweeper stopped"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
