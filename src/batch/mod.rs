//! Debounced storage operation batching.
//!
//! Coalesces get/set/remove calls issued within a short window into a
//! minimal number of underlying substrate calls. The first enqueue arms a
//! debounce timer; a queue reaching the configured batch size flushes
//! immediately instead.
//!
//! # Design
//!
//! A flush snapshots and clears the queue, then issues at most one merged
//! call per operation kind, in the order Get → Set → Remove. Get keys are
//! unioned and the single result is fanned back to every originating
//! caller; Set maps merge with last-write-wins per key in enqueue order;
//! Remove keys are unioned. If any merged call fails, the flush degrades to
//! replaying every original operation individually through the retry
//! executor, so a batch failure costs N independent attempts rather than an
//! all-or-nothing loss.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::quota::QuotaMonitor;
use crate::retry::RetryExecutor;
use crate::store::{Entries, KeyValueStore, StoreError};

/// Debounce window between the first enqueue and the scheduled flush.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

/// A storage operation awaiting batching.
///
/// Ownership transfers to the batcher at enqueue time; the operation is
/// consumed and discarded on flush.
#[derive(Debug, Clone)]
pub enum QueuedOperation {
    /// Fetch the given keys.
    Get {
        /// Keys to fetch.
        keys: Vec<String>,
    },
    /// Store the given entries.
    Set {
        /// Entries to store.
        entries: Entries,
    },
    /// Remove the given keys.
    Remove {
        /// Keys to remove.
        keys: Vec<String>,
    },
}

impl QueuedOperation {
    fn kind(&self) -> &'static str {
        match self {
            QueuedOperation::Get { .. } => "get",
            QueuedOperation::Set { .. } => "set",
            QueuedOperation::Remove { .. } => "remove",
        }
    }
}

/// Receives the result of one enqueued operation once its batch flushes.
///
/// Get operations receive the full merged result of their batch; set and
/// remove operations receive an empty map on success. Dropping the receiver
/// makes the enqueue fire-and-forget.
pub type BatchReceiver = oneshot::Receiver<Result<Entries, StoreError>>;

struct PendingOperation {
    op: QueuedOperation,
    reply: oneshot::Sender<Result<Entries, StoreError>>,
}

#[derive(Default)]
struct BatchState {
    queue: Vec<PendingOperation>,
    timer: Option<JoinHandle<()>>,
}

struct BatcherInner {
    store: Arc<dyn KeyValueStore>,
    retry: RetryExecutor,
    quota: Arc<QuotaMonitor>,
    batch_size: usize,
    debounce_window: Duration,
    state: Mutex<BatchState>,
}

/// Debounced queue coalescing storage operations.
///
/// Cheap to clone; clones share the same queue and timer.
#[derive(Clone)]
pub struct OperationBatcher {
    inner: Arc<BatcherInner>,
}

impl OperationBatcher {
    /// Create a batcher in front of the given store.
    ///
    /// `batch_size` is the queue length that forces an immediate flush;
    /// `debounce_window` is the delay after the first enqueue before a
    /// scheduled flush runs.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        retry: RetryExecutor,
        quota: Arc<QuotaMonitor>,
        batch_size: usize,
        debounce_window: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(BatcherInner {
                store,
                retry,
                quota,
                batch_size: batch_size.max(1),
                debounce_window,
                state: Mutex::new(BatchState::default()),
            }),
        }
    }

    /// Enqueue an operation for the next flush.
    ///
    /// Flushes immediately when the queue reaches the batch size; otherwise
    /// arms the debounce timer if none is pending. The returned receiver
    /// resolves when the operation's batch completes.
    pub async fn enqueue(&self, op: QueuedOperation) -> BatchReceiver {
        let (tx, rx) = oneshot::channel();
        debug!(kind = op.kind(), "Queueing storage operation");

        let full_batch = {
            let mut state = self.inner.state.lock();
            state.queue.push(PendingOperation { op, reply: tx });

            if state.queue.len() >= self.inner.batch_size {
                if let Some(timer) = state.timer.take() {
                    timer.abort();
                }
                Some(std::mem::take(&mut state.queue))
            } else {
                if state.timer.is_none() {
                    state.timer = Some(self.spawn_debounce_timer());
                }
                None
            }
        };

        if let Some(batch) = full_batch {
            self.inner.flush_batch(batch).await;
        }

        rx
    }

    /// Flush whatever is queued right now, disarming any pending timer.
    pub async fn flush(&self) {
        let batch = self.take_queue();
        self.inner.flush_batch(batch).await;
    }

    /// Flush the residual queue and disarm the timer.
    pub async fn shutdown(&self) {
        self.flush().await;
    }

    /// Number of operations currently queued.
    pub fn queued(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    fn take_queue(&self) -> Vec<PendingOperation> {
        let mut state = self.inner.state.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        std::mem::take(&mut state.queue)
    }

    fn spawn_debounce_timer(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.debounce_window).await;
            let batch = {
                let mut state = inner.state.lock();
                state.timer = None;
                std::mem::take(&mut state.queue)
            };
            inner.flush_batch(batch).await;
        })
    }
}

impl BatcherInner {
    async fn flush_batch(&self, batch: Vec<PendingOperation>) {
        if batch.is_empty() {
            return;
        }

        info!(operations = batch.len(), "Flushing batched storage operations");

        let get_keys = union_keys(batch.iter().filter_map(|p| match &p.op {
            QueuedOperation::Get { keys } => Some(keys),
            _ => None,
        }));
        let set_entries = merge_entries(batch.iter().filter_map(|p| match &p.op {
            QueuedOperation::Set { entries } => Some(entries),
            _ => None,
        }));
        let remove_keys = union_keys(batch.iter().filter_map(|p| match &p.op {
            QueuedOperation::Remove { keys } => Some(keys),
            _ => None,
        }));

        match self
            .run_merged(&get_keys, set_entries, &remove_keys)
            .await
        {
            Ok(get_result) => {
                let flushed = batch.len();
                for pending in batch {
                    let reply = match pending.op {
                        QueuedOperation::Get { .. } => Ok(get_result.clone()),
                        _ => Ok(Entries::new()),
                    };
                    let _ = pending.reply.send(reply);
                }

                debug!(operations = flushed, "Batched operations flushed");
                self.quota.usage(true).await;
            }
            Err(err) => {
                warn!(error = %err, "Merged batch failed, replaying operations individually");
                self.replay_individually(batch).await;
            }
        }
    }

    /// Issue the merged calls in the order Get → Set → Remove.
    ///
    /// Returns the merged get result (empty when the batch held no gets).
    async fn run_merged(
        &self,
        get_keys: &[String],
        set_entries: Entries,
        remove_keys: &[String],
    ) -> Result<Entries, StoreError> {
        let mut get_result = Entries::new();

        if !get_keys.is_empty() {
            get_result = self.store.get(get_keys).await?;
        }
        if !set_entries.is_empty() {
            self.store.set(set_entries).await?;
        }
        if !remove_keys.is_empty() {
            self.store.remove(remove_keys).await?;
        }

        Ok(get_result)
    }

    /// Replay every original operation on its own through the retry
    /// executor, delivering per-operation results to the callers.
    async fn replay_individually(&self, batch: Vec<PendingOperation>) {
        for pending in batch {
            let label = match pending.op {
                QueuedOperation::Get { .. } => "batched get replay",
                QueuedOperation::Set { .. } => "batched set replay",
                QueuedOperation::Remove { .. } => "batched remove replay",
            };

            let op = pending.op;
            let result = self
                .retry
                .run(label, || {
                    let op = op.clone();
                    async move {
                        match op {
                            QueuedOperation::Get { keys } => self.store.get(&keys).await,
                            QueuedOperation::Set { entries } => {
                                self.store.set(entries).await.map(|()| Entries::new())
                            }
                            QueuedOperation::Remove { keys } => {
                                self.store.remove(&keys).await.map(|()| Entries::new())
                            }
                        }
                    }
                })
                .await
                .map_err(|err| {
                    warn!(label, error = %err, "Individual replay failed");
                    StoreError::from(err)
                });

            let _ = pending.reply.send(result);
        }
    }
}

/// Union keys across operations, preserving first-seen order.
fn union_keys<'a>(groups: impl Iterator<Item = &'a Vec<String>>) -> Vec<String> {
    let mut union: Vec<String> = Vec::new();
    for keys in groups {
        for key in keys {
            if !union.contains(key) {
                union.push(key.clone());
            }
        }
    }
    union
}

/// Merge entry maps in enqueue order; later writes win per key.
fn merge_entries<'a>(groups: impl Iterator<Item = &'a Entries>) -> Entries {
    let mut merged = Entries::new();
    for entries in groups {
        for (key, value) in entries {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
