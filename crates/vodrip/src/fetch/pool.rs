// Fetch manager: a fixed pool of workers drains a shared queue of segment tasks.
//
// At most `concurrency` transfers are in flight at once; a worker holds its admission permit
// from before the request until the segment is on disk. A non-success status drops the
// segment, exhausted retries abort the batch and remove what was already persisted.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::fetcher::{SegmentDownloader, segment_url};
use super::retry::{RetryAction, RetryError, RetryPolicy, retry_with_policy};
use crate::error::VodError;
use crate::model::{DownloadTask, TaskOutcome};
use crate::storage::ScopedStorage;

/// Reported once per persisted segment. Dropped segments never tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentProgress {
    pub index: usize,
    pub bytes: u64,
    /// Segments persisted so far, this one included
    pub completed: usize,
    /// Segments scheduled in the batch
    pub total: usize,
}

pub type ProgressCallback = Arc<dyn Fn(SegmentProgress) + Send + Sync>;

/// FIFO of pending tasks shared by all workers. Each task is handed out exactly once.
#[derive(Debug, Default)]
pub struct WorkQueue {
    tasks: Mutex<VecDeque<DownloadTask>>,
}

impl WorkQueue {
    pub fn new(tasks: Vec<DownloadTask>) -> Self {
        Self {
            tasks: Mutex::new(tasks.into()),
        }
    }

    pub fn pop(&self) -> Option<DownloadTask> {
        self.tasks.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

/// The segments of one variant to be fetched in a single batch.
#[derive(Debug, Clone)]
pub struct FetchBatch {
    pub asset_id: String,
    /// Directory URL the segment names resolve against
    pub base_url: Url,
    pub tasks: Vec<DownloadTask>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedSegment {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Indices of persisted segments, ascending
    pub persisted: Vec<usize>,
    /// Segments the origin refused, ascending by index
    pub dropped: Vec<DroppedSegment>,
    pub bytes: u64,
}

impl FetchReport {
    pub fn is_complete(&self) -> bool {
        self.dropped.is_empty()
    }
}

pub struct FetchManager {
    downloader: Arc<dyn SegmentDownloader>,
    concurrency: usize,
    /// Admission gate capacity; equal to `concurrency` outside of tests
    permits: usize,
    retry: RetryPolicy,
}

impl FetchManager {
    pub fn new(downloader: Arc<dyn SegmentDownloader>, concurrency: usize, retry: RetryPolicy) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            downloader,
            concurrency,
            permits: concurrency,
            retry,
        }
    }

    #[cfg(test)]
    fn with_admission_permits(mut self, permits: usize) -> Self {
        self.permits = permits.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetch every task of `batch` into `storage` and wait for all workers to finish.
    ///
    /// Returns [`VodError::Cancelled`] when `token` fires, or the first fatal segment failure
    /// (lowest index) after the segments persisted so far have been removed.
    pub async fn fetch(
        &self,
        batch: FetchBatch,
        storage: &ScopedStorage,
        token: &CancellationToken,
        on_progress: Option<ProgressCallback>,
    ) -> Result<FetchReport, VodError> {
        let total = batch.tasks.len();
        if total == 0 {
            debug!("Nothing to fetch");
            return Ok(FetchReport::default());
        }

        let workers = self.concurrency.min(total);
        let shared = Arc::new(Shared {
            downloader: Arc::clone(&self.downloader),
            gate: Semaphore::new(self.permits),
            queue: WorkQueue::new(batch.tasks),
            storage: storage.clone(),
            asset_id: batch.asset_id,
            base_url: batch.base_url,
            retry: self.retry.clone(),
            token: token.child_token(),
            completed: AtomicUsize::new(0),
            total,
            on_progress,
        });

        info!(segments = total, workers, "Starting segment fetch");

        let mut set = JoinSet::new();
        for worker_id in 0..workers {
            set.spawn(run_worker(Arc::clone(&shared), worker_id));
        }

        let mut outcomes = Vec::with_capacity(total);
        let mut failure = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(mut handled) => outcomes.append(&mut handled),
                Err(e) => {
                    shared.token.cancel();
                    failure.get_or_insert(VodError::Internal {
                        reason: format!("fetch worker stopped unexpectedly: {e}"),
                    });
                }
            }
        }

        outcomes.sort_by_key(TaskOutcome::index);
        let mut report = FetchReport::default();
        for outcome in outcomes {
            match outcome {
                TaskOutcome::Completed { index, bytes, .. } => {
                    report.persisted.push(index);
                    report.bytes += bytes;
                }
                TaskOutcome::Dropped { index, reason } => {
                    report.dropped.push(DroppedSegment { index, reason });
                }
                TaskOutcome::Failed {
                    error: VodError::Cancelled,
                    ..
                } => {}
                TaskOutcome::Failed { error, .. } => {
                    failure.get_or_insert(error);
                }
            }
        }

        if token.is_cancelled() {
            return Err(VodError::Cancelled);
        }

        if let Some(error) = failure {
            warn!(error = %error, persisted = report.persisted.len(), "Segment fetch aborted");
            shared
                .storage
                .remove_segments(&shared.asset_id, &report.persisted)
                .await;
            return Err(error);
        }

        if !report.dropped.is_empty() {
            info!(
                dropped = report.dropped.len(),
                "Some segments were unavailable and have been skipped"
            );
        }
        info!(
            persisted = report.persisted.len(),
            bytes = report.bytes,
            "Segment fetch finished"
        );
        Ok(report)
    }
}

struct Shared {
    downloader: Arc<dyn SegmentDownloader>,
    gate: Semaphore,
    queue: WorkQueue,
    storage: ScopedStorage,
    asset_id: String,
    base_url: Url,
    retry: RetryPolicy,
    /// Child of the caller's token; cancelled on the first fatal failure
    token: CancellationToken,
    completed: AtomicUsize,
    total: usize,
    on_progress: Option<ProgressCallback>,
}

async fn run_worker(shared: Arc<Shared>, worker_id: usize) -> Vec<TaskOutcome> {
    let mut outcomes = Vec::new();

    while !shared.token.is_cancelled() {
        let Some(task) = shared.queue.pop() else {
            break;
        };

        let outcome = shared.process(task).await;
        let fatal = matches!(outcome, TaskOutcome::Failed { .. });
        if let TaskOutcome::Failed { error, .. } = &outcome
            && !matches!(error, VodError::Cancelled)
        {
            shared.token.cancel();
        }
        outcomes.push(outcome);
        if fatal {
            break;
        }
    }

    trace!(worker_id, handled = outcomes.len(), "Fetch worker done");
    outcomes
}

impl Shared {
    async fn process(&self, task: DownloadTask) -> TaskOutcome {
        let index = task.segment_index;
        let url = match segment_url(&self.base_url, &task.segment_name) {
            Ok(url) => url,
            Err(error) => return TaskOutcome::Failed { index, error },
        };

        // held until the segment is persisted
        let _permit = tokio::select! {
            _ = self.token.cancelled() => {
                return TaskOutcome::Failed { index, error: VodError::Cancelled };
            }
            permit = self.gate.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    return TaskOutcome::Failed {
                        index,
                        error: VodError::Internal { reason: "admission gate closed".to_string() },
                    };
                }
            },
        };

        let fetched = retry_with_policy(&self.retry, &self.token, |attempt| {
            let url = &url;
            async move {
                let result = tokio::select! {
                    _ = self.token.cancelled() => return RetryAction::Fail(VodError::Cancelled),
                    result = self.downloader.download_segment(url) => result,
                };
                match result {
                    Ok(bytes) => RetryAction::Success(bytes),
                    Err(e) if e.is_retryable() => {
                        debug!(index, attempt, error = %e, "Segment transfer failed");
                        RetryAction::Retry(e)
                    }
                    Err(e) => RetryAction::Fail(e),
                }
            }
        })
        .await;

        match fetched {
            Ok(bytes) => {
                let size = bytes.len() as u64;
                match self.storage.write_segment(&self.asset_id, index, &bytes).await {
                    Ok(path) => {
                        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
                        if let Some(on_progress) = &self.on_progress {
                            on_progress(SegmentProgress {
                                index,
                                bytes: size,
                                completed,
                                total: self.total,
                            });
                        }
                        TaskOutcome::Completed {
                            index,
                            path,
                            bytes: size,
                        }
                    }
                    Err(error) => TaskOutcome::Failed { index, error },
                }
            }
            Err(err) if err.source.is_droppable() => {
                debug!(index, segment = %task.segment_name, reason = %err.source, "Dropping segment");
                TaskOutcome::Dropped {
                    index,
                    reason: err.source.to_string(),
                }
            }
            Err(err) if err.is_cancelled() => TaskOutcome::Failed {
                index,
                error: VodError::Cancelled,
            },
            Err(RetryError { source, attempts }) => TaskOutcome::Failed {
                index,
                error: VodError::SegmentFailed {
                    index,
                    name: task.segment_name,
                    attempts,
                    reason: source.to_string(),
                },
            },
        }
    }
}
