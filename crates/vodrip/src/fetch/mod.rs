//! Concurrent segment fetching: the HTTP fetcher, the retry policy and the worker pool.

pub mod fetcher;
pub mod pool;
pub mod retry;

pub use fetcher::{HttpSegmentDownloader, SegmentDownloader, base_url, segment_url};
pub use pool::{
    DroppedSegment, FetchBatch, FetchManager, FetchReport, ProgressCallback, SegmentProgress,
    WorkQueue,
};
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryAction, RetryError, RetryPolicy, retry_with_policy};
