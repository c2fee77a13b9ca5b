use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue full under NO_DROP policy")]
    FullNoDrop,
    #[error("bin index {0} out of range")]
    BinIndexOutOfRange(u8),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("packet pool error: {0}")]
    Pool(#[from] bpf_pool::PoolError),
    #[error("queue depths error: {0}")]
    Depths(#[from] crate::queue_depths::QueueDepthsError),
}
