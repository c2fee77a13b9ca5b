use thiserror::Error;

/// Errors raised by the packet arena.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// No free slots in either ring. Whether this is fatal depends on the
    /// caller's context (ingress vs. synthesis) per the error handling
    /// design; this crate just reports exhaustion and lets the caller decide.
    #[error("packet pool exhausted: no free slots available")]
    Exhausted,

    /// `packet_from_index` was given an index outside the arena.
    #[error("slot index {0} out of range")]
    IndexOutOfRange(u32),

    /// A slot was referenced after its refcount reached zero.
    #[error("slot {0} is not currently allocated")]
    SlotNotAllocated(u32),

    /// Shared-memory segment or semaphore setup failed.
    #[error("shared memory error: {0}")]
    SharedMemory(String),
}
