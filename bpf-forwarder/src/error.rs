use thiserror::Error;

/// Per-crate error enum for the scheduler loop, following the workspace's
/// per-crate `thiserror` convention (§10.2). Fatal conditions are the ones
/// §7 declares fatal; [`ForwarderError::is_fatal`] is the single place that
/// decision is made so the main loop doesn't repeat the taxonomy inline.
#[derive(Debug, Error)]
pub enum ForwarderError {
    #[error("queue error: {0}")]
    Queue(#[from] bpf_queue::QueueError),
    #[error("packet pool error: {0}")]
    Pool(#[from] bpf_pool::PoolError),
    #[error("transport error: {0}")]
    Transport(#[from] bpf_transport::TransportError),
    #[error("codec error: {0}")]
    Codec(#[from] bpf_codec::CodecError),
    #[error("configuration error: {0}")]
    Config(#[from] bpf_config::ConfigError),
    #[error("unknown destination bin {0}")]
    UnknownDestination(u8),
}

impl ForwarderError {
    /// Mirrors the two fatal conditions in §7: an invariant violation or
    /// packet-pool exhaustion detected on the ingress path. Everything else
    /// is absorbed and surfaced through logs/counters only.
    pub fn is_fatal(&self) -> bool {
        match self {
            ForwarderError::Queue(bpf_queue::QueueError::InvariantViolation(_)) => true,
            ForwarderError::Pool(bpf_pool::PoolError::Exhausted) => true,
            ForwarderError::Config(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_violation_is_fatal() {
        let e = ForwarderError::Queue(bpf_queue::QueueError::InvariantViolation("x".into()));
        assert!(e.is_fatal());
    }

    #[test]
    fn transport_refusal_path_is_not_represented_as_an_error() {
        // A transport refusal (SendOutcome::Refused) never becomes a
        // ForwarderError; only genuine I/O failures do, and those aren't
        // fatal on their own.
        let e = ForwarderError::Transport(bpf_transport::TransportError::UnknownNeighbor(1));
        assert!(!e.is_fatal());
    }
}
