use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unknown neighbor {0}")]
    UnknownNeighbor(u32),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame codec error: {0}")]
    Codec(#[from] bpf_codec::CodecError),
    #[error("packet pool error: {0}")]
    Pool(#[from] bpf_pool::PoolError),
    #[error("envelope too short: {0} bytes")]
    EnvelopeTooShort(usize),
    #[error("unknown envelope type tag 0x{0:02x}")]
    UnknownEnvelopeType(u8),
}
