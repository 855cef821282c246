//! Error types returned by the codec.

use crate::transport::TransportError;
use thiserror::Error;

/// Errors surfaced by [`crate::codec::ReferenceCodec`] and its building blocks.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The transport adapter failed; the caller decides whether to retry,
    /// disable the path or restart the channel.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("read of {slots} slots is not a multiple of the {group_width}-slot frame group")]
    Misaligned { slots: usize, group_width: usize },

    #[error("batch of {len} samples exceeds reference capacity of {capacity}")]
    BatchTooLarge { len: usize, capacity: usize },

    #[error("frame layout needs at least one microphone channel")]
    InvalidLayout,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
