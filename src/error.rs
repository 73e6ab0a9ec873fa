use thiserror::Error;

/// Every way an SSBF buffer can fail to encode, decode or explain.
///
/// All variants are terminal for the call that raised them: nothing is
/// retried, and no partially-filled output buffer is ever reported as
/// complete.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid magic number")]
    InvalidMagic,

    #[error("not enough input data: needed {needed} bytes, {available} available")]
    InsufficientData { needed: usize, available: usize },

    #[error("checksum mismatch in {region}")]
    ChecksumMismatch { region: &'static str },

    #[error("block decompression failed")]
    DecompressionFailure,

    #[error("header authentication failed: wrong key or modified data")]
    AuthenticationFailure,

    #[error("output buffer too small: needed {needed} bytes, capacity {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    #[error("block sequence broken: expected block {expected}, found {found}")]
    BlockSequence { expected: u16, found: u16 },

    #[error("invalid max block size {0}: must be between 1 and 65535")]
    InvalidBlockSize(usize),

    #[error("{field} too large: {actual} exceeds maximum {max}")]
    OversizedField {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("unsupported layout: {0}")]
    UnsupportedLayout(&'static str),

    #[error("operating system RNG failed")]
    Rng,
}

impl Error {
    /// Shorthand for the length check that guards every record parse.
    pub(crate) fn need(needed: usize, available: usize) -> Self {
        Error::InsufficientData { needed, available }
    }
}
