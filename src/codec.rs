//! Block compression: LZ4 raw-block with a store-if-not-smaller policy.
//!
//! SSBF carries all sizes in its own headers, so blocks use the raw LZ4
//! block format with no embedded framing. A block that does not shrink is
//! stored verbatim and its header simply leaves the compressed flag unset.

use crate::error::Error;

/// Compress `input` into `out`, returning `(stored_len, was_compressed)`.
///
/// `out` must hold at least `input.len()` bytes. If compression fails or
/// does not make the data strictly smaller, the input is copied unchanged
/// and `was_compressed` is false. The stored length never exceeds
/// `input.len()`.
pub fn compress(input: &[u8], out: &mut [u8]) -> Result<(usize, bool), Error> {
    if out.len() < input.len() {
        return Err(Error::BufferTooSmall {
            needed: input.len(),
            capacity: out.len(),
        });
    }

    // Compressing into a slot no larger than the input makes "did not
    // shrink" and "output too small" the same failure, which is exactly
    // the fallback condition.
    match lz4_flex::block::compress_into(input, &mut out[..input.len()]) {
        Ok(n) if n < input.len() => Ok((n, true)),
        _ => {
            out[..input.len()].copy_from_slice(input);
            Ok((input.len(), false))
        }
    }
}

/// Decompress an LZ4 raw block into `out`, returning the produced length.
///
/// `out` must already be capped at the block's declared maximum
/// uncompressed size, never the whole remaining output buffer, so that a
/// corrupt block cannot spill past its slot.
pub fn decompress(input: &[u8], out: &mut [u8]) -> Result<usize, Error> {
    use lz4_flex::block::DecompressError;
    match lz4_flex::block::decompress_into(input, out) {
        Ok(n) => Ok(n),
        Err(DecompressError::OutputTooSmall { expected, .. }) => Err(Error::BufferTooSmall {
            needed: expected,
            capacity: out.len(),
        }),
        Err(_) => Err(Error::DecompressionFailure),
    }
}
