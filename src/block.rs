//! The block chain: fixed-size plaintext slices, each independently
//! compressed, encrypted and checksummed behind its own 8-byte header.
//!
//! Block nonces are the block number, so a data key must never encrypt two
//! files; see [`crate::crypto::DataKey`].

use byteorder::{ByteOrder, LittleEndian};

use crate::checksum::{checksum16, checksum8};
use crate::codec;
use crate::crypto::{block_nonce, stream_xor, DataKey, KEY_SIZE};
use crate::error::Error;

pub const BLOCK_HEADER_SIZE: usize = 8;

// BlockHeader flags.
pub const BLOCK_FLAG_LAST: u8 = 1;
pub const BLOCK_FLAG_COMPRESSED: u8 = 2;
pub const BLOCK_FLAG_ENCRYPTED: u8 = 4;

/// Per-block bookkeeping preceding each payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub block_no: u16,
    /// Stored (post-compress, post-encrypt) payload length.
    pub size: u16,
    /// 16-bit BSD checksum of the ciphertext payload.
    pub data_checksum: u16,
    pub flags: u8,
    pub checksum: u8,
}

impl BlockHeader {
    pub fn to_bytes(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut buf = [0u8; BLOCK_HEADER_SIZE];
        LittleEndian::write_u16(&mut buf[0..2], self.block_no);
        LittleEndian::write_u16(&mut buf[2..4], self.size);
        LittleEndian::write_u16(&mut buf[4..6], self.data_checksum);
        buf[6] = self.flags;
        buf[7] = checksum8(&buf[..BLOCK_HEADER_SIZE - 1]);
        buf
    }

    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        if data.len() < BLOCK_HEADER_SIZE {
            return Err(Error::need(BLOCK_HEADER_SIZE, data.len()));
        }
        let stored = data[BLOCK_HEADER_SIZE - 1];
        if checksum8(&data[..BLOCK_HEADER_SIZE - 1]) != stored {
            return Err(Error::ChecksumMismatch {
                region: "block header",
            });
        }
        Ok(BlockHeader {
            block_no: LittleEndian::read_u16(&data[0..2]),
            size: LittleEndian::read_u16(&data[2..4]),
            data_checksum: LittleEndian::read_u16(&data[4..6]),
            flags: data[6],
            checksum: stored,
        })
    }

    pub fn is_last(&self) -> bool {
        self.flags & BLOCK_FLAG_LAST != 0
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & BLOCK_FLAG_COMPRESSED != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & BLOCK_FLAG_ENCRYPTED != 0
    }
}

/// Encode one block into `out`: compress, encrypt in place, checksum,
/// prepend the header. Returns the emitted length (header + payload).
fn encode_block(
    data_key: &DataKey,
    block_no: u16,
    last: bool,
    plaintext: &[u8],
    out: &mut [u8],
) -> Result<usize, Error> {
    let needed = BLOCK_HEADER_SIZE + plaintext.len();
    if out.len() < needed {
        return Err(Error::BufferTooSmall {
            needed,
            capacity: out.len(),
        });
    }

    let (header_mem, body) = out[..needed].split_at_mut(BLOCK_HEADER_SIZE);

    let (stored, compressed) = codec::compress(plaintext, body)?;
    let body = &mut body[..stored];

    let nonce = block_nonce(block_no);
    stream_xor(data_key.as_bytes(), &nonce, body);

    let mut flags = BLOCK_FLAG_ENCRYPTED;
    if compressed {
        flags |= BLOCK_FLAG_COMPRESSED;
    }
    if last {
        flags |= BLOCK_FLAG_LAST;
    }

    let header = BlockHeader {
        block_no,
        size: stored as u16,
        data_checksum: checksum16(body),
        flags,
        checksum: 0,
    };
    header_mem.copy_from_slice(&header.to_bytes());

    Ok(BLOCK_HEADER_SIZE + stored)
}

/// Segment `input` into ⌈N/B⌉ blocks (one empty block for N = 0) and emit
/// the full chain into `out`. Returns the chain's total byte length.
pub(crate) fn encode_blocks(
    data_key: &DataKey,
    max_block_size: usize,
    input: &[u8],
    out: &mut [u8],
) -> Result<usize, Error> {
    if input.is_empty() {
        return encode_block(data_key, 0, true, &[], out);
    }

    let last_index = (input.len() - 1) / max_block_size;
    let mut written = 0usize;
    for (i, chunk) in input.chunks(max_block_size).enumerate() {
        written += encode_block(
            data_key,
            i as u16,
            i == last_index,
            chunk,
            &mut out[written..],
        )?;
    }
    Ok(written)
}

/// Decode one block's payload into `out`, returning the produced length.
///
/// The ciphertext checksum is verified before any cipher or decompression
/// work. `out` is the caller's remaining output span; the decompression
/// destination is additionally capped at `max_block_size`.
fn decode_block(
    key: &[u8; KEY_SIZE],
    header: &BlockHeader,
    payload: &[u8],
    max_block_size: usize,
    out: &mut [u8],
    scratch: &mut Vec<u8>,
) -> Result<usize, Error> {
    if checksum16(payload) != header.data_checksum {
        return Err(Error::ChecksumMismatch {
            region: "block payload",
        });
    }

    scratch.clear();
    scratch.extend_from_slice(payload);

    if header.is_encrypted() {
        let nonce = block_nonce(header.block_no);
        stream_xor(key, &nonce, scratch);
    }

    if header.is_compressed() {
        let cap = max_block_size.min(out.len());
        match codec::decompress(scratch, &mut out[..cap]) {
            Ok(n) => Ok(n),
            // The slot was capped by the output buffer, not by the format's
            // per-block bound: the caller's buffer is what ran out.
            Err(Error::BufferTooSmall { needed, .. }) if cap < max_block_size => {
                Err(Error::BufferTooSmall {
                    needed,
                    capacity: cap,
                })
            }
            Err(Error::BufferTooSmall { .. }) => Err(Error::DecompressionFailure),
            Err(e) => Err(e),
        }
    } else {
        if out.len() < scratch.len() {
            return Err(Error::BufferTooSmall {
                needed: scratch.len(),
                capacity: out.len(),
            });
        }
        out[..scratch.len()].copy_from_slice(scratch);
        Ok(scratch.len())
    }
}

/// Walk a block region of exactly `input.len()` bytes, decoding every block
/// into `out` until the last-flagged block. Returns the plaintext length.
pub(crate) fn decode_blocks(
    key: &[u8; KEY_SIZE],
    max_block_size: usize,
    input: &[u8],
    out: &mut [u8],
) -> Result<usize, Error> {
    let mut in_pos = 0usize;
    let mut out_pos = 0usize;
    let mut expected_no: u16 = 0;
    let mut scratch = Vec::with_capacity(max_block_size);

    loop {
        if in_pos >= input.len() {
            // Region exhausted without a last-flagged block.
            return Err(Error::need(in_pos + BLOCK_HEADER_SIZE, input.len()));
        }

        let header = BlockHeader::parse(&input[in_pos..])?;
        in_pos += BLOCK_HEADER_SIZE;

        if header.block_no != expected_no {
            return Err(Error::BlockSequence {
                expected: expected_no,
                found: header.block_no,
            });
        }

        let size = header.size as usize;
        if input.len() - in_pos < size {
            return Err(Error::need(in_pos + size, input.len()));
        }
        let payload = &input[in_pos..in_pos + size];
        in_pos += size;

        out_pos += decode_block(
            key,
            &header,
            payload,
            max_block_size,
            &mut out[out_pos..],
            &mut scratch,
        )?;

        if header.is_last() {
            return Ok(out_pos);
        }
        expected_no = expected_no.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> DataKey {
        DataKey::from_bytes([0x11; KEY_SIZE])
    }

    #[test]
    fn single_block_roundtrips() {
        let plaintext = b"block level roundtrip, compressible compressible compressible";
        let mut chain = vec![0u8; BLOCK_HEADER_SIZE + plaintext.len()];
        let n = encode_blocks(&key(), 1024, plaintext, &mut chain).unwrap();

        let mut out = vec![0u8; plaintext.len()];
        let m = decode_blocks(key().as_bytes(), 1024, &chain[..n], &mut out).unwrap();
        assert_eq!(&out[..m], &plaintext[..]);
    }

    #[test]
    fn empty_input_yields_one_last_block() {
        let mut chain = vec![0u8; BLOCK_HEADER_SIZE];
        let n = encode_blocks(&key(), 1024, &[], &mut chain).unwrap();
        assert_eq!(n, BLOCK_HEADER_SIZE);

        let header = BlockHeader::parse(&chain).unwrap();
        assert!(header.is_last());
        assert_eq!(header.size, 0);

        let mut out = [0u8; 0];
        assert_eq!(
            decode_blocks(key().as_bytes(), 1024, &chain[..n], &mut out).unwrap(),
            0
        );
    }

    #[test]
    fn segmentation_counts_and_flags() {
        let plaintext = vec![9u8; 5000];
        let mut chain = vec![0u8; 5000 + 3 * BLOCK_HEADER_SIZE];
        let n = encode_blocks(&key(), 2048, &plaintext, &mut chain).unwrap();

        let mut pos = 0;
        let mut headers = Vec::new();
        while pos < n {
            let h = BlockHeader::parse(&chain[pos..]).unwrap();
            pos += BLOCK_HEADER_SIZE + h.size as usize;
            headers.push(h);
        }
        assert_eq!(headers.len(), 3);
        assert!(headers[..2].iter().all(|h| !h.is_last()));
        assert!(headers[2].is_last());
        assert_eq!(
            headers
                .iter()
                .map(|h| u32::from(h.block_no))
                .collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn ciphertext_flip_fails_before_decrypt() {
        let plaintext = vec![3u8; 100];
        let mut chain = vec![0u8; BLOCK_HEADER_SIZE + plaintext.len()];
        let n = encode_blocks(&key(), 1024, &plaintext, &mut chain).unwrap();

        chain[BLOCK_HEADER_SIZE + 4] ^= 0x80;
        let mut out = vec![0u8; plaintext.len()];
        assert_eq!(
            decode_blocks(key().as_bytes(), 1024, &chain[..n], &mut out),
            Err(Error::ChecksumMismatch {
                region: "block payload"
            })
        );
    }

    #[test]
    fn header_flip_fails_on_header_checksum() {
        let plaintext = vec![3u8; 100];
        let mut chain = vec![0u8; BLOCK_HEADER_SIZE + plaintext.len()];
        let n = encode_blocks(&key(), 1024, &plaintext, &mut chain).unwrap();

        chain[2] ^= 0x01; // size field
        let mut out = vec![0u8; plaintext.len()];
        assert_eq!(
            decode_blocks(key().as_bytes(), 1024, &chain[..n], &mut out),
            Err(Error::ChecksumMismatch {
                region: "block header"
            })
        );
    }

    #[test]
    fn out_of_order_block_number_is_rejected() {
        let plaintext = vec![9u8; 3000];
        let mut chain = vec![0u8; 3000 + 2 * BLOCK_HEADER_SIZE];
        let n = encode_blocks(&key(), 2048, &plaintext, &mut chain).unwrap();

        // Re-stamp the second block header with a wrong number; to_bytes
        // recomputes checksum8, so only the sequence check can object.
        let first = BlockHeader::parse(&chain).unwrap();
        let second_at = BLOCK_HEADER_SIZE + first.size as usize;
        let mut second = BlockHeader::parse(&chain[second_at..]).unwrap();
        second.block_no = 7;
        chain[second_at..second_at + BLOCK_HEADER_SIZE].copy_from_slice(&second.to_bytes());

        let mut out = vec![0u8; plaintext.len()];
        assert_eq!(
            decode_blocks(key().as_bytes(), 2048, &chain[..n], &mut out),
            Err(Error::BlockSequence {
                expected: 1,
                found: 7
            })
        );
    }

    #[test]
    fn chain_ending_without_last_flag_is_rejected() {
        let plaintext = vec![9u8; 100];
        let mut chain = vec![0u8; BLOCK_HEADER_SIZE + plaintext.len()];
        let n = encode_blocks(&key(), 1024, &plaintext, &mut chain).unwrap();

        // Clear the last flag on the sole block; the region then ends
        // cleanly but promises a successor that never arrives.
        let mut header = BlockHeader::parse(&chain).unwrap();
        header.flags &= !BLOCK_FLAG_LAST;
        chain[..BLOCK_HEADER_SIZE].copy_from_slice(&header.to_bytes());

        let mut out = vec![0u8; plaintext.len()];
        assert!(matches!(
            decode_blocks(key().as_bytes(), 1024, &chain[..n], &mut out),
            Err(Error::InsufficientData { .. })
        ));
    }

    #[test]
    fn truncated_region_is_insufficient_data() {
        let plaintext = vec![3u8; 100];
        let mut chain = vec![0u8; BLOCK_HEADER_SIZE + plaintext.len()];
        let n = encode_blocks(&key(), 1024, &plaintext, &mut chain).unwrap();

        let mut out = vec![0u8; plaintext.len()];
        assert!(matches!(
            decode_blocks(key().as_bytes(), 1024, &chain[..n - 10], &mut out),
            Err(Error::InsufficientData { .. })
        ));
    }

    #[test]
    fn output_capacity_is_enforced() {
        let plaintext = vec![3u8; 100];
        let mut chain = vec![0u8; BLOCK_HEADER_SIZE + plaintext.len()];
        let n = encode_blocks(&key(), 1024, &plaintext, &mut chain).unwrap();

        let mut out = vec![0u8; 10];
        assert!(matches!(
            decode_blocks(key().as_bytes(), 1024, &chain[..n], &mut out),
            Err(Error::BufferTooSmall { .. })
        ));
    }
}
