//! Full-file encoding: block chain first, then the header assembled and
//! sealed around it.

use crate::block::{encode_blocks, BLOCK_HEADER_SIZE};
use crate::checksum::checksum16;
use crate::crypto::{aead_seal, DataKey, MainKey, MAC_SIZE, NONCE_SIZE};
use crate::error::Error;
use crate::header::{
    DataHeader, EncryptionHeader, MainHeader, DATA_HEADER_SIZE, DATA_KEY_PAYLOAD_SIZE,
    ENCRYPTION_HEADER_SIZE, ENC_FLAG_CIPHER_CHACHA20, ENC_FLAG_MAC_POLY1305,
    MAIN_FLAG_ENCRYPTION_EXTENSION, MAIN_FLAG_META_EXTENSION, MAIN_HEADER_SIZE, META_HEADER_SIZE,
    MetaHeader,
};

/// Block size used when the caller does not pick one.
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 1024;

/// Block numbers are 16-bit, so a file holds at most 65 536 blocks.
pub const MAX_BLOCK_COUNT: usize = 1 << 16;

/// Largest metadata payload: `hashed_data_size` is 16-bit and covers the
/// whole header minus the MAC, whose fixed records take 90 bytes.
pub const MAX_METADATA_SIZE: usize = u16::MAX as usize
    - (MAIN_HEADER_SIZE
        + ENCRYPTION_HEADER_SIZE
        + DATA_KEY_PAYLOAD_SIZE
        + META_HEADER_SIZE
        + DATA_HEADER_SIZE);

/// Caller-tunable encode parameters.
#[derive(Debug, Clone)]
pub struct EncodeOptions<'a> {
    /// Numeric id identifying the metadata payload to the caller.
    pub meta_id: u16,
    /// Opaque metadata, carried inside the sealed span.
    pub metadata: &'a [u8],
    /// Uncompressed bytes per block, 1..=65535.
    pub max_block_size: usize,
}

impl Default for EncodeOptions<'_> {
    fn default() -> Self {
        Self {
            meta_id: 0,
            metadata: &[],
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
        }
    }
}

fn full_header_size(metadata_len: usize) -> usize {
    MAIN_HEADER_SIZE
        + ENCRYPTION_HEADER_SIZE
        + DATA_KEY_PAYLOAD_SIZE
        + META_HEADER_SIZE
        + metadata_len
        + DATA_HEADER_SIZE
        + MAC_SIZE
}

fn block_count_for(plaintext_len: usize, max_block_size: usize) -> usize {
    if plaintext_len == 0 {
        1
    } else {
        (plaintext_len + max_block_size - 1) / max_block_size
    }
}

/// Worst-case encoded size for a given plaintext: the header plus one
/// stored-verbatim block per segment. Every successful `encode` writes at
/// most this many bytes. A zero `max_block_size` is counted as one byte
/// per block; `encode` itself rejects it.
pub fn max_encoded_len(plaintext_len: usize, max_block_size: usize, metadata_len: usize) -> usize {
    let blocks = block_count_for(plaintext_len, max_block_size.max(1));
    full_header_size(metadata_len) + blocks * BLOCK_HEADER_SIZE + plaintext_len
}

/// Reject anything the fixed-width header fields cannot represent.
///
/// The chain-length bound uses the worst case (every block stored
/// verbatim), so `blocks_sum_size` can never wrap even before the actual
/// chain is emitted.
fn validate_limits(plaintext_len: usize, opts: &EncodeOptions<'_>) -> Result<(), Error> {
    if opts.max_block_size == 0 || opts.max_block_size > u16::MAX as usize {
        return Err(Error::InvalidBlockSize(opts.max_block_size));
    }
    if opts.metadata.len() > MAX_METADATA_SIZE {
        return Err(Error::OversizedField {
            field: "metadata payload",
            max: MAX_METADATA_SIZE,
            actual: opts.metadata.len(),
        });
    }
    if plaintext_len > u32::MAX as usize {
        return Err(Error::OversizedField {
            field: "plaintext",
            max: u32::MAX as usize,
            actual: plaintext_len,
        });
    }
    let block_count = block_count_for(plaintext_len, opts.max_block_size);
    if block_count > MAX_BLOCK_COUNT {
        return Err(Error::OversizedField {
            field: "block count",
            max: MAX_BLOCK_COUNT,
            actual: block_count,
        });
    }
    let worst_chain = plaintext_len as u64 + (block_count * BLOCK_HEADER_SIZE) as u64;
    if worst_chain > u64::from(u32::MAX) {
        return Err(Error::OversizedField {
            field: "block chain",
            max: u32::MAX as usize,
            actual: worst_chain as usize,
        });
    }
    Ok(())
}

/// Encode `plaintext` into `out`, returning the number of bytes written.
///
/// `main_nonce` must never repeat under the same `main_key`; that
/// uniqueness is the caller's responsibility (timestamp + randomness is the
/// usual composition). `data_key` is consumed: one key, one file.
pub fn encode(
    main_key: &MainKey,
    main_nonce: &[u8; NONCE_SIZE],
    data_key: DataKey,
    opts: &EncodeOptions<'_>,
    plaintext: &[u8],
    out: &mut [u8],
) -> Result<usize, Error> {
    validate_limits(plaintext.len(), opts)?;

    let header_size = full_header_size(opts.metadata.len());
    if out.len() < header_size {
        return Err(Error::BufferTooSmall {
            needed: header_size,
            capacity: out.len(),
        });
    }

    // Block chain first: the main header needs its exact byte length.
    let blocks_sum_size =
        encode_blocks(&data_key, opts.max_block_size, plaintext, &mut out[header_size..])?;

    let encrypted_header_size =
        DATA_KEY_PAYLOAD_SIZE + META_HEADER_SIZE + opts.metadata.len() + DATA_HEADER_SIZE;

    let main = MainHeader {
        blocks_sum_size: blocks_sum_size as u32,
        hashed_data_size: (header_size - MAC_SIZE) as u16,
        flags: MAIN_FLAG_META_EXTENSION | MAIN_FLAG_ENCRYPTION_EXTENSION,
        checksum: 0,
    };
    out[..MAIN_HEADER_SIZE].copy_from_slice(&main.to_bytes());

    let encryption = EncryptionHeader {
        nonce: *main_nonce,
        key_payload_size: DATA_KEY_PAYLOAD_SIZE as u16,
        encrypted_header_size: encrypted_header_size as u16,
        flags: ENC_FLAG_MAC_POLY1305 | ENC_FLAG_CIPHER_CHACHA20,
        checksum: 0,
    };
    let aad_end = MAIN_HEADER_SIZE + ENCRYPTION_HEADER_SIZE;
    out[MAIN_HEADER_SIZE..aad_end].copy_from_slice(&encryption.to_bytes());

    // The plaintext-at-rest span: DataKey ‖ MetaHeader+payload ‖ DataHeader.
    let mut pos = aad_end;
    out[pos..pos + DATA_KEY_PAYLOAD_SIZE].copy_from_slice(data_key.as_bytes());
    pos += DATA_KEY_PAYLOAD_SIZE;

    let meta = MetaHeader {
        meta_id: opts.meta_id,
        payload_size: opts.metadata.len() as u16,
    };
    out[pos..pos + META_HEADER_SIZE].copy_from_slice(&meta.to_bytes());
    pos += META_HEADER_SIZE;
    out[pos..pos + opts.metadata.len()].copy_from_slice(opts.metadata);
    pos += opts.metadata.len();

    let data = DataHeader {
        uncompressed_size: plaintext.len() as u32,
        max_block_size: opts.max_block_size as u16,
        flags: 0,
        reserved: 0,
        full_data_checksum: u32::from(checksum16(plaintext)),
    };
    out[pos..pos + DATA_HEADER_SIZE].copy_from_slice(&data.to_bytes());
    pos += DATA_HEADER_SIZE;

    // Seal the span; the two cleartext headers are authenticated as AAD.
    let mut aad = [0u8; MAIN_HEADER_SIZE + ENCRYPTION_HEADER_SIZE];
    aad.copy_from_slice(&out[..aad_end]);
    let mac = aead_seal(
        main_key.as_bytes(),
        main_nonce,
        &aad,
        &mut out[aad_end..pos],
    )?;
    out[pos..pos + MAC_SIZE].copy_from_slice(&mac);

    Ok(header_size + blocks_sum_size)
}

/// Allocating convenience wrapper around [`encode`].
pub fn encode_to_vec(
    main_key: &MainKey,
    main_nonce: &[u8; NONCE_SIZE],
    data_key: DataKey,
    opts: &EncodeOptions<'_>,
    plaintext: &[u8],
) -> Result<Vec<u8>, Error> {
    validate_limits(plaintext.len(), opts)?;
    let mut out = vec![0u8; max_encoded_len(plaintext.len(), opts.max_block_size, opts.metadata.len())];
    let n = encode(main_key, main_nonce, data_key, opts, plaintext, &mut out)?;
    out.truncate(n);
    Ok(out)
}
