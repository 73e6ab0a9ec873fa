//! Full-file decoding: verify and open the header region, then walk the
//! block chain.
//!
//! Nothing inside the sealed span (the data key, the metadata, the data
//! header) is trusted before the Poly1305 tag verifies. The per-block
//! checksums only guard against corruption; the seal is the integrity
//! boundary.

use crate::block::decode_blocks;
use crate::checksum::checksum16;
use crate::crypto::{aead_open, DataKey, MainKey, KEY_SIZE, MAC_SIZE};
use crate::error::Error;
use crate::header::{
    DataHeader, EncryptionHeader, MainHeader, MetaHeader, DATA_HEADER_SIZE,
    DATA_KEY_PAYLOAD_SIZE, ENCRYPTION_HEADER_SIZE, ENC_FLAG_CIPHER_CHACHA20,
    ENC_FLAG_MAC_POLY1305, MAIN_HEADER_SIZE, META_HEADER_SIZE,
};

/// Everything a decode returns besides the plaintext itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Bytes written to the output buffer.
    pub plaintext_len: usize,
    /// Caller-defined id of the embedded metadata.
    pub meta_id: u16,
    /// The opaque metadata payload recovered from the sealed span.
    pub metadata: Vec<u8>,
}

/// The recovered contents of the sealed span plus the block-region bounds.
struct OpenedHeader {
    data_key: DataKey,
    meta_id: u16,
    metadata: Vec<u8>,
    data: DataHeader,
    blocks_start: usize,
    blocks_sum_size: usize,
}

fn open_header(main_key: &MainKey, input: &[u8]) -> Result<OpenedHeader, Error> {
    let main = MainHeader::parse(input)?;
    let encryption = EncryptionHeader::parse(&input[MAIN_HEADER_SIZE..])?;

    let suite = ENC_FLAG_MAC_POLY1305 | ENC_FLAG_CIPHER_CHACHA20;
    if encryption.flags & suite != suite {
        return Err(Error::UnsupportedLayout("unknown cipher suite"));
    }
    if usize::from(encryption.key_payload_size) != DATA_KEY_PAYLOAD_SIZE {
        return Err(Error::UnsupportedLayout("unexpected data-key size"));
    }

    let sealed_len = usize::from(encryption.encrypted_header_size);
    let min_span = DATA_KEY_PAYLOAD_SIZE + META_HEADER_SIZE + DATA_HEADER_SIZE;
    if sealed_len < min_span {
        return Err(Error::need(min_span, sealed_len));
    }

    let aad_end = MAIN_HEADER_SIZE + ENCRYPTION_HEADER_SIZE;
    let header_size = aad_end + sealed_len + MAC_SIZE;
    if input.len() < header_size {
        return Err(Error::need(header_size, input.len()));
    }

    let mut span = input[aad_end..aad_end + sealed_len].to_vec();
    let mut mac = [0u8; MAC_SIZE];
    mac.copy_from_slice(&input[aad_end + sealed_len..header_size]);

    aead_open(
        main_key.as_bytes(),
        &encryption.nonce,
        &input[..aad_end],
        &mut span,
        &mac,
    )?;

    // Authenticated from here on.
    let mut key_bytes = [0u8; KEY_SIZE];
    key_bytes.copy_from_slice(&span[..DATA_KEY_PAYLOAD_SIZE]);
    let data_key = DataKey::from_bytes(key_bytes);

    let meta = MetaHeader::parse(&span[DATA_KEY_PAYLOAD_SIZE..])?;
    let meta_start = DATA_KEY_PAYLOAD_SIZE + META_HEADER_SIZE;
    let meta_end = meta_start + usize::from(meta.payload_size);
    if sealed_len < meta_end + DATA_HEADER_SIZE {
        return Err(Error::need(meta_end + DATA_HEADER_SIZE, sealed_len));
    }
    let metadata = span[meta_start..meta_end].to_vec();

    let data = DataHeader::parse(&span[meta_end..])?;
    if data.max_block_size == 0 {
        return Err(Error::InvalidBlockSize(0));
    }

    let blocks_sum_size = main.blocks_sum_size as usize;
    if input.len() - header_size < blocks_sum_size {
        return Err(Error::need(header_size + blocks_sum_size, input.len()));
    }

    Ok(OpenedHeader {
        data_key,
        meta_id: meta.meta_id,
        metadata,
        data,
        blocks_start: header_size,
        blocks_sum_size,
    })
}

impl OpenedHeader {
    fn blocks_region<'a>(&self, input: &'a [u8]) -> &'a [u8] {
        &input[self.blocks_start..self.blocks_start + self.blocks_sum_size]
    }

    /// The sealed data header is the authoritative account of the
    /// plaintext; a mismatch means the block chain was internally
    /// consistent but is not the chain this header was sealed around.
    fn verify_plaintext(&self, plaintext: &[u8]) -> Result<(), Error> {
        if plaintext.len() != self.data.uncompressed_size as usize
            || u32::from(checksum16(plaintext)) != self.data.full_data_checksum
        {
            return Err(Error::ChecksumMismatch {
                region: "plaintext",
            });
        }
        Ok(())
    }

    fn into_decoded(self, plaintext_len: usize) -> Decoded {
        Decoded {
            plaintext_len,
            meta_id: self.meta_id,
            metadata: self.metadata,
        }
    }
}

/// Decode an SSBF buffer into `out`, returning the plaintext length and the
/// recovered metadata. `out` must hold the file's full uncompressed size.
pub fn decode(main_key: &MainKey, input: &[u8], out: &mut [u8]) -> Result<Decoded, Error> {
    let opened = open_header(main_key, input)?;
    let n = decode_blocks(
        opened.data_key.as_bytes(),
        usize::from(opened.data.max_block_size),
        opened.blocks_region(input),
        out,
    )?;
    opened.verify_plaintext(&out[..n])?;
    Ok(opened.into_decoded(n))
}

/// Allocating convenience wrapper around [`decode`]: sizes the output from
/// the sealed data header.
pub fn decode_to_vec(main_key: &MainKey, input: &[u8]) -> Result<(Vec<u8>, Decoded), Error> {
    let opened = open_header(main_key, input)?;
    let mut out = vec![0u8; opened.data.uncompressed_size as usize];
    let n = decode_blocks(
        opened.data_key.as_bytes(),
        usize::from(opened.data.max_block_size),
        opened.blocks_region(input),
        &mut out,
    )?;
    opened.verify_plaintext(&out[..n])?;
    out.truncate(n);
    let decoded = opened.into_decoded(n);
    Ok((out, decoded))
}
