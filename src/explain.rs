//! Read-only structural walk over an encoded buffer.
//!
//! Explains everything the cleartext layer reveals (header fields, flag
//! breakdowns, the sealed span's declared size, the MAC bytes, and each
//! block's boundaries) without any key material. Block payloads and the
//! sealed span stay opaque.

use std::fmt;

use crate::block::{BlockHeader, BLOCK_HEADER_SIZE};
use crate::crypto::MAC_SIZE;
use crate::error::Error;
use crate::header::{
    EncryptionHeader, MainHeader, ENCRYPTION_HEADER_SIZE, ENC_FLAG_CIPHER_CHACHA20,
    ENC_FLAG_MAC_POLY1305, MAGIC, MAIN_FLAG_ENCRYPTION_EXTENSION, MAIN_FLAG_META_EXTENSION,
    MAIN_HEADER_SIZE,
};

/// Structural description of one encoded buffer.
#[derive(Debug, Clone)]
pub struct ExplainReport {
    pub main: MainHeader,
    pub encryption: EncryptionHeader,
    /// Authentication tag over the sealed span, shown verbatim.
    pub mac: [u8; MAC_SIZE],
    /// Every block header in chain order; payloads are never inspected.
    pub blocks: Vec<BlockHeader>,
}

impl ExplainReport {
    /// Declared size of the sealed span this view cannot open.
    pub fn sealed_span_size(&self) -> usize {
        usize::from(self.encryption.encrypted_header_size)
    }

    /// One-line digest in the spirit of a directory listing.
    pub fn summary(&self) -> String {
        format!(
            "{} block(s), {} chain bytes, {} sealed header bytes",
            self.blocks.len(),
            self.main.blocks_sum_size,
            self.sealed_span_size(),
        )
    }
}

impl fmt::Display for ExplainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Main header:")?;
        writeln!(f, "  magic: {:#010x}", MAGIC)?;
        writeln!(f, "  blocks_sum_size: {}", self.main.blocks_sum_size)?;
        writeln!(f, "  hashed_data_size: {}", self.main.hashed_data_size)?;
        writeln!(f, "  flags ({:#04x}):", self.main.flags)?;
        if self.main.flags & MAIN_FLAG_META_EXTENSION != 0 {
            writeln!(f, "    META_EXTENSION")?;
        }
        if self.main.flags & MAIN_FLAG_ENCRYPTION_EXTENSION != 0 {
            writeln!(f, "    ENCRYPTION_EXTENSION")?;
        }
        writeln!(f, "  checksum8: {}", self.main.checksum)?;

        writeln!(f)?;
        writeln!(f, "Encryption header:")?;
        writeln!(f, "  nonce: {}", hex::encode(self.encryption.nonce))?;
        writeln!(f, "  key_payload_size: {}", self.encryption.key_payload_size)?;
        writeln!(
            f,
            "  encrypted_header_size: {}",
            self.encryption.encrypted_header_size
        )?;
        writeln!(f, "  flags ({:#04x}):", self.encryption.flags)?;
        if self.encryption.flags & ENC_FLAG_MAC_POLY1305 != 0 {
            writeln!(f, "    MAC_POLY1305")?;
        }
        if self.encryption.flags & ENC_FLAG_CIPHER_CHACHA20 != 0 {
            writeln!(f, "    CIPHER_CHACHA20")?;
        }
        writeln!(f, "  checksum8: {}", self.encryption.checksum)?;

        writeln!(f)?;
        writeln!(
            f,
            "rest of the header ({} bytes) is encrypted",
            self.sealed_span_size()
        )?;
        writeln!(f, "MAC (header): {}", hex::encode(self.mac))?;

        writeln!(f)?;
        writeln!(f, "Blocks:")?;
        for b in &self.blocks {
            write!(f, "  block {} of size {}", b.block_no, b.size)?;
            if b.is_last() {
                write!(f, ", last")?;
            }
            if b.is_compressed() {
                write!(f, ", compressed")?;
            }
            if b.is_encrypted() {
                write!(f, ", encrypted")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Walk `input` structurally and report what the cleartext layer says.
///
/// Fails on the same checksum and truncation conditions as decoding, but
/// never on key material: a wrong-keyed file explains cleanly.
pub fn explain(input: &[u8]) -> Result<ExplainReport, Error> {
    let main = MainHeader::parse(input)?;
    let encryption = EncryptionHeader::parse(&input[MAIN_HEADER_SIZE..])?;

    let aad_end = MAIN_HEADER_SIZE + ENCRYPTION_HEADER_SIZE;
    let sealed_len = usize::from(encryption.encrypted_header_size);
    let header_size = aad_end + sealed_len + MAC_SIZE;
    if input.len() < header_size {
        return Err(Error::need(header_size, input.len()));
    }

    let mut mac = [0u8; MAC_SIZE];
    mac.copy_from_slice(&input[aad_end + sealed_len..header_size]);

    let blocks_sum_size = main.blocks_sum_size as usize;
    if input.len() - header_size < blocks_sum_size {
        return Err(Error::need(header_size + blocks_sum_size, input.len()));
    }
    let region = &input[header_size..header_size + blocks_sum_size];

    let mut blocks = Vec::new();
    let mut pos = 0usize;
    while pos < region.len() {
        let header = BlockHeader::parse(&region[pos..])?;
        let advance = BLOCK_HEADER_SIZE + usize::from(header.size);
        if region.len() - pos < advance {
            return Err(Error::need(pos + advance, region.len()));
        }
        pos += advance;
        blocks.push(header);
    }

    Ok(ExplainReport {
        main,
        encryption,
        mac,
        blocks,
    })
}
