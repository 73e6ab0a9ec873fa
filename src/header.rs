//! Wire records for the SSBF header region.
//!
//! Layout of an encoded file:
//!
//! ```text
//! MainHeader(12) ‖ EncryptionHeader(30) ‖ sealed span ‖ MAC(16) ‖ block chain
//!                                         └ DataKey(32) ‖ MetaHeader(4)+payload ‖ DataHeader(12)
//! ```
//!
//! All integers are little-endian. Records are serialized field by field;
//! nothing relies on in-memory struct layout.

use byteorder::{ByteOrder, LittleEndian};

use crate::checksum::checksum8;
use crate::crypto::NONCE_SIZE;
use crate::error::Error;

/// SSBF v1 magic constant, first four bytes of every file.
pub const MAGIC: u32 = 0x1934_5601;

pub const MAIN_HEADER_SIZE: usize = 12;
pub const ENCRYPTION_HEADER_SIZE: usize = 30;
pub const META_HEADER_SIZE: usize = 4;
pub const DATA_HEADER_SIZE: usize = 12;

/// Size of the embedded data key inside the sealed span, and the value of
/// `EncryptionHeader::key_payload_size`.
pub const DATA_KEY_PAYLOAD_SIZE: usize = 32;

// MainHeader flags.
pub const MAIN_FLAG_META_EXTENSION: u8 = 1;
pub const MAIN_FLAG_ENCRYPTION_EXTENSION: u8 = 2;

// EncryptionHeader algorithm flags.
pub const ENC_FLAG_MAC_POLY1305: u8 = 1 << 0;
pub const ENC_FLAG_CIPHER_CHACHA20: u8 = 1 << 3;

/// Format identity and the two sizes needed to walk the rest of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainHeader {
    /// Exact byte length of the concatenated block chain.
    pub blocks_sum_size: u32,
    /// Full header size minus the 16-byte MAC trailer.
    pub hashed_data_size: u16,
    pub flags: u8,
    /// Stored checksum; filled in by [`parse`](Self::parse), recomputed by
    /// [`to_bytes`](Self::to_bytes).
    pub checksum: u8,
}

impl MainHeader {
    pub fn to_bytes(&self) -> [u8; MAIN_HEADER_SIZE] {
        let mut buf = [0u8; MAIN_HEADER_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], MAGIC);
        LittleEndian::write_u32(&mut buf[4..8], self.blocks_sum_size);
        LittleEndian::write_u16(&mut buf[8..10], self.hashed_data_size);
        buf[10] = self.flags;
        buf[11] = checksum8(&buf[..MAIN_HEADER_SIZE - 1]);
        buf
    }

    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        if data.len() < MAIN_HEADER_SIZE {
            return Err(Error::need(MAIN_HEADER_SIZE, data.len()));
        }
        if LittleEndian::read_u32(&data[0..4]) != MAGIC {
            return Err(Error::InvalidMagic);
        }
        let stored = data[MAIN_HEADER_SIZE - 1];
        if checksum8(&data[..MAIN_HEADER_SIZE - 1]) != stored {
            return Err(Error::ChecksumMismatch {
                region: "main header",
            });
        }
        Ok(MainHeader {
            blocks_sum_size: LittleEndian::read_u32(&data[4..8]),
            hashed_data_size: LittleEndian::read_u16(&data[8..10]),
            flags: data[10],
            checksum: stored,
        })
    }
}

/// Parameters for the AEAD seal over the middle of the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionHeader {
    /// Public per-file nonce; uniqueness under the main key is the
    /// caller's responsibility.
    pub nonce: [u8; NONCE_SIZE],
    /// Size of the embedded data key, always 32.
    pub key_payload_size: u16,
    /// Byte length of the sealed span that follows this record.
    pub encrypted_header_size: u16,
    pub flags: u8,
    pub checksum: u8,
}

impl EncryptionHeader {
    pub fn to_bytes(&self) -> [u8; ENCRYPTION_HEADER_SIZE] {
        let mut buf = [0u8; ENCRYPTION_HEADER_SIZE];
        buf[..NONCE_SIZE].copy_from_slice(&self.nonce);
        LittleEndian::write_u16(&mut buf[24..26], self.key_payload_size);
        LittleEndian::write_u16(&mut buf[26..28], self.encrypted_header_size);
        buf[28] = self.flags;
        buf[29] = checksum8(&buf[..ENCRYPTION_HEADER_SIZE - 1]);
        buf
    }

    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        if data.len() < ENCRYPTION_HEADER_SIZE {
            return Err(Error::need(ENCRYPTION_HEADER_SIZE, data.len()));
        }
        let stored = data[ENCRYPTION_HEADER_SIZE - 1];
        if checksum8(&data[..ENCRYPTION_HEADER_SIZE - 1]) != stored {
            return Err(Error::ChecksumMismatch {
                region: "encryption header",
            });
        }
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&data[..NONCE_SIZE]);
        Ok(EncryptionHeader {
            nonce,
            key_payload_size: LittleEndian::read_u16(&data[24..26]),
            encrypted_header_size: LittleEndian::read_u16(&data[26..28]),
            flags: data[28],
            checksum: stored,
        })
    }
}

/// Caller-supplied metadata marker inside the sealed span. The payload is
/// opaque to the format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaHeader {
    pub meta_id: u16,
    pub payload_size: u16,
}

impl MetaHeader {
    pub fn to_bytes(&self) -> [u8; META_HEADER_SIZE] {
        let mut buf = [0u8; META_HEADER_SIZE];
        LittleEndian::write_u16(&mut buf[0..2], self.meta_id);
        LittleEndian::write_u16(&mut buf[2..4], self.payload_size);
        buf
    }

    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        if data.len() < META_HEADER_SIZE {
            return Err(Error::need(META_HEADER_SIZE, data.len()));
        }
        Ok(MetaHeader {
            meta_id: LittleEndian::read_u16(&data[0..2]),
            payload_size: LittleEndian::read_u16(&data[2..4]),
        })
    }
}

/// Whole-plaintext bookkeeping inside the sealed span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataHeader {
    pub uncompressed_size: u32,
    pub max_block_size: u16,
    pub flags: u8,
    pub reserved: u8,
    /// 16-bit BSD checksum of the entire original plaintext, stored in a
    /// four-byte field.
    pub full_data_checksum: u32,
}

impl DataHeader {
    pub fn to_bytes(&self) -> [u8; DATA_HEADER_SIZE] {
        let mut buf = [0u8; DATA_HEADER_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.uncompressed_size);
        LittleEndian::write_u16(&mut buf[4..6], self.max_block_size);
        buf[6] = self.flags;
        buf[7] = self.reserved;
        LittleEndian::write_u32(&mut buf[8..12], self.full_data_checksum);
        buf
    }

    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        if data.len() < DATA_HEADER_SIZE {
            return Err(Error::need(DATA_HEADER_SIZE, data.len()));
        }
        Ok(DataHeader {
            uncompressed_size: LittleEndian::read_u32(&data[0..4]),
            max_block_size: LittleEndian::read_u16(&data[4..6]),
            flags: data[6],
            reserved: data[7],
            full_data_checksum: LittleEndian::read_u32(&data[8..12]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_header_roundtrips() {
        let h = MainHeader {
            blocks_sum_size: 0xdead_beef,
            hashed_data_size: 106,
            flags: MAIN_FLAG_META_EXTENSION | MAIN_FLAG_ENCRYPTION_EXTENSION,
            checksum: 0,
        };
        let bytes = h.to_bytes();
        let parsed = MainHeader::parse(&bytes).unwrap();
        assert_eq!(parsed.blocks_sum_size, h.blocks_sum_size);
        assert_eq!(parsed.hashed_data_size, h.hashed_data_size);
        assert_eq!(parsed.flags, h.flags);
        assert_eq!(parsed.checksum, bytes[11]);
    }

    #[test]
    fn main_header_rejects_bad_magic() {
        let mut bytes = MainHeader {
            blocks_sum_size: 1,
            hashed_data_size: 1,
            flags: 0,
            checksum: 0,
        }
        .to_bytes();
        bytes[0] ^= 0xff;
        assert_eq!(MainHeader::parse(&bytes), Err(Error::InvalidMagic));
    }

    #[test]
    fn main_header_rejects_corrupted_field() {
        let mut bytes = MainHeader {
            blocks_sum_size: 1234,
            hashed_data_size: 106,
            flags: 3,
            checksum: 0,
        }
        .to_bytes();
        bytes[5] ^= 0x01;
        assert_eq!(
            MainHeader::parse(&bytes),
            Err(Error::ChecksumMismatch {
                region: "main header"
            })
        );
    }

    #[test]
    fn encryption_header_roundtrips() {
        let h = EncryptionHeader {
            nonce: [0xab; NONCE_SIZE],
            key_payload_size: DATA_KEY_PAYLOAD_SIZE as u16,
            encrypted_header_size: 60,
            flags: ENC_FLAG_MAC_POLY1305 | ENC_FLAG_CIPHER_CHACHA20,
            checksum: 0,
        };
        let bytes = h.to_bytes();
        let parsed = EncryptionHeader::parse(&bytes).unwrap();
        assert_eq!(parsed.nonce, h.nonce);
        assert_eq!(parsed.key_payload_size, h.key_payload_size);
        assert_eq!(parsed.encrypted_header_size, h.encrypted_header_size);
        assert_eq!(parsed.flags, h.flags);
    }

    #[test]
    fn short_input_reports_needed_size() {
        assert_eq!(
            MainHeader::parse(&[0u8; 5]),
            Err(Error::InsufficientData {
                needed: MAIN_HEADER_SIZE,
                available: 5
            })
        );
        assert_eq!(
            EncryptionHeader::parse(&[0u8; 10]),
            Err(Error::InsufficientData {
                needed: ENCRYPTION_HEADER_SIZE,
                available: 10
            })
        );
    }

    #[test]
    fn data_header_roundtrips() {
        let h = DataHeader {
            uncompressed_size: 5000,
            max_block_size: 2048,
            flags: 0,
            reserved: 0,
            full_data_checksum: 0x1234,
        };
        assert_eq!(DataHeader::parse(&h.to_bytes()).unwrap(), h);
    }
}
