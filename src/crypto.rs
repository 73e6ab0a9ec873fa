//! XChaCha20 block encryption and XChaCha20-Poly1305 header sealing.
//!
//! Two layers share the 32-byte-key/24-byte-nonce shape:
//!   - blocks: raw XChaCha20 keystream XOR, in place, nonce = block number
//!   - header: XChaCha20-Poly1305 with a detached 16-byte tag, AAD = the
//!     cleartext MainHeader‖EncryptionHeader bytes
//!
//! Per-block counter nonces are safe only because the data key is used for
//! exactly one encoded file; [`DataKey`] is move-only to keep it that way.

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::XChaCha20;
use chacha20poly1305::aead::AeadInPlace;
use chacha20poly1305::{KeyInit, Tag, XChaCha20Poly1305, XNonce};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Error;

/// Byte length of both the long-term and per-file keys.
pub const KEY_SIZE: usize = 32;
/// Byte length of every nonce in the format (extended ChaCha20 nonce).
pub const NONCE_SIZE: usize = 24;
/// Byte length of the Poly1305 tag sealing the header.
pub const MAC_SIZE: usize = 16;

/// The caller's long-term key. Decodes any file whose header was sealed
/// with it. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MainKey([u8; KEY_SIZE]);

impl MainKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        MainKey(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// The per-file block-encryption key, carried inside the sealed span.
///
/// Not `Clone`: `encode` takes it by value and drops it, so a key can
/// never encrypt two files. The deterministic block-counter nonces rely
/// on this.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DataKey([u8; KEY_SIZE]);

impl DataKey {
    /// Draw a fresh key from the operating system RNG.
    pub fn generate() -> Result<Self, Error> {
        let mut bytes = [0u8; KEY_SIZE];
        getrandom::getrandom(&mut bytes).map_err(|_| Error::Rng)?;
        Ok(DataKey(bytes))
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        DataKey(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// Build the 24-byte nonce for one block: bytes 0–1 hold the block number
/// little-endian, the rest stay zero.
pub(crate) fn block_nonce(block_no: u16) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[..2].copy_from_slice(&block_no.to_le_bytes());
    nonce
}

/// XOR `data` with the XChaCha20 keystream in place. Encryption and
/// decryption are the same operation.
pub(crate) fn stream_xor(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], data: &mut [u8]) {
    let mut cipher = XChaCha20::new(key.into(), nonce.into());
    cipher.apply_keystream(data);
}

/// Seal `buf` in place under XChaCha20-Poly1305, returning the detached tag.
pub(crate) fn aead_seal(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
    buf: &mut [u8],
) -> Result<[u8; MAC_SIZE], Error> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let tag = cipher
        .encrypt_in_place_detached(XNonce::from_slice(nonce), aad, buf)
        .map_err(|_| Error::AuthenticationFailure)?;
    let mut mac = [0u8; MAC_SIZE];
    mac.copy_from_slice(&tag);
    Ok(mac)
}

/// Open a sealed span in place. Fails closed: on a bad tag `buf` must be
/// treated as garbage and nothing inside it trusted.
pub(crate) fn aead_open(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
    buf: &mut [u8],
    mac: &[u8; MAC_SIZE],
) -> Result<(), Error> {
    let cipher = XChaCha20Poly1305::new(key.into());
    cipher
        .decrypt_in_place_detached(XNonce::from_slice(nonce), aad, buf, Tag::from_slice(mac))
        .map_err(|_| Error::AuthenticationFailure)
}
