pub mod block;
pub mod checksum;
pub mod codec;
pub mod crypto;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod explain;
pub mod header;

pub use block::{BlockHeader, BLOCK_HEADER_SIZE};
pub use crypto::{DataKey, MainKey, KEY_SIZE, MAC_SIZE, NONCE_SIZE};
pub use decoder::{decode, decode_to_vec, Decoded};
pub use encoder::{encode, encode_to_vec, max_encoded_len, EncodeOptions, DEFAULT_MAX_BLOCK_SIZE};
pub use error::Error;
pub use explain::{explain, ExplainReport};
pub use header::{DataHeader, EncryptionHeader, MainHeader, MetaHeader, MAGIC};
