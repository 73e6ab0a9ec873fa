use clap::{Parser, Subcommand};
use ssbf::{decode_to_vec, encode_to_vec, explain, DataKey, EncodeOptions, MainKey};
use ssbf::{DEFAULT_MAX_BLOCK_SIZE, KEY_SIZE, NONCE_SIZE};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ssbf", about = "The SSBF secure blob format CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a fresh 32-byte long-term key file
    Keygen {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Encode a file into an SSBF blob
    Encode {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// File holding the 32-byte long-term key
        #[arg(short, long)]
        key: PathBuf,
        /// Uncompressed bytes per block (1-65535)
        #[arg(short, long, default_value_t = DEFAULT_MAX_BLOCK_SIZE)]
        block_size: usize,
        /// Numeric id for the embedded metadata
        #[arg(long, default_value = "0")]
        meta_id: u16,
        /// Metadata string carried inside the sealed header
        #[arg(long)]
        meta: Option<String>,
    },
    /// Decode an SSBF blob back to the original bytes
    Decode {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long)]
        key: PathBuf,
    },
    /// Describe a blob's structure without any key
    Explain {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        // ── Keygen ───────────────────────────────────────────────────────────
        Commands::Keygen { output } => {
            let mut key = [0u8; KEY_SIZE];
            getrandom::getrandom(&mut key)?;
            std::fs::write(&output, key)?;
            println!("Wrote key: {}", output.display());
        }

        // ── Encode ───────────────────────────────────────────────────────────
        Commands::Encode {
            input,
            output,
            key,
            block_size,
            meta_id,
            meta,
        } => {
            let main_key = load_key(&key)?;
            let plaintext = std::fs::read(&input)?;
            let metadata = meta.unwrap_or_default();
            let opts = EncodeOptions {
                meta_id,
                metadata: metadata.as_bytes(),
                max_block_size: block_size,
            };

            let nonce = fresh_nonce()?;
            let data_key = DataKey::generate()?;
            let encoded = encode_to_vec(&main_key, &nonce, data_key, &opts, &plaintext)?;
            std::fs::write(&output, &encoded)?;
            println!(
                "Encoded {} ({} B) → {} ({} B)",
                input.display(),
                plaintext.len(),
                output.display(),
                encoded.len()
            );
        }

        // ── Decode ───────────────────────────────────────────────────────────
        Commands::Decode { input, output, key } => {
            let main_key = load_key(&key)?;
            let encoded = std::fs::read(&input)?;
            let (plaintext, decoded) = decode_to_vec(&main_key, &encoded)?;
            std::fs::write(&output, &plaintext)?;
            println!(
                "Decoded {} → {} ({} B)",
                input.display(),
                output.display(),
                decoded.plaintext_len
            );
            if !decoded.metadata.is_empty() {
                println!(
                    "  metadata id {:#06x}: {}",
                    decoded.meta_id,
                    String::from_utf8_lossy(&decoded.metadata)
                );
            }
        }

        // ── Explain ──────────────────────────────────────────────────────────
        Commands::Explain { input } => {
            let encoded = std::fs::read(&input)?;
            let report = explain(&encoded)?;
            println!("{report}");
            println!("{}", report.summary());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// Load a 32-byte key file, tolerating one trailing newline.
fn load_key(path: &PathBuf) -> Result<MainKey, Box<dyn std::error::Error>> {
    let mut bytes = std::fs::read(path)?;
    if bytes.len() == KEY_SIZE + 1 && bytes[KEY_SIZE] == b'\n' {
        bytes.truncate(KEY_SIZE);
    }
    let key: [u8; KEY_SIZE] = bytes
        .try_into()
        .map_err(|_| format!("key file must hold exactly {KEY_SIZE} bytes"))?;
    Ok(MainKey::from_bytes(key))
}

/// Compose a file-unique nonce: timestamp in the first 8 bytes, operating
/// system randomness in the rest. Reuse under the same key would expose the
/// sealed header, so both halves matter.
fn fresh_nonce() -> Result<[u8; NONCE_SIZE], Box<dyn std::error::Error>> {
    let mut nonce = [0u8; NONCE_SIZE];
    let now = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    nonce[..8].copy_from_slice(&now.to_le_bytes());
    getrandom::getrandom(&mut nonce[8..])?;
    Ok(nonce)
}
