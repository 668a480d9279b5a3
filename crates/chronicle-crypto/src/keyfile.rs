use std::fs;
use std::path::Path;

use tracing::debug;

use crate::signer::SigningKey;

/// Well-known file name for the ledger's signing key material.
pub const KEY_FILE: &str = "signing.key";

/// Errors from key-material handling.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("io error on key file: {0}")]
    Io(String),

    #[error("invalid key material: {0}")]
    InvalidMaterial(String),
}

/// Load the Ed25519 seed stored at `path`, or generate and persist a fresh
/// one if the file does not exist yet.
///
/// The on-disk form is 64 hex characters (a 32-byte seed) followed by a
/// newline. The key is owned by the caller from here on; nothing in this
/// crate keeps ambient key state.
pub fn load_or_create(path: &Path) -> Result<SigningKey, KeyError> {
    if path.exists() {
        let contents = fs::read_to_string(path).map_err(|e| KeyError::Io(e.to_string()))?;
        let seed = parse_seed(contents.trim())?;
        Ok(SigningKey::from_bytes(seed))
    } else {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| KeyError::Io(e.to_string()))?;
        }
        let key = SigningKey::generate();
        let encoded = format!("{}\n", hex::encode(key.as_bytes()));
        fs::write(path, encoded).map_err(|e| KeyError::Io(e.to_string()))?;
        debug!(path = %path.display(), "generated new signing key");
        Ok(key)
    }
}

fn parse_seed(s: &str) -> Result<[u8; 32], KeyError> {
    let bytes = hex::decode(s).map_err(|e| KeyError::InvalidMaterial(e.to_string()))?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        KeyError::InvalidMaterial(format!("expected 32-byte seed, got {} bytes", v.len()))
    })
}
