//! Opaque token generation and hashing
//!
//! Only the SHA-256 hex digest of a token is stored.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Returns a new random token with the given prefix
pub fn generate(prefix: &str) -> String {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", prefix, hex::encode(bytes))
}

pub fn hash(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Last four characters, shown in trigger listings
pub fn preview(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    chars[chars.len().saturating_sub(4)..].iter().collect()
}
