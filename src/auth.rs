//! Admin credentials and identifier rules: salted password hashing, random
//! key/salt generation, and the reserved-name and character checks shared by
//! keys, plan names, and mission IDs.

use crate::error::{HoustonError, Result};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Field names with schema meaning; they can never be used as a key ID or a
/// mission ID.
pub const RESERVED_KEYS: [&str; 6] = ["u", "n", "c", "a", "m", "p"];

/// Characters not allowed in keys, plan names, or mission IDs.
pub const DISALLOWED_CHARACTERS: &str = "| ,\n\r\t%&<>{}[]\\/?;\"'`";

const LETTERS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Random alphanumeric string; used for generated API keys and salts.
pub fn random_string(n: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
        .collect()
}

/// Hex-encoded `sha256(password || salt)`.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

/// Admin passwords must be at least 10 characters and free of whitespace and
/// backslashes.
pub fn validate_password(password: &str) -> Result<()> {
    if password.len() < 10 {
        return Err(HoustonError::BadRequest(
            "password provided is not long enough. Houston admin password must be at least 10 characters. Recommended length is 30".to_string(),
        ));
    }
    if password.contains(['\\', ' ', '\t', '\n']) {
        return Err(HoustonError::BadRequest(
            "password provided contains invalid characters. Must not contain backslash, space, tab, or newline".to_string(),
        ));
    }
    Ok(())
}

pub fn is_reserved(id: &str) -> bool {
    RESERVED_KEYS.contains(&id)
}

pub fn has_disallowed_characters(id: &str) -> bool {
    id.chars().any(|c| DISALLOWED_CHARACTERS.contains(c))
}
