//! Password digest primitive.
//!
//! The primary digest is SHA-256 over the UTF-8 bytes, lowercase hex.
//! Legacy clients running on non-secure origins had no secure digest
//! facility and minted a 32-bit rolling hash instead, prefixed with
//! `insecure_` so the two formats never collide. That fallback is NOT
//! cryptographically safe; it is kept verbatim because stored hashes
//! produced by it must keep verifying. Verification therefore tries
//! both digests against the stored value.

use sha2::{Digest, Sha256};

const INSECURE_PREFIX: &str = "insecure_";

pub fn hash_password(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

/// Weak 32-bit rolling hash. Do not strengthen: stored credentials from
/// legacy clients depend on it byte-for-byte.
pub fn insecure_hash(plain: &str) -> String {
    let mut h: u32 = 0;
    for b in plain.bytes() {
        h = h.wrapping_mul(31).wrapping_add(u32::from(b));
    }
    format!("{}{}", INSECURE_PREFIX, h)
}

/// True when `candidate` matches `stored` under either digest.
pub fn matches(candidate: &str, stored: &str) -> bool {
    hash_password(candidate) == stored || insecure_hash(candidate) == stored
}
