//! Content fingerprints for change detection.
//!
//! A fingerprint answers "is this identical to what I last saw", not
//! "is this authentic". Persisted fingerprints must match freshly computed
//! ones across runs, so the digest and encoding never change.

use sha2::{Digest, Sha256};

/// SHA-256 of the content, lowercase hex.
pub fn fingerprint(content: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(content.as_ref()))
}
