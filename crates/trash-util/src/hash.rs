use sha1::{Digest, Sha1};
use std::fmt::Write;

/// Compute the SHA-1 digest of a byte slice, returning the lowercase hex string.
#[must_use]
pub fn sha1_hex(data: &[u8]) -> String {
    let digest = Sha1::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
