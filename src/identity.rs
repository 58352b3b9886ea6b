//! Stable article identifiers.
//!
//! An article's identity is the last 8 hex characters of the MD5 digest of
//! its URL. The identifier is part of every stored filename, so the digest
//! must never change: files written by earlier runs are only recognised as
//! duplicates if the same URL keeps hashing to the same value. MD5 serves as
//! a fingerprint here, not as a security primitive.

use md5::{Digest, Md5};

/// Number of hex characters kept from the digest.
pub const ID_LEN: usize = 8;

/// Compute the 8-character lowercase hex identity of an article URL.
///
/// Any string is accepted; malformed URLs hash like any other input.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(compute_id("https://www.lidovky.cz/"), compute_id("https://www.lidovky.cz/"));
/// assert_eq!(compute_id("abc").len(), 8);
/// ```
pub fn compute_id(url: &str) -> String {
    let digest = Md5::digest(url.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[hex.len() - ID_LEN..].to_string()
}
