//! File name rules: validation, the case-insensitive catalog order, and
//! the fixed-width on-disk forms.

use core::cmp::Ordering;

use crate::config::*;
use crate::error::{FsError, Result};

pub fn trim_zero(name: &[u8]) -> &[u8] {
    let mut end = name.len();
    while end > 0 && name[end - 1] == 0 {
        end -= 1;
    }
    &name[..end]
}

/// Names are printable ASCII, non-empty, and short enough for the hint sector.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_FILE_NAME_LEN {
        return Err(FsError::InvalidName(name.to_string()));
    }
    if !name.bytes().all(|c| c.is_ascii_graphic() || c == b' ') {
        return Err(FsError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Catalog order: ASCII case-insensitive, shorter prefix first.
pub fn cmp_names(a: &str, b: &str) -> Ordering {
    let a = a.bytes().map(|c| c.to_ascii_lowercase());
    let b = b.bytes().map(|c| c.to_ascii_lowercase());
    a.cmp(b)
}

pub fn names_equal(a: &str, b: &str) -> bool {
    cmp_names(a, b) == Ordering::Equal
}

/// Zero-padded catalog key name.
pub fn encode_name(name: &str) -> [u8; MAX_NAME_LEN] {
    let mut out = [0u8; MAX_NAME_LEN];
    let bytes = name.as_bytes();
    let len = bytes.len().min(MAX_NAME_LEN);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

/// The 4-byte type the hint sector mirrors from the end of the name,
/// e.g. "Text" for "notes.Text". Shorter names are zero-padded.
pub fn type_suffix(name: &str) -> [u8; HINT_TYPE_LEN] {
    let bytes = name.as_bytes();
    let tail = &bytes[bytes.len().saturating_sub(HINT_TYPE_LEN)..];
    let mut out = [0u8; HINT_TYPE_LEN];
    out[..tail.len()].copy_from_slice(tail);
    out
}
