//! Shared key generation.
//!
//! Key format: `{file_type}/{file_name}`.

use stowage_core::FileType;

/// Generate the storage key for a file of the given type.
pub fn storage_key(file_type: FileType, file_name: &str) -> String {
    format!("{}/{}", file_type.as_str(), file_name)
}

/// Split a name into stem and final extension (with its dot).
///
/// `a.tar.gz` → (`a.tar`, `.gz`); `README` and `.hidden` have no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}
