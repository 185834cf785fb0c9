//! Upload request validation
//!
//! Applied to every declared upload before any quota lookup or byte is written:
//! - name: 1-255 characters, not `.` or `..`, no path separators or NUL, and short enough in
//!   bytes that the longest collision suffix still fits the filesystem name limit
//! - size: strictly positive, within the cap for the file's type

use validator::Validate;

use crate::config::UploadConfig;
use crate::error::AppError;
use crate::models::FileType;

/// Longest file name the filesystem accepts, in bytes
pub const MAX_FILE_NAME_BYTES: usize = 255;

/// Byte budget for a declared name when up to `max_attempts` candidates may be tried.
///
/// Attempt `n` appends `_{n}` to the stem, so the budget leaves room for `_{max_attempts - 1}`.
pub fn max_declared_name_bytes(max_attempts: u32) -> usize {
    if max_attempts <= 1 {
        return MAX_FILE_NAME_BYTES;
    }
    let longest_suffix = 1 + (max_attempts - 1).to_string().len();
    MAX_FILE_NAME_BYTES.saturating_sub(longest_suffix)
}

#[derive(Debug, Validate)]
struct DeclaredName {
    #[validate(length(
        min = 1,
        max = 255,
        message = "File name must be between 1 and 255 characters"
    ))]
    name: String,
}

/// Validate a declared file name; it becomes an on-disk file name.
pub fn validate_file_name(name: &str, max_attempts: u32) -> Result<(), AppError> {
    DeclaredName {
        name: name.to_string(),
    }
    .validate()?;

    let budget = max_declared_name_bytes(max_attempts);
    if name.len() > budget {
        return Err(AppError::InvalidInput(format!(
            "File name is {} bytes long; at most {} bytes are allowed",
            name.len(),
            budget
        )));
    }

    if name == "." || name == ".." {
        return Err(AppError::InvalidInput(format!(
            "File name '{}' is not allowed",
            name
        )));
    }

    if name.contains(['/', '\\', '\0']) {
        return Err(AppError::InvalidInput(format!(
            "File name '{}' contains invalid characters",
            name.replace('\0', "\\0")
        )));
    }

    Ok(())
}

/// Validate a declared size against the per-type cap.
pub fn validate_declared_size(
    name: &str,
    size: i64,
    file_type: FileType,
    config: &UploadConfig,
) -> Result<(), AppError> {
    if size <= 0 {
        return Err(AppError::InvalidInput(format!("File '{}' is empty", name)));
    }

    let cap = config.size_cap_for(file_type);
    if size > cap {
        return Err(AppError::PayloadTooLarge(format!(
            "File '{}' is {} bytes, exceeding the {} limit of {} bytes",
            name, size, file_type, cap
        )));
    }

    Ok(())
}

/// Full validation of one declared upload. Returns the derived file type.
pub fn validate_upload(name: &str, size: i64, config: &UploadConfig) -> Result<FileType, AppError> {
    validate_file_name(name, config.unique_name_max_attempts)?;
    let file_type = FileType::from_filename(name);
    validate_declared_size(name, size, file_type, config)?;
    Ok(file_type)
}
