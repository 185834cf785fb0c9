use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

/// File type classification, derived from the declared name's extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "file_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Video,
    Audio,
    Pdf,
    Document,
    Word,
    Excel,
    Powerpoint,
    Other,
}

impl FileType {
    /// Classify a file by the lower-cased extension of its name.
    pub fn from_filename(name: &str) -> Self {
        let ext = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
            _ => return FileType::Other,
        };

        match ext.as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" => FileType::Image,
            "mp4" | "avi" | "mov" | "wmv" | "flv" | "mkv" | "webm" => FileType::Video,
            "mp3" | "wav" | "flac" | "aac" | "ogg" | "wma" => FileType::Audio,
            "pdf" => FileType::Pdf,
            "txt" | "md" | "rtf" => FileType::Document,
            "doc" | "docx" => FileType::Word,
            "xls" | "xlsx" => FileType::Excel,
            "ppt" | "pptx" => FileType::Powerpoint,
            _ => FileType::Other,
        }
    }

    /// Directory name under the storage root.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Video => "video",
            FileType::Audio => "audio",
            FileType::Pdf => "pdf",
            FileType::Document => "document",
            FileType::Word => "word",
            FileType::Excel => "excel",
            FileType::Powerpoint => "powerpoint",
            FileType::Other => "other",
        }
    }

    pub fn keeps_thumbnail(&self) -> bool {
        *self == FileType::Video
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted file metadata.
///
/// At most one record exists per `(owner_id, name)`; `name` is the declared display name
/// while `path` holds the storage key of the collision-free on-disk name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct FileRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub size: i64,
    pub file_type: FileType,
    pub path: String,
    pub folder_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a new record; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFileRecord {
    pub owner_id: Uuid,
    pub name: String,
    pub size: i64,
    pub file_type: FileType,
    pub path: String,
    pub folder_id: Option<Uuid>,
    pub thumbnail_data: Option<String>,
}

impl NewFileRecord {
    /// Materialize into a full record with a fresh id and current timestamps.
    pub fn into_record(self) -> FileRecord {
        let now = Utc::now();
        FileRecord {
            id: Uuid::new_v4(),
            owner_id: self.owner_id,
            name: self.name,
            size: self.size,
            file_type: self.file_type,
            path: self.path,
            folder_id: self.folder_id,
            thumbnail_data: self.thumbnail_data,
            created_at: now,
            updated_at: now,
        }
    }
}
