//! PostgreSQL repositories
//!
//! Each repository wraps a `PgPool` and implements one of the seam traits.

mod file;
mod folder;
mod owner;

pub use file::PgFileRepository;
pub use folder::PgFolderRepository;
pub use owner::PgOwnerRepository;
