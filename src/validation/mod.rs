//! Filename and content rules for clinical data files.

pub mod content;
pub mod filename;
pub mod record;

pub use content::{validate_content, IssueTally, ValidationResult};
pub use filename::{check_filename, validate_filename, FilenameIssue};
