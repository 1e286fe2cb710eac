use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FileTypeError;

/// Opaque id the backend assigns to an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Extensions the upload picker offers. The backend applies its own check.
pub const ACCEPTED_UPLOAD_EXTENSIONS: [&str; 4] = ["pdf", "docx", "doc", "txt"];

/// Comma-separated `.ext` list, as shown in upload prompts and file filters.
pub fn accepted_extensions_filter() -> String {
    ACCEPTED_UPLOAD_EXTENSIONS
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Lower-cased extension of `filename`, without the dot.
pub fn upload_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn check_upload_filename(filename: &str) -> Result<(), FileTypeError> {
    if filename.trim().is_empty() {
        return Err(FileTypeError::MissingFilename);
    }
    let Some(ext) = upload_extension(filename) else {
        return Err(FileTypeError::MissingExtension {
            filename: filename.to_string(),
        });
    };
    if ACCEPTED_UPLOAD_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(FileTypeError::Unsupported {
            filename: filename.to_string(),
            extension: ext,
        })
    }
}
