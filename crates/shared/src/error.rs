use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure body the retrieval backend returns alongside a non-2xx status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reads the `error` field of a failure body, or `None` when the body is not
/// JSON or carries no usable message.
pub fn structured_error_message(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    parsed
        .error
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty())
}

pub fn extract_error_message(body: &[u8], fallback: &str) -> String {
    structured_error_message(body).unwrap_or_else(|| fallback.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileTypeError {
    #[error("no file name provided")]
    MissingFilename,
    #[error("file '{filename}' has no extension")]
    MissingExtension { filename: String },
    #[error("file type '.{extension}' of '{filename}' is not supported")]
    Unsupported { filename: String, extension: String },
}
