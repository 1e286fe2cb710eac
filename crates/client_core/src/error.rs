use shared::error::FileTypeError;
use thiserror::Error;

use crate::busy::Operation;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The request never produced a readable response.
    #[error("{}: {message}", .operation.failure_label())]
    Transport {
        operation: Operation,
        message: String,
    },
    /// Non-2xx status. `message` is the body's `error` field, or the
    /// operation's fallback label when the body carried none.
    #[error("{message}")]
    Application {
        operation: Operation,
        status: u16,
        message: String,
    },
    /// 2xx status whose body did not match the expected shape.
    #[error("{}: {message}", .operation.failure_label())]
    Decode {
        operation: Operation,
        message: String,
    },
    #[error("invalid backend url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl BackendError {
    pub fn transport(operation: Operation, err: &reqwest::Error) -> Self {
        Self::Transport {
            operation,
            message: err.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Application { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text placed into an error turn.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    FileType(#[from] FileTypeError),
}
