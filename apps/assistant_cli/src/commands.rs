//! Parsing of REPL input lines.

use std::path::PathBuf;

use shared::{
    domain::{accepted_extensions_filter, DocumentId},
    protocol::DocumentSummary,
};
use thiserror::Error;

/// A document as typed by the user: a 1-based position in the listing or a
/// raw id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentRef {
    Position(usize),
    Id(String),
}

impl DocumentRef {
    fn parse(token: &str) -> Self {
        match token.parse::<usize>() {
            Ok(position) if position > 0 => Self::Position(position),
            _ => Self::Id(token.to_string()),
        }
    }

    /// Positions outside the listing are tried as ids, since ids may be
    /// numeric too.
    pub fn resolve(&self, documents: &[DocumentSummary]) -> Option<DocumentId> {
        let by_id = |id: &str| {
            documents
                .iter()
                .find(|doc| doc.document_id.as_str() == id)
                .map(|doc| doc.document_id.clone())
        };
        match self {
            Self::Position(position) => position
                .checked_sub(1)
                .and_then(|index| documents.get(index))
                .map(|doc| doc.document_id.clone())
                .or_else(|| by_id(&position.to_string())),
            Self::Id(id) => by_id(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    /// `None` retries the file that is still staged.
    Upload(Option<PathBuf>),
    ClearUpload,
    Docs,
    Delete(DocumentRef),
    Summarize(DocumentRef),
    Focus(Vec<DocumentRef>),
    Unfocus,
    Status,
    Help,
    Quit,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command ':{0}' (try :help)")]
    Unknown(String),
    #[error(":{0} needs a document number or id")]
    MissingDocument(&'static str),
}

pub fn help_text() -> String {
    format!(
        "\
commands:
  <text>               ask a question about the uploaded documents
  :upload [path]       upload a {} file (no path retries the staged file)
  :clear-upload        forget the staged file
  :docs                list uploaded documents
  :delete <n|id>       delete a document
  :summarize <n|id>    summarize a document
  :focus <n|id>...     restrict questions to these documents
  :unfocus             ask about all documents again
  :status              show what is in flight
  :help                show this text
  :quit                exit",
        accepted_extensions_filter()
    )
}

pub fn parse(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix(':') else {
        if line.is_empty() {
            return Ok(Command::Empty);
        }
        return Ok(Command::Ask(line.to_string()));
    };

    let (name, argument) = match rest.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (rest, ""),
    };

    let command = match name {
        "upload" | "u" => {
            Command::Upload((!argument.is_empty()).then(|| PathBuf::from(argument)))
        }
        "clear-upload" => Command::ClearUpload,
        "docs" | "d" => Command::Docs,
        "delete" | "rm" => Command::Delete(single_document(argument, "delete")?),
        "summarize" | "sum" => Command::Summarize(single_document(argument, "summarize")?),
        "focus" => {
            let refs: Vec<_> = argument.split_whitespace().map(DocumentRef::parse).collect();
            if refs.is_empty() {
                return Err(CommandError::MissingDocument("focus"));
            }
            Command::Focus(refs)
        }
        "unfocus" => Command::Unfocus,
        "status" | "s" => Command::Status,
        "help" | "h" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(command)
}

fn single_document(argument: &str, command: &'static str) -> Result<DocumentRef, CommandError> {
    if argument.is_empty() {
        return Err(CommandError::MissingDocument(command));
    }
    Ok(DocumentRef::parse(argument))
}
