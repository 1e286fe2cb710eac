//! Append-only chat transcript.

use chrono::{DateTime, Utc};
use shared::{domain::DocumentId, protocol::CitationPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnKind {
    User,
    Assistant,
    System,
    Error,
}

/// A source snippet backing an assistant answer. Position in the turn's
/// citation list is the reference number shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    pub filename: String,
    pub text: String,
    pub document_id: Option<DocumentId>,
    pub similarity_score: Option<f64>,
    pub page_number: Option<u32>,
}

impl From<CitationPayload> for Citation {
    fn from(value: CitationPayload) -> Self {
        Self {
            filename: value.filename,
            text: value.text,
            document_id: value.document_id,
            similarity_score: value.similarity_score,
            page_number: value.page_number,
        }
    }
}

/// `[1]` for the first citation, `[2]` for the second, and so on.
pub fn citation_label(index: usize) -> String {
    format!("[{}]", index + 1)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub kind: TurnKind,
    pub content: String,
    pub citations: Vec<Citation>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    fn new(kind: TurnKind, content: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self {
            kind,
            content: content.into(),
            citations,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnKind::User, content, Vec::new())
    }

    pub fn assistant(content: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self::new(TurnKind::Assistant, content, citations)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(TurnKind::System, content, Vec::new())
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(TurnKind::Error, content, Vec::new())
    }

    pub fn numbered_citations(&self) -> impl Iterator<Item = (String, &Citation)> + '_ {
        self.citations
            .iter()
            .enumerate()
            .map(|(index, citation)| (citation_label(index), citation))
    }
}

#[derive(Debug, Default, Clone)]
pub struct ConversationLog {
    turns: Vec<ConversationTurn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `turn` and returns the new length.
    pub fn append(&mut self, turn: ConversationTurn) -> usize {
        self.turns.push(turn);
        self.turns.len()
    }

    /// Turns in insertion order. Call again to restart.
    pub fn all(&self) -> std::slice::Iter<'_, ConversationTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
