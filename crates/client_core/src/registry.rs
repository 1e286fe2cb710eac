//! Client-side snapshot of the documents the backend knows about.

use chrono::{DateTime, Utc};
use shared::{domain::DocumentId, protocol::DocumentSummary};

/// Only ever rebuilt wholesale from a list response. Snapshots carry the
/// sequence number of the request that produced them so a slow, older
/// response cannot overwrite a newer one.
#[derive(Debug, Default, Clone)]
pub struct DocumentRegistry {
    documents: Vec<DocumentSummary>,
    applied_sequence: u64,
    refreshed_at: Option<DateTime<Utc>>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents in the order the backend listed them.
    pub fn list(&self) -> &[DocumentSummary] {
        &self.documents
    }

    pub fn contains(&self, document_id: &DocumentId) -> bool {
        self.documents
            .iter()
            .any(|document| &document.document_id == document_id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Replaces the whole snapshot. Returns `false`, leaving the registry
    /// untouched, when a newer request has already been applied.
    pub(crate) fn replace(&mut self, sequence: u64, documents: Vec<DocumentSummary>) -> bool {
        if sequence <= self.applied_sequence {
            return false;
        }
        self.documents = documents;
        self.applied_sequence = sequence;
        self.refreshed_at = Some(Utc::now());
        true
    }
}
