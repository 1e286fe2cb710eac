//! Issues backend requests and turns their outcomes into transcript entries
//! and registry refresh requests. Mutation itself is left to the session.

use std::sync::Arc;

use shared::{
    domain::DocumentId,
    protocol::{ChatRequest, DocumentSummary, SummaryResponse, UploadResponse},
};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    busy::{Activity, BusyFlags, BusyGuard, Operation},
    conversation::{Citation, ConversationTurn},
    error::BackendError,
    events::SessionEvent,
    RetrievalBackend,
};

pub const DELETE_CONFIRMATION: &str = "Document deleted successfully.";

pub fn upload_confirmation(response: &UploadResponse) -> String {
    format!(
        "Document \"{}\" uploaded successfully! {} chunks created.",
        response.filename, response.chunks_created
    )
}

pub fn summary_content(response: &SummaryResponse) -> String {
    format!("Summary of \"{}\":\n{}", response.filename, response.summary)
}

/// What a settled request asks the session to do.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub succeeded: bool,
    pub turn: Option<ConversationTurn>,
    pub refresh_documents: bool,
}

impl Settlement {
    fn succeeded(turn: ConversationTurn, refresh_documents: bool) -> Self {
        Self {
            succeeded: true,
            turn: Some(turn),
            refresh_documents,
        }
    }

    fn failed(turn: Option<ConversationTurn>) -> Self {
        Self {
            succeeded: false,
            turn,
            refresh_documents: false,
        }
    }
}

pub struct RequestCoordinator {
    backend: Arc<dyn RetrievalBackend>,
    busy: Arc<BusyFlags>,
}

impl RequestCoordinator {
    pub fn new(
        backend: Arc<dyn RetrievalBackend>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            backend,
            busy: BusyFlags::new(events),
        }
    }

    /// Claims the busy flag for `operation`; `None` while an exclusive
    /// operation of the same kind is in flight.
    pub fn begin(&self, operation: Operation) -> Option<BusyGuard> {
        self.busy.try_acquire(operation)
    }

    pub fn is_busy(&self, operation: Operation) -> bool {
        self.busy.is_busy(operation)
    }

    pub fn activity(&self) -> Activity {
        self.busy.snapshot()
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>, BackendError> {
        self.backend.list_documents().await
    }

    pub async fn upload_document(&self, payload: Vec<u8>, filename: &str) -> Settlement {
        let size_bytes = payload.len();
        match self.backend.upload_document(payload, filename).await {
            Ok(response) => {
                info!(
                    operation = "upload",
                    filename = %response.filename,
                    chunks_created = response.chunks_created,
                    size_bytes,
                    "document uploaded"
                );
                let turn = ConversationTurn::system(upload_confirmation(&response));
                Settlement::succeeded(turn, true)
            }
            Err(err) => {
                warn!(
                    operation = "upload",
                    filename,
                    status = ?err.status(),
                    "upload failed: {err}"
                );
                Settlement::failed(Some(ConversationTurn::error(err.user_message())))
            }
        }
    }

    /// Failures produce no turn; they are only logged.
    pub async fn delete_document(&self, document_id: &DocumentId) -> Settlement {
        match self.backend.delete_document(document_id).await {
            Ok(()) => {
                info!(operation = "delete", document_id = %document_id, "document deleted");
                Settlement::succeeded(ConversationTurn::system(DELETE_CONFIRMATION), true)
            }
            Err(err) => {
                warn!(
                    operation = "delete",
                    document_id = %document_id,
                    status = ?err.status(),
                    "delete failed: {err}"
                );
                Settlement::failed(None)
            }
        }
    }

    pub async fn ask(&self, query: &str, scope: Option<Vec<DocumentId>>) -> Settlement {
        let request = ChatRequest {
            query: query.to_string(),
            document_ids: scope,
        };
        match self.backend.ask(request).await {
            Ok(response) => {
                info!(
                    operation = "ask",
                    citations = response.citations.len(),
                    retrieved_chunks = ?response.retrieved_chunks,
                    "answer received"
                );
                let citations = response.citations.into_iter().map(Citation::from).collect();
                let turn = ConversationTurn::assistant(response.answer, citations);
                Settlement::succeeded(turn, false)
            }
            Err(err) => {
                warn!(operation = "ask", status = ?err.status(), "chat request failed: {err}");
                Settlement::failed(Some(ConversationTurn::error(err.user_message())))
            }
        }
    }

    pub async fn summarize_document(
        &self,
        document_id: &DocumentId,
        max_bullets: u32,
    ) -> Settlement {
        match self
            .backend
            .summarize_document(document_id, max_bullets)
            .await
        {
            Ok(response) => {
                info!(operation = "summarize", document_id = %document_id, "summary received");
                let turn = ConversationTurn::assistant(summary_content(&response), Vec::new());
                Settlement::succeeded(turn, false)
            }
            Err(err) => {
                warn!(
                    operation = "summarize",
                    document_id = %document_id,
                    status = ?err.status(),
                    "summary request failed: {err}"
                );
                Settlement::failed(Some(ConversationTurn::error(err.user_message())))
            }
        }
    }
}
