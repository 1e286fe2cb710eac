use async_trait::async_trait;
use shared::{
    domain::DocumentId,
    protocol::{ChatRequest, ChatResponse, DocumentSummary, SummaryResponse, UploadResponse},
};

pub mod busy;
pub mod conversation;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod registry;
pub mod session;
pub mod transport;

pub use busy::{Activity, Operation};
pub use conversation::{citation_label, Citation, ConversationLog, ConversationTurn, TurnKind};
pub use coordinator::{RequestCoordinator, Settlement};
pub use error::{BackendError, SessionError};
pub use events::SessionEvent;
pub use registry::DocumentRegistry;
pub use session::{CommandStatus, PendingUpload, Session, SkipReason, ViewState};
pub use transport::HttpBackend;

/// The retrieval service's request/response contract. `HttpBackend` speaks
/// it over HTTP; tests substitute scripted implementations.
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, BackendError>;
    async fn upload_document(
        &self,
        payload: Vec<u8>,
        filename: &str,
    ) -> Result<UploadResponse, BackendError>;
    async fn delete_document(&self, document_id: &DocumentId) -> Result<(), BackendError>;
    async fn ask(&self, request: ChatRequest) -> Result<ChatResponse, BackendError>;
    async fn summarize_document(
        &self,
        document_id: &DocumentId,
        max_bullets: u32,
    ) -> Result<SummaryResponse, BackendError>;
}
