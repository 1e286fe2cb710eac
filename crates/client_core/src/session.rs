//! The session controller: owns the document registry, the transcript and
//! the staged upload, and exposes the commands a presentation layer binds to.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use shared::{
    domain::{check_upload_filename, DocumentId},
    protocol::DocumentSummary,
};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    busy::{Activity, BusyGuard, Operation},
    conversation::{ConversationLog, ConversationTurn},
    coordinator::{RequestCoordinator, Settlement},
    error::SessionError,
    events::SessionEvent,
    registry::DocumentRegistry,
    RetrievalBackend,
};

pub const DEFAULT_SUMMARY_BULLETS: u32 = 5;
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// A file staged for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub payload: Vec<u8>,
    pub filename: String,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    BlankMessage,
    NoDocuments,
    ChatInFlight,
    NoPendingUpload,
    UploadInFlight,
    SummaryInFlight,
    UnknownDocument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Completed,
    /// The guard at the top of the command rejected it; nothing was sent.
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub can_send: bool,
    pub can_upload: bool,
    pub is_busy: bool,
    pub activity: Activity,
    pub document_count: usize,
    /// When the registry last took a list response; `None` before the first.
    pub documents_refreshed_at: Option<DateTime<Utc>>,
    pub turn_count: usize,
    pub pending_upload: Option<String>,
    pub focus: Vec<DocumentId>,
}

pub struct Session {
    coordinator: RequestCoordinator,
    registry: RwLock<DocumentRegistry>,
    log: RwLock<ConversationLog>,
    pending_upload: Mutex<Option<PendingUpload>>,
    draft: Mutex<String>,
    focus: Mutex<Vec<DocumentId>>,
    upload_generation: AtomicU64,
    refresh_sequence: AtomicU64,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(backend: Arc<dyn RetrievalBackend>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            coordinator: RequestCoordinator::new(backend, events.clone()),
            registry: RwLock::new(DocumentRegistry::new()),
            log: RwLock::new(ConversationLog::new()),
            pending_upload: Mutex::new(None),
            draft: Mutex::new(String::new()),
            focus: Mutex::new(Vec::new()),
            upload_generation: AtomicU64::new(0),
            refresh_sequence: AtomicU64::new(0),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Initial registry load.
    pub async fn bootstrap(&self) -> bool {
        self.refresh_documents().await
    }

    /// Re-fetches the document list and swaps the registry. Failures keep
    /// the previous registry and are only logged. Returns whether the
    /// registry was replaced.
    pub async fn refresh_documents(&self) -> bool {
        let _refreshing = self.coordinator.begin(Operation::ListDocuments);
        let sequence = self.refresh_sequence.fetch_add(1, Ordering::AcqRel) + 1;

        let documents = match self.coordinator.list_documents().await {
            Ok(documents) => documents,
            Err(err) => {
                warn!(operation = "list_documents", "document refresh failed: {err}");
                return false;
            }
        };

        {
            let mut registry = self.registry.write().await;
            if !registry.replace(sequence, documents.clone()) {
                debug!(sequence, "stale document listing discarded");
                return false;
            }
            let _ = self
                .events
                .send(SessionEvent::DocumentsReplaced(documents.clone()));
        }
        info!(
            operation = "list_documents",
            count = documents.len(),
            "document registry refreshed"
        );

        self.focus
            .lock()
            .await
            .retain(|id| documents.iter().any(|doc| &doc.document_id == id));
        true
    }

    pub async fn documents(&self) -> Vec<DocumentSummary> {
        self.registry.read().await.list().to_vec()
    }

    pub async fn transcript(&self) -> Vec<ConversationTurn> {
        self.log.read().await.all().cloned().collect()
    }

    /// Stages a file for upload, replacing any file staged earlier. Files
    /// with an unaccepted extension are rejected and leave the staged file
    /// as it was.
    pub async fn select_file(
        &self,
        payload: Vec<u8>,
        filename: impl Into<String>,
    ) -> Result<(), SessionError> {
        let filename = filename.into();
        check_upload_filename(&filename)?;

        let generation = self.upload_generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(filename = %filename, size_bytes = payload.len(), "file staged for upload");
        *self.pending_upload.lock().await = Some(PendingUpload {
            payload,
            filename: filename.clone(),
            generation,
        });
        let _ = self
            .events
            .send(SessionEvent::PendingUploadChanged(Some(filename)));
        Ok(())
    }

    pub async fn clear_pending_upload(&self) {
        if self.pending_upload.lock().await.take().is_some() {
            let _ = self.events.send(SessionEvent::PendingUploadChanged(None));
        }
    }

    pub async fn pending_upload(&self) -> Option<String> {
        self.pending_upload
            .lock()
            .await
            .as_ref()
            .map(|pending| pending.filename.clone())
    }

    pub async fn submit_upload(&self) -> CommandStatus {
        let Some(pending) = self.pending_upload.lock().await.clone() else {
            return CommandStatus::Skipped(SkipReason::NoPendingUpload);
        };
        let Some(uploading) = self.coordinator.begin(Operation::Upload) else {
            return CommandStatus::Skipped(SkipReason::UploadInFlight);
        };

        let PendingUpload {
            payload,
            filename,
            generation,
        } = pending;
        let settlement = self.coordinator.upload_document(payload, &filename).await;
        if settlement.succeeded {
            self.clear_uploaded(generation).await;
        }
        self.settle(settlement, Some(uploading)).await;
        CommandStatus::Completed
    }

    /// A file staged while the upload was in flight stays staged.
    async fn clear_uploaded(&self, generation: u64) {
        let mut pending = self.pending_upload.lock().await;
        if pending.as_ref().map(|p| p.generation) == Some(generation) {
            *pending = None;
            let _ = self.events.send(SessionEvent::PendingUploadChanged(None));
        }
    }

    pub async fn set_draft(&self, text: impl Into<String>) {
        *self.draft.lock().await = text.into();
    }

    pub async fn submit_draft(&self) -> CommandStatus {
        let text = self.draft.lock().await.clone();
        self.submit_message(&text).await
    }

    /// Echoes the user turn immediately, then asks the backend and appends
    /// the answer or the error once the request settles.
    pub async fn submit_message(&self, text: &str) -> CommandStatus {
        if text.trim().is_empty() {
            return CommandStatus::Skipped(SkipReason::BlankMessage);
        }
        if self.registry.read().await.is_empty() {
            return CommandStatus::Skipped(SkipReason::NoDocuments);
        }
        let Some(chatting) = self.coordinator.begin(Operation::Ask) else {
            return CommandStatus::Skipped(SkipReason::ChatInFlight);
        };

        self.append_turn(ConversationTurn::user(text)).await;
        self.draft.lock().await.clear();

        let scope = self.scope().await;
        let settlement = self.coordinator.ask(text, scope).await;
        self.settle(settlement, Some(chatting)).await;
        CommandStatus::Completed
    }

    /// Not gated: deletions may overlap with each other and with anything
    /// else.
    pub async fn request_delete(&self, document_id: &DocumentId) -> CommandStatus {
        let deleting = self.coordinator.begin(Operation::Delete);
        let settlement = self.coordinator.delete_document(document_id).await;
        self.settle(settlement, deleting).await;
        CommandStatus::Completed
    }

    pub async fn request_summary(
        &self,
        document_id: &DocumentId,
        max_bullets: u32,
    ) -> CommandStatus {
        if !self.registry.read().await.contains(document_id) {
            return CommandStatus::Skipped(SkipReason::UnknownDocument);
        }
        let Some(summarizing) = self.coordinator.begin(Operation::Summarize) else {
            return CommandStatus::Skipped(SkipReason::SummaryInFlight);
        };

        let settlement = self
            .coordinator
            .summarize_document(document_id, max_bullets)
            .await;
        self.settle(settlement, Some(summarizing)).await;
        CommandStatus::Completed
    }

    /// Restricts later questions to `document_ids`. Ids not in the registry
    /// are dropped; returns how many were kept.
    pub async fn focus_documents(&self, document_ids: Vec<DocumentId>) -> usize {
        let registry = self.registry.read().await;
        let mut focus = self.focus.lock().await;
        focus.clear();
        for id in document_ids {
            if registry.contains(&id) && !focus.contains(&id) {
                focus.push(id);
            }
        }
        focus.len()
    }

    pub async fn clear_focus(&self) {
        self.focus.lock().await.clear();
    }

    pub async fn focus(&self) -> Vec<DocumentId> {
        self.focus.lock().await.clone()
    }

    async fn scope(&self) -> Option<Vec<DocumentId>> {
        let focus = self.focus.lock().await;
        (!focus.is_empty()).then(|| focus.clone())
    }

    pub fn activity(&self) -> Activity {
        self.coordinator.activity()
    }

    pub fn is_busy(&self, operation: Operation) -> bool {
        self.coordinator.is_busy(operation)
    }

    pub async fn view_state(&self) -> ViewState {
        let activity = self.coordinator.activity();
        let (document_count, documents_refreshed_at) = {
            let registry = self.registry.read().await;
            (registry.len(), registry.refreshed_at())
        };
        let turn_count = self.log.read().await.len();
        let pending_upload = self.pending_upload().await;
        let draft_ready = !self.draft.lock().await.trim().is_empty();

        ViewState {
            can_send: draft_ready && !activity.chatting && document_count > 0,
            can_upload: pending_upload.is_some() && !activity.uploading,
            is_busy: activity.is_busy(),
            activity,
            document_count,
            documents_refreshed_at,
            turn_count,
            pending_upload,
            focus: self.focus().await,
        }
    }

    /// Applies a settled request: append its turn, release its busy flag,
    /// then refresh the registry if the request changed it.
    async fn settle(&self, settlement: Settlement, guard: Option<BusyGuard>) {
        if let Some(turn) = settlement.turn {
            self.append_turn(turn).await;
        }
        drop(guard);
        if settlement.refresh_documents {
            self.refresh_documents().await;
        }
    }

    async fn append_turn(&self, turn: ConversationTurn) -> usize {
        let mut log = self.log.write().await;
        let len = log.append(turn.clone());
        let _ = self.events.send(SessionEvent::TurnAppended {
            index: len - 1,
            turn,
        });
        len
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
