//! Notifications broadcast to presentation layers bound to a session.

use shared::protocol::DocumentSummary;

use crate::{busy::Activity, conversation::ConversationTurn};

#[derive(Debug, Clone)]
pub enum SessionEvent {
    TurnAppended {
        index: usize,
        turn: ConversationTurn,
    },
    DocumentsReplaced(Vec<DocumentSummary>),
    ActivityChanged(Activity),
    /// Filename of the staged upload, or `None` once it is cleared.
    PendingUploadChanged(Option<String>),
}
