use std::fmt::Write as _;

use client_core::{ConversationTurn, SkipReason, TurnKind, ViewState};
use shared::protocol::DocumentSummary;

pub fn format_turn(turn: &ConversationTurn) -> String {
    let speaker = match turn.kind {
        TurnKind::User => "you",
        TurnKind::Assistant => "assistant",
        TurnKind::System => "system",
        TurnKind::Error => "error",
    };
    let mut out = format!("{speaker}> {}", turn.content);
    for (label, citation) in turn.numbered_citations() {
        let _ = write!(out, "\n    {label} {}: {}", citation.filename, citation.text);
        if let Some(page) = citation.page_number {
            let _ = write!(out, " (p. {page})");
        }
    }
    out
}

pub fn format_documents(documents: &[DocumentSummary], focus_count: usize) -> String {
    if documents.is_empty() {
        return "no documents uploaded yet".to_string();
    }
    let mut out = format!("{} document(s)", documents.len());
    if focus_count > 0 {
        let _ = write!(out, ", questions focused on {focus_count}");
    }
    for (position, doc) in documents.iter().enumerate() {
        let _ = write!(
            out,
            "\n  {:>2}. {}  [{}]  uploaded {}",
            position + 1,
            doc.filename,
            doc.document_id,
            doc.upload_date.format("%Y-%m-%d %H:%M")
        );
    }
    out
}

pub fn format_status(view: &ViewState) -> String {
    let activity = &view.activity;
    let mut in_flight = Vec::new();
    if activity.uploading {
        in_flight.push("upload".to_string());
    }
    if activity.chatting {
        in_flight.push("question".to_string());
    }
    if activity.summarizing {
        in_flight.push("summary".to_string());
    }
    if activity.deleting() {
        in_flight.push(format!("{} delete(s)", activity.deletes_in_flight));
    }
    if activity.refreshing() {
        in_flight.push("document refresh".to_string());
    }

    let refreshed = match view.documents_refreshed_at {
        Some(at) => format!("refreshed {}", at.format("%H:%M:%S UTC")),
        None => "never loaded".to_string(),
    };
    let mut out = format!(
        "documents: {} ({refreshed})  turns: {}  staged: {}",
        view.document_count,
        view.turn_count,
        view.pending_upload.as_deref().unwrap_or("none")
    );
    if !view.focus.is_empty() {
        let _ = write!(out, "  focus: {} document(s)", view.focus.len());
    }
    if in_flight.is_empty() {
        out.push_str("\nidle");
    } else {
        let _ = write!(out, "\nin flight: {}", in_flight.join(", "));
    }
    out
}

pub fn skip_message(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::BlankMessage => "nothing to send",
        SkipReason::NoDocuments => "upload a document before asking questions",
        SkipReason::ChatInFlight => "still waiting for the previous answer",
        SkipReason::NoPendingUpload => "no file staged; use :upload <path>",
        SkipReason::UploadInFlight => "an upload is already in progress",
        SkipReason::SummaryInFlight => "a summary is already in progress",
        SkipReason::UnknownDocument => "no such document; see :docs",
    }
}
