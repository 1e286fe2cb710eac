use super::*;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Mutex};

use crate::{conversation::TurnKind, session::Session, CommandStatus};

#[derive(Debug, Clone, PartialEq)]
struct ReceivedFile {
    field: Option<String>,
    filename: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Clone, Default)]
struct ServiceState {
    documents: Arc<Mutex<Vec<Value>>>,
    uploads: Arc<Mutex<Vec<ReceivedFile>>>,
    chat_bodies: Arc<Mutex<Vec<Value>>>,
    summarize_calls: Arc<Mutex<Vec<(String, Value)>>>,
    /// Canned `(status, body)` served instead of the normal reply.
    upload_override: Arc<Mutex<Option<(StatusCode, String)>>>,
    chat_override: Arc<Mutex<Option<(StatusCode, String)>>>,
}

fn json_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn list_documents(State(state): State<ServiceState>) -> Json<Value> {
    let documents = state.documents.lock().await.clone();
    Json(json!({ "documents": documents }))
}

async fn upload_document(
    State(state): State<ServiceState>,
    mut multipart: Multipart,
) -> Response {
    let mut received = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let field_name = field.name().map(str::to_string);
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        received = Some(ReceivedFile {
            field: field_name,
            filename,
            content_type,
            bytes,
        });
    }
    let Some(received) = received else {
        return json_response(
            StatusCode::BAD_REQUEST,
            json!({"error": "No file provided"}).to_string(),
        );
    };
    state.uploads.lock().await.push(received.clone());

    if let Some((status, body)) = state.upload_override.lock().await.clone() {
        return json_response(status, body);
    }
    let filename = received.filename.unwrap_or_default();
    let mut documents = state.documents.lock().await;
    let document_id = format!("doc-{}", documents.len() + 1);
    documents.push(json!({
        "document_id": document_id,
        "filename": filename,
        "upload_date": "2024-05-01T12:00:00.000001",
        "file_type": filename.rsplit_once('.').map(|(_, ext)| ext),
    }));
    Json(json!({
        "message": "Document uploaded and processed successfully",
        "document_id": document_id,
        "filename": filename,
        "chunks_created": 3,
    }))
    .into_response()
}

async fn delete_document(
    State(state): State<ServiceState>,
    Path(document_id): Path<String>,
) -> Response {
    let mut documents = state.documents.lock().await;
    let before = documents.len();
    documents.retain(|doc| doc["document_id"] != document_id.as_str());
    if documents.len() == before {
        return json_response(
            StatusCode::NOT_FOUND,
            json!({"error": "Document not found"}).to_string(),
        );
    }
    Json(json!({"message": "Document deleted successfully"})).into_response()
}

async fn chat(State(state): State<ServiceState>, Json(body): Json<Value>) -> Response {
    state.chat_bodies.lock().await.push(body.clone());
    if let Some((status, reply)) = state.chat_override.lock().await.clone() {
        return json_response(status, reply);
    }
    Json(json!({
        "answer": "Refunds within 30 days.",
        "citations": [
            {"document_id": "doc-1", "filename": "report.pdf", "text": "30-day refund window.",
             "similarity_score": 0.87, "chunk_index": 2},
            {"document_id": "doc-1", "filename": "report.pdf", "text": "Receipts required."}
        ],
        "retrieved_chunks": 2,
    }))
    .into_response()
}

async fn summarize_document(
    State(state): State<ServiceState>,
    Path(document_id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state
        .summarize_calls
        .lock()
        .await
        .push((document_id.clone(), body));
    Json(json!({
        "document_id": document_id,
        "filename": "report.pdf",
        "summary": "- refunds take 30 days",
    }))
}

async fn spawn_service() -> Result<(String, ServiceState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServiceState::default();
    let api = Router::new()
        .route("/documents", get(list_documents))
        .route("/upload-document", post(upload_document))
        .route("/delete-document/:document_id", delete(delete_document))
        .route("/chat", post(chat))
        .route("/summarize-document/:document_id", post(summarize_document))
        .with_state(state.clone());
    let app = Router::new().nest("/api", api);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api"), state))
}

async fn seed_document(state: &ServiceState, id: &str, filename: &str) {
    state.documents.lock().await.push(json!({
        "document_id": id,
        "filename": filename,
        "upload_date": "2024-03-01T10:15:30.123456",
    }));
}

#[tokio::test]
async fn lists_documents_in_server_order() {
    let (base_url, state) = spawn_service().await.expect("spawn service");
    seed_document(&state, "b", "zeta.pdf").await;
    seed_document(&state, "a", "alpha.txt").await;
    let backend = HttpBackend::new(&base_url).expect("backend");

    let documents = backend.list_documents().await.expect("list");

    let ids: Vec<_> = documents.iter().map(|doc| doc.document_id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(documents[1].filename, "alpha.txt");
}

#[tokio::test]
async fn upload_sends_file_under_multipart_field() {
    let (base_url, state) = spawn_service().await.expect("spawn service");
    let backend = HttpBackend::new(&format!("{base_url}/")).expect("backend");

    let response = backend
        .upload_document(b"%PDF-1.7 body".to_vec(), "report.pdf")
        .await
        .expect("upload");

    assert_eq!(response.filename, "report.pdf");
    assert_eq!(response.chunks_created, 3);
    assert_eq!(response.document_id, Some(DocumentId::new("doc-1")));
    let uploads = state.uploads.lock().await.clone();
    assert_eq!(
        uploads,
        vec![ReceivedFile {
            field: Some("file".into()),
            filename: Some("report.pdf".into()),
            content_type: Some("application/pdf".into()),
            bytes: b"%PDF-1.7 body".to_vec(),
        }]
    );
}

#[tokio::test]
async fn upload_error_body_is_extracted() {
    let (base_url, state) = spawn_service().await.expect("spawn service");
    *state.upload_override.lock().await = Some((
        StatusCode::BAD_REQUEST,
        json!({"error": "File type not supported. Supported types: txt, pdf, docx, doc"})
            .to_string(),
    ));
    let backend = HttpBackend::new(&base_url).expect("backend");

    let err = backend
        .upload_document(b"x".to_vec(), "notes.txt")
        .await
        .expect_err("rejected upload");

    assert_eq!(
        err,
        BackendError::Application {
            operation: Operation::Upload,
            status: 400,
            message: "File type not supported. Supported types: txt, pdf, docx, doc".into(),
        }
    );
}

#[tokio::test]
async fn unreadable_error_body_falls_back_to_operation_label() {
    let (base_url, state) = spawn_service().await.expect("spawn service");
    *state.upload_override.lock().await = Some((
        StatusCode::INTERNAL_SERVER_ERROR,
        "<html>Internal Server Error</html>".into(),
    ));
    *state.chat_override.lock().await =
        Some((StatusCode::BAD_GATEWAY, json!({"detail": "upstream"}).to_string()));
    let backend = HttpBackend::new(&base_url).expect("backend");

    let upload = backend
        .upload_document(b"x".to_vec(), "notes.txt")
        .await
        .expect_err("upload fails");
    let chat = backend
        .ask(ChatRequest {
            query: "anything".into(),
            document_ids: None,
        })
        .await
        .expect_err("chat fails");

    assert_eq!(upload.user_message(), "Upload failed");
    assert_eq!(upload.status(), Some(500));
    assert_eq!(chat.user_message(), "Chat request failed");
    assert_eq!(chat.status(), Some(502));
}

#[tokio::test]
async fn delete_targets_percent_encoded_document_path() {
    let (base_url, state) = spawn_service().await.expect("spawn service");
    seed_document(&state, "q3 report", "q3.pdf").await;
    seed_document(&state, "keep", "keep.txt").await;
    let backend = HttpBackend::new(&base_url).expect("backend");

    backend
        .delete_document(&DocumentId::new("q3 report"))
        .await
        .expect("delete");

    let remaining = state.documents.lock().await.clone();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["document_id"], "keep");
}

#[tokio::test]
async fn delete_of_unknown_document_reports_not_found() {
    let (base_url, _state) = spawn_service().await.expect("spawn service");
    let backend = HttpBackend::new(&base_url).expect("backend");

    let err = backend
        .delete_document(&DocumentId::new("missing"))
        .await
        .expect_err("404");

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.user_message(), "Document not found");
}

#[tokio::test]
async fn chat_posts_query_and_scope() {
    let (base_url, state) = spawn_service().await.expect("spawn service");
    let backend = HttpBackend::new(&base_url).expect("backend");

    let response = backend
        .ask(ChatRequest {
            query: "What is the refund policy?".into(),
            document_ids: Some(vec![DocumentId::new("doc-1")]),
        })
        .await
        .expect("chat");

    assert_eq!(response.answer, "Refunds within 30 days.");
    assert_eq!(response.citations.len(), 2);
    assert_eq!(response.citations[0].similarity_score, Some(0.87));
    assert_eq!(response.retrieved_chunks, Some(2));
    assert_eq!(
        state.chat_bodies.lock().await.clone(),
        vec![json!({"query": "What is the refund policy?", "document_ids": ["doc-1"]})]
    );
}

#[tokio::test]
async fn success_status_with_malformed_body_is_a_decode_error() {
    let (base_url, state) = spawn_service().await.expect("spawn service");
    *state.chat_override.lock().await =
        Some((StatusCode::OK, json!({"reply": "wrong shape"}).to_string()));
    let backend = HttpBackend::new(&base_url).expect("backend");

    let err = backend
        .ask(ChatRequest {
            query: "hello".into(),
            document_ids: None,
        })
        .await
        .expect_err("decode failure");

    assert!(matches!(
        err,
        BackendError::Decode {
            operation: Operation::Ask,
            ..
        }
    ));
    assert!(err.user_message().starts_with("Chat request failed: "));
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let backend = HttpBackend::new(&format!("http://{addr}/api")).expect("backend");

    let err = backend
        .ask(ChatRequest {
            query: "hello".into(),
            document_ids: None,
        })
        .await
        .expect_err("connection refused");

    assert!(matches!(err, BackendError::Transport { .. }));
    assert_eq!(err.status(), None);
    assert!(err.user_message().starts_with("Chat request failed: "));
}

#[tokio::test]
async fn summarize_posts_bullet_limit() {
    let (base_url, state) = spawn_service().await.expect("spawn service");
    let backend = HttpBackend::new(&base_url).expect("backend");

    let summary = backend
        .summarize_document(&DocumentId::new("doc-1"), 3)
        .await
        .expect("summary");

    assert_eq!(summary.summary, "- refunds take 30 days");
    assert_eq!(
        state.summarize_calls.lock().await.clone(),
        vec![("doc-1".to_string(), json!({"max_bullets": 3}))]
    );
}

#[test]
fn base_url_is_validated_and_trimmed() {
    assert_eq!(
        normalize_base_url(" http://localhost:5000/api// ").expect("valid"),
        "http://localhost:5000/api"
    );
    assert!(matches!(
        normalize_base_url("ftp://example.com"),
        Err(BackendError::InvalidBaseUrl { .. })
    ));
    assert!(normalize_base_url("not a url").is_err());
}

#[tokio::test]
async fn session_round_trip_over_http() {
    let (base_url, state) = spawn_service().await.expect("spawn service");
    let session = Session::new(Arc::new(HttpBackend::new(&base_url).expect("backend")));
    assert!(session.bootstrap().await);
    assert_eq!(session.view_state().await.document_count, 0);

    session
        .select_file(b"refund policy text".to_vec(), "report.pdf")
        .await
        .expect("stage");
    assert_eq!(session.submit_upload().await, CommandStatus::Completed);
    assert_eq!(session.documents().await.len(), 1);

    assert_eq!(
        session.submit_message("What is the refund policy?").await,
        CommandStatus::Completed
    );
    let transcript = session.transcript().await;
    let kinds: Vec<_> = transcript.iter().map(|turn| turn.kind).collect();
    assert_eq!(
        kinds,
        vec![TurnKind::System, TurnKind::User, TurnKind::Assistant]
    );
    assert_eq!(
        transcript[0].content,
        "Document \"report.pdf\" uploaded successfully! 3 chunks created."
    );
    let labels: Vec<_> = transcript[2]
        .numbered_citations()
        .map(|(label, _)| label)
        .collect();
    assert_eq!(labels, vec!["[1]", "[2]"]);

    // overlapping deletes of the same document: one succeeds, one is silent
    let id = DocumentId::new("doc-1");
    let (first, second) =
        futures::future::join(session.request_delete(&id), session.request_delete(&id)).await;
    assert_eq!((first, second), (CommandStatus::Completed, CommandStatus::Completed));
    assert!(state.documents.lock().await.is_empty());
    assert!(session.documents().await.is_empty());
    let confirmations = session
        .transcript()
        .await
        .iter()
        .filter(|turn| turn.content == "Document deleted successfully.")
        .count();
    assert_eq!(confirmations, 1);
    assert!(!session.activity().deleting());
}
