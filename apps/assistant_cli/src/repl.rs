//! The read loop. Backend commands run on their own tasks so the prompt stays
//! responsive; once input ends they are all awaited, never cancelled.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use client_core::{CommandStatus, Session, SkipReason};
use shared::domain::DocumentId;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    task::{JoinError, JoinSet},
};
use tracing::{info, warn};

use crate::{
    commands::{self, Command, DocumentRef},
    config::Settings,
    render,
};

/// Dispatches one command per line of `input` until it ends or `:quit`, then
/// waits for every request already issued.
pub async fn run<R>(session: Arc<Session>, settings: &Settings, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut tasks = JoinSet::new();
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        match commands::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => dispatch(&session, settings, command, &mut tasks).await,
            Err(err) => println!("{err}"),
        }
        while let Some(joined) = tasks.try_join_next() {
            log_join_failure(joined);
        }
    }

    if !tasks.is_empty() {
        info!(in_flight = tasks.len(), "waiting for requests in flight");
    }
    while let Some(joined) = tasks.join_next().await {
        log_join_failure(joined);
    }
    Ok(())
}

fn log_join_failure(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        warn!("command task failed: {err}");
    }
}

fn report(status: CommandStatus) {
    if let CommandStatus::Skipped(reason) = status {
        println!("{}", render::skip_message(reason));
    }
}

async fn dispatch(
    session: &Arc<Session>,
    settings: &Settings,
    command: Command,
    tasks: &mut JoinSet<()>,
) {
    match command {
        Command::Ask(text) => {
            let session = Arc::clone(session);
            tasks.spawn(async move { report(session.submit_message(&text).await) });
        }
        Command::Upload(path) => {
            if let Some(path) = path {
                if let Err(err) = stage_file(session, path).await {
                    println!("{err:#}");
                    return;
                }
            }
            let session = Arc::clone(session);
            tasks.spawn(async move { report(session.submit_upload().await) });
        }
        Command::ClearUpload => session.clear_pending_upload().await,
        Command::Docs => {
            let documents = session.documents().await;
            let focus = session.focus().await;
            println!("{}", render::format_documents(&documents, focus.len()));
        }
        Command::Delete(target) => {
            let Some(document_id) = resolve(session, &target).await else {
                return;
            };
            let session = Arc::clone(session);
            tasks.spawn(async move { report(session.request_delete(&document_id).await) });
        }
        Command::Summarize(target) => {
            let Some(document_id) = resolve(session, &target).await else {
                return;
            };
            let session = Arc::clone(session);
            let max_bullets = settings.summary_bullets;
            tasks.spawn(async move {
                report(session.request_summary(&document_id, max_bullets).await)
            });
        }
        Command::Focus(targets) => {
            let documents = session.documents().await;
            let ids = targets
                .iter()
                .filter_map(|target| target.resolve(&documents))
                .collect();
            let kept = session.focus_documents(ids).await;
            println!("questions focused on {kept} document(s)");
        }
        Command::Unfocus => {
            session.clear_focus().await;
            println!("questions cover all documents");
        }
        Command::Status => println!("{}", render::format_status(&session.view_state().await)),
        Command::Help => println!("{}", commands::help_text()),
        Command::Empty | Command::Quit => {}
    }
}

async fn stage_file(session: &Session, path: PathBuf) -> Result<()> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("'{}' does not name a file", path.display()))?;
    let payload = tokio::fs::read(&path)
        .await
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    session.select_file(payload, filename).await?;
    Ok(())
}

async fn resolve(session: &Session, target: &DocumentRef) -> Option<DocumentId> {
    let resolved = target.resolve(&session.documents().await);
    if resolved.is_none() {
        println!("{}", render::skip_message(SkipReason::UnknownDocument));
    }
    resolved
}
