use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{HttpBackend, Session, SessionEvent};
use tokio::{
    io::BufReader,
    sync::broadcast::{self, error::RecvError},
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod render;
mod repl;

#[derive(Parser, Debug)]
#[command(about = "Terminal client for the document research assistant")]
struct Args {
    /// Base address of the retrieval service, e.g. http://localhost:5000/api
    #[arg(long)]
    api_base_url: Option<String>,
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// tracing filter directive, e.g. `info` or `client_core=debug`
    #[arg(long)]
    log_filter: Option<String>,
    #[arg(long)]
    summary_bullets: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = config::load_settings(&args.config)?;
    settings.apply_overrides(args.api_base_url, args.log_filter, args.summary_bullets);

    let filter = EnvFilter::try_new(&settings.log_filter)
        .with_context(|| format!("invalid log filter '{}'", settings.log_filter))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let backend = HttpBackend::new(&settings.api_base_url)
        .with_context(|| format!("cannot use api base url '{}'", settings.api_base_url))?;
    info!(api_base_url = backend.base_url(), "starting research assistant");
    let session = Session::new(Arc::new(backend));

    let render_task = tokio::spawn(render_events(session.subscribe()));

    if !session.bootstrap().await {
        println!(
            "could not load documents from {}; is the service running?",
            settings.api_base_url
        );
    }
    println!("{}", render::format_documents(&session.documents().await, 0));
    println!("type a question, or :help for commands");

    repl::run(
        Arc::clone(&session),
        &settings,
        BufReader::new(tokio::io::stdin()),
    )
    .await?;

    // Last sender gone: the renderer prints what is queued, then sees Closed.
    drop(session);
    if let Err(err) = render_task.await {
        warn!("renderer stopped abnormally: {err}");
    }
    Ok(())
}

async fn render_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::TurnAppended { turn, .. }) => {
                println!("{}", render::format_turn(&turn));
            }
            Ok(SessionEvent::DocumentsReplaced(documents)) => {
                debug!(count = documents.len(), "document registry replaced");
            }
            Ok(SessionEvent::ActivityChanged(activity)) => {
                debug!(?activity, "activity changed");
            }
            Ok(SessionEvent::PendingUploadChanged(filename)) => {
                debug!(?filename, "staged upload changed");
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "renderer fell behind; some turns were not printed");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
