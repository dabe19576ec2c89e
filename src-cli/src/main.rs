//! Draftkeeper - terminal editor session with offline-tolerant autosave
//!
//! Edits one plain-text document through line commands. The "remote" is a
//! directory of files; `offline` and `online` stand in for the platform's
//! connectivity events.
//!
//! Usage:
//!   autosave --document notes
//!   autosave --data-dir ~/.draftkeeper --remote-dir /mnt/share --delay-ms 500
//!
//! Logs go to stderr; set `RUST_LOG=debug` for timer-level detail.

mod command;
mod settings;

use anyhow::{Context, Result};
use autosave::{
    AutoSaveController, ConnectionMonitor, FileContentWriter, SaveCallbacks, SaveStatus,
};
use clap::Parser;
use command::{Command, HELP};
use offline_store::{FileBackend, OfflineQueueStore};
use settings::{AppSettings, SETTINGS_FILE};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Offline-tolerant autosave for a plain-text document.
#[derive(Parser, Debug)]
#[command(name = "autosave")]
#[command(about = "Edit a document with debounced, offline-tolerant autosave")]
struct Args {
    /// Directory holding settings.json and the offline store
    #[arg(long, default_value = ".draftkeeper")]
    data_dir: PathBuf,

    /// Directory standing in for the remote document service
    #[arg(long, default_value = ".draftkeeper/remote")]
    remote_dir: PathBuf,

    /// Document to edit
    #[arg(long, default_value = "doc-1")]
    document: String,

    /// Debounce delay override (in milliseconds)
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Start with the connection down
    #[arg(long)]
    offline: bool,
}

type Session = AutoSaveController<FileContentWriter>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut settings = AppSettings::load(&args.data_dir.join(SETTINGS_FILE));
    if let Some(delay_ms) = args.delay_ms {
        settings.autosave.delay_ms = delay_ms;
    }

    let offline_dir = args.data_dir.join("offline");
    let backend = FileBackend::new(&offline_dir)
        .with_context(|| format!("Failed to open offline store at {}", offline_dir.display()))?;
    let store = OfflineQueueStore::with_config(Arc::new(backend), settings.store.clone());

    let writer = FileContentWriter::new(&args.remote_dir);
    let remote = writer
        .read(&args.document)
        .await
        .with_context(|| format!("Failed to read document {}", args.document))?;

    // The controller resumes from unsynced local work on its own
    if let Some(edit) = store.get_edit(&args.document) {
        println!(
            "Recovered unsynced edit from {} ({} failed sync attempts)",
            edit.created_at()
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "an unknown time".to_string()),
            edit.retry_count
        );
    }

    let monitor = ConnectionMonitor::new(Some(!args.offline));
    let callbacks = SaveCallbacks::new().on_save_error(|e| println!("  ! {}", e));

    tracing::info!(
        document = %args.document,
        data_dir = %args.data_dir.display(),
        remote_dir = %args.remote_dir.display(),
        "Starting autosave session"
    );

    let session = AutoSaveController::builder(args.document.clone(), writer)
        .initial_content(remote.unwrap_or_default())
        .store(store.clone())
        .monitor(monitor.clone())
        .config(settings.autosave)
        .callbacks(callbacks)
        .spawn();

    let mut status_rx = session.subscribe_status();
    let printer = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = *status_rx.borrow_and_update();
            if status != SaveStatus::Idle {
                println!("  [{}]", status.message());
            }
        }
    });

    println!("Editing '{}'. Type 'help' for commands.", args.document);
    run(&session, &store, &monitor).await?;

    session.force_save().await;
    session.shutdown();
    printer.abort();

    if store.get_edit(&args.document).is_some() {
        println!("Unsynced changes kept locally; they sync on the next online start.");
    }
    Ok(())
}

async fn run(session: &Session, store: &OfflineQueueStore, monitor: &ConnectionMonitor) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match command {
            Command::Set(text) => session.set_content(text),
            Command::Append(text) => session.set_content(session.content() + &text),
            Command::Save => session.force_save().await,
            Command::Sync => session.sync_now().await,
            Command::Offline => monitor.set_offline(),
            Command::Online => monitor.set_online(),
            Command::Status => print_status(session, monitor),
            Command::Queue => print_queue(store),
            Command::Clear => {
                store.clear_all();
                println!("Offline records cleared");
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => break,
        }
    }

    Ok(())
}

fn print_status(session: &Session, monitor: &ConnectionMonitor) {
    let info = session.status_info();
    let connection = monitor.current();

    println!("Document:   {}", session.document_id());
    println!("Length:     {} bytes", session.content().len());
    println!("Connection: {}", connection.short_status());
    if let Some(at) = connection.last_online {
        println!("Last lost:  {}", at.to_rfc3339());
    }
    println!("Status:     {:?}", info.status);
    if info.should_show() {
        println!("            {}", info.status_message);
    }
    if let Some(retries) = info.retry_count {
        println!("Retries:    {}", retries);
    }
    if let Some(at) = info.last_saved_at {
        println!("Last saved: {}", at.to_rfc3339());
    }
}

fn print_queue(store: &OfflineQueueStore) {
    let queue = store.get_queue();
    if queue.is_empty() {
        println!("Sync queue is empty");
        return;
    }

    for edit in queue {
        println!(
            "{}  doc={}  retries={}  bytes={}",
            edit.id,
            edit.document_id,
            edit.retry_count,
            edit.content.len()
        );
    }
}
