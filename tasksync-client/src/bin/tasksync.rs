use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tasksync_client::{logging, AppContext, ClientConfig, HttpProbe, NoopReminders};
use tasksync_core::{NetworkState, TaskDraft, TaskId};

#[derive(Parser)]
#[command(name = "tasksync")]
#[command(about = "Offline-first task list synced with a REST backend", long_about = None)]
struct Cli {
    /// TOML config file; defaults plus TASKSYNC_* variables when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override server.base_url
    #[arg(short, long)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile local tasks and history with the server
    Sync,
    /// Show tasks
    List,
    /// Create a task
    Add {
        title: String,
        #[arg(short, long)]
        description: Option<String>,
        /// RFC 3339 due date, e.g. 2025-06-01T09:00:00Z
        #[arg(long)]
        due: Option<DateTime<Utc>>,
    },
    /// Toggle completion of a task
    Complete { id: TaskId },
    /// Delete a task
    Delete { id: TaskId },
    /// Show the action log, optionally for one task
    History { id: Option<TaskId> },
    /// Show sync metadata
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::from_env(),
    };
    if let Some(server) = cli.server {
        config.server.base_url = server;
    }
    logging::init_tracing(&config.logging.filter);

    let probe = HttpProbe::new(format!("{}/todos", config.server.base_url), Duration::from_secs(3))?;
    let online = probe.probe().await;

    let mut app = AppContext::from_config(
        config,
        Arc::new(NoopReminders),
        NetworkState::new(online, online),
    )
    .await?;
    app.engine.initialize().await?;

    match cli.command {
        Command::Sync => {
            let outcome = app.engine.force_sync().await?;
            println!("{outcome:?}");
            if let Some(error) = app.engine.sync_state().sync_error {
                println!("Sync error: {error}");
            }
        }
        Command::List => {
            for task in app.tasks.list().await {
                let mark = if task.is_completed { "x" } else { " " };
                let due = task
                    .due_date
                    .map(|d| format!(" (due {})", d.format("%Y-%m-%d %H:%M")))
                    .unwrap_or_default();
                println!("[{mark}] {} {}{due}", task.id, task.title);
            }
        }
        Command::Add {
            title,
            description,
            due,
        } => {
            let mut draft = TaskDraft::new(title);
            draft.description = description;
            draft.due_date = due;
            let task = app.tasks.create(draft).await?;
            println!("Created {}", task.id);
        }
        Command::Complete { id } => {
            let task = app.tasks.toggle_complete(id).await?;
            println!("{} completed: {}", task.id, task.is_completed);
        }
        Command::Delete { id } => {
            let task = app.tasks.delete(id).await?;
            println!("Deleted {} {}", task.id, task.title);
        }
        Command::History { id } => {
            let entries = match id {
                Some(id) => app.action_log.history_for(id).await,
                None => app.action_log.get_log().await.entries,
            };
            for entry in entries {
                println!(
                    "{} {:<20} {} {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.action.display_name(),
                    entry.task_title,
                    entry.details.unwrap_or_default()
                );
            }
        }
        Command::Status => {
            let state = app.engine.sync_state();
            println!("Online:          {online}");
            println!("Phase:           {:?}", app.engine.phase());
            println!("Pending changes: {}", state.pending_changes);
            match state.last_sync_time {
                Some(time) => println!("Last sync:       {time}"),
                None => println!("Last sync:       never"),
            }
            if let Some(error) = state.sync_error {
                println!("Last error:      {error}");
            }
        }
    }

    app.shutdown();
    Ok(())
}
