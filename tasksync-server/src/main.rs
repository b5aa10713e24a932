use std::sync::Arc;

use clap::Parser;
use tasksync_server::{router, AppState};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tasksync-server")]
#[command(about = "In-memory backend serving /todos and /taskLogs", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:3001")]
    bind: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tasksync_server=debug,tower_http=debug")),
        )
        .init();

    let app = router(Arc::new(AppState::new()));

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "Starting tasksync server");

    axum::serve(listener, app).await?;
    Ok(())
}
