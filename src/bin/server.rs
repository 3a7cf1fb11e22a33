use bulk_media_download::{BulkDownloader, Config, Result, api, shutdown_signal};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Serve bulk selection and zip download of record files over HTTP"
)]
struct Args {
    /// Path to the JSON config file (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    let config = Arc::new(config);
    let downloader = Arc::new(BulkDownloader::new((*config).clone()).await?);
    let session_sweeper = downloader.start_session_sweeper();

    let served = api::serve_with_shutdown(downloader.clone(), config, shutdown_signal()).await;
    if let Err(e) = &served {
        tracing::error!(error = %e, "API server failed");
    }

    session_sweeper.abort();
    downloader.shutdown().await?;
    served
}
