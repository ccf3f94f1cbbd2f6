//! s3-site-sync
//!
//! Clears an S3 bucket, uploads a static site into it and optionally
//! invalidates the CloudFront cache in front of it.

use clap::Parser;
use s3_site_sync::cli::{self, Cli};
use s3_site_sync::error::exit_code_from_error;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // Progress lines are info level, so show them unless RUST_LOG says otherwise
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("s3_site_sync=info")))
        .init();

    let cli = Cli::parse();
    tracing::debug!("Starting s3-site-sync v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = cli::run(cli, CancellationToken::new()).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code_from_error(&e));
    }
}
