//! Command line surface
//!
//! The root command runs a sync. `setup` saves a profile for the current
//! directory and `config` lists the profiles saved for it.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tokio::{select, signal};
use tokio_util::sync::CancellationToken;

use crate::config::{CredentialInputs, SyncConfig, DEFAULT_REGION};
use crate::error::SyncError;
use crate::s3::credentials::CredentialResolver;
use crate::settings::{ProfileStore, SavedProfile};
use crate::sync::{run_sync, SyncReport};

/// Upload a static site directory to an S3 bucket.
///
/// The bucket (or prefix) is emptied first, `.html` suffixes are dropped from
/// object keys except for index.html and error.html, and the CloudFront cache
/// can be invalidated afterwards.
#[derive(Parser, Debug)]
#[command(name = "s3-site-sync", version, about, long_about = None)]
pub struct Cli {
    /// Use the saved profile with this name
    #[arg(short = 'c', long = "config", value_name = "NAME")]
    pub config_name: Option<String>,

    #[command(flatten)]
    pub target: TargetArgs,

    /// S3-compatible endpoint; forces path-style addressing
    #[arg(long)]
    pub endpoint_url: Option<String>,

    /// Files uploaded at once
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// Saved profile document
    #[arg(long, env = "S3_SITE_SYNC_PROFILES", global = true)]
    pub profiles_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the profiles saved for the current directory
    Config,
    /// Save a profile for the current directory
    Setup(SetupArgs),
}

/// Where and how to sync
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Path to the static site directory
    #[arg(short = 'd', long)]
    pub directory: Option<PathBuf>,

    /// Bucket to sync into
    #[arg(short = 'b', long)]
    pub bucket: Option<String>,

    /// Key prefix inside the bucket
    #[arg(short = 'x', long)]
    pub prefix: Option<String>,

    #[arg(short = 'r', long, default_value = DEFAULT_REGION)]
    pub region: String,

    #[arg(long)]
    pub access_key_id: Option<String>,

    #[arg(long)]
    pub secret_access_key: Option<String>,

    /// AWS profile with credentials
    #[arg(short = 'p', long)]
    pub profile: Option<String>,

    /// ARN of a role to assume
    #[arg(long)]
    pub role: Option<String>,

    /// Invalidate the CloudFront distribution serving the bucket
    #[arg(long)]
    pub cf_invalidate: bool,
}

impl TargetArgs {
    pub fn to_config(&self) -> crate::error::Result<SyncConfig> {
        SyncConfig::new(
            Some(self.region.clone()),
            self.bucket.clone(),
            self.prefix.clone(),
            self.directory.clone(),
            CredentialInputs::new(
                self.access_key_id.clone(),
                self.secret_access_key.clone(),
                self.profile.clone(),
            ),
            self.role.clone(),
            self.cf_invalidate,
        )
    }
}

#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Name of the profile to save
    #[arg(long)]
    pub config_name: String,

    #[command(flatten)]
    pub target: TargetArgs,
}

/// Cancel `cancellation_token` on Ctrl-C
pub fn spawn_ctrl_c_handler(cancellation_token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        select! {
            _ = cancellation_token.cancelled() => {
                tracing::debug!("cancellation token cancelled");
            }
            _ = signal::ctrl_c() => {
                tracing::warn!("ctrl-c received, shutting down");
                cancellation_token.cancel();
            }
        }
    })
}

/// Wait for the handler task; a panic inside it is logged, not propagated
pub async fn join_ctrl_c_handler(handler: JoinHandle<()>) {
    if let Err(e) = handler.await {
        tracing::debug!("ctrl-c handler ended abnormally: {}", e);
    }
}

pub async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let store = match &cli.profiles_file {
        Some(path) => ProfileStore::at(path),
        None => ProfileStore::default_location()?,
    };

    match &cli.command {
        Some(Commands::Config) => list_profiles(&store),
        Some(Commands::Setup(args)) => save_profile(&store, args),
        None => {
            let config = build_config(&cli, &store)?;
            let handler = spawn_ctrl_c_handler(cancel.clone());

            let result = run_sync(&config, &CredentialResolver::new(), cancel.clone()).await;

            // Releases the handler when the run ended on its own
            cancel.cancel();
            join_ctrl_c_handler(handler).await;

            print_report(&result?);
            Ok(())
        }
    }
}

/// Resolve the run configuration from a saved profile or the flags
pub fn build_config(cli: &Cli, store: &ProfileStore) -> Result<SyncConfig> {
    let config = match &cli.config_name {
        Some(name) => {
            let mut config = store.find(name, &current_dir()?)?.to_config()?;
            config.invalidate_cache |= cli.target.cf_invalidate;
            config
        }
        None => cli.target.to_config()?,
    };

    Ok(config
        .with_endpoint_url(cli.endpoint_url.clone())
        .with_concurrency(cli.concurrency)?)
}

fn list_profiles(store: &ProfileStore) -> Result<()> {
    let cwd = current_dir()?;
    let profiles = store.for_directory(&cwd)?;

    if profiles.is_empty() {
        println!("No profiles saved for {}", cwd.display());
        return Ok(());
    }

    for profile in profiles {
        for line in profile.describe() {
            println!("{}", line);
        }
    }
    Ok(())
}

fn save_profile(store: &ProfileStore, args: &SetupArgs) -> Result<()> {
    if args.target.directory.is_none() {
        return Err(SyncError::config("directory is required").into());
    }

    let config = args.target.to_config()?;
    let profile = SavedProfile::from_config(&args.config_name, current_dir()?, &config);
    store.save(profile)?;

    println!("Profile {} saved to {}", args.config_name, store.path().display());
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("Removed {} objects", report.cleared.removed);
    if let Some(uploaded) = &report.uploaded {
        println!("Uploaded {} files", uploaded.uploaded);
    }
    if let Some(invalidation) = &report.invalidation {
        println!(
            "Invalidation {} created for distribution {}",
            invalidation.invalidation_id, invalidation.distribution_id
        );
    }
}

fn current_dir() -> crate::error::Result<PathBuf> {
    std::env::current_dir().map_err(|source| SyncError::LocalFile {
        path: PathBuf::from("."),
        source,
    })
}
