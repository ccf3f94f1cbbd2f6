//! AWS credential resolution
//!
//! Picks one credential strategy per run and produces the [`ResolvedSession`]
//! every later stage shares. Precedence, first match wins:
//! 1. Explicit profile name (rejected when access keys are also supplied)
//! 2. Explicit access key id and secret
//! 3. `AWS_PROFILE` from the environment
//! 4. `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` from the environment
//!
//! When a role is given the session is wrapped in an STS assume-role provider.
//! The SDK's lazy identity cache only refreshes the temporary credentials
//! close to expiry.

use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::config::{Credentials, Region, SharedCredentialsProvider};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::{non_empty, CredentialInputs, DEFAULT_REGION};
use crate::error::{Result, SyncError};

pub const ENV_PROFILE: &str = "AWS_PROFILE";
pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
const ENV_CONFIG_FILE: &str = "AWS_CONFIG_FILE";
const ENV_CREDENTIALS_FILE: &str = "AWS_SHARED_CREDENTIALS_FILE";

const PROVIDER_NAME: &str = "s3-site-sync";
const ROLE_SESSION_NAME: &str = "s3-site-sync";

/// Source of environment variables
pub trait EnvLookup: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Where a profile name came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Flags,
    Environment,
}

/// The credential strategy chosen for a run
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Profile {
        name: String,
        origin: Origin,
    },
    AccessKeys {
        access_key_id: String,
        secret_access_key: String,
        session_token: Option<String>,
        origin: Origin,
    },
}

impl std::fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::Profile { name, origin } => f
                .debug_struct("Profile")
                .field("name", name)
                .field("origin", origin)
                .finish(),
            CredentialSource::AccessKeys { origin, .. } => f
                .debug_struct("AccessKeys")
                .field("origin", origin)
                .finish_non_exhaustive(),
        }
    }
}

impl CredentialSource {
    /// Human-readable strategy name for progress output
    pub fn describe(&self) -> String {
        match self {
            CredentialSource::Profile {
                name,
                origin: Origin::Flags,
            } => format!("Using profile {}", name),
            CredentialSource::Profile {
                name,
                origin: Origin::Environment,
            } => format!("Using default profile {}", name),
            CredentialSource::AccessKeys {
                origin: Origin::Flags,
                ..
            } => "Using access keys".to_string(),
            CredentialSource::AccessKeys {
                origin: Origin::Environment,
                ..
            } => "Using access keys from environment variables".to_string(),
        }
    }

    pub fn profile_name(&self) -> Option<&str> {
        match self {
            CredentialSource::Profile { name, .. } => Some(name),
            CredentialSource::AccessKeys { .. } => None,
        }
    }
}

/// Apply the precedence rules. Pure: only reads `env`.
pub fn select_source(inputs: &CredentialInputs, env: &dyn EnvLookup) -> Result<CredentialSource> {
    let inputs = CredentialInputs::new(
        inputs.access_key_id.clone(),
        inputs.secret_access_key.clone(),
        inputs.profile.clone(),
    );

    if let Some(name) = inputs.profile {
        if inputs.access_key_id.is_some() || inputs.secret_access_key.is_some() {
            return Err(SyncError::config(
                "cannot provide both profile and access key id/secret access key",
            ));
        }
        return Ok(CredentialSource::Profile {
            name,
            origin: Origin::Flags,
        });
    }

    if let (Some(access_key_id), Some(secret_access_key)) =
        (inputs.access_key_id, inputs.secret_access_key)
    {
        return Ok(CredentialSource::AccessKeys {
            access_key_id,
            secret_access_key,
            session_token: None,
            origin: Origin::Flags,
        });
    }

    if let Some(name) = non_empty(env.var(ENV_PROFILE)) {
        return Ok(CredentialSource::Profile {
            name,
            origin: Origin::Environment,
        });
    }

    let access_key_id = non_empty(env.var(ENV_ACCESS_KEY_ID))
        .ok_or_else(|| SyncError::config("no access key id provided"))?;
    let secret_access_key = non_empty(env.var(ENV_SECRET_ACCESS_KEY))
        .ok_or_else(|| SyncError::config("no secret access key provided"))?;

    Ok(CredentialSource::AccessKeys {
        access_key_id,
        secret_access_key,
        session_token: non_empty(env.var(ENV_SESSION_TOKEN)),
        origin: Origin::Environment,
    })
}

/// Credentials and region shared by every stage of a run
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    /// Profile the session was loaded from, if any
    pub identity: Option<String>,
    pub source: CredentialSource,
    pub assumed_role: Option<String>,
    config: SdkConfig,
}

impl ResolvedSession {
    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn region(&self) -> &str {
        self.config
            .region()
            .map(|r| r.as_ref())
            .unwrap_or(DEFAULT_REGION)
    }
}

/// Resolves the credentials for a run
pub struct CredentialResolver<E = ProcessEnv> {
    env: E,
}

impl CredentialResolver<ProcessEnv> {
    pub fn new() -> Self {
        Self { env: ProcessEnv }
    }
}

impl Default for CredentialResolver<ProcessEnv> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EnvLookup> CredentialResolver<E> {
    pub fn with_env(env: E) -> Self {
        Self { env }
    }

    /// Produce the session for this run. `region` applies unless a loaded
    /// profile names its own region.
    pub async fn resolve(
        &self,
        inputs: &CredentialInputs,
        region: &str,
        role: Option<&str>,
    ) -> Result<ResolvedSession> {
        let source = select_source(inputs, &self.env)?;
        tracing::info!("{}", source.describe());

        let fallback_region = non_empty(Some(region.to_string()))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let base = match &source {
            CredentialSource::Profile { name, .. } => {
                let files = SharedFiles::locate(&self.env);
                let catalog = ProfileCatalog::from_files(&files.config, &files.credentials)?;
                if !catalog.contains(name) {
                    return Err(SyncError::config(format!(
                        "AWS profile {} not found, known profiles: [{}]",
                        name,
                        catalog.profile_names().join(", ")
                    )));
                }
                let region = catalog
                    .region(name)
                    .map(str::to_string)
                    .unwrap_or(fallback_region);

                // Only the named profile may supply credentials, never the
                // environment keys the default chain would try first
                let provider = ProfileFileCredentialsProvider::builder()
                    .profile_files(files.profile_files())
                    .profile_name(name)
                    .build();

                aws_config::defaults(BehaviorVersion::latest())
                    .profile_files(files.profile_files())
                    .profile_name(name)
                    .region(Region::new(region))
                    .credentials_provider(provider)
                    .load()
                    .await
            }
            CredentialSource::AccessKeys {
                access_key_id,
                secret_access_key,
                session_token,
                ..
            } => {
                let credentials = Credentials::new(
                    access_key_id,
                    secret_access_key,
                    session_token.clone(),
                    None,
                    PROVIDER_NAME,
                );

                aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(fallback_region))
                    .credentials_provider(credentials)
                    .load()
                    .await
            }
        };

        let role = role.map(str::trim).filter(|r| !r.is_empty());
        let config = match role {
            Some(role) => assume_role(base, role).await,
            None => base,
        };

        Ok(ResolvedSession {
            identity: source.profile_name().map(str::to_string),
            source,
            assumed_role: role.map(str::to_string),
            config,
        })
    }
}

/// Wrap `base` so every client transparently uses temporary credentials for `role`.
async fn assume_role(base: SdkConfig, role: &str) -> SdkConfig {
    tracing::info!("Assuming role {}", role);

    let mut builder = AssumeRoleProvider::builder(role)
        .session_name(ROLE_SESSION_NAME)
        .configure(&base);
    if let Some(region) = base.region() {
        builder = builder.region(region.clone());
    }
    let provider = builder.build().await;

    base.into_builder()
        .credentials_provider(SharedCredentialsProvider::new(provider))
        .build()
}

/// Profiles declared in the shared AWS config and credentials files
#[derive(Debug, Default)]
pub struct ProfileCatalog {
    regions: HashMap<String, Option<String>>,
}

/// Locations of the shared AWS config and credentials files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFiles {
    pub config: PathBuf,
    pub credentials: PathBuf,
}

impl SharedFiles {
    /// Files named by `AWS_CONFIG_FILE` / `AWS_SHARED_CREDENTIALS_FILE`,
    /// falling back to `~/.aws/config` and `~/.aws/credentials`.
    pub fn locate(env: &dyn EnvLookup) -> Self {
        let aws_dir = non_empty(env.var("HOME"))
            .or_else(|| non_empty(env.var("USERPROFILE")))
            .map(|home| PathBuf::from(home).join(".aws"))
            .unwrap_or_else(|| PathBuf::from(".aws"));

        Self {
            config: non_empty(env.var(ENV_CONFIG_FILE))
                .map(PathBuf::from)
                .unwrap_or_else(|| aws_dir.join("config")),
            credentials: non_empty(env.var(ENV_CREDENTIALS_FILE))
                .map(PathBuf::from)
                .unwrap_or_else(|| aws_dir.join("credentials")),
        }
    }

    /// The same two files, for the SDK's profile loaders
    fn profile_files(&self) -> ProfileFiles {
        ProfileFiles::builder()
            .with_file(ProfileFileKind::Config, self.config.clone())
            .with_file(ProfileFileKind::Credentials, self.credentials.clone())
            .build()
    }
}

impl ProfileCatalog {
    pub fn from_files(config_path: &Path, credentials_path: &Path) -> Result<Self> {
        let mut catalog = Self::default();

        if credentials_path.exists() {
            catalog.parse(&read_profile_file(credentials_path)?, false);
        }
        if config_path.exists() {
            catalog.parse(&read_profile_file(config_path)?, true);
        }

        Ok(catalog)
    }

    /// Parse one INI-style file. Config files name sections `[profile x]`
    /// (except `[default]`), credentials files use the bare name.
    fn parse(&mut self, content: &str, is_config_file: bool) {
        let mut current: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let section = line[1..line.len() - 1].trim();
                current = if !is_config_file || section == "default" {
                    Some(section.to_string())
                } else {
                    section.strip_prefix("profile ").map(|n| n.trim().to_string())
                };

                if let Some(ref name) = current {
                    self.regions.entry(name.clone()).or_insert(None);
                }
                continue;
            }

            if let (Some(name), Some((key, value))) = (&current, line.split_once('=')) {
                if key.trim() == "region" && !value.trim().is_empty() {
                    self.regions
                        .insert(name.clone(), Some(value.trim().to_string()));
                }
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.regions.contains_key(name)
    }

    pub fn region(&self, name: &str) -> Option<&str> {
        self.regions.get(name).and_then(|r| r.as_deref())
    }

    pub fn profile_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.regions.keys().cloned().collect();
        names.sort();
        names
    }
}

fn read_profile_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        SyncError::config(format!("failed to read AWS profile file {}: {}", path.display(), e))
    })
}
