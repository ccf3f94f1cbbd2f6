//! Saved sync profiles
//!
//! Profiles live in one JSON document in the platform-specific config folder:
//! - Linux: ~/.config/s3-site-sync/profiles.json
//! - Windows: %APPDATA%/s3-site-sync/profiles.json
//! - macOS: ~/Library/Application Support/s3-site-sync/profiles.json
//!
//! Each profile is bound to the directory it was saved from and is unique by
//! (name, directory). Saving appends; existing records are never modified.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::config::{CredentialInputs, SyncConfig};
use crate::error::{Result, SyncError};

/// Characters of a secret left visible by [`mask_secret`]
pub const VISIBLE_SECRET_CHARS: usize = 3;
const SECRET_MASK: &str = "***";

/// A named set of sync settings bound to a local directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedProfile {
    /// Absolute directory the profile was saved from
    pub user_directory: PathBuf,
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    /// AWS profile name used for credentials
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub role: String,
    pub bucket: String,
    #[serde(default)]
    pub directory: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    #[serde(default)]
    pub invalidate_cache: bool,
}

impl SavedProfile {
    /// Capture `config` as a profile named `name` owned by `user_directory`
    pub fn from_config(name: &str, user_directory: PathBuf, config: &SyncConfig) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();

        Self {
            user_directory,
            name: name.to_string(),
            region: config.region.clone(),
            access_key_id: text(&config.credentials.access_key_id),
            secret_access_key: text(&config.credentials.secret_access_key),
            profile: text(&config.credentials.profile),
            role: text(&config.role),
            bucket: config.bucket.clone(),
            directory: config
                .directory
                .as_ref()
                .map(|d| d.to_string_lossy().into_owned())
                .unwrap_or_default(),
            prefix: config.prefix().to_string(),
            invalidate_cache: config.invalidate_cache,
        }
    }

    /// Build the run configuration this profile describes
    pub fn to_config(&self) -> Result<SyncConfig> {
        let some = |v: &str| Some(v.to_string());

        SyncConfig::new(
            some(&self.region),
            some(&self.bucket),
            some(&self.prefix),
            Some(PathBuf::from(&self.directory)),
            CredentialInputs::new(
                some(&self.access_key_id),
                some(&self.secret_access_key),
                some(&self.profile),
            ),
            some(&self.role),
            self.invalidate_cache,
        )
    }

    /// Lines for the `config` listing, secrets masked
    pub fn describe(&self) -> Vec<String> {
        let mut lines = vec![
            self.name.clone(),
            format!("    bucket: {}", self.bucket),
            format!("    region: {}", self.region),
            format!("    directory: {}", self.directory),
        ];

        if !self.prefix.is_empty() {
            lines.push(format!("    prefix: {}", self.prefix));
        }
        if !self.profile.is_empty() {
            lines.push(format!("    profile: {}", self.profile));
        }
        if !self.role.is_empty() {
            lines.push(format!("    role: {}", self.role));
        }
        if !self.access_key_id.is_empty() {
            lines.push(format!("    access key id: {}", mask_secret(&self.access_key_id)));
        }
        if !self.secret_access_key.is_empty() {
            lines.push(format!(
                "    secret access key: {}",
                mask_secret(&self.secret_access_key)
            ));
        }
        if self.invalidate_cache {
            lines.push("    invalidate cache: true".to_string());
        }

        lines
    }
}

/// Show the first few characters of a secret, mask the rest
pub fn mask_secret(secret: &str) -> String {
    match secret.char_indices().nth(VISIBLE_SECRET_CHARS) {
        Some((end, _)) => format!("{}{}", &secret[..end], SECRET_MASK),
        None => secret.to_string(),
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    profiles: Vec<SavedProfile>,
}

/// JSON-file backed profile store
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the platform config directory
    pub fn default_location() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("org", "github.n-orlov", "s3-site-sync").ok_or_else(|| {
            SyncError::config("failed to determine the profile store directory")
        })?;

        Ok(Self::at(proj_dirs.config_dir().join("profiles.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every profile in the store
    pub fn load_all(&self) -> Result<Vec<SavedProfile>> {
        if !self.path.exists() {
            tracing::debug!("Profile store {:?} not found", self.path);
            return Err(SyncError::config(
                "no config profiles found, create one using the setup subcommand",
            ));
        }

        Ok(self.read()?.profiles)
    }

    /// Profiles saved from `directory`
    pub fn for_directory(&self, directory: &Path) -> Result<Vec<SavedProfile>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|p| p.user_directory == directory)
            .collect())
    }

    /// The profile called `name` saved from `directory`
    pub fn find(&self, name: &str, directory: &Path) -> Result<SavedProfile> {
        self.for_directory(directory)?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| SyncError::config(format!("config with name {} not found", name)))
    }

    /// Append `profile`. Fails, leaving the file untouched, when a profile
    /// with the same name and directory exists.
    pub fn save(&self, profile: SavedProfile) -> Result<()> {
        let mut file = if self.path.exists() {
            self.read()?
        } else {
            ProfileFile::default()
        };

        if file
            .profiles
            .iter()
            .any(|p| p.name == profile.name && p.user_directory == profile.user_directory)
        {
            return Err(SyncError::DuplicateProfile {
                name: profile.name,
                directory: profile.user_directory,
            });
        }

        tracing::info!(
            "Saving profile {} for {}",
            profile.name,
            profile.user_directory.display()
        );
        file.profiles.push(profile);
        self.write(&file)
    }

    fn read(&self) -> Result<ProfileFile> {
        let contents = fs::read_to_string(&self.path).map_err(|e| self.error(e))?;
        serde_json::from_str(&contents).map_err(|e| self.error(e))
    }

    /// Replace the document atomically: write a sibling temp file, then rename it
    fn write(&self, file: &ProfileFile) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| self.error(e))?;

        let contents = serde_json::to_string_pretty(file).map_err(|e| self.error(e))?;
        let mut staged = NamedTempFile::new_in(parent).map_err(|e| self.error(e))?;
        staged
            .write_all(contents.as_bytes())
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|e| self.error(e))?;
        staged.persist(&self.path).map_err(|e| self.error(e))?;

        tracing::debug!("Saved profiles to {:?}", self.path);
        Ok(())
    }

    fn error(&self, err: impl std::fmt::Display) -> SyncError {
        SyncError::ProfileStore {
            path: self.path.clone(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn profile(name: &str, dir: &str) -> SavedProfile {
        SavedProfile {
            user_directory: PathBuf::from(dir),
            name: name.to_string(),
            region: "eu-west-1".to_string(),
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI".to_string(),
            profile: String::new(),
            role: String::new(),
            bucket: "site-bucket".to_string(),
            directory: "public".to_string(),
            prefix: String::new(),
            invalidate_cache: false,
        }
    }

    fn store(dir: &TempDir) -> ProfileStore {
        ProfileStore::at(dir.path().join("nested").join("profiles.json"))
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("AKIAEXAMPLE"), "AKI***");
        assert_eq!(mask_secret("abcd"), "abc***");
        assert_eq!(mask_secret("abc"), "abc");
        assert_eq!(mask_secret(""), "");
    }

    #[test]
    fn test_missing_store_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let err = store(&dir).load_all().unwrap_err();
        assert!(matches!(err, SyncError::Configuration(ref m) if m.contains("setup")));
    }

    #[test]
    fn test_save_creates_file_and_appends() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.save(profile("prod", "/srv/a")).unwrap();
        store.save(profile("staging", "/srv/a")).unwrap();
        store.save(profile("prod", "/srv/b")).unwrap();

        let all = store.load_all().unwrap();
        let names: Vec<_> = all.iter().map(|p| (p.name.as_str(), p.user_directory.clone())).collect();
        assert_eq!(
            names,
            vec![
                ("prod", PathBuf::from("/srv/a")),
                ("staging", PathBuf::from("/srv/a")),
                ("prod", PathBuf::from("/srv/b")),
            ]
        );
    }

    #[test]
    fn test_duplicate_save_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save(profile("prod", "/srv/a")).unwrap();
        let before = fs::read(store.path()).unwrap();

        let mut again = profile("prod", "/srv/a");
        again.bucket = "other-bucket".to_string();
        let err = store.save(again).unwrap_err();

        assert!(matches!(err, SyncError::DuplicateProfile { ref name, .. } if name == "prod"));
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn test_save_leaves_no_staging_files() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::at(dir.path().join("profiles.json"));

        store.save(profile("prod", "/srv/a")).unwrap();
        store.save(profile("staging", "/srv/a")).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("profiles.json")]);
        assert_eq!(store.load_all().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_save_keeps_existing_document() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::at(dir.path().join("profiles.json"));
        store.save(profile("prod", "/srv/a")).unwrap();
        let before = fs::read(store.path()).unwrap();

        // A directory where the document should be makes the final rename fail
        let blocked = ProfileStore::at(dir.path().join("blocked"));
        fs::create_dir_all(blocked.path().join("inner")).unwrap();
        assert!(matches!(
            blocked.write(&ProfileFile::default()),
            Err(SyncError::ProfileStore { .. })
        ));

        assert_eq!(fs::read(store.path()).unwrap(), before);
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 2);
    }

    #[test]
    fn test_find_filters_by_directory() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save(profile("prod", "/srv/a")).unwrap();

        assert!(store.find("prod", Path::new("/srv/a")).is_ok());

        let err = store.find("prod", Path::new("/srv/b")).unwrap_err();
        assert!(matches!(err, SyncError::Configuration(ref m) if m == "config with name prod not found"));
        assert!(store.for_directory(Path::new("/srv/b")).unwrap().is_empty());
    }

    #[test]
    fn test_reads_original_document_shape() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            r#"{"profiles":[{"userDirectory":"/home/me/site","name":"live","region":"us-east-1",
            "accessKeyId":"","secretAccessKey":"","profile":"deploy","role":"","bucket":"www.example.com",
            "directory":"dist"}]}"#,
        )
        .unwrap();

        let found = store.find("live", Path::new("/home/me/site")).unwrap();
        assert_eq!(found.profile, "deploy");
        assert_eq!(found.prefix, "");
        assert!(!found.invalidate_cache);

        let config = found.to_config().unwrap();
        assert_eq!(config.bucket, "www.example.com");
        assert_eq!(config.credentials.profile.as_deref(), Some("deploy"));
        assert_eq!(config.credentials.access_key_id, None);
        assert_eq!(config.directory, Some(PathBuf::from("dist")));
    }

    #[test]
    fn test_corrupt_store_reported() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{not json").unwrap();

        let err = store.load_all().unwrap_err();
        assert!(matches!(err, SyncError::ProfileStore { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_describe_masks_secrets() {
        let lines = profile("prod", "/srv/a").describe();
        assert_eq!(lines[0], "prod");
        assert!(lines.contains(&"    access key id: AKI***".to_string()));
        assert!(lines.contains(&"    secret access key: wJa***".to_string()));
        assert!(!lines.iter().any(|l| l.contains("AKIAEXAMPLE")));
    }

    #[test]
    fn test_config_round_trip_through_profile() {
        let config = SyncConfig::new(
            Some("eu-north-1".to_string()),
            Some("bucket".to_string()),
            Some("www".to_string()),
            Some(PathBuf::from("site")),
            CredentialInputs::new(None, None, Some("deploy".to_string())),
            Some("arn:aws:iam::1:role/R".to_string()),
            true,
        )
        .unwrap();

        let saved = SavedProfile::from_config("main", PathBuf::from("/w"), &config);
        assert_eq!(saved.to_config().unwrap(), config);
    }
}
