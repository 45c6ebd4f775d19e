use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// Key under which a profile's API secret is stored.
pub fn secret_key(profile: &str) -> String {
    format!("{profile}:api_key_secret")
}

/// File-backed secret store. The file is a flat JSON object written with
/// 0600 permissions on unix.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: Option<PathBuf>,
}

impl CredentialStore {
    /// Store located at `~/.<app>/credentials`.
    pub fn new(app: &str) -> Self {
        Self {
            path: dirs::home_dir().map(|h| h.join(format!(".{app}")).join("credentials")),
        }
    }

    /// Store backed by an explicit file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_secret(&self, account: &str, secret: &str) -> Result<()> {
        let path = self.require_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Unable to create {}", parent.display()))?;
        }

        let mut creds = self.read_all().unwrap_or_default();
        creds.insert(account.to_string(), secret.to_string());
        write_private(path, &creds)?;
        debug!(account, "Secret stored");
        Ok(())
    }

    pub fn get_secret(&self, account: &str) -> Result<Option<String>> {
        let path = self.require_path()?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(self.read_all()?.remove(account))
    }

    pub fn delete_secret(&self, account: &str) -> Result<()> {
        let path = self.require_path()?;
        if !path.exists() {
            return Ok(());
        }

        let mut creds = self.read_all().unwrap_or_default();
        if creds.remove(account).is_some() {
            write_private(path, &creds)?;
            debug!(account, "Secret removed");
        }
        Ok(())
    }

    fn require_path(&self) -> Result<&Path> {
        self.path
            .as_deref()
            .context("Cannot determine home directory")
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        let path = self.require_path()?;
        let content = fs::read_to_string(path)
            .with_context(|| format!("Unable to read credentials at {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Malformed credentials file {}", path.display()))
    }
}

fn write_private(path: &Path, creds: &BTreeMap<String, String>) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let file = options
        .open(path)
        .with_context(|| format!("Unable to write credentials at {}", path.display()))?;
    serde_json::to_writer_pretty(file, creds)?;
    Ok(())
}
