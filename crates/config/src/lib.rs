use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

const CONFIG_DIR: &str = ".assembla-cli";
const CONFIG_FILE: &str = "config.yaml";

/// Profiles for every Assembla space the CLI knows about.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub default_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

fn location<P: AsRef<Path>>(path: Option<P>) -> PathBuf {
    match path {
        Some(p) => p.as_ref().to_path_buf(),
        None => Config::default_path(),
    }
}

impl Config {
    /// Reads `path` (or `~/.assembla-cli/config.yaml`). A missing file is an empty config.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let path = location(path);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file absent, starting empty");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Cannot read Assembla config {}", path.display()))
            }
        };

        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("Malformed YAML in {}", path.display()))?;
        debug!(path = %path.display(), profiles = config.profiles.len(), "Config loaded");
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: Option<P>) -> Result<()> {
        let path = location(path);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create {}", dir.display()))?;
        }

        let yaml = serde_yaml::to_string(self).context("Cannot encode config as YAML")?;
        fs::write(&path, yaml)
            .with_context(|| format!("Cannot write Assembla config {}", path.display()))
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    /// The requested profile if given. Otherwise the default, falling back to
    /// the first profile by name when no default is set.
    pub fn resolve_profile<'a>(
        &'a self,
        requested: Option<&'a str>,
    ) -> Option<(&'a str, &'a Profile)> {
        let name = match requested.or(self.default_profile.as_deref()) {
            Some(name) => name,
            None => self.profiles.keys().next()?.as_str(),
        };
        self.profiles.get(name).map(|profile| (name, profile))
    }

    pub fn is_default(&self, name: &str) -> bool {
        self.default_profile.as_deref() == Some(name)
    }

    /// Drops a profile. When it was the default, the first remaining one takes over.
    pub fn remove_profile(&mut self, name: &str) -> Option<Profile> {
        let removed = self.profiles.remove(name)?;
        if self.is_default(name) {
            self.default_profile = self.profiles.keys().next().cloned();
        }
        Some(removed)
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR)
            .join(CONFIG_FILE)
    }
}

/// One Assembla space. Values are optional so the secret can live in the
/// credential store or the environment instead of this file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_secret: Option<String>,
    /// API root, defaults to `https://api.assembla.com/v1/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Web root used for ticket links, defaults to `https://www.assembla.com/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
}
