use anyhow::{anyhow, Result};
use assembla_api::AssemblaConfig;
use assembla_auth::{secret_key, CredentialStore};
use assembla_config::Config;

/// A profile with every credential resolved.
pub struct ActiveProfile {
    pub name: String,
    pub config: AssemblaConfig,
}

/// `ASSEMBLA_API_KEY` style variable scoped to a profile, e.g. `ASSEMBLA_API_KEY_ACME_QA`.
pub fn profile_env_var(prefix: &str, profile: &str) -> String {
    let suffix: String = profile
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{prefix}_{suffix}")
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn resolve_active_profile(
    config: &Config,
    requested: Option<&str>,
    store: &CredentialStore,
) -> Result<ActiveProfile> {
    let (name, profile) = config
        .resolve_profile(requested)
        .ok_or_else(|| match requested {
            Some(name) => anyhow!("Profile '{name}' does not exist."),
            None => anyhow!("No profile configured. Run `assembla auth login` first."),
        })?;

    let space_id = profile
        .space_id
        .clone()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| anyhow!("Profile '{name}' is missing a space_id."))?;

    // Key lookup: profile env var → generic env var → config file
    let api_key = non_empty_env(&profile_env_var("ASSEMBLA_API_KEY", name))
        .or_else(|| non_empty_env("ASSEMBLA_API_KEY"))
        .or_else(|| profile.api_key.clone().filter(|k| !k.trim().is_empty()))
        .ok_or_else(|| {
            anyhow!(
                "No API key for profile '{name}'. Set {} or run `assembla auth login --profile {name}`",
                profile_env_var("ASSEMBLA_API_KEY", name)
            )
        })?;

    // Secret lookup: profile env var → generic env var → config file → credential store
    let configured = non_empty_env(&profile_env_var("ASSEMBLA_API_SECRET", name))
        .or_else(|| non_empty_env("ASSEMBLA_API_SECRET"))
        .or_else(|| {
            profile
                .api_key_secret
                .clone()
                .filter(|s| !s.trim().is_empty())
        });
    let api_key_secret = match configured {
        Some(secret) => Some(secret),
        None => store.get_secret(&secret_key(name))?,
    }
    .ok_or_else(|| {
        anyhow!(
            "No API secret for profile '{name}'. Set {} or run `assembla auth login --profile {name}`",
            profile_env_var("ASSEMBLA_API_SECRET", name)
        )
    })?;

    Ok(ActiveProfile {
        name: name.to_string(),
        config: AssemblaConfig {
            api_key: Some(api_key),
            api_key_secret: Some(api_key_secret),
            space_id: Some(space_id),
            base_url: profile.base_url.clone(),
            web_url: profile.web_url.clone(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assembla_config::Profile;

    #[test]
    fn test_profile_env_var() {
        assert_eq!(
            profile_env_var("ASSEMBLA_API_KEY", "acme-qa"),
            "ASSEMBLA_API_KEY_ACME_QA"
        );
        assert_eq!(
            profile_env_var("ASSEMBLA_API_SECRET", "prod"),
            "ASSEMBLA_API_SECRET_PROD"
        );
    }

    #[test]
    fn test_resolve_from_config_and_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path().join("credentials"));
        store
            .set_secret(&secret_key("zz-resolve-test"), "stored-secret")
            .unwrap();

        let mut config = Config::default();
        config.profiles.insert(
            "zz-resolve-test".to_string(),
            Profile {
                space_id: Some("acme".to_string()),
                api_key: Some("file-key".to_string()),
                ..Default::default()
            },
        );

        let active = resolve_active_profile(&config, Some("zz-resolve-test"), &store).unwrap();
        assert_eq!(active.name, "zz-resolve-test");
        assert_eq!(active.config.space_id.as_deref(), Some("acme"));
        assert!(active.config.is_complete());
    }

    #[test]
    fn test_malformed_credentials_surface() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials");
        std::fs::write(&path, "not json").unwrap();
        let store = CredentialStore::at(path.clone());

        let mut config = Config::default();
        config.profiles.insert(
            "zz-malformed-store".to_string(),
            Profile {
                space_id: Some("acme".to_string()),
                api_key: Some("file-key".to_string()),
                ..Default::default()
            },
        );

        let err = resolve_active_profile(&config, Some("zz-malformed-store"), &store)
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("Malformed credentials file"));
    }

    #[test]
    fn test_missing_space_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path().join("credentials"));

        let mut config = Config::default();
        config
            .profiles
            .insert("bare".to_string(), Profile::default());

        let err = resolve_active_profile(&config, None, &store)
            .err()
            .unwrap();
        assert!(err.to_string().contains("missing a space_id"));
    }

    #[test]
    fn test_unknown_profile() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path().join("credentials"));

        let err = resolve_active_profile(&Config::default(), Some("ghost"), &store)
            .err()
            .unwrap();
        assert!(err.to_string().contains("'ghost' does not exist"));
    }
}
