use std::path::Path;

use anyhow::{anyhow, Context, Result};
use assembla_api::Assembla;
use assembla_auth::{secret_key, CredentialStore};
use assembla_config::Config;
use assembla_output::OutputRenderer;
use clap::{Args, Subcommand};
use serde::Serialize;
use url::Url;

use super::profile::resolve_active_profile;

#[derive(Subcommand, Debug, Clone)]
pub enum AuthCommand {
    /// Add or update a profile and store its API secret
    Login(LoginArgs),
    /// Remove the stored secret (and optionally the profile)
    Logout(LogoutArgs),
    /// List configured profiles
    List,
    /// Test the credentials of a profile against its space
    Test(TestArgs),
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    /// Profile name to create or update.
    #[arg(long)]
    pub profile: String,
    /// Assembla space id (the project hosting the tickets).
    #[arg(long)]
    pub space: String,
    /// API key of the user creating tickets.
    #[arg(long)]
    pub api_key: String,
    /// API key secret (falls back to ASSEMBLA_API_SECRET env or an interactive prompt).
    #[arg(long, env = "ASSEMBLA_API_SECRET", hide_env_values = true)]
    pub api_secret: Option<String>,
    /// Override the API root (defaults to https://api.assembla.com/v1/).
    #[arg(long)]
    pub base_url: Option<String>,
    /// Override the web root used for ticket links.
    #[arg(long)]
    pub web_url: Option<String>,
    /// Mark this profile as the default one.
    #[arg(long)]
    pub default: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LogoutArgs {
    /// Profile to remove the secret for.
    #[arg(long)]
    pub profile: String,
    /// Remove the profile from config entirely (not just the stored secret).
    #[arg(long)]
    pub remove_profile: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TestArgs {
    /// Profile to test (defaults to default profile)
    #[arg(long)]
    pub profile: Option<String>,
}

pub async fn handle(
    command: AuthCommand,
    config: &mut Config,
    config_path: Option<&Path>,
    store: &CredentialStore,
    renderer: &OutputRenderer,
) -> Result<()> {
    match command {
        AuthCommand::Login(args) => login(args, config, config_path, store, renderer),
        AuthCommand::Logout(args) => logout(args, config, config_path, store, renderer),
        AuthCommand::List => list_profiles(config, store, renderer),
        AuthCommand::Test(args) => test_auth(args, config, store, renderer).await,
    }
}

fn validate_url(raw: Option<String>, what: &str) -> Result<Option<String>> {
    raw.map(|u| {
        Url::parse(&u)
            .map(|parsed| parsed.to_string())
            .with_context(|| format!("Invalid {what}: {u}"))
    })
    .transpose()
}

fn login(
    args: LoginArgs,
    config: &mut Config,
    config_path: Option<&Path>,
    store: &CredentialStore,
    renderer: &OutputRenderer,
) -> Result<()> {
    if args.profile.trim().is_empty() {
        return Err(anyhow!("Profile name cannot be empty"));
    }
    if args.space.trim().is_empty() {
        return Err(anyhow!("Space id cannot be empty"));
    }
    if args.api_key.trim().is_empty() {
        return Err(anyhow!("API key cannot be empty"));
    }

    let base_url = validate_url(args.base_url, "API base URL")?;
    let web_url = validate_url(args.web_url, "web URL")?;

    let secret = match args.api_secret {
        Some(secret) if !secret.trim().is_empty() => secret.trim().to_owned(),
        _ => rpassword::prompt_password("Enter API key secret: ")
            .context("Failed to read secret from prompt")?
            .trim()
            .to_owned(),
    };
    if secret.is_empty() {
        return Err(anyhow!("API key secret cannot be empty"));
    }

    let entry = config.profiles.entry(args.profile.clone()).or_default();
    entry.space_id = Some(args.space.trim().to_string());
    entry.api_key = Some(args.api_key.trim().to_string());
    entry.api_key_secret = None; // secrets live in the credential store
    if base_url.is_some() {
        entry.base_url = base_url;
    }
    if web_url.is_some() {
        entry.web_url = web_url;
    }

    if args.default || config.default_profile.is_none() {
        config.default_profile = Some(args.profile.clone());
    }

    store
        .set_secret(&secret_key(&args.profile), &secret)
        .context("Failed to store API secret")?;

    config
        .save(config_path)
        .context("Unable to persist configuration file")?;

    tracing::info!(profile = %args.profile, space = %args.space, "Profile saved");
    renderer.success(&format!("Profile '{}' saved", args.profile));
    Ok(())
}

fn logout(
    args: LogoutArgs,
    config: &mut Config,
    config_path: Option<&Path>,
    store: &CredentialStore,
    renderer: &OutputRenderer,
) -> Result<()> {
    if !config.profiles.contains_key(&args.profile) {
        return Err(anyhow!("Profile '{}' does not exist", args.profile));
    }

    store
        .delete_secret(&secret_key(&args.profile))
        .context("Failed to delete API secret")?;

    if args.remove_profile {
        config.remove_profile(&args.profile);
    }

    config
        .save(config_path)
        .context("Unable to persist configuration file")?;

    tracing::info!(profile = %args.profile, "Credentials removed");
    renderer.success(&format!("Credentials for '{}' removed", args.profile));
    Ok(())
}

fn list_profiles(config: &Config, store: &CredentialStore, renderer: &OutputRenderer) -> Result<()> {
    #[derive(Serialize)]
    struct Row<'a> {
        name: &'a str,
        space_id: &'a str,
        api_key: &'a str,
        has_secret: bool,
        is_default: bool,
    }

    let mut rows = Vec::new();
    for (name, profile) in &config.profiles {
        let has_secret = profile.api_key_secret.is_some()
            || store.get_secret(&secret_key(name))?.is_some();
        rows.push(Row {
            name,
            space_id: profile.space_id.as_deref().unwrap_or(""),
            api_key: profile.api_key.as_deref().unwrap_or(""),
            has_secret,
            is_default: config.is_default(name),
        });
    }

    if rows.is_empty() {
        tracing::info!("No profiles configured yet. Use `assembla auth login` to add one.");
    }

    renderer.render(&rows)
}

async fn test_auth(
    args: TestArgs,
    config: &Config,
    store: &CredentialStore,
    renderer: &OutputRenderer,
) -> Result<()> {
    let active = resolve_active_profile(config, args.profile.as_deref(), store)?;

    let assembla = Assembla::connect(active.config)
        .await
        .map_err(|err| match err.suggestion() {
            Some(hint) => anyhow!("Authentication test failed: {err}\nHint: {hint}"),
            None => anyhow!("Authentication test failed: {err}"),
        })?;

    renderer.success(&format!(
        "Authentication successful for profile '{}' (space {}, {} users, {} milestones)",
        active.name,
        assembla.space_id(),
        assembla.users().len(),
        assembla.milestones().len()
    ));
    Ok(())
}
