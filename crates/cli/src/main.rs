mod commands;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use assembla_auth::CredentialStore;
use assembla_config::Config;
use assembla_output::{OutputFormat, OutputRenderer};
use assembla_tracker::{AssemblaTracker, IssueTracker};
use clap::{Parser, Subcommand};
use commands::auth::AuthCommand;
use commands::config::ConfigCommand;
use commands::profile::resolve_active_profile;
use commands::tickets::TicketCommand;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "assembla", version, about = "Assembla ticket CLI", long_about = None)]
struct Cli {
    /// Profile to use from config file
    #[arg(short, long)]
    profile: Option<String>,

    /// Path to config file (defaults to ~/.assembla-cli/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format for command results
    #[arg(long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    output: OutputFormat,

    /// Enable verbose logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: AssemblaCommand,
}

#[derive(Subcommand, Debug, Clone)]
enum AssemblaCommand {
    /// Ticket commands
    #[command(subcommand)]
    Ticket(TicketCommand),
    /// List the users of the space
    Users,
    /// List the milestones of the space
    Milestones,
    /// Authentication commands
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Configuration helpers
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    let config_path = cli.config.clone();
    let mut config = Config::load(config_path.as_ref())?;
    let renderer = OutputRenderer::new(cli.output);
    let credential_store = CredentialStore::new("assembla-cli");

    match cli.command {
        AssemblaCommand::Auth(command) => {
            commands::auth::handle(
                command,
                &mut config,
                config_path.as_deref(),
                &credential_store,
                &renderer,
            )
            .await?
        }
        AssemblaCommand::Config(command) => {
            commands::config::handle(command, config_path.as_deref())?
        }
        AssemblaCommand::Ticket(command) => {
            let tracker = connect(&config, cli.profile.as_deref(), &credential_store).await?;
            commands::tickets::execute(command, &tracker, &renderer).await?
        }
        AssemblaCommand::Users => {
            let tracker = connect(&config, cli.profile.as_deref(), &credential_store).await?;
            commands::space::list_users(&tracker, &renderer)?
        }
        AssemblaCommand::Milestones => {
            let tracker = connect(&config, cli.profile.as_deref(), &credential_store).await?;
            commands::space::list_milestones(&tracker, &renderer)?
        }
    }

    Ok(())
}

fn init_tracing(debug: bool) -> Result<()> {
    let default = if debug {
        "info,assembla=debug,assembla_api=debug,assembla_tracker=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("failed to initialize logger: {err}"))
}

async fn connect(
    config: &Config,
    requested: Option<&str>,
    store: &CredentialStore,
) -> Result<AssemblaTracker> {
    let active = resolve_active_profile(config, requested, store)?;
    let space = active.config.space_id.clone().unwrap_or_default();
    let tracker = AssemblaTracker::connect(active.name, active.config).await;

    if !tracker.is_connected() {
        return Err(anyhow!(
            "Unable to connect to Assembla space '{space}'. Run with --debug for details or check `assembla auth test`."
        ));
    }
    Ok(tracker)
}
