use std::path::Path;

use anyhow::Result;
use assembla_config::Config;
use assembla_tracker::AssemblaTracker;
use clap::Subcommand;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Print a profile template to paste into the config file
    Template,
    /// Print the path of the config file in use
    Path,
}

pub fn handle(command: ConfigCommand, config_path: Option<&Path>) -> Result<()> {
    match command {
        ConfigCommand::Template => print!("{}", AssemblaTracker::cfg_template()),
        ConfigCommand::Path => {
            let path = config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
    }
    Ok(())
}
