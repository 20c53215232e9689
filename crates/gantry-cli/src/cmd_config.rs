use clap::Subcommand;
use gantry_ledger::{config, GantryPaths};
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value
    Set {
        /// Config key (e.g. history_limit, log_filter)
        key: String,
        /// Config value (true/false/number/string)
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
}

pub fn run(cmd: ConfigCmd, root: &Path) -> anyhow::Result<()> {
    let paths = GantryPaths::discover(root);
    if !paths.is_initialized() {
        anyhow::bail!("No .gantry/ workspace found. Run `gantry init` first.");
    }
    match cmd {
        ConfigCmd::Set { key, value } => {
            config::set_value(&paths.config_json, &key, &value)?;
            println!("{key} = {value}");
        }
        ConfigCmd::Get { key } => {
            let map = config::read_map(&paths.config_json)?;
            match map.get(&key) {
                Some(val) => println!("{val}"),
                None => println!("(not set)"),
            }
        }
        ConfigCmd::List => {
            let map = config::read_map(&paths.config_json)?;
            if map.is_empty() {
                println!("(no config set)");
            }
            for (k, v) in &map {
                println!("{k} = {v}");
            }
        }
    }
    Ok(())
}
