//! `queuectl config`: direct read/write access to the `config` table.

use anyhow::{bail, Result};
use clap::Subcommand;
use queuectl_core::{ConfigManager, Store};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Set a configuration key.
    Set { key: String, value: String },
    /// Get a configuration key.
    Get { key: String },
    /// List all configuration key/value pairs.
    List,
}

pub async fn run(command: ConfigCommand) -> Result<()> {
    // Config commands act on the default-location store directly, not on
    // whatever `db_path` happens to be configured there.
    let store = Store::open(queuectl_core::DEFAULT_DB_PATH).await?;
    let config = ConfigManager::new(&store);

    match command {
        ConfigCommand::Set { key, value } => {
            config.set(&key, &value).await?;
            println!("Set {key} = {value}");
        }
        ConfigCommand::Get { key } => match config.get(&key).await? {
            Some(value) => println!("{value}"),
            None => bail!("Configuration key '{key}' not found"),
        },
        ConfigCommand::List => {
            let all = config.list_all().await?;
            let mut entries: Vec<_> = all.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (key, value) in entries {
                println!("{key} = {value}");
            }
        }
    }
    Ok(())
}
