use std::path::{Path, PathBuf};

use clap::Args;

use culpa_core::config::ConnectorConfig;
use culpa_core::secrets::Secrets;

pub mod add;
pub mod check;
pub mod discover;
pub mod init;
pub mod run;

/// Exactly one action per invocation, each naming a YAML config.
#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct Action {
    /// Write an example config to this path (never overwrites)
    #[arg(long, value_name = "CONFIG")]
    pub init: Option<PathBuf>,
    /// List collections in the configured database and how they are configured
    #[arg(long, value_name = "CONFIG")]
    pub discover: Option<PathBuf>,
    /// Print a `collections:` YAML fragment for --database
    #[arg(long, value_name = "CONFIG", requires = "database")]
    pub add: Option<PathBuf>,
    /// Check the config, database connection and controller
    #[arg(long, value_name = "CONFIG")]
    pub test: Option<PathBuf>,
    /// Sample collections and send them to Data Culpa
    #[arg(long, value_name = "CONFIG")]
    pub run: Option<PathBuf>,
}

pub enum Command {
    Init(PathBuf),
    Discover(PathBuf),
    Add { config: PathBuf, database: String },
    Test(PathBuf),
    Run(PathBuf),
}

impl Action {
    pub fn into_command(self, database: Option<String>) -> anyhow::Result<Command> {
        let command = if let Some(path) = self.init {
            Command::Init(expand_path(&path))
        } else if let Some(path) = self.discover {
            Command::Discover(expand_path(&path))
        } else if let Some(path) = self.add {
            let database = database.ok_or_else(|| anyhow::anyhow!("--add requires --database"))?;
            Command::Add {
                config: expand_path(&path),
                database,
            }
        } else if let Some(path) = self.test {
            Command::Test(expand_path(&path))
        } else if let Some(path) = self.run {
            Command::Run(expand_path(&path))
        } else {
            anyhow::bail!("no action given; try --help");
        };
        Ok(command)
    }
}

/// Options shared by every action that talks to the database.
pub struct Context {
    pub env_file: Option<PathBuf>,
}

impl Context {
    pub fn load(&self, config_path: &Path) -> anyhow::Result<(ConnectorConfig, Secrets)> {
        let config = ConnectorConfig::from_file(config_path)?;
        let secrets = Secrets::load(self.env_file.as_deref())?;
        tracing::debug!(config = %config_path.display(), ?secrets, "Loaded configuration");
        Ok((config, secrets))
    }
}

pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}
