//! Command implementations and dispatch logic.
//!
//! Each command is an async function taking the shared `CommandContext`.

use anyhow::Context;
use camino::Utf8Path;
use rimport_cache::ArtifactCache;
use rimport_config::{default_cache_dir, ConfigLoader, ConfigSource, ImportConfig};
use tracing::debug;

pub mod cache;
pub mod check;
pub mod fetch;


use crate::output::OutputHandler;
use crate::{CacheCommand, Commands};

/// Shared context for all commands
pub struct CommandContext {
    pub config: ImportConfig,
    pub source: ConfigSource,
    pub output: OutputHandler,
}

impl CommandContext {
    /// Load the effective configuration for the working directory
    pub async fn load(explicit: Option<&Utf8Path>) -> anyhow::Result<Self> {
        let loader = ConfigLoader::from_current_dir()?;
        let (config, source) = loader
            .load(explicit)
            .await
            .context("Failed to load configuration")?;

        debug!(?source, remotes = config.remotes.len(), "configuration loaded");
        Ok(Self::new(config, source))
    }

    pub fn new(config: ImportConfig, source: ConfigSource) -> Self {
        Self {
            config,
            source,
            output: OutputHandler::new(),
        }
    }

    /// Open the artifact cache the configuration points at
    pub fn open_cache(&self) -> anyhow::Result<ArtifactCache> {
        let root = match &self.config.cache.dir {
            Some(dir) => dir.clone(),
            None => default_cache_dir()?,
        };
        Ok(ArtifactCache::new(&root)?)
    }
}

/// Dispatch a command to its handler
pub async fn dispatch_command(command: Commands, ctx: &CommandContext) -> anyhow::Result<()> {
    match command {
        Commands::Fetch { module, print } => {
            debug!("Fetching module: {} (print: {})", module, print);
            fetch::execute(&module, print, ctx).await
        },
        Commands::Check => {
            debug!("Checking configured namespaces");
            check::execute(ctx).await
        },
        Commands::Cache { command } => match command {
            CacheCommand::Stats => cache::stats(ctx),
            CacheCommand::Clear => cache::clear(ctx),
            CacheCommand::Prune { older_than } => cache::prune(older_than, ctx),
        },
    }
}
