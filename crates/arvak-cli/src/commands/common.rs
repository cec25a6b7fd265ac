//! Shared helpers for CLI commands.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use arvak_target::{HardwareProbe, ProbeConfig, TargetCatalog, TargetResolver};

/// How a command prints its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Env,
}

/// Global options, passed to every command.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub catalog: Option<PathBuf>,
    pub gpu_tool: Option<PathBuf>,
    pub probe_timeout: Option<Duration>,
    pub library_dirs: Vec<PathBuf>,
}

impl Settings {
    /// Stock targets plus the user catalog, if any.
    pub fn load_catalog(&self) -> Result<TargetCatalog> {
        let catalog = arvak_target::load_catalog(self.catalog.as_deref());
        match &self.catalog {
            Some(path) => {
                catalog.with_context(|| format!("Failed to load catalog {}", path.display()))
            }
            None => catalog.context("Failed to load target catalog"),
        }
    }

    /// Environment probe configuration with command-line overrides applied.
    pub fn probe_config(&self) -> Result<ProbeConfig> {
        let mut config = ProbeConfig::from_env()?;
        if let Some(tool) = &self.gpu_tool {
            config = config.with_tool(tool.clone());
        }
        if let Some(timeout) = self.probe_timeout {
            config = config.with_timeout(timeout);
        }
        for dir in self.library_dirs.iter().rev() {
            config = config.with_library_dir(dir.clone());
        }
        Ok(config)
    }

    /// Probe that looks for every library the catalog needs.
    pub fn build_probe(&self, catalog: &TargetCatalog) -> Result<(HardwareProbe, ProbeConfig)> {
        let config = self.probe_config()?;
        let probe =
            HardwareProbe::from_config(&config).with_libraries(catalog.required_libraries());
        Ok((probe, config))
    }
}

/// Resolver whose diagnostics name the configured tool.
pub fn resolver<'a>(catalog: &'a TargetCatalog, config: &ProbeConfig) -> TargetResolver<'a> {
    TargetResolver::new(catalog).with_tool_name(config.tool.display().to_string())
}

/// Reject formats a command cannot print.
pub fn require_format(format: OutputFormat, command: &str) -> Result<()> {
    if format == OutputFormat::Env {
        anyhow::bail!("'{command}' does not support --format env (use table or json)");
    }
    Ok(())
}
