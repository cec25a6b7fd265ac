//! Target resolution.
//!
//! ```text
//!   name ──→ lookup ──→ GPU checks ──→ library mode ──→ LaunchConfig
//!              │            │
//!              └── failed ──┴──→ LaunchConfig { error }
//! ```
//!
//! GPU checks run only for targets that require a GPU, in a fixed order so
//! every failure names one precondition:
//!
//! 1. the probe itself failed → [`TargetError::HardwareProbeExecutionFailure`]
//! 2. no devices → [`TargetError::NoAcceleratorDevices`]
//! 3. device tool missing → [`TargetError::MissingHardwareTooling`]
//! 4. backend library missing → [`TargetError::MissingRequiredLibrary`]
//!
//! Remote targets are always launched with library mode off, whatever the
//! caller asked for.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::args::{ArgumentParser, ExtraArg};
use crate::catalog::{TargetCatalog, TargetSpec};
use crate::config::DEFAULT_GPU_TOOL;
use crate::error::{TargetError, TargetResult};
use crate::launch::LaunchConfig;
use crate::probe::HardwareReport;

/// Extra argument key that requests a library mode.
pub const LIBRARY_MODE_ARG: &str = "library-mode";

/// Caller choices that are not part of the target definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Override the target's library mode (local targets only).
    pub library_mode: Option<bool>,
}

impl ResolveOptions {
    pub fn with_library_mode(mut self, library_mode: bool) -> Self {
        self.library_mode = Some(library_mode);
        self
    }
}

/// Resolves target names against a catalog and a hardware snapshot.
#[derive(Debug, Clone)]
pub struct TargetResolver<'a> {
    catalog: &'a TargetCatalog,
    tool_name: String,
}

impl<'a> TargetResolver<'a> {
    pub fn new(catalog: &'a TargetCatalog) -> Self {
        Self {
            catalog,
            tool_name: DEFAULT_GPU_TOOL.to_string(),
        }
    }

    /// Device tool name used in diagnostics.
    pub fn with_tool_name(mut self, tool: impl Into<String>) -> Self {
        self.tool_name = tool.into();
        self
    }

    /// Resolve with default options.
    pub fn resolve(
        &self,
        name: &str,
        report: &HardwareReport,
        extra_args: Vec<ExtraArg>,
    ) -> LaunchConfig {
        self.resolve_with(name, report, extra_args, ResolveOptions::default())
    }

    /// Resolve a target. Never panics and never returns a partial config.
    #[instrument(skip(self, report, extra_args))]
    pub fn resolve_with(
        &self,
        name: &str,
        report: &HardwareReport,
        extra_args: Vec<ExtraArg>,
        options: ResolveOptions,
    ) -> LaunchConfig {
        let spec = match self.catalog.lookup(name) {
            Ok(spec) => Arc::clone(spec),
            Err(err) => {
                warn!("{}", err);
                return LaunchConfig::failed(None, err);
            }
        };

        if spec.requires_gpu {
            if let Err(err) = self.check_gpu(&spec, report) {
                warn!("{}", err);
                return LaunchConfig::failed(Some(spec), err);
            }
        }

        let (library_mode, extra_args) = match select_library_mode(&spec, extra_args, options) {
            Ok(selected) => selected,
            Err(err) => {
                warn!("{}", err);
                return LaunchConfig::failed(Some(spec), err);
            }
        };

        debug!(
            "Resolved {} -> {} (library mode: {}, {} extra arg(s))",
            spec.name,
            spec.simulation_backend,
            library_mode,
            extra_args.len()
        );
        let backend = spec.simulation_backend.clone();
        LaunchConfig::resolved(spec, backend, extra_args, library_mode)
    }

    /// Parse the target's raw `--<target>-<option> <value>` tokens, then
    /// resolve. Parse failures are reported in the returned config.
    pub fn resolve_raw<S: AsRef<str>>(
        &self,
        name: &str,
        report: &HardwareReport,
        raw_args: &[S],
        options: ResolveOptions,
    ) -> LaunchConfig {
        let spec = match self.catalog.lookup(name) {
            Ok(spec) => spec,
            Err(err) => return LaunchConfig::failed(None, err),
        };
        let parser = ArgumentParser::for_target(spec).excluding_targets(self.catalog.names());
        match parser.parse(raw_args) {
            Ok(extra_args) => self.resolve_with(name, report, extra_args, options),
            Err(err) => {
                warn!("{}", err);
                LaunchConfig::failed(Some(Arc::clone(spec)), err)
            }
        }
    }

    fn check_gpu(&self, spec: &TargetSpec, report: &HardwareReport) -> TargetResult<()> {
        let target = || spec.name.clone();

        if let Some(reason) = &report.probe_error {
            return Err(TargetError::HardwareProbeExecutionFailure {
                target: target(),
                reason: reason.clone(),
            });
        }
        if report.gpu_count == 0 {
            return Err(TargetError::NoAcceleratorDevices {
                target: target(),
                tool: self.tool_name.clone(),
                tool_available: report.gpu_tooling_available,
            });
        }
        if !report.gpu_tooling_available {
            return Err(TargetError::MissingHardwareTooling {
                target: target(),
                tool: self.tool_name.clone(),
            });
        }
        if let Some(library) = &spec.required_library {
            if !report.has_library(library) {
                return Err(TargetError::MissingRequiredLibrary {
                    target: target(),
                    library: library.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Pick the library mode and strip the request from the forwarded args.
fn select_library_mode(
    spec: &TargetSpec,
    extra_args: Vec<ExtraArg>,
    options: ResolveOptions,
) -> TargetResult<(bool, Vec<ExtraArg>)> {
    let (requests, forwarded): (Vec<_>, Vec<_>) = extra_args
        .into_iter()
        .partition(|arg| arg.key == LIBRARY_MODE_ARG);

    // Last flag wins; an explicit option beats any flag.
    let mut requested = None;
    for arg in &requests {
        let value = parse_bool(&arg.value).ok_or_else(|| {
            TargetError::Configuration(format!(
                "invalid value '{}' for {} (expected true or false)",
                arg.value, LIBRARY_MODE_ARG
            ))
        })?;
        requested = Some(value);
    }
    let requested = options.library_mode.or(requested);

    if spec.is_remote() {
        if requested == Some(true) {
            warn!(
                "Ignoring library mode request for remote target {}",
                spec.name
            );
        }
        return Ok((false, forwarded));
    }

    let library_mode = requested.unwrap_or(spec.library_mode);
    Ok((library_mode, forwarded))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
