//! Error types for target resolution.

use thiserror::Error;

/// Errors that can occur while selecting and configuring an execution target.
///
/// Resolution failures are carried as data inside a
/// [`LaunchConfig`](crate::launch::LaunchConfig); only catalog construction
/// and argument parsing return them directly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TargetError {
    /// No target registered under this name.
    #[error("unknown target '{0}'")]
    UnknownTarget(String),

    /// The GPU listing tool is not installed.
    #[error("target '{target}' requires a GPU, but the device tool '{tool}' is not available")]
    MissingHardwareTooling { target: String, tool: String },

    /// No GPU devices are visible, either because the listing tool is
    /// missing or because it reported none.
    #[error(
        "target '{target}' requires a GPU, but no GPU devices were found ({})",
        no_devices_detail(.tool, .tool_available)
    )]
    NoAcceleratorDevices {
        target: String,
        tool: String,
        tool_available: bool,
    },

    /// A backend library the target links against is not installed.
    #[error("target '{target}' requires library '{library}', which was not found")]
    MissingRequiredLibrary { target: String, library: String },

    /// The GPU listing tool failed, timed out or returned garbage.
    #[error("target '{target}' requires a GPU, but hardware probing failed: {reason}")]
    HardwareProbeExecutionFailure { target: String, reason: String },

    /// A target flag had no value following it.
    #[error("dangling option '{0}' (missing value)")]
    DanglingOption(String),

    /// Two catalog entries share one name.
    #[error("target '{0}' is registered more than once")]
    DuplicateTargetRegistration(String),

    /// Invalid catalog or probe configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Catalog file could not be parsed.
    #[error("YAML error: {0}")]
    Yaml(String),

    /// Catalog file could not be read.
    #[error("I/O error: {0}")]
    Io(String),
}

fn no_devices_detail(tool: &str, tool_available: &bool) -> String {
    if *tool_available {
        format!("device tool '{tool}' reported none")
    } else {
        format!("device tool '{tool}' is not installed")
    }
}

impl From<serde_yaml_ng::Error> for TargetError {
    fn from(e: serde_yaml_ng::Error) -> Self {
        TargetError::Yaml(e.to_string())
    }
}

impl From<std::io::Error> for TargetError {
    fn from(e: std::io::Error) -> Self {
        TargetError::Io(e.to_string())
    }
}

/// Result type for target operations.
pub type TargetResult<T> = Result<T, TargetError>;
