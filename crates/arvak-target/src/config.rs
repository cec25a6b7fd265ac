//! Explicit configuration for probing and catalog loading.
//!
//! Nothing here is global: callers build a [`ProbeConfig`] (usually via
//! [`ProbeConfig::from_env`]) and pass it down by value.
//!
//! # Environment
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `ARVAK_GPU_TOOL` | Device listing tool (default `nvidia-smi`) |
//! | `ARVAK_PROBE_TIMEOUT` | Probe timeout in seconds (default 10) |
//! | `ARVAK_TARGET_LIBRARY_PATH` | Colon-separated backend library directories |
//! | `LD_LIBRARY_PATH` | Searched after `ARVAK_TARGET_LIBRARY_PATH` |
//! | `ARVAK_TARGET_CATALOG` | User target catalog (YAML) |

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::catalog::{TargetCatalog, TargetSpec};
use crate::error::{TargetError, TargetResult};

/// Default device listing tool.
pub const DEFAULT_GPU_TOOL: &str = "nvidia-smi";

/// Default bound on a single probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub const ENV_GPU_TOOL: &str = "ARVAK_GPU_TOOL";
pub const ENV_PROBE_TIMEOUT: &str = "ARVAK_PROBE_TIMEOUT";
pub const ENV_LIBRARY_PATH: &str = "ARVAK_TARGET_LIBRARY_PATH";
pub const ENV_CATALOG: &str = "ARVAK_TARGET_CATALOG";

/// How the hardware probe runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Device listing executable.
    pub tool: PathBuf,
    /// Arguments passed to the tool.
    pub tool_args: Vec<String>,
    /// Kill the tool after this long.
    pub timeout: Duration,
    /// Directories searched for backend libraries, in order.
    pub library_dirs: Vec<PathBuf>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            tool: PathBuf::from(DEFAULT_GPU_TOOL),
            tool_args: vec!["-L".into()],
            timeout: DEFAULT_PROBE_TIMEOUT,
            library_dirs: Vec::new(),
        }
    }
}

impl ProbeConfig {
    /// Read the probe configuration from the process environment.
    pub fn from_env() -> TargetResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TargetResult<Self> {
        let mut config = Self::default();

        if let Some(tool) = lookup(ENV_GPU_TOOL).filter(|t| !t.is_empty()) {
            config.tool = PathBuf::from(tool);
        }
        if let Some(secs) = lookup(ENV_PROBE_TIMEOUT).filter(|t| !t.is_empty()) {
            config.timeout = parse_timeout(&secs)?;
        }
        for var in [ENV_LIBRARY_PATH, "LD_LIBRARY_PATH"] {
            if let Some(paths) = lookup(var) {
                config.library_dirs.extend(split_path_list(&paths));
            }
        }

        debug!("Probe config: {:?}", config);
        Ok(config)
    }

    pub fn with_tool(mut self, tool: impl Into<PathBuf>) -> Self {
        self.tool = tool.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Prepend a library directory so it wins over environment paths.
    pub fn with_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dirs.insert(0, dir.into());
        self
    }
}

/// Parse a timeout given in (possibly fractional) seconds.
pub fn parse_timeout(secs: &str) -> TargetResult<Duration> {
    let value: f64 = secs
        .trim()
        .parse()
        .map_err(|_| TargetError::Configuration(format!("invalid probe timeout '{secs}'")))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(TargetError::Configuration(format!(
            "probe timeout must be positive, got '{secs}'"
        )));
    }
    Ok(Duration::from_secs_f64(value))
}

fn split_path_list(paths: &str) -> impl Iterator<Item = PathBuf> + '_ {
    paths
        .split(':')
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
}

/// `~/.arvak/targets.yaml`, if a home directory is known.
pub fn default_catalog_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".arvak").join("targets.yaml"))
}

/// Parse a YAML list of target specs.
///
/// ```yaml
/// - name: my-gpu-sim
///   simulation_backend: custom_sv
///   requires_gpu: true
///   required_library: libnvqir-custom.so
/// ```
pub fn parse_targets_yaml(source: &str) -> TargetResult<Vec<TargetSpec>> {
    if source.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_yaml_ng::from_str(source)?)
}

/// Load user targets from a file.
pub fn load_targets_file(path: &Path) -> TargetResult<Vec<TargetSpec>> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| TargetError::Io(format!("{}: {}", path.display(), e)))?;
    let specs = parse_targets_yaml(&source)?;
    debug!("Loaded {} target(s) from {}", specs.len(), path.display());
    Ok(specs)
}

/// Stock catalog merged with an explicit file, or the default file if present.
///
/// An explicitly named file must exist; a missing default file is ignored.
pub fn load_catalog(explicit: Option<&Path>) -> TargetResult<TargetCatalog> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_catalog_path().filter(|p| p.is_file()),
    };

    match path {
        Some(path) => TargetCatalog::builtin_with(load_targets_file(&path)?),
        None => Ok(TargetCatalog::builtin()),
    }
}
