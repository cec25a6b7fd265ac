//! Hardware probing.
//!
//! A [`HardwareProbe`] asks the local machine two questions before a target is
//! resolved: how many GPUs the device tool can see, and which backend
//! libraries are installed. The answers land in a [`HardwareReport`].
//!
//! "Tool not installed" and "zero devices" are ordinary outcomes. Only a tool
//! that fails, hangs past its timeout or prints something unrecognisable sets
//! [`HardwareReport::probe_error`].

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::config::ProbeConfig;

/// Message printed by `nvidia-smi` on machines with a driver but no GPU.
const NO_DEVICES_MARKER: &str = "No devices were found";

/// Snapshot of local accelerator state. Never cached across resolutions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HardwareReport {
    /// Number of GPUs reported by the device tool.
    pub gpu_count: u32,
    /// The device tool exists and could be started.
    pub gpu_tooling_available: bool,
    /// Set when the tool ran but failed or returned unexpected output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_error: Option<String>,
    /// Device names, in tool order.
    #[serde(default)]
    pub devices: Vec<String>,
    /// Probed library files that were found.
    #[serde(default)]
    pub installed_libraries: BTreeSet<String>,
}

impl HardwareReport {
    /// Report for a machine without the device tool.
    pub fn no_tooling() -> Self {
        Self::default()
    }

    /// Report for a working tool that listed `devices`.
    pub fn with_devices<I, S>(devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let devices: Vec<String> = devices.into_iter().map(Into::into).collect();
        Self {
            gpu_count: devices.len() as u32,
            gpu_tooling_available: true,
            probe_error: None,
            devices,
            installed_libraries: BTreeSet::new(),
        }
    }

    /// Report for a tool that ran and failed.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            gpu_tooling_available: true,
            probe_error: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Mark a library as installed.
    pub fn with_library(mut self, library: impl Into<String>) -> Self {
        self.installed_libraries.insert(library.into());
        self
    }

    pub fn has_library(&self, library: &str) -> bool {
        self.installed_libraries.contains(library)
    }
}

/// What happened when the device tool was invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// The executable does not exist.
    NotInstalled,
    /// The tool ran to completion.
    Exited {
        success: bool,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// The tool was killed after the timeout.
    TimedOut(Duration),
    /// The tool exists but could not be started or waited on.
    SpawnFailed(String),
}

/// Source of the raw device listing.
pub trait DeviceQuery: Send + Sync {
    /// Name used in diagnostics.
    fn tool_name(&self) -> &str;

    /// Run the query once. Must not block longer than its own timeout.
    fn query(&self) -> ToolOutcome;
}

/// `nvidia-smi -L` with a bounded wait.
#[derive(Debug, Clone)]
pub struct NvidiaSmi {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl NvidiaSmi {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec!["-L".into()],
            timeout: crate::config::DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Replace the tool arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for NvidiaSmi {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_GPU_TOOL)
    }
}

impl NvidiaSmi {
    async fn run(&self) -> ToolOutcome {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ToolOutcome::NotInstalled,
            Err(e) => return ToolOutcome::SpawnFailed(e.to_string()),
        };

        // The deadline covers reading the pipes too: a background process
        // left behind by the tool can hold them open after it exits.
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => ToolOutcome::Exited {
                success: output.status.success(),
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            Ok(Err(e)) => ToolOutcome::SpawnFailed(e.to_string()),
            Err(_) => {
                warn!(
                    "{} still running after {:?}, killing it",
                    self.program.display(),
                    self.timeout
                );
                ToolOutcome::TimedOut(self.timeout)
            }
        }
    }
}

impl DeviceQuery for NvidiaSmi {
    fn tool_name(&self) -> &str {
        self.program.to_str().unwrap_or("nvidia-smi")
    }

    /// Runs on a private current-thread runtime; do not call from async code.
    fn query(&self) -> ToolOutcome {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => return ToolOutcome::SpawnFailed(e.to_string()),
        };
        runtime.block_on(self.run())
    }
}

/// Parse `nvidia-smi -L` output into device names.
///
/// Every non-blank line must be either `GPU <n>: <name> (UUID: ...)` or an
/// indented `MIG ...` partition of the preceding GPU. Anything else is an
/// error carrying the offending line.
pub fn parse_device_list(output: &str) -> Result<Vec<String>, String> {
    let mut devices = Vec::new();

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("MIG ") && !devices.is_empty() {
            continue;
        }

        let rest = trimmed
            .strip_prefix("GPU ")
            .ok_or_else(|| format!("unexpected device line: '{trimmed}'"))?;
        let (index, name) = rest
            .split_once(':')
            .ok_or_else(|| format!("unexpected device line: '{trimmed}'"))?;
        index
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid device index in line: '{trimmed}'"))?;

        let name = name.trim();
        let name = name
            .split_once(" (UUID:")
            .map_or(name, |(name, _)| name.trim());
        devices.push(name.to_string());
    }

    Ok(devices)
}

/// Turn a tool outcome into the GPU half of a report.
pub fn report_from_outcome(tool: &str, outcome: ToolOutcome) -> HardwareReport {
    match outcome {
        ToolOutcome::NotInstalled => {
            debug!("{} not found, assuming no GPU tooling", tool);
            HardwareReport::no_tooling()
        }
        ToolOutcome::TimedOut(timeout) => HardwareReport::failed(format!(
            "{} did not respond within {}s",
            tool,
            timeout.as_secs_f64()
        )),
        ToolOutcome::SpawnFailed(reason) => {
            HardwareReport::failed(format!("failed to run {tool}: {reason}"))
        }
        ToolOutcome::Exited {
            success,
            code,
            stdout,
            stderr,
        } => {
            if stdout.contains(NO_DEVICES_MARKER) || stderr.contains(NO_DEVICES_MARKER) {
                return HardwareReport::with_devices(Vec::<String>::new());
            }
            if !success {
                let detail = stderr
                    .lines()
                    .chain(stdout.lines())
                    .map(str::trim)
                    .find(|l| !l.is_empty())
                    .unwrap_or("no output");
                let status = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                return HardwareReport::failed(format!(
                    "{tool} exited with status {status}: {detail}"
                ));
            }
            match parse_device_list(&stdout) {
                Ok(devices) => HardwareReport::with_devices(devices),
                Err(reason) => HardwareReport::failed(format!("{tool}: {reason}")),
            }
        }
    }
}

/// Searches library directories for backend shared objects.
#[derive(Debug, Clone, Default)]
pub struct LibraryLocator {
    dirs: Vec<PathBuf>,
}

impl LibraryLocator {
    pub fn new(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            dirs: dirs.into_iter().collect(),
        }
    }

    /// First directory containing `library`.
    pub fn find(&self, library: &str) -> Option<PathBuf> {
        self.dirs
            .iter()
            .map(|dir| dir.join(library))
            .find(|path| path.is_file())
    }
}

/// Probes GPU devices and installed libraries.
pub struct HardwareProbe {
    query: Box<dyn DeviceQuery>,
    locator: LibraryLocator,
    libraries: BTreeSet<String>,
}

impl HardwareProbe {
    pub fn new(query: impl DeviceQuery + 'static, locator: LibraryLocator) -> Self {
        Self {
            query: Box::new(query),
            locator,
            libraries: BTreeSet::new(),
        }
    }

    /// Build the production probe from explicit configuration.
    pub fn from_config(config: &ProbeConfig) -> Self {
        let tool = NvidiaSmi::new(config.tool.clone())
            .with_args(config.tool_args.iter().cloned())
            .with_timeout(config.timeout);
        Self::new(tool, LibraryLocator::new(config.library_dirs.iter().cloned()))
    }

    /// Libraries to look for on each probe.
    pub fn with_libraries<I, S>(mut self, libraries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.libraries.extend(libraries.into_iter().map(Into::into));
        self
    }

    /// Run the probe once.
    #[instrument(skip(self), fields(tool = self.query.tool_name()))]
    pub fn probe(&self) -> HardwareReport {
        let outcome = self.query.query();
        let mut report = report_from_outcome(self.query.tool_name(), outcome);

        for library in &self.libraries {
            match self.locator.find(library) {
                Some(path) => {
                    debug!("Found {} at {}", library, path.display());
                    report.installed_libraries.insert(library.clone());
                }
                None => debug!("{} not found", library),
            }
        }

        if let Some(ref err) = report.probe_error {
            warn!("Hardware probe failed: {}", err);
        } else {
            debug!(
                "Hardware probe: {} GPU(s), tooling available: {}",
                report.gpu_count, report.gpu_tooling_available
            );
        }
        report
    }
}
