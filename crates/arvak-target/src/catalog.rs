//! Target catalog.
//!
//! The [`TargetCatalog`] maps a target name (`default`, `nvidia`,
//! `nvidia-mgpu`, `iqm`, ...) to an immutable [`TargetSpec`] describing what
//! the target needs from the machine and how the runtime must be launched
//! for it.
//!
//! # Stock targets
//!
//! | Target | Backend | GPU | Platform |
//! |--------|---------|-----|----------|
//! | `default` | `qpp` | no | local |
//! | `qpp-cpu` | `qpp` | no | local |
//! | `density-matrix-cpu` | `dm` | no | local |
//! | `nvidia` | `custatevec_fp32` | yes | local |
//! | `nvidia-fp64` | `custatevec_fp64` | yes | local |
//! | `nvidia-mgpu` | `nvidia_mgpu` | yes | local |
//! | `nvidia-mqpu` | `custatevec_fp32` | yes | local (`mqpu` platform) |
//! | `tensornet` | `tensornet` | yes | local |
//! | `iqm` | `qpp` | no | remote REST |
//! | `quantinuum` | `qpp` | no | remote REST |

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TargetError, TargetResult};

/// Where the quantum platform executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QpuSubtype {
    /// Simulated in-process or on local accelerators.
    #[default]
    Local,
    /// Physical or hosted device reached over REST.
    RemoteRest,
}

impl QpuSubtype {
    /// Token expected by the runtime.
    pub fn as_str(self) -> &'static str {
        match self {
            QpuSubtype::Local => "local",
            QpuSubtype::RemoteRest => "remote_rest",
        }
    }

    /// Whether this is a remote platform.
    pub fn is_remote(self) -> bool {
        matches!(self, QpuSubtype::RemoteRest)
    }
}

impl fmt::Display for QpuSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform library the runtime loads around the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformLibrary {
    /// Single virtual QPU.
    #[default]
    Default,
    /// One virtual QPU per visible GPU.
    Mqpu,
}

impl PlatformLibrary {
    /// Token expected by the runtime.
    pub fn as_str(self) -> &'static str {
        match self {
            PlatformLibrary::Default => "default",
            PlatformLibrary::Mqpu => "mqpu",
        }
    }
}

/// A target-scoped command-line option and the runtime key it maps to.
///
/// `--iqm-server-url <v>` is declared as `option = "server-url"`,
/// `key = "url"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetOption {
    /// Option name without the `--<target>-` prefix.
    pub option: String,
    /// Key forwarded to the runtime.
    pub key: String,
    /// Help text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl TargetOption {
    /// Create an option remapping.
    pub fn new(option: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            option: option.into(),
            key: key.into(),
            description: String::new(),
        }
    }

    /// Attach help text.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Everything the resolver needs to know about one execution target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSpec {
    /// Unique catalog key.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Target needs at least one local GPU.
    #[serde(default)]
    pub requires_gpu: bool,
    /// Shared library file that must be installed (e.g. `libnvqir-tensornet.so`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_library: Option<String>,
    /// Ordered lowering pipeline stages.
    #[serde(default)]
    pub lowering_pipeline: Vec<String>,
    /// Simulation backend identifier handed to the runtime.
    pub simulation_backend: String,
    /// Run embedded in the calling process.
    #[serde(default = "default_library_mode")]
    pub library_mode: bool,
    #[serde(default)]
    pub platform_qpu: QpuSubtype,
    #[serde(default)]
    pub platform_library: PlatformLibrary,
    /// Code generation / emission mode (e.g. `qir-base`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codegen_emission: Option<String>,
    /// Emit target-specific backend code.
    #[serde(default)]
    pub gen_target_backend: bool,
    /// Extra link libraries.
    #[serde(default)]
    pub link_libs: Vec<String>,
    /// Target-scoped command-line options.
    #[serde(default)]
    pub options: Vec<TargetOption>,
}

impl TargetSpec {
    /// Create a local, CPU-only, library-mode spec.
    pub fn new(name: impl Into<String>, simulation_backend: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            requires_gpu: false,
            required_library: None,
            lowering_pipeline: Vec::new(),
            simulation_backend: simulation_backend.into(),
            library_mode: true,
            platform_qpu: QpuSubtype::Local,
            platform_library: PlatformLibrary::Default,
            codegen_emission: None,
            gen_target_backend: false,
            link_libs: Vec::new(),
            options: Vec::new(),
        }
    }

    /// Create a remote REST spec. Remote targets never run in library mode.
    pub fn remote(name: impl Into<String>, simulation_backend: impl Into<String>) -> Self {
        let mut spec = Self::new(name, simulation_backend);
        spec.library_mode = false;
        spec.platform_qpu = QpuSubtype::RemoteRest;
        spec.gen_target_backend = true;
        spec
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Require a local GPU.
    pub fn with_gpu(mut self) -> Self {
        self.requires_gpu = true;
        self
    }

    pub fn with_required_library(mut self, library: impl Into<String>) -> Self {
        self.required_library = Some(library.into());
        self
    }

    pub fn with_pipeline<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lowering_pipeline = stages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_platform_library(mut self, library: PlatformLibrary) -> Self {
        self.platform_library = library;
        self
    }

    pub fn with_codegen_emission(mut self, emission: impl Into<String>) -> Self {
        self.codegen_emission = Some(emission.into());
        self
    }

    pub fn with_link_lib(mut self, lib: impl Into<String>) -> Self {
        self.link_libs.push(lib.into());
        self
    }

    pub fn with_option(mut self, option: TargetOption) -> Self {
        self.options.push(option);
        self
    }

    /// Whether the target runs on a remote platform.
    pub fn is_remote(&self) -> bool {
        self.platform_qpu.is_remote()
    }

    fn validate(&self) -> TargetResult<()> {
        if self.name.trim().is_empty() {
            return Err(TargetError::Configuration(
                "target name must not be empty".into(),
            ));
        }
        if self.simulation_backend.trim().is_empty() {
            return Err(TargetError::Configuration(format!(
                "target '{}' has no simulation backend",
                self.name
            )));
        }
        let mut seen = BTreeSet::new();
        for opt in &self.options {
            if !seen.insert(opt.option.as_str()) {
                return Err(TargetError::Configuration(format!(
                    "target '{}' declares option '{}' twice",
                    self.name, opt.option
                )));
            }
        }
        Ok(())
    }
}

fn default_library_mode() -> bool {
    true
}

/// Immutable registry of execution targets.
///
/// Duplicate names are rejected when the catalog is built, never at lookup.
#[derive(Debug, Clone)]
pub struct TargetCatalog {
    targets: FxHashMap<String, Arc<TargetSpec>>,
}

impl TargetCatalog {
    /// Build a catalog from a list of specs.
    pub fn new(specs: impl IntoIterator<Item = TargetSpec>) -> TargetResult<Self> {
        let mut targets = FxHashMap::default();
        for spec in specs {
            spec.validate()?;
            debug!("Registering target: {}", spec.name);
            if targets.contains_key(&spec.name) {
                return Err(TargetError::DuplicateTargetRegistration(spec.name));
            }
            targets.insert(spec.name.clone(), Arc::new(spec));
        }
        Ok(Self { targets })
    }

    /// The stock targets.
    pub fn builtin() -> Self {
        Self {
            targets: builtin_specs()
                .into_iter()
                .map(|spec| (spec.name.clone(), Arc::new(spec)))
                .collect(),
        }
    }

    /// The stock targets plus user-defined ones.
    pub fn builtin_with(extra: impl IntoIterator<Item = TargetSpec>) -> TargetResult<Self> {
        Self::new(builtin_specs().into_iter().chain(extra))
    }

    /// The stock targets plus a YAML list of user-defined ones.
    pub fn from_yaml_str(source: &str) -> TargetResult<Self> {
        Self::builtin_with(crate::config::parse_targets_yaml(source)?)
    }

    /// Look up a target by name.
    pub fn lookup(&self, name: &str) -> TargetResult<&Arc<TargetSpec>> {
        self.targets
            .get(name)
            .ok_or_else(|| TargetError::UnknownTarget(name.to_string()))
    }

    /// Check if a target is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    /// All target names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.targets.keys().cloned().collect();
        names.sort();
        names
    }

    /// All specs in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TargetSpec>> {
        let mut specs: Vec<_> = self.targets.values().collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs.into_iter()
    }

    /// Library files any registered target depends on.
    pub fn required_libraries(&self) -> BTreeSet<String> {
        self.targets
            .values()
            .filter_map(|spec| spec.required_library.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl Default for TargetCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_specs() -> Vec<TargetSpec> {
    vec![
        TargetSpec::new("default", "qpp")
            .with_description("CPU state-vector simulator"),
        TargetSpec::new("qpp-cpu", "qpp")
            .with_description("CPU state-vector simulator"),
        TargetSpec::new("density-matrix-cpu", "dm")
            .with_description("CPU density-matrix simulator (noise modeling)"),
        TargetSpec::new("nvidia", "custatevec_fp32")
            .with_description("Single-GPU state-vector simulator (fp32)")
            .with_gpu()
            .with_required_library("libnvqir-custatevec-fp32.so"),
        TargetSpec::new("nvidia-fp64", "custatevec_fp64")
            .with_description("Single-GPU state-vector simulator (fp64)")
            .with_gpu()
            .with_required_library("libnvqir-custatevec-fp64.so"),
        TargetSpec::new("nvidia-mgpu", "nvidia_mgpu")
            .with_description("State vector pooled across multiple GPUs")
            .with_gpu()
            .with_required_library("libnvqir-mgpu.so"),
        TargetSpec::new("nvidia-mqpu", "custatevec_fp32")
            .with_description("One virtual QPU per GPU")
            .with_gpu()
            .with_required_library("libnvqir-custatevec-fp32.so")
            .with_platform_library(PlatformLibrary::Mqpu),
        TargetSpec::new("tensornet", "tensornet")
            .with_description("GPU tensor-network simulator")
            .with_gpu()
            .with_required_library("libnvqir-tensornet.so"),
        TargetSpec::remote("iqm", "qpp")
            .with_description("IQM quantum processors via REST")
            .with_pipeline([
                "expand-measurements",
                "unrolling-pipeline",
                "decomposition{enable-patterns=U3ToRotations}",
                "func.func(lower-to-cfg)",
                "canonicalize",
                "func.func(multicontrol-decomposition)",
                "iqm-gate-set-mapping",
            ])
            .with_codegen_emission("qir-base")
            .with_link_lib("-lcudaq-rest-qpu")
            .with_option(
                TargetOption::new("server-url", "url").with_description("IQM server URL"),
            )
            .with_option(
                TargetOption::new("machine", "qpu-architecture")
                    .with_description("QPU architecture (e.g. Adonis, Apollo)"),
            ),
        TargetSpec::remote("quantinuum", "qpp")
            .with_description("Quantinuum trapped-ion devices via REST")
            .with_pipeline([
                "expand-measurements",
                "unrolling-pipeline",
                "decomposition{enable-patterns=CCZToCX,CR1ToCX,R1AdjToR1,RxAdjToRx,RyAdjToRy,RzAdjToRz}",
                "func.func(combine-measurements)",
                "quake-to-cc-prep",
            ])
            .with_codegen_emission("qir-adaptive")
            .with_link_lib("-lcudaq-rest-qpu")
            .with_option(TargetOption::new("url", "url").with_description("API endpoint"))
            .with_option(
                TargetOption::new("machine", "machine").with_description("Device or emulator name"),
            ),
    ]
}
