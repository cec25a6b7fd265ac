//! Launch configuration and its rendering for the execution runtime.
//!
//! A [`LaunchConfig`] is the one-shot result of resolving a target. It is
//! either resolved (carries a backend id) or failed (carries an error), never
//! both. [`LaunchConfigBuilder`] turns a resolved config into the fixed key
//! set the runtime reads at process launch.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::args::ExtraArg;
use crate::catalog::TargetSpec;
use crate::error::{TargetError, TargetResult};

/// Simulation backend id.
pub const KEY_SIMULATION_BACKEND: &str = "NVQIR_SIMULATION_BACKEND";
/// `local` or `remote_rest`.
pub const KEY_PLATFORM_QPU: &str = "PLATFORM_QPU";
/// `default` or `mqpu`.
pub const KEY_PLATFORM_LIBRARY: &str = "PLATFORM_LIBRARY";
pub const KEY_GEN_TARGET_BACKEND: &str = "GEN_TARGET_BACKEND";
/// Space-separated link libraries.
pub const KEY_LINK_LIBS: &str = "LINKLIBS";
/// Comma-separated lowering stages.
pub const KEY_LOWERING_CONFIG: &str = "PLATFORM_LOWERING_CONFIG";
pub const KEY_CODEGEN_EMISSION: &str = "CODEGEN_EMISSION";
pub const KEY_LIBRARY_MODE: &str = "LIBRARY_MODE";
/// `;key;value` segments.
pub const KEY_EXTRA_ARGS: &str = "PLATFORM_EXTRA_ARGS";

/// Every key [`LaunchConfigBuilder::render`] emits.
pub const RENDERED_KEYS: [&str; 9] = [
    KEY_SIMULATION_BACKEND,
    KEY_PLATFORM_QPU,
    KEY_PLATFORM_LIBRARY,
    KEY_GEN_TARGET_BACKEND,
    KEY_LINK_LIBS,
    KEY_LOWERING_CONFIG,
    KEY_CODEGEN_EMISSION,
    KEY_LIBRARY_MODE,
    KEY_EXTRA_ARGS,
];

/// Outcome of one resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    target: Option<Arc<TargetSpec>>,
    resolved_backend_id: Option<String>,
    library_mode: bool,
    extra_args: Vec<ExtraArg>,
    error: Option<TargetError>,
}

impl LaunchConfig {
    /// A successfully resolved launch.
    pub fn resolved(
        target: Arc<TargetSpec>,
        backend_id: impl Into<String>,
        extra_args: Vec<ExtraArg>,
        library_mode: bool,
    ) -> Self {
        Self {
            target: Some(target),
            resolved_backend_id: Some(backend_id.into()),
            library_mode,
            extra_args,
            error: None,
        }
    }

    /// A failed resolution. `target` is `None` when the name was unknown.
    pub fn failed(target: Option<Arc<TargetSpec>>, error: TargetError) -> Self {
        Self {
            target,
            resolved_backend_id: None,
            library_mode: false,
            extra_args: Vec::new(),
            error: Some(error),
        }
    }

    pub fn target(&self) -> Option<&TargetSpec> {
        self.target.as_deref()
    }

    /// Backend id; `None` whenever resolution failed.
    pub fn resolved_backend_id(&self) -> Option<&str> {
        self.resolved_backend_id.as_deref()
    }

    pub fn library_mode(&self) -> bool {
        self.library_mode
    }

    pub fn extra_args(&self) -> &[ExtraArg] {
        &self.extra_args
    }

    pub fn error(&self) -> Option<&TargetError> {
        self.error.as_ref()
    }

    /// The diagnostic line for a failed resolution.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn is_resolved(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into a `Result` for `?`-style callers.
    pub fn into_result(self) -> TargetResult<Self> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Renders a resolved [`LaunchConfig`] for the runtime.
///
/// Output is a pure function of the config: keys are ordered, nothing is read
/// from the environment or clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaunchConfigBuilder;

impl LaunchConfigBuilder {
    /// Render the fixed key set. A failed config returns its error.
    pub fn render(config: &LaunchConfig) -> TargetResult<BTreeMap<String, String>> {
        if let Some(err) = config.error() {
            return Err(err.clone());
        }
        let (Some(spec), Some(backend)) = (config.target(), config.resolved_backend_id()) else {
            return Err(TargetError::Configuration(
                "launch config is neither resolved nor failed".into(),
            ));
        };

        let mut env = BTreeMap::new();
        let mut set = |key: &str, value: String| {
            env.insert(key.to_string(), value);
        };

        set(KEY_SIMULATION_BACKEND, backend.to_string());
        set(KEY_PLATFORM_QPU, spec.platform_qpu.as_str().to_string());
        set(KEY_PLATFORM_LIBRARY, spec.platform_library.as_str().to_string());
        set(KEY_GEN_TARGET_BACKEND, bool_token(spec.gen_target_backend));
        set(KEY_LINK_LIBS, spec.link_libs.join(" "));
        set(KEY_LOWERING_CONFIG, spec.lowering_pipeline.join(","));
        set(
            KEY_CODEGEN_EMISSION,
            spec.codegen_emission.clone().unwrap_or_default(),
        );
        set(KEY_LIBRARY_MODE, bool_token(config.library_mode()));
        set(KEY_EXTRA_ARGS, render_extra_args(config.extra_args()));

        Ok(env)
    }

    /// Render as POSIX shell `export` lines.
    pub fn render_env_script(config: &LaunchConfig) -> TargetResult<String> {
        let env = Self::render(config)?;
        let mut script = String::new();
        for (key, value) in &env {
            let _ = writeln!(script, "export {}=\"{}\"", key, shell_escape(value));
        }
        Ok(script)
    }

    /// Render as pretty JSON.
    pub fn render_json(config: &LaunchConfig) -> TargetResult<String> {
        let env = Self::render(config)?;
        serde_json::to_string_pretty(&env)
            .map_err(|e| TargetError::Configuration(format!("JSON serialization failed: {e}")))
    }
}

fn bool_token(value: bool) -> String {
    let token = if value { "true" } else { "false" };
    token.to_string()
}

/// `[(a, 1), (b, 2)]` renders as `;a;1;b;2`.
pub fn render_extra_args(args: &[ExtraArg]) -> String {
    args.iter().fold(String::new(), |mut out, arg| {
        let _ = write!(out, ";{};{}", arg.key, arg.value);
        out
    })
}

fn shell_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
