//! Arvak execution target selection.
//!
//! This crate decides *where* a quantum program runs and *how* the external
//! runtime must be launched for it. It does not simulate or compile anything
//! itself; it picks a backend and renders the launch surface.
//!
//! # Overview
//!
//! - [`TargetCatalog`]: immutable registry of [`TargetSpec`]s
//! - [`HardwareProbe`]: GPU and backend library discovery, one
//!   [`HardwareReport`] per call
//! - [`ArgumentParser`]: harvests `--<target>-<option> <value>` flags
//! - [`TargetResolver`]: feasibility checks, producing a [`LaunchConfig`]
//! - [`LaunchConfigBuilder`]: renders the runtime's key/value surface
//!
//! # Example
//!
//! ```no_run
//! use arvak_target::{
//!     HardwareProbe, LaunchConfigBuilder, ProbeConfig, ResolveOptions, TargetCatalog,
//!     TargetResolver,
//! };
//!
//! # fn main() -> Result<(), arvak_target::TargetError> {
//! let catalog = TargetCatalog::builtin();
//! let probe = HardwareProbe::from_config(&ProbeConfig::from_env()?)
//!     .with_libraries(catalog.required_libraries());
//! let report = probe.probe();
//!
//! let config = TargetResolver::new(&catalog).resolve_raw(
//!     "nvidia-mgpu",
//!     &report,
//!     &["--nvidia-mgpu-fusion", "4"],
//!     ResolveOptions::default(),
//! );
//!
//! match config.error_message() {
//!     Some(msg) => eprintln!("{msg}"),
//!     None => print!("{}", LaunchConfigBuilder::render_env_script(&config)?),
//! }
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod catalog;
pub mod config;
pub mod error;
pub mod launch;
pub mod probe;
pub mod resolver;

pub use args::{ArgumentParser, ExtraArg};
pub use catalog::{PlatformLibrary, QpuSubtype, TargetCatalog, TargetOption, TargetSpec};
pub use config::{ProbeConfig, load_catalog};
pub use error::{TargetError, TargetResult};
pub use launch::{LaunchConfig, LaunchConfigBuilder};
pub use probe::{DeviceQuery, HardwareProbe, HardwareReport, LibraryLocator, NvidiaSmi, ToolOutcome};
pub use resolver::{ResolveOptions, TargetResolver};
