//! Resolve command implementation.

use anyhow::Result;
use console::style;
use tracing::debug;

use arvak_target::{HardwareReport, LaunchConfigBuilder, ResolveOptions};

use super::common::{OutputFormat, Settings, resolver};

/// Execute the resolve command.
pub fn execute(
    settings: &Settings,
    target: &str,
    extra: &[String],
    library_mode: Option<bool>,
    format: OutputFormat,
) -> Result<()> {
    let catalog = settings.load_catalog()?;
    let (probe, config) = settings.build_probe(&catalog)?;

    // Only GPU targets look at the hardware.
    let needs_gpu = catalog
        .lookup(target)
        .map(|spec| spec.requires_gpu)
        .unwrap_or(false);
    let report = if needs_gpu {
        probe.probe()
    } else {
        debug!("Skipping hardware probe for {}", target);
        HardwareReport::default()
    };

    let options = ResolveOptions { library_mode };
    let launch = resolver(&catalog, &config).resolve_raw(target, &report, extra, options);
    if let Some(message) = launch.error_message() {
        anyhow::bail!("{message}");
    }

    match format {
        OutputFormat::Env => print!("{}", LaunchConfigBuilder::render_env_script(&launch)?),
        OutputFormat::Json => println!("{}", LaunchConfigBuilder::render_json(&launch)?),
        OutputFormat::Table => {
            let env = LaunchConfigBuilder::render(&launch)?;
            println!(
                "{} Launch configuration for {}\n",
                style("Arvak").cyan().bold(),
                style(target).bold()
            );
            let width = env.keys().map(String::len).max().unwrap_or(0);
            for (key, value) in &env {
                println!("  {:width$}  {}", key, value, width = width);
            }
        }
    }

    Ok(())
}
