//! Probe command implementation.

use anyhow::Result;
use console::style;

use super::common::{OutputFormat, Settings, require_format};

/// Execute the probe command.
pub fn execute(settings: &Settings, format: OutputFormat) -> Result<()> {
    require_format(format, "probe")?;
    let catalog = settings.load_catalog()?;
    let (probe, config) = settings.build_probe(&catalog)?;

    let report = probe.probe();

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} Hardware report\n", style("Arvak").cyan().bold());

    let tooling = if report.gpu_tooling_available {
        style("found").green()
    } else {
        style("not found").yellow()
    };
    println!("  Tool:      {} ({})", config.tool.display(), tooling);
    println!("  Timeout:   {:?}", config.timeout);

    if let Some(ref err) = report.probe_error {
        println!("  Error:     {}", style(err).red());
    }

    println!("  GPUs:      {}", report.gpu_count);
    for device in &report.devices {
        println!("    {} {}", style("●").green(), device);
    }

    println!("\n  Libraries:");
    for library in catalog.required_libraries() {
        let marker = if report.has_library(&library) {
            style("●").green()
        } else {
            style("○").red()
        };
        println!("    {marker} {library}");
    }
    if config.library_dirs.is_empty() {
        println!("  {}", style("(no library search path configured)").dim());
    }

    Ok(())
}
