//! Targets command implementation.

use anyhow::Result;
use console::style;
use serde::Serialize;

use arvak_target::{HardwareReport, ProbeConfig, TargetCatalog, TargetSpec};

use super::common::{OutputFormat, Settings, require_format, resolver};

#[derive(Serialize)]
struct TargetRow<'a> {
    #[serde(flatten)]
    spec: &'a TargetSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// Execute the targets command.
pub fn execute(settings: &Settings, probe: bool, format: OutputFormat) -> Result<()> {
    require_format(format, "targets")?;
    let catalog = settings.load_catalog()?;

    let (report, config) = if probe {
        let (hw, config) = settings.build_probe(&catalog)?;
        (Some(hw.probe()), Some(config))
    } else {
        (None, None)
    };

    let rows: Vec<TargetRow<'_>> = catalog
        .iter()
        .map(|spec| {
            let (available, reason) = match (&report, &config) {
                (Some(report), Some(config)) => feasibility(&catalog, config, spec, report),
                _ => (None, None),
            };
            TargetRow {
                spec: spec.as_ref(),
                available,
                reason,
            }
        })
        .collect();

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{} Available targets:\n", style("Arvak").cyan().bold());

    for row in &rows {
        let spec = row.spec;
        let marker = match row.available {
            Some(true) => style("●").green(),
            Some(false) => style("○").red(),
            None => style("·").dim(),
        };
        let place = if spec.is_remote() {
            "(remote)"
        } else if spec.requires_gpu {
            "(gpu)"
        } else {
            "(cpu)"
        };

        println!("  {} {} {}", marker, style(&spec.name).bold(), place);
        if !spec.description.is_empty() {
            println!("    {}", spec.description);
        }
        println!("    Backend: {}", spec.simulation_backend);
        if let Some(ref lib) = spec.required_library {
            println!("    Library: {lib}");
        }
        if !spec.options.is_empty() {
            let flags: Vec<String> = spec
                .options
                .iter()
                .map(|o| format!("--{}-{}", spec.name, o.option))
                .collect();
            println!("    Flags: {}", flags.join(", "));
        }
        if let Some(ref reason) = row.reason {
            println!("    Status: {}", style(reason).yellow());
        }
        println!();
    }

    Ok(())
}

fn feasibility(
    catalog: &TargetCatalog,
    config: &ProbeConfig,
    spec: &TargetSpec,
    report: &HardwareReport,
) -> (Option<bool>, Option<String>) {
    let launch = resolver(catalog, config).resolve(&spec.name, report, Vec::new());
    (Some(launch.is_resolved()), launch.error_message())
}
