use crate::cli::options::OutputFormat;
use crate::driver::{MigrationReport, WorkspaceAnalysis};
use crate::snapshot::SnapshotView;
use crate::types::{MappingRegime, StackState};
use anyhow::Result;
use serde::Serialize;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_resources(resources: &[String], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&resources),
        OutputFormat::Text => {
            for address in resources {
                println!("{address}");
            }
            Ok(())
        }
    }
}

/// Print classification, components and the address map.
pub fn print_analysis(analysis: &WorkspaceAnalysis, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(analysis);
    }

    println!("Resources:      {}", analysis.resources.len());
    println!(
        "Fully modular:  {}",
        if analysis.fully_modular { "yes" } else { "no" }
    );
    println!(
        "Components:     {}",
        analysis
            .components
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    );

    let heading = match analysis.address_map.regime() {
        MappingRegime::ResourceAddresses => "Resource address map",
        MappingRegime::ModuleNames => "Module address map",
    };
    println!();
    println!("{heading}:");
    let width = analysis
        .address_map
        .entries()
        .keys()
        .map(|key| key.len())
        .max()
        .unwrap_or(0);
    for (from, to) in analysis.address_map.entries() {
        println!("  {from:<width$}  ->  {to}");
    }
    Ok(())
}

pub fn print_report(report: &MigrationReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }

    let regime = match report.regime {
        MappingRegime::ResourceAddresses => "resource addresses",
        MappingRegime::ModuleNames => "module names",
    };
    println!("Stack state written to {}", report.output_path.display());
    println!("Mapped {} {regime}", report.mapped_addresses);
    println!(
        "{} raw entries, {} descriptions",
        report.raw_entries, report.descriptions
    );
    Ok(())
}

pub fn print_snapshot(snapshot: &StackState, format: OutputFormat) -> Result<()> {
    let view = SnapshotView::from(snapshot);
    if format == OutputFormat::Json {
        return print_json(&view);
    }

    println!("Format version: {}", view.format_version);
    println!("Raw entries ({}):", view.raw.len());
    for (key, raw) in &view.raw {
        println!("  {key}  [{}]", raw.type_url);
    }
    println!("Descriptions ({}):", view.descriptions.len());
    for (key, description) in &view.descriptions {
        match &description.prior_address {
            Some(prior) => println!(
                "  {key}  {} {} (was {prior})",
                description.kind, description.address
            ),
            None => println!("  {key}  {} {}", description.kind, description.address),
        }
    }
    Ok(())
}
