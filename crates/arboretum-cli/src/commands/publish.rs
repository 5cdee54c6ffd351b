use std::path::Path;

use anyhow::{bail, Result};
use comfy_table::Table;

use arboretum_ago::{AgoClient, AgoConfig};
use arboretum_core::config::{PublishConfig, Settings};
use arboretum_core::summary;
use arboretum_core::targets::layer_targets;

/// Overwrite all four hosted layers from the derived CSVs. Configuration is
/// validated before any file or network work; a target that fails does not
/// stop the remaining targets, but any failure makes the run exit non-zero.
pub async fn handle_publish(root: &Path, settings: &Settings, no_refresh: bool) -> Result<()> {
    let config = PublishConfig::from_env()?;

    if no_refresh {
        println!("Skipping summary rebuild (--no-refresh)");
    } else {
        let report = summary::build_all(root, settings)?;
        println!("Rebuilt {} derived CSVs", report.outputs.len());
    }

    let targets = layer_targets(&config.items);

    // Preflight every CSV before the first upload: an overwrite replaces
    // the hosted table, so an empty product must never reach the portal.
    for target in &targets {
        let path = root.join(target.key.csv_file());
        if !path.exists() {
            bail!("derived CSV {} is missing; run `arboretum summarize` first", path.display());
        }
        if summary::csv_data_rows(&path)? == 0 {
            bail!("refusing to publish {}: it has no data rows", path.display());
        }
    }

    let client = AgoClient::connect(AgoConfig::new(
        &config.credentials.org_url,
        &config.credentials.username,
        &config.credentials.password,
    ))
    .await?;

    let mut failure_count = 0;
    let mut table = Table::new();
    table.set_header(["Layer", "Item id", "CSV", "Status"]);

    for target in &targets {
        let csv_file = target.key.csv_file();
        println!("Overwriting '{}' ({}) from {csv_file}", target.key, target.item_id);

        let bytes = std::fs::read(root.join(csv_file))?;
        let status = match client
            .overwrite_feature_layer(&target.item_id, csv_file, bytes)
            .await
        {
            Ok(()) => "published".to_string(),
            Err(err) => {
                eprintln!("  -> ERROR: {err}");
                failure_count += 1;
                format!("failed: {err}")
            }
        };

        table.add_row([
            target.key.label().to_string(),
            target.item_id.clone(),
            csv_file.to_string(),
            status,
        ]);
    }

    println!("\n--- Publish Summary ---");
    println!("{table}");

    if failure_count > 0 {
        bail!("{failure_count} of {} layers failed to publish", targets.len());
    }
    Ok(())
}
