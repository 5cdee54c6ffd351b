use std::path::Path;

use anyhow::Result;
use comfy_table::Table;

use arboretum_ago::{AgoClient, AgoConfig};
use arboretum_core::config::{PublishConfig, Settings};
use arboretum_core::summary;
use arboretum_core::targets::layer_targets;

pub async fn handle_check(root: &Path, settings: &Settings, remote: bool) -> Result<()> {
    let config = PublishConfig::from_env()?;
    println!("Configuration OK: all required environment variables are set.");

    for dir in [&settings.data.dendrometer_dir, &settings.data.tms_dir] {
        let path = root.join(dir);
        let count = data_file_count(&path);
        match count {
            Some(count) => println!("  ✅ {dir}: {count} data files"),
            None => println!("  ⚠️  {dir}: folder missing (run `arboretum sync` first)"),
        }
    }

    let mut table = Table::new();
    table.set_header(["Layer", "Env var", "Item id", "CSV", "Rows"]);
    for target in layer_targets(&config.items) {
        let path = root.join(target.key.csv_file());
        let rows = if path.exists() {
            summary::csv_data_rows(&path)?.to_string()
        } else {
            "missing".to_string()
        };
        table.add_row([
            target.key.label().to_string(),
            target.key.env_var().to_string(),
            target.item_id.clone(),
            target.key.csv_file().to_string(),
            rows,
        ]);
    }
    println!("{table}");

    if remote {
        println!("Resolving configured items against the portal...");
        let client = AgoClient::connect(AgoConfig::new(
            &config.credentials.org_url,
            &config.credentials.username,
            &config.credentials.password,
        ))
        .await?;

        for target in layer_targets(&config.items) {
            let item = client.get_item(&target.item_id).await?;
            println!("  ✅ {}: '{}' ({})", target.key, item.title, item.item_type);
        }
    }

    Ok(())
}

fn data_file_count(dir: &Path) -> Option<usize> {
    let entries = std::fs::read_dir(dir).ok()?;
    let count = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with("data_") && name.ends_with(".csv"))
                .unwrap_or(false)
        })
        .count();
    Some(count)
}
