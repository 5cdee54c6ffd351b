use std::path::Path;

use anyhow::Result;
use arboretum_core::config::Settings;
use arboretum_core::sync;

pub fn handle_sync(source: &Path, root: &Path, settings: &Settings) -> Result<()> {
    println!("Mirroring data folders from {}", source.display());
    let report = sync::sync_data(source, root, settings)?;

    println!("\n--- Sync Summary ---");
    println!("  ✅ Copied:    {}", report.copied);
    println!("  ✅ Removed:   {}", report.removed);
    println!("  ⏭️  Unchanged: {}", report.unchanged);
    if report.changed() {
        println!("\nData folders changed; commit to trigger a publish.");
    } else {
        println!("\nData folders already match the source.");
    }
    Ok(())
}
