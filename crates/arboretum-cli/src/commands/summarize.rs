use std::path::Path;

use anyhow::Result;
use arboretum_core::config::Settings;
use arboretum_core::summary;

pub fn handle_summarize(root: &Path, settings: &Settings) -> Result<()> {
    println!("Rebuilding derived CSVs under {}", root.display());
    let report = summary::build_all(root, settings)?;

    println!("\n--- Rebuild Summary ---");
    println!(
        "  ✅ Dendrometer files parsed: {} ({} skipped)",
        report.dendro_parsed, report.dendro_skipped
    );
    println!(
        "  ✅ TMS files parsed: {} ({} skipped)",
        report.tms_parsed, report.tms_skipped
    );
    println!("  📄 Outputs written: {}", report.outputs.len());
    for path in &report.outputs {
        println!("     - {}", path.display());
    }
    Ok(())
}
