//! Mirrors the dashboard repository's data folders over the local ones.
//! Destination contents are fully owned: files missing from the source are
//! removed. Per-file content hashes decide whether anything changed, so a
//! re-run over identical data reports no work.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::info;

use crate::config::Settings;
use crate::error::{PipelineError, Result};

#[derive(Debug, Default, Clone, Copy)]
pub struct SyncReport {
    pub copied: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        self.copied > 0 || self.removed > 0
    }

    fn absorb(&mut self, other: SyncReport) {
        self.copied += other.copied;
        self.removed += other.removed;
        self.unchanged += other.unchanged;
    }
}

/// Mirror both data folders from a dashboard checkout into the repository.
pub fn sync_data(source_root: &Path, repo_root: &Path, settings: &Settings) -> Result<SyncReport> {
    let mut report = SyncReport::default();
    for dir in [&settings.data.dendrometer_dir, &settings.data.tms_dir] {
        let folder = mirror_folder(&source_root.join(dir), &repo_root.join(dir))?;
        info!(
            "{dir}: {} copied, {} removed, {} unchanged",
            folder.copied, folder.removed, folder.unchanged
        );
        report.absorb(folder);
    }
    Ok(report)
}

/// Mirror one flat folder of files. Subdirectories are not expected in the
/// vendor export layout and are left alone.
pub fn mirror_folder(source: &Path, dest: &Path) -> Result<SyncReport> {
    if !source.is_dir() {
        return Err(PipelineError::Validation(format!(
            "source folder {} does not exist",
            source.display()
        )));
    }
    std::fs::create_dir_all(dest)?;

    let source_names = file_names(source)?;
    let dest_names = file_names(dest)?;

    let mut report = SyncReport::default();

    for name in &source_names {
        let source_bytes = std::fs::read(source.join(name))?;
        let dest_path = dest.join(name);

        let identical = match std::fs::read(&dest_path) {
            Ok(dest_bytes) => content_hash(&dest_bytes) == content_hash(&source_bytes),
            Err(_) => false,
        };

        if identical {
            report.unchanged += 1;
        } else {
            std::fs::write(&dest_path, &source_bytes)?;
            report.copied += 1;
        }
    }

    for name in dest_names.difference(&source_names) {
        std::fs::remove_file(dest.join(name))?;
        report.removed += 1;
    }

    Ok(report)
}

fn file_names(dir: &Path) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            if let Ok(name) = entry.file_name().into_string() {
                names.insert(name);
            }
        }
    }
    Ok(names)
}

fn content_hash(contents: &[u8]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(contents);
    hasher.finalize().to_hex().to_string()
}
