use std::fs;

use arboretum_core::config::Settings;
use arboretum_core::error::PipelineError;
use arboretum_core::sync::{mirror_folder, sync_data};

#[test]
fn mirror_copies_new_files_and_removes_orphans() {
    let source = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();

    fs::write(source.path().join("data_1_2021_06_01_0.csv"), "a").unwrap();
    fs::write(source.path().join("data_2_2021_06_01_0.csv"), "b").unwrap();
    fs::write(dest.path().join("data_9_2020_01_01_0.csv"), "stale").unwrap();

    let report = mirror_folder(source.path(), dest.path()).unwrap();

    assert_eq!(report.copied, 2);
    assert_eq!(report.removed, 1);
    assert_eq!(report.unchanged, 0);
    assert!(report.changed());
    assert!(dest.path().join("data_1_2021_06_01_0.csv").exists());
    assert!(!dest.path().join("data_9_2020_01_01_0.csv").exists());
}

#[test]
fn second_mirror_of_identical_content_reports_no_changes() {
    let source = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();
    fs::write(source.path().join("data_1_2021_06_01_0.csv"), "a").unwrap();

    mirror_folder(source.path(), dest.path()).unwrap();
    let second = mirror_folder(source.path(), dest.path()).unwrap();

    assert_eq!(second.copied, 0);
    assert_eq!(second.removed, 0);
    assert_eq!(second.unchanged, 1);
    assert!(!second.changed());
}

#[test]
fn changed_file_contents_are_overwritten() {
    let source = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();
    fs::write(source.path().join("data_1_2021_06_01_0.csv"), "new").unwrap();
    fs::write(dest.path().join("data_1_2021_06_01_0.csv"), "old").unwrap();

    let report = mirror_folder(source.path(), dest.path()).unwrap();

    assert_eq!(report.copied, 1);
    assert_eq!(
        fs::read_to_string(dest.path().join("data_1_2021_06_01_0.csv")).unwrap(),
        "new"
    );
}

#[test]
fn missing_source_folder_is_an_error() {
    let dest = tempfile::tempdir().unwrap();
    let err = mirror_folder(&dest.path().join("nope"), dest.path()).unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[test]
fn sync_data_mirrors_both_configured_folders() {
    let source = tempfile::tempdir().unwrap();
    let repo = tempfile::tempdir().unwrap();
    let settings = Settings::default();

    for dir in ["Dendrometer_Data", "TMS_Data"] {
        fs::create_dir_all(source.path().join(dir)).unwrap();
        fs::write(source.path().join(dir).join("data_1_2021_06_01_0.csv"), dir).unwrap();
    }

    let report = sync_data(source.path(), repo.path(), &settings).unwrap();

    assert_eq!(report.copied, 2);
    assert!(repo.path().join("Dendrometer_Data/data_1_2021_06_01_0.csv").exists());
    assert!(repo.path().join("TMS_Data/data_1_2021_06_01_0.csv").exists());
}
