use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;

use arboretum_core::config::Settings;
use arboretum_core::error::PipelineError;
use arboretum_core::summary::{
    build_all, csv_data_rows, daily_summary, dbh_difference, merge_with_metadata, overall_summary,
    scan_folder, DBH_MERGED_FILE, DENDRO_IMAGES_FILE,
};
use arboretum_parser::{parse_sensor_file, ParsedSensorFile, SensorKind};

const DENDRO_FILE_NAME: &str = "data_92201234_2021_06_01_0.csv";
const DENDRO_CONTENT: &str = "\
1;2021.05.30 10:00;0;18.5;92;93;120;0;0
2;2021.05.30 10:15;0;19.5;92;93;124;0;0
3;2021.05.31 10:00;0;20.5;92;93;128;0;0
4;2021.05.31 10:15;0;;92;93;132;0;0
";

const TMS_FILE_NAME: &str = "data_94123456_2021_06_01_0.csv";
const TMS_CONTENT: &str = "\
1;2021.05.30 10:00;0;12.5;13.0;14.5;2400;255;0
2;2021.05.30 10:15;0;12.5;13.5;15.0;2500;255;0
3;2021.05.30 10:30;0;13.0;14.0;15.5;2600;255;0
";

fn dendro_file() -> ParsedSensorFile {
    parse_sensor_file(SensorKind::Dendrometer, DENDRO_FILE_NAME, DENDRO_CONTENT)
        .expect("dendro fixture parse failed")
}

fn tms_file() -> ParsedSensorFile {
    parse_sensor_file(SensorKind::Tms, TMS_FILE_NAME, TMS_CONTENT).expect("tms fixture parse failed")
}

fn start_dbh_frame() -> DataFrame {
    DataFrame::new(vec![
        Series::new("ID".into(), vec![92201234i64]).into(),
        Series::new("start_DBH".into(), vec![30.0f64]).into(),
    ])
    .unwrap()
}

#[test]
fn overall_summary_computes_per_sensor_means() {
    let df = overall_summary(&[dendro_file()], SensorKind::Dendrometer).unwrap();

    assert_eq!(df.height(), 1);
    let ids = df.column("sensor_id").unwrap().i64().unwrap();
    assert_eq!(ids.get(0), Some(92201234));

    // One of the four temperature fields is blank; the mean ignores it.
    let temp = df.column("avg_air_temp").unwrap().f64().unwrap();
    assert_eq!(temp.get(0), Some(19.5));
    let growth = df.column("avg_growth").unwrap().f64().unwrap();
    assert_eq!(growth.get(0), Some(126.0));
}

#[test]
fn daily_summary_groups_by_calendar_day() {
    let df = daily_summary(&[dendro_file()], SensorKind::Dendrometer).unwrap();

    assert_eq!(df.height(), 2);
    let growth = df.column("avg_growth").unwrap().f64().unwrap();
    assert_eq!(growth.get(0), Some(122.0));
    assert_eq!(growth.get(1), Some(130.0));

    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let first_day = NaiveDate::from_ymd_opt(2021, 5, 30).unwrap();
    let expected_days = (first_day - epoch).num_days() as i32;
    match df.column("date").unwrap().get(0).unwrap() {
        AnyValue::Date(days) => assert_eq!(days, expected_days),
        other => panic!("expected a date value, got {other:?}"),
    }
}

#[test]
fn tms_means_cover_all_four_metrics() {
    let df = overall_summary(&[tms_file()], SensorKind::Tms).unwrap();

    let t2 = df.column("avg_t2").unwrap().f64().unwrap();
    assert_eq!(t2.get(0), Some(13.5));
    let moist = df.column("avg_moist").unwrap().f64().unwrap();
    assert_eq!(moist.get(0), Some(2500.0));
}

#[test]
fn dbh_difference_matches_hand_computation() {
    let df = dbh_difference(&[dendro_file()], &start_dbh_frame()).unwrap();

    assert_eq!(df.height(), 1);
    // Last displacement reading is 132 um: 30 + (132 / 10000) * 2 = 30.0264.
    let end = df.column("end_DBH").unwrap().f64().unwrap();
    assert_eq!(end.get(0), Some(30.03));
    let diff = df.column("dbh_diff").unwrap().f64().unwrap();
    assert_eq!(diff.get(0), Some(0.03));
}

#[test]
fn dbh_difference_requires_start_columns() {
    let bad = DataFrame::new(vec![
        Series::new("ID".into(), vec![92201234i64]).into(),
    ])
    .unwrap();
    let err = dbh_difference(&[dendro_file()], &bad).unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[test]
fn merge_keeps_metadata_rows_without_readings() {
    let metadata = DataFrame::new(vec![
        Series::new("sensor_id".into(), vec![92201234i64, 99999999]).into(),
        Series::new("Common_Name".into(), vec!["White Oak", "Red Maple"]).into(),
    ])
    .unwrap();
    let summary = overall_summary(&[dendro_file()], SensorKind::Dendrometer).unwrap();

    let merged = merge_with_metadata(&metadata, &summary).unwrap();
    assert_eq!(merged.height(), 2);
    assert_eq!(merged.column("avg_growth").unwrap().null_count(), 1);
}

#[test]
fn empty_folder_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let err = scan_folder(dir.path(), SensorKind::Dendrometer).unwrap_err();
    match err {
        PipelineError::Validation(message) => {
            assert!(message.contains("no parseable"), "unexpected: {message}")
        }
        other => panic!("expected a validation error, got {other}"),
    }
}

#[test]
fn folder_with_only_unparseable_files_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("data_92201234_2021_06_01_0.csv"), "not;a;file\n").unwrap();
    assert!(scan_folder(dir.path(), SensorKind::Dendrometer).is_err());
}

#[test]
fn csv_row_count_ignores_header_and_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");
    fs::write(&path, "sensor_id,avg_growth\n").unwrap();
    assert_eq!(csv_data_rows(&path).unwrap(), 0);
    fs::write(&path, "sensor_id,avg_growth\n1,2.0\n\n").unwrap();
    assert_eq!(csv_data_rows(&path).unwrap(), 1);
}

fn write_repo_fixture(root: &Path) {
    fs::create_dir_all(root.join("Dendrometer_Data")).unwrap();
    fs::create_dir_all(root.join("TMS_Data")).unwrap();
    fs::write(root.join("Dendrometer_Data").join(DENDRO_FILE_NAME), DENDRO_CONTENT).unwrap();
    fs::write(root.join("TMS_Data").join(TMS_FILE_NAME), TMS_CONTENT).unwrap();
    fs::write(
        root.join("JOINED.DENDROMETER.csv"),
        "sensor_id,X,Y,Common_Name\n92201234,-77.11,38.93,White Oak\n",
    )
    .unwrap();
    fs::write(
        root.join("JOINED.TMS.csv"),
        "sensor_id,X,Y,Common_Name\n94123456,-77.12,38.94,Red Maple\n",
    )
    .unwrap();
    fs::write(root.join("Dendrometer_Start_DBH.csv"), "ID,start_DBH\n92201234,30.0\n").unwrap();
}

#[test]
fn build_all_writes_every_product() {
    let root = tempfile::tempdir().unwrap();
    write_repo_fixture(root.path());

    let report = build_all(root.path(), &Settings::default()).unwrap();

    assert_eq!(report.dendro_parsed, 1);
    assert_eq!(report.tms_parsed, 1);
    assert_eq!(report.outputs.len(), 7);
    for path in &report.outputs {
        assert!(path.exists(), "missing output {}", path.display());
        assert!(csv_data_rows(path).unwrap() > 0, "empty output {}", path.display());
    }

    let merged_dbh = fs::read_to_string(root.path().join(DBH_MERGED_FILE)).unwrap();
    assert!(merged_dbh.contains("dbh_diff"));
    assert!(merged_dbh.contains("White Oak"));

    let with_images = fs::read_to_string(root.path().join(DENDRO_IMAGES_FILE)).unwrap();
    assert!(with_images.contains("Images/92201234/1.jpeg"));
}

#[test]
fn rebuilding_unchanged_folders_is_deterministic() {
    let root = tempfile::tempdir().unwrap();
    write_repo_fixture(root.path());

    let first = build_all(root.path(), &Settings::default()).unwrap();
    let snapshots: Vec<(String, Vec<u8>)> = first
        .outputs
        .iter()
        .map(|path| (path.display().to_string(), fs::read(path).unwrap()))
        .collect();

    let second = build_all(root.path(), &Settings::default()).unwrap();
    assert_eq!(first.outputs, second.outputs);
    for (name, bytes) in snapshots {
        assert_eq!(fs::read(&name).unwrap(), bytes, "output {name} changed across runs");
    }
}
