//! Rebuilds the derived CSV products the hosted feature layers are
//! published from: per-sensor overall averages, per-sensor daily averages,
//! and DBH growth differences, each joined against the sensor metadata.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{info, warn};

use arboretum_parser::{parse_sensor_file, ParsedSensorFile, SensorKind, TIMESTAMP_COLUMN};

use crate::config::Settings;
use crate::enrich;
use crate::error::{PipelineError, Result};
use crate::targets::TargetKey;

pub const DBH_RAW_FILE: &str = "Dendrometer_DBH_Raw.csv";
pub const DBH_MERGED_FILE: &str = "Dendrometer_DBH_Difference.csv";
pub const DENDRO_IMAGES_FILE: &str = "JOINED.DENDROMETER_with_images.csv";

const SENSOR_ID_COLUMN: &str = "sensor_id";
const DATE_COLUMN: &str = "date";

/// Result of scanning one data folder.
#[derive(Debug)]
pub struct FolderScan {
    pub scanned: usize,
    pub skipped: usize,
    pub parsed: Vec<ParsedSensorFile>,
}

/// Parse every `data_*.csv` in a folder. Files that do not match the vendor
/// naming pattern or whose bodies fail to parse are skipped with a warning.
/// A folder yielding zero parsed files is a fatal error.
pub fn scan_folder(dir: &Path, kind: SensorKind) -> Result<FolderScan> {
    let pattern = dir.join("data_*.csv");
    let pattern_str = pattern
        .to_str()
        .ok_or_else(|| PipelineError::Validation(format!("non-UTF-8 path {}", dir.display())))?;

    let mut scanned = 0;
    let mut skipped = 0;
    let mut parsed = Vec::new();

    for entry in glob::glob(pattern_str)? {
        let path = match entry {
            Ok(path) => path,
            Err(err) => {
                warn!("could not read path from glob pattern: {err}");
                skipped += 1;
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        scanned += 1;

        let file_name = match path.file_name().and_then(|name| name.to_str()) {
            Some(name) => name.to_string(),
            None => {
                warn!("skipping non-UTF-8 file name under {}", dir.display());
                skipped += 1;
                continue;
            }
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                warn!("skipping {file_name}: failed to read: {err}");
                skipped += 1;
                continue;
            }
        };

        match parse_sensor_file(kind, &file_name, &content) {
            Ok(file) => parsed.push(file),
            Err(err) => {
                warn!("skipping {file_name}: {err}");
                skipped += 1;
            }
        }
    }

    if parsed.is_empty() {
        return Err(PipelineError::Validation(format!(
            "no parseable {kind} sensor files in {} ({scanned} scanned, {skipped} skipped)",
            dir.display()
        )));
    }

    info!(
        "scanned {} for {kind}: {scanned} files, {} parsed, {skipped} skipped",
        dir.display(),
        parsed.len()
    );

    Ok(FolderScan {
        scanned,
        skipped,
        parsed,
    })
}

fn tagged_lazyframes(files: &[ParsedSensorFile]) -> Vec<LazyFrame> {
    files
        .iter()
        .map(|file| {
            file.df
                .clone()
                .lazy()
                .with_column(
                    lit(Scalar::new(
                        DataType::Int64,
                        AnyValue::Int64(file.sensor_id),
                    ))
                    .alias(SENSOR_ID_COLUMN),
                )
        })
        .collect()
}

fn metric_means(kind: SensorKind) -> Vec<Expr> {
    kind.metric_columns()
        .iter()
        .map(|name| col(*name).mean())
        .collect()
}

/// Mean of each metric per sensor over the whole record.
pub fn overall_summary(files: &[ParsedSensorFile], kind: SensorKind) -> Result<DataFrame> {
    let lazyframes = tagged_lazyframes(files);
    let unified = concat(&lazyframes, UnionArgs::default())?;

    let df = unified
        .group_by([col(SENSOR_ID_COLUMN)])
        .agg(metric_means(kind))
        .sort([SENSOR_ID_COLUMN], Default::default())
        .collect()?;

    Ok(df)
}

/// Mean of each metric per sensor per calendar day.
pub fn daily_summary(files: &[ParsedSensorFile], kind: SensorKind) -> Result<DataFrame> {
    let lazyframes = tagged_lazyframes(files);
    let unified = concat(&lazyframes, UnionArgs::default())?;

    let df = unified
        .with_column(col(TIMESTAMP_COLUMN).dt().date().alias(DATE_COLUMN))
        .group_by([col(SENSOR_ID_COLUMN), col(DATE_COLUMN)])
        .agg(metric_means(kind))
        .sort([SENSOR_ID_COLUMN, DATE_COLUMN], Default::default())
        .collect()?;

    Ok(df)
}

/// Read a metadata CSV (header row, comma-separated).
pub fn load_metadata(path: &Path) -> Result<DataFrame> {
    let bytes = std::fs::read(path)?;
    let cursor = Cursor::new(bytes);
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(cursor)
        .finish()?;
    Ok(df)
}

/// Left-join a per-sensor summary onto the metadata table.
pub fn merge_with_metadata(metadata: &DataFrame, summary: &DataFrame) -> Result<DataFrame> {
    left_join_on_sensor(metadata, summary)
}

/// The metadata columns carried into the daily products.
pub fn metadata_coordinates(metadata: &DataFrame) -> Result<DataFrame> {
    Ok(metadata.select([SENSOR_ID_COLUMN, "X", "Y", "Common_Name"])?)
}

fn left_join_on_sensor(left: &DataFrame, right: &DataFrame) -> Result<DataFrame> {
    let df = left
        .clone()
        .lazy()
        .with_column(col(SENSOR_ID_COLUMN).cast(DataType::Int64))
        .join(
            right
                .clone()
                .lazy()
                .with_column(col(SENSOR_ID_COLUMN).cast(DataType::Int64)),
            [col(SENSOR_ID_COLUMN)],
            [col(SENSOR_ID_COLUMN)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;
    Ok(df)
}

/// DBH difference per dendrometer: the band reports cumulative radial
/// displacement in micrometers, so the diameter change is twice the
/// displacement, converted to the start table's centimeter unit.
pub fn dbh_difference(files: &[ParsedSensorFile], start_dbh: &DataFrame) -> Result<DataFrame> {
    for required in ["ID", "start_DBH"] {
        if start_dbh.column(required).is_err() {
            return Err(PipelineError::Validation(format!(
                "start DBH table must have columns ID and start_DBH, missing '{required}'"
            )));
        }
    }

    let ids = start_dbh.column("ID")?.cast(&DataType::Int64)?;
    let ids = ids.i64()?;
    let starts = start_dbh.column("start_DBH")?.cast(&DataType::Float64)?;
    let starts = starts.f64()?;

    let mut start_by_sensor: BTreeMap<i64, f64> = BTreeMap::new();
    for (id, start) in ids.iter().zip(starts.iter()) {
        if let (Some(id), Some(start)) = (id, start) {
            start_by_sensor.insert(id, start);
        }
    }

    // Last reading wins when a sensor appears in more than one export file.
    let mut last_growth: BTreeMap<i64, f64> = BTreeMap::new();
    for file in files {
        let growth = file.df.column("avg_growth")?.f64()?;
        match growth.get(growth.len().saturating_sub(1)) {
            Some(value) => {
                last_growth.insert(file.sensor_id, value);
            }
            None => warn!(
                "sensor {}: last growth reading is missing, excluded from DBH table",
                file.sensor_id
            ),
        }
    }

    let mut sensor_ids = Vec::new();
    let mut start_vals = Vec::new();
    let mut end_vals = Vec::new();
    let mut diff_vals = Vec::new();

    for (sensor_id, growth_um) in &last_growth {
        let Some(start) = start_by_sensor.get(sensor_id) else {
            warn!("sensor {sensor_id} has no start DBH entry, excluded from DBH table");
            continue;
        };
        let end = start + (growth_um / 10_000.0) * 2.0;
        sensor_ids.push(*sensor_id);
        start_vals.push(round2(*start));
        end_vals.push(round2(end));
        diff_vals.push(round2(end - start));
    }

    let df = DataFrame::new(vec![
        Series::new(SENSOR_ID_COLUMN.into(), sensor_ids).into(),
        Series::new("start_DBH".into(), start_vals).into(),
        Series::new("end_DBH".into(), end_vals).into(),
        Series::new("dbh_diff".into(), diff_vals).into(),
    ])?;

    Ok(df)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn write_csv(df: &DataFrame, path: &Path) -> Result<()> {
    let mut clone = df.clone();
    let file = File::create(path)?;
    CsvWriter::new(file).finish(&mut clone)?;
    Ok(())
}

/// Count data rows (excluding the header) of a derived CSV. Publishing an
/// empty table would blank the hosted layer, so callers treat zero as fatal.
pub fn csv_data_rows(path: &Path) -> Result<usize> {
    let raw = std::fs::read_to_string(path)?;
    let rows = raw
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .count();
    Ok(rows)
}

#[derive(Debug)]
pub struct SummaryReport {
    pub dendro_parsed: usize,
    pub dendro_skipped: usize,
    pub tms_parsed: usize,
    pub tms_skipped: usize,
    pub outputs: Vec<PathBuf>,
}

/// Rebuild every derived CSV from the current folder contents.
pub fn build_all(root: &Path, settings: &Settings) -> Result<SummaryReport> {
    let dendro = scan_folder(&root.join(&settings.data.dendrometer_dir), SensorKind::Dendrometer)?;
    let tms = scan_folder(&root.join(&settings.data.tms_dir), SensorKind::Tms)?;

    let dendro_meta = load_metadata(&root.join(&settings.metadata.dendrometer))?;
    let tms_meta = load_metadata(&root.join(&settings.metadata.tms))?;
    let start_dbh = load_metadata(&root.join(&settings.metadata.start_dbh))?;

    let mut outputs = Vec::new();
    let mut emit = |df: &DataFrame, name: &str| -> Result<()> {
        let path = root.join(name);
        write_csv(df, &path)?;
        info!("wrote {} ({} rows)", path.display(), df.height());
        outputs.push(path);
        Ok(())
    };

    let dendro_overall = overall_summary(&dendro.parsed, SensorKind::Dendrometer)?;
    emit(
        &merge_with_metadata(&dendro_meta, &dendro_overall)?,
        TargetKey::DendroAverage.csv_file(),
    )?;

    let dendro_daily = daily_summary(&dendro.parsed, SensorKind::Dendrometer)?;
    emit(
        &left_join_on_sensor(&dendro_daily, &metadata_coordinates(&dendro_meta)?)?,
        TargetKey::DendroDaily.csv_file(),
    )?;

    let tms_overall = overall_summary(&tms.parsed, SensorKind::Tms)?;
    emit(
        &merge_with_metadata(&tms_meta, &tms_overall)?,
        TargetKey::TmsAverage.csv_file(),
    )?;

    let tms_daily = daily_summary(&tms.parsed, SensorKind::Tms)?;
    emit(
        &left_join_on_sensor(&tms_daily, &metadata_coordinates(&tms_meta)?)?,
        TargetKey::TmsDaily.csv_file(),
    )?;

    let dbh_raw = dbh_difference(&dendro.parsed, &start_dbh)?;
    emit(&dbh_raw, DBH_RAW_FILE)?;
    emit(&merge_with_metadata(&dendro_meta, &dbh_raw)?, DBH_MERGED_FILE)?;

    let with_images = enrich::add_image_urls(&dendro_meta, &settings.images.url_template)?;
    emit(&with_images, DENDRO_IMAGES_FILE)?;

    Ok(SummaryReport {
        dendro_parsed: dendro.parsed.len(),
        dendro_skipped: dendro.skipped,
        tms_parsed: tms.parsed.len(),
        tms_skipped: tms.skipped,
        outputs,
    })
}
