use chrono::NaiveDateTime;
use polars::prelude::*;

use crate::errors::ParserError;
use crate::model::TIMESTAMP_COLUMN;

// Lolly exports are semicolon-separated with no header row. Field 0 is a
// running index, field 1 the local timestamp, field 2 a UTC offset; the
// remaining fields vary by instrument.
const TIMESTAMP_FIELD: usize = 1;

pub(crate) fn read_records(
    parser: &'static str,
    content: &str,
) -> Result<Vec<csv::StringRecord>, ParserError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| ParserError::Csv { parser, source })?;
        // Trailing semicolons produce a single empty field; skip blank lines.
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        records.push(record);
    }
    Ok(records)
}

/// Build a `timestamp` + metric dataframe from raw records, pulling each
/// metric out of its fixed field index.
pub(crate) fn build_metric_dataframe(
    parser: &'static str,
    records: &[csv::StringRecord],
    metrics: &[(&'static str, usize)],
) -> Result<DataFrame, ParserError> {
    if records.is_empty() {
        return Err(ParserError::EmptyData { parser });
    }

    let max_index = metrics
        .iter()
        .map(|(_, index)| *index)
        .max()
        .expect("metric table is never empty");

    let first_width = records[0].len();
    if first_width <= max_index {
        return Err(ParserError::FormatMismatch {
            parser,
            reason: format!("expected at least {} fields, found {first_width}", max_index + 1),
        });
    }

    let mut timestamps: Vec<i64> = Vec::with_capacity(records.len());
    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(records.len()); metrics.len()];

    for (line_index, record) in records.iter().enumerate() {
        if record.len() <= max_index {
            return Err(ParserError::DataRow {
                parser,
                line_index,
                message: format!(
                    "expected at least {} fields, found {}",
                    max_index + 1,
                    record.len()
                ),
            });
        }

        let raw_ts = record.get(TIMESTAMP_FIELD).unwrap_or_default();
        timestamps.push(parse_timestamp(parser, raw_ts, line_index)?);

        for (slot, (name, index)) in metrics.iter().enumerate() {
            let raw = record.get(*index).unwrap_or_default();
            columns[slot].push(parse_optional_f64(parser, raw, line_index, name)?);
        }
    }

    let ts_series = Series::new(TIMESTAMP_COLUMN.into(), timestamps)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
        .map_err(|err| ParserError::Validation {
            parser,
            message: format!("failed to cast timestamp column: {err}"),
        })?;

    let mut cols: Vec<Column> = Vec::with_capacity(metrics.len() + 1);
    cols.push(ts_series.into());
    for ((name, _), values) in metrics.iter().zip(columns) {
        cols.push(Series::new((*name).into(), values).into());
    }

    DataFrame::new(cols).map_err(|err| ParserError::Validation {
        parser,
        message: format!("failed to build dataframe: {err}"),
    })
}

pub(crate) fn parse_timestamp(
    parser: &'static str,
    value: &str,
    line_index: usize,
) -> Result<i64, ParserError> {
    static FORMATS: &[&str] = &["%Y.%m.%d %H:%M:%S", "%Y.%m.%d %H:%M"];
    let trimmed = value.trim();
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt.and_utc().timestamp_micros());
        }
    }
    Err(ParserError::DataRow {
        parser,
        line_index,
        message: format!("invalid timestamp '{trimmed}'"),
    })
}

pub(crate) fn parse_optional_f64(
    parser: &'static str,
    value: &str,
    line_index: usize,
    column: &str,
) -> Result<Option<f64>, ParserError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|err| ParserError::DataRow {
            parser,
            line_index,
            message: format!("failed to parse column '{column}' as float: {err}"),
        })
}
