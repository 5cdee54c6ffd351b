use std::fmt;

use chrono::NaiveDate;
use polars::prelude::DataFrame;

/// Canonical name of the timestamp column in every parsed dataframe.
pub const TIMESTAMP_COLUMN: &str = "timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Dendrometer,
    Tms,
}

impl SensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Dendrometer => "dendrometer",
            SensorKind::Tms => "tms",
        }
    }

    /// Metric columns a parsed file of this kind carries, in column order.
    pub fn metric_columns(&self) -> &'static [&'static str] {
        match self {
            SensorKind::Dendrometer => &["avg_air_temp", "avg_growth"],
            SensorKind::Tms => &["avg_t1", "avg_t2", "avg_t3", "avg_moist"],
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SensorKind {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dendrometer" | "dendro" => Ok(SensorKind::Dendrometer),
            "tms" => Ok(SensorKind::Tms),
            other => Err(format!("unknown sensor kind '{other}'")),
        }
    }
}

/// Parsed pieces of an export file name: `data_<id>_<yyyy>_<mm>_<dd>_<seq>.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFileName {
    pub sensor_id: i64,
    pub exported_on: NaiveDate,
    pub sequence: u32,
}

impl TryFrom<&str> for SensorFileName {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let stem = value
            .strip_prefix("data_")
            .ok_or_else(|| "missing 'data_' prefix".to_string())?;
        let stem = stem
            .strip_suffix(".csv")
            .ok_or_else(|| "missing '.csv' suffix".to_string())?;

        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() != 5 {
            return Err(format!(
                "expected <id>_<yyyy>_<mm>_<dd>_<seq>, found {} segments",
                parts.len()
            ));
        }

        let sensor_id = parse_digits::<i64>(parts[0], "sensor id")?;
        if parts[1].len() != 4 || parts[2].len() != 2 || parts[3].len() != 2 {
            return Err("date segments must be yyyy_mm_dd".to_string());
        }
        let year = parse_digits::<i32>(parts[1], "year")?;
        let month = parse_digits::<u32>(parts[2], "month")?;
        let day = parse_digits::<u32>(parts[3], "day")?;
        let exported_on = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| format!("invalid date {year:04}-{month:02}-{day:02}"))?;
        let sequence = parse_digits::<u32>(parts[4], "sequence")?;

        Ok(SensorFileName {
            sensor_id,
            exported_on,
            sequence,
        })
    }
}

fn parse_digits<T: std::str::FromStr>(value: &str, label: &str) -> Result<T, String> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("{label} segment '{value}' is not numeric"));
    }
    value
        .parse::<T>()
        .map_err(|_| format!("{label} segment '{value}' is out of range"))
}

/// One export file reduced to a dataframe: a timestamp column plus the
/// kind's metric columns.
#[derive(Debug, Clone)]
pub struct ParsedSensorFile {
    pub sensor_id: i64,
    pub kind: SensorKind,
    pub df: DataFrame,
}
