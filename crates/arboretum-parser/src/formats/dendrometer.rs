use polars::prelude::DataFrame;

use crate::errors::ParserError;
use crate::formats::common::{build_metric_dataframe, read_records};
use crate::model::SensorKind;
use crate::registry::SensorFileParser;

const PARSER_NAME: &str = "tomst_dendrometer";

// Field 3 carries the band air temperature, field 6 the cumulative radial
// displacement in micrometers. Fields 4 and 5 are unused band channels.
const METRICS: &[(&str, usize)] = &[("avg_air_temp", 3), ("avg_growth", 6)];

pub struct DendrometerParser;

impl SensorFileParser for DendrometerParser {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn kind(&self) -> SensorKind {
        SensorKind::Dendrometer
    }

    fn parse(&self, content: &str) -> Result<DataFrame, ParserError> {
        let records = read_records(PARSER_NAME, content)?;
        build_metric_dataframe(PARSER_NAME, &records, METRICS)
    }
}
