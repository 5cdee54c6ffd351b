use polars::prelude::DataFrame;

use crate::errors::ParserError;
use crate::formats::common::{build_metric_dataframe, read_records};
use crate::model::SensorKind;
use crate::registry::SensorFileParser;

const PARSER_NAME: &str = "tomst_tms";

// T1 sits in the soil, T2 at ground level, T3 above ground. Field 6 is the
// raw moisture count, uncalibrated.
const METRICS: &[(&str, usize)] = &[
    ("avg_t1", 3),
    ("avg_t2", 4),
    ("avg_t3", 5),
    ("avg_moist", 6),
];

pub struct TmsParser;

impl SensorFileParser for TmsParser {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn kind(&self) -> SensorKind {
        SensorKind::Tms
    }

    fn parse(&self, content: &str) -> Result<DataFrame, ParserError> {
        let records = read_records(PARSER_NAME, content)?;
        build_metric_dataframe(PARSER_NAME, &records, METRICS)
    }
}
