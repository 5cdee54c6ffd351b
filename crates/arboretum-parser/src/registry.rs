use polars::prelude::DataFrame;

use crate::errors::ParserError;
use crate::formats::{DendrometerParser, TmsParser};
use crate::model::{ParsedSensorFile, SensorFileName, SensorKind};

pub trait SensorFileParser {
    fn name(&self) -> &'static str;
    fn kind(&self) -> SensorKind;
    fn parse(&self, content: &str) -> Result<DataFrame, ParserError>;
}

fn parser_for(kind: SensorKind) -> &'static dyn SensorFileParser {
    match kind {
        SensorKind::Dendrometer => &DendrometerParser,
        SensorKind::Tms => &TmsParser,
    }
}

/// Parse one export file of a known kind. The sensor id comes from the file
/// name, the readings from the body.
pub fn parse_sensor_file(
    kind: SensorKind,
    file_name: &str,
    content: &str,
) -> Result<ParsedSensorFile, ParserError> {
    let meta = SensorFileName::try_from(file_name).map_err(|reason| ParserError::InvalidFileName {
        name: file_name.to_string(),
        reason,
    })?;

    let df = parser_for(kind).parse(content)?;

    Ok(ParsedSensorFile {
        sensor_id: meta.sensor_id,
        kind,
        df,
    })
}
