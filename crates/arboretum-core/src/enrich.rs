//! Adds a per-sensor `image_url` column to the metadata table so the
//! dashboard popups can show each tree's photo.

use polars::prelude::*;

use crate::error::{PipelineError, Result};

pub const IMAGE_URL_COLUMN: &str = "image_url";
const SENSOR_ID_PLACEHOLDER: &str = "{sensor_id}";

pub fn add_image_urls(metadata: &DataFrame, url_template: &str) -> Result<DataFrame> {
    if !url_template.contains(SENSOR_ID_PLACEHOLDER) {
        return Err(PipelineError::Validation(format!(
            "image URL template must contain '{SENSOR_ID_PLACEHOLDER}', got '{url_template}'"
        )));
    }

    let ids = metadata.column("sensor_id")?.cast(&DataType::Int64)?;
    let ids = ids.i64()?;

    let urls: Vec<Option<String>> = ids
        .iter()
        .map(|id| {
            id.map(|id| url_template.replace(SENSOR_ID_PLACEHOLDER, &id.to_string()))
        })
        .collect();

    let mut out = metadata.clone();
    out.with_column(Series::new(IMAGE_URL_COLUMN.into(), urls))?;
    Ok(out)
}
