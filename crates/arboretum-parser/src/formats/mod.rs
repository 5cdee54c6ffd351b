mod common;
mod dendrometer;
mod tms;

pub use dendrometer::DendrometerParser;
pub use tms::TmsParser;
