//! Configuration: secrets and item identifiers come from the environment,
//! paths and templates from an optional `arboretum.toml` next to the data.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::targets::TargetKey;

pub const ENV_ORG_URL: &str = "AGO_ORG_URL";
pub const ENV_USERNAME: &str = "AGO_USERNAME";
pub const ENV_PASSWORD: &str = "AGO_PASSWORD";

/// Default settings file name, looked up relative to the repository root.
pub const SETTINGS_FILE: &str = "arboretum.toml";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub data: DataSettings,
    pub metadata: MetadataSettings,
    pub images: ImageSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataSettings {
    pub dendrometer_dir: String,
    pub tms_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            dendrometer_dir: "Dendrometer_Data".to_string(),
            tms_dir: "TMS_Data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataSettings {
    pub dendrometer: String,
    pub tms: String,
    pub start_dbh: String,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            dendrometer: "JOINED.DENDROMETER.csv".to_string(),
            tms: "JOINED.TMS.csv".to_string(),
            start_dbh: "Dendrometer_Start_DBH.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageSettings {
    /// Per-sensor photo URL; `{sensor_id}` is substituted.
    pub url_template: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            url_template: "https://arboretum-dashboard.github.io/arboretum/Images/{sensor_id}/1.jpeg"
                .to_string(),
        }
    }
}

impl Settings {
    /// Load `arboretum.toml` from the repository root, falling back to the
    /// defaults above when the file is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(SETTINGS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub org_url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ItemIds {
    pub dendro_average: String,
    pub dendro_daily: String,
    pub tms_average: String,
    pub tms_daily: String,
}

impl ItemIds {
    pub fn for_target(&self, key: TargetKey) -> &str {
        match key {
            TargetKey::DendroAverage => &self.dendro_average,
            TargetKey::DendroDaily => &self.dendro_daily,
            TargetKey::TmsAverage => &self.tms_average,
            TargetKey::TmsDaily => &self.tms_daily,
        }
    }
}

/// Everything the publisher needs from the environment. Construction fails
/// before any network call, naming every variable that is missing or blank.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub credentials: Credentials,
    pub items: ItemIds,
}

impl PublishConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut required: Vec<&'static str> = vec![ENV_ORG_URL, ENV_USERNAME, ENV_PASSWORD];
        required.extend(TargetKey::ALL.iter().map(|key| key.env_var()));

        let mut values: HashMap<&'static str, String> = HashMap::new();
        let mut missing: Vec<&'static str> = Vec::new();
        for key in required {
            match lookup(key) {
                Some(value) if !value.trim().is_empty() => {
                    values.insert(key, value.trim().to_string());
                }
                _ => missing.push(key),
            }
        }

        if !missing.is_empty() {
            return Err(PipelineError::Config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let mut take = |key: &'static str| values.remove(key).expect("validated above");

        Ok(Self {
            credentials: Credentials {
                org_url: take(ENV_ORG_URL),
                username: take(ENV_USERNAME),
                password: take(ENV_PASSWORD),
            },
            items: ItemIds {
                dendro_average: take(TargetKey::DendroAverage.env_var()),
                dendro_daily: take(TargetKey::DendroDaily.env_var()),
                tms_average: take(TargetKey::TmsAverage.env_var()),
                tms_daily: take(TargetKey::TmsDaily.env_var()),
            },
        })
    }
}
