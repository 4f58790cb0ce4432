use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};

/// Configuration file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "remote-read-adapter.yaml";

/// Prefix for environment overrides, nested keys separated by `__`
pub const ENV_PREFIX: &str = "DRA_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),
    #[error("Mapping file {path} does not exist")]
    MappingFile { path: PathBuf },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the remote-read endpoint listens on
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: String::from("0.0.0.0:9201"),
        }
    }
}

/// Connection settings for the Datadog metrics query API
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatadogConfig {
    /// Datadog site, e.g. `datadoghq.com` or `datadoghq.eu`
    pub site: String,
    pub api_key: Option<String>,
    pub app_key: Option<String>,
    /// Timeout applied to every backend query
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for DatadogConfig {
    fn default() -> Self {
        Self {
            site: String::from("datadoghq.com"),
            api_key: None,
            app_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DatadogConfig {
    /// Base URL of the metrics API for the configured site
    pub fn api_base_url(&self) -> String {
        format!("https://api.{}", self.site.trim_start_matches("api."))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct MappingLocation {
    /// Path to an extra YAML file whose `mappings` extend the built-in table
    pub location: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CustomConfig {
    pub mapping: MappingLocation,
}

/// How backend series are grouped into output series
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeriesIdentity {
    /// Series sharing a display name are merged, whatever their tags
    #[default]
    DisplayName,
    /// Series are keyed by display name plus tag set, tags become labels
    TagSet,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Configuration {
    /// Canonical metric name to backend metric name
    pub mappings: HashMap<String, String>,
    /// Label names never forwarded to the backend as filters
    pub ignore_labels: Vec<String>,
    /// Labels attached to every returned series
    pub add_labels: BTreeMap<String, String>,
    pub custom: CustomConfig,
    pub server: ServerConfig,
    pub datadog: DatadogConfig,
    /// Maximum backend queries in flight for one read request
    pub query_concurrency: usize,
    pub series_identity: SeriesIdentity,
}

impl Default for Configuration {
    fn default() -> Self {
        let mappings = [
            (
                "kubernetes_state_container_memory_requested",
                "kubernetes_state.container.memory_requested",
            ),
            (
                "kube_pod_container_resource_requests",
                "kubernetes_state.container.memory_requested",
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            mappings,
            ignore_labels: vec!["resource".to_string(), "unit".to_string()],
            add_labels: BTreeMap::from([("clustername".to_string(), "thebest".to_string())]),
            custom: CustomConfig::default(),
            server: ServerConfig::default(),
            datadog: DatadogConfig::default(),
            query_concurrency: 4,
            series_identity: SeriesIdentity::default(),
        }
    }
}

impl Configuration {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(DEFAULT_CONFIG_FILE)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment(path.as_ref()))
    }

    /// Layered providers: defaults, YAML file, `DRA_` env, well-known env names
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(well_known_env())
    }

    /// Extracts the configuration and overlays the custom mapping file, if any
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Configuration = figment.extract().map_err(Box::new)?;

        let Some(location) = config.custom.mapping.location.clone() else {
            return Ok(config);
        };

        if !location.is_file() {
            return Err(ConfigError::MappingFile { path: location });
        }

        log::info!("Merging metric mappings from {}", location.display());
        let config = figment
            .merge(Yaml::file(&location))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }
}

/// Environment variable names kept from the original deployment conventions
fn well_known_env() -> Env {
    Env::raw().filter_map(|key| {
        match key.as_str().to_ascii_uppercase().as_str() {
            "DRA_CUSTOM_MAPPING_LOCATION" => Some("custom.mapping.location".into()),
            "DD_API_KEY" => Some("datadog.api_key".into()),
            "DD_APP_KEY" => Some("datadog.app_key".into()),
            "DD_SITE" => Some("datadog.site".into()),
            _ => None,
        }
    })
}
