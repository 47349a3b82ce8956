// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_FORCE_AXIS_ORDER, DEFAULT_LOG_FILTER, DEFAULT_THREAD_NAME, DEFAULT_WORKER_THREADS,
};
use crate::errors::ConfigError;
use crate::metadata::DefaultAxisOrders;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Engine-wide configuration for a [`Graph`](crate::graph::Graph).
///
/// Every field is optional in the file; unset values fall back to the
/// constants in [`consts`](crate::config::consts).
///
/// # Fields
/// * `worker_threads` - Size of the blocking pool that runs `execute` calls
/// * `thread_name` - Name prefix of the worker threads
/// * `log_filter` - `EnvFilter` directive used when `RUST_LOG` is not set
/// * `default_axis_orders` - Axis order assumed for untagged arrays, by rank
/// * `data_selection` - Options of the data selection operators
///
/// # Example
/// ```yaml
/// worker_threads: 8
/// thread_name: voxelflow-worker
/// log_filter: the_voxelflow=debug
/// default_axis_orders: [x, yx, zyx, zyxc, tzyxc]
/// data_selection:
///   force_axis_order: [tczyx]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub worker_threads: Option<usize>,
    #[serde(default)]
    pub thread_name: Option<String>,
    #[serde(default)]
    pub log_filter: Option<String>,
    #[serde(default)]
    pub default_axis_orders: DefaultAxisOrders,
    #[serde(default)]
    pub data_selection: DataSelectionConfig,
}

impl EngineConfig {
    /// Worker pool size, using the built-in default if not configured.
    pub fn get_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or(DEFAULT_WORKER_THREADS)
    }

    pub fn get_thread_name(&self) -> &str {
        self.thread_name.as_deref().unwrap_or(DEFAULT_THREAD_NAME)
    }

    pub fn get_log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

/// Options of the data selection operators.
///
/// `force_axis_order` lists the axis orders a dataset may be presented in.
/// The shortest order covering every non-singleton axis of the data wins.
/// An empty list keeps the provider's own order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSelectionConfig {
    #[serde(default)]
    pub force_axis_order: Option<Vec<String>>,
}

impl DataSelectionConfig {
    /// Candidate orders, using the built-in default if not configured.
    pub fn get_force_axis_order(&self) -> Vec<String> {
        match &self.force_axis_order {
            Some(orders) => orders.clone(),
            None => DEFAULT_FORCE_AXIS_ORDER
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Load a config from a YAML (`.yaml`, `.yml`) or TOML (`.toml`) file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: display.clone(),
        reason: e.to_string(),
    })?;

    match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: display,
            reason: e.to_string(),
        }),
        "toml" => toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: display,
            reason: e.to_string(),
        }),
        other => Err(ConfigError::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

/// Load a config and validate it.
///
/// Returns the first validation error; all of them are logged.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let cfg = load_config(path)?;

    if let Err(errors) = crate::config::validate_config(&cfg) {
        for error in &errors {
            tracing::error!(error = %error, "configuration validation failed");
        }
        if let Some(first) = errors.into_iter().next() {
            return Err(first);
        }
    }

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parse_basic_yaml_config() {
        let yaml = r#"
worker_threads: 2
default_axis_orders: [x, yx, zyx]
data_selection:
  force_axis_order: [tczyx, zyxc]
"#;
        let cfg: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.get_worker_threads(), 2);
        assert_eq!(cfg.default_axis_orders.order_for_rank(3), Some("zyx"));
        assert_eq!(cfg.default_axis_orders.order_for_rank(4), None);
        assert_eq!(
            cfg.data_selection.get_force_axis_order(),
            vec!["tczyx".to_string(), "zyxc".to_string()]
        );
    }

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: EngineConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.get_worker_threads(), DEFAULT_WORKER_THREADS);
        assert_eq!(cfg.get_thread_name(), DEFAULT_THREAD_NAME);
        assert_eq!(cfg.get_log_filter(), DEFAULT_LOG_FILTER);
        assert_eq!(cfg.default_axis_orders, DefaultAxisOrders::default());
        assert_eq!(
            cfg.data_selection.get_force_axis_order(),
            vec!["tczyx".to_string()]
        );
    }

    #[test]
    fn loads_toml_by_extension() {
        let file = write_temp(
            ".toml",
            r#"
worker_threads = 3
thread_name = "pool"

[data_selection]
force_axis_order = []
"#,
        );
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.get_worker_threads(), 3);
        assert_eq!(cfg.get_thread_name(), "pool");
        assert!(cfg.data_selection.get_force_axis_order().is_empty());
    }

    #[test]
    fn test_load_and_validate_valid_config() {
        let file = write_temp(".yaml", "worker_threads: 4\nlog_filter: debug\n");
        let cfg = load_and_validate_config(file.path()).unwrap();
        assert_eq!(cfg.get_log_filter(), "debug");
    }

    #[test]
    fn test_load_and_validate_rejects_zero_workers() {
        let file = write_temp(".yml", "worker_threads: 0\n");
        let err = load_and_validate_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "worker_threads"));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = write_temp(".json", "{}");
        assert_eq!(
            load_config(file.path()),
            Err(ConfigError::UnsupportedFormat {
                extension: "json".to_string()
            })
        );
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_config("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let file = write_temp(".yaml", "worker_threads: [not, a, number]\n");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
