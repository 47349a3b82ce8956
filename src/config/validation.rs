// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Configuration validation.
//!
//! Checks run in order and every failure is collected, so a config with
//! several mistakes reports all of them at once:
//!
//! 1. **Worker pool**: `worker_threads` is between 1 and `MAX_WORKER_THREADS`
//! 2. **Default axis orders**: each entry parses as axis keys, no two entries share a rank
//! 3. **Forced axis orders**: each entry parses and contains both `x` and `y`

use std::collections::HashSet;

use crate::config::consts::MAX_WORKER_THREADS;
use crate::config::EngineConfig;
use crate::errors::ConfigError;
use crate::metadata::AxisTags;

/// Validate `cfg`, returning every problem found.
pub fn validate_config(cfg: &EngineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let workers = cfg.get_worker_threads();
    if workers == 0 || workers > MAX_WORKER_THREADS {
        errors.push(ConfigError::InvalidValue {
            field: "worker_threads".to_string(),
            reason: format!("must be between 1 and {}, got {}", MAX_WORKER_THREADS, workers),
        });
    }

    let mut ranks = HashSet::new();
    for order in &cfg.default_axis_orders.0 {
        match AxisTags::from_keys(order) {
            Ok(tags) => {
                if !ranks.insert(tags.len()) {
                    errors.push(ConfigError::InvalidValue {
                        field: "default_axis_orders".to_string(),
                        reason: format!("more than one order for rank {}", tags.len()),
                    });
                }
            }
            Err(e) => errors.push(ConfigError::InvalidValue {
                field: "default_axis_orders".to_string(),
                reason: format!("'{}': {}", order, e),
            }),
        }
    }

    for order in cfg.data_selection.get_force_axis_order() {
        match AxisTags::from_keys(&order) {
            Ok(tags) if !(tags.contains('x') && tags.contains('y')) => {
                errors.push(ConfigError::InvalidValue {
                    field: "data_selection.force_axis_order".to_string(),
                    reason: format!("'{}' must contain both x and y", order),
                });
            }
            Ok(_) => {}
            Err(e) => errors.push(ConfigError::InvalidValue {
                field: "data_selection.force_axis_order".to_string(),
                reason: format!("'{}': {}", order, e),
            }),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataSelectionConfig;
    use crate::metadata::DefaultAxisOrders;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&EngineConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let cfg = EngineConfig {
            worker_threads: Some(0),
            default_axis_orders: DefaultAxisOrders(vec!["yx".into(), "xy".into(), "zz".into()]),
            data_selection: DataSelectionConfig {
                force_axis_order: Some(vec!["zyx".into(), "tzc".into()]),
            },
            ..Default::default()
        };
        let errors = validate_config(&cfg).unwrap_err();
        // workers, duplicate rank 2, duplicate key in "zz", "tzc" lacks x/y
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn forced_orders_need_x_and_y() {
        let cfg = EngineConfig {
            data_selection: DataSelectionConfig {
                force_axis_order: Some(vec!["zxc".into()]),
            },
            ..Default::default()
        };
        let errors = validate_config(&cfg).unwrap_err();
        assert!(errors[0].to_string().contains("must contain both x and y"));
    }
}
