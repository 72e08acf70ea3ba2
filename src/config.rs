//! Validation thresholds
//!
//! Host-tunable numbers used by the field validator. Defaults follow the
//! BS 7671 guidance the bundled tables are drawn from.
//!
//! Hosts configure them either from a JSON document ([`ValidationConfig::from_json`])
//! or from flat string options ([`ValidationConfig::from_options`]) where every
//! key is optional and falls back to its default.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use circuit_test_rules::config::ValidationConfig;
//!
//! let mut opts = HashMap::new();
//! opts.insert("ring_tolerance_ohms".to_string(), "0,1".to_string());
//!
//! let config = ValidationConfig::from_options(&opts).unwrap();
//! assert_eq!(config.ring_tolerance_ohms, 0.1);
//! assert_eq!(config.ceiling_warning_ratio, 0.8);
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::measurements::{parse_decimal, parse_test_voltage};

/// Thresholds for field and group rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Readings at or above this share of a ceiling warn (0.8 = 80%)
    pub ceiling_warning_ratio: f64,

    /// Readings below this multiple of a floor warn
    pub floor_warning_ratio: f64,

    /// Minimum insulation resistance (MΩ) per test voltage (V)
    pub insulation_minimums: BTreeMap<u32, f64>,

    /// Voltage assumed when the record has none
    pub default_test_voltage: u32,

    /// RCD disconnection time limit at 1x IΔn (ms)
    pub rcd_max_time_ms: f64,

    /// Upper limit for time-delayed (S type) RCDs (ms)
    pub rcd_s_type_max_ms: f64,

    /// Lower limit for time-delayed (S type) RCDs (ms)
    pub rcd_s_type_min_ms: f64,

    /// Allowed difference between ring legs (Ω)
    pub ring_tolerance_ohms: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            ceiling_warning_ratio: 0.8,
            floor_warning_ratio: 2.0,
            insulation_minimums: BTreeMap::from([(250, 0.5), (500, 1.0), (1000, 1.0)]),
            default_test_voltage: 500,
            rcd_max_time_ms: 300.0,
            rcd_s_type_max_ms: 500.0,
            rcd_s_type_min_ms: 130.0,
            ring_tolerance_ohms: 0.05,
        }
    }
}

impl ValidationConfig {
    /// Parse a JSON document; missing keys keep their defaults
    ///
    /// # Errors
    ///
    /// * `ConfigError::InvalidJson` - Malformed document
    /// * `ConfigError::InvalidOption` - Value outside its sensible range
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConfigError::InvalidJson(format!("{}", e)))?;
        config.check()?;
        Ok(config)
    }

    /// Build from flat host options
    ///
    /// Recognised keys: `ceiling_warning_ratio`, `floor_warning_ratio`,
    /// `insulation_min_250v`, `insulation_min_500v`, `insulation_min_1000v`,
    /// `default_test_voltage`, `rcd_max_time_ms`, `rcd_s_type_max_ms`,
    /// `rcd_s_type_min_ms`, `ring_tolerance_ohms`. Unknown keys are ignored.
    pub fn from_options(opts: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut insulation_minimums = defaults.insulation_minimums.clone();
        for (volts, minimum) in insulation_minimums.iter_mut() {
            let key = format!("insulation_min_{}v", volts);
            *minimum = decimal_or(opts, &key, *minimum)?;
        }

        let default_test_voltage = match opts.get("default_test_voltage") {
            Some(raw) => parse_test_voltage(raw)
                .ok()
                .flatten()
                .ok_or_else(|| invalid("default_test_voltage", raw))?,
            None => defaults.default_test_voltage,
        };

        let config = Self {
            ceiling_warning_ratio: decimal_or(
                opts,
                "ceiling_warning_ratio",
                defaults.ceiling_warning_ratio,
            )?,
            floor_warning_ratio: decimal_or(
                opts,
                "floor_warning_ratio",
                defaults.floor_warning_ratio,
            )?,
            insulation_minimums,
            default_test_voltage,
            rcd_max_time_ms: decimal_or(opts, "rcd_max_time_ms", defaults.rcd_max_time_ms)?,
            rcd_s_type_max_ms: decimal_or(opts, "rcd_s_type_max_ms", defaults.rcd_s_type_max_ms)?,
            rcd_s_type_min_ms: decimal_or(opts, "rcd_s_type_min_ms", defaults.rcd_s_type_min_ms)?,
            ring_tolerance_ohms: decimal_or(
                opts,
                "ring_tolerance_ohms",
                defaults.ring_tolerance_ohms,
            )?,
        };

        config.check()?;
        log::debug!("validation config: {:?}", config);
        Ok(config)
    }

    /// Insulation floor for a test voltage, `None` if not configured
    pub fn insulation_minimum(&self, volts: u32) -> Option<f64> {
        self.insulation_minimums.get(&volts).copied()
    }

    fn check(&self) -> Result<(), ConfigError> {
        let ratio = self.ceiling_warning_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(invalid("ceiling_warning_ratio", &ratio.to_string()));
        }
        if !(self.floor_warning_ratio >= 1.0) {
            return Err(invalid(
                "floor_warning_ratio",
                &self.floor_warning_ratio.to_string(),
            ));
        }
        if self.rcd_s_type_min_ms >= self.rcd_s_type_max_ms {
            return Err(invalid(
                "rcd_s_type_min_ms",
                &self.rcd_s_type_min_ms.to_string(),
            ));
        }
        if !self.insulation_minimums.contains_key(&self.default_test_voltage) {
            return Err(invalid(
                "default_test_voltage",
                &self.default_test_voltage.to_string(),
            ));
        }
        Ok(())
    }
}

/// Optional decimal option with default
fn decimal_or(
    opts: &HashMap<String, String>,
    key: &str,
    default: f64,
) -> Result<f64, ConfigError> {
    match opts.get(key) {
        Some(raw) => parse_decimal(raw)
            .ok()
            .filter(|v| *v >= 0.0)
            .ok_or_else(|| invalid(key, raw)),
        None => Ok(default),
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidOption {
        key: key.to_string(),
        value: value.to_string(),
    }
}
