//! Versioned reference data for protective device coordination
//!
//! Holds one edition of the maximum earth fault loop impedance table keyed by
//! (device standard, trip curve, rating) together with the categorical option
//! sets the data-entry grid offers in its dropdowns.
//!
//! Table values are data, not logic: they are loaded through
//! [`table_parser`](crate::table_parser) either from host-injected sources
//! ([`LookupTables::from_sources`]) or from the bundled edition
//! ([`LookupTables::bs7671`]).
//!
//! # Example
//!
//! ```rust
//! use circuit_test_rules::lookup_tables::{DeviceKey, LookupTables};
//!
//! let tables = LookupTables::bs7671().unwrap();
//! let key = DeviceKey::new("BS EN 60898", "B", "32A").unwrap();
//! assert_eq!(tables.max_zs(&key), Some(1.37));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::TableError;
use crate::measurements::{normalize_curve, normalize_rating};
use crate::table_parser::{parse_max_zs_csv, parse_option_sets};

const BS7671_OPTIONS: &str = include_str!("../data/bs7671_options.json");
const BS7671_MAX_ZS: &str = include_str!("../data/bs7671_max_zs.csv");

// ============================================================================
// Data Structures
// ============================================================================

/// Protection family of a device standard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceFamily {
    /// MCB, RCBO, MCCB: characteristic depends on a trip curve
    CircuitBreaker,
    /// Fuse families: characteristic fixed by standard and rating
    Fuse,
}

impl DeviceFamily {
    pub fn requires_curve(self) -> bool {
        matches!(self, DeviceFamily::CircuitBreaker)
    }
}

/// One selectable device standard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardOption {
    /// Code stored on the record, e.g. "BS EN 60898"
    pub code: String,

    /// Short label for the dropdown, e.g. "MCB"
    pub label: String,

    pub family: DeviceFamily,
}

/// Edition metadata of a table source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableVersion {
    /// Example: "BS 7671:2018+A2:2022"
    pub edition: String,

    /// First date the edition applies to
    pub effective_from: NaiveDate,
}

/// Categorical option sets offered by the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSets {
    pub version: TableVersion,

    pub standards: Vec<StandardOption>,

    /// Trip curves for breaker standards, e.g. ["B", "C", "D"]
    pub curves: Vec<String>,

    #[serde(default)]
    pub rcd_standards: Vec<String>,

    #[serde(default)]
    pub rcd_types: Vec<String>,

    /// Residual operating currents in mA
    #[serde(default)]
    pub rcd_ratings_ma: Vec<String>,

    /// Insulation test voltages, e.g. ["250V", "500V", "1000V"]
    #[serde(default)]
    pub test_voltages: Vec<String>,
}

/// Canonical (standard, curve, rating) lookup key
///
/// Curve is empty for standards that do not use one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceKey {
    pub standard: String,
    pub curve: String,
    pub rating: String,
}

impl DeviceKey {
    /// Build a canonical key
    ///
    /// Returns `None` when the standard is blank or the rating cannot be read.
    /// An empty curve is kept as empty; whether that is acceptable depends on
    /// the standard and is decided by the resolver.
    pub fn new(standard: &str, curve: &str, rating: &str) -> Option<Self> {
        let standard = standard.trim();
        if standard.is_empty() {
            return None;
        }

        Some(Self {
            standard: standard.to_string(),
            curve: normalize_curve(curve),
            rating: normalize_rating(rating)?,
        })
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.curve.is_empty() {
            write!(f, "{} {}", self.standard, self.rating)
        } else {
            write!(f, "{} {}{}", self.standard, self.curve, self.rating)
        }
    }
}

/// One loaded, validated table edition
///
/// Immutable after load.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTables {
    options: OptionSets,
    max_zs: BTreeMap<DeviceKey, f64>,
}

// ============================================================================
// Construction
// ============================================================================

impl LookupTables {
    /// Bundled BS 7671:2018+A2 edition
    pub fn bs7671() -> Result<Self, TableError> {
        Self::from_sources(BS7671_OPTIONS, BS7671_MAX_ZS)
    }

    /// Load an edition from an option set JSON document and an impedance CSV
    ///
    /// # Arguments
    ///
    /// * `options_json` - Option sets with version metadata
    /// * `max_zs_csv` - Semicolon-delimited `standard;curve;rating;max_zs_ohms`
    ///
    /// # Returns
    ///
    /// * `Ok(LookupTables)` - Parsed and cross-checked edition
    /// * `Err(TableError)` - Format error or inconsistent row
    pub fn from_sources(options_json: &str, max_zs_csv: &str) -> Result<Self, TableError> {
        let options = parse_option_sets(options_json)?;
        let entries = parse_max_zs_csv(max_zs_csv)?;
        Self::from_parts(options, entries)
    }

    /// Cross-check entries against the option sets and build the edition
    ///
    /// Every entry must name a declared standard; breaker standards need a
    /// declared curve and fuse standards must have none; keys are unique and
    /// impedances positive.
    pub fn from_parts(
        options: OptionSets,
        entries: Vec<(DeviceKey, f64)>,
    ) -> Result<Self, TableError> {
        let mut max_zs = BTreeMap::new();

        for (key, ohms) in entries {
            if !(ohms.is_finite() && ohms > 0.0) {
                return Err(TableError::InvalidImpedance(ohms.to_string()));
            }

            let standard = find_standard(&options, &key.standard)
                .ok_or_else(|| TableError::UnknownStandard(key.standard.clone()))?;

            let curve_ok = if standard.family.requires_curve() {
                options.curves.iter().any(|c| *c == key.curve)
            } else {
                key.curve.is_empty()
            };
            if !curve_ok {
                return Err(TableError::InconsistentCurve {
                    standard: key.standard,
                    curve: key.curve,
                });
            }

            let canonical = DeviceKey {
                standard: standard.code.clone(),
                ..key
            };
            if max_zs.contains_key(&canonical) {
                return Err(TableError::DuplicateEntry(canonical.to_string()));
            }
            max_zs.insert(canonical, ohms);
        }

        log::debug!(
            "loaded lookup table edition '{}' with {} impedance entries",
            options.version.edition,
            max_zs.len()
        );

        Ok(Self { options, max_zs })
    }
}

// ============================================================================
// Lookup
// ============================================================================

impl LookupTables {
    pub fn version(&self) -> &TableVersion {
        &self.options.version
    }

    pub fn options(&self) -> &OptionSets {
        &self.options
    }

    /// Declared standard matching `code` (trimmed, ASCII case-insensitive)
    pub fn standard(&self, code: &str) -> Option<&StandardOption> {
        find_standard(&self.options, code)
    }

    /// Stored impedance for a key, `None` if absent
    ///
    /// The key's standard is matched against the declared codes, so
    /// "bs en 60898" finds "BS EN 60898" rows.
    pub fn max_zs(&self, key: &DeviceKey) -> Option<f64> {
        let standard = self.standard(&key.standard)?;
        if standard.code == key.standard {
            return self.max_zs.get(key).copied();
        }
        let canonical = DeviceKey {
            standard: standard.code.clone(),
            curve: key.curve.clone(),
            rating: key.rating.clone(),
        };
        self.max_zs.get(&canonical).copied()
    }

    /// Every (key, impedance) pair in key order
    pub fn entries(&self) -> impl Iterator<Item = (&DeviceKey, f64)> + '_ {
        self.max_zs.iter().map(|(key, ohms)| (key, *ohms))
    }

    pub fn len(&self) -> usize {
        self.max_zs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.max_zs.is_empty()
    }

    /// True when the edition applies on `date`
    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.options.version.effective_from <= date
    }
}

fn find_standard<'a>(options: &'a OptionSets, code: &str) -> Option<&'a StandardOption> {
    let code = code.trim();
    options
        .standards
        .iter()
        .find(|s| s.code.eq_ignore_ascii_case(code))
}

/// Newest edition in effect on `date`
///
/// # Example
///
/// ```
/// # use circuit_test_rules::lookup_tables::{select_edition, LookupTables};
/// # use chrono::NaiveDate;
/// let editions = vec![LookupTables::bs7671().unwrap()];
/// let before = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
/// let after = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
/// assert!(select_edition(&editions, before).is_none());
/// assert!(select_edition(&editions, after).is_some());
/// ```
pub fn select_edition(editions: &[LookupTables], date: NaiveDate) -> Option<&LookupTables> {
    editions
        .iter()
        .filter(|t| t.is_effective_on(date))
        .max_by_key(|t| t.options.version.effective_from)
}
