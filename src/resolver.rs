//! Device coordination resolver
//!
//! Maps a protective device's declared characteristics to the maximum
//! permitted earth fault loop impedance of the loaded table edition.
//!
//! # Resolution Logic
//!
//! - Standard must be declared in the option sets
//! - Breaker-family standards need a curve; fuse-family standards must have none
//! - Rating must read as an ampere rating
//! - The canonical (standard, curve, rating) key must exist in the table
//!
//! Anything else is unresolvable. A missing curve is never defaulted.
//!
//! # Example
//!
//! ```rust
//! use circuit_test_rules::lookup_tables::LookupTables;
//! use circuit_test_rules::resolver::*;
//!
//! let tables = LookupTables::bs7671().unwrap();
//!
//! assert!(requires_curve(&tables, "BS EN 60898"));
//! assert!(!requires_curve(&tables, "BS 88-3"));
//!
//! assert_eq!(resolve_max_impedance(&tables, "BS EN 60898", "B", "32A"), Some(1.37));
//! assert_eq!(resolve_max_impedance(&tables, "BS EN 60898", "", "32A"), None);
//! ```

use std::fmt;

use crate::lookup_tables::{DeviceKey, LookupTables};
use crate::measurements::{normalize_curve, normalize_rating, parse_decimal};
use crate::types::CircuitTestRecord;

/// Why a device triple did not resolve
///
/// Unresolvable is a normal mid-edit state, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Unresolved {
    MissingStandard,
    UnknownStandard(String),
    CurveRequired,
    CurveNotApplicable(String),
    MissingRating,
    InvalidRating(String),
    NotInTable(DeviceKey),
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unresolved::MissingStandard => write!(f, "no device standard"),
            Unresolved::UnknownStandard(s) => write!(f, "unknown device standard '{}'", s),
            Unresolved::CurveRequired => write!(f, "standard requires a trip curve"),
            Unresolved::CurveNotApplicable(c) => {
                write!(f, "curve '{}' does not apply to this standard", c)
            }
            Unresolved::MissingRating => write!(f, "no device rating"),
            Unresolved::InvalidRating(r) => write!(f, "invalid rating '{}'", r),
            Unresolved::NotInTable(key) => write!(f, "{} not in table", key),
        }
    }
}

/// True iff the standard's protection characteristic depends on a trip curve
///
/// Pure function of `standard`: breaker-family standards are in the curve
/// group, fuse-family and undeclared standards are not.
pub fn requires_curve(tables: &LookupTables, standard: &str) -> bool {
    tables
        .standard(standard)
        .is_some_and(|s| s.family.requires_curve())
}

/// Resolve a device triple, explaining failures
///
/// # Returns
///
/// * `Ok(f64)` - Stored maximum permitted impedance (Ω)
/// * `Err(Unresolved)` - Incomplete, inconsistent or unknown triple
pub fn resolve_device(
    tables: &LookupTables,
    standard: &str,
    curve: &str,
    rating: &str,
) -> Result<f64, Unresolved> {
    if standard.trim().is_empty() {
        return Err(Unresolved::MissingStandard);
    }
    let declared = tables
        .standard(standard)
        .ok_or_else(|| Unresolved::UnknownStandard(standard.trim().to_string()))?;

    let curve = normalize_curve(curve);
    if declared.family.requires_curve() {
        if curve.is_empty() {
            return Err(Unresolved::CurveRequired);
        }
    } else if !curve.is_empty() {
        return Err(Unresolved::CurveNotApplicable(curve));
    }

    if rating.trim().is_empty() {
        return Err(Unresolved::MissingRating);
    }
    let rating =
        normalize_rating(rating).ok_or_else(|| Unresolved::InvalidRating(rating.to_string()))?;

    let key = DeviceKey {
        standard: declared.code.clone(),
        curve,
        rating,
    };
    tables.max_zs(&key).ok_or(Unresolved::NotInTable(key))
}

/// Maximum permitted impedance for a device triple, or `None`
///
/// Never guesses: a curve-requiring standard without a curve is `None`, as is
/// a fuse standard with a curve.
pub fn resolve_max_impedance(
    tables: &LookupTables,
    standard: &str,
    curve: &str,
    rating: &str,
) -> Option<f64> {
    match resolve_device(tables, standard, curve, rating) {
        Ok(ohms) => Some(ohms),
        Err(reason) => {
            log::debug!(
                "max Zs unresolved for ({:?}, {:?}, {:?}): {}",
                standard,
                curve,
                rating,
                reason
            );
            None
        }
    }
}

/// Resolve from a record's declared device fields
pub fn resolve_for_record(tables: &LookupTables, record: &CircuitTestRecord) -> Option<f64> {
    resolve_max_impedance(
        tables,
        &record.bs_standard,
        &record.protective_device_curve,
        &record.protective_device_rating,
    )
}

/// Curves selectable for a standard; empty when the standard takes none
pub fn curves_for(tables: &LookupTables, standard: &str) -> Vec<String> {
    if requires_curve(tables, standard) {
        tables.options().curves.clone()
    } else {
        Vec::new()
    }
}

/// Ratings present in the table for a standard and curve, ascending
pub fn ratings_for(tables: &LookupTables, standard: &str, curve: &str) -> Vec<String> {
    let Some(declared) = tables.standard(standard) else {
        return Vec::new();
    };
    let curve = normalize_curve(curve);

    let mut ratings: Vec<String> = tables
        .entries()
        .filter(|(key, _)| key.standard == declared.code && key.curve == curve)
        .map(|(key, _)| key.rating.clone())
        .collect();

    ratings.sort_by(|a, b| {
        let amps = |r: &str| parse_decimal(r.trim_end_matches('A')).unwrap_or(f64::MAX);
        amps(a).total_cmp(&amps(b))
    });
    ratings.dedup();
    ratings
}
