//! Record validation aggregator
//!
//! Runs every rule that applies to a record and collects the verdicts into a
//! [`VerdictMap`]. Stateless: the same records always give the same map.
//!
//! # Rules Applied
//!
//! - Single field rules for every validated field (aliases are judged
//!   through their primary)
//! - Insulation pair against one shared floor
//! - Ring leg consistency and the (r1 + r2) / 4 cross-check
//! - Stored max Zs against the table value for the declared device
//! - Ring legs of a derived record against its source circuit

use std::collections::BTreeMap;

use crate::config::ValidationConfig;
use crate::field_validator::{
    validate, validate_insulation_pair, validate_ring_legs, FieldKind, ValidationContext,
};
use crate::lookup_tables::LookupTables;
use crate::measurements::parse_measurement;
use crate::resolver::resolve_for_record;
use crate::types::{CircuitField, CircuitTestRecord};
use crate::types_verdict::{Verdict, VerdictCode, VerdictLevel, VerdictMap};

const RING_LEGS: [CircuitField; 3] = [
    CircuitField::RingR1,
    CircuitField::RingRn,
    CircuitField::RingR2,
];

/// Max Zs values closer than this count as equal (table precision is 0.01 Ω)
const MAX_ZS_PRECISION: f64 = 0.005;

/// Full verdict map for one record
///
/// # Arguments
///
/// * `record` - Record to judge
/// * `records` - Whole collection, for sibling rules (may include `record`)
/// * `tables` - Loaded table edition
/// * `config` - Thresholds
///
/// # Example
///
/// ```
/// use circuit_test_rules::aggregator::validate_record;
/// use circuit_test_rules::config::ValidationConfig;
/// use circuit_test_rules::lookup_tables::LookupTables;
/// use circuit_test_rules::{CircuitField, CircuitTestRecord, VerdictLevel};
///
/// let tables = LookupTables::bs7671().unwrap();
/// let mut record = CircuitTestRecord::new("c1");
/// record.bs_standard = "BS 88-3".to_string();
/// record.protective_device_rating = "20A".to_string();
/// record.measured_zs = "1.15".to_string();
///
/// let verdicts = validate_record(&record, &[], &tables, &ValidationConfig::default());
/// assert_eq!(verdicts.get(CircuitField::MeasuredZs).unwrap().level, VerdictLevel::Pass);
/// ```
pub fn validate_record(
    record: &CircuitTestRecord,
    records: &[CircuitTestRecord],
    tables: &LookupTables,
    config: &ValidationConfig,
) -> VerdictMap {
    let ctx = ValidationContext::for_record(record, tables);
    let mut verdicts = VerdictMap::new();

    for field in CircuitField::ALL {
        if field.primary_of_alias().is_some() || handled_by_group(field) {
            continue;
        }
        if let Some(kind) = FieldKind::for_field(field) {
            verdicts.insert(field, validate(kind, record.get(field), &ctx, config));
        }
    }

    for (field, verdict) in validate_insulation_pair(record, config) {
        verdicts.insert(field, verdict);
    }
    for (field, verdict) in validate_ring_legs(record, config) {
        verdicts.merge(field, verdict);
    }

    if let Some(verdict) = check_stored_max_zs(record, tables) {
        verdicts.merge(CircuitField::MaxZs, verdict);
    }

    if let Some(source) = source_of(record, records) {
        for (field, verdict) in compare_with_source(record, source, config) {
            verdicts.merge(field, verdict);
        }
    }

    verdicts
}

/// Verdict maps for every record, keyed by record id
pub fn validate_collection(
    records: &[CircuitTestRecord],
    tables: &LookupTables,
    config: &ValidationConfig,
) -> BTreeMap<String, VerdictMap> {
    let results: BTreeMap<String, VerdictMap> = records
        .iter()
        .map(|record| {
            (
                record.id.clone(),
                validate_record(record, records, tables, config),
            )
        })
        .collect();

    log::debug!(
        "validated {} records, {} with failures",
        results.len(),
        results
            .values()
            .filter(|m| m.count(VerdictLevel::Fail) > 0)
            .count()
    );
    results
}

fn handled_by_group(field: CircuitField) -> bool {
    matches!(
        field,
        CircuitField::InsulationLiveLive | CircuitField::InsulationLiveEarth
    ) || RING_LEGS.contains(&field)
}

/// Stored max Zs that disagrees with the table value for the declared device
///
/// Covers a hand-corrected value or a device edit whose cascade never landed.
fn check_stored_max_zs(record: &CircuitTestRecord, tables: &LookupTables) -> Option<Verdict> {
    let stored = parse_measurement(&record.max_zs).ok()?.value()?;
    let table = resolve_for_record(tables, record)?;

    if (stored - table).abs() > MAX_ZS_PRECISION {
        return Some(Verdict::warning(
            VerdictCode::Inconsistent,
            format!(
                "Max Zs {}Ω differs from the table value {}Ω for this device",
                stored, table
            ),
        ));
    }
    None
}

fn source_of<'a>(
    record: &CircuitTestRecord,
    records: &'a [CircuitTestRecord],
) -> Option<&'a CircuitTestRecord> {
    if !record.is_locked() {
        return None;
    }
    let source_id = record.source_circuit_id.as_deref()?;
    records.iter().find(|r| r.id == source_id && r.id != record.id)
}

/// Ring legs of a derived record against the source circuit's readings
fn compare_with_source(
    record: &CircuitTestRecord,
    source: &CircuitTestRecord,
    config: &ValidationConfig,
) -> Vec<(CircuitField, Verdict)> {
    let reading = |r: &CircuitTestRecord, field: CircuitField| {
        parse_measurement(r.get(field)).ok().and_then(|m| m.value())
    };
    let name = if source.circuit_designation.trim().is_empty() {
        source.id.as_str()
    } else {
        source.circuit_designation.trim()
    };

    RING_LEGS
        .iter()
        .filter_map(|&field| {
            let own = reading(record, field)?;
            let theirs = reading(source, field)?;
            let diff = (own - theirs).abs();
            (diff > config.ring_tolerance_ohms + 1e-9).then(|| {
                (
                    field,
                    Verdict::warning(
                        VerdictCode::Inconsistent,
                        format!(
                            "{}Ω differs from {}Ω on source circuit {}",
                            own, theirs, name
                        ),
                    ),
                )
            })
        })
        .collect()
}
