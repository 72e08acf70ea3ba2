//! Multi-record propagation
//!
//! Bulk-fills one validated field value from a source record onto a chosen
//! set of sibling records.
//!
//! # Rules
//!
//! - The source value must not carry a `fail` verdict
//! - A locked target (derived record) whose value differs is skipped
//! - Targets already holding the value are left alone
//! - A trip curve is never written onto a target whose standard takes none
//! - Device fields are cascaded per target so each gets its own max Zs;
//!   any other field goes out as one multi-record write

use std::collections::BTreeSet;

use serde::Serialize;

use crate::aggregator::validate_record;
use crate::cascade::{
    apply_device_field_change, commit_patch, curve_editable, with_legacy_mirrors,
};
use crate::config::ValidationConfig;
use crate::error::{PropagationError, StoreError};
use crate::lookup_tables::LookupTables;
use crate::store::RecordStore;
use crate::types::{CircuitField, CircuitTestRecord, FieldPatch};

/// What a propagation did to each target
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationReport {
    /// Value written
    pub value: String,

    /// Targets written
    pub updated: Vec<String>,

    /// Locked targets holding a different value
    pub skipped: Vec<String>,

    /// Targets that already held the value
    pub unchanged: Vec<String>,

    /// Target ids not present in the collection
    pub missing: Vec<String>,

    /// Targets whose standard takes no trip curve (curve propagation only)
    pub incompatible: Vec<String>,
}

impl PropagationReport {
    pub fn updated_count(&self) -> usize {
        self.updated.len()
    }

    pub fn skip_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Copy `field` from the source record onto the target records
///
/// # Arguments
///
/// * `store` - Record store receiving the writes
/// * `tables` - Loaded table edition (device cascades, source validation)
/// * `config` - Thresholds for source validation
/// * `records` - Current record collection
/// * `source_id` - Record holding the value to copy
/// * `field` - Field to copy; an alias is propagated through its primary
/// * `target_ids` - Records to fill; the source and duplicates are ignored
///
/// # Errors
///
/// * `PropagationError::FieldNotPropagatable` - Inherited identity fields
/// * `PropagationError::SourceNotFound` - Unknown source id
/// * `PropagationError::SourceFailsValidation` - Source value fails its rule
/// * `PropagationError::Partial` - A write failed; the carried report lists
///   the targets already written, which stay written
///
/// # Example
///
/// ```
/// use circuit_test_rules::config::ValidationConfig;
/// use circuit_test_rules::lookup_tables::LookupTables;
/// use circuit_test_rules::propagation::propagate_field;
/// use circuit_test_rules::store::InMemoryRecordStore;
/// use circuit_test_rules::{CircuitField, CircuitTestRecord};
///
/// let mut source = CircuitTestRecord::new("c1");
/// source.insulation_test_voltage = "500V".to_string();
/// let records = vec![source, CircuitTestRecord::new("c2")];
/// let mut store = InMemoryRecordStore::new(records.clone());
///
/// let report = propagate_field(
///     &mut store,
///     &LookupTables::bs7671().unwrap(),
///     &ValidationConfig::default(),
///     &records,
///     "c1",
///     CircuitField::InsulationTestVoltage,
///     &["c2".to_string()],
/// )
/// .unwrap();
///
/// assert_eq!(report.updated, vec!["c2".to_string()]);
/// assert_eq!(store.get("c2").unwrap().insulation_test_voltage, "500V");
/// ```
pub fn propagate_field<S: RecordStore + ?Sized>(
    store: &mut S,
    tables: &LookupTables,
    config: &ValidationConfig,
    records: &[CircuitTestRecord],
    source_id: &str,
    field: CircuitField,
    target_ids: &[String],
) -> Result<PropagationReport, PropagationError> {
    let field = field.primary_of_alias().unwrap_or(field);
    if field.is_inherited() {
        return Err(PropagationError::FieldNotPropagatable(field));
    }

    let source = records
        .iter()
        .find(|r| r.id == source_id)
        .ok_or_else(|| PropagationError::SourceNotFound(source_id.to_string()))?;
    let value = source.get(field).to_string();

    let verdicts = validate_record(source, records, tables, config);
    if let Some(verdict) = verdicts.get(field).filter(|v| v.is_fail()) {
        return Err(PropagationError::SourceFailsValidation {
            field,
            message: verdict.message.clone().unwrap_or_default(),
        });
    }

    let mut report = PropagationReport {
        value: value.clone(),
        ..PropagationReport::default()
    };
    let mut targets: Vec<&CircuitTestRecord> = Vec::new();
    let mut seen = BTreeSet::new();

    for id in target_ids {
        if id == source_id || !seen.insert(id.as_str()) {
            continue;
        }
        let Some(target) = records.iter().find(|r| r.id == *id) else {
            report.missing.push(id.clone());
            continue;
        };

        if target.get(field) == value {
            report.unchanged.push(id.clone());
        } else if target.is_locked() {
            log::debug!("skipping locked record '{}' for '{}'", id, field);
            report.skipped.push(id.clone());
        } else if field == CircuitField::ProtectiveDeviceCurve
            && !value.trim().is_empty()
            && !curve_editable(tables, target)
        {
            log::debug!(
                "record '{}': standard '{}' takes no curve, not propagating '{}'",
                id,
                target.bs_standard,
                value
            );
            report.incompatible.push(id.clone());
        } else {
            targets.push(target);
        }
    }

    if field.is_device_key() {
        for target in &targets {
            let patch =
                with_legacy_mirrors(apply_device_field_change(tables, target, field, &value));
            if let Err(e) = commit_patch(&mut *store, &target.id, &patch) {
                return Err(partial(report, e.record_id, e.source));
            }
            report.updated.push(target.id.clone());
        }
    } else if !targets.is_empty() {
        let ids: Vec<String> = targets.iter().map(|t| t.id.clone()).collect();
        let patch = with_legacy_mirrors(FieldPatch::single(field, value.as_str()));
        if let Err(e) = store.update_many(&ids, &patch) {
            report.updated = e.written;
            return Err(partial(report, e.failed_id, e.source));
        }
        report.updated = ids;
    }

    log::info!(
        "propagated '{}' = {:?} from '{}': {} updated, {} skipped, {} unchanged",
        field,
        value,
        source_id,
        report.updated.len(),
        report.skipped.len(),
        report.unchanged.len()
    );

    Ok(report)
}

fn partial(report: PropagationReport, failed_id: String, source: StoreError) -> PropagationError {
    log::warn!(
        "propagation of '{}' stopped at record '{}' after {} updates: {}",
        report.value,
        failed_id,
        report.updated.len(),
        source
    );
    PropagationError::Partial {
        report,
        failed_id,
        source,
    }
}
