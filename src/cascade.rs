//! Cascading update controller
//!
//! Turns one user edit into a coherent patch and commits it through the
//! [`RecordStore`] collaborator. Holds no state between calls.
//!
//! # Edit Flow
//!
//! 1. [`plan_edit`]: reject inherited fields, redirect alias writes, coerce
//!    meaningless curves, cascade device keys into `maxZs`, mirror aliases
//! 2. [`commit_patch`]: one batched mutation when the store has one,
//!    otherwise per-field writes in key order
//!
//! # Example
//!
//! ```rust
//! use circuit_test_rules::cascade::apply_device_field_change;
//! use circuit_test_rules::lookup_tables::LookupTables;
//! use circuit_test_rules::{CircuitField, CircuitTestRecord};
//!
//! let tables = LookupTables::bs7671().unwrap();
//! let mut record = CircuitTestRecord::new("c1");
//! record.bs_standard = "BS EN 60898".to_string();
//! record.protective_device_curve = "B".to_string();
//!
//! let patch = apply_device_field_change(&tables, &record, CircuitField::ProtectiveDeviceRating, "32A");
//! assert_eq!(patch.get(CircuitField::MaxZs), Some("1.37"));
//! ```

use crate::error::{CircuitTestError, CommitError, EditRejected, StoreError};
use crate::lookup_tables::LookupTables;
use crate::resolver::{requires_curve, resolve_max_impedance};
use crate::store::RecordStore;
use crate::types::{inherited_patch, CircuitField, CircuitTestRecord, FieldPatch};

/// Outcome of a successful commit
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReport {
    pub record_id: String,

    /// Fields written, in write order
    pub applied: Vec<CircuitField>,

    /// True when the patch went through one batched mutation
    pub batched: bool,
}

// ============================================================================
// Planning
// ============================================================================

/// Patch for an edit to the standard, curve or rating
///
/// 1. Start with the edited field
/// 2. A standard without curves clears a non-empty curve
/// 3. Build the effective triple from the patch and the record
/// 4. Add `maxZs` when the triple resolves; leave it untouched otherwise
///
/// Any other field yields a single-entry patch.
///
/// # Arguments
///
/// * `tables` - Loaded table edition
/// * `record` - Record as currently stored
/// * `field` - Edited field
/// * `value` - New value as typed
pub fn apply_device_field_change(
    tables: &LookupTables,
    record: &CircuitTestRecord,
    field: CircuitField,
    value: &str,
) -> FieldPatch {
    let mut patch = FieldPatch::single(field, value);
    if !field.is_device_key() {
        return patch;
    }

    if field == CircuitField::BsStandard
        && !requires_curve(tables, value)
        && !record.protective_device_curve.trim().is_empty()
    {
        log::debug!(
            "record '{}': standard '{}' takes no curve, clearing '{}'",
            record.id,
            value,
            record.protective_device_curve
        );
        patch.set(CircuitField::ProtectiveDeviceCurve, "");
    }

    let resolved = resolve_max_impedance(
        tables,
        effective(&patch, record, CircuitField::BsStandard),
        effective(&patch, record, CircuitField::ProtectiveDeviceCurve),
        effective(&patch, record, CircuitField::ProtectiveDeviceRating),
    );

    if let Some(ohms) = resolved {
        patch.set(CircuitField::MaxZs, format_ohms(ohms));
    }

    patch
}

/// Plan a user edit of any field
///
/// # Returns
///
/// * `Ok(FieldPatch)` - Complete patch including cascades and alias mirrors
/// * `Err(EditRejected)` - Inherited field on a derived record
///
/// # Example
///
/// ```
/// # use circuit_test_rules::cascade::plan_edit;
/// # use circuit_test_rules::lookup_tables::LookupTables;
/// # use circuit_test_rules::{CircuitField, CircuitTestRecord};
/// let tables = LookupTables::bs7671().unwrap();
/// let record = CircuitTestRecord::new("c1");
///
/// // Writes to the deprecated alias land on the primary and are mirrored back
/// let patch = plan_edit(&tables, &record, CircuitField::PfcKa, "1.6").unwrap();
/// assert_eq!(patch.get(CircuitField::Pfc), Some("1.6"));
/// assert_eq!(patch.get(CircuitField::PfcKa), Some("1.6"));
/// ```
pub fn plan_edit(
    tables: &LookupTables,
    record: &CircuitTestRecord,
    field: CircuitField,
    value: &str,
) -> Result<FieldPatch, EditRejected> {
    let field = match field.primary_of_alias() {
        Some(primary) => {
            log::debug!("redirecting write of '{}' to '{}'", field, primary);
            primary
        }
        None => field,
    };

    if record.is_locked() && field.is_inherited() {
        return Err(EditRejected::InheritedField {
            record_id: record.id.clone(),
            field,
        });
    }

    let value = if field == CircuitField::ProtectiveDeviceCurve && !curve_editable(tables, record) {
        if !value.trim().is_empty() {
            log::debug!(
                "record '{}': curve '{}' ignored for standard '{}'",
                record.id,
                value,
                record.bs_standard
            );
        }
        ""
    } else {
        value
    };

    let patch = if field.is_device_key() {
        apply_device_field_change(tables, record, field, value)
    } else {
        FieldPatch::single(field, value)
    };

    Ok(with_legacy_mirrors(patch))
}

/// Whether the curve input is meaningful for the record's standard
///
/// Same predicate the controller uses to clear and coerce curves.
pub fn curve_editable(tables: &LookupTables, record: &CircuitTestRecord) -> bool {
    requires_curve(tables, &record.bs_standard)
}

/// Add the deprecated alias of every primary field in the patch
///
/// The primary wins when both are present; an alias-only entry is copied to
/// its primary first.
pub fn with_legacy_mirrors(mut patch: FieldPatch) -> FieldPatch {
    let aliases: Vec<(CircuitField, String)> = patch
        .iter()
        .filter_map(|(field, value)| field.primary_of_alias().map(|p| (p, value.to_string())))
        .collect();
    for (primary, value) in aliases {
        if !patch.contains(primary) {
            patch.set(primary, value);
        }
    }

    let mirrors: Vec<(CircuitField, String)> = patch
        .iter()
        .filter_map(|(field, value)| field.legacy_alias().map(|a| (a, value.to_string())))
        .collect();
    for (alias, value) in mirrors {
        patch.set(alias, value);
    }

    patch
}

/// Patch value if the patch touches `field`, else the stored value
fn effective<'a>(
    patch: &'a FieldPatch,
    record: &'a CircuitTestRecord,
    field: CircuitField,
) -> &'a str {
    patch.get(field).unwrap_or_else(|| record.get(field))
}

fn format_ohms(ohms: f64) -> String {
    format!("{:.2}", ohms)
}

// ============================================================================
// Commit
// ============================================================================

/// Write a patch to one record
///
/// Uses `update_fields` when the store supports it. Otherwise writes each key
/// with `update_field` in [`CircuitField`] order and stops at the first
/// failure; keys already written stay written.
///
/// # Errors
///
/// * `CommitError` - Lists applied and skipped keys plus the store error
pub fn commit_patch<S: RecordStore + ?Sized>(
    store: &mut S,
    record_id: &str,
    patch: &FieldPatch,
) -> Result<CommitReport, CommitError> {
    let keys: Vec<CircuitField> = patch.keys().collect();

    if patch.is_empty() {
        return Ok(CommitReport {
            record_id: record_id.to_string(),
            applied: keys,
            batched: false,
        });
    }

    if store.supports_batch() {
        match store.update_fields(record_id, patch) {
            Ok(()) => {
                return Ok(CommitReport {
                    record_id: record_id.to_string(),
                    applied: keys,
                    batched: true,
                })
            }
            Err(StoreError::BatchUnsupported) => {
                log::debug!("store refused batch for '{}', writing per field", record_id);
            }
            Err(source) => {
                return Err(CommitError {
                    record_id: record_id.to_string(),
                    applied: Vec::new(),
                    skipped: keys[1..].to_vec(),
                    failed_field: keys[0],
                    source,
                })
            }
        }
    }

    let mut applied = Vec::with_capacity(keys.len());
    for (i, (field, value)) in patch.iter().enumerate() {
        if let Err(source) = store.update_field(record_id, field, value) {
            let skipped = keys[i + 1..].to_vec();
            log::warn!(
                "record '{}': patch partially applied, '{}' failed after {} of {} fields: {}",
                record_id,
                field,
                applied.len(),
                keys.len(),
                source
            );
            return Err(CommitError {
                record_id: record_id.to_string(),
                applied,
                skipped,
                failed_field: field,
                source,
            });
        }
        applied.push(field);
    }

    Ok(CommitReport {
        record_id: record_id.to_string(),
        applied,
        batched: false,
    })
}

/// Write a primary field together with its deprecated alias
///
/// Both values go through the same commit path. An alias passed as
/// `primary` is redirected to its primary first.
pub fn set_legacy_mirrored_field<S: RecordStore + ?Sized>(
    store: &mut S,
    record_id: &str,
    primary: CircuitField,
    value: &str,
) -> Result<CommitReport, CommitError> {
    let primary = primary.primary_of_alias().unwrap_or(primary);
    let patch = with_legacy_mirrors(FieldPatch::single(primary, value));
    commit_patch(store, record_id, &patch)
}

/// Plan and commit one user edit
pub fn apply_edit<S: RecordStore + ?Sized>(
    store: &mut S,
    tables: &LookupTables,
    record: &CircuitTestRecord,
    field: CircuitField,
    value: &str,
) -> Result<CommitReport, CircuitTestError> {
    let patch = plan_edit(tables, record, field, value)?;
    Ok(commit_patch(store, &record.id, &patch)?)
}

/// Re-sync inherited fields of every record derived from `source`
///
/// Returns one report per derived record that needed a write.
pub fn sync_derived_records<S: RecordStore + ?Sized>(
    store: &mut S,
    records: &[CircuitTestRecord],
    source: &CircuitTestRecord,
) -> Result<Vec<CommitReport>, CommitError> {
    let mut reports = Vec::new();
    for derived in records
        .iter()
        .filter(|r| r.source_circuit_id.as_deref() == Some(source.id.as_str()))
    {
        let patch = inherited_patch(derived, source);
        if !patch.is_empty() {
            reports.push(commit_patch(&mut *store, &derived.id, &patch)?);
        }
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRecordStore;

    fn tables() -> LookupTables {
        LookupTables::bs7671().unwrap()
    }

    fn mcb(id: &str) -> CircuitTestRecord {
        let mut record = CircuitTestRecord::new(id);
        record.bs_standard = "BS EN 60898".to_string();
        record.protective_device_curve = "B".to_string();
        record.protective_device_rating = "32A".to_string();
        record.max_zs = "1.37".to_string();
        record
    }

    /// Store that rejects writes to one field
    struct FailingStore {
        inner: InMemoryRecordStore,
        fail_on: CircuitField,
    }

    impl RecordStore for FailingStore {
        fn update_field(
            &mut self,
            record_id: &str,
            field: CircuitField,
            value: &str,
        ) -> Result<(), StoreError> {
            if field == self.fail_on {
                return Err(StoreError::Backend("connection reset".to_string()));
            }
            self.inner.update_field(record_id, field, value)
        }
    }

    // ========================================================================
    // Planning Tests
    // ========================================================================

    #[test]
    fn test_standard_change_to_fuse_clears_curve() {
        let tables = tables();
        let record = mcb("c1");
        let patch =
            apply_device_field_change(&tables, &record, CircuitField::BsStandard, "BS 88-3");

        assert_eq!(patch.get(CircuitField::ProtectiveDeviceCurve), Some(""));
        assert_eq!(patch.get(CircuitField::MaxZs), Some("0.83"));
    }

    #[test]
    fn test_never_leaves_curve_on_non_curve_standard() {
        let tables = tables();
        for standard in tables.options().standards.iter() {
            if requires_curve(&tables, &standard.code) {
                continue;
            }
            let mut record = mcb("c1");
            let patch =
                apply_device_field_change(&tables, &record, CircuitField::BsStandard, &standard.code);
            record.apply_patch(&patch);
            assert_eq!(record.protective_device_curve, "", "{}", standard.code);
        }
    }

    #[test]
    fn test_unresolvable_leaves_max_zs_untouched() {
        let tables = tables();
        let record = mcb("c1");
        let patch = apply_device_field_change(
            &tables,
            &record,
            CircuitField::ProtectiveDeviceRating,
            "7A",
        );
        assert_eq!(patch.len(), 1);
        assert!(!patch.contains(CircuitField::MaxZs));
    }

    #[test]
    fn test_curve_change_recomputes() {
        let tables = tables();
        let record = mcb("c1");
        let patch =
            apply_device_field_change(&tables, &record, CircuitField::ProtectiveDeviceCurve, "C");
        assert_eq!(patch.get(CircuitField::MaxZs), Some("0.68"));
    }

    #[test]
    fn test_non_device_field_is_single_entry() {
        let patch =
            apply_device_field_change(&tables(), &mcb("c1"), CircuitField::Notes, "Spur");
        assert_eq!(patch, FieldPatch::single(CircuitField::Notes, "Spur"));
    }

    #[test]
    fn test_plan_edit_rejects_inherited_field_on_derived() {
        let tables = tables();
        let source = mcb("c1");
        let derived = CircuitTestRecord::derived_from(&source, "c1-b");

        let err = plan_edit(&tables, &derived, CircuitField::CircuitDescription, "Lights")
            .unwrap_err();
        assert_eq!(
            err,
            EditRejected::InheritedField {
                record_id: "c1-b".to_string(),
                field: CircuitField::CircuitDescription
            }
        );

        // Measurements on the derived record remain editable
        assert!(plan_edit(&tables, &derived, CircuitField::MeasuredZs, "0.4").is_ok());
        // Source record is not locked
        assert!(plan_edit(&tables, &source, CircuitField::CircuitDescription, "Lights").is_ok());
    }

    #[test]
    fn test_plan_edit_coerces_curve_on_fuse() {
        let tables = tables();
        let mut record = CircuitTestRecord::new("c1");
        record.bs_standard = "BS 88-3".to_string();
        record.protective_device_rating = "20A".to_string();

        assert!(!curve_editable(&tables, &record));
        let patch = plan_edit(&tables, &record, CircuitField::ProtectiveDeviceCurve, "B").unwrap();
        assert_eq!(patch.get(CircuitField::ProtectiveDeviceCurve), Some(""));
        assert_eq!(patch.get(CircuitField::MaxZs), Some("1.44"));
    }

    #[test]
    fn test_plan_edit_mirrors_pfc() {
        let tables = tables();
        let patch = plan_edit(&tables, &mcb("c1"), CircuitField::Pfc, "2.1").unwrap();
        assert_eq!(patch.len(), 2);
        assert_eq!(patch.get(CircuitField::PfcKa), Some("2.1"));
    }

    #[test]
    fn test_with_legacy_mirrors_primary_wins() {
        let mut patch = FieldPatch::new();
        patch.set(CircuitField::Pfc, "1.0");
        patch.set(CircuitField::PfcKa, "9.9");
        let patch = with_legacy_mirrors(patch);
        assert_eq!(patch.get(CircuitField::PfcKa), Some("1.0"));

        let patch = with_legacy_mirrors(FieldPatch::single(CircuitField::PfcKa, "3.3"));
        assert_eq!(patch.get(CircuitField::Pfc), Some("3.3"));
    }

    // ========================================================================
    // Commit Tests
    // ========================================================================

    #[test]
    fn test_commit_is_idempotent() {
        let tables = tables();
        let record = mcb("c1");
        let patch = plan_edit(&tables, &record, CircuitField::BsStandard, "BS 88-3").unwrap();

        let mut once = InMemoryRecordStore::new(vec![record.clone()]);
        commit_patch(&mut once, "c1", &patch).unwrap();

        let mut twice = InMemoryRecordStore::new(vec![record]);
        commit_patch(&mut twice, "c1", &patch).unwrap();
        commit_patch(&mut twice, "c1", &patch).unwrap();

        assert_eq!(once.records(), twice.records());
    }

    #[test]
    fn test_commit_batched_when_supported() {
        let mut store = InMemoryRecordStore::new(vec![mcb("c1")]).with_batch();
        let patch = plan_edit(&tables(), &mcb("c1"), CircuitField::Pfc, "1.2").unwrap();

        let report = commit_patch(&mut store, "c1", &patch).unwrap();
        assert!(report.batched);
        assert_eq!(report.applied, vec![CircuitField::Pfc, CircuitField::PfcKa]);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_commit_sequential_in_key_order() {
        let mut store = InMemoryRecordStore::new(vec![mcb("c1")]);
        let patch =
            plan_edit(&tables(), &mcb("c1"), CircuitField::BsStandard, "BS 88-3").unwrap();

        let report = commit_patch(&mut store, "c1", &patch).unwrap();
        assert!(!report.batched);
        assert_eq!(
            report.applied,
            vec![
                CircuitField::BsStandard,
                CircuitField::ProtectiveDeviceCurve,
                CircuitField::MaxZs
            ]
        );
        assert_eq!(store.write_count(), 3);
    }

    #[test]
    fn test_partial_commit_reports_applied_and_skipped() {
        let mut store = FailingStore {
            inner: InMemoryRecordStore::new(vec![mcb("c1")]),
            fail_on: CircuitField::ProtectiveDeviceCurve,
        };
        let patch =
            plan_edit(&tables(), &mcb("c1"), CircuitField::BsStandard, "BS 88-3").unwrap();

        let err = commit_patch(&mut store, "c1", &patch).unwrap_err();
        assert_eq!(err.applied, vec![CircuitField::BsStandard]);
        assert_eq!(err.failed_field, CircuitField::ProtectiveDeviceCurve);
        assert_eq!(err.skipped, vec![CircuitField::MaxZs]);

        // No rollback: the standard stays written
        let record = store.inner.get("c1").unwrap();
        assert_eq!(record.bs_standard, "BS 88-3");
        assert_eq!(record.protective_device_curve, "B");
        assert_eq!(record.max_zs, "1.37");
    }

    #[test]
    fn test_commit_empty_patch_writes_nothing() {
        let mut store = InMemoryRecordStore::new(vec![mcb("c1")]);
        let report = commit_patch(&mut store, "c1", &FieldPatch::new()).unwrap();
        assert!(report.applied.is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_legacy_alias_round_trip() {
        let mut store = InMemoryRecordStore::new(vec![mcb("c1")]);
        set_legacy_mirrored_field(&mut store, "c1", CircuitField::Pfc, "1.8").unwrap();
        let record = store.get("c1").unwrap();
        assert_eq!(record.pfc, record.pfc_ka);

        set_legacy_mirrored_field(&mut store, "c1", CircuitField::PfcKa, "2.4").unwrap();
        let record = store.get("c1").unwrap();
        assert_eq!(record.pfc, "2.4");
        assert_eq!(record.pfc_ka, "2.4");
    }

    #[test]
    fn test_apply_edit_end_to_end() {
        let tables = tables();
        let record = mcb("c1");
        let mut store = InMemoryRecordStore::new(vec![record.clone()]);

        apply_edit(&mut store, &tables, &record, CircuitField::ProtectiveDeviceRating, "16")
            .unwrap();
        let stored = store.get("c1").unwrap();
        assert_eq!(stored.protective_device_rating, "16");
        assert_eq!(stored.max_zs, "2.73");

        let derived = CircuitTestRecord::derived_from(&record, "c1-b");
        let err = apply_edit(&mut store, &tables, &derived, CircuitField::CircuitDesignation, "9")
            .unwrap_err();
        assert!(matches!(err, CircuitTestError::Edit(_)));
    }

    #[test]
    fn test_sync_derived_records() {
        let mut source = mcb("c1");
        let derived = CircuitTestRecord::derived_from(&source, "c1-b");
        let other = mcb("c2");
        let records = vec![source.clone(), derived, other];
        let mut store = InMemoryRecordStore::new(records.clone());

        source.circuit_description = "Kitchen ring".to_string();
        let reports = sync_derived_records(&mut store, &records, &source).unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].record_id, "c1-b");
        assert_eq!(store.get("c1-b").unwrap().circuit_description, "Kitchen ring");
        assert_eq!(store.get("c2").unwrap().circuit_description, "");
    }
}
