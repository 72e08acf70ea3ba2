//! Record store collaborator
//!
//! The persistence layer is external. The core only needs per-field writes,
//! and optionally multi-field and multi-record writes when the store has
//! them. [`InMemoryRecordStore`] serves hosts without a store of their own and
//! the tests.

use std::collections::BTreeMap;

use crate::error::{BulkWriteError, StoreError};
use crate::types::{CircuitField, CircuitTestRecord, FieldPatch};

/// Mutation interface of the record store
///
/// Only `update_field` is required. Stores with a native multi-field
/// mutation override `supports_batch` and `update_fields`.
pub trait RecordStore {
    /// Write one field of one record
    fn update_field(
        &mut self,
        record_id: &str,
        field: CircuitField,
        value: &str,
    ) -> Result<(), StoreError>;

    /// True when `update_fields` applies a whole patch in one mutation
    fn supports_batch(&self) -> bool {
        false
    }

    /// Write a whole patch to one record in one mutation
    fn update_fields(&mut self, _record_id: &str, _patch: &FieldPatch) -> Result<(), StoreError> {
        Err(StoreError::BatchUnsupported)
    }

    /// Write the same patch to several records
    ///
    /// Default: one `update_fields` (or per-field writes) per record,
    /// stopping at the first error. The error names the records already
    /// written; an atomic override reports none.
    fn update_many(
        &mut self,
        record_ids: &[String],
        patch: &FieldPatch,
    ) -> Result<(), BulkWriteError> {
        let batch = self.supports_batch();
        let mut written = Vec::with_capacity(record_ids.len());

        for id in record_ids {
            let result = if batch {
                self.update_fields(id, patch)
            } else {
                patch
                    .iter()
                    .try_for_each(|(field, value)| self.update_field(id, field, value))
            };
            if let Err(source) = result {
                return Err(BulkWriteError {
                    written,
                    failed_id: id.clone(),
                    source,
                });
            }
            written.push(id.clone());
        }
        Ok(())
    }
}

/// Record store held in memory, keyed by record id
///
/// # Example
///
/// ```
/// use circuit_test_rules::store::{InMemoryRecordStore, RecordStore};
/// use circuit_test_rules::{CircuitField, CircuitTestRecord};
///
/// let mut store = InMemoryRecordStore::new(vec![CircuitTestRecord::new("c1")]);
/// store.update_field("c1", CircuitField::Pfc, "1.2").unwrap();
/// assert_eq!(store.get("c1").unwrap().pfc, "1.2");
/// assert!(store.update_field("c9", CircuitField::Pfc, "1.2").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    records: BTreeMap<String, CircuitTestRecord>,
    batch: bool,
    writes: usize,
}

impl InMemoryRecordStore {
    pub fn new(records: impl IntoIterator<Item = CircuitTestRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.id.clone(), r)).collect(),
            batch: false,
            writes: 0,
        }
    }

    /// Advertise the multi-field mutation
    pub fn with_batch(mut self) -> Self {
        self.batch = true;
        self
    }

    pub fn get(&self, record_id: &str) -> Option<&CircuitTestRecord> {
        self.records.get(record_id)
    }

    /// Snapshot of every record in id order
    pub fn records(&self) -> Vec<CircuitTestRecord> {
        self.records.values().cloned().collect()
    }

    /// Mutations performed so far (a batched patch counts once)
    pub fn write_count(&self) -> usize {
        self.writes
    }

    fn record_mut(&mut self, record_id: &str) -> Result<&mut CircuitTestRecord, StoreError> {
        self.records
            .get_mut(record_id)
            .ok_or_else(|| StoreError::RecordNotFound(record_id.to_string()))
    }
}

impl RecordStore for InMemoryRecordStore {
    fn update_field(
        &mut self,
        record_id: &str,
        field: CircuitField,
        value: &str,
    ) -> Result<(), StoreError> {
        self.record_mut(record_id)?.set(field, value);
        self.writes += 1;
        Ok(())
    }

    fn supports_batch(&self) -> bool {
        self.batch
    }

    fn update_fields(&mut self, record_id: &str, patch: &FieldPatch) -> Result<(), StoreError> {
        if !self.batch {
            return Err(StoreError::BatchUnsupported);
        }
        self.record_mut(record_id)?.apply_patch(patch);
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryRecordStore {
        InMemoryRecordStore::new(vec![
            CircuitTestRecord::new("c1"),
            CircuitTestRecord::new("c2"),
        ])
    }

    #[test]
    fn test_update_field() {
        let mut store = store();
        store
            .update_field("c2", CircuitField::MeasuredZs, "0.42")
            .unwrap();
        assert_eq!(store.get("c2").unwrap().measured_zs, "0.42");
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_unknown_record() {
        let mut store = store();
        assert_eq!(
            store.update_field("zz", CircuitField::Notes, "x"),
            Err(StoreError::RecordNotFound("zz".to_string()))
        );
    }

    #[test]
    fn test_batch_disabled_by_default() {
        let mut store = store();
        assert!(!store.supports_batch());
        let patch = FieldPatch::single(CircuitField::Notes, "x");
        assert_eq!(
            store.update_fields("c1", &patch),
            Err(StoreError::BatchUnsupported)
        );
    }

    #[test]
    fn test_batch_update_counts_once() {
        let mut store = store().with_batch();
        let mut patch = FieldPatch::new();
        patch.set(CircuitField::Pfc, "1.1");
        patch.set(CircuitField::PfcKa, "1.1");
        store.update_fields("c1", &patch).unwrap();

        let record = store.get("c1").unwrap();
        assert_eq!(record.pfc, "1.1");
        assert_eq!(record.pfc_ka, "1.1");
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_update_many_default_fallback() {
        let mut store = store();
        let ids = vec!["c1".to_string(), "c2".to_string()];
        let patch = FieldPatch::single(CircuitField::InsulationTestVoltage, "500V");
        store.update_many(&ids, &patch).unwrap();

        assert!(store
            .records()
            .iter()
            .all(|r| r.insulation_test_voltage == "500V"));
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn test_update_many_reports_records_written() {
        let mut store = store();
        let ids = vec!["c1".to_string(), "zz".to_string(), "c2".to_string()];
        let patch = FieldPatch::single(CircuitField::Notes, "spur");

        let err = store.update_many(&ids, &patch).unwrap_err();
        assert_eq!(err.written, vec!["c1".to_string()]);
        assert_eq!(err.failed_id, "zz");
        assert_eq!(err.source, StoreError::RecordNotFound("zz".to_string()));

        // No rollback, and nothing after the failure
        assert_eq!(store.get("c1").unwrap().notes, "spur");
        assert_eq!(store.get("c2").unwrap().notes, "");
    }
}
