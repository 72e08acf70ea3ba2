//! Circuit Test Rules - BS 7671 circuit test validation and device coordination
//!
//! Rules engine behind an electrical installation test schedule. Each circuit
//! row carries its protective device and the readings taken on site; this
//! crate judges those readings and keeps the dependent fields consistent.
//!
//! # Features
//! - Embedded BS 7671 maximum earth fault loop impedance tables and option sets
//! - Device coordination: (standard, curve, rating) → maximum Zs
//! - Per-field validation with pass / warning / fail verdicts
//! - Record level aggregation including insulation pairs and ring continuity
//! - Cascading device edits committed through an external record store
//! - Bulk propagation of one field across sibling circuits
//!
//! # Architecture
//! - [`lookup_tables`] and [`table_parser`] load the reference data
//! - [`resolver`] answers device lookups against a loaded edition
//! - [`field_validator`] and [`aggregator`] produce verdicts
//! - [`cascade`] and [`propagation`] turn edits into store writes via [`store::RecordStore`]
//!
//! # Example
//!
//! ```
//! use circuit_test_rules::cascade::plan_edit;
//! use circuit_test_rules::{CircuitField, CircuitTestRecord, LookupTables};
//!
//! let tables = LookupTables::bs7671().unwrap();
//! let mut record = CircuitTestRecord::new("c1");
//! record.bs_standard = "BS 88-3".to_string();
//!
//! let patch = plan_edit(&tables, &record, CircuitField::ProtectiveDeviceRating, "20A").unwrap();
//! assert_eq!(patch.get(CircuitField::MaxZs), Some("1.44"));
//! ```

pub mod aggregator;
pub mod cascade;
pub mod config;
pub mod csv_utils;
mod error;
pub mod field_validator;
pub mod lookup_tables;
pub mod measurements;
pub mod propagation;
pub mod resolver;
pub mod store;
pub mod table_parser;
mod types;
pub mod types_verdict;

// Re-export public types for easier access
pub use cascade::CommitReport;
pub use config::ValidationConfig;
pub use error::{
    BulkWriteError, CircuitTestError, CommitError, ConfigError, EditRejected, MeasurementError,
    PropagationError, StoreError, TableError,
};
pub use lookup_tables::{DeviceKey, LookupTables};
pub use propagation::PropagationReport;
pub use store::{InMemoryRecordStore, RecordStore};
pub use types::{inherited_patch, CircuitField, CircuitTestRecord, FieldPatch, UnknownField};
pub use types_verdict::{Verdict, VerdictCode, VerdictLevel, VerdictMap};
