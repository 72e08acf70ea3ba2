//! Error types for circuit test rules
//!
//! Provides error handling for the failure modes that are genuine software faults:
//! - Lookup table loading errors (CSV/JSON format, inconsistent table rows)
//! - Record store errors (unknown record, rejected or failed writes)
//! - Configuration errors (malformed host options)
//!
//! A failing measurement is domain data, not an error: it is reported as a
//! [`Verdict`](crate::Verdict). [`MeasurementError`] only exists to carry the
//! text of an input-error verdict.

use std::fmt;

use crate::propagation::PropagationReport;
use crate::types::CircuitField;

/// Top-level error type for circuit test rules
///
/// Supports automatic conversion from specific error types via From trait
#[derive(Debug)]
pub enum CircuitTestError {
    /// Lookup table loading error
    Table(TableError),

    /// Record store error
    Store(StoreError),

    /// Configuration error
    Config(ConfigError),

    /// Edit refused before planning
    Edit(EditRejected),

    /// Patch only partially applied
    Commit(CommitError),

    /// Bulk propagation refused
    Propagation(PropagationError),

    /// Generic error with message
    Generic(String),
}

impl fmt::Display for CircuitTestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitTestError::Table(e) => write!(f, "Lookup table error: {}", e),
            CircuitTestError::Store(e) => write!(f, "Record store error: {}", e),
            CircuitTestError::Config(e) => write!(f, "Configuration error: {}", e),
            CircuitTestError::Edit(e) => write!(f, "Edit rejected: {}", e),
            CircuitTestError::Commit(e) => write!(f, "Commit error: {}", e),
            CircuitTestError::Propagation(e) => write!(f, "Propagation error: {}", e),
            CircuitTestError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CircuitTestError {}

impl From<TableError> for CircuitTestError {
    fn from(err: TableError) -> Self {
        CircuitTestError::Table(err)
    }
}

impl From<StoreError> for CircuitTestError {
    fn from(err: StoreError) -> Self {
        CircuitTestError::Store(err)
    }
}

impl From<ConfigError> for CircuitTestError {
    fn from(err: ConfigError) -> Self {
        CircuitTestError::Config(err)
    }
}

impl From<EditRejected> for CircuitTestError {
    fn from(err: EditRejected) -> Self {
        CircuitTestError::Edit(err)
    }
}

impl From<CommitError> for CircuitTestError {
    fn from(err: CommitError) -> Self {
        CircuitTestError::Commit(err)
    }
}

impl From<PropagationError> for CircuitTestError {
    fn from(err: PropagationError) -> Self {
        CircuitTestError::Propagation(err)
    }
}

impl From<String> for CircuitTestError {
    fn from(msg: String) -> Self {
        CircuitTestError::Generic(msg)
    }
}

impl From<&str> for CircuitTestError {
    fn from(msg: &str) -> Self {
        CircuitTestError::Generic(msg.to_string())
    }
}

/// Lookup table loading errors
///
/// Occurs while parsing and cross-checking the impedance CSV against the
/// option set JSON of one table edition
#[derive(Debug, Clone, PartialEq)]
pub enum TableError {
    /// Required CSV column is missing
    ///
    /// Example: Missing "max_zs_ohms" column
    MissingColumn(String),

    /// Impedance cell is not a positive number
    ///
    /// Example: "0", "-1.2", "1,3x"
    InvalidImpedance(String),

    /// Row references a standard not declared in the option sets
    UnknownStandard(String),

    /// Curve column disagrees with the standard's device family
    ///
    /// Example: curve "B" on a fuse standard, or no curve on a breaker standard
    InconsistentCurve { standard: String, curve: String },

    /// Same (standard, curve, rating) key appears twice
    DuplicateEntry(String),

    /// Rating cell cannot be read as an ampere rating
    InvalidRating(String),

    /// CSV format error (wrong delimiter, malformed row)
    CsvFormat(String),

    /// Option set document is not valid JSON or misses required keys
    InvalidJson(String),

    /// Table source is empty
    Empty,
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::MissingColumn(col) => {
                write!(f, "Missing required column: '{}'", col)
            }
            TableError::InvalidImpedance(val) => {
                write!(
                    f,
                    "Invalid impedance: '{}' (expected a positive number of ohms)",
                    val
                )
            }
            TableError::UnknownStandard(code) => {
                write!(f, "Unknown device standard: '{}' (not in option sets)", code)
            }
            TableError::InconsistentCurve { standard, curve } => {
                write!(
                    f,
                    "Curve '{}' is inconsistent with standard '{}'",
                    curve, standard
                )
            }
            TableError::DuplicateEntry(key) => {
                write!(f, "Duplicate table entry: {}", key)
            }
            TableError::InvalidRating(val) => {
                write!(f, "Invalid rating: '{}' (expected e.g. '32A')", val)
            }
            TableError::CsvFormat(msg) => {
                write!(f, "CSV format error: {}", msg)
            }
            TableError::InvalidJson(msg) => {
                write!(f, "Invalid option set document: {}", msg)
            }
            TableError::Empty => {
                write!(f, "Table source is empty")
            }
        }
    }
}

impl std::error::Error for TableError {}

/// Record store errors
///
/// Raised by [`RecordStore`](crate::store::RecordStore) implementations
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No record with this id
    RecordNotFound(String),

    /// Store refused the write (e.g. permission, locked row)
    Rejected { field: CircuitField, reason: String },

    /// Store has no multi-field mutation
    BatchUnsupported,

    /// Backend failure (network, persistence layer)
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::RecordNotFound(id) => write!(f, "Record not found: '{}'", id),
            StoreError::Rejected { field, reason } => {
                write!(f, "Write to '{}' rejected: {}", field.key(), reason)
            }
            StoreError::BatchUnsupported => {
                write!(f, "Store does not support batched updates")
            }
            StoreError::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Multi-record write that stopped part way
///
/// Records in `written` hold the patch; `failed_id` and everything after it
/// were not written.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkWriteError {
    pub written: Vec<String>,
    pub failed_id: String,
    pub source: StoreError,
}

impl fmt::Display for BulkWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bulk write stopped at record '{}' after {} records ({})",
            self.failed_id,
            self.written.len(),
            self.source
        )
    }
}

impl std::error::Error for BulkWriteError {}

/// Partially applied patch on the sequential commit path
///
/// Keys in `applied` stay written; there is no rollback.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitError {
    pub record_id: String,
    pub applied: Vec<CircuitField>,
    pub skipped: Vec<CircuitField>,
    pub failed_field: CircuitField,
    pub source: StoreError,
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "record '{}': write to '{}' failed after {} of {} fields ({})",
            self.record_id,
            self.failed_field.key(),
            self.applied.len(),
            self.applied.len() + self.skipped.len() + 1,
            self.source
        )
    }
}

impl std::error::Error for CommitError {}

/// Edit refused by the cascading update controller
#[derive(Debug, Clone, PartialEq)]
pub enum EditRejected {
    /// Field is inherited from the source circuit of a derived record
    InheritedField {
        record_id: String,
        field: CircuitField,
    },
}

impl fmt::Display for EditRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditRejected::InheritedField { record_id, field } => write!(
                f,
                "'{}' of record '{}' is inherited from its source circuit",
                field.key(),
                record_id
            ),
        }
    }
}

impl std::error::Error for EditRejected {}

/// Configuration errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Option present but its value cannot be parsed
    InvalidOption { key: String, value: String },

    /// JSON document could not be deserialized
    InvalidJson(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidOption { key, value } => {
                write!(f, "Invalid value for option '{}': '{}'", key, value)
            }
            ConfigError::InvalidJson(msg) => write!(f, "Invalid config JSON: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Bulk propagation refused, or stopped by a store failure
#[derive(Debug, Clone, PartialEq)]
pub enum PropagationError {
    /// Source record id unknown
    SourceNotFound(String),

    /// Source value carries a fail verdict
    SourceFailsValidation { field: CircuitField, message: String },

    /// Field cannot be bulk-filled (identity fields)
    FieldNotPropagatable(CircuitField),

    /// Store failed part way; `report.updated` lists targets already written
    Partial {
        report: PropagationReport,
        failed_id: String,
        source: StoreError,
    },
}

impl fmt::Display for PropagationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropagationError::SourceNotFound(id) => {
                write!(f, "Source record not found: '{}'", id)
            }
            PropagationError::SourceFailsValidation { field, message } => {
                write!(f, "Source value of '{}' fails validation: {}", field.key(), message)
            }
            PropagationError::FieldNotPropagatable(field) => {
                write!(f, "Field '{}' cannot be bulk-filled", field.key())
            }
            PropagationError::Partial {
                report,
                failed_id,
                source,
            } => write!(
                f,
                "Propagation stopped at record '{}' after {} updates: {}",
                failed_id,
                report.updated.len(),
                source
            ),
        }
    }
}

impl std::error::Error for PropagationError {}


/// Measurement input errors
///
/// Never crosses the module boundary as an `Err`: the validator turns it into
/// a fail verdict whose message is this Display text.
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementError {
    /// Text is not a number
    ///
    /// Example: "abc", "1.2.3"
    NotANumber(String),

    /// Negative reading where only magnitudes make sense
    Negative(String),

    /// Text is not a recognised outcome symbol
    UnknownOutcome(String),

    /// Text is not a whole count
    NotACount(String),
}

impl fmt::Display for MeasurementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementError::NotANumber(val) => write!(f, "Not a number: '{}'", val),
            MeasurementError::Negative(val) => {
                write!(f, "Negative reading not allowed: '{}'", val)
            }
            MeasurementError::UnknownOutcome(val) => {
                write!(f, "Unrecognised result: '{}' (expected ✓, ✗ or N/A)", val)
            }
            MeasurementError::NotACount(val) => {
                write!(f, "Not a whole number: '{}'", val)
            }
        }
    }
}

impl std::error::Error for MeasurementError {}
