//! Shared CSV utilities for lookup table parsers
//!
//! Column lookup by header name and header validation for the
//! semicolon-delimited table sources.

use crate::error::TableError;

/// Helper to get field value by column name from CSV record
///
/// # Arguments
///
/// * `record` - CSV record (row)
/// * `headers` - CSV header row
/// * `field_name` - Column name to look up
///
/// # Returns
///
/// * `Ok(&str)` - Field value
/// * `Err(TableError::MissingColumn)` - Column not found
///
/// # Example
///
/// ```rust
/// use csv::StringRecord;
/// use circuit_test_rules::csv_utils::get_field;
///
/// let headers = StringRecord::from(vec!["standard", "curve", "rating"]);
/// let record = StringRecord::from(vec!["BS EN 60898", "B", "32A"]);
///
/// let rating = get_field(&record, &headers, "rating").unwrap();
/// assert_eq!(rating, "32A");
/// ```
pub fn get_field<'a>(
    record: &'a csv::StringRecord,
    headers: &csv::StringRecord,
    field_name: &str,
) -> Result<&'a str, TableError> {
    let idx = headers
        .iter()
        .position(|h| h == field_name)
        .ok_or_else(|| TableError::MissingColumn(field_name.to_string()))?;

    record
        .get(idx)
        .ok_or_else(|| TableError::MissingColumn(field_name.to_string()))
}

/// Validate that the header row has all required columns
///
/// Extra columns are allowed (forward compatibility).
pub fn require_columns(headers: &csv::StringRecord, required: &[&str]) -> Result<(), TableError> {
    for col in required {
        if !headers.iter().any(|h| h == *col) {
            return Err(TableError::MissingColumn(col.to_string()));
        }
    }

    Ok(())
}
