//! Parsers for lookup table sources
//!
//! This module reads the two halves of a table edition:
//! - Impedance CSV: `(standard, curve, rating) -> max Zs` rows
//! - Option set JSON: dropdown values plus edition metadata (uses serde_json)
//!
//! # CSV Format
//!
//! - **Delimiter:** Semicolon (`;`)
//! - **Header Row:** `standard;curve;rating;max_zs_ohms` (extra columns ignored)
//! - **Decimal Separator:** Period or comma
//! - **Comments:** Lines starting with `#` are ignored
//! - **Curve:** Empty for fuse standards
//!
//! # Example
//!
//! ```rust
//! use circuit_test_rules::table_parser::parse_max_zs_csv;
//!
//! let csv = "standard;curve;rating;max_zs_ohms\nBS EN 60898;B;32A;1.37\nBS 88-3;;20A;1,44";
//!
//! let rows = parse_max_zs_csv(csv).unwrap();
//! assert_eq!(rows.len(), 2);
//! assert_eq!(rows[1].0.curve, "");
//! assert_eq!(rows[1].1, 1.44);
//! ```

use csv::ReaderBuilder;

use crate::csv_utils::{get_field, require_columns};
use crate::error::TableError;
use crate::lookup_tables::{DeviceKey, OptionSets};
use crate::measurements::parse_decimal;

const REQUIRED_COLUMNS: [&str; 4] = ["standard", "curve", "rating", "max_zs_ohms"];

// ============================================================================
// Impedance CSV Parser
// ============================================================================

/// Parse the impedance CSV into canonical keys and values
///
/// # Arguments
///
/// * `csv_content` - Raw CSV text
///
/// # Returns
///
/// * `Ok(Vec<(DeviceKey, f64)>)` - Rows in file order
/// * `Err(TableError)` - Empty source, missing column, bad rating or impedance
pub fn parse_max_zs_csv(csv_content: &str) -> Result<Vec<(DeviceKey, f64)>, TableError> {
    if csv_content.trim().is_empty() {
        return Err(TableError::Empty);
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(false) // Strict column count
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(csv_content.as_bytes());

    // Clone so the reader can be borrowed mutably while iterating records
    let headers = reader
        .headers()
        .map_err(|e| TableError::CsvFormat(format!("Failed to read CSV headers: {}", e)))?
        .clone();

    require_columns(&headers, &REQUIRED_COLUMNS)?;

    let mut rows = Vec::new();

    for result in reader.records() {
        let record =
            result.map_err(|e| TableError::CsvFormat(format!("CSV parse error: {}", e)))?;

        let standard = get_field(&record, &headers, "standard")?;
        let curve = get_field(&record, &headers, "curve")?;
        let rating = get_field(&record, &headers, "rating")?;
        let ohms_raw = get_field(&record, &headers, "max_zs_ohms")?;

        if standard.is_empty() {
            return Err(TableError::CsvFormat(format!(
                "Empty standard on line {}",
                record.position().map(|p| p.line()).unwrap_or(0)
            )));
        }

        let key = DeviceKey::new(standard, curve, rating)
            .ok_or_else(|| TableError::InvalidRating(rating.to_string()))?;

        let ohms = parse_decimal(ohms_raw)
            .ok()
            .filter(|v| *v > 0.0)
            .ok_or_else(|| TableError::InvalidImpedance(ohms_raw.to_string()))?;

        rows.push((key, ohms));
    }

    Ok(rows)
}

// ============================================================================
// Option Set JSON Parser
// ============================================================================

/// Parse the option set document
///
/// # Returns
///
/// * `Ok(OptionSets)` - Parsed option sets
/// * `Err(TableError::Empty)` - Blank document
/// * `Err(TableError::InvalidJson)` - Malformed JSON, missing keys, bad date
///
/// # Example
///
/// ```
/// # use circuit_test_rules::table_parser::parse_option_sets;
/// let json = r#"{
///     "version": {"edition": "BS 7671:2018+A2:2022", "effective_from": "2022-03-28"},
///     "standards": [{"code": "BS 88-3", "label": "Fuse", "family": "fuse"}],
///     "curves": []
/// }"#;
///
/// let options = parse_option_sets(json).unwrap();
/// assert_eq!(options.standards.len(), 1);
/// assert!(options.test_voltages.is_empty());
/// ```
pub fn parse_option_sets(json_content: &str) -> Result<OptionSets, TableError> {
    if json_content.trim().is_empty() {
        return Err(TableError::Empty);
    }

    let options: OptionSets = serde_json::from_str(json_content)
        .map_err(|e| TableError::InvalidJson(format!("Failed to parse option sets: {}", e)))?;

    if options.standards.is_empty() {
        return Err(TableError::InvalidJson(
            "Option sets declare no standards".to_string(),
        ));
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup_tables::DeviceFamily;

    #[test]
    fn test_parse_csv_valid() {
        let csv = r#"standard;curve;rating;max_zs_ohms
BS EN 60898;B;6A;7.28
BS EN 60898;c;16;1.37
BS 3036;;15A;2.43"#;

        let rows = parse_max_zs_csv(csv).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].0, DeviceKey::new("BS EN 60898", "B", "6A").unwrap());
        assert_eq!(rows[1].0.curve, "C");
        assert_eq!(rows[1].0.rating, "16A");
        assert_eq!(rows[2].1, 2.43);
    }

    #[test]
    fn test_parse_csv_with_comments_and_extra_column() {
        let csv = r#"standard;curve;rating;max_zs_ohms;source
# Table 41.3, 0.4 s
BS EN 60898;B;32A;1.37;41.3"#;

        let rows = parse_max_zs_csv(csv).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_parse_csv_empty() {
        assert_eq!(parse_max_zs_csv("").unwrap_err(), TableError::Empty);
        assert_eq!(parse_max_zs_csv("  \n ").unwrap_err(), TableError::Empty);
    }

    #[test]
    fn test_parse_csv_missing_column() {
        let csv = "standard;curve;rating\nBS 88-3;;20A";
        assert_eq!(
            parse_max_zs_csv(csv).unwrap_err(),
            TableError::MissingColumn("max_zs_ohms".to_string())
        );
    }

    #[test]
    fn test_parse_csv_invalid_impedance() {
        let csv = "standard;curve;rating;max_zs_ohms\nBS 88-3;;20A;abc";
        assert_eq!(
            parse_max_zs_csv(csv).unwrap_err(),
            TableError::InvalidImpedance("abc".to_string())
        );

        let csv = "standard;curve;rating;max_zs_ohms\nBS 88-3;;20A;-1.0";
        assert!(matches!(
            parse_max_zs_csv(csv),
            Err(TableError::InvalidImpedance(_))
        ));
    }

    #[test]
    fn test_parse_csv_invalid_rating() {
        let csv = "standard;curve;rating;max_zs_ohms\nBS 88-3;;twenty;1.44";
        assert_eq!(
            parse_max_zs_csv(csv).unwrap_err(),
            TableError::InvalidRating("twenty".to_string())
        );
    }

    #[test]
    fn test_parse_csv_wrong_column_count() {
        let csv = "standard;curve;rating;max_zs_ohms\nBS 88-3;;20A";
        assert!(matches!(parse_max_zs_csv(csv), Err(TableError::CsvFormat(_))));
    }

    #[test]
    fn test_parse_option_sets_families() {
        let json = r#"{
            "version": {"edition": "E", "effective_from": "2022-03-28"},
            "standards": [
                {"code": "BS EN 61009", "label": "RCBO", "family": "circuit_breaker"},
                {"code": "BS 1362", "label": "Plug fuse", "family": "fuse"}
            ],
            "curves": ["B"],
            "test_voltages": ["500V"]
        }"#;

        let options = parse_option_sets(json).unwrap();
        assert_eq!(options.standards[0].family, DeviceFamily::CircuitBreaker);
        assert_eq!(options.standards[1].family, DeviceFamily::Fuse);
        assert_eq!(options.test_voltages, vec!["500V".to_string()]);
    }

    #[test]
    fn test_parse_option_sets_errors() {
        assert_eq!(parse_option_sets("").unwrap_err(), TableError::Empty);
        assert!(matches!(
            parse_option_sets("{not json"),
            Err(TableError::InvalidJson(_))
        ));

        let bad_date = r#"{"version": {"edition": "E", "effective_from": "28.03.2022"},
            "standards": [{"code": "X", "label": "X", "family": "fuse"}], "curves": []}"#;
        assert!(matches!(
            parse_option_sets(bad_date),
            Err(TableError::InvalidJson(_))
        ));

        let no_standards = r#"{"version": {"edition": "E", "effective_from": "2022-03-28"},
            "standards": [], "curves": []}"#;
        assert!(matches!(
            parse_option_sets(no_standards),
            Err(TableError::InvalidJson(_))
        ));
    }
}
