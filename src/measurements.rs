//! Parsing of raw technician input
//!
//! Converts the free-text cells of the test schedule into typed values.
//!
//! # Transformations
//!
//! 1. **Decimal conversion**: `"1,15"` or `"1.15"` → `1.15`
//! 2. **Measurement reading**: `"0.35Ω"`, `">200"`, `"N/A"`, `""` → [`MeasuredValue`]
//! 3. **Rating normalization**: `"32"`, `"32 a"` → `"32A"`
//! 4. **Curve normalization**: `"type b"` → `"B"`
//! 5. **Test voltage**: `"500V"` → `500`
//! 6. **Outcome symbols**: `"✓"` / `"✗"` / `"N/A"` → [`Outcome`]
//!
//! # Example
//!
//! ```rust
//! use circuit_test_rules::measurements::*;
//!
//! assert_eq!(parse_decimal("1,15").unwrap(), 1.15);
//! assert_eq!(normalize_rating("32").as_deref(), Some("32A"));
//! assert_eq!(parse_outcome("✓").unwrap(), Some(Outcome::Affirmative));
//! ```

use crate::error::MeasurementError;

/// Unit suffixes accepted after a number, lowercase, longest first
const UNIT_SUFFIXES: [&str; 17] = [
    "megohms", "megohm", "mohms", "mohm", "ohms", "mm²", "mm2", "mω", "ohm", "mm", "ω", "ka", "ma",
    "ms", "v", "a", "s",
];

/// Tokens meaning "not applicable", lowercase
const NOT_APPLICABLE: [&str; 5] = ["n/a", "na", "n.a.", "n/a.", "-"];

const AFFIRMATIVE: [&str; 9] = ["✓", "✔", "✅", "pass", "ok", "yes", "y", "correct", "satisfactory"];

const NEGATIVE: [&str; 9] = ["✗", "✘", "❌", "x", "fail", "no", "n", "incorrect", "unsatisfactory"];

/// How a reading relates to the instrument's range
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadingBound {
    /// Plain value
    Exact,
    /// Instrument over-range, e.g. ">200" MΩ
    Above,
    /// Instrument under-range, e.g. "<0.01" Ω
    Below,
}

/// Numeric reading from one cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub bound: ReadingBound,
}

/// Interpretation of a measured-value cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeasuredValue {
    /// Nothing entered yet
    Empty,
    /// Technician marked the test as not applicable
    NotApplicable,
    Reading(Reading),
}

impl MeasuredValue {
    /// Numeric value, if this is a reading
    pub fn value(&self) -> Option<f64> {
        match self {
            MeasuredValue::Reading(r) => Some(r.value),
            _ => None,
        }
    }
}

/// Result of an enumerated test (polarity, functional test, test button)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Affirmative,
    Negative,
    NotApplicable,
}

// ============================================================================
// Transformation 1: Decimal Conversion
// ============================================================================

/// Parse a decimal with either `.` or `,` as separator
///
/// # Arguments
///
/// * `value` - Decimal text, e.g. "1,15"
///
/// # Returns
///
/// * `Ok(f64)` - Parsed finite value
/// * `Err(MeasurementError::NotANumber)` - If value is empty, not numeric or not finite
///
/// # Examples
///
/// ```
/// # use circuit_test_rules::measurements::parse_decimal;
/// assert_eq!(parse_decimal("1,15").unwrap(), 1.15);
/// assert_eq!(parse_decimal("0.35").unwrap(), 0.35);
/// assert!(parse_decimal("").is_err());
/// assert!(parse_decimal("abc").is_err());
/// assert!(parse_decimal("inf").is_err());
/// ```
pub fn parse_decimal(value: &str) -> Result<f64, MeasurementError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(MeasurementError::NotANumber(value.to_string()));
    }

    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| MeasurementError::NotANumber(value.to_string()))
}

/// True for the "not applicable" tokens (`N/A`, `NA`, `-`, ...)
pub fn is_not_applicable(value: &str) -> bool {
    let lower = value.trim().to_lowercase();
    NOT_APPLICABLE.contains(&lower.as_str())
}

// ============================================================================
// Transformation 2: Measurement Reading
// ============================================================================

/// Parse a measured-value cell
///
/// Accepts an optional `>`/`<` range prefix and one unit suffix (Ω, MΩ, ohm,
/// kA, mA, ms, V, A, mm²). Readings are magnitudes, so negative values are input
/// errors.
///
/// # Returns
///
/// * `Ok(MeasuredValue::Empty)` - For blank cells
/// * `Ok(MeasuredValue::NotApplicable)` - For "N/A" and variants
/// * `Ok(MeasuredValue::Reading(_))` - For valid non-negative readings
/// * `Err(MeasurementError)` - For malformed or negative text
///
/// # Examples
///
/// ```
/// # use circuit_test_rules::measurements::{parse_measurement, MeasuredValue, ReadingBound};
/// assert_eq!(parse_measurement("").unwrap(), MeasuredValue::Empty);
/// assert_eq!(parse_measurement("N/A").unwrap(), MeasuredValue::NotApplicable);
/// assert_eq!(parse_measurement("0.35Ω").unwrap().value(), Some(0.35));
/// assert_eq!(parse_measurement("1,15 ohms").unwrap().value(), Some(1.15));
///
/// match parse_measurement(">200").unwrap() {
///     MeasuredValue::Reading(r) => assert_eq!(r.bound, ReadingBound::Above),
///     _ => unreachable!(),
/// }
///
/// assert!(parse_measurement("abc").is_err());
/// assert!(parse_measurement("-0.5").is_err());
/// ```
pub fn parse_measurement(raw: &str) -> Result<MeasuredValue, MeasurementError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(MeasuredValue::Empty);
    }
    if is_not_applicable(trimmed) {
        return Ok(MeasuredValue::NotApplicable);
    }

    let lower = trimmed.to_lowercase();
    let (bound, rest) = if let Some(rest) = lower.strip_prefix('>') {
        (ReadingBound::Above, rest)
    } else if let Some(rest) = lower.strip_prefix('<') {
        (ReadingBound::Below, rest)
    } else {
        (ReadingBound::Exact, lower.as_str())
    };

    let number = strip_unit(rest.trim());
    let value = parse_decimal(number).map_err(|_| MeasurementError::NotANumber(raw.to_string()))?;

    if value < 0.0 {
        return Err(MeasurementError::Negative(raw.to_string()));
    }

    Ok(MeasuredValue::Reading(Reading { value, bound }))
}

/// Strip one trailing unit suffix from lowercase text
fn strip_unit(lower: &str) -> &str {
    for unit in UNIT_SUFFIXES {
        if let Some(number) = lower.strip_suffix(unit) {
            return number.trim_end();
        }
    }
    lower
}

// ============================================================================
// Transformation 3: Rating Normalization
// ============================================================================

/// Canonical ampere rating used as a lookup key
///
/// # Returns
///
/// * `Some(String)` - e.g. "32A"
/// * `None` - Empty or non-numeric input
///
/// # Examples
///
/// ```
/// # use circuit_test_rules::measurements::normalize_rating;
/// assert_eq!(normalize_rating("32A").as_deref(), Some("32A"));
/// assert_eq!(normalize_rating(" 32 a ").as_deref(), Some("32A"));
/// assert_eq!(normalize_rating("32").as_deref(), Some("32A"));
/// assert_eq!(normalize_rating("0,5A").as_deref(), Some("0.5A"));
/// assert_eq!(normalize_rating(""), None);
/// assert_eq!(normalize_rating("big"), None);
/// ```
pub fn normalize_rating(raw: &str) -> Option<String> {
    let lower = raw.trim().to_lowercase();
    let number = lower.strip_suffix('a').unwrap_or(&lower).trim_end();
    let value = parse_decimal(number).ok().filter(|v| *v > 0.0)?;

    if value.fract() == 0.0 {
        Some(format!("{}A", value as u64))
    } else {
        Some(format!("{}A", value))
    }
}

// ============================================================================
// Transformation 4: Curve Normalization
// ============================================================================

/// Canonical trip curve letter
///
/// # Examples
///
/// ```
/// # use circuit_test_rules::measurements::normalize_curve;
/// assert_eq!(normalize_curve("b"), "B");
/// assert_eq!(normalize_curve("Type C"), "C");
/// assert_eq!(normalize_curve("  "), "");
/// ```
pub fn normalize_curve(raw: &str) -> String {
    let trimmed = raw.trim();
    let letter = match trimmed.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("type") => &trimmed[4..],
        _ => trimmed,
    };
    letter.trim().to_uppercase()
}

// ============================================================================
// Transformation 5: Test Voltage
// ============================================================================

/// Parse an insulation test voltage
///
/// # Returns
///
/// * `Ok(None)` - Blank cell
/// * `Ok(Some(volts))` - e.g. 500 for "500V"
/// * `Err(MeasurementError::NotANumber)` - Not a whole number of volts
///
/// # Examples
///
/// ```
/// # use circuit_test_rules::measurements::parse_test_voltage;
/// assert_eq!(parse_test_voltage("500V").unwrap(), Some(500));
/// assert_eq!(parse_test_voltage("250 v").unwrap(), Some(250));
/// assert_eq!(parse_test_voltage("").unwrap(), None);
/// assert!(parse_test_voltage("lots").is_err());
/// ```
pub fn parse_test_voltage(raw: &str) -> Result<Option<u32>, MeasurementError> {
    match parse_measurement(raw)? {
        MeasuredValue::Empty | MeasuredValue::NotApplicable => Ok(None),
        MeasuredValue::Reading(r) if r.value.fract() == 0.0 && r.value <= u32::MAX as f64 => {
            Ok(Some(r.value as u32))
        }
        MeasuredValue::Reading(_) => Err(MeasurementError::NotANumber(raw.to_string())),
    }
}

// ============================================================================
// Transformation 6: Outcome Symbols
// ============================================================================

/// Parse an enumerated test result
///
/// # Returns
///
/// * `Ok(None)` - Blank cell
/// * `Ok(Some(Outcome))` - Recognised symbol or word
/// * `Err(MeasurementError::UnknownOutcome)` - Anything else
///
/// # Examples
///
/// ```
/// # use circuit_test_rules::measurements::{parse_outcome, Outcome};
/// assert_eq!(parse_outcome("✓").unwrap(), Some(Outcome::Affirmative));
/// assert_eq!(parse_outcome("Pass").unwrap(), Some(Outcome::Affirmative));
/// assert_eq!(parse_outcome("✗").unwrap(), Some(Outcome::Negative));
/// assert_eq!(parse_outcome("n/a").unwrap(), Some(Outcome::NotApplicable));
/// assert_eq!(parse_outcome("").unwrap(), None);
/// assert!(parse_outcome("maybe").is_err());
/// ```
pub fn parse_outcome(raw: &str) -> Result<Option<Outcome>, MeasurementError> {
    let lower = raw.trim().to_lowercase();
    if lower.is_empty() {
        return Ok(None);
    }
    if is_not_applicable(&lower) {
        return Ok(Some(Outcome::NotApplicable));
    }
    if AFFIRMATIVE.contains(&lower.as_str()) {
        return Ok(Some(Outcome::Affirmative));
    }
    if NEGATIVE.contains(&lower.as_str()) {
        return Ok(Some(Outcome::Negative));
    }
    Err(MeasurementError::UnknownOutcome(raw.to_string()))
}

/// Parse a whole-number count (e.g. points served)
///
/// # Examples
///
/// ```
/// # use circuit_test_rules::measurements::parse_count;
/// assert_eq!(parse_count("12").unwrap(), Some(12));
/// assert_eq!(parse_count(" ").unwrap(), None);
/// assert!(parse_count("1.5").is_err());
/// assert!(parse_count("-3").is_err());
/// ```
pub fn parse_count(raw: &str) -> Result<Option<u32>, MeasurementError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| MeasurementError::NotACount(raw.to_string()))
}
