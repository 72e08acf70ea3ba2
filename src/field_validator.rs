//! Field validator
//!
//! Judges one raw cell value against fixed or resolver-supplied limits and
//! returns a tiered [`Verdict`]. Never panics and never returns an error:
//! unreadable input is itself a `fail` verdict.
//!
//! # Outcomes
//!
//! | Input | Level | Code |
//! |---|---|---|
//! | Empty / N/A | pass | - |
//! | Unreadable text | fail | `invalid_input` |
//! | Beyond a limit | fail | `out_of_range` |
//! | Inside the warning margin | warning | `near_limit` |
//! | Limit unknown | warning | `reference_missing` |
//!
//! # Example
//!
//! ```rust
//! use circuit_test_rules::config::ValidationConfig;
//! use circuit_test_rules::field_validator::{validate, FieldKind, ValidationContext};
//! use circuit_test_rules::VerdictLevel;
//!
//! let config = ValidationConfig::default();
//! let ctx = ValidationContext::default().with_max_zs(1.37);
//!
//! assert_eq!(validate(FieldKind::EarthFaultLoopImpedance, "0.45", &ctx, &config).level, VerdictLevel::Pass);
//! assert_eq!(validate(FieldKind::EarthFaultLoopImpedance, "1.25", &ctx, &config).level, VerdictLevel::Warning);
//! assert_eq!(validate(FieldKind::EarthFaultLoopImpedance, "1.50", &ctx, &config).level, VerdictLevel::Fail);
//! ```

use crate::config::ValidationConfig;
use crate::lookup_tables::LookupTables;
use crate::measurements::{
    parse_count, parse_measurement, parse_outcome, parse_test_voltage, MeasuredValue, Outcome,
    Reading, ReadingBound,
};
use crate::resolver::resolve_for_record;
use crate::types::{CircuitField, CircuitTestRecord};
use crate::types_verdict::{Verdict, VerdictCode};

/// Slack for comparing readings typed to two decimals
const EPSILON: f64 = 1e-9;

/// Rule set applied to a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Measured Zs (Ω) against the device's max Zs
    EarthFaultLoopImpedance,
    /// R1+R2 (Ω) against the device's max Zs
    ContinuityR1R2,
    /// Plain resistance reading (Ω), e.g. ring legs
    Resistance,
    /// PFC (kA) against the device's breaking capacity
    ProspectiveFaultCurrent,
    /// RCD trip time at 1x IΔn (ms)
    RcdDisconnectionTime,
    /// Insulation resistance (MΩ) against the floor for the test voltage
    InsulationResistance,
    InsulationTestVoltage,
    /// ✓ / ✗ / N/A tests
    Outcome,
    PointsServed,
    /// Derived or typed max Zs (Ω)
    MaxImpedance,
}

impl FieldKind {
    /// Rule set for a record field, `None` for unvalidated fields
    pub fn for_field(field: CircuitField) -> Option<FieldKind> {
        let kind = match field {
            CircuitField::MeasuredZs => FieldKind::EarthFaultLoopImpedance,
            CircuitField::R1R2 => FieldKind::ContinuityR1R2,
            CircuitField::R2 | CircuitField::RingR1 | CircuitField::RingRn | CircuitField::RingR2 => {
                FieldKind::Resistance
            }
            CircuitField::Pfc | CircuitField::PfcKa => FieldKind::ProspectiveFaultCurrent,
            CircuitField::RcdOneX => FieldKind::RcdDisconnectionTime,
            CircuitField::InsulationLiveLive | CircuitField::InsulationLiveEarth => {
                FieldKind::InsulationResistance
            }
            CircuitField::InsulationTestVoltage => FieldKind::InsulationTestVoltage,
            CircuitField::Polarity
            | CircuitField::RcdTestButton
            | CircuitField::FunctionalTesting
            | CircuitField::AfddTest => FieldKind::Outcome,
            CircuitField::PointsServed => FieldKind::PointsServed,
            CircuitField::MaxZs => FieldKind::MaxImpedance,
            _ => return None,
        };
        Some(kind)
    }
}

/// What a rule needs beyond the raw string
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationContext {
    /// Maximum permitted earth fault loop impedance (Ω)
    pub max_zs: Option<f64>,

    /// Device breaking capacity (kA)
    pub breaking_capacity_ka: Option<f64>,

    /// Declared RCD type, e.g. "A", "S"; empty when none
    pub rcd_type: String,

    /// Declared residual operating current (mA)
    pub rcd_rating_ma: Option<f64>,

    /// Insulation test voltage (V); the configured default applies when `None`
    pub test_voltage: Option<u32>,
}

impl ValidationContext {
    /// Context for one record
    ///
    /// Max Zs is the stored `maxZs` when it reads as a positive number,
    /// otherwise it is resolved from the record's device fields.
    pub fn for_record(record: &CircuitTestRecord, tables: &LookupTables) -> Self {
        let max_zs = positive(&record.max_zs).or_else(|| resolve_for_record(tables, record));

        Self {
            max_zs,
            breaking_capacity_ka: positive(&record.protective_device_ka_rating),
            rcd_type: record.rcd_type.trim().to_uppercase(),
            rcd_rating_ma: positive(&record.rcd_rating_ma),
            test_voltage: parse_test_voltage(&record.insulation_test_voltage)
                .ok()
                .flatten(),
        }
    }

    pub fn with_max_zs(mut self, ohms: f64) -> Self {
        self.max_zs = Some(ohms);
        self
    }

    pub fn with_breaking_capacity(mut self, ka: f64) -> Self {
        self.breaking_capacity_ka = Some(ka);
        self
    }

    pub fn with_rcd(mut self, rcd_type: &str, rating_ma: f64) -> Self {
        self.rcd_type = rcd_type.trim().to_uppercase();
        self.rcd_rating_ma = Some(rating_ma);
        self
    }

    pub fn with_test_voltage(mut self, volts: u32) -> Self {
        self.test_voltage = Some(volts);
        self
    }

    fn has_rcd(&self) -> bool {
        !self.rcd_type.is_empty() || self.rcd_rating_ma.is_some()
    }

    fn is_s_type(&self) -> bool {
        self.rcd_type == "S"
    }
}

fn positive(raw: &str) -> Option<f64> {
    parse_measurement(raw)
        .ok()
        .and_then(|m| m.value())
        .filter(|v| *v > 0.0)
}

// ============================================================================
// Single Field Rules
// ============================================================================

/// Validate one raw value
///
/// # Arguments
///
/// * `kind` - Rule set
/// * `raw` - Cell text as typed
/// * `ctx` - Limits derived from the rest of the record
/// * `config` - Thresholds
///
/// # Examples
///
/// ```
/// # use circuit_test_rules::config::ValidationConfig;
/// # use circuit_test_rules::field_validator::{validate, FieldKind, ValidationContext};
/// # use circuit_test_rules::types_verdict::VerdictCode;
/// let config = ValidationConfig::default();
/// let ctx = ValidationContext::default();
///
/// let empty = validate(FieldKind::InsulationResistance, "", &ctx, &config);
/// assert!(empty.is_pass() && empty.message.is_none());
///
/// let low = validate(FieldKind::InsulationResistance, "0.4", &ctx, &config);
/// assert_eq!(low.code, Some(VerdictCode::OutOfRange));
///
/// let junk = validate(FieldKind::InsulationResistance, "abc", &ctx, &config);
/// assert_eq!(junk.code, Some(VerdictCode::InvalidInput));
/// ```
pub fn validate(
    kind: FieldKind,
    raw: &str,
    ctx: &ValidationContext,
    config: &ValidationConfig,
) -> Verdict {
    match kind {
        FieldKind::EarthFaultLoopImpedance => validate_zs(raw, ctx, config),
        FieldKind::ContinuityR1R2 => validate_r1_r2(raw, ctx, config),
        FieldKind::Resistance => match read(raw) {
            Ok(_) => Verdict::pass(),
            Err(verdict) => verdict,
        },
        FieldKind::ProspectiveFaultCurrent => validate_pfc(raw, ctx, config),
        FieldKind::RcdDisconnectionTime => validate_rcd_time(raw, ctx, config),
        FieldKind::InsulationResistance => validate_insulation(raw, ctx, config),
        FieldKind::InsulationTestVoltage => validate_test_voltage(raw, config),
        FieldKind::Outcome => validate_outcome(raw),
        FieldKind::PointsServed => match parse_count(raw) {
            Ok(_) => Verdict::pass(),
            Err(e) => Verdict::fail(VerdictCode::InvalidInput, e.to_string()),
        },
        FieldKind::MaxImpedance => validate_max_zs(raw),
    }
}

/// Parsed reading, or the verdict that ends validation early
fn read(raw: &str) -> Result<Reading, Verdict> {
    match parse_measurement(raw) {
        Ok(MeasuredValue::Reading(reading)) => Ok(reading),
        Ok(MeasuredValue::Empty) | Ok(MeasuredValue::NotApplicable) => Err(Verdict::pass()),
        Err(e) => Err(Verdict::fail(VerdictCode::InvalidInput, e.to_string())),
    }
}

fn validate_zs(raw: &str, ctx: &ValidationContext, config: &ValidationConfig) -> Verdict {
    let reading = match read(raw) {
        Ok(r) => r,
        Err(verdict) => return verdict,
    };
    match ctx.max_zs {
        Some(max) => against_ceiling(reading, max, "Zs", "Ω", config),
        None => Verdict::warning(
            VerdictCode::ReferenceMissing,
            "Max Zs unknown: complete the protective device details",
        ),
    }
}

fn validate_r1_r2(raw: &str, ctx: &ValidationContext, config: &ValidationConfig) -> Verdict {
    let reading = match read(raw) {
        Ok(r) => r,
        Err(verdict) => return verdict,
    };
    match ctx.max_zs {
        Some(max) => against_ceiling(reading, max, "R1+R2", "Ω", config),
        None => Verdict::pass(),
    }
}

fn validate_pfc(raw: &str, ctx: &ValidationContext, config: &ValidationConfig) -> Verdict {
    let reading = match read(raw) {
        Ok(r) => r,
        Err(verdict) => return verdict,
    };
    match ctx.breaking_capacity_ka {
        Some(capacity) => against_ceiling(reading, capacity, "PFC", "kA", config),
        None => Verdict::pass(),
    }
}

fn validate_rcd_time(raw: &str, ctx: &ValidationContext, config: &ValidationConfig) -> Verdict {
    let reading = match read(raw) {
        Ok(r) => r,
        Err(verdict) => return verdict,
    };
    if !ctx.has_rcd() {
        return Verdict::pass_with("No RCD declared for this circuit");
    }

    if ctx.is_s_type() {
        let min = config.rcd_s_type_min_ms;
        if reading.bound != ReadingBound::Above && reading.value < min {
            return Verdict::fail(
                VerdictCode::OutOfRange,
                format!(
                    "Disconnection time {}ms is below the {}ms minimum for S type RCDs",
                    reading.value, min
                ),
            );
        }
        against_ceiling(reading, config.rcd_s_type_max_ms, "Disconnection time", "ms", config)
    } else {
        against_ceiling(reading, config.rcd_max_time_ms, "Disconnection time", "ms", config)
    }
}

fn validate_insulation(raw: &str, ctx: &ValidationContext, config: &ValidationConfig) -> Verdict {
    let reading = match read(raw) {
        Ok(r) => r,
        Err(verdict) => return verdict,
    };
    let volts = ctx.test_voltage.unwrap_or(config.default_test_voltage);
    match config.insulation_minimum(volts) {
        Some(floor) => against_floor(reading, floor, "Insulation resistance", "MΩ", config),
        None => Verdict::warning(
            VerdictCode::ReferenceMissing,
            format!("No minimum insulation resistance for a {}V test", volts),
        ),
    }
}

fn validate_test_voltage(raw: &str, config: &ValidationConfig) -> Verdict {
    match parse_test_voltage(raw) {
        Ok(None) => Verdict::pass(),
        Ok(Some(volts)) if config.insulation_minimum(volts).is_some() => Verdict::pass(),
        Ok(Some(volts)) => {
            let allowed: Vec<String> = config
                .insulation_minimums
                .keys()
                .map(|v| format!("{}V", v))
                .collect();
            Verdict::fail(
                VerdictCode::OutOfRange,
                format!("Test voltage {}V is not one of {}", volts, allowed.join(", ")),
            )
        }
        Err(e) => Verdict::fail(VerdictCode::InvalidInput, e.to_string()),
    }
}

fn validate_outcome(raw: &str) -> Verdict {
    match parse_outcome(raw) {
        Ok(None) | Ok(Some(Outcome::Affirmative)) | Ok(Some(Outcome::NotApplicable)) => {
            Verdict::pass()
        }
        Ok(Some(Outcome::Negative)) => {
            Verdict::fail(VerdictCode::OutOfRange, "Test recorded as failed")
        }
        Err(e) => Verdict::fail(VerdictCode::InvalidInput, e.to_string()),
    }
}

fn validate_max_zs(raw: &str) -> Verdict {
    let reading = match read(raw) {
        Ok(r) => r,
        Err(verdict) => return verdict,
    };
    if reading.value > 0.0 {
        Verdict::pass()
    } else {
        Verdict::fail(VerdictCode::OutOfRange, "Max Zs must be greater than zero")
    }
}

// ============================================================================
// Limits
// ============================================================================

/// Tiered check of a reading against an upper limit
///
/// A reading at or above the limit fails. An under-range reading (`<x`) only
/// fails above it. An over-range reading (`>x`) below the limit cannot be
/// confirmed and warns.
fn against_ceiling(
    reading: Reading,
    limit: f64,
    label: &str,
    unit: &str,
    config: &ValidationConfig,
) -> Verdict {
    let value = reading.value;
    let over = match reading.bound {
        ReadingBound::Below => value > limit + EPSILON,
        _ => value >= limit - EPSILON,
    };

    if over {
        return Verdict::fail(
            VerdictCode::OutOfRange,
            format!(
                "{} {}{} is at or above the {}{} maximum",
                label, value, unit, limit, unit
            ),
        );
    }
    if reading.bound == ReadingBound::Above {
        return Verdict::warning(
            VerdictCode::NearLimit,
            format!(
                "{} above {}{} cannot be confirmed within the {}{} maximum",
                label, value, unit, limit, unit
            ),
        );
    }
    if value >= limit * config.ceiling_warning_ratio - EPSILON {
        let margin = ((1.0 - config.ceiling_warning_ratio) * 100.0).round();
        return Verdict::warning(
            VerdictCode::NearLimit,
            format!(
                "{} {}{} is within {}% of the {}{} maximum",
                label, value, unit, margin, limit, unit
            ),
        );
    }
    Verdict::pass()
}

/// Tiered check of a reading against a lower limit
///
/// Mirror of [`against_ceiling`]: a reading at or below the floor fails. An
/// over-range reading (`>x`) never fails the floor.
fn against_floor(
    reading: Reading,
    floor: f64,
    label: &str,
    unit: &str,
    config: &ValidationConfig,
) -> Verdict {
    let value = reading.value;
    let under = match reading.bound {
        ReadingBound::Above => false,
        _ => value <= floor + EPSILON,
    };

    if under {
        return Verdict::fail(
            VerdictCode::OutOfRange,
            format!(
                "{} {}{} is at or below the {}{} minimum",
                label, value, unit, floor, unit
            ),
        );
    }

    let warn_below = floor * config.floor_warning_ratio;
    if value < warn_below - EPSILON {
        if reading.bound == ReadingBound::Above {
            return Verdict::warning(
                VerdictCode::NearLimit,
                format!(
                    "{} above {}{} cannot be confirmed clear of the {}{} minimum",
                    label, value, unit, floor, unit
                ),
            );
        }
        return Verdict::warning(
            VerdictCode::NearLimit,
            format!(
                "{} {}{} is close to the {}{} minimum",
                label, value, unit, floor, unit
            ),
        );
    }
    Verdict::pass()
}

// ============================================================================
// Group Rules
// ============================================================================

/// Line-line and line-earth insulation readings against one shared floor
///
/// The floor comes from the record's test voltage. When the voltage cell is
/// blank the configured default is assumed and passing readings say so.
pub fn validate_insulation_pair(
    record: &CircuitTestRecord,
    config: &ValidationConfig,
) -> [(CircuitField, Verdict); 2] {
    let voltage = parse_test_voltage(&record.insulation_test_voltage);
    let assumed = matches!(voltage, Ok(None));
    let ctx = ValidationContext {
        test_voltage: voltage.ok().flatten(),
        ..ValidationContext::default()
    };

    [CircuitField::InsulationLiveLive, CircuitField::InsulationLiveEarth].map(|field| {
        let raw = record.get(field);
        let verdict = validate(FieldKind::InsulationResistance, raw, &ctx, config);
        let filled = matches!(parse_measurement(raw), Ok(MeasuredValue::Reading(_)));

        if assumed && filled && verdict.is_pass() && verdict.message.is_none() {
            let note = format!(
                "Checked against the {}V minimum; no test voltage recorded",
                config.default_test_voltage
            );
            return (field, Verdict::pass_with(note));
        }
        (field, verdict)
    })
}

/// Ring final circuit continuity checks
///
/// Returns verdicts for `ringR1`, `ringRn` and `ringR2`, plus `r1R2` when the
/// ring legs allow an (r1 + r2) / 4 cross-check:
/// - r1 and rn must agree within the ring tolerance
/// - r2 must match r1 scaled by the live/cpc size ratio, when sizes are known
/// - R1+R2 must agree with (r1 + r2) / 4 within the ring tolerance
///
/// # Example
///
/// ```
/// # use circuit_test_rules::config::ValidationConfig;
/// # use circuit_test_rules::field_validator::validate_ring_legs;
/// # use circuit_test_rules::{CircuitField, CircuitTestRecord};
/// let mut record = CircuitTestRecord::new("c1");
/// record.ring_r1 = "0.52".to_string();
/// record.ring_rn = "0.70".to_string();
///
/// let verdicts = validate_ring_legs(&record, &ValidationConfig::default());
/// let rn = verdicts.iter().find(|(f, _)| *f == CircuitField::RingRn).unwrap();
/// assert!(rn.1.is_fail());
/// ```
pub fn validate_ring_legs(
    record: &CircuitTestRecord,
    config: &ValidationConfig,
) -> Vec<(CircuitField, Verdict)> {
    let tolerance = config.ring_tolerance_ohms;
    let mut verdicts = Vec::with_capacity(4);

    let mut leg = |field: CircuitField| -> Option<f64> {
        match read(record.get(field)) {
            Ok(reading) => {
                verdicts.push((field, Verdict::pass()));
                Some(reading.value)
            }
            Err(verdict) => {
                verdicts.push((field, verdict));
                None
            }
        }
    };
    let r1 = leg(CircuitField::RingR1);
    let rn = leg(CircuitField::RingRn);
    let r2 = leg(CircuitField::RingR2);

    if let (Some(r1), Some(rn)) = (r1, rn) {
        let diff = (r1 - rn).abs();
        if diff > tolerance + EPSILON {
            replace(
                &mut verdicts,
                CircuitField::RingRn,
                Verdict::fail(
                    VerdictCode::Inconsistent,
                    format!(
                        "r1 and rn differ by {:.2}Ω (tolerance {}Ω)",
                        diff, tolerance
                    ),
                ),
            );
        }
    }

    if let (Some(r1), Some(r2)) = (r1, r2) {
        if let (Some(live), Some(cpc)) = (positive(&record.live_size), positive(&record.cpc_size)) {
            let expected = r1 * live / cpc;
            let allowed = tolerance.max(expected * 0.1);
            if (r2 - expected).abs() > allowed + EPSILON {
                replace(
                    &mut verdicts,
                    CircuitField::RingR2,
                    Verdict::warning(
                        VerdictCode::Inconsistent,
                        format!(
                            "r2 {}Ω does not match {:.2}Ω expected for {}/{}mm² conductors",
                            r2, expected, live, cpc
                        ),
                    ),
                );
            }
        }

        if let Ok(reading) = read(&record.r1_r2) {
            let expected = (r1 + r2) / 4.0;
            let diff = (reading.value - expected).abs();
            if diff > tolerance + EPSILON {
                verdicts.push((
                    CircuitField::R1R2,
                    Verdict::warning(
                        VerdictCode::Inconsistent,
                        format!(
                            "R1+R2 {}Ω differs from (r1 + r2) / 4 = {:.2}Ω",
                            reading.value, expected
                        ),
                    ),
                ));
            }
        }
    }

    verdicts
}

fn replace(verdicts: &mut [(CircuitField, Verdict)], field: CircuitField, verdict: Verdict) {
    if let Some(slot) = verdicts.iter_mut().find(|(f, _)| *f == field) {
        slot.1 = verdict;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types_verdict::VerdictLevel;

    fn config() -> ValidationConfig {
        ValidationConfig::default()
    }

    fn check(kind: FieldKind, raw: &str, ctx: &ValidationContext) -> Verdict {
        validate(kind, raw, ctx, &config())
    }

    // ========================================================================
    // Outcome Classes
    // ========================================================================

    #[test]
    fn test_empty_out_of_range_and_malformed_are_distinct() {
        let ctx = ValidationContext::default().with_max_zs(1.37);
        let empty = check(FieldKind::EarthFaultLoopImpedance, "", &ctx);
        let high = check(FieldKind::EarthFaultLoopImpedance, "2.0", &ctx);
        let junk = check(FieldKind::EarthFaultLoopImpedance, "abc", &ctx);

        assert_eq!(empty, Verdict::pass());
        assert_eq!(high.level, VerdictLevel::Fail);
        assert_eq!(high.code, Some(VerdictCode::OutOfRange));
        assert_eq!(junk.level, VerdictLevel::Fail);
        assert_eq!(junk.code, Some(VerdictCode::InvalidInput));
        assert_ne!(high.message, junk.message);
    }

    #[test]
    fn test_not_applicable_passes_silently() {
        let ctx = ValidationContext::default();
        for kind in [
            FieldKind::EarthFaultLoopImpedance,
            FieldKind::InsulationResistance,
            FieldKind::RcdDisconnectionTime,
            FieldKind::Outcome,
        ] {
            assert_eq!(check(kind, "N/A", &ctx), Verdict::pass(), "{:?}", kind);
        }
    }

    // ========================================================================
    // Ceiling Rules
    // ========================================================================

    #[test]
    fn test_zs_tiers() {
        let ctx = ValidationContext::default().with_max_zs(1.37);
        assert!(check(FieldKind::EarthFaultLoopImpedance, "0.5", &ctx).is_pass());
        assert_eq!(
            check(FieldKind::EarthFaultLoopImpedance, "1.2", &ctx).code,
            Some(VerdictCode::NearLimit)
        );
        // Reaching the maximum fails
        assert!(check(FieldKind::EarthFaultLoopImpedance, "1.37", &ctx).is_fail());
        assert!(check(FieldKind::EarthFaultLoopImpedance, "1,40Ω", &ctx).is_fail());
    }

    #[test]
    fn test_zs_without_max_warns() {
        let verdict = check(
            FieldKind::EarthFaultLoopImpedance,
            "0.4",
            &ValidationContext::default(),
        );
        assert_eq!(verdict.level, VerdictLevel::Warning);
        assert_eq!(verdict.code, Some(VerdictCode::ReferenceMissing));
    }

    #[test]
    fn test_r1_r2_against_max_zs() {
        let ctx = ValidationContext::default().with_max_zs(1.44);
        assert!(check(FieldKind::ContinuityR1R2, "0.3", &ctx).is_pass());
        assert!(check(FieldKind::ContinuityR1R2, "1.5", &ctx).is_fail());
        assert!(check(FieldKind::ContinuityR1R2, "0.3", &ValidationContext::default()).is_pass());
    }

    #[test]
    fn test_pfc_against_breaking_capacity() {
        let ctx = ValidationContext::default().with_breaking_capacity(6.0);
        assert!(check(FieldKind::ProspectiveFaultCurrent, "1.6kA", &ctx).is_pass());
        assert_eq!(
            check(FieldKind::ProspectiveFaultCurrent, "5", &ctx).level,
            VerdictLevel::Warning
        );
        // Reaching the breaking capacity fails
        assert!(check(FieldKind::ProspectiveFaultCurrent, "6", &ctx).is_fail());
        assert!(check(FieldKind::ProspectiveFaultCurrent, "6.5", &ctx).is_fail());
        assert!(check(FieldKind::ProspectiveFaultCurrent, "16", &ValidationContext::default()).is_pass());
    }

    #[test]
    fn test_rcd_times() {
        let general = ValidationContext::default().with_rcd("A", 30.0);
        assert!(check(FieldKind::RcdDisconnectionTime, "23ms", &general).is_pass());
        assert_eq!(
            check(FieldKind::RcdDisconnectionTime, "250", &general).code,
            Some(VerdictCode::NearLimit)
        );
        assert!(check(FieldKind::RcdDisconnectionTime, "299", &general).level == VerdictLevel::Warning);
        assert!(check(FieldKind::RcdDisconnectionTime, "300", &general).is_fail());
        assert!(check(FieldKind::RcdDisconnectionTime, "310", &general).is_fail());
        // No trip within the instrument window
        assert!(check(FieldKind::RcdDisconnectionTime, ">300", &general).is_fail());

        let s_type = ValidationContext::default().with_rcd("s", 100.0);
        assert!(check(FieldKind::RcdDisconnectionTime, "200", &s_type).is_pass());
        assert!(check(FieldKind::RcdDisconnectionTime, "90", &s_type).is_fail());
        assert!(check(FieldKind::RcdDisconnectionTime, "450", &s_type).level == VerdictLevel::Warning);
        assert!(check(FieldKind::RcdDisconnectionTime, "500", &s_type).is_fail());
    }

    #[test]
    fn test_rcd_time_without_rcd_is_noted() {
        let verdict = check(FieldKind::RcdDisconnectionTime, "25", &ValidationContext::default());
        assert!(verdict.is_pass());
        assert!(verdict.message.is_some());
    }

    // ========================================================================
    // Floor Rules
    // ========================================================================

    #[test]
    fn test_insulation_floor_by_voltage() {
        let at_250 = ValidationContext::default().with_test_voltage(250);
        assert!(check(FieldKind::InsulationResistance, "0.7", &at_250).level == VerdictLevel::Warning);
        assert!(check(FieldKind::InsulationResistance, "0.4", &at_250).is_fail());
        assert!(check(FieldKind::InsulationResistance, "1.0", &at_250).is_pass());

        let at_500 = ValidationContext::default().with_test_voltage(500);
        assert!(check(FieldKind::InsulationResistance, "0.7", &at_500).is_fail());
        assert_eq!(
            check(FieldKind::InsulationResistance, "1.5", &at_500).code,
            Some(VerdictCode::NearLimit)
        );
        assert!(check(FieldKind::InsulationResistance, "200", &at_500).is_pass());
    }

    #[test]
    fn test_insulation_at_floor_fails() {
        let ctx = ValidationContext::default().with_test_voltage(500);
        let verdict = check(FieldKind::InsulationResistance, "1.0", &ctx);
        assert_eq!(verdict.level, VerdictLevel::Fail);
        assert_eq!(verdict.code, Some(VerdictCode::OutOfRange));
        assert_eq!(
            check(FieldKind::InsulationResistance, "1.01", &ctx).level,
            VerdictLevel::Warning
        );
        assert!(check(FieldKind::InsulationResistance, ">1.0", &ctx).level == VerdictLevel::Warning);
    }

    #[test]
    fn test_ceiling_bounds() {
        let ctx = ValidationContext::default().with_max_zs(1.44);
        // Under-range at the limit is still inside it
        assert_eq!(
            check(FieldKind::EarthFaultLoopImpedance, "<1.44", &ctx).level,
            VerdictLevel::Warning
        );
        assert!(check(FieldKind::EarthFaultLoopImpedance, ">1.44", &ctx).is_fail());
        assert_eq!(
            check(FieldKind::EarthFaultLoopImpedance, ">0.5", &ctx).code,
            Some(VerdictCode::NearLimit)
        );
    }

    #[test]
    fn test_insulation_over_range_passes() {
        let ctx = ValidationContext::default().with_test_voltage(500);
        assert!(check(FieldKind::InsulationResistance, ">299MΩ", &ctx).is_pass());
        assert!(check(FieldKind::InsulationResistance, "<0.5", &ctx).is_fail());
    }

    #[test]
    fn test_insulation_unknown_voltage_warns() {
        let ctx = ValidationContext::default().with_test_voltage(100);
        let verdict = check(FieldKind::InsulationResistance, "50", &ctx);
        assert_eq!(verdict.code, Some(VerdictCode::ReferenceMissing));
    }

    // ========================================================================
    // Enumerated / Count Rules
    // ========================================================================

    #[test]
    fn test_test_voltage_choices() {
        let ctx = ValidationContext::default();
        assert!(check(FieldKind::InsulationTestVoltage, "500V", &ctx).is_pass());
        assert!(check(FieldKind::InsulationTestVoltage, "", &ctx).is_pass());
        let odd = check(FieldKind::InsulationTestVoltage, "400V", &ctx);
        assert_eq!(odd.code, Some(VerdictCode::OutOfRange));
        assert!(odd.message.unwrap().contains("250V, 500V, 1000V"));
        assert!(check(FieldKind::InsulationTestVoltage, "five hundred", &ctx).is_input_error());
    }

    #[test]
    fn test_outcomes() {
        let ctx = ValidationContext::default();
        assert!(check(FieldKind::Outcome, "✓", &ctx).is_pass());
        assert_eq!(
            check(FieldKind::Outcome, "✗", &ctx).code,
            Some(VerdictCode::OutOfRange)
        );
        assert!(check(FieldKind::Outcome, "maybe", &ctx).is_input_error());
    }

    #[test]
    fn test_points_served_and_max_zs() {
        let ctx = ValidationContext::default();
        assert!(check(FieldKind::PointsServed, "8", &ctx).is_pass());
        assert!(check(FieldKind::PointsServed, "8.5", &ctx).is_input_error());
        assert!(check(FieldKind::MaxImpedance, "1.37", &ctx).is_pass());
        assert!(check(FieldKind::MaxImpedance, "0", &ctx).is_fail());
        assert!(check(FieldKind::MaxImpedance, "-1", &ctx).is_input_error());
    }

    #[test]
    fn test_for_field_mapping() {
        assert_eq!(
            FieldKind::for_field(CircuitField::MeasuredZs),
            Some(FieldKind::EarthFaultLoopImpedance)
        );
        assert_eq!(
            FieldKind::for_field(CircuitField::PfcKa),
            Some(FieldKind::ProspectiveFaultCurrent)
        );
        assert_eq!(FieldKind::for_field(CircuitField::Notes), None);
        assert_eq!(FieldKind::for_field(CircuitField::BsStandard), None);
    }

    // ========================================================================
    // Context / Group Rules
    // ========================================================================

    #[test]
    fn test_context_for_record() {
        let tables = LookupTables::bs7671().unwrap();
        let mut record = CircuitTestRecord::new("c1");
        record.bs_standard = "BS EN 60898".to_string();
        record.protective_device_curve = "B".to_string();
        record.protective_device_rating = "32A".to_string();
        record.protective_device_ka_rating = "6kA".to_string();
        record.rcd_type = " a ".to_string();
        record.insulation_test_voltage = "250V".to_string();

        let ctx = ValidationContext::for_record(&record, &tables);
        assert_eq!(ctx.max_zs, Some(1.37));
        assert_eq!(ctx.breaking_capacity_ka, Some(6.0));
        assert_eq!(ctx.rcd_type, "A");
        assert_eq!(ctx.test_voltage, Some(250));

        // Stored value wins over the table
        record.max_zs = "1.09".to_string();
        assert_eq!(ValidationContext::for_record(&record, &tables).max_zs, Some(1.09));
    }

    #[test]
    fn test_insulation_pair_shares_floor() {
        let mut record = CircuitTestRecord::new("c1");
        record.insulation_test_voltage = "250V".to_string();
        record.insulation_live_live = "0.6".to_string();
        record.insulation_live_earth = "0.4".to_string();

        let [(ll_field, ll), (le_field, le)] = validate_insulation_pair(&record, &config());
        assert_eq!(ll_field, CircuitField::InsulationLiveLive);
        assert_eq!(ll.level, VerdictLevel::Warning);
        assert_eq!(le_field, CircuitField::InsulationLiveEarth);
        assert!(le.is_fail());
    }

    #[test]
    fn test_insulation_pair_notes_assumed_voltage() {
        let mut record = CircuitTestRecord::new("c1");
        record.insulation_live_earth = ">299".to_string();

        let [(_, ll), (_, le)] = validate_insulation_pair(&record, &config());
        assert_eq!(ll, Verdict::pass());
        assert!(le.is_pass());
        assert!(le.message.unwrap().contains("500V"));
    }

    #[test]
    fn test_ring_legs_within_tolerance() {
        let mut record = CircuitTestRecord::new("c1");
        record.ring_r1 = "0.87".to_string();
        record.ring_rn = "0.82".to_string();
        record.ring_r2 = "1.45".to_string();
        record.live_size = "2.5".to_string();
        record.cpc_size = "1.5".to_string();
        record.r1_r2 = "0.58".to_string();

        let verdicts = validate_ring_legs(&record, &config());
        assert_eq!(verdicts.len(), 3);
        assert!(verdicts.iter().all(|(_, v)| v.is_pass()));
    }

    #[test]
    fn test_ring_legs_mismatches() {
        let mut record = CircuitTestRecord::new("c1");
        record.ring_r1 = "0.50".to_string();
        record.ring_rn = "0.50".to_string();
        record.ring_r2 = "0.50".to_string();
        record.live_size = "2.5mm²".to_string();
        record.cpc_size = "1.5mm²".to_string();
        record.r1_r2 = "0.40".to_string();

        let verdicts = validate_ring_legs(&record, &config());
        let find = |field| verdicts.iter().find(|(f, _)| *f == field).map(|(_, v)| v);

        assert!(find(CircuitField::RingRn).unwrap().is_pass());
        assert_eq!(
            find(CircuitField::RingR2).unwrap().code,
            Some(VerdictCode::Inconsistent)
        );
        assert_eq!(
            find(CircuitField::R1R2).unwrap().code,
            Some(VerdictCode::Inconsistent)
        );
    }

    #[test]
    fn test_ring_legs_bad_input() {
        let mut record = CircuitTestRecord::new("c1");
        record.ring_r1 = "abc".to_string();
        record.ring_rn = "0.5".to_string();

        let verdicts = validate_ring_legs(&record, &config());
        assert!(verdicts[0].1.is_input_error());
        assert!(verdicts[1].1.is_pass());
        assert_eq!(verdicts[2].1, Verdict::pass());
    }
}
