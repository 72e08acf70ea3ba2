//! Verdict types for field validation
//!
//! This module provides the ephemeral validation results handed to the UI:
//! - Verdict: tiered level plus optional message for one field
//! - VerdictMap: every validated field of one record
//!
//! Verdicts are recomputed on every relevant change and never persisted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::CircuitField;

/// Verdict tier, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictLevel {
    Pass,
    Warning,
    Fail,
}

/// Machine-readable cause of a non-plain verdict
///
/// Lets a consumer tell an input error from a measurement failure without
/// parsing the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictCode {
    /// Text could not be read as the expected kind of value
    InvalidInput,
    /// Value is on the wrong side of a limit
    OutOfRange,
    /// Value is within the warning margin of a limit
    NearLimit,
    /// Limit needed for the comparison is not known yet
    ReferenceMissing,
    /// Related readings disagree with each other
    Inconsistent,
}

/// Validation result for one field of one record
///
/// # Example
///
/// ```
/// # use circuit_test_rules::{Verdict, VerdictLevel};
/// let verdict = Verdict::pass();
/// assert_eq!(verdict.level, VerdictLevel::Pass);
/// assert!(verdict.message.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub level: VerdictLevel,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<VerdictCode>,
}

impl Verdict {
    /// Plain pass, no message
    pub fn pass() -> Self {
        Self {
            level: VerdictLevel::Pass,
            message: None,
            code: None,
        }
    }

    /// Pass with an informational note
    pub fn pass_with(message: impl Into<String>) -> Self {
        Self {
            level: VerdictLevel::Pass,
            message: Some(message.into()),
            code: None,
        }
    }

    pub fn warning(code: VerdictCode, message: impl Into<String>) -> Self {
        Self {
            level: VerdictLevel::Warning,
            message: Some(message.into()),
            code: Some(code),
        }
    }

    pub fn fail(code: VerdictCode, message: impl Into<String>) -> Self {
        Self {
            level: VerdictLevel::Fail,
            message: Some(message.into()),
            code: Some(code),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.level == VerdictLevel::Pass
    }

    pub fn is_fail(&self) -> bool {
        self.level == VerdictLevel::Fail
    }

    /// Fail caused by unreadable input rather than a bad measurement
    pub fn is_input_error(&self) -> bool {
        self.code == Some(VerdictCode::InvalidInput)
    }
}

/// Verdicts for every validated field of one record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerdictMap(BTreeMap<CircuitField, Verdict>);

impl VerdictMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: CircuitField, verdict: Verdict) {
        self.0.insert(field, verdict);
    }

    /// Insert unless the field already holds a verdict at least as severe
    pub fn merge(&mut self, field: CircuitField, verdict: Verdict) {
        match self.0.get(&field) {
            Some(existing) if existing.level >= verdict.level => {}
            _ => {
                self.0.insert(field, verdict);
            }
        }
    }

    pub fn get(&self, field: CircuitField) -> Option<&Verdict> {
        self.0.get(&field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CircuitField, &Verdict)> + '_ {
        self.0.iter().map(|(field, verdict)| (*field, verdict))
    }

    /// Worst level present; `Pass` for an empty map
    pub fn worst(&self) -> VerdictLevel {
        self.0
            .values()
            .map(|v| v.level)
            .max()
            .unwrap_or(VerdictLevel::Pass)
    }

    /// Number of verdicts at `level`
    pub fn count(&self, level: VerdictLevel) -> usize {
        self.0.values().filter(|v| v.level == level).count()
    }

    /// Fields whose verdict is not a plain pass, worst first
    pub fn flagged(&self) -> Vec<(CircuitField, &Verdict)> {
        let mut flagged: Vec<_> = self
            .iter()
            .filter(|(_, v)| v.level != VerdictLevel::Pass)
            .collect();
        flagged.sort_by(|a, b| b.1.level.cmp(&a.1.level).then(a.0.cmp(&b.0)));
        flagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(VerdictLevel::Pass < VerdictLevel::Warning);
        assert!(VerdictLevel::Warning < VerdictLevel::Fail);
    }

    #[test]
    fn test_worst_and_counts() {
        let mut map = VerdictMap::new();
        assert_eq!(map.worst(), VerdictLevel::Pass);

        map.insert(CircuitField::Polarity, Verdict::pass());
        map.insert(
            CircuitField::MeasuredZs,
            Verdict::warning(VerdictCode::NearLimit, "close to limit"),
        );
        map.insert(
            CircuitField::InsulationLiveEarth,
            Verdict::fail(VerdictCode::OutOfRange, "below minimum"),
        );

        assert_eq!(map.worst(), VerdictLevel::Fail);
        assert_eq!(map.count(VerdictLevel::Pass), 1);
        assert_eq!(map.count(VerdictLevel::Warning), 1);

        let flagged = map.flagged();
        assert_eq!(flagged.len(), 2);
        assert_eq!(flagged[0].0, CircuitField::InsulationLiveEarth);
    }

    #[test]
    fn test_merge_keeps_worse() {
        let mut map = VerdictMap::new();
        map.merge(CircuitField::R1R2, Verdict::pass());
        map.merge(
            CircuitField::R1R2,
            Verdict::warning(VerdictCode::Inconsistent, "ring mismatch"),
        );
        map.merge(CircuitField::R1R2, Verdict::pass_with("note"));
        assert_eq!(map.get(CircuitField::R1R2).unwrap().level, VerdictLevel::Warning);
    }

    #[test]
    fn test_verdict_json_shape() {
        let json = serde_json::to_string(&Verdict::pass()).unwrap();
        assert_eq!(json, r#"{"level":"pass"}"#);

        let fail = Verdict::fail(VerdictCode::InvalidInput, "Not a number: 'abc'");
        let json = serde_json::to_string(&fail).unwrap();
        assert!(json.contains(r#""level":"fail""#));
        assert!(json.contains(r#""code":"invalid_input""#));
        assert!(fail.is_input_error());
    }

    #[test]
    fn test_map_serializes_with_field_keys() {
        let mut map = VerdictMap::new();
        map.insert(CircuitField::MeasuredZs, Verdict::pass());
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"measuredZs":{"level":"pass"}}"#);
    }
}
