//! Data structures for circuit test records
//!
//! These structs represent one row of the schedule of test results as the
//! technician typed it. Every declared and measured value is held as the raw
//! string from the grid; typed interpretation happens in
//! [`measurements`](crate::measurements) and the validators.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Editable field of a [`CircuitTestRecord`]
///
/// Declaration order is the commit order of a [`FieldPatch`].
///
/// Serialized as its camelCase wire key (see [`CircuitField::key`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CircuitField {
    // Classification
    CircuitDesignation,
    CircuitDescription,
    TypeOfWiring,
    ReferenceMethod,
    PhaseType,

    // Conductors
    LiveSize,
    CpcSize,

    // Protective device
    BsStandard,
    ProtectiveDeviceCurve,
    ProtectiveDeviceRating,
    ProtectiveDeviceKaRating,
    MaxZs,

    // RCD
    RcdBsStandard,
    RcdType,
    RcdRatingMa,
    RcdRatingA,

    // Continuity
    R1R2,
    R2,
    RingR1,
    RingRn,
    RingR2,

    // Insulation
    InsulationTestVoltage,
    InsulationLiveLive,
    InsulationLiveEarth,

    // Fault loop / polarity
    Polarity,
    MeasuredZs,
    Pfc,
    /// Deprecated alias of [`CircuitField::Pfc`], kept for older consumers
    PfcKa,

    // RCD operation
    RcdOneX,
    RcdTestButton,

    // Ancillary
    FunctionalTesting,
    AfddTest,
    PointsServed,
    Notes,
}

impl CircuitField {
    /// Every field in declaration order
    pub const ALL: [CircuitField; 34] = [
        CircuitField::CircuitDesignation,
        CircuitField::CircuitDescription,
        CircuitField::TypeOfWiring,
        CircuitField::ReferenceMethod,
        CircuitField::PhaseType,
        CircuitField::LiveSize,
        CircuitField::CpcSize,
        CircuitField::BsStandard,
        CircuitField::ProtectiveDeviceCurve,
        CircuitField::ProtectiveDeviceRating,
        CircuitField::ProtectiveDeviceKaRating,
        CircuitField::MaxZs,
        CircuitField::RcdBsStandard,
        CircuitField::RcdType,
        CircuitField::RcdRatingMa,
        CircuitField::RcdRatingA,
        CircuitField::R1R2,
        CircuitField::R2,
        CircuitField::RingR1,
        CircuitField::RingRn,
        CircuitField::RingR2,
        CircuitField::InsulationTestVoltage,
        CircuitField::InsulationLiveLive,
        CircuitField::InsulationLiveEarth,
        CircuitField::Polarity,
        CircuitField::MeasuredZs,
        CircuitField::Pfc,
        CircuitField::PfcKa,
        CircuitField::RcdOneX,
        CircuitField::RcdTestButton,
        CircuitField::FunctionalTesting,
        CircuitField::AfddTest,
        CircuitField::PointsServed,
        CircuitField::Notes,
    ];

    /// Wire key used by the record store and the UI
    pub fn key(self) -> &'static str {
        match self {
            CircuitField::CircuitDesignation => "circuitDesignation",
            CircuitField::CircuitDescription => "circuitDescription",
            CircuitField::TypeOfWiring => "typeOfWiring",
            CircuitField::ReferenceMethod => "referenceMethod",
            CircuitField::PhaseType => "phaseType",
            CircuitField::LiveSize => "liveSize",
            CircuitField::CpcSize => "cpcSize",
            CircuitField::BsStandard => "bsStandard",
            CircuitField::ProtectiveDeviceCurve => "protectiveDeviceCurve",
            CircuitField::ProtectiveDeviceRating => "protectiveDeviceRating",
            CircuitField::ProtectiveDeviceKaRating => "protectiveDeviceKaRating",
            CircuitField::MaxZs => "maxZs",
            CircuitField::RcdBsStandard => "rcdBsStandard",
            CircuitField::RcdType => "rcdType",
            CircuitField::RcdRatingMa => "rcdRatingMa",
            CircuitField::RcdRatingA => "rcdRatingA",
            CircuitField::R1R2 => "r1R2",
            CircuitField::R2 => "r2",
            CircuitField::RingR1 => "ringR1",
            CircuitField::RingRn => "ringRn",
            CircuitField::RingR2 => "ringR2",
            CircuitField::InsulationTestVoltage => "insulationTestVoltage",
            CircuitField::InsulationLiveLive => "insulationLiveLive",
            CircuitField::InsulationLiveEarth => "insulationLiveEarth",
            CircuitField::Polarity => "polarity",
            CircuitField::MeasuredZs => "measuredZs",
            CircuitField::Pfc => "pfc",
            CircuitField::PfcKa => "pfcKa",
            CircuitField::RcdOneX => "rcdOneX",
            CircuitField::RcdTestButton => "rcdTestButton",
            CircuitField::FunctionalTesting => "functionalTesting",
            CircuitField::AfddTest => "afddTest",
            CircuitField::PointsServed => "pointsServed",
            CircuitField::Notes => "notes",
        }
    }

    /// Deprecated alias that must mirror this field, if any
    pub fn legacy_alias(self) -> Option<CircuitField> {
        match self {
            CircuitField::Pfc => Some(CircuitField::PfcKa),
            _ => None,
        }
    }

    /// Primary field this deprecated alias mirrors, if this is an alias
    pub fn primary_of_alias(self) -> Option<CircuitField> {
        match self {
            CircuitField::PfcKa => Some(CircuitField::Pfc),
            _ => None,
        }
    }

    /// Fields inherited from the source circuit of a derived record
    pub fn is_inherited(self) -> bool {
        matches!(
            self,
            CircuitField::CircuitDesignation | CircuitField::CircuitDescription
        )
    }

    /// Fields forming the (standard, curve, rating) key of the max Zs lookup
    pub fn is_device_key(self) -> bool {
        matches!(
            self,
            CircuitField::BsStandard
                | CircuitField::ProtectiveDeviceCurve
                | CircuitField::ProtectiveDeviceRating
        )
    }
}

impl fmt::Display for CircuitField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Unknown wire key
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownField(pub String);

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown circuit field: '{}'", self.0)
    }
}

impl std::error::Error for UnknownField {}

impl FromStr for CircuitField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CircuitField::ALL
            .iter()
            .copied()
            .find(|field| field.key() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

impl TryFrom<String> for CircuitField {
    type Error = UnknownField;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CircuitField> for String {
    fn from(field: CircuitField) -> Self {
        field.key().to_string()
    }
}

/// Ordered set of field mutations for one record
///
/// Iterates in [`CircuitField`] declaration order, which is the order the
/// sequential commit path writes them in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPatch(BTreeMap<CircuitField, String>);

impl FieldPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch with a single entry
    pub fn single(field: CircuitField, value: impl Into<String>) -> Self {
        let mut patch = Self::new();
        patch.set(field, value);
        patch
    }

    /// Insert or overwrite one entry
    pub fn set(&mut self, field: CircuitField, value: impl Into<String>) {
        self.0.insert(field, value.into());
    }

    pub fn get(&self, field: CircuitField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: CircuitField) -> bool {
        self.0.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = CircuitField> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CircuitField, &str)> + '_ {
        self.0.iter().map(|(field, value)| (*field, value.as_str()))
    }
}

/// Represents one circuit row of the inspection & test schedule
///
/// A record with `source_circuit_id` set is a read-only derivative of another
/// circuit (e.g. an additional leg of a shared supply) and inherits its
/// designation and description.
///
/// # Example
///
/// ```
/// # use circuit_test_rules::{CircuitField, CircuitTestRecord};
/// let mut record = CircuitTestRecord::new("c1");
/// record.set(CircuitField::BsStandard, "BS EN 60898");
/// assert_eq!(record.get(CircuitField::BsStandard), "BS EN 60898");
/// assert_eq!(record.get(CircuitField::MaxZs), "");
/// assert!(!record.is_locked());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CircuitTestRecord {
    /// Stable unique id
    pub id: String,

    /// Back-reference to the circuit this record derives from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_circuit_id: Option<String>,

    pub circuit_designation: String,
    pub circuit_description: String,
    pub type_of_wiring: String,
    pub reference_method: String,
    /// "single" or "three"
    pub phase_type: String,

    /// Live conductor cross-sectional area (mm²)
    pub live_size: String,
    /// Protective conductor cross-sectional area (mm²)
    pub cpc_size: String,

    /// Device standard code, e.g. "BS EN 60898", "BS 88-3"
    pub bs_standard: String,
    /// Trip curve ("B", "C", "D"); empty for fuse standards
    pub protective_device_curve: String,
    /// Current rating, e.g. "32A"
    pub protective_device_rating: String,
    /// Breaking capacity (kA)
    pub protective_device_ka_rating: String,
    /// Derived maximum permitted earth fault loop impedance (Ω)
    pub max_zs: String,

    pub rcd_bs_standard: String,
    /// "AC", "A", "F", "B" or "S"
    pub rcd_type: String,
    /// Residual operating current (mA)
    pub rcd_rating_ma: String,
    pub rcd_rating_a: String,

    /// R1+R2 (Ω)
    pub r1_r2: String,
    pub r2: String,
    /// Ring end-to-end line reading r1 (Ω)
    pub ring_r1: String,
    /// Ring end-to-end neutral reading rn (Ω)
    pub ring_rn: String,
    /// Ring end-to-end protective conductor reading r2 (Ω)
    pub ring_r2: String,

    /// Test voltage, e.g. "500V"
    pub insulation_test_voltage: String,
    /// Line-to-line insulation resistance (MΩ)
    pub insulation_live_live: String,
    /// Line-to-earth insulation resistance (MΩ)
    pub insulation_live_earth: String,

    pub polarity: String,
    /// Measured earth fault loop impedance (Ω)
    pub measured_zs: String,
    /// Prospective fault current (kA)
    pub pfc: String,
    /// Deprecated alias of `pfc`
    pub pfc_ka: String,

    /// Disconnection time at rated residual current (ms)
    pub rcd_one_x: String,
    pub rcd_test_button: String,

    pub functional_testing: String,
    pub afdd_test: String,
    pub points_served: String,
    pub notes: String,
}

impl CircuitTestRecord {
    /// Blank record as created when a technician adds a circuit row
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Read-only derivative of `source`
    ///
    /// Copies classification, conductor and protective device data and sets
    /// the back-reference. Measurements start blank.
    pub fn derived_from(source: &CircuitTestRecord, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_circuit_id: Some(source.id.clone()),
            circuit_designation: source.circuit_designation.clone(),
            circuit_description: source.circuit_description.clone(),
            type_of_wiring: source.type_of_wiring.clone(),
            reference_method: source.reference_method.clone(),
            phase_type: source.phase_type.clone(),
            live_size: source.live_size.clone(),
            cpc_size: source.cpc_size.clone(),
            bs_standard: source.bs_standard.clone(),
            protective_device_curve: source.protective_device_curve.clone(),
            protective_device_rating: source.protective_device_rating.clone(),
            protective_device_ka_rating: source.protective_device_ka_rating.clone(),
            max_zs: source.max_zs.clone(),
            ..Self::default()
        }
    }

    /// True when the record derives from another circuit
    pub fn is_locked(&self) -> bool {
        self.source_circuit_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
    }

    pub fn get(&self, field: CircuitField) -> &str {
        match field {
            CircuitField::CircuitDesignation => &self.circuit_designation,
            CircuitField::CircuitDescription => &self.circuit_description,
            CircuitField::TypeOfWiring => &self.type_of_wiring,
            CircuitField::ReferenceMethod => &self.reference_method,
            CircuitField::PhaseType => &self.phase_type,
            CircuitField::LiveSize => &self.live_size,
            CircuitField::CpcSize => &self.cpc_size,
            CircuitField::BsStandard => &self.bs_standard,
            CircuitField::ProtectiveDeviceCurve => &self.protective_device_curve,
            CircuitField::ProtectiveDeviceRating => &self.protective_device_rating,
            CircuitField::ProtectiveDeviceKaRating => &self.protective_device_ka_rating,
            CircuitField::MaxZs => &self.max_zs,
            CircuitField::RcdBsStandard => &self.rcd_bs_standard,
            CircuitField::RcdType => &self.rcd_type,
            CircuitField::RcdRatingMa => &self.rcd_rating_ma,
            CircuitField::RcdRatingA => &self.rcd_rating_a,
            CircuitField::R1R2 => &self.r1_r2,
            CircuitField::R2 => &self.r2,
            CircuitField::RingR1 => &self.ring_r1,
            CircuitField::RingRn => &self.ring_rn,
            CircuitField::RingR2 => &self.ring_r2,
            CircuitField::InsulationTestVoltage => &self.insulation_test_voltage,
            CircuitField::InsulationLiveLive => &self.insulation_live_live,
            CircuitField::InsulationLiveEarth => &self.insulation_live_earth,
            CircuitField::Polarity => &self.polarity,
            CircuitField::MeasuredZs => &self.measured_zs,
            CircuitField::Pfc => &self.pfc,
            CircuitField::PfcKa => &self.pfc_ka,
            CircuitField::RcdOneX => &self.rcd_one_x,
            CircuitField::RcdTestButton => &self.rcd_test_button,
            CircuitField::FunctionalTesting => &self.functional_testing,
            CircuitField::AfddTest => &self.afdd_test,
            CircuitField::PointsServed => &self.points_served,
            CircuitField::Notes => &self.notes,
        }
    }

    /// Raw field write; enforces no invariants (see [`crate::cascade::plan_edit`])
    pub fn set(&mut self, field: CircuitField, value: impl Into<String>) {
        let value = value.into();
        let slot = match field {
            CircuitField::CircuitDesignation => &mut self.circuit_designation,
            CircuitField::CircuitDescription => &mut self.circuit_description,
            CircuitField::TypeOfWiring => &mut self.type_of_wiring,
            CircuitField::ReferenceMethod => &mut self.reference_method,
            CircuitField::PhaseType => &mut self.phase_type,
            CircuitField::LiveSize => &mut self.live_size,
            CircuitField::CpcSize => &mut self.cpc_size,
            CircuitField::BsStandard => &mut self.bs_standard,
            CircuitField::ProtectiveDeviceCurve => &mut self.protective_device_curve,
            CircuitField::ProtectiveDeviceRating => &mut self.protective_device_rating,
            CircuitField::ProtectiveDeviceKaRating => &mut self.protective_device_ka_rating,
            CircuitField::MaxZs => &mut self.max_zs,
            CircuitField::RcdBsStandard => &mut self.rcd_bs_standard,
            CircuitField::RcdType => &mut self.rcd_type,
            CircuitField::RcdRatingMa => &mut self.rcd_rating_ma,
            CircuitField::RcdRatingA => &mut self.rcd_rating_a,
            CircuitField::R1R2 => &mut self.r1_r2,
            CircuitField::R2 => &mut self.r2,
            CircuitField::RingR1 => &mut self.ring_r1,
            CircuitField::RingRn => &mut self.ring_rn,
            CircuitField::RingR2 => &mut self.ring_r2,
            CircuitField::InsulationTestVoltage => &mut self.insulation_test_voltage,
            CircuitField::InsulationLiveLive => &mut self.insulation_live_live,
            CircuitField::InsulationLiveEarth => &mut self.insulation_live_earth,
            CircuitField::Polarity => &mut self.polarity,
            CircuitField::MeasuredZs => &mut self.measured_zs,
            CircuitField::Pfc => &mut self.pfc,
            CircuitField::PfcKa => &mut self.pfc_ka,
            CircuitField::RcdOneX => &mut self.rcd_one_x,
            CircuitField::RcdTestButton => &mut self.rcd_test_button,
            CircuitField::FunctionalTesting => &mut self.functional_testing,
            CircuitField::AfddTest => &mut self.afdd_test,
            CircuitField::PointsServed => &mut self.points_served,
            CircuitField::Notes => &mut self.notes,
        };
        *slot = value;
    }

    /// Write every entry of `patch` in key order
    pub fn apply_patch(&mut self, patch: &FieldPatch) {
        for (field, value) in patch.iter() {
            self.set(field, value);
        }
    }
}

/// Patch re-syncing the inherited fields of `derived` from `source`
///
/// Empty when they already agree.
pub fn inherited_patch(derived: &CircuitTestRecord, source: &CircuitTestRecord) -> FieldPatch {
    let mut patch = FieldPatch::new();
    for field in CircuitField::ALL.iter().copied().filter(|f| f.is_inherited()) {
        if derived.get(field) != source.get(field) {
            patch.set(field, source.get(field));
        }
    }
    patch
}
