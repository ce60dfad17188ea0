//! Gravimeter (sensor configuration) entity.
//!
//! # Responsibility
//! - Hold meter identity, type and calibration constants.
//! - Build AT1 configurations from the vendor meter INI layout.
//!
//! # Invariants
//! - Calibration keys are lowercase and values are finite.

use crate::model::fields::{FieldList, FieldMap, FieldValue};
use crate::model::validation::{ensure_oid_kind, normalize_map_key, normalize_required};
use crate::model::{EntityKind, ValidationError};
use crate::oid::Oid;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

const AT1_SENSOR_FIELDS: &[&str] = &[
    "g0",
    "GravCal",
    "LongCal",
    "CrossCal",
    "LongOffset",
    "CrossOffset",
    "stempgain",
    "Temperature",
    "stempoffset",
    "pressgain",
    "presszero",
    "beamgain",
    "beamzero",
    "Etempgain",
    "Etempzero",
];
const AT1_CROSS_COUPLING_FIELDS: &[&str] = &["vcc", "ve", "al", "ax", "monitors"];
const AT1_PLATFORM_FIELDS: &[&str] = &[
    "Cross_Damping",
    "Cross_Periode",
    "Cross_Lead",
    "Cross_Gain",
    "Cross_Comp",
    "Cross_Phcomp",
    "Cross_sp",
    "Long_Damping",
    "Long_Periode",
    "Long_Lead",
    "Long_Gain",
    "Long_Comp",
    "Long_Phcomp",
    "Long_sp",
    "zerolong",
    "zerocross",
    "CrossSp",
    "LongSp",
];
const INI_SECTIONS: [&str; 3] = ["sensor", "crosscouplings", "platform"];

/// Supported gravity meter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeterType {
    #[default]
    At1a,
    At1m,
    Zls,
    Tags,
}

impl MeterType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::At1a => "at1a",
            Self::At1m => "at1m",
            Self::Zls => "zls",
            Self::Tags => "tags",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "at1a" | "at1" => Some(Self::At1a),
            "at1m" => Some(Self::At1m),
            "zls" => Some(Self::Zls),
            "tags" => Some(Self::Tags),
            _ => None,
        }
    }
}

impl Display for MeterType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GravimeterSpec {
    pub name: String,
    pub meter_type: MeterType,
    pub calibration: BTreeMap<String, f64>,
}

impl GravimeterSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            meter_type: MeterType::default(),
            calibration: BTreeMap::new(),
        }
    }

    pub fn with_type(mut self, meter_type: MeterType) -> Self {
        self.meter_type = meter_type;
        self
    }

    pub fn with_calibration(mut self, key: impl Into<String>, value: f64) -> Self {
        self.calibration.insert(key.into(), value);
        self
    }

    /// Reads an AT1 meter configuration from INI text.
    ///
    /// Unknown keys are dropped; values that do not parse as numbers are
    /// rejected. The meter name comes from `Sensor.meter`.
    pub fn from_at1_ini(text: &str) -> Result<Self, ValidationError> {
        let known: BTreeSet<String> = AT1_SENSOR_FIELDS
            .iter()
            .chain(AT1_CROSS_COUPLING_FIELDS)
            .chain(AT1_PLATFORM_FIELDS)
            .map(|field| field.to_ascii_lowercase())
            .collect();

        let mut section = String::new();
        let mut name = None;
        let mut calibration = BTreeMap::new();
        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                section = line[1..line.len() - 1].trim().to_ascii_lowercase();
                continue;
            }
            if !INI_SECTIONS.contains(&section.as_str()) {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim().trim_matches('"');
            if section == "sensor" && key == "meter" {
                name = Some(value.to_string());
                continue;
            }
            if !known.contains(&key) {
                continue;
            }
            let number = value.parse::<f64>().map_err(|_| ValidationError::InvalidValue {
                field: "calibration",
                detail: format!("`{key}` has non-numeric value `{value}`"),
            })?;
            calibration.insert(key, number);
        }

        let name = name.ok_or(ValidationError::MissingField("meter"))?;
        Ok(Self {
            name,
            meter_type: MeterType::At1a,
            calibration,
        })
    }
}

/// Sensor configuration owned by the project and referenced by flights.
#[derive(Debug, Clone, PartialEq)]
pub struct Gravimeter {
    oid: Oid,
    name: String,
    meter_type: MeterType,
    calibration: BTreeMap<String, f64>,
}

impl Gravimeter {
    pub fn new(oid: Oid, spec: GravimeterSpec) -> Result<Self, ValidationError> {
        ensure_oid_kind(oid, EntityKind::Gravimeter)?;
        Ok(Self {
            oid,
            name: normalize_required("name", spec.name)?,
            meter_type: spec.meter_type,
            calibration: normalize_calibration(spec.calibration)?,
        })
    }

    pub(crate) fn from_fields(oid: Oid, fields: &mut FieldMap) -> Result<Self, ValidationError> {
        let type_text = fields.text("type")?;
        let meter_type =
            MeterType::parse(&type_text).ok_or_else(|| ValidationError::InvalidValue {
                field: "type",
                detail: format!("unknown meter type `{type_text}`"),
            })?;
        let spec = GravimeterSpec {
            name: fields.text("name")?,
            meter_type,
            calibration: fields.float_map("calibration")?,
        };
        Self::new(oid, spec)
    }

    pub fn fields(&self) -> FieldList {
        vec![
            ("name", FieldValue::Text(self.name.clone())),
            ("type", FieldValue::Text(self.meter_type.as_str().to_string())),
            ("calibration", FieldValue::float_map(&self.calibration)),
        ]
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meter_type(&self) -> MeterType {
        self.meter_type
    }

    pub fn calibration(&self) -> &BTreeMap<String, f64> {
        &self.calibration
    }

    pub fn calibration_value(&self, key: &str) -> Option<f64> {
        self.calibration.get(&key.to_ascii_lowercase()).copied()
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), ValidationError> {
        self.name = normalize_required("name", name)?;
        Ok(())
    }

    pub fn set_meter_type(&mut self, meter_type: MeterType) {
        self.meter_type = meter_type;
    }

    pub fn set_calibration(&mut self, key: &str, value: f64) -> Result<(), ValidationError> {
        let mut single = BTreeMap::new();
        single.insert(key.to_string(), value);
        self.calibration.extend(normalize_calibration(single)?);
        Ok(())
    }
}

fn normalize_calibration(
    values: BTreeMap<String, f64>,
) -> Result<BTreeMap<String, f64>, ValidationError> {
    values
        .into_iter()
        .map(|(key, value)| {
            let key = normalize_map_key("calibration", key.to_ascii_lowercase())?;
            if !value.is_finite() {
                return Err(ValidationError::InvalidValue {
                    field: "calibration",
                    detail: format!("`{key}` must be finite"),
                });
            }
            Ok((key, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{Gravimeter, GravimeterSpec, MeterType};
    use crate::model::{EntityKind, ValidationError};
    use crate::oid::Oid;

    const SAMPLE_INI: &str = r#"
[Sensor]
meter = "AT1M-6"
g0 = 10000.0
GravCal = 227626.0
Unused = 4
[crosscouplings]
vcc = 0.0
ve = 0.0
[Platform]
Cross_Damping = 550
[Other]
g0 = 1
"#;

    #[test]
    fn from_at1_ini_filters_known_fields() {
        let spec = GravimeterSpec::from_at1_ini(SAMPLE_INI).unwrap();
        assert_eq!(spec.name, "AT1M-6");
        assert_eq!(spec.meter_type, MeterType::At1a);
        assert_eq!(spec.calibration.get("gravcal"), Some(&227626.0));
        assert_eq!(spec.calibration.get("g0"), Some(&10000.0));
        assert_eq!(spec.calibration.get("cross_damping"), Some(&550.0));
        assert!(!spec.calibration.contains_key("unused"));
        assert_eq!(spec.calibration.len(), 5);
    }

    #[test]
    fn from_at1_ini_requires_meter_name() {
        let err = GravimeterSpec::from_at1_ini("[Sensor]\ng0 = 1").unwrap_err();
        assert_eq!(err, ValidationError::MissingField("meter"));
    }

    #[test]
    fn calibration_rejects_non_finite_values() {
        let spec = GravimeterSpec::new("AT1A-11").with_calibration("GravCal", f64::NAN);
        assert!(Gravimeter::new(Oid::new(EntityKind::Gravimeter), spec).is_err());
    }

    #[test]
    fn calibration_keys_are_case_insensitive() {
        let spec = GravimeterSpec::new("AT1A-11").with_calibration("GravCal", 1.5);
        let meter = Gravimeter::new(Oid::new(EntityKind::Gravimeter), spec).unwrap();
        assert_eq!(meter.calibration_value("GRAVCAL"), Some(1.5));
    }
}
