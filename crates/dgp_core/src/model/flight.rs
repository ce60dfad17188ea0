//! Flight entity: one survey sortie.

use crate::model::fields::{FieldList, FieldMap, FieldValue};
use crate::model::validation::{ensure_oid_kind, normalize_optional, normalize_required};
use crate::model::{EntityKind, ValidationError};
use crate::oid::Oid;
use chrono::NaiveDate;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Parses a flight date from user text.
pub fn parse_flight_date(text: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| ValidationError::InvalidDate(trimmed.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlightSpec {
    pub name: String,
    pub date: Option<NaiveDate>,
    pub sequence: Option<u32>,
    pub notes: Option<String>,
}

impl FlightSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            date: None,
            sequence: None,
            notes: None,
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Sets the date from user text, failing on unparsable input.
    pub fn with_date_text(self, text: &str) -> Result<Self, ValidationError> {
        let date = parse_flight_date(text)?;
        Ok(self.with_date(date))
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = Some(sequence);
        self
    }
}

/// One survey sortie.
///
/// `gravimeters` holds non-owning references; the gravimeters themselves are
/// owned by the project.
#[derive(Debug, Clone, PartialEq)]
pub struct Flight {
    oid: Oid,
    name: String,
    date: Option<NaiveDate>,
    sequence: Option<u32>,
    notes: Option<String>,
    gravimeters: Vec<Oid>,
}

impl Flight {
    pub fn new(oid: Oid, spec: FlightSpec) -> Result<Self, ValidationError> {
        ensure_oid_kind(oid, EntityKind::Flight)?;
        Ok(Self {
            oid,
            name: normalize_required("name", spec.name)?,
            date: spec.date,
            sequence: spec.sequence,
            notes: normalize_optional(spec.notes),
            gravimeters: Vec::new(),
        })
    }

    pub(crate) fn from_fields(oid: Oid, fields: &mut FieldMap) -> Result<Self, ValidationError> {
        ensure_oid_kind(oid, EntityKind::Flight)?;
        let sequence = fields
            .opt_int("sequence")?
            .map(|value| {
                u32::try_from(value).map_err(|_| ValidationError::InvalidValue {
                    field: "sequence",
                    detail: format!("{value} is out of range"),
                })
            })
            .transpose()?;
        let gravimeters = fields.oid_list("gravimeters")?;
        for meter in &gravimeters {
            if meter.kind() != EntityKind::Gravimeter {
                return Err(ValidationError::InvalidLink {
                    holder: EntityKind::Flight,
                    target: meter.kind(),
                });
            }
        }
        Ok(Self {
            oid,
            name: normalize_required("name", fields.text("name")?)?,
            date: fields.opt_date("date")?,
            sequence,
            notes: normalize_optional(fields.opt_text("notes")?),
            gravimeters,
        })
    }

    pub fn fields(&self) -> FieldList {
        vec![
            ("name", FieldValue::Text(self.name.clone())),
            ("date", self.date.map_or(FieldValue::Null, FieldValue::Date)),
            (
                "sequence",
                self.sequence
                    .map_or(FieldValue::Null, |value| FieldValue::Int(i64::from(value))),
            ),
            ("notes", FieldValue::opt_text(self.notes.as_deref())),
            ("gravimeters", FieldValue::oid_list(&self.gravimeters)),
        ]
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn sequence(&self) -> Option<u32> {
        self.sequence
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Linked gravimeter identifiers in link order.
    pub fn gravimeters(&self) -> &[Oid] {
        &self.gravimeters
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), ValidationError> {
        self.name = normalize_required("name", name)?;
        Ok(())
    }

    pub fn set_date(&mut self, date: Option<NaiveDate>) {
        self.date = date;
    }

    pub fn set_sequence(&mut self, sequence: Option<u32>) {
        self.sequence = sequence;
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.notes = normalize_optional(notes);
    }

    /// Returns `false` when the reference already existed.
    pub(crate) fn add_gravimeter_ref(&mut self, meter: Oid) -> bool {
        if self.gravimeters.contains(&meter) {
            return false;
        }
        self.gravimeters.push(meter);
        true
    }

    /// Returns `false` when there was no such reference.
    pub(crate) fn remove_gravimeter_ref(&mut self, meter: Oid) -> bool {
        let before = self.gravimeters.len();
        self.gravimeters.retain(|id| *id != meter);
        self.gravimeters.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_flight_date, Flight, FlightSpec};
    use crate::model::{EntityKind, ValidationError};
    use crate::oid::Oid;
    use chrono::NaiveDate;

    #[test]
    fn parse_flight_date_accepts_iso_and_us_forms() {
        let expected = NaiveDate::from_ymd_opt(2018, 3, 9).unwrap();
        assert_eq!(parse_flight_date("2018-03-09").unwrap(), expected);
        assert_eq!(parse_flight_date(" 03/09/2018 ").unwrap(), expected);
    }

    #[test]
    fn unparsable_date_fails_spec_construction() {
        let err = FlightSpec::new("Flight 1")
            .with_date_text("31st of never")
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidDate("31st of never".to_string()));
    }

    #[test]
    fn gravimeter_refs_are_a_set() {
        let mut flight =
            Flight::new(Oid::new(EntityKind::Flight), FlightSpec::new("F1")).unwrap();
        let meter = Oid::new(EntityKind::Gravimeter);
        assert!(flight.add_gravimeter_ref(meter));
        assert!(!flight.add_gravimeter_ref(meter));
        assert_eq!(flight.gravimeters(), &[meter]);
        assert!(flight.remove_gravimeter_ref(meter));
        assert!(!flight.remove_gravimeter_ref(meter));
    }

    #[test]
    fn new_rejects_foreign_oid_kind() {
        let err = Flight::new(Oid::new(EntityKind::DataSet), FlightSpec::new("F1")).unwrap_err();
        assert!(matches!(err, ValidationError::KindMismatch { .. }));
    }
}
