//! DataSet and DataSegment entities.
//!
//! # Invariants
//! - A DataSet's gravity/trajectory slots are derived from its DataFile
//!   children; the entity itself stores no file references.
//! - A segment's `start` is strictly before its `stop`.

use crate::model::fields::{FieldList, FieldMap, FieldValue};
use crate::model::validation::{ensure_oid_kind, normalize_optional};
use crate::model::{EntityKind, ValidationError};
use crate::oid::Oid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSetSpec {
    pub name: Option<String>,
}

impl DataSetSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// One coherent collection of synchronized measurements for a flight.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    oid: Oid,
    name: Option<String>,
    sensor: Option<Oid>,
}

impl DataSet {
    pub fn new(oid: Oid, spec: DataSetSpec) -> Result<Self, ValidationError> {
        ensure_oid_kind(oid, EntityKind::DataSet)?;
        Ok(Self {
            oid,
            name: normalize_optional(spec.name),
            sensor: None,
        })
    }

    pub(crate) fn from_fields(oid: Oid, fields: &mut FieldMap) -> Result<Self, ValidationError> {
        ensure_oid_kind(oid, EntityKind::DataSet)?;
        let sensor = fields.opt_oid("sensor")?;
        if let Some(sensor) = sensor {
            if sensor.kind() != EntityKind::Gravimeter {
                return Err(ValidationError::InvalidLink {
                    holder: EntityKind::DataSet,
                    target: sensor.kind(),
                });
            }
        }
        Ok(Self {
            oid,
            name: normalize_optional(fields.opt_text("name")?),
            sensor,
        })
    }

    pub fn fields(&self) -> FieldList {
        vec![
            ("name", FieldValue::opt_text(self.name.as_deref())),
            ("sensor", FieldValue::opt_oid(self.sensor)),
        ]
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Gravimeter this dataset was recorded with, if linked.
    pub fn sensor(&self) -> Option<Oid> {
        self.sensor
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = normalize_optional(name);
    }

    pub(crate) fn set_sensor(&mut self, sensor: Option<Oid>) {
        self.sensor = sensor;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSegmentSpec {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    pub label: Option<String>,
}

impl DataSegmentSpec {
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>) -> Self {
        Self {
            start,
            stop,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A labeled sub-range of a DataSet's time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
    oid: Oid,
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
    sequence: u32,
    label: Option<String>,
}

impl DataSegment {
    /// `sequence` is assigned by the owning controller.
    pub fn new(oid: Oid, spec: DataSegmentSpec, sequence: u32) -> Result<Self, ValidationError> {
        ensure_oid_kind(oid, EntityKind::DataSegment)?;
        validate_range(spec.start, spec.stop)?;
        Ok(Self {
            oid,
            start: spec.start,
            stop: spec.stop,
            sequence,
            label: normalize_optional(spec.label),
        })
    }

    pub(crate) fn from_fields(oid: Oid, fields: &mut FieldMap) -> Result<Self, ValidationError> {
        let spec = DataSegmentSpec {
            start: fields.timestamp("start")?,
            stop: fields.timestamp("stop")?,
            label: fields.opt_text("label")?,
        };
        let sequence = fields.int("sequence")?;
        let sequence = u32::try_from(sequence).map_err(|_| ValidationError::InvalidValue {
            field: "sequence",
            detail: format!("{sequence} is out of range"),
        })?;
        Self::new(oid, spec, sequence)
    }

    pub fn fields(&self) -> FieldList {
        vec![
            ("start", FieldValue::Timestamp(self.start)),
            ("stop", FieldValue::Timestamp(self.stop)),
            ("sequence", FieldValue::Int(i64::from(self.sequence))),
            ("label", FieldValue::opt_text(self.label.as_deref())),
        ]
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn stop(&self) -> DateTime<Utc> {
        self.stop
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Updates either bound; the resulting range is validated as a whole.
    pub fn set_range(
        &mut self,
        start: Option<DateTime<Utc>>,
        stop: Option<DateTime<Utc>>,
    ) -> Result<(), ValidationError> {
        let start = start.unwrap_or(self.start);
        let stop = stop.unwrap_or(self.stop);
        validate_range(start, stop)?;
        self.start = start;
        self.stop = stop;
        Ok(())
    }

    pub fn set_label(&mut self, label: Option<String>) {
        self.label = normalize_optional(label);
    }

    pub(crate) fn set_sequence(&mut self, sequence: u32) {
        self.sequence = sequence;
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.stop
    }
}

fn validate_range(start: DateTime<Utc>, stop: DateTime<Utc>) -> Result<(), ValidationError> {
    if start >= stop {
        return Err(ValidationError::InvalidRange {
            start: start.to_rfc3339(),
            stop: stop.to_rfc3339(),
        });
    }
    Ok(())
}
