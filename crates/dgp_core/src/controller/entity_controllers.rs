//! Typed controllers scoped to one entity.
//!
//! Each borrows the project controller mutably, so every operation still
//! runs through the same validation, notification and hook path.

use crate::controller::{ControllerResult, ProjectController};
use crate::model::{
    parse_flight_date, DataFileSpec, DataKind, DataSegmentSpec, DataSetSpec, EntityKind,
    EntityRecord, FlightSpec, GravimeterSpec, MeterType, ValidationError,
};
use crate::oid::Oid;
use chrono::{DateTime, NaiveDate, Utc};

impl ProjectController {
    pub fn add_flight(&mut self, spec: FlightSpec) -> ControllerResult<Oid> {
        let root = self.root_id();
        self.add_child(root, spec)
    }

    pub fn add_gravimeter(&mut self, spec: GravimeterSpec) -> ControllerResult<Oid> {
        let root = self.root_id();
        self.add_child(root, spec)
    }

    pub fn flight(&mut self, oid: Oid) -> ControllerResult<FlightController<'_>> {
        self.ensure_kind(oid, EntityKind::Flight)?;
        Ok(FlightController {
            controller: self,
            oid,
        })
    }

    pub fn dataset(&mut self, oid: Oid) -> ControllerResult<DataSetController<'_>> {
        self.ensure_kind(oid, EntityKind::DataSet)?;
        Ok(DataSetController {
            controller: self,
            oid,
        })
    }

    pub fn gravimeter(&mut self, oid: Oid) -> ControllerResult<GravimeterController<'_>> {
        self.ensure_kind(oid, EntityKind::Gravimeter)?;
        Ok(GravimeterController {
            controller: self,
            oid,
        })
    }
}

pub struct FlightController<'c> {
    controller: &'c mut ProjectController,
    oid: Oid,
}

impl FlightController<'_> {
    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn rename(&mut self, name: impl Into<String>) -> ControllerResult<()> {
        self.controller.rename(self.oid, name)
    }

    pub fn set_date(&mut self, date: Option<NaiveDate>) -> ControllerResult<()> {
        self.controller
            .update_as(self.oid, "date", EntityRecord::as_flight_mut, |flight| {
                flight.set_date(date);
                Ok(())
            })
    }

    /// Parses user text; an unparsable date leaves the flight unchanged.
    pub fn set_date_text(&mut self, text: &str) -> ControllerResult<()> {
        let date = parse_flight_date(text)?;
        self.set_date(Some(date))
    }

    pub fn set_sequence(&mut self, sequence: Option<u32>) -> ControllerResult<()> {
        self.controller
            .update_as(self.oid, "sequence", EntityRecord::as_flight_mut, |flight| {
                flight.set_sequence(sequence);
                Ok(())
            })
    }

    pub fn set_notes(&mut self, notes: Option<String>) -> ControllerResult<()> {
        self.controller
            .update_as(self.oid, "notes", EntityRecord::as_flight_mut, |flight| {
                flight.set_notes(notes);
                Ok(())
            })
    }

    pub fn add_dataset(&mut self, spec: DataSetSpec) -> ControllerResult<Oid> {
        self.controller.add_child(self.oid, spec)
    }

    pub fn datasets(&self) -> Vec<Oid> {
        self.controller
            .tree()
            .children_of_kind(self.oid, EntityKind::DataSet)
    }

    pub fn link_gravimeter(&mut self, meter: Oid) -> ControllerResult<bool> {
        self.controller.link(self.oid, meter)
    }

    pub fn unlink_gravimeter(&mut self, meter: Oid) -> ControllerResult<bool> {
        self.controller.unlink(self.oid, meter)
    }

    pub fn activate(&mut self) -> ControllerResult<()> {
        self.controller.set_active_flight(Some(self.oid))
    }
}

pub struct DataSetController<'c> {
    controller: &'c mut ProjectController,
    oid: Oid,
}

impl DataSetController<'_> {
    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn rename(&mut self, name: Option<String>) -> ControllerResult<()> {
        self.controller
            .update_as(self.oid, "name", EntityRecord::as_dataset_mut, |dataset| {
                dataset.set_name(name);
                Ok(())
            })
    }

    /// Links the sensor, or clears it when `meter` is `None`.
    pub fn set_sensor(&mut self, meter: Option<Oid>) -> ControllerResult<bool> {
        match meter {
            Some(meter) => self.controller.link(self.oid, meter),
            None => {
                let current = self
                    .controller
                    .find(self.oid)
                    .and_then(EntityRecord::as_dataset)
                    .and_then(|dataset| dataset.sensor());
                match current {
                    Some(current) => self.controller.unlink(self.oid, current),
                    None => Ok(false),
                }
            }
        }
    }

    pub fn add_segment(&mut self, spec: DataSegmentSpec) -> ControllerResult<Oid> {
        self.controller.add_child(self.oid, spec)
    }

    /// Changes either bound of an owned segment.
    pub fn update_segment(
        &mut self,
        segment: Oid,
        start: Option<DateTime<Utc>>,
        stop: Option<DateTime<Utc>>,
    ) -> ControllerResult<()> {
        self.ensure_owned(segment)?;
        self.controller
            .update_as(segment, "range", EntityRecord::as_segment_mut, |entity| {
                entity.set_range(start, stop)
            })
    }

    pub fn set_segment_label(&mut self, segment: Oid, label: Option<String>) -> ControllerResult<()> {
        self.ensure_owned(segment)?;
        self.controller
            .update_as(segment, "label", EntityRecord::as_segment_mut, |entity| {
                entity.set_label(label);
                Ok(())
            })
    }

    pub fn remove_segment(&mut self, segment: Oid) -> ControllerResult<()> {
        self.ensure_owned(segment)?;
        self.controller.remove(segment).map(|_| ())
    }

    /// Adds a DataFile reference, minting its identifier.
    pub fn add_file(&mut self, spec: DataFileSpec) -> ControllerResult<Oid> {
        self.controller.add_child(self.oid, spec)
    }

    /// Attaches an imported DataFile whose identifier and table already exist.
    pub fn attach_file(&mut self, oid: Oid, spec: DataFileSpec) -> ControllerResult<()> {
        self.controller.attach_data_file(self.oid, oid, spec)
    }

    pub fn file(&self, kind: DataKind) -> Option<Oid> {
        self.controller
            .tree()
            .slot(self.oid, kind)
            .map(|file| file.oid())
    }

    pub fn gravity(&self) -> Option<Oid> {
        self.file(DataKind::Gravity)
    }

    pub fn trajectory(&self) -> Option<Oid> {
        self.file(DataKind::Trajectory)
    }

    pub fn segments(&self) -> Vec<Oid> {
        self.controller
            .tree()
            .children_of_kind(self.oid, EntityKind::DataSegment)
    }

    fn ensure_owned(&self, child: Oid) -> Result<(), ValidationError> {
        if self.controller.tree().parent_of(child) != Some(self.oid) {
            return Err(ValidationError::NodeNotFound(child));
        }
        Ok(())
    }
}

pub struct GravimeterController<'c> {
    controller: &'c mut ProjectController,
    oid: Oid,
}

impl GravimeterController<'_> {
    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn rename(&mut self, name: impl Into<String>) -> ControllerResult<()> {
        self.controller.rename(self.oid, name)
    }

    pub fn set_meter_type(&mut self, meter_type: MeterType) -> ControllerResult<()> {
        self.controller
            .update_as(self.oid, "type", EntityRecord::as_gravimeter_mut, |meter| {
                meter.set_meter_type(meter_type);
                Ok(())
            })
    }

    pub fn set_calibration(&mut self, key: &str, value: f64) -> ControllerResult<()> {
        self.controller.update_as(
            self.oid,
            "calibration",
            EntityRecord::as_gravimeter_mut,
            |meter| meter.set_calibration(key, value),
        )
    }

    /// Flights currently referencing this gravimeter.
    pub fn flights(&self) -> Vec<Oid> {
        self.controller
            .tree()
            .referrers(self.oid)
            .into_iter()
            .filter(|oid| oid.kind() == EntityKind::Flight)
            .collect()
    }
}
