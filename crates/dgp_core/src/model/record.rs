//! Type-erased entity record stored in the project arena.

use crate::model::fields::{FieldList, FieldMap};
use crate::model::{
    DataFile, DataSegment, DataSet, EntityKind, Flight, Gravimeter, Project, ValidationError,
};
use crate::oid::Oid;

/// One entity of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityRecord {
    Project(Project),
    Flight(Flight),
    DataSet(DataSet),
    DataFile(DataFile),
    DataSegment(DataSegment),
    Gravimeter(Gravimeter),
}

impl EntityRecord {
    pub fn oid(&self) -> Oid {
        match self {
            Self::Project(entity) => entity.oid(),
            Self::Flight(entity) => entity.oid(),
            Self::DataSet(entity) => entity.oid(),
            Self::DataFile(entity) => entity.oid(),
            Self::DataSegment(entity) => entity.oid(),
            Self::Gravimeter(entity) => entity.oid(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Project(_) => EntityKind::Project,
            Self::Flight(_) => EntityKind::Flight,
            Self::DataSet(_) => EntityKind::DataSet,
            Self::DataFile(_) => EntityKind::DataFile,
            Self::DataSegment(_) => EntityKind::DataSegment,
            Self::Gravimeter(_) => EntityKind::Gravimeter,
        }
    }

    /// Serializable fields, excluding identity and tree edges.
    pub fn fields(&self) -> FieldList {
        match self {
            Self::Project(entity) => entity.fields(),
            Self::Flight(entity) => entity.fields(),
            Self::DataSet(entity) => entity.fields(),
            Self::DataFile(entity) => entity.fields(),
            Self::DataSegment(entity) => entity.fields(),
            Self::Gravimeter(entity) => entity.fields(),
        }
    }

    /// Rebuilds an entity from decoded fields, running live validation.
    pub fn from_fields(oid: Oid, fields: &mut FieldMap) -> Result<Self, ValidationError> {
        Ok(match oid.kind() {
            EntityKind::Project => Self::Project(Project::from_fields(oid, fields)?),
            EntityKind::Flight => Self::Flight(Flight::from_fields(oid, fields)?),
            EntityKind::DataSet => Self::DataSet(DataSet::from_fields(oid, fields)?),
            EntityKind::DataFile => Self::DataFile(DataFile::from_fields(oid, fields)?),
            EntityKind::DataSegment => Self::DataSegment(DataSegment::from_fields(oid, fields)?),
            EntityKind::Gravimeter => Self::Gravimeter(Gravimeter::from_fields(oid, fields)?),
        })
    }

    /// Short human label for logs and tree views.
    pub fn label(&self) -> String {
        match self {
            Self::Project(entity) => entity.name().to_string(),
            Self::Flight(entity) => entity.name().to_string(),
            Self::DataSet(entity) => entity.name().unwrap_or("DataSet").to_string(),
            Self::DataFile(entity) => entity.label(),
            Self::DataSegment(entity) => entity
                .label()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Segment {}", entity.sequence())),
            Self::Gravimeter(entity) => entity.name().to_string(),
        }
    }

    /// Non-owning references held by this entity.
    pub fn references(&self) -> Vec<Oid> {
        match self {
            Self::Flight(flight) => flight.gravimeters().to_vec(),
            Self::DataSet(dataset) => dataset.sensor().into_iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn as_project(&self) -> Option<&Project> {
        match self {
            Self::Project(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_flight(&self) -> Option<&Flight> {
        match self {
            Self::Flight(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_dataset(&self) -> Option<&DataSet> {
        match self {
            Self::DataSet(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_datafile(&self) -> Option<&DataFile> {
        match self {
            Self::DataFile(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_segment(&self) -> Option<&DataSegment> {
        match self {
            Self::DataSegment(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_gravimeter(&self) -> Option<&Gravimeter> {
        match self {
            Self::Gravimeter(entity) => Some(entity),
            _ => None,
        }
    }

    pub(crate) fn as_project_mut(&mut self) -> Option<&mut Project> {
        match self {
            Self::Project(entity) => Some(entity),
            _ => None,
        }
    }

    pub(crate) fn as_flight_mut(&mut self) -> Option<&mut Flight> {
        match self {
            Self::Flight(entity) => Some(entity),
            _ => None,
        }
    }

    pub(crate) fn as_dataset_mut(&mut self) -> Option<&mut DataSet> {
        match self {
            Self::DataSet(entity) => Some(entity),
            _ => None,
        }
    }

    pub(crate) fn as_segment_mut(&mut self) -> Option<&mut DataSegment> {
        match self {
            Self::DataSegment(entity) => Some(entity),
            _ => None,
        }
    }

    pub(crate) fn as_gravimeter_mut(&mut self) -> Option<&mut Gravimeter> {
        match self {
            Self::Gravimeter(entity) => Some(entity),
            _ => None,
        }
    }
}
