//! Project entity model.
//!
//! # Responsibility
//! - Define plain, validated-on-construction records for every entity kind.
//! - Expose each entity's persistent state as an enumerable field list.
//!
//! # Invariants
//! - Every entity carries one `Oid`, assigned at creation, never reassigned.
//! - Entities hold other entities only by `Oid`, never by reference.
//! - Entities contain no cross-entity logic; tree rules live in `controller`.

pub mod datafile;
pub mod dataset;
pub mod fields;
pub mod flight;
pub mod kind;
pub mod meter;
pub mod project;
pub mod record;
pub mod validation;

pub use datafile::{DataFile, DataFileSpec};
pub use dataset::{DataSegment, DataSegmentSpec, DataSet, DataSetSpec};
pub use fields::{FieldList, FieldMap, FieldValue, Scalar};
pub use flight::{parse_flight_date, Flight, FlightSpec};
pub use kind::{DataKind, EntityKind};
pub use meter::{Gravimeter, GravimeterSpec, MeterType};
pub use project::{Project, ProjectSpec};
pub use record::EntityRecord;
pub use validation::ValidationError;
