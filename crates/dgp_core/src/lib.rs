//! Core project model, persistence and import for airborne gravity surveys.
//! This crate is the single source of truth for tree, storage and import
//! invariants.

pub mod config;
pub mod controller;
pub mod db;
pub mod document;
pub mod import;
pub mod logging;
pub mod model;
pub mod oid;
pub mod session;
pub mod store;

pub use config::CoreConfig;
pub use controller::{
    ChildSpec, ControllerError, ControllerResult, DataSetController, FlightController,
    GravimeterController, ProjectController, ProjectEvent, ProjectTree, SubscriptionId,
};
pub use document::{load, save, SerializationError, SerializationResult};
pub use import::{
    ImportConfig, ImportError, ImportOutcome, ImportPipeline, ImportedFile, JobHandle, JobState,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::{
    DataFile, DataFileSpec, DataKind, DataSegment, DataSegmentSpec, DataSet, DataSetSpec,
    EntityKind, EntityRecord, Flight, FlightSpec, Gravimeter, GravimeterSpec, MeterType, Project,
    ProjectSpec, Scalar, ValidationError,
};
pub use oid::{Oid, OidParseError};
pub use session::{ImportReport, ProjectSession, SessionError, SessionResult};
pub use store::{
    SeriesStore, SqliteSeriesStore, StorageError, StoreAttrs, StoreKey, StoreResult,
    TimeSeriesTable,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
