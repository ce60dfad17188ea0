//! Project document store.
//!
//! # Responsibility
//! - Encode a project tree into a versioned JSON document and back.
//! - Map non-primitive field types through a type registry.
//! - Read and write the project document file inside a project directory.
//!
//! # Invariants
//! - `load(save(tree))` reproduces the same identifiers, field values and
//!   ownership edges.
//! - Decoding re-runs live entity validation and tree rules, and never
//!   returns a partially built tree.

use crate::model::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod codec;
mod file;
mod registry;

pub use codec::{load, save, DocumentCodec, GENERATOR, SCHEMA_VERSION};
pub use file::{load_from_dir, locate_project_document, save_to_dir, PROJECT_DOCUMENT_NAME};
pub use registry::{TypeRegistry, ValueCodec};

pub type SerializationResult<T> = Result<T, SerializationError>;

/// Errors from document encode/decode and project file I/O.
#[derive(Debug)]
pub enum SerializationError {
    /// Bytes are not valid JSON.
    Json(serde_json::Error),
    /// Project document file could not be read or written.
    Io(std::io::Error),
    /// Document was written by an incompatible schema version.
    VersionMismatch { found: u64, supported: u32 },
    /// Required document member is absent.
    MissingField(String),
    /// Document member has the wrong JSON shape.
    Malformed { field: String, detail: String },
    /// Field value type has no registered codec.
    UnregisteredType(String),
    /// Document names a `_type` this build does not know.
    UnknownType(String),
    /// Floats must be finite to be representable in JSON.
    NonFiniteFloat(String),
    /// Decoded data violates entity or tree rules.
    Invalid(ValidationError),
    /// No project document exists under the given directory.
    DocumentNotFound(PathBuf),
}

impl SerializationError {
    /// Whether the failure prevents identifying the project at all.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Json(_) | Self::VersionMismatch { .. } | Self::DocumentNotFound(_)
        ) || matches!(self, Self::MissingField(field) if field == "root")
    }
}

impl Display for SerializationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid project document json: {err}"),
            Self::Io(err) => write!(f, "project document io failed: {err}"),
            Self::VersionMismatch { found, supported } => write!(
                f,
                "project document schema version {found} is not supported (expected {supported})"
            ),
            Self::MissingField(field) => write!(f, "project document is missing `{field}`"),
            Self::Malformed { field, detail } => {
                write!(f, "project document member `{field}` is malformed: {detail}")
            }
            Self::UnregisteredType(name) => write!(f, "no codec registered for type `{name}`"),
            Self::UnknownType(name) => write!(f, "unknown encoded type `{name}`"),
            Self::NonFiniteFloat(field) => {
                write!(f, "field `{field}` holds a non-finite float")
            }
            Self::Invalid(err) => write!(f, "project document is invalid: {err}"),
            Self::DocumentNotFound(dir) => {
                write!(f, "no project document found under {}", dir.display())
            }
        }
    }
}

impl Error for SerializationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Invalid(err) => Some(err),
            Self::VersionMismatch { .. }
            | Self::MissingField(_)
            | Self::Malformed { .. }
            | Self::UnregisteredType(_)
            | Self::UnknownType(_)
            | Self::NonFiniteFloat(_)
            | Self::DocumentNotFound(_) => None,
        }
    }
}

impl From<serde_json::Error> for SerializationError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<std::io::Error> for SerializationError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ValidationError> for SerializationError {
    fn from(value: ValidationError) -> Self {
        Self::Invalid(value)
    }
}
