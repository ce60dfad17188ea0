//! Validation errors shared by entity construction and tree operations.

use crate::model::{DataKind, EntityKind};
use crate::oid::Oid;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Invalid entity data or invalid tree operation.
///
/// Returned before any mutation happens; a caller receiving this error can
/// assume the tree is unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Required text field is blank after trim.
    BlankField(&'static str),
    /// Required field is absent.
    MissingField(&'static str),
    /// Field is present but has the wrong shape or an out-of-range value.
    InvalidValue { field: &'static str, detail: String },
    /// Date text could not be parsed.
    InvalidDate(String),
    /// Segment start is not strictly before its stop.
    InvalidRange { start: String, stop: String },
    /// Parent kind cannot own child kind.
    InvalidChildType { parent: EntityKind, child: EntityKind },
    /// Move would place a node under itself or one of its descendants.
    CycleDetected { node: Oid, parent: Oid },
    /// Identifier is already present in the tree.
    DuplicateIdentifier(Oid),
    /// Target node does not exist.
    NodeNotFound(Oid),
    /// Parent node does not exist.
    ParentNotFound(Oid),
    /// Reference target does not exist.
    LinkTargetNotFound(Oid),
    /// Holder kind cannot reference target kind.
    InvalidLink { holder: EntityKind, target: EntityKind },
    /// DataSet already holds a file of this kind.
    SlotOccupied { dataset: Oid, kind: DataKind },
    /// The project root cannot be removed or re-parented.
    RootImmutable(Oid),
    /// Node exists but is not the requested kind.
    KindMismatch {
        node: Oid,
        expected: EntityKind,
        actual: EntityKind,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "field `{field}` must not be blank"),
            Self::MissingField(field) => write!(f, "required field `{field}` is missing"),
            Self::InvalidValue { field, detail } => {
                write!(f, "invalid value for `{field}`: {detail}")
            }
            Self::InvalidDate(value) => write!(f, "unparsable date `{value}`"),
            Self::InvalidRange { start, stop } => {
                write!(f, "segment start {start} must be before stop {stop}")
            }
            Self::InvalidChildType { parent, child } => {
                write!(f, "{parent} cannot own a {child}")
            }
            Self::CycleDetected { node, parent } => {
                write!(f, "move would create cycle: node {node} under parent {parent}")
            }
            Self::DuplicateIdentifier(id) => write!(f, "identifier already in use: {id}"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent not found: {id}"),
            Self::LinkTargetNotFound(id) => write!(f, "reference target not found: {id}"),
            Self::InvalidLink { holder, target } => {
                write!(f, "{holder} cannot reference a {target}")
            }
            Self::SlotOccupied { dataset, kind } => {
                write!(f, "dataset {dataset} already has a {kind} file")
            }
            Self::RootImmutable(id) => write!(f, "project root {id} cannot be removed or moved"),
            Self::KindMismatch {
                node,
                expected,
                actual,
            } => write!(f, "node {node} is a {actual}, expected {expected}"),
        }
    }
}

impl Error for ValidationError {}

/// Rejects identifiers minted for a different entity kind.
pub(crate) fn ensure_oid_kind(oid: Oid, expected: EntityKind) -> Result<(), ValidationError> {
    if oid.kind() != expected {
        return Err(ValidationError::KindMismatch {
            node: oid,
            expected,
            actual: oid.kind(),
        });
    }
    Ok(())
}

/// Trims `value` and rejects blank results.
pub(crate) fn normalize_required(
    field: &'static str,
    value: impl Into<String>,
) -> Result<String, ValidationError> {
    let value = value.into();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(trimmed.to_string())
}

/// Member name the project document uses to tag typed values.
pub(crate) const RESERVED_MAP_KEY: &str = "_type";

/// Normalizes a key of a free-form map field.
pub(crate) fn normalize_map_key(
    field: &'static str,
    key: impl Into<String>,
) -> Result<String, ValidationError> {
    let key = normalize_required(field, key)?;
    if key == RESERVED_MAP_KEY {
        return Err(ValidationError::InvalidValue {
            field,
            detail: format!("key `{RESERVED_MAP_KEY}` is reserved"),
        });
    }
    Ok(key)
}

/// Trims `value`, mapping blank input to `None`.
pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{normalize_map_key, normalize_optional, normalize_required, ValidationError};

    #[test]
    fn normalize_required_trims_and_rejects_blank() {
        assert_eq!(normalize_required("name", "  Alpha ").unwrap(), "Alpha");
        assert_eq!(
            normalize_required("name", " \t").unwrap_err(),
            ValidationError::BlankField("name")
        );
    }

    #[test]
    fn normalize_optional_drops_blank() {
        assert_eq!(normalize_optional(Some("  ".to_string())), None);
        assert_eq!(
            normalize_optional(Some(" x ".to_string())),
            Some("x".to_string())
        );
    }

    #[test]
    fn normalize_map_key_rejects_reserved_tag() {
        assert_eq!(normalize_map_key("attributes", " drift ").unwrap(), "drift");
        assert!(matches!(
            normalize_map_key("attributes", "_type"),
            Err(ValidationError::InvalidValue {
                field: "attributes",
                ..
            })
        ));
        assert!(matches!(
            normalize_map_key("attributes", "  "),
            Err(ValidationError::BlankField("attributes"))
        ));
    }
}
