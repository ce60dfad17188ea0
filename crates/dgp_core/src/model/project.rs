//! Project root entity.
//!
//! # Invariants
//! - `name` is non-blank and trimmed.
//! - `modified_at` is never earlier than `created_at`.

use crate::model::fields::{FieldList, FieldMap, FieldValue, Scalar};
use crate::model::validation::{
    ensure_oid_kind, normalize_map_key, normalize_optional, normalize_required,
};
use crate::model::{EntityKind, ValidationError};
use crate::oid::Oid;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Input for creating a new project root.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSpec {
    pub name: String,
    pub path: PathBuf,
    pub description: Option<String>,
}

impl ProjectSpec {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A survey campaign; root of every project tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    oid: Oid,
    name: String,
    path: PathBuf,
    description: Option<String>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    attributes: BTreeMap<String, Scalar>,
}

impl Project {
    pub fn new(oid: Oid, spec: ProjectSpec) -> Result<Self, ValidationError> {
        ensure_oid_kind(oid, EntityKind::Project)?;
        let path = validate_path(spec.path)?;
        let now = Utc::now();
        Ok(Self {
            oid,
            name: normalize_required("name", spec.name)?,
            path,
            description: normalize_optional(spec.description),
            created_at: now,
            modified_at: now,
            attributes: BTreeMap::new(),
        })
    }

    pub(crate) fn from_fields(oid: Oid, fields: &mut FieldMap) -> Result<Self, ValidationError> {
        ensure_oid_kind(oid, EntityKind::Project)?;
        let created_at = fields.timestamp("create_date")?;
        let modified_at = fields.timestamp("modify_date")?;
        if modified_at < created_at {
            return Err(ValidationError::InvalidValue {
                field: "modify_date",
                detail: "earlier than create_date".to_string(),
            });
        }
        Ok(Self {
            oid,
            name: normalize_required("name", fields.text("name")?)?,
            path: validate_path(fields.path("path")?)?,
            description: normalize_optional(fields.opt_text("description")?),
            created_at,
            modified_at,
            attributes: fields
                .scalar_map("attributes")?
                .into_iter()
                .map(|(key, value)| validate_attribute(key, value))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn fields(&self) -> FieldList {
        vec![
            ("name", FieldValue::Text(self.name.clone())),
            ("path", FieldValue::Path(self.path.clone())),
            ("description", FieldValue::opt_text(self.description.as_deref())),
            ("create_date", FieldValue::Timestamp(self.created_at)),
            ("modify_date", FieldValue::Timestamp(self.modified_at)),
            ("attributes", FieldValue::scalar_map(&self.attributes)),
        ]
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn attributes(&self) -> &BTreeMap<String, Scalar> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&Scalar> {
        self.attributes.get(key)
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), ValidationError> {
        self.name = normalize_required("name", name)?;
        Ok(())
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = normalize_optional(description);
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) -> Result<(), ValidationError> {
        self.path = validate_path(path.into())?;
        Ok(())
    }

    /// Sets one free-form attribute.
    ///
    /// Keys are trimmed; `_type` and non-finite floats are rejected since the
    /// project document cannot hold them.
    pub fn set_attribute(
        &mut self,
        key: impl Into<String>,
        value: Scalar,
    ) -> Result<(), ValidationError> {
        let (key, value) = validate_attribute(key.into(), value)?;
        self.attributes.insert(key, value);
        Ok(())
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<Scalar> {
        self.attributes.remove(key)
    }

    /// Advances the modification time; never moves it backwards.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.modified_at {
            self.modified_at = at;
        }
    }
}

fn validate_attribute(key: String, value: Scalar) -> Result<(String, Scalar), ValidationError> {
    let key = normalize_map_key("attributes", key)?;
    if let Scalar::Float(number) = value {
        if !number.is_finite() {
            return Err(ValidationError::InvalidValue {
                field: "attributes",
                detail: format!("`{key}` must be finite"),
            });
        }
    }
    Ok((key, value))
}

fn validate_path(path: PathBuf) -> Result<PathBuf, ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::BlankField("path"));
    }
    Ok(path)
}
