//! DataFile entity: reference to one ingested raw file.
//!
//! A DataFile never holds measurement data; it is the address used to reach
//! the table kept in the project's binary store.
//!
//! # Invariants
//! - `kind` and `oid` are fixed at creation, so `store_key()` never changes.

use crate::model::fields::{FieldList, FieldMap, FieldValue};
use crate::model::validation::{ensure_oid_kind, normalize_optional};
use crate::model::{DataKind, EntityKind, ValidationError};
use crate::oid::Oid;
use crate::store::StoreKey;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct DataFileSpec {
    pub kind: DataKind,
    pub source_path: PathBuf,
    pub name: Option<String>,
    pub column_format: Vec<String>,
    pub ingested_at: Option<DateTime<Utc>>,
}

impl DataFileSpec {
    pub fn new(kind: DataKind, source_path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            source_path: source_path.into(),
            name: None,
            column_format: Vec::new(),
            ingested_at: None,
        }
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.column_format = columns;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataFile {
    oid: Oid,
    kind: DataKind,
    source_path: PathBuf,
    name: String,
    column_format: Vec<String>,
    ingested_at: DateTime<Utc>,
}

impl DataFile {
    pub fn new(oid: Oid, spec: DataFileSpec) -> Result<Self, ValidationError> {
        ensure_oid_kind(oid, EntityKind::DataFile)?;
        if spec.source_path.as_os_str().is_empty() {
            return Err(ValidationError::BlankField("source_path"));
        }
        if let Some(blank) = spec.column_format.iter().position(|c| c.trim().is_empty()) {
            return Err(ValidationError::InvalidValue {
                field: "column_format",
                detail: format!("column {blank} has a blank name"),
            });
        }
        let name = normalize_optional(spec.name)
            .or_else(|| {
                let file_name = spec.source_path.file_name()?;
                normalize_optional(Some(file_name.to_string_lossy().into_owned()))
            })
            .ok_or(ValidationError::MissingField("name"))?;
        Ok(Self {
            oid,
            kind: spec.kind,
            source_path: spec.source_path,
            name,
            column_format: spec.column_format,
            ingested_at: spec.ingested_at.unwrap_or_else(Utc::now),
        })
    }

    pub(crate) fn from_fields(oid: Oid, fields: &mut FieldMap) -> Result<Self, ValidationError> {
        let group = fields.text("group")?;
        let kind = DataKind::parse(&group).ok_or_else(|| ValidationError::InvalidValue {
            field: "group",
            detail: format!("unknown data kind `{group}`"),
        })?;
        let spec = DataFileSpec {
            kind,
            source_path: fields.path("source_path")?,
            name: Some(fields.text("name")?),
            column_format: fields.text_list("column_format")?,
            ingested_at: Some(fields.timestamp("date")?),
        };
        Self::new(oid, spec)
    }

    pub fn fields(&self) -> FieldList {
        vec![
            ("group", FieldValue::Text(self.kind.as_str().to_string())),
            ("date", FieldValue::Timestamp(self.ingested_at)),
            ("source_path", FieldValue::Path(self.source_path.clone())),
            ("name", FieldValue::Text(self.name.clone())),
            ("column_format", FieldValue::text_list(&self.column_format)),
        ]
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn kind(&self) -> DataKind {
        self.kind
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_format(&self) -> &[String] {
        &self.column_format
    }

    pub fn ingested_at(&self) -> DateTime<Utc> {
        self.ingested_at
    }

    pub fn store_key(&self) -> StoreKey {
        StoreKey::for_datafile(self.kind, self.oid)
    }

    /// Display label, e.g. `[gravity] flight1.dat`.
    pub fn label(&self) -> String {
        format!("[{}] {}", self.kind, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::{DataFile, DataFileSpec};
    use crate::model::{DataKind, EntityKind, ValidationError};
    use crate::oid::Oid;

    #[test]
    fn name_defaults_to_file_name() {
        let oid = Oid::new(EntityKind::DataFile);
        let file = DataFile::new(
            oid,
            DataFileSpec::new(DataKind::Gravity, "/raw/2018/at1a_0309.dat"),
        )
        .unwrap();
        assert_eq!(file.name(), "at1a_0309.dat");
        assert_eq!(file.label(), "[gravity] at1a_0309.dat");
        assert_eq!(
            file.store_key().as_str(),
            format!("/gravity/_{}", oid.base_uuid())
        );
    }

    #[test]
    fn default_name_is_trimmed_like_decoded_names() {
        let spec = DataFileSpec::new(DataKind::Gravity, "/raw/ at1a.dat ");
        let file = DataFile::new(Oid::new(EntityKind::DataFile), spec).unwrap();
        assert_eq!(file.name(), "at1a.dat");

        let spec = DataFileSpec::new(DataKind::Gravity, "/raw/   ");
        assert!(matches!(
            DataFile::new(Oid::new(EntityKind::DataFile), spec),
            Err(ValidationError::MissingField("name"))
        ));
    }

    #[test]
    fn blank_columns_are_rejected() {
        let spec = DataFileSpec::new(DataKind::Trajectory, "/raw/gps.txt")
            .with_columns(vec!["lat".to_string(), " ".to_string()]);
        assert!(matches!(
            DataFile::new(Oid::new(EntityKind::DataFile), spec),
            Err(ValidationError::InvalidValue {
                field: "column_format",
                ..
            })
        ));
    }
}
