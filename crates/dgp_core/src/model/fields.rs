//! Uniform field representation used to enumerate entity state.
//!
//! # Responsibility
//! - Give every entity one flat, enumerable list of named fields.
//! - Provide typed readers that turn decoded fields back into entity values.
//!
//! # Invariants
//! - Entities expose all persistent state through `fields()`; nothing hidden.
//! - Readers report absent fields as `MissingField`, wrong shapes as
//!   `InvalidValue`.

use crate::model::ValidationError;
use crate::oid::Oid;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Scalar attribute value used by project attributes and store attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(value) => f.write_str(value),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One entity field value.
///
/// `Path`, `Timestamp`, `Date` and `Oid` are non-primitive: the document
/// layer needs a registered codec for each of them.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
    Path(PathBuf),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Oid(Oid),
}

impl FieldValue {
    /// Registry name for non-primitive values, `None` for primitives.
    pub fn registered_type(&self) -> Option<&'static str> {
        match self {
            Self::Path(_) => Some("Path"),
            Self::Timestamp(_) => Some("datetime"),
            Self::Date(_) => Some("date"),
            Self::Oid(_) => Some("OID"),
            _ => None,
        }
    }

    pub fn from_scalar(value: &Scalar) -> Self {
        match value {
            Scalar::Text(text) => Self::Text(text.clone()),
            Scalar::Int(number) => Self::Int(*number),
            Scalar::Float(number) => Self::Float(*number),
            Scalar::Bool(flag) => Self::Bool(*flag),
        }
    }

    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(Self::Null, |text| Self::Text(text.to_string()))
    }

    pub fn opt_oid(value: Option<Oid>) -> Self {
        value.map_or(Self::Null, Self::Oid)
    }

    pub fn text_list(values: &[String]) -> Self {
        Self::List(values.iter().cloned().map(Self::Text).collect())
    }

    pub fn oid_list<'a>(values: impl IntoIterator<Item = &'a Oid>) -> Self {
        Self::List(values.into_iter().copied().map(Self::Oid).collect())
    }

    pub fn float_map(values: &BTreeMap<String, f64>) -> Self {
        Self::Map(
            values
                .iter()
                .map(|(key, value)| (key.clone(), Self::Float(*value)))
                .collect(),
        )
    }

    pub fn scalar_map(values: &BTreeMap<String, Scalar>) -> Self {
        Self::Map(
            values
                .iter()
                .map(|(key, value)| (key.clone(), Self::from_scalar(value)))
                .collect(),
        )
    }

    fn shape(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Path(_) => "Path",
            Self::Timestamp(_) => "datetime",
            Self::Date(_) => "date",
            Self::Oid(_) => "OID",
        }
    }
}

/// Named fields in declaration order.
pub type FieldList = Vec<(&'static str, FieldValue)>;

/// Consuming reader over decoded fields.
#[derive(Debug, Default, Clone)]
pub struct FieldMap {
    entries: BTreeMap<String, FieldValue>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.entries.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Takes a field, treating explicit `Null` as absent.
    pub fn take(&mut self, name: &str) -> Option<FieldValue> {
        match self.entries.remove(name) {
            Some(FieldValue::Null) | None => None,
            Some(value) => Some(value),
        }
    }

    fn require(&mut self, name: &'static str) -> Result<FieldValue, ValidationError> {
        self.take(name).ok_or(ValidationError::MissingField(name))
    }

    pub fn text(&mut self, name: &'static str) -> Result<String, ValidationError> {
        match self.require(name)? {
            FieldValue::Text(value) => Ok(value),
            other => Err(wrong_shape(name, "text", &other)),
        }
    }

    pub fn opt_text(&mut self, name: &'static str) -> Result<Option<String>, ValidationError> {
        match self.take(name) {
            None => Ok(None),
            Some(FieldValue::Text(value)) => Ok(Some(value)),
            Some(other) => Err(wrong_shape(name, "text", &other)),
        }
    }

    pub fn opt_int(&mut self, name: &'static str) -> Result<Option<i64>, ValidationError> {
        match self.take(name) {
            None => Ok(None),
            Some(FieldValue::Int(value)) => Ok(Some(value)),
            Some(other) => Err(wrong_shape(name, "int", &other)),
        }
    }

    pub fn int(&mut self, name: &'static str) -> Result<i64, ValidationError> {
        self.opt_int(name)?
            .ok_or(ValidationError::MissingField(name))
    }

    pub fn path(&mut self, name: &'static str) -> Result<PathBuf, ValidationError> {
        match self.require(name)? {
            FieldValue::Path(value) => Ok(value),
            FieldValue::Text(value) => Ok(PathBuf::from(value)),
            other => Err(wrong_shape(name, "Path", &other)),
        }
    }

    pub fn timestamp(&mut self, name: &'static str) -> Result<DateTime<Utc>, ValidationError> {
        match self.require(name)? {
            FieldValue::Timestamp(value) => Ok(value),
            other => Err(wrong_shape(name, "datetime", &other)),
        }
    }

    pub fn opt_date(&mut self, name: &'static str) -> Result<Option<NaiveDate>, ValidationError> {
        match self.take(name) {
            None => Ok(None),
            Some(FieldValue::Date(value)) => Ok(Some(value)),
            Some(other) => Err(wrong_shape(name, "date", &other)),
        }
    }

    pub fn oid(&mut self, name: &'static str) -> Result<Oid, ValidationError> {
        self.opt_oid(name)?
            .ok_or(ValidationError::MissingField(name))
    }

    pub fn opt_oid(&mut self, name: &'static str) -> Result<Option<Oid>, ValidationError> {
        match self.take(name) {
            None => Ok(None),
            Some(FieldValue::Oid(value)) => Ok(Some(value)),
            Some(other) => Err(wrong_shape(name, "OID", &other)),
        }
    }

    /// Missing list fields read as empty.
    pub fn oid_list(&mut self, name: &'static str) -> Result<Vec<Oid>, ValidationError> {
        let items = match self.take(name) {
            None => return Ok(Vec::new()),
            Some(FieldValue::List(items)) => items,
            Some(other) => return Err(wrong_shape(name, "list", &other)),
        };
        items
            .into_iter()
            .map(|item| match item {
                FieldValue::Oid(oid) => Ok(oid),
                other => Err(wrong_shape(name, "OID", &other)),
            })
            .collect()
    }

    pub fn text_list(&mut self, name: &'static str) -> Result<Vec<String>, ValidationError> {
        let items = match self.take(name) {
            None => return Ok(Vec::new()),
            Some(FieldValue::List(items)) => items,
            Some(other) => return Err(wrong_shape(name, "list", &other)),
        };
        items
            .into_iter()
            .map(|item| match item {
                FieldValue::Text(text) => Ok(text),
                other => Err(wrong_shape(name, "text", &other)),
            })
            .collect()
    }

    pub fn float_map(
        &mut self,
        name: &'static str,
    ) -> Result<BTreeMap<String, f64>, ValidationError> {
        let entries = match self.take(name) {
            None => return Ok(BTreeMap::new()),
            Some(FieldValue::Map(entries)) => entries,
            Some(other) => return Err(wrong_shape(name, "map", &other)),
        };
        entries
            .into_iter()
            .map(|(key, value)| match value {
                FieldValue::Float(number) => Ok((key, number)),
                FieldValue::Int(number) => Ok((key, number as f64)),
                other => Err(wrong_shape(name, "float", &other)),
            })
            .collect()
    }

    pub fn scalar_map(
        &mut self,
        name: &'static str,
    ) -> Result<BTreeMap<String, Scalar>, ValidationError> {
        let entries = match self.take(name) {
            None => return Ok(BTreeMap::new()),
            Some(FieldValue::Map(entries)) => entries,
            Some(other) => return Err(wrong_shape(name, "map", &other)),
        };
        entries
            .into_iter()
            .map(|(key, value)| {
                let scalar = match value {
                    FieldValue::Text(text) => Scalar::Text(text),
                    FieldValue::Int(number) => Scalar::Int(number),
                    FieldValue::Float(number) => Scalar::Float(number),
                    FieldValue::Bool(flag) => Scalar::Bool(flag),
                    other => return Err(wrong_shape(name, "scalar", &other)),
                };
                Ok((key, scalar))
            })
            .collect()
    }
}

fn wrong_shape(field: &'static str, expected: &str, actual: &FieldValue) -> ValidationError {
    ValidationError::InvalidValue {
        field,
        detail: format!("expected {expected}, found {}", actual.shape()),
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldMap, FieldValue, Scalar};
    use crate::model::ValidationError;
    use std::collections::BTreeMap;

    #[test]
    fn null_reads_as_absent() {
        let mut map = FieldMap::new();
        map.insert("description", FieldValue::Null);
        assert_eq!(map.opt_text("description").unwrap(), None);
        assert_eq!(
            map.text("name").unwrap_err(),
            ValidationError::MissingField("name")
        );
    }

    #[test]
    fn float_map_accepts_integer_entries() {
        let mut entries = BTreeMap::new();
        entries.insert("g0".to_string(), FieldValue::Int(10));
        entries.insert("gravcal".to_string(), FieldValue::Float(0.5));
        let mut map = FieldMap::new();
        map.insert("calibration", FieldValue::Map(entries));

        let calibration = map.float_map("calibration").unwrap();
        assert_eq!(calibration["g0"], 10.0);
        assert_eq!(calibration["gravcal"], 0.5);
    }

    #[test]
    fn wrong_shape_is_invalid_value() {
        let mut map = FieldMap::new();
        map.insert("name", FieldValue::Int(3));
        assert!(matches!(
            map.text("name"),
            Err(ValidationError::InvalidValue { field: "name", .. })
        ));
    }

    #[test]
    fn scalar_float_view_widens_ints() {
        assert_eq!(Scalar::Int(4).as_float(), Some(4.0));
        assert_eq!(Scalar::from("x").as_float(), None);
    }
}
