//! Type registry for non-primitive document values.
//!
//! Every non-primitive value is written as a JSON object tagged with
//! `_type`, e.g. `{"_type": "Path", "path": "/data/survey"}`.

use crate::document::{SerializationError, SerializationResult};
use crate::model::{EntityKind, FieldValue};
use crate::oid::Oid;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub(crate) const TYPE_TAG: &str = "_type";

/// Canonical encode/decode pair for one registered type.
#[derive(Clone, Copy)]
pub struct ValueCodec {
    /// Returns the object members, excluding the `_type` tag.
    pub encode: fn(&FieldValue) -> SerializationResult<Map<String, Value>>,
    pub decode: fn(&Map<String, Value>) -> SerializationResult<FieldValue>,
}

/// Maps `_type` names to codecs.
#[derive(Clone)]
pub struct TypeRegistry {
    codecs: BTreeMap<String, ValueCodec>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(
            "Path",
            ValueCodec {
                encode: encode_path,
                decode: decode_path,
            },
        );
        registry.register(
            "datetime",
            ValueCodec {
                encode: encode_timestamp,
                decode: decode_timestamp,
            },
        );
        registry.register(
            "date",
            ValueCodec {
                encode: encode_date,
                decode: decode_date,
            },
        );
        registry.register(
            "OID",
            ValueCodec {
                encode: encode_oid,
                decode: decode_oid,
            },
        );
        registry
    }
}

impl TypeRegistry {
    /// Registry with no codecs; every non-primitive value fails to encode.
    pub fn empty() -> Self {
        Self {
            codecs: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, codec: ValueCodec) -> Option<ValueCodec> {
        self.codecs.insert(name.into(), codec)
    }

    pub fn unregister(&mut self, name: &str) -> Option<ValueCodec> {
        self.codecs.remove(name)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.codecs.contains_key(name)
    }

    /// Entity node type names; these tag nodes, not field values.
    pub fn entity_kind(&self, name: &str) -> Option<EntityKind> {
        EntityKind::from_type_name(name)
    }

    pub fn encode_value(&self, field: &str, value: &FieldValue) -> SerializationResult<Value> {
        if let Some(name) = value.registered_type() {
            let codec = self
                .codecs
                .get(name)
                .ok_or_else(|| SerializationError::UnregisteredType(name.to_string()))?;
            let mut members = (codec.encode)(value)?;
            members.insert(TYPE_TAG.to_string(), Value::String(name.to_string()));
            return Ok(Value::Object(members));
        }

        Ok(match value {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(flag) => Value::Bool(*flag),
            FieldValue::Int(number) => Value::from(*number),
            FieldValue::Float(number) => Number::from_f64(*number)
                .map(Value::Number)
                .ok_or_else(|| SerializationError::NonFiniteFloat(field.to_string()))?,
            FieldValue::Text(text) => Value::String(text.clone()),
            FieldValue::List(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.encode_value(field, item))
                    .collect::<SerializationResult<_>>()?,
            ),
            FieldValue::Map(entries) => {
                if entries.contains_key(TYPE_TAG) {
                    return Err(SerializationError::Malformed {
                        field: field.to_string(),
                        detail: format!("map key `{TYPE_TAG}` is reserved"),
                    });
                }
                let mut members = Map::new();
                for (key, entry) in entries {
                    members.insert(key.clone(), self.encode_value(field, entry)?);
                }
                Value::Object(members)
            }
            other => {
                return Err(SerializationError::UnregisteredType(
                    other.registered_type().unwrap_or("unknown").to_string(),
                ));
            }
        })
    }

    pub fn decode_value(&self, field: &str, value: &Value) -> SerializationResult<FieldValue> {
        Ok(match value {
            Value::Null => FieldValue::Null,
            Value::Bool(flag) => FieldValue::Bool(*flag),
            Value::Number(number) => match number.as_i64() {
                Some(integer) => FieldValue::Int(integer),
                None => number
                    .as_f64()
                    .map(FieldValue::Float)
                    .ok_or_else(|| SerializationError::Malformed {
                        field: field.to_string(),
                        detail: format!("unrepresentable number {number}"),
                    })?,
            },
            Value::String(text) => FieldValue::Text(text.clone()),
            Value::Array(items) => FieldValue::List(
                items
                    .iter()
                    .map(|item| self.decode_value(field, item))
                    .collect::<SerializationResult<_>>()?,
            ),
            Value::Object(members) => match members.get(TYPE_TAG) {
                Some(Value::String(name)) => {
                    let codec = self
                        .codecs
                        .get(name)
                        .ok_or_else(|| SerializationError::UnknownType(name.clone()))?;
                    (codec.decode)(members)?
                }
                Some(_) => {
                    return Err(SerializationError::Malformed {
                        field: field.to_string(),
                        detail: format!("`{TYPE_TAG}` must be a string"),
                    })
                }
                None => FieldValue::Map(
                    members
                        .iter()
                        .map(|(key, entry)| Ok((key.clone(), self.decode_value(field, entry)?)))
                        .collect::<SerializationResult<_>>()?,
                ),
            },
        })
    }
}

fn member_str<'a>(
    members: &'a Map<String, Value>,
    type_name: &str,
    key: &str,
) -> SerializationResult<&'a str> {
    match members.get(key) {
        Some(Value::String(text)) => Ok(text),
        Some(_) => Err(SerializationError::Malformed {
            field: format!("{type_name}.{key}"),
            detail: "expected string".to_string(),
        }),
        None => Err(SerializationError::MissingField(format!("{type_name}.{key}"))),
    }
}

fn shape_error(type_name: &str) -> SerializationError {
    SerializationError::Malformed {
        field: type_name.to_string(),
        detail: "value does not match its registered type".to_string(),
    }
}

fn single(key: &str, value: String) -> Map<String, Value> {
    let mut members = Map::new();
    members.insert(key.to_string(), Value::String(value));
    members
}

fn encode_path(value: &FieldValue) -> SerializationResult<Map<String, Value>> {
    let FieldValue::Path(path) = value else {
        return Err(shape_error("Path"));
    };
    let text = path.to_str().ok_or_else(|| SerializationError::Malformed {
        field: "Path.path".to_string(),
        detail: format!("path is not valid UTF-8: {}", path.display()),
    })?;
    Ok(single("path", text.to_string()))
}

fn decode_path(members: &Map<String, Value>) -> SerializationResult<FieldValue> {
    Ok(FieldValue::Path(PathBuf::from(member_str(
        members, "Path", "path",
    )?)))
}

fn encode_timestamp(value: &FieldValue) -> SerializationResult<Map<String, Value>> {
    let FieldValue::Timestamp(at) = value else {
        return Err(shape_error("datetime"));
    };
    Ok(single(
        "timestamp",
        at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    ))
}

fn decode_timestamp(members: &Map<String, Value>) -> SerializationResult<FieldValue> {
    let text = member_str(members, "datetime", "timestamp")?;
    let at = DateTime::parse_from_rfc3339(text).map_err(|err| SerializationError::Malformed {
        field: "datetime.timestamp".to_string(),
        detail: err.to_string(),
    })?;
    Ok(FieldValue::Timestamp(at.with_timezone(&Utc)))
}

fn encode_date(value: &FieldValue) -> SerializationResult<Map<String, Value>> {
    let FieldValue::Date(date) = value else {
        return Err(shape_error("date"));
    };
    Ok(single("date", date.format("%Y-%m-%d").to_string()))
}

fn decode_date(members: &Map<String, Value>) -> SerializationResult<FieldValue> {
    let text = member_str(members, "date", "date")?;
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|err| {
        SerializationError::Malformed {
            field: "date.date".to_string(),
            detail: err.to_string(),
        }
    })?;
    Ok(FieldValue::Date(date))
}

fn encode_oid(value: &FieldValue) -> SerializationResult<Map<String, Value>> {
    let FieldValue::Oid(oid) = value else {
        return Err(shape_error("OID"));
    };
    let mut members = single("base_uuid", oid.base_uuid());
    members.insert("group".to_string(), Value::String(oid.group().to_string()));
    Ok(members)
}

fn decode_oid(members: &Map<String, Value>) -> SerializationResult<FieldValue> {
    let group = member_str(members, "OID", "group")?;
    let base = member_str(members, "OID", "base_uuid")?;
    let kind = EntityKind::from_group(group)
        .ok_or_else(|| SerializationError::UnknownType(format!("OID group `{group}`")))?;
    let oid = Oid::parse_base(kind, base).map_err(|err| SerializationError::Malformed {
        field: "OID.base_uuid".to_string(),
        detail: err.to_string(),
    })?;
    Ok(FieldValue::Oid(oid))
}
