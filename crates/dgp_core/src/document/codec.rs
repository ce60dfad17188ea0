//! Tree <-> JSON document conversion.
//!
//! Document layout:
//! `{"schema_version": 1, "generator": "...", "root": <node>}` where each
//! node is `{"_type", "uid", "parent", <fields...>, "children": [<node>...]}`.

use crate::controller::ProjectTree;
use crate::document::registry::{TypeRegistry, TYPE_TAG};
use crate::document::{SerializationError, SerializationResult};
use crate::model::{EntityRecord, FieldMap, FieldValue, ValidationError};
use crate::oid::Oid;
use log::{info, warn};
use serde_json::{Map, Value};
use std::time::Instant;

pub const SCHEMA_VERSION: u32 = 1;
pub const GENERATOR: &str = concat!("dgp_core ", env!("CARGO_PKG_VERSION"));

const UID: &str = "uid";
const PARENT: &str = "parent";
const CHILDREN: &str = "children";
const RESERVED_MEMBERS: [&str; 4] = [TYPE_TAG, UID, PARENT, CHILDREN];

/// Decoded node waiting to be attached: `(parent, entity)`.
type PendingNode = (Option<Oid>, EntityRecord);

/// Document encoder/decoder bound to one type registry.
#[derive(Clone, Default)]
pub struct DocumentCodec {
    registry: TypeRegistry,
}

impl DocumentCodec {
    pub fn new(registry: TypeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn encode(&self, tree: &ProjectTree) -> SerializationResult<Value> {
        let mut envelope = Map::new();
        envelope.insert("schema_version".to_string(), Value::from(SCHEMA_VERSION));
        envelope.insert("generator".to_string(), Value::from(GENERATOR));
        envelope.insert("root".to_string(), self.encode_node(tree, tree.root_id())?);
        Ok(Value::Object(envelope))
    }

    fn encode_node(&self, tree: &ProjectTree, oid: Oid) -> SerializationResult<Value> {
        let entity = tree
            .find(oid)
            .ok_or(ValidationError::NodeNotFound(oid))?;
        let mut members = Map::new();
        members.insert(
            TYPE_TAG.to_string(),
            Value::from(entity.kind().type_name()),
        );
        members.insert(
            UID.to_string(),
            self.registry.encode_value(UID, &FieldValue::Oid(oid))?,
        );
        members.insert(
            PARENT.to_string(),
            self.registry
                .encode_value(PARENT, &FieldValue::opt_oid(tree.parent_of(oid)))?,
        );
        for (name, value) in entity.fields() {
            members.insert(name.to_string(), self.registry.encode_value(name, &value)?);
        }
        let children = tree
            .children_of(oid)
            .iter()
            .map(|child| self.encode_node(tree, *child))
            .collect::<SerializationResult<Vec<_>>>()?;
        members.insert(CHILDREN.to_string(), Value::Array(children));
        Ok(Value::Object(members))
    }

    /// Rebuilds a tree; nothing is returned unless every node and edge is valid.
    pub fn decode(&self, document: &Value) -> SerializationResult<ProjectTree> {
        let envelope = document
            .as_object()
            .ok_or_else(|| malformed("document", "expected a JSON object"))?;
        let version = envelope
            .get("schema_version")
            .ok_or_else(|| SerializationError::MissingField("schema_version".to_string()))?
            .as_u64()
            .ok_or_else(|| malformed("schema_version", "expected an unsigned integer"))?;
        if version != u64::from(SCHEMA_VERSION) {
            return Err(SerializationError::VersionMismatch {
                found: version,
                supported: SCHEMA_VERSION,
            });
        }
        let root = envelope
            .get("root")
            .ok_or_else(|| SerializationError::MissingField("root".to_string()))?;

        let mut pending = Vec::new();
        self.decode_node(root, None, &mut pending)?;
        let mut pending = pending.into_iter();
        let project = match pending.next() {
            Some((_, EntityRecord::Project(project))) => project,
            Some((_, other)) => {
                return Err(malformed(
                    "root",
                    &format!("root node must be a Project, found {}", other.kind()),
                ))
            }
            None => return Err(SerializationError::MissingField("root".to_string())),
        };

        let mut tree = ProjectTree::new(project);
        for (parent, entity) in pending {
            let parent = parent.ok_or_else(|| malformed(PARENT, "non-root node without parent"))?;
            tree.check_attach(parent, &entity)?;
            tree.attach(parent, entity);
        }
        for holder in tree.walk() {
            let targets = tree
                .find(holder)
                .map(EntityRecord::references)
                .unwrap_or_default();
            for target in targets {
                tree.check_link(holder, target)?;
            }
        }
        Ok(tree)
    }

    /// Decodes children before their parent, appending in pre-order.
    fn decode_node(
        &self,
        value: &Value,
        expected_parent: Option<Oid>,
        out: &mut Vec<PendingNode>,
    ) -> SerializationResult<()> {
        let members = value
            .as_object()
            .ok_or_else(|| malformed("node", "expected a JSON object"))?;
        let type_name = match members.get(TYPE_TAG) {
            Some(Value::String(name)) => name,
            Some(_) => return Err(malformed(TYPE_TAG, "expected a string")),
            None => return Err(SerializationError::MissingField(TYPE_TAG.to_string())),
        };
        let kind = self
            .registry
            .entity_kind(type_name)
            .ok_or_else(|| SerializationError::UnknownType(type_name.clone()))?;

        let uid = members
            .get(UID)
            .ok_or_else(|| SerializationError::MissingField(UID.to_string()))?;
        let oid = match self.registry.decode_value(UID, uid)? {
            FieldValue::Oid(oid) => oid,
            _ => return Err(malformed(UID, "expected an OID")),
        };
        if oid.kind() != kind {
            return Err(ValidationError::KindMismatch {
                node: oid,
                expected: kind,
                actual: oid.kind(),
            }
            .into());
        }

        let parent = match members.get(PARENT) {
            None | Some(Value::Null) => None,
            Some(raw) => match self.registry.decode_value(PARENT, raw)? {
                FieldValue::Oid(parent) => Some(parent),
                _ => return Err(malformed(PARENT, "expected an OID or null")),
            },
        };
        if parent != expected_parent {
            return Err(malformed(
                PARENT,
                &format!("node {oid} is nested under a different parent than it names"),
            ));
        }

        let mut fields = FieldMap::new();
        for (name, raw) in members {
            if RESERVED_MEMBERS.contains(&name.as_str()) {
                continue;
            }
            fields.insert(name.clone(), self.registry.decode_value(name, raw)?);
        }

        let children: &[Value] = match members.get(CHILDREN) {
            None => &[],
            Some(Value::Array(items)) => items,
            Some(_) => return Err(malformed(CHILDREN, "expected an array")),
        };
        let mut decoded_children = Vec::new();
        for child in children {
            self.decode_node(child, Some(oid), &mut decoded_children)?;
        }

        let entity = EntityRecord::from_fields(oid, &mut fields)?;
        out.push((parent, entity));
        out.extend(decoded_children);
        Ok(())
    }

    pub fn save(&self, tree: &ProjectTree) -> SerializationResult<Vec<u8>> {
        let started_at = Instant::now();
        let document = self.encode(tree)?;
        let bytes = serde_json::to_vec_pretty(&document)?;
        info!(
            "event=document_encode module=document status=ok project={} nodes={} bytes={} duration_ms={}",
            tree.root_id(),
            tree.len(),
            bytes.len(),
            started_at.elapsed().as_millis()
        );
        Ok(bytes)
    }

    pub fn load(&self, bytes: &[u8]) -> SerializationResult<ProjectTree> {
        let started_at = Instant::now();
        let result = serde_json::from_slice::<Value>(bytes)
            .map_err(SerializationError::from)
            .and_then(|document| self.decode(&document));
        match &result {
            Ok(tree) => info!(
                "event=document_decode module=document status=ok project={} nodes={} duration_ms={}",
                tree.root_id(),
                tree.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=document_decode module=document status=error fatal={} duration_ms={} error={}",
                err.is_fatal(),
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }
}

/// Encodes `tree` with the default registry.
pub fn save(tree: &ProjectTree) -> SerializationResult<Vec<u8>> {
    DocumentCodec::default().save(tree)
}

/// Decodes a tree with the default registry.
pub fn load(bytes: &[u8]) -> SerializationResult<ProjectTree> {
    DocumentCodec::default().load(bytes)
}

fn malformed(field: &str, detail: &str) -> SerializationError {
    SerializationError::Malformed {
        field: field.to_string(),
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{load, save, DocumentCodec};
    use crate::controller::ProjectController;
    use crate::document::{SerializationError, TypeRegistry};
    use crate::model::{
        DataFileSpec, DataKind, DataSetSpec, FlightSpec, GravimeterSpec, ProjectSpec,
        ValidationError,
    };
    use serde_json::Value;

    fn sample() -> ProjectController {
        let mut ctl = ProjectController::new(ProjectSpec::new("Survey", "/data/survey")).unwrap();
        let flight = ctl.add_flight(FlightSpec::new("F1")).unwrap();
        let meter = ctl.add_gravimeter(GravimeterSpec::new("AT1A-11")).unwrap();
        ctl.link(flight, meter).unwrap();
        let dataset = ctl.add_child(flight, DataSetSpec::default()).unwrap();
        ctl.add_child(dataset, DataFileSpec::new(DataKind::Gravity, "/raw/g.dat"))
            .unwrap();
        ctl
    }

    fn edit(bytes: &[u8], change: impl FnOnce(&mut Value)) -> Vec<u8> {
        let mut document: Value = serde_json::from_slice(bytes).unwrap();
        change(&mut document);
        serde_json::to_vec(&document).unwrap()
    }

    #[test]
    fn save_then_load_is_identity() {
        let ctl = sample();
        let bytes = save(ctl.tree()).unwrap();
        assert_eq!(load(&bytes).unwrap(), *ctl.tree());
    }

    #[test]
    fn version_mismatch_fails_closed() {
        let bytes = edit(&save(sample().tree()).unwrap(), |doc| {
            doc["schema_version"] = Value::from(2);
        });
        assert!(matches!(
            load(&bytes),
            Err(SerializationError::VersionMismatch { found: 2, supported: 1 })
        ));
    }

    #[test]
    fn missing_required_field_fails_load() {
        let bytes = edit(&save(sample().tree()).unwrap(), |doc| {
            doc["root"]["children"][0]
                .as_object_mut()
                .unwrap()
                .remove("name");
        });
        let err = load(&bytes).unwrap_err();
        assert!(matches!(
            err,
            SerializationError::Invalid(ValidationError::MissingField("name"))
        ));
        assert!(!err.is_fatal());
    }

    #[test]
    fn dangling_reference_fails_load() {
        let ctl = sample();
        let bytes = edit(&save(ctl.tree()).unwrap(), |doc| {
            let children = doc["root"]["children"].as_array_mut().unwrap();
            children.retain(|child| child["_type"] != "Gravimeter");
        });
        assert!(matches!(
            load(&bytes),
            Err(SerializationError::Invalid(
                ValidationError::LinkTargetNotFound(_)
            ))
        ));
    }

    #[test]
    fn encoding_without_oid_codec_fails() {
        let mut registry = TypeRegistry::default();
        registry.unregister("OID");
        let codec = DocumentCodec::new(registry);
        assert!(matches!(
            codec.save(sample().tree()),
            Err(SerializationError::UnregisteredType(name)) if name == "OID"
        ));
    }

    #[test]
    fn truncated_document_is_fatal() {
        let bytes = save(sample().tree()).unwrap();
        let err = load(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(err.is_fatal());
    }
}
