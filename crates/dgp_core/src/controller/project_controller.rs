//! Project controller: factory, mutation and notification entry point.

use crate::controller::events::{EventBus, ProjectEvent, SubscriptionId};
use crate::controller::tree::ProjectTree;
use crate::controller::{ControllerError, ControllerResult};
use crate::model::{
    DataFile, DataFileSpec, DataSegment, DataSegmentSpec, DataSet, DataSetSpec, EntityKind,
    EntityRecord, Flight, FlightSpec, Gravimeter, GravimeterSpec, Project, ProjectSpec, Scalar,
    ValidationError,
};
use crate::oid::Oid;
use crate::store::{SeriesStore, StoreKey};
use chrono::Utc;
use log::{info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Creation input for any child entity.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildSpec {
    Flight(FlightSpec),
    Gravimeter(GravimeterSpec),
    DataSet(DataSetSpec),
    DataFile(DataFileSpec),
    DataSegment(DataSegmentSpec),
}

impl ChildSpec {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Flight(_) => EntityKind::Flight,
            Self::Gravimeter(_) => EntityKind::Gravimeter,
            Self::DataSet(_) => EntityKind::DataSet,
            Self::DataFile(_) => EntityKind::DataFile,
            Self::DataSegment(_) => EntityKind::DataSegment,
        }
    }
}

impl From<FlightSpec> for ChildSpec {
    fn from(value: FlightSpec) -> Self {
        Self::Flight(value)
    }
}

impl From<GravimeterSpec> for ChildSpec {
    fn from(value: GravimeterSpec) -> Self {
        Self::Gravimeter(value)
    }
}

impl From<DataSetSpec> for ChildSpec {
    fn from(value: DataSetSpec) -> Self {
        Self::DataSet(value)
    }
}

impl From<DataFileSpec> for ChildSpec {
    fn from(value: DataFileSpec) -> Self {
        Self::DataFile(value)
    }
}

impl From<DataSegmentSpec> for ChildSpec {
    fn from(value: DataSegmentSpec) -> Self {
        Self::DataSegment(value)
    }
}

type MutationHook = Box<dyn FnMut(&ProjectTree)>;

/// Owns one project tree and mediates every change to it.
///
/// When a store is attached, removing DataFiles also removes their store
/// entries; the store is cleared first so a storage failure leaves the tree
/// untouched.
pub struct ProjectController {
    tree: ProjectTree,
    store: Option<Arc<dyn SeriesStore>>,
    events: EventBus,
    hooks: Vec<MutationHook>,
    hooks_pending: bool,
    active_flight: Option<Oid>,
}

impl ProjectController {
    /// Creates a controller around a brand-new project.
    pub fn new(spec: ProjectSpec) -> ControllerResult<Self> {
        let project = Project::new(Oid::new(EntityKind::Project), spec)?;
        info!(
            "event=project_create module=controller status=ok project={}",
            project.oid()
        );
        Ok(Self::from_tree(ProjectTree::new(project)))
    }

    /// Wraps an already validated tree, e.g. one decoded from a document.
    pub fn from_tree(tree: ProjectTree) -> Self {
        Self {
            tree,
            store: None,
            events: EventBus::new(),
            hooks: Vec::new(),
            hooks_pending: false,
            active_flight: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn SeriesStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn tree(&self) -> &ProjectTree {
        &self.tree
    }

    pub fn into_tree(self) -> ProjectTree {
        self.tree
    }

    pub fn project(&self) -> &Project {
        self.tree.project()
    }

    pub fn root_id(&self) -> Oid {
        self.tree.root_id()
    }

    pub fn store(&self) -> Option<&Arc<dyn SeriesStore>> {
        self.store.as_ref()
    }

    pub fn find(&self, oid: Oid) -> Option<&EntityRecord> {
        self.tree.find(oid)
    }

    pub fn active_flight(&self) -> Option<Oid> {
        self.active_flight
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&ProjectEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Registers a hook run after every successful mutation, or once at the
    /// end of an outermost batch.
    pub fn add_mutation_hook(&mut self, hook: impl FnMut(&ProjectTree) + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Creates a child under `parent` and returns its new identifier.
    pub fn add_child(&mut self, parent: Oid, spec: impl Into<ChildSpec>) -> ControllerResult<Oid> {
        let started_at = Instant::now();
        let spec = spec.into();
        let result = self.add_child_inner(parent, spec);
        log_outcome("add_child", parent, started_at, &result);
        result
    }

    fn add_child_inner(&mut self, parent: Oid, spec: ChildSpec) -> ControllerResult<Oid> {
        let parent_kind = self
            .tree
            .find(parent)
            .ok_or(ValidationError::ParentNotFound(parent))?
            .kind();
        if !parent_kind.can_own(spec.kind()) {
            return Err(ValidationError::InvalidChildType {
                parent: parent_kind,
                child: spec.kind(),
            }
            .into());
        }

        let oid = Oid::new(spec.kind());
        let entity = match spec {
            ChildSpec::Flight(spec) => EntityRecord::Flight(Flight::new(oid, spec)?),
            ChildSpec::Gravimeter(spec) => EntityRecord::Gravimeter(Gravimeter::new(oid, spec)?),
            ChildSpec::DataSet(spec) => EntityRecord::DataSet(DataSet::new(oid, spec)?),
            ChildSpec::DataFile(spec) => EntityRecord::DataFile(DataFile::new(oid, spec)?),
            ChildSpec::DataSegment(spec) => {
                let sequence = self.tree.next_segment_sequence(parent);
                EntityRecord::DataSegment(DataSegment::new(oid, spec, sequence)?)
            }
        };
        self.insert(parent, entity)?;
        Ok(oid)
    }

    /// Attaches a DataFile whose identifier was minted elsewhere, typically
    /// by an import job that already wrote the file's table.
    ///
    /// Fails with `SlotOccupied` when `dataset` already holds a file of the
    /// same kind.
    pub fn attach_data_file(
        &mut self,
        dataset: Oid,
        oid: Oid,
        spec: DataFileSpec,
    ) -> ControllerResult<()> {
        let started_at = Instant::now();
        let result = DataFile::new(oid, spec)
            .map_err(ControllerError::from)
            .and_then(|file| self.insert(dataset, EntityRecord::DataFile(file)));
        log_outcome("attach_data_file", dataset, started_at, &result);
        result
    }

    fn insert(&mut self, parent: Oid, entity: EntityRecord) -> ControllerResult<()> {
        self.tree.check_attach(parent, &entity)?;
        let child = entity.oid();
        let kind = entity.kind();
        self.tree.attach(parent, entity);
        self.events.publish(ProjectEvent::ChildAdded {
            parent,
            child,
            kind,
        });
        self.after_mutation();
        Ok(())
    }

    /// Removes `node` and everything it owns.
    ///
    /// Returns removed identifiers deepest first. References held by
    /// surviving nodes to removed gravimeters are dropped.
    pub fn remove(&mut self, node: Oid) -> ControllerResult<Vec<Oid>> {
        let started_at = Instant::now();
        let result = self.remove_inner(node);
        if let Ok(removed) = &result {
            info!(
                "event=tree_remove module=controller status=ok node={} removed={} duration_ms={}",
                node,
                removed.len(),
                started_at.elapsed().as_millis()
            );
        } else {
            log_outcome("remove", node, started_at, &result);
        }
        result
    }

    fn remove_inner(&mut self, node: Oid) -> ControllerResult<Vec<Oid>> {
        if !self.tree.contains(node) {
            return Err(ValidationError::NodeNotFound(node).into());
        }
        if node == self.tree.root_id() {
            return Err(ValidationError::RootImmutable(node).into());
        }

        let doomed = self.tree.subtree_post_order(node);
        let keys: Vec<StoreKey> = doomed
            .iter()
            .filter_map(|oid| self.tree.find(*oid)?.as_datafile().map(DataFile::store_key))
            .collect();
        if let Some(store) = &self.store {
            if !keys.is_empty() {
                store.delete_many(&keys)?;
            }
        }

        let doomed_set: HashSet<Oid> = doomed.iter().copied().collect();
        let mut dropped_links = Vec::new();
        for meter in doomed.iter().filter(|oid| oid.kind() == EntityKind::Gravimeter) {
            for holder in self.tree.referrers(*meter) {
                if !doomed_set.contains(&holder) {
                    dropped_links.push((holder, *meter));
                }
            }
        }
        for (holder, target) in &dropped_links {
            self.drop_reference(*holder, *target);
        }

        let removed = self.tree.detach_subtree(node);
        for (holder, target) in dropped_links {
            self.events.publish(ProjectEvent::Unlinked { holder, target });
        }
        for (parent, entity) in &removed {
            self.events.publish(ProjectEvent::NodeRemoved {
                node: entity.oid(),
                parent: *parent,
                kind: entity.kind(),
            });
        }
        if let Some(active) = self.active_flight {
            if doomed_set.contains(&active) {
                self.active_flight = None;
                self.events.publish(ProjectEvent::ActiveFlightChanged {
                    previous: Some(active),
                    current: None,
                });
            }
        }

        self.after_mutation();
        Ok(removed.iter().map(|(_, entity)| entity.oid()).collect())
    }

    /// Re-parents `node`. Moving to the current parent is a no-op.
    pub fn move_node(&mut self, node: Oid, new_parent: Oid) -> ControllerResult<()> {
        let started_at = Instant::now();
        let result = self.move_inner(node, new_parent);
        log_outcome("move", node, started_at, &result);
        result
    }

    fn move_inner(&mut self, node: Oid, new_parent: Oid) -> ControllerResult<()> {
        self.tree.check_move(node, new_parent)?;
        if self.tree.parent_of(node) == Some(new_parent) {
            return Ok(());
        }

        let sequence = self.tree.next_segment_sequence(new_parent);
        let old_parent = self
            .tree
            .reparent(node, new_parent)
            .ok_or(ValidationError::NodeNotFound(node))?;
        if let Some(segment) = self.tree.find_mut(node).and_then(EntityRecord::as_segment_mut) {
            segment.set_sequence(sequence);
        }

        self.events.publish(ProjectEvent::NodeMoved {
            node,
            old_parent,
            new_parent,
        });
        self.after_mutation();
        Ok(())
    }

    /// Adds a non-owning reference. Returns `false` when it already existed.
    ///
    /// A DataSet holds one sensor; linking a different gravimeter replaces
    /// the previous one.
    pub fn link(&mut self, holder: Oid, target: Oid) -> ControllerResult<bool> {
        let started_at = Instant::now();
        let result = self.link_inner(holder, target);
        log_outcome("link", holder, started_at, &result);
        result
    }

    fn link_inner(&mut self, holder: Oid, target: Oid) -> ControllerResult<bool> {
        self.tree.check_link(holder, target)?;
        let mut replaced = None;
        let changed = match self.tree.find_mut(holder) {
            Some(EntityRecord::Flight(flight)) => flight.add_gravimeter_ref(target),
            Some(EntityRecord::DataSet(dataset)) => {
                let previous = dataset.sensor();
                if previous == Some(target) {
                    false
                } else {
                    replaced = previous;
                    dataset.set_sensor(Some(target));
                    true
                }
            }
            _ => false,
        };
        if !changed {
            return Ok(false);
        }

        if let Some(previous) = replaced {
            self.events.publish(ProjectEvent::Unlinked {
                holder,
                target: previous,
            });
        }
        self.events.publish(ProjectEvent::Linked { holder, target });
        self.after_mutation();
        Ok(true)
    }

    /// Drops a non-owning reference. Returns `false` when none existed.
    pub fn unlink(&mut self, holder: Oid, target: Oid) -> ControllerResult<bool> {
        let started_at = Instant::now();
        let result = self.unlink_inner(holder, target);
        log_outcome("unlink", holder, started_at, &result);
        result
    }

    fn unlink_inner(&mut self, holder: Oid, target: Oid) -> ControllerResult<bool> {
        self.tree.check_link(holder, target)?;
        if !self.drop_reference(holder, target) {
            return Ok(false);
        }
        self.events.publish(ProjectEvent::Unlinked { holder, target });
        self.after_mutation();
        Ok(true)
    }

    fn drop_reference(&mut self, holder: Oid, target: Oid) -> bool {
        match self.tree.find_mut(holder) {
            Some(EntityRecord::Flight(flight)) => flight.remove_gravimeter_ref(target),
            Some(EntityRecord::DataSet(dataset)) if dataset.sensor() == Some(target) => {
                dataset.set_sensor(None);
                true
            }
            _ => false,
        }
    }

    /// Applies `edit` to a copy of the entity and commits it only on success.
    pub fn update(
        &mut self,
        node: Oid,
        field: &'static str,
        edit: impl FnOnce(&mut EntityRecord) -> Result<(), ValidationError>,
    ) -> ControllerResult<()> {
        let started_at = Instant::now();
        let result = self.update_inner(node, field, edit);
        log_outcome("update", node, started_at, &result);
        result
    }

    fn update_inner(
        &mut self,
        node: Oid,
        field: &'static str,
        edit: impl FnOnce(&mut EntityRecord) -> Result<(), ValidationError>,
    ) -> ControllerResult<()> {
        let current = self
            .tree
            .find(node)
            .ok_or(ValidationError::NodeNotFound(node))?;
        let mut draft = current.clone();
        edit(&mut draft)?;
        if draft.oid() != node || draft.kind() != current.kind() {
            return Err(ValidationError::KindMismatch {
                node,
                expected: current.kind(),
                actual: draft.kind(),
            }
            .into());
        }
        if draft == *current {
            return Ok(());
        }
        if let Some(slot) = self.tree.find_mut(node) {
            *slot = draft;
        }
        self.events.publish(ProjectEvent::NodeUpdated { node, field });
        self.after_mutation();
        Ok(())
    }

    /// Kind-checked variant of `update`.
    pub(crate) fn update_as<T>(
        &mut self,
        node: Oid,
        field: &'static str,
        select: fn(&mut EntityRecord) -> Option<&mut T>,
        edit: impl FnOnce(&mut T) -> Result<(), ValidationError>,
    ) -> ControllerResult<()> {
        self.update(node, field, |entity| {
            let kind = entity.kind();
            let target = select(entity).ok_or(ValidationError::KindMismatch {
                node,
                expected: node.kind(),
                actual: kind,
            })?;
            edit(target)
        })
    }

    /// Renames any named entity; for segments this sets the label.
    pub fn rename(&mut self, node: Oid, name: impl Into<String>) -> ControllerResult<()> {
        let name = name.into();
        self.update(node, "name", move |entity| match entity {
            EntityRecord::Project(project) => project.set_name(name),
            EntityRecord::Flight(flight) => flight.set_name(name),
            EntityRecord::Gravimeter(meter) => meter.set_name(name),
            EntityRecord::DataSet(dataset) => {
                dataset.set_name(Some(name));
                Ok(())
            }
            EntityRecord::DataSegment(segment) => {
                segment.set_label(Some(name));
                Ok(())
            }
            EntityRecord::DataFile(_) => Err(ValidationError::InvalidValue {
                field: "name",
                detail: "data file names are fixed at import".to_string(),
            }),
        })
    }

    pub fn set_project_description(&mut self, description: Option<String>) -> ControllerResult<()> {
        let root = self.root_id();
        self.update_as(root, "description", EntityRecord::as_project_mut, |project| {
            project.set_description(description);
            Ok(())
        })
    }

    pub fn set_project_attribute(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Scalar>,
    ) -> ControllerResult<()> {
        let root = self.root_id();
        let (key, value) = (key.into(), value.into());
        self.update_as(root, "attributes", EntityRecord::as_project_mut, |project| {
            project.set_attribute(key, value)
        })
    }

    pub fn remove_project_attribute(&mut self, key: &str) -> ControllerResult<()> {
        let root = self.root_id();
        self.update_as(root, "attributes", EntityRecord::as_project_mut, |project| {
            project.remove_attribute(key);
            Ok(())
        })
    }

    /// Selects the flight the presentation layer works on. Not persisted.
    pub fn set_active_flight(&mut self, flight: Option<Oid>) -> ControllerResult<()> {
        if let Some(oid) = flight {
            self.ensure_kind(oid, EntityKind::Flight)?;
        }
        if self.active_flight == flight {
            return Ok(());
        }
        let previous = std::mem::replace(&mut self.active_flight, flight);
        self.events.publish(ProjectEvent::ActiveFlightChanged {
            previous,
            current: flight,
        });
        Ok(())
    }

    /// Runs `ops` with notifications grouped into one `Batch` event.
    ///
    /// Batching groups notifications only; operations that completed before
    /// an error stay applied and their events are still delivered.
    pub fn batch<T>(
        &mut self,
        ops: impl FnOnce(&mut Self) -> ControllerResult<T>,
    ) -> ControllerResult<T> {
        self.events.begin_batch();
        let result = ops(self);
        self.events.end_batch();
        if !self.events.in_batch() && self.hooks_pending {
            self.run_hooks();
        }
        result
    }

    pub(crate) fn ensure_kind(
        &self,
        oid: Oid,
        expected: EntityKind,
    ) -> Result<&EntityRecord, ValidationError> {
        let entity = self
            .tree
            .find(oid)
            .ok_or(ValidationError::NodeNotFound(oid))?;
        if entity.kind() != expected {
            return Err(ValidationError::KindMismatch {
                node: oid,
                expected,
                actual: entity.kind(),
            });
        }
        Ok(entity)
    }

    fn after_mutation(&mut self) {
        self.tree.project_mut().touch(Utc::now());
        if self.events.in_batch() {
            self.hooks_pending = true;
        } else {
            self.run_hooks();
        }
    }

    fn run_hooks(&mut self) {
        self.hooks_pending = false;
        for hook in &mut self.hooks {
            hook(&self.tree);
        }
    }
}

fn log_outcome<T>(op: &str, node: Oid, started_at: Instant, result: &ControllerResult<T>) {
    match result {
        Ok(_) => info!(
            "event=tree_mutation module=controller op={} status=ok node={} duration_ms={}",
            op,
            node,
            started_at.elapsed().as_millis()
        ),
        Err(err) => warn!(
            "event=tree_mutation module=controller op={} status=rejected node={} duration_ms={} error={}",
            op,
            node,
            started_at.elapsed().as_millis(),
            err
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::ProjectController;
    use crate::controller::{ControllerError, ProjectEvent};
    use crate::model::{
        DataFileSpec, DataKind, DataSegmentSpec, DataSetSpec, EntityKind, FlightSpec,
        GravimeterSpec, ProjectSpec, ValidationError,
    };
    use crate::oid::Oid;
    use chrono::{Duration, TimeZone, Utc};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn controller() -> ProjectController {
        ProjectController::new(ProjectSpec::new("Survey", "/data/survey")).unwrap()
    }

    fn recorded(ctl: &mut ProjectController) -> Rc<RefCell<Vec<ProjectEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        ctl.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        seen
    }

    #[test]
    fn add_child_rejects_disallowed_kind_without_mutation() {
        let mut ctl = controller();
        let root = ctl.root_id();
        let before = ctl.tree().clone();
        let err = ctl.add_child(root, DataSetSpec::default()).unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Validation(ValidationError::InvalidChildType {
                parent: EntityKind::Project,
                child: EntityKind::DataSet
            })
        ));
        assert_eq!(*ctl.tree(), before);
    }

    #[test]
    fn segments_receive_increasing_sequence() {
        let mut ctl = controller();
        let root = ctl.root_id();
        let flight = ctl.add_child(root, FlightSpec::new("F1")).unwrap();
        let dataset = ctl.add_child(flight, DataSetSpec::default()).unwrap();
        let start = Utc.with_ymd_and_hms(2018, 3, 9, 14, 0, 0).unwrap();
        let first = ctl
            .add_child(dataset, DataSegmentSpec::new(start, start + Duration::minutes(5)))
            .unwrap();
        let second = ctl
            .add_child(dataset, DataSegmentSpec::new(start, start + Duration::minutes(9)))
            .unwrap();
        let sequence = |oid| ctl.find(oid).unwrap().as_segment().unwrap().sequence();
        assert_eq!((sequence(first), sequence(second)), (0, 1));
    }

    #[test]
    fn removing_gravimeter_unlinks_flights() {
        let mut ctl = controller();
        let root = ctl.root_id();
        let flight = ctl.add_child(root, FlightSpec::new("F1")).unwrap();
        let meter = ctl.add_child(root, GravimeterSpec::new("AT1A-11")).unwrap();
        assert!(ctl.link(flight, meter).unwrap());
        assert!(!ctl.link(flight, meter).unwrap());

        let seen = recorded(&mut ctl);
        ctl.remove(meter).unwrap();
        assert!(ctl.find(flight).unwrap().as_flight().unwrap().gravimeters().is_empty());
        assert_eq!(
            seen.borrow()[0],
            ProjectEvent::Unlinked {
                holder: flight,
                target: meter
            }
        );
    }

    #[test]
    fn link_requires_existing_target_of_allowed_kind() {
        let mut ctl = controller();
        let root = ctl.root_id();
        let flight = ctl.add_child(root, FlightSpec::new("F1")).unwrap();
        let ghost = Oid::new(EntityKind::Gravimeter);
        assert!(matches!(
            ctl.link(flight, ghost),
            Err(ControllerError::Validation(ValidationError::LinkTargetNotFound(id))) if id == ghost
        ));
        let other = ctl.add_child(root, FlightSpec::new("F2")).unwrap();
        assert!(matches!(
            ctl.link(flight, other),
            Err(ControllerError::Validation(ValidationError::InvalidLink { .. }))
        ));
    }

    #[test]
    fn update_failure_leaves_entity_unchanged() {
        let mut ctl = controller();
        let root = ctl.root_id();
        let flight = ctl.add_child(root, FlightSpec::new("F1")).unwrap();
        assert!(ctl.rename(flight, "   ").is_err());
        assert_eq!(ctl.find(flight).unwrap().as_flight().unwrap().name(), "F1");
        ctl.rename(flight, "Flight 1").unwrap();
        assert_eq!(ctl.find(flight).unwrap().label(), "Flight 1");
    }

    #[test]
    fn batch_delivers_one_event_and_runs_hooks_once() {
        let mut ctl = controller();
        let root = ctl.root_id();
        let seen = recorded(&mut ctl);
        let hook_runs = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hook_runs);
        ctl.add_mutation_hook(move |_| *counter.borrow_mut() += 1);

        ctl.batch(|ctl| {
            let flight = ctl.add_child(root, FlightSpec::new("F1"))?;
            ctl.add_child(flight, DataSetSpec::default())?;
            ctl.set_active_flight(Some(flight))
        })
        .unwrap();

        assert_eq!(*hook_runs.borrow(), 1);
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        match &seen[0] {
            ProjectEvent::Batch(events) => {
                assert_eq!(events.len(), 3);
                assert!(matches!(events[2], ProjectEvent::ActiveFlightChanged { .. }));
            }
            other => panic!("expected batch, got {other:?}"),
        }
    }

    #[test]
    fn move_data_file_respects_target_slot() {
        let mut ctl = controller();
        let root = ctl.root_id();
        let flight = ctl.add_child(root, FlightSpec::new("F1")).unwrap();
        let first = ctl.add_child(flight, DataSetSpec::default()).unwrap();
        let second = ctl.add_child(flight, DataSetSpec::default()).unwrap();
        let file_a = ctl
            .add_child(first, DataFileSpec::new(DataKind::Gravity, "/raw/a.dat"))
            .unwrap();
        ctl.add_child(second, DataFileSpec::new(DataKind::Gravity, "/raw/b.dat"))
            .unwrap();

        assert!(matches!(
            ctl.move_node(file_a, second),
            Err(ControllerError::Validation(ValidationError::SlotOccupied { .. }))
        ));
        assert_eq!(ctl.tree().parent_of(file_a), Some(first));
    }
}
