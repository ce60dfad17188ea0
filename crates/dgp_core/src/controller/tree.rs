//! Arena-backed project tree with an identifier index.
//!
//! # Responsibility
//! - Own every entity of one project, keyed by `Oid`.
//! - Answer structural queries (parent, children, slots, references).
//! - Validate ownership edges before they are created.
//!
//! # Invariants
//! - The root node is the single `Project` and has no parent.
//! - Parent/child edges are stored as identifiers on both sides and always
//!   agree; no entity holds a direct reference to another.
//! - A DataSet owns at most one DataFile per `DataKind`.

use crate::model::{
    DataFile, DataKind, DataSegment, DataSet, EntityKind, EntityRecord, Flight, Gravimeter,
    Project, ValidationError,
};
use crate::oid::Oid;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TreeNode {
    pub(crate) entity: EntityRecord,
    pub(crate) parent: Option<Oid>,
    pub(crate) children: Vec<Oid>,
}

/// Entity tree of one project.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectTree {
    root: Oid,
    nodes: HashMap<Oid, TreeNode>,
}

impl ProjectTree {
    pub fn new(project: Project) -> Self {
        let root = project.oid();
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            TreeNode {
                entity: EntityRecord::Project(project),
                parent: None,
                children: Vec::new(),
            },
        );
        Self { root, nodes }
    }

    pub fn root_id(&self) -> Oid {
        self.root
    }

    pub fn project(&self) -> &Project {
        match self.nodes.get(&self.root).map(|node| &node.entity) {
            Some(EntityRecord::Project(project)) => project,
            _ => unreachable!("project tree root is always a Project"),
        }
    }

    pub(crate) fn project_mut(&mut self) -> &mut Project {
        match self.nodes.get_mut(&self.root).map(|node| &mut node.entity) {
            Some(EntityRecord::Project(project)) => project,
            _ => unreachable!("project tree root is always a Project"),
        }
    }

    /// O(1) lookup through the identifier index.
    pub fn find(&self, oid: Oid) -> Option<&EntityRecord> {
        self.nodes.get(&oid).map(|node| &node.entity)
    }

    pub(crate) fn find_mut(&mut self, oid: Oid) -> Option<&mut EntityRecord> {
        self.nodes.get_mut(&oid).map(|node| &mut node.entity)
    }

    pub fn contains(&self, oid: Oid) -> bool {
        self.nodes.contains_key(&oid)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent_of(&self, oid: Oid) -> Option<Oid> {
        self.nodes.get(&oid)?.parent
    }

    /// Owned children in insertion order; empty for unknown identifiers.
    pub fn children_of(&self, oid: Oid) -> &[Oid] {
        self.nodes
            .get(&oid)
            .map_or(&[], |node| node.children.as_slice())
    }

    pub fn children_of_kind(&self, oid: Oid, kind: EntityKind) -> Vec<Oid> {
        self.children_of(oid)
            .iter()
            .copied()
            .filter(|child| child.kind() == kind)
            .collect()
    }

    /// Ancestors from the direct parent up to the root.
    pub fn ancestors(&self, oid: Oid) -> Vec<Oid> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = self.parent_of(oid);
        while let Some(current) = cursor {
            if !visited.insert(current) {
                break;
            }
            out.push(current);
            cursor = self.parent_of(current);
        }
        out
    }

    /// Every identifier in depth-first pre-order starting at the root.
    pub fn walk(&self) -> Vec<Oid> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children_of(current).iter().rev().copied());
        }
        out
    }

    /// `oid` and all its descendants, deepest first, `oid` last.
    pub fn subtree_post_order(&self, oid: Oid) -> Vec<Oid> {
        if !self.contains(oid) {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut stack = vec![(oid, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                out.push(current);
                continue;
            }
            stack.push((current, true));
            stack.extend(
                self.children_of(current)
                    .iter()
                    .rev()
                    .map(|child| (*child, false)),
            );
        }
        out
    }

    pub fn flights(&self) -> Vec<&Flight> {
        self.typed_children(self.root, EntityRecord::as_flight)
    }

    pub fn gravimeters(&self) -> Vec<&Gravimeter> {
        self.typed_children(self.root, EntityRecord::as_gravimeter)
    }

    pub fn datasets_of(&self, flight: Oid) -> Vec<&DataSet> {
        self.typed_children(flight, EntityRecord::as_dataset)
    }

    pub fn datafiles_of(&self, dataset: Oid) -> Vec<&DataFile> {
        self.typed_children(dataset, EntityRecord::as_datafile)
    }

    pub fn segments_of(&self, dataset: Oid) -> Vec<&DataSegment> {
        self.typed_children(dataset, EntityRecord::as_segment)
    }

    /// DataFile currently filling `dataset`'s slot for `kind`.
    pub fn slot(&self, dataset: Oid, kind: DataKind) -> Option<&DataFile> {
        self.datafiles_of(dataset)
            .into_iter()
            .find(|file| file.kind() == kind)
    }

    /// Nodes whose non-owning references include `target`.
    pub fn referrers(&self, target: Oid) -> Vec<Oid> {
        self.walk()
            .into_iter()
            .filter(|oid| {
                self.find(*oid)
                    .is_some_and(|entity| entity.references().contains(&target))
            })
            .collect()
    }

    pub(crate) fn next_segment_sequence(&self, dataset: Oid) -> u32 {
        self.segments_of(dataset)
            .iter()
            .map(|segment| segment.sequence() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Validates that `child` may be attached under `parent`.
    pub(crate) fn check_attach(
        &self,
        parent: Oid,
        child: &EntityRecord,
    ) -> Result<(), ValidationError> {
        let parent_kind = self
            .find(parent)
            .ok_or(ValidationError::ParentNotFound(parent))?
            .kind();
        if !parent_kind.can_own(child.kind()) {
            return Err(ValidationError::InvalidChildType {
                parent: parent_kind,
                child: child.kind(),
            });
        }
        if self.contains(child.oid()) {
            return Err(ValidationError::DuplicateIdentifier(child.oid()));
        }
        if let EntityRecord::DataFile(file) = child {
            self.ensure_slot_free(parent, file.kind(), None)?;
        }
        Ok(())
    }

    /// Validates moving `node` under `new_parent`.
    pub(crate) fn check_move(&self, node: Oid, new_parent: Oid) -> Result<(), ValidationError> {
        let entity = self.find(node).ok_or(ValidationError::NodeNotFound(node))?;
        if node == self.root {
            return Err(ValidationError::RootImmutable(node));
        }
        let parent_kind = self
            .find(new_parent)
            .ok_or(ValidationError::ParentNotFound(new_parent))?
            .kind();
        if self.would_create_cycle(node, new_parent) {
            return Err(ValidationError::CycleDetected {
                node,
                parent: new_parent,
            });
        }
        if !parent_kind.can_own(entity.kind()) {
            return Err(ValidationError::InvalidChildType {
                parent: parent_kind,
                child: entity.kind(),
            });
        }
        if let EntityRecord::DataFile(file) = entity {
            self.ensure_slot_free(new_parent, file.kind(), Some(node))?;
        }
        Ok(())
    }

    /// Validates a non-owning reference from `holder` to `target`.
    pub(crate) fn check_link(&self, holder: Oid, target: Oid) -> Result<(), ValidationError> {
        let holder_kind = self
            .find(holder)
            .ok_or(ValidationError::NodeNotFound(holder))?
            .kind();
        let target_kind = self
            .find(target)
            .ok_or(ValidationError::LinkTargetNotFound(target))?
            .kind();
        match (holder_kind, target_kind) {
            (EntityKind::Flight, EntityKind::Gravimeter)
            | (EntityKind::DataSet, EntityKind::Gravimeter) => Ok(()),
            _ => Err(ValidationError::InvalidLink {
                holder: holder_kind,
                target: target_kind,
            }),
        }
    }

    fn ensure_slot_free(
        &self,
        dataset: Oid,
        kind: DataKind,
        ignore: Option<Oid>,
    ) -> Result<(), ValidationError> {
        match self.slot(dataset, kind) {
            Some(existing) if Some(existing.oid()) != ignore => {
                Err(ValidationError::SlotOccupied { dataset, kind })
            }
            _ => Ok(()),
        }
    }

    fn would_create_cycle(&self, node: Oid, candidate_parent: Oid) -> bool {
        let mut visited = HashSet::new();
        let mut cursor = Some(candidate_parent);
        while let Some(current) = cursor {
            if current == node {
                return true;
            }
            if !visited.insert(current) {
                return true;
            }
            cursor = self.parent_of(current);
        }
        false
    }

    /// Attaches a validated child. Callers run `check_attach` first.
    pub(crate) fn attach(&mut self, parent: Oid, entity: EntityRecord) {
        let oid = entity.oid();
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(oid);
        }
        self.nodes.insert(
            oid,
            TreeNode {
                entity,
                parent: Some(parent),
                children: Vec::new(),
            },
        );
    }

    /// Detaches `oid` and its descendants, returning them deepest first.
    pub(crate) fn detach_subtree(&mut self, oid: Oid) -> Vec<(Oid, EntityRecord)> {
        let order = self.subtree_post_order(oid);
        if let Some(parent) = self.parent_of(oid) {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.retain(|child| *child != oid);
            }
        }
        order
            .into_iter()
            .filter_map(|current| {
                let node = self.nodes.remove(&current)?;
                Some((node.parent.unwrap_or(current), node.entity))
            })
            .collect()
    }

    /// Re-parents a validated node. Callers run `check_move` first.
    pub(crate) fn reparent(&mut self, oid: Oid, new_parent: Oid) -> Option<Oid> {
        let old_parent = self.parent_of(oid)?;
        if let Some(node) = self.nodes.get_mut(&old_parent) {
            node.children.retain(|child| *child != oid);
        }
        if let Some(node) = self.nodes.get_mut(&new_parent) {
            node.children.push(oid);
        }
        if let Some(node) = self.nodes.get_mut(&oid) {
            node.parent = Some(new_parent);
        }
        Some(old_parent)
    }

    fn typed_children<'a, T>(
        &'a self,
        parent: Oid,
        select: fn(&'a EntityRecord) -> Option<&'a T>,
    ) -> Vec<&'a T> {
        self.children_of(parent)
            .iter()
            .filter_map(|child| self.find(*child).and_then(select))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::ProjectTree;
    use crate::model::{
        DataFile, DataFileSpec, DataKind, DataSet, DataSetSpec, EntityKind, EntityRecord, Flight,
        FlightSpec, Project, ProjectSpec, ValidationError,
    };
    use crate::oid::Oid;

    fn tree_with_dataset() -> (ProjectTree, Oid, Oid) {
        let project = Project::new(
            Oid::new(EntityKind::Project),
            ProjectSpec::new("Survey", "/data/survey"),
        )
        .unwrap();
        let mut tree = ProjectTree::new(project);
        let flight = Flight::new(Oid::new(EntityKind::Flight), FlightSpec::new("F1")).unwrap();
        let flight_id = flight.oid();
        tree.attach(tree.root_id(), EntityRecord::Flight(flight));
        let dataset = DataSet::new(Oid::new(EntityKind::DataSet), DataSetSpec::default()).unwrap();
        let dataset_id = dataset.oid();
        tree.attach(flight_id, EntityRecord::DataSet(dataset));
        (tree, flight_id, dataset_id)
    }

    fn gravity_file() -> EntityRecord {
        EntityRecord::DataFile(
            DataFile::new(
                Oid::new(EntityKind::DataFile),
                DataFileSpec::new(DataKind::Gravity, "/raw/g.dat"),
            )
            .unwrap(),
        )
    }

    #[test]
    fn post_order_lists_descendants_before_ancestors() {
        let (tree, flight, dataset) = tree_with_dataset();
        assert_eq!(tree.subtree_post_order(flight), vec![dataset, flight]);
        assert_eq!(tree.walk()[0], tree.root_id());
        assert_eq!(tree.ancestors(dataset), vec![flight, tree.root_id()]);
    }

    #[test]
    fn check_move_rejects_cycle_before_type_mismatch() {
        let (tree, flight, dataset) = tree_with_dataset();
        assert_eq!(
            tree.check_move(flight, dataset).unwrap_err(),
            ValidationError::CycleDetected {
                node: flight,
                parent: dataset
            }
        );
        assert_eq!(
            tree.check_move(tree.root_id(), flight).unwrap_err(),
            ValidationError::RootImmutable(tree.root_id())
        );
    }

    #[test]
    fn check_attach_enforces_single_file_per_kind() {
        let (mut tree, _, dataset) = tree_with_dataset();
        let first = gravity_file();
        tree.check_attach(dataset, &first).unwrap();
        tree.attach(dataset, first);

        let second = gravity_file();
        assert_eq!(
            tree.check_attach(dataset, &second).unwrap_err(),
            ValidationError::SlotOccupied {
                dataset,
                kind: DataKind::Gravity
            }
        );
    }

    #[test]
    fn detach_subtree_removes_index_entries() {
        let (mut tree, flight, dataset) = tree_with_dataset();
        let removed = tree.detach_subtree(flight);
        assert_eq!(removed.len(), 2);
        assert!(tree.find(dataset).is_none());
        assert!(tree.children_of(tree.root_id()).is_empty());
        assert_eq!(tree.len(), 1);
    }
}
