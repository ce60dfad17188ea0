//! Entity kinds and the ownership rules between them.
//!
//! # Invariants
//! - Ownership edges form a tree rooted at exactly one `Project`.
//! - `allowed_children` is the single source for parent/child compatibility.

use std::fmt::{Display, Formatter};

/// Discriminant for every entity stored in a project tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Project,
    Flight,
    DataSet,
    DataFile,
    DataSegment,
    Gravimeter,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        Self::Project,
        Self::Flight,
        Self::DataSet,
        Self::DataFile,
        Self::DataSegment,
        Self::Gravimeter,
    ];

    /// Type name written into documents as `_type`.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Project => "Project",
            Self::Flight => "Flight",
            Self::DataSet => "DataSet",
            Self::DataFile => "DataFile",
            Self::DataSegment => "DataSegment",
            Self::Gravimeter => "Gravimeter",
        }
    }

    /// Prefix used in the textual OID form.
    pub fn group(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Flight => "flight",
            Self::DataSet => "dataset",
            Self::DataFile => "datafile",
            Self::DataSegment => "segment",
            Self::Gravimeter => "meter",
        }
    }

    pub fn from_group(group: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.group() == group)
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_name() == name)
    }

    /// Child kinds this kind may own.
    pub fn allowed_children(self) -> &'static [EntityKind] {
        match self {
            Self::Project => &[Self::Flight, Self::Gravimeter],
            Self::Flight => &[Self::DataSet],
            Self::DataSet => &[Self::DataFile, Self::DataSegment],
            Self::DataFile | Self::DataSegment | Self::Gravimeter => &[],
        }
    }

    pub fn can_own(self, child: EntityKind) -> bool {
        self.allowed_children().contains(&child)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Category of an ingested raw file; a DataSet holds at most one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Gravity,
    Trajectory,
}

impl DataKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gravity => "gravity",
            Self::Trajectory => "trajectory",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gravity" => Some(Self::Gravity),
            "trajectory" | "gps" => Some(Self::Trajectory),
            _ => None,
        }
    }
}

impl Display for DataKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{DataKind, EntityKind};

    #[test]
    fn groups_are_unique_and_reversible() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_group(kind.group()), Some(kind));
            assert_eq!(EntityKind::from_type_name(kind.type_name()), Some(kind));
        }
    }

    #[test]
    fn leaves_own_nothing() {
        assert!(EntityKind::Project.can_own(EntityKind::Flight));
        assert!(!EntityKind::Flight.can_own(EntityKind::Flight));
        assert!(!EntityKind::DataSet.can_own(EntityKind::Flight));
        assert!(EntityKind::DataFile.allowed_children().is_empty());
    }

    #[test]
    fn data_kind_accepts_legacy_gps_alias() {
        assert_eq!(DataKind::parse(" GPS "), Some(DataKind::Trajectory));
        assert_eq!(DataKind::parse("gravity"), Some(DataKind::Gravity));
        assert_eq!(DataKind::parse("marine"), None);
    }
}
