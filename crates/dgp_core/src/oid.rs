//! Object identifiers shared by every project entity.
//!
//! # Responsibility
//! - Mint globally unique, creation-ordered identifiers.
//! - Render and parse the canonical `<group>_<32 hex>` text form.
//!
//! # Invariants
//! - Equality, hashing and ordering depend only on the base UUID.
//! - An OID is assigned once at entity creation and never reassigned.
//! - Entities never hold direct references to each other, only OIDs.

use crate::model::EntityKind;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use uuid::Uuid;

static OID_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z]+)_([0-9a-f]{32})$").expect("valid oid regex"));
static BASE_UUID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{32}$").expect("valid base uuid regex"));

/// Errors from parsing OID text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OidParseError {
    /// Text does not match `<group>_<32 hex>` (or bare 32 hex).
    Malformed(String),
    /// Group prefix does not name a known entity kind.
    UnknownGroup(String),
}

impl Display for OidParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(value) => write!(f, "malformed identifier `{value}`"),
            Self::UnknownGroup(value) => write!(f, "unknown identifier group `{value}`"),
        }
    }
}

impl Error for OidParseError {}

/// Object identifier.
///
/// Base UUIDs are version 7, so OIDs minted later sort after earlier ones.
#[derive(Debug, Clone, Copy)]
pub struct Oid {
    kind: EntityKind,
    base: Uuid,
}

impl Oid {
    /// Mints a fresh identifier for an entity of `kind`.
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            base: Uuid::now_v7(),
        }
    }

    /// Rebuilds an identifier from a previously minted base UUID.
    pub fn from_parts(kind: EntityKind, base: Uuid) -> Self {
        Self { kind, base }
    }

    /// Parses the bare 32-hex base form, using `kind` for the group.
    pub fn parse_base(kind: EntityKind, base_hex: &str) -> Result<Self, OidParseError> {
        let trimmed = base_hex.trim();
        if !BASE_UUID_RE.is_match(trimmed) {
            return Err(OidParseError::Malformed(trimmed.to_string()));
        }
        let base = Uuid::parse_str(trimmed)
            .map_err(|_| OidParseError::Malformed(trimmed.to_string()))?;
        Ok(Self { kind, base })
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn group(&self) -> &'static str {
        self.kind.group()
    }

    pub fn uuid(&self) -> Uuid {
        self.base
    }

    /// Lowercase 32-hex rendering of the base UUID.
    pub fn base_uuid(&self) -> String {
        self.base.simple().to_string()
    }
}

impl PartialEq for Oid {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base
    }
}

impl Eq for Oid {}

impl Hash for Oid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base.hash(state);
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> Ordering {
        self.base.cmp(&other.base)
    }
}

impl Display for Oid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.kind.group(), self.base.simple())
    }
}

impl FromStr for Oid {
    type Err = OidParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let captures = OID_TEXT_RE
            .captures(trimmed)
            .ok_or_else(|| OidParseError::Malformed(trimmed.to_string()))?;
        let group = &captures[1];
        let kind = EntityKind::from_group(group)
            .ok_or_else(|| OidParseError::UnknownGroup(group.to_string()))?;
        Self::parse_base(kind, &captures[2])
    }
}

#[cfg(test)]
mod tests {
    use super::{Oid, OidParseError};
    use crate::model::EntityKind;
    use std::collections::HashSet;

    #[test]
    fn display_and_parse_are_inverse() {
        let oid = Oid::new(EntityKind::Flight);
        let text = oid.to_string();
        assert!(text.starts_with("flight_"));
        assert_eq!(text.len(), "flight_".len() + 32);

        let parsed: Oid = text.parse().expect("display output should parse");
        assert_eq!(parsed, oid);
        assert_eq!(parsed.kind(), EntityKind::Flight);
    }

    #[test]
    fn base_form_requires_kind_hint() {
        let oid = Oid::new(EntityKind::DataFile);
        let parsed = Oid::parse_base(EntityKind::DataFile, &oid.base_uuid()).unwrap();
        assert_eq!(parsed, oid);
        assert_eq!(parsed.to_string(), oid.to_string());
    }

    #[test]
    fn parse_rejects_unknown_group_and_bad_hex() {
        let base = Oid::new(EntityKind::Project).base_uuid();
        assert!(matches!(
            format!("plane_{base}").parse::<Oid>(),
            Err(OidParseError::UnknownGroup(group)) if group == "plane"
        ));
        assert!(matches!(
            "flight_xyz".parse::<Oid>(),
            Err(OidParseError::Malformed(_))
        ));
        assert!(Oid::parse_base(EntityKind::Flight, "ABC").is_err());
    }

    #[test]
    fn later_oids_sort_after_earlier_ones() {
        let first = Oid::new(EntityKind::Flight);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = Oid::new(EntityKind::Flight);
        assert!(first < second);
    }

    #[test]
    fn hundred_thousand_oids_are_unique_and_stable() {
        let mut seen = HashSet::with_capacity(100_000);
        for _ in 0..100_000 {
            let oid = Oid::new(EntityKind::DataSegment);
            let reparsed: Oid = oid.to_string().parse().unwrap();
            assert_eq!(reparsed, oid);
            assert_eq!(reparsed.base_uuid(), oid.base_uuid());
            assert!(seen.insert(oid), "duplicate oid generated: {oid}");
        }
        assert_eq!(seen.len(), 100_000);
    }
}
