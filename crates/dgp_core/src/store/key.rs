//! Store keys derived from DataFile identifiers.

use crate::model::{DataKind, EntityKind};
use crate::oid::Oid;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};

static KEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(gravity|trajectory)/_([0-9a-f]{32})$").expect("valid store key regex")
});

/// Binary store lookup key, `/<kind>/_<base uuid>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey(String);

impl StoreKey {
    pub fn for_datafile(kind: DataKind, datafile: Oid) -> Self {
        Self(format!("/{}/_{}", kind.as_str(), datafile.base_uuid()))
    }

    /// Parses a key string, returning `None` for malformed keys.
    pub fn parse(value: &str) -> Option<Self> {
        KEY_PATTERN
            .is_match(value)
            .then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn data_kind(&self) -> Option<DataKind> {
        let captures = KEY_PATTERN.captures(&self.0)?;
        DataKind::parse(captures.get(1)?.as_str())
    }

    /// DataFile identifier this key was derived from.
    pub fn datafile_oid(&self) -> Option<Oid> {
        let captures = KEY_PATTERN.captures(&self.0)?;
        Oid::parse_base(EntityKind::DataFile, captures.get(2)?.as_str()).ok()
    }
}

impl Display for StoreKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
