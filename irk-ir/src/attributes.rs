//! Function attributes
//!
//! An attribute is either a well-known enumerated kind (optionally carrying
//! an integer, as in `align 8`) or a free-form string pair. Within one
//! attachment point an attribute is keyed by its kind or its string key, so
//! adding the same key twice replaces the first value.

use irk_common::AttributeKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Attribute {
    Enum {
        kind: AttributeKind,
        #[serde(default)]
        value: u64,
    },
    String {
        key: String,
        #[serde(default)]
        value: String,
    },
}

/// Lookup key of an attribute within one attachment point
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeKey {
    Enum(AttributeKind),
    String(String),
}

impl Attribute {
    /// Enumerated attribute without a payload
    pub fn flag(kind: AttributeKind) -> Self {
        Attribute::Enum { kind, value: 0 }
    }

    pub fn int(kind: AttributeKind, value: u64) -> Self {
        Attribute::Enum { kind, value }
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Attribute::String { key: key.into(), value: value.into() }
    }

    pub fn key(&self) -> AttributeKey {
        match self {
            Attribute::Enum { kind, .. } => AttributeKey::Enum(*kind),
            Attribute::String { key, .. } => AttributeKey::String(key.clone()),
        }
    }

    pub fn enum_kind(&self) -> Option<AttributeKind> {
        match self {
            Attribute::Enum { kind, .. } => Some(*kind),
            Attribute::String { .. } => None,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Enum { kind, value } if kind.takes_value() => write!(f, "{kind} {value}"),
            Attribute::Enum { kind, .. } => write!(f, "{kind}"),
            Attribute::String { key, value } if value.is_empty() => write!(f, "\"{key}\""),
            Attribute::String { key, value } => write!(f, "\"{key}\"=\"{value}\""),
        }
    }
}

impl From<AttributeKind> for AttributeKey {
    fn from(kind: AttributeKind) -> Self {
        AttributeKey::Enum(kind)
    }
}

impl From<&str> for AttributeKey {
    fn from(key: &str) -> Self {
        AttributeKey::String(key.to_string())
    }
}

impl From<String> for AttributeKey {
    fn from(key: String) -> Self {
        AttributeKey::String(key)
    }
}

/// Attributes at one attachment point, ordered enum kinds first
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct AttributeSet {
    entries: BTreeMap<AttributeKey, Attribute>,
}

impl AttributeSet {
    pub(crate) fn insert(&mut self, attribute: Attribute) {
        self.entries.insert(attribute.key(), attribute);
    }

    pub(crate) fn get(&self, key: &AttributeKey) -> Option<&Attribute> {
        self.entries.get(key)
    }

    pub(crate) fn remove(&mut self, key: &AttributeKey) -> Option<Attribute> {
        self.entries.remove(key)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.entries.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
