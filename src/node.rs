use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Identifier part of a [`NodeId`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Identifier {
    Numeric(u32),
    String(String),
}

/// Handle to one node in the address space.
///
/// A `NodeId` is a key: every clone refers to the same node, so holders never own
/// an independent copy of the node's state.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl NodeId {
    pub const fn numeric(namespace: u16, id: u32) -> Self {
        Self { namespace, identifier: Identifier::Numeric(id) }
    }

    pub fn string(namespace: u16, id: impl Into<String>) -> Self {
        Self { namespace, identifier: Identifier::String(id.into()) }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Identifier::Numeric(id) => write!(f, "ns={};i={}", self.namespace, id),
            Identifier::String(id) => write!(f, "ns={};s={}", self.namespace, id),
        }
    }
}

/// Namespace-qualified browse name.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub namespace: u16,
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace: u16, name: impl Into<String>) -> Self {
        Self { namespace, name: name.into() }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

bitflags! {
    /// Variable access level bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct AccessLevel: u8 {
        const CURRENT_READ = 0b0000_0001;
        const CURRENT_WRITE = 0b0000_0010;
    }
}

impl AccessLevel {
    pub const READ_WRITE: AccessLevel = AccessLevel::CURRENT_READ.union(AccessLevel::CURRENT_WRITE);
}

impl Default for AccessLevel {
    fn default() -> Self {
        AccessLevel::CURRENT_READ
    }
}

/// Attributes a caller may set on a variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeKind {
    AccessLevel,
    UserAccessLevel,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    Object,
    Variable,
}
