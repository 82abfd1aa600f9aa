//! `ManyObjects`: a flat array of identical Int32 variables.

use std::ops::Index;

use tracing::{info, warn};

use crate::address_space::AddressSpace;
use crate::error::{ServerError, ServerResult};
use crate::hierarchy::grant_read_write;
use crate::node::{NodeId, QualifiedName};
use crate::variant::Variant;

pub const MANY_OBJECTS_ID: u32 = 100;
pub const MANY_OBJECTS_NAME: &str = "ManyObjects";

/// Browse name of the bulk variable stored at table index `index`.
pub fn variable_name(index: usize) -> String {
    format!("var{}", index + 1)
}

/// Ordered handles to the bulk variables. Index `i` is always `var{i+1}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkVariableTable {
    parent: NodeId,
    handles: Box<[NodeId]>,
}

impl BulkVariableTable {
    pub fn parent(&self) -> &NodeId {
        &self.parent
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&NodeId> {
        self.handles.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NodeId> {
        self.handles.iter()
    }
}

impl Index<usize> for BulkVariableTable {
    type Output = NodeId;

    fn index(&self, index: usize) -> &NodeId {
        &self.handles[index]
    }
}

impl<'a> IntoIterator for &'a BulkVariableTable {
    type Item = &'a NodeId;
    type IntoIter = std::slice::Iter<'a, NodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Create `ManyObjects` under `parent` and `count` read/write variables below it.
///
/// If a creation fails partway, the nodes made so far stay in the address space;
/// the error carries how many there are.
pub async fn create_many<S>(space: &S, parent: &NodeId, count: usize, namespace: u16) -> ServerResult<BulkVariableTable>
where
    S: AddressSpace + ?Sized,
{
    // Initial values run 1..=count and must fit an Int32.
    let last = i32::try_from(count).map_err(|_| ServerError::BulkCountTooLarge { requested: count })?;

    let object = space
        .create_object(
            parent,
            NodeId::numeric(namespace, MANY_OBJECTS_ID),
            QualifiedName::new(namespace, MANY_OBJECTS_NAME),
        )
        .await
        .map_err(ServerError::Startup)?;

    let mut handles = Vec::with_capacity(count);
    for (i, value) in (1..=last).enumerate() {
        let initial = Variant::Int32(value);
        let created = match space.create_variable(&object, namespace, &variable_name(i), initial).await {
            Ok(node) => grant_read_write(space, &node).await.map(|()| node),
            Err(e) => Err(ServerError::Startup(e)),
        };
        match created {
            Ok(node) => handles.push(node),
            Err(ServerError::Startup(source)) => {
                warn!(created = handles.len(), requested = count, "bulk creation aborted; created nodes are left in place");
                return Err(ServerError::PartialBulkCreation { created: handles.len(), requested: count, source });
            }
            Err(e) => return Err(e),
        }
    }

    info!(count, parent=%object, "bulk variables created");
    Ok(BulkVariableTable { parent: object, handles: handles.into_boxed_slice() })
}
