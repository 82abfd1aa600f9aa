//! In-process address space.
//!
//! This is the protocol-side collaborator the simulation talks to: it owns every
//! node, serializes access behind one lock, and publishes a [`DataChange`] on the
//! broadcast channel for each value write so subscribers see live updates.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, trace};

use crate::error::AddressSpaceError;
use crate::node::{AccessLevel, AttributeKind, NodeClass, NodeId, QualifiedName};
use crate::variant::{DataType, Variant};

pub const OPC_UA_NAMESPACE: &str = "http://opcfoundation.org/UA/";

/// Index handed out by the first `register_namespace` call. Slots 0 and 1 hold
/// the standard namespace and the server URI.
pub const FIRST_CUSTOM_NAMESPACE: u16 = 2;

const ROOT_FOLDER: u32 = 84;
const OBJECTS_FOLDER: u32 = 85;
const TYPES_FOLDER: u32 = 86;
const VIEWS_FOLDER: u32 = 87;

const FIRST_AUTO_ID: u32 = 1000;
const CHANGE_CHANNEL_CAPACITY: usize = 4096;

/// The collaborator contract used by the builders and the update scheduler.
#[async_trait]
pub trait AddressSpace: Send + Sync {
    async fn register_namespace(&self, uri: &str) -> u16;

    fn root_node(&self) -> NodeId;

    fn objects_node(&self) -> NodeId;

    async fn create_object(
        &self,
        parent: &NodeId,
        id: NodeId,
        name: QualifiedName,
    ) -> Result<NodeId, AddressSpaceError>;

    /// Create a variable with a generated numeric id and read-only access.
    async fn create_variable(
        &self,
        parent: &NodeId,
        namespace: u16,
        name: &str,
        value: Variant,
    ) -> Result<NodeId, AddressSpaceError>;

    async fn set_attribute(
        &self,
        node: &NodeId,
        kind: AttributeKind,
        level: AccessLevel,
    ) -> Result<(), AddressSpaceError>;

    async fn read_value(&self, node: &NodeId) -> Result<Variant, AddressSpaceError>;

    /// Server-side write. Ignores access levels but enforces the variable's type.
    async fn write_value(&self, node: &NodeId, value: Variant) -> Result<(), AddressSpaceError>;
}

#[async_trait]
impl<T: AddressSpace + ?Sized> AddressSpace for Arc<T> {
    async fn register_namespace(&self, uri: &str) -> u16 {
        (**self).register_namespace(uri).await
    }

    fn root_node(&self) -> NodeId {
        (**self).root_node()
    }

    fn objects_node(&self) -> NodeId {
        (**self).objects_node()
    }

    async fn create_object(
        &self,
        parent: &NodeId,
        id: NodeId,
        name: QualifiedName,
    ) -> Result<NodeId, AddressSpaceError> {
        (**self).create_object(parent, id, name).await
    }

    async fn create_variable(
        &self,
        parent: &NodeId,
        namespace: u16,
        name: &str,
        value: Variant,
    ) -> Result<NodeId, AddressSpaceError> {
        (**self).create_variable(parent, namespace, name, value).await
    }

    async fn set_attribute(
        &self,
        node: &NodeId,
        kind: AttributeKind,
        level: AccessLevel,
    ) -> Result<(), AddressSpaceError> {
        (**self).set_attribute(node, kind, level).await
    }

    async fn read_value(&self, node: &NodeId) -> Result<Variant, AddressSpaceError> {
        (**self).read_value(node).await
    }

    async fn write_value(&self, node: &NodeId, value: Variant) -> Result<(), AddressSpaceError> {
        (**self).write_value(node, value).await
    }
}

/// Notification published for every accepted value write.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChange {
    pub node: NodeId,
    pub value: Variant,
    pub sequence: u64,
}

/// One child as seen by a browse call.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub node_id: String,
    pub browse_name: String,
    pub class: NodeClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Variant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writable: Option<bool>,
}

#[derive(Clone)]
pub struct AddressSpaceState {
    inner: Arc<Inner>,
}

struct Inner {
    tree: RwLock<Tree>,
    namespaces: RwLock<Vec<String>>,
    changes: broadcast::Sender<DataChange>,
}

struct Tree {
    nodes: BTreeMap<NodeId, Node>,
    next_auto_id: u32,
    sequence: u64,
}

struct Node {
    browse_name: QualifiedName,
    children: Vec<NodeId>,
    body: NodeBody,
}

enum NodeBody {
    Object,
    Variable {
        value: Variant,
        data_type: DataType,
        access_level: AccessLevel,
        user_access_level: AccessLevel,
    },
}

impl Node {
    fn object(browse_name: QualifiedName) -> Self {
        Self { browse_name, children: Vec::new(), body: NodeBody::Object }
    }

    fn class(&self) -> NodeClass {
        match self.body {
            NodeBody::Object => NodeClass::Object,
            NodeBody::Variable { .. } => NodeClass::Variable,
        }
    }
}

impl AddressSpaceState {
    /// Build an address space holding only the standard folders.
    pub fn new(server_uri: &str) -> Self {
        let mut nodes = BTreeMap::new();
        let root = NodeId::numeric(0, ROOT_FOLDER);
        let mut root_node = Node::object(QualifiedName::new(0, "Root"));
        for (id, name) in [(OBJECTS_FOLDER, "Objects"), (TYPES_FOLDER, "Types"), (VIEWS_FOLDER, "Views")] {
            let folder = NodeId::numeric(0, id);
            root_node.children.push(folder.clone());
            nodes.insert(folder, Node::object(QualifiedName::new(0, name)));
        }
        nodes.insert(root, root_node);

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                tree: RwLock::new(Tree { nodes, next_auto_id: FIRST_AUTO_ID, sequence: 0 }),
                namespaces: RwLock::new(vec![OPC_UA_NAMESPACE.to_string(), server_uri.to_string()]),
                changes,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DataChange> {
        self.inner.changes.subscribe()
    }

    pub async fn namespaces(&self) -> Vec<String> {
        self.inner.namespaces.read().await.clone()
    }

    pub async fn node_count(&self) -> usize {
        self.inner.tree.read().await.nodes.len()
    }

    pub async fn browse_name(&self, node: &NodeId) -> Result<QualifiedName, AddressSpaceError> {
        let tree = self.inner.tree.read().await;
        let n = tree.nodes.get(node).ok_or_else(|| AddressSpaceError::UnknownNode(node.clone()))?;
        Ok(n.browse_name.clone())
    }

    pub async fn access_level(
        &self,
        node: &NodeId,
        kind: AttributeKind,
    ) -> Result<AccessLevel, AddressSpaceError> {
        let tree = self.inner.tree.read().await;
        let n = tree.nodes.get(node).ok_or_else(|| AddressSpaceError::UnknownNode(node.clone()))?;
        match &n.body {
            NodeBody::Variable { access_level, user_access_level, .. } => Ok(match kind {
                AttributeKind::AccessLevel => *access_level,
                AttributeKind::UserAccessLevel => *user_access_level,
            }),
            NodeBody::Object => Err(AddressSpaceError::NotAVariable(node.clone())),
        }
    }

    /// Children of `node`, in creation order.
    pub async fn browse(&self, node: &NodeId) -> Result<Vec<NodeSummary>, AddressSpaceError> {
        let tree = self.inner.tree.read().await;
        let n = tree.nodes.get(node).ok_or_else(|| AddressSpaceError::UnknownNode(node.clone()))?;
        let mut out = Vec::with_capacity(n.children.len());
        for child_id in &n.children {
            let Some(child) = tree.nodes.get(child_id) else { continue };
            let (value, writable) = match &child.body {
                NodeBody::Variable { value, user_access_level, .. } => (
                    Some(value.clone()),
                    Some(user_access_level.contains(AccessLevel::CURRENT_WRITE)),
                ),
                NodeBody::Object => (None, None),
            };
            out.push(NodeSummary {
                node_id: child_id.to_string(),
                browse_name: child.browse_name.to_string(),
                class: child.class(),
                value,
                writable,
            });
        }
        Ok(out)
    }

    /// Resolve a dotted browse path such as `NewObject.MyBool`, starting at Objects.
    /// An empty path resolves to Objects itself.
    pub async fn resolve_path(&self, path: &str) -> Result<NodeId, AddressSpaceError> {
        let tree = self.inner.tree.read().await;
        let mut current = self.objects_node();
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            let node = tree
                .nodes
                .get(&current)
                .ok_or_else(|| AddressSpaceError::UnknownPath(path.to_string()))?;
            current = node
                .children
                .iter()
                .find(|c| tree.nodes.get(*c).is_some_and(|n| n.browse_name.name == segment))
                .cloned()
                .ok_or_else(|| AddressSpaceError::UnknownPath(path.to_string()))?;
        }
        Ok(current)
    }

    /// Write on behalf of a client: requires CurrentWrite in the user access level.
    pub async fn client_write(&self, node: &NodeId, value: Variant) -> Result<(), AddressSpaceError> {
        let level = self.access_level(node, AttributeKind::UserAccessLevel).await?;
        if !level.contains(AccessLevel::CURRENT_WRITE) {
            return Err(AddressSpaceError::NotWritable(node.clone()));
        }
        self.write_value(node, value).await
    }

    fn insert_child(tree: &mut Tree, parent: &NodeId, id: NodeId, node: Node) -> Result<(), AddressSpaceError> {
        if tree.nodes.contains_key(&id) {
            return Err(AddressSpaceError::DuplicateNode(id));
        }
        let p = tree
            .nodes
            .get_mut(parent)
            .ok_or_else(|| AddressSpaceError::UnknownNode(parent.clone()))?;
        p.children.push(id.clone());
        tree.nodes.insert(id, node);
        Ok(())
    }
}

#[async_trait]
impl AddressSpace for AddressSpaceState {
    async fn register_namespace(&self, uri: &str) -> u16 {
        let mut namespaces = self.inner.namespaces.write().await;
        if let Some(idx) = namespaces.iter().position(|ns| ns == uri) {
            return idx as u16;
        }
        namespaces.push(uri.to_string());
        let idx = (namespaces.len() - 1) as u16;
        debug!(%uri, idx, "namespace registered");
        idx
    }

    fn root_node(&self) -> NodeId {
        NodeId::numeric(0, ROOT_FOLDER)
    }

    fn objects_node(&self) -> NodeId {
        NodeId::numeric(0, OBJECTS_FOLDER)
    }

    async fn create_object(
        &self,
        parent: &NodeId,
        id: NodeId,
        name: QualifiedName,
    ) -> Result<NodeId, AddressSpaceError> {
        let mut tree = self.inner.tree.write().await;
        Self::insert_child(&mut tree, parent, id.clone(), Node::object(name))?;
        trace!(node=%id, %parent, "object created");
        Ok(id)
    }

    async fn create_variable(
        &self,
        parent: &NodeId,
        namespace: u16,
        name: &str,
        value: Variant,
    ) -> Result<NodeId, AddressSpaceError> {
        let mut tree = self.inner.tree.write().await;
        let mut candidate = tree.next_auto_id;
        while tree.nodes.contains_key(&NodeId::numeric(namespace, candidate)) {
            candidate += 1;
        }
        let id = NodeId::numeric(namespace, candidate);
        let node = Node {
            browse_name: QualifiedName::new(namespace, name),
            children: Vec::new(),
            body: NodeBody::Variable {
                data_type: value.data_type(),
                value,
                access_level: AccessLevel::default(),
                user_access_level: AccessLevel::default(),
            },
        };
        Self::insert_child(&mut tree, parent, id.clone(), node)?;
        tree.next_auto_id = candidate + 1;
        trace!(node=%id, %parent, browse_name = name, "variable created");
        Ok(id)
    }

    async fn set_attribute(
        &self,
        node: &NodeId,
        kind: AttributeKind,
        level: AccessLevel,
    ) -> Result<(), AddressSpaceError> {
        let mut tree = self.inner.tree.write().await;
        let n = tree
            .nodes
            .get_mut(node)
            .ok_or_else(|| AddressSpaceError::UnknownNode(node.clone()))?;
        let NodeBody::Variable { access_level, user_access_level, .. } = &mut n.body else {
            return Err(AddressSpaceError::NotAVariable(node.clone()));
        };
        let slot = match kind {
            AttributeKind::AccessLevel => access_level,
            AttributeKind::UserAccessLevel => user_access_level,
        };
        if slot.contains(AccessLevel::CURRENT_WRITE) && !level.contains(AccessLevel::CURRENT_WRITE) {
            return Err(AddressSpaceError::AccessDowngrade(node.clone()));
        }
        *slot = level;
        Ok(())
    }

    async fn read_value(&self, node: &NodeId) -> Result<Variant, AddressSpaceError> {
        let tree = self.inner.tree.read().await;
        match tree.nodes.get(node).map(|n| &n.body) {
            Some(NodeBody::Variable { value, .. }) => Ok(value.clone()),
            Some(NodeBody::Object) => Err(AddressSpaceError::NotAVariable(node.clone())),
            None => Err(AddressSpaceError::UnknownNode(node.clone())),
        }
    }

    async fn write_value(&self, node: &NodeId, value: Variant) -> Result<(), AddressSpaceError> {
        let mut tree = self.inner.tree.write().await;
        let n = tree
            .nodes
            .get_mut(node)
            .ok_or_else(|| AddressSpaceError::UnknownNode(node.clone()))?;
        let NodeBody::Variable { value: slot, data_type, .. } = &mut n.body else {
            return Err(AddressSpaceError::NotAVariable(node.clone()));
        };
        if value.data_type() != *data_type {
            return Err(AddressSpaceError::TypeMismatch {
                node: node.clone(),
                expected: *data_type,
                actual: value.data_type(),
            });
        }
        *slot = value.clone();
        tree.sequence += 1;
        let sequence = tree.sequence;
        drop(tree);

        trace!(node=%node, %value, sequence, "value written");
        // No subscribers is not an error.
        let _ = self.inner.changes.send(DataChange { node: node.clone(), value, sequence });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER_URI: &str = "urn://test";

    #[tokio::test]
    async fn starts_with_standard_folders() {
        let space = AddressSpaceState::new(SERVER_URI);
        let children = space.browse(&space.root_node()).await.unwrap();
        let names: Vec<_> = children.iter().map(|c| c.browse_name.as_str()).collect();
        assert_eq!(names, ["0:Objects", "0:Types", "0:Views"]);
        assert!(space.browse(&space.objects_node()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_registered_namespace_gets_index_two() {
        let space = AddressSpaceState::new(SERVER_URI);
        assert_eq!(space.register_namespace("http://a").await, FIRST_CUSTOM_NAMESPACE);
        assert_eq!(space.register_namespace("http://b").await, 3);
        assert_eq!(space.register_namespace("http://a").await, FIRST_CUSTOM_NAMESPACE);
        assert_eq!(space.namespaces().await[1], SERVER_URI);
    }

    #[tokio::test]
    async fn duplicate_object_is_rejected() {
        let space = AddressSpaceState::new(SERVER_URI);
        let objects = space.objects_node();
        let id = NodeId::numeric(2, 99);
        space.create_object(&objects, id.clone(), QualifiedName::new(2, "A")).await.unwrap();
        let err = space.create_object(&objects, id.clone(), QualifiedName::new(2, "B")).await.unwrap_err();
        assert_eq!(err, AddressSpaceError::DuplicateNode(id));
    }

    #[tokio::test]
    async fn generated_ids_skip_taken_ones() {
        let space = AddressSpaceState::new(SERVER_URI);
        let objects = space.objects_node();
        let taken = NodeId::numeric(2, FIRST_AUTO_ID);
        space.create_object(&objects, taken.clone(), QualifiedName::new(2, "Taken")).await.unwrap();
        let var = space.create_variable(&taken, 2, "v", Variant::Int32(1)).await.unwrap();
        assert_ne!(var, taken);
    }

    #[tokio::test]
    async fn write_checks_type_and_notifies() {
        let space = AddressSpaceState::new(SERVER_URI);
        let mut rx = space.subscribe();
        let var = space
            .create_variable(&space.objects_node(), 2, "v", Variant::Int32(1))
            .await
            .unwrap();

        space.write_value(&var, Variant::Int32(5)).await.unwrap();
        let change = rx.recv().await.unwrap();
        assert_eq!(change.node, var);
        assert_eq!(change.value, Variant::Int32(5));

        let err = space.write_value(&var, Variant::Boolean(true)).await.unwrap_err();
        assert!(matches!(err, AddressSpaceError::TypeMismatch { .. }));
        assert_eq!(space.read_value(&var).await.unwrap(), Variant::Int32(5));
    }

    #[tokio::test]
    async fn value_writes_log_at_trace_only() {
        let space = AddressSpaceState::new(SERVER_URI);
        let var = space
            .create_variable(&space.objects_node(), 2, "v", Variant::Int32(1))
            .await
            .unwrap();

        let (guard, debug_logs) = crate::testing::capture_logs("debug");
        space.write_value(&var, Variant::Int32(2)).await.unwrap();
        drop(guard);
        assert!(!debug_logs.contents().contains("value written"));

        let (_guard, trace_logs) = crate::testing::capture_logs("trace");
        space.write_value(&var, Variant::Int32(3)).await.unwrap();
        assert!(trace_logs.contents().contains("value written"));
    }

    #[tokio::test]
    async fn write_access_cannot_be_downgraded() {
        let space = AddressSpaceState::new(SERVER_URI);
        let var = space
            .create_variable(&space.objects_node(), 2, "v", Variant::Int32(1))
            .await
            .unwrap();
        space.set_attribute(&var, AttributeKind::AccessLevel, AccessLevel::READ_WRITE).await.unwrap();
        let err = space
            .set_attribute(&var, AttributeKind::AccessLevel, AccessLevel::CURRENT_READ)
            .await
            .unwrap_err();
        assert_eq!(err, AddressSpaceError::AccessDowngrade(var.clone()));
        assert_eq!(
            space.access_level(&var, AttributeKind::AccessLevel).await.unwrap(),
            AccessLevel::READ_WRITE
        );
    }

    #[tokio::test]
    async fn client_write_requires_user_write_access() {
        let space = AddressSpaceState::new(SERVER_URI);
        let var = space
            .create_variable(&space.objects_node(), 2, "v", Variant::Int32(1))
            .await
            .unwrap();
        let err = space.client_write(&var, Variant::Int32(2)).await.unwrap_err();
        assert_eq!(err, AddressSpaceError::NotWritable(var.clone()));

        space.set_attribute(&var, AttributeKind::UserAccessLevel, AccessLevel::READ_WRITE).await.unwrap();
        space.client_write(&var, Variant::Int32(2)).await.unwrap();
        assert_eq!(space.read_value(&var).await.unwrap(), Variant::Int32(2));
    }

    #[tokio::test]
    async fn resolves_dotted_paths() {
        let space = AddressSpaceState::new(SERVER_URI);
        let obj = NodeId::numeric(2, 99);
        space.create_object(&space.objects_node(), obj.clone(), QualifiedName::new(2, "Obj")).await.unwrap();
        let var = space.create_variable(&obj, 2, "Leaf", Variant::Double(1.5)).await.unwrap();
        assert_eq!(space.resolve_path("Obj.Leaf").await.unwrap(), var);
        assert_eq!(space.resolve_path("").await.unwrap(), space.objects_node());
        assert!(matches!(
            space.resolve_path("Obj.Missing").await,
            Err(AddressSpaceError::UnknownPath(_))
        ));
    }
}
