//! Test doubles: a fault-injecting address space and an in-memory log sink.

use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::address_space::{AddressSpace, AddressSpaceState};
use crate::error::AddressSpaceError;
use crate::node::{AccessLevel, AttributeKind, NodeId, QualifiedName};
use crate::variant::Variant;

/// Wraps a real address space and rejects selected operations.
pub struct FaultySpace {
    pub inner: AddressSpaceState,
    rejected_writes: Mutex<HashSet<NodeId>>,
    variables_left: AtomicUsize,
}

impl FaultySpace {
    pub fn new() -> Self {
        Self {
            inner: AddressSpaceState::new("urn://faulty"),
            rejected_writes: Mutex::new(HashSet::new()),
            variables_left: AtomicUsize::new(usize::MAX),
        }
    }

    /// Every later write to `node` fails with `NotWritable`.
    pub fn reject_writes_to(&self, node: &NodeId) {
        self.rejected_writes.lock().unwrap().insert(node.clone());
    }

    /// Allow `n` more variable creations, then fail with `DuplicateNode`.
    pub fn allow_variables(&self, n: usize) {
        self.variables_left.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl AddressSpace for FaultySpace {
    async fn register_namespace(&self, uri: &str) -> u16 {
        self.inner.register_namespace(uri).await
    }

    fn root_node(&self) -> NodeId {
        self.inner.root_node()
    }

    fn objects_node(&self) -> NodeId {
        self.inner.objects_node()
    }

    async fn create_object(
        &self,
        parent: &NodeId,
        id: NodeId,
        name: QualifiedName,
    ) -> Result<NodeId, AddressSpaceError> {
        self.inner.create_object(parent, id, name).await
    }

    async fn create_variable(
        &self,
        parent: &NodeId,
        namespace: u16,
        name: &str,
        value: Variant,
    ) -> Result<NodeId, AddressSpaceError> {
        let left = self.variables_left.load(Ordering::SeqCst);
        if left == 0 {
            return Err(AddressSpaceError::DuplicateNode(NodeId::string(namespace, name)));
        }
        self.variables_left.store(left - 1, Ordering::SeqCst);
        self.inner.create_variable(parent, namespace, name, value).await
    }

    async fn set_attribute(
        &self,
        node: &NodeId,
        kind: AttributeKind,
        level: AccessLevel,
    ) -> Result<(), AddressSpaceError> {
        self.inner.set_attribute(node, kind, level).await
    }

    async fn read_value(&self, node: &NodeId) -> Result<Variant, AddressSpaceError> {
        self.inner.read_value(node).await
    }

    async fn write_value(&self, node: &NodeId, value: Variant) -> Result<(), AddressSpaceError> {
        let rejected = self.rejected_writes.lock().unwrap().contains(node);
        if rejected {
            return Err(AddressSpaceError::NotWritable(node.clone()));
        }
        self.inner.write_value(node, value).await
    }
}

/// Formatted log output captured by [`capture_logs`].
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Route this thread's tracing output into a buffer until the guard drops.
pub fn capture_logs(filter: &str) -> (DefaultGuard, LogBuffer) {
    let buf = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(buf.clone())
        .with_ansi(false)
        .finish();
    (tracing::subscriber::set_default(subscriber), buf)
}
