//! The hand-authored part of the address space.

use tracing::info;

use crate::address_space::AddressSpace;
use crate::error::{ServerError, ServerResult};
use crate::node::{AccessLevel, AttributeKind, NodeId, QualifiedName};
use crate::variant::Variant;

pub const NEW_OBJECT_ID: u32 = 99;
pub const NEW_OBJECT_NAME: &str = "NewObject";

pub const INITIAL_STRING: &str = "empty";
pub const INITIAL_COUNTER: u32 = 8;
pub const INITIAL_PROPERTY: f64 = 8.8;
pub const INITIAL_BOOL: bool = true;
pub const INITIAL_ARRAY: [i32; 5] = [1, 2, 3, 4, 5];

/// Handles to the five variables under `NewObject`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedNodes {
    pub object: NodeId,
    pub string_var: NodeId,
    pub int_var: NodeId,
    pub float_prop: NodeId,
    pub bool_var: NodeId,
    pub array_var: NodeId,
}

/// Create `NewObject` under `root` with its five test variables.
///
/// `MyProperty` and `MyBool` are made writable for owner and user; the other three
/// keep the address space default. Any rejection aborts startup.
pub async fn create_fixed_hierarchy<S>(space: &S, root: &NodeId, namespace: u16) -> ServerResult<FixedNodes>
where
    S: AddressSpace + ?Sized,
{
    let object = space
        .create_object(
            root,
            NodeId::numeric(namespace, NEW_OBJECT_ID),
            QualifiedName::new(namespace, NEW_OBJECT_NAME),
        )
        .await
        .map_err(ServerError::Startup)?;

    let string_var = variable(space, &object, namespace, "MyStringVar", INITIAL_STRING.into()).await?;
    let int_var = variable(space, &object, namespace, "MyVariable", INITIAL_COUNTER.into()).await?;
    let float_prop = variable(space, &object, namespace, "MyProperty", INITIAL_PROPERTY.into()).await?;
    grant_read_write(space, &float_prop).await?;
    let bool_var = variable(space, &object, namespace, "MyBool", INITIAL_BOOL.into()).await?;
    grant_read_write(space, &bool_var).await?;
    let array_var = variable(space, &object, namespace, "MyArrayVar", INITIAL_ARRAY.to_vec().into()).await?;

    info!(object=%object, "fixed hierarchy created");
    Ok(FixedNodes { object, string_var, int_var, float_prop, bool_var, array_var })
}

async fn variable<S>(space: &S, parent: &NodeId, namespace: u16, name: &str, value: Variant) -> ServerResult<NodeId>
where
    S: AddressSpace + ?Sized,
{
    space
        .create_variable(parent, namespace, name, value)
        .await
        .map_err(ServerError::Startup)
}

/// Give `node` read/write access for both the owner and the effective user.
pub async fn grant_read_write<S>(space: &S, node: &NodeId) -> ServerResult<()>
where
    S: AddressSpace + ?Sized,
{
    for kind in [AttributeKind::AccessLevel, AttributeKind::UserAccessLevel] {
        space
            .set_attribute(node, kind, AccessLevel::READ_WRITE)
            .await
            .map_err(ServerError::Startup)?;
    }
    Ok(())
}
