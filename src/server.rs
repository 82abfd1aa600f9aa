use tracing::info;

use crate::address_space::{AddressSpace, AddressSpaceState};
use crate::bulk::{create_many, BulkVariableTable};
use crate::config::{ServerConfig, SimulationConfig};
use crate::error::{ServerError, ServerResult};
use crate::hierarchy::{create_fixed_hierarchy, FixedNodes};
use crate::observability::Metrics;
use crate::scheduler::UpdateScheduler;

/// Owns the address space and the endpoint identity it is published under.
pub struct UaServer {
    space: AddressSpaceState,
    config: ServerConfig,
    running: bool,
}

/// Everything the update loop needs, produced once by [`UaServer::populate`].
#[derive(Debug, Clone)]
pub struct Simulation {
    pub namespace: u16,
    pub nodes: FixedNodes,
    pub bulk: BulkVariableTable,
}

impl UaServer {
    pub fn new(config: ServerConfig) -> Self {
        let space = AddressSpaceState::new(&config.server_uri);
        Self { space, config, running: false }
    }

    pub fn space(&self) -> &AddressSpaceState {
        &self.space
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self) {
        self.running = true;
        info!(
            endpoint=%self.config.endpoint,
            server_uri=%self.config.server_uri,
            "endpoint identity configured (wire protocol not served)"
        );
    }

    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            info!(endpoint=%self.config.endpoint, "simulation stopped");
        }
    }

    /// Register the application namespace and build `NewObject` and `ManyObjects`.
    pub async fn populate(&self, object_count: usize) -> ServerResult<Simulation> {
        let namespace = self.space.register_namespace(&self.config.namespace_uri).await;
        let objects = self.space.objects_node();

        let nodes = create_fixed_hierarchy(&self.space, &objects, namespace).await?;
        self.log_root().await?;
        let bulk = create_many(&self.space, &objects, object_count, namespace).await?;

        info!(namespace, nodes = self.space.node_count().await, "address space ready");
        Ok(Simulation { namespace, nodes, bulk })
    }

    async fn log_root(&self) -> ServerResult<()> {
        let root = self.space.root_node();
        let name = self.space.browse_name(&root).await.map_err(ServerError::Startup)?;
        info!(node=%root, browse_name=%name, "root node");
        for child in self.space.browse(&root).await.map_err(ServerError::Startup)? {
            info!(node=%child.node_id, browse_name=%child.browse_name, "root child");
        }
        Ok(())
    }
}

impl Simulation {
    pub fn into_scheduler(
        self,
        space: AddressSpaceState,
        config: &SimulationConfig,
        metrics: Metrics,
    ) -> UpdateScheduler<AddressSpaceState> {
        UpdateScheduler::new(space, self.nodes, self.bulk, config.tick_interval())
            .with_policy(config.on_write_failure)
            .with_metrics(metrics)
    }
}
