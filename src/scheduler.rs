//! The periodic update loop.
//!
//! Every tick advances [`ScheduleState`] and writes the result into the fixed
//! variables, then walks the bulk table doing one read-increment-write per
//! variable. Each accepted write produces a change notification in the address
//! space. Ticks run back to back with a fixed sleep in between until the stop
//! signal flips.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::address_space::AddressSpace;
use crate::bulk::BulkVariableTable;
use crate::config::WriteFailurePolicy;
use crate::error::{AddressSpaceError, ServerError, ServerResult};
use crate::hierarchy::{FixedNodes, INITIAL_ARRAY, INITIAL_BOOL};
use crate::node::NodeId;
use crate::observability::Metrics;
use crate::variant::{DataType, Variant};

/// Label written to `MyStringVar`; the counter takes at least three columns.
pub fn event_label(counter: u32) -> String {
    format!("event: {counter:3}")
}

/// Scheduler-owned values that are not read back from the address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleState {
    counter: u32,
    array: Vec<i32>,
    toggle: bool,
}

/// Values produced by one call to [`ScheduleState::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickValues {
    pub counter: u32,
    pub label: String,
    pub array: Vec<i32>,
    pub toggle: bool,
}

impl ScheduleState {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(counter: u32) -> Self {
        Self { counter, array: INITIAL_ARRAY.to_vec(), toggle: INITIAL_BOOL }
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn array(&self) -> &[i32] {
        &self.array
    }

    pub fn toggle(&self) -> bool {
        self.toggle
    }

    pub fn advance(&mut self) -> TickValues {
        self.counter = self.counter.wrapping_add(1);
        for v in &mut self.array {
            *v = v.wrapping_add(1);
        }
        self.toggle = !self.toggle;
        TickValues {
            counter: self.counter,
            label: event_label(self.counter),
            array: self.array.clone(),
            toggle: self.toggle,
        }
    }
}

impl Default for ScheduleState {
    fn default() -> Self {
        Self::new()
    }
}

/// Write counts for one tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub writes: usize,
    pub failures: usize,
}

pub struct UpdateScheduler<S> {
    space: S,
    nodes: FixedNodes,
    bulk: BulkVariableTable,
    state: ScheduleState,
    interval: Duration,
    policy: WriteFailurePolicy,
    metrics: Metrics,
    ticks: u64,
}

impl<S: AddressSpace> UpdateScheduler<S> {
    pub fn new(space: S, nodes: FixedNodes, bulk: BulkVariableTable, interval: Duration) -> Self {
        Self {
            space,
            nodes,
            bulk,
            state: ScheduleState::new(),
            interval,
            policy: WriteFailurePolicy::default(),
            metrics: Metrics::new(),
            ticks: 0,
        }
    }

    pub fn with_policy(mut self, policy: WriteFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        metrics.set_bulk_variables(self.bulk.len());
        self.metrics = metrics;
        self
    }

    pub fn state(&self) -> &ScheduleState {
        &self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Publish the starting counter before the first tick.
    pub async fn prime(&mut self) -> ServerResult<()> {
        let node = &self.nodes.int_var;
        self.space
            .write_value(node, Variant::UInt32(self.state.counter))
            .await
            .map_err(|source| ServerError::Write { node: node.clone(), source })
    }

    /// Run one tick. Writes happen in a fixed order: counter, label, array,
    /// toggle, then every bulk variable in table order.
    pub async fn tick(&mut self) -> ServerResult<TickReport> {
        let started = Instant::now();
        let values = self.state.advance();
        let mut report = TickReport::default();

        let fixed = [
            (&self.nodes.int_var, Variant::UInt32(values.counter)),
            (&self.nodes.string_var, Variant::String(values.label)),
            (&self.nodes.array_var, Variant::Int32Array(values.array)),
            (&self.nodes.bool_var, Variant::Boolean(values.toggle)),
        ];
        for (node, value) in fixed {
            let result = self.space.write_value(node, value).await;
            self.settle(&mut report, node, result)?;
        }

        for node in &self.bulk {
            let result = match self.space.read_value(node).await {
                Ok(Variant::Int32(v)) => self.space.write_value(node, Variant::Int32(v.wrapping_add(1))).await,
                Ok(other) => Err(AddressSpaceError::TypeMismatch {
                    node: node.clone(),
                    expected: DataType::Int32,
                    actual: other.data_type(),
                }),
                Err(e) => Err(e),
            };
            self.settle(&mut report, node, result)?;
        }

        self.ticks += 1;
        self.metrics.observe_tick(started.elapsed().as_secs_f64());
        debug!(tick = self.ticks, counter = values.counter, writes = report.writes, "tick done");
        Ok(report)
    }

    fn settle(
        &self,
        report: &mut TickReport,
        node: &NodeId,
        result: Result<(), AddressSpaceError>,
    ) -> ServerResult<()> {
        let Err(source) = result else {
            report.writes += 1;
            self.metrics.inc_writes("ok", 1);
            return Ok(());
        };
        self.metrics.inc_writes("failed", 1);
        match self.policy {
            WriteFailurePolicy::FailFast => Err(ServerError::Write { node: node.clone(), source }),
            WriteFailurePolicy::LogAndContinue => {
                warn!(node=%node, error=%source, "write failed, continuing");
                report.failures += 1;
                Ok(())
            }
        }
    }

    /// Prime, then tick until `stop` becomes true. Returns the number of ticks run.
    ///
    /// The stop signal is checked before every tick and also cuts the sleep short.
    /// If the sender is dropped the loop runs until a write fails.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> ServerResult<u64> {
        self.prime().await?;
        info!(
            interval_ms = self.interval.as_millis() as u64,
            bulk = self.bulk.len(),
            policy = ?self.policy,
            "update loop running"
        );

        loop {
            let stop_requested = *stop.borrow();
            if stop_requested {
                break;
            }
            self.tick().await?;

            let sleep = tokio::time::sleep(self.interval);
            tokio::pin!(sleep);
            let woke_early = tokio::select! {
                _ = &mut sleep => false,
                _ = stop.changed() => true,
            };
            // A dropped sender or a non-stop value must not shorten the interval.
            let stop_requested = *stop.borrow();
            if woke_early && !stop_requested {
                sleep.await;
            }
        }

        info!(ticks = self.ticks, "update loop stopped");
        Ok(self.ticks)
    }
}
