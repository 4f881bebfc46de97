//! Simulation setup and bounded execution.
//!
//! [`new_simulation`] provisions a ready-to-run [`Simulation`] and a layered
//! [`Teardown`]; [`Simulation::run`] starts the nodes, wires the topology
//! (chain backbone plus seeded-random extra links) and scopes the caller's
//! evaluation step to the configured timeout.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use rand::{rngs::SmallRng, Rng, SeedableRng};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{
    adapters::new_adapter,
    config::{NetworkConfig, RunConfig},
    error::Error,
    network::Network,
    node::{NodeAddr, NodeId},
    step::{PassRecorder, StepContext, StepResult},
    storage::{provision_stores, StorageBackend},
    teardown::Teardown,
};

/// Bounded wait for a cooperative step to wind down after the run timeout
/// cancelled it. Steps that ignore cancellation are abandoned after this.
const CANCEL_GRACE: Duration = Duration::from_millis(100);

/// Counts connection attempts issued during topology wiring. Failures are
/// tolerated (connectivity correctness is the step evaluator's concern);
/// this counter is the hook to observe them anyway.
#[derive(Debug, Default)]
pub struct ConnectStats {
    attempted: AtomicUsize,
    failed: AtomicUsize,
}

impl ConnectStats {
    pub fn attempted(&self) -> usize {
        self.attempted.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}

/// A provisioned simulation: the live network plus three parallel sequences
/// (identities, addresses, stores) where index `i` always refers to the same
/// logical node.
pub struct Simulation<S> {
    net: Network,
    stores: Vec<S>,
    addrs: Vec<NodeAddr>,
    ids: Vec<NodeId>,
    connect_stats: Arc<ConnectStats>,
}

impl<S> std::fmt::Debug for Simulation<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("nodes", &self.ids.len())
            .field("connect_stats", &self.connect_stats)
            .finish_non_exhaustive()
    }
}

/// A setup error together with the teardown releasing whatever was acquired
/// before the failure. Callers are expected to run the teardown exactly once.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct SetupFailure {
    pub teardown: Teardown,
    #[source]
    pub error: Error,
}

impl SetupFailure {
    fn new(teardown: Teardown, error: Error) -> Self {
        Self { teardown, error }
    }
}

/// Builds a ready-to-run [`Simulation`] from `conf`, provisioning one store
/// per node through `backend`.
///
/// The returned teardown releases storage, then the adapter, then shuts the
/// network down. On failure the teardown covers exactly the resources
/// acquired up to that point.
pub async fn new_simulation<B: StorageBackend>(
    conf: &RunConfig,
    backend: &B,
) -> Result<(Simulation<B::Store>, Teardown), SetupFailure> {
    let (adapter, adapter_teardown) = match new_adapter(&conf.adapter) {
        Ok(resolved) => resolved,
        Err(error) => return Err(SetupFailure::new(Teardown::noop(), error)),
    };
    let net = Network::new(adapter, conf.services.clone(), NetworkConfig::default());
    let mut teardown = Teardown::noop();
    {
        let net = net.clone();
        teardown.push(move || net.shutdown());
    }
    teardown.extend(adapter_teardown);

    let mut ids = Vec::with_capacity(conf.node_count);
    let mut addrs = Vec::with_capacity(conf.node_count);
    for _ in 0..conf.node_count {
        match net.new_node() {
            Ok(id) => {
                addrs.push((conf.to_addr)(&id));
                ids.push(id);
            }
            Err(err) => {
                return Err(SetupFailure::new(
                    teardown,
                    Error::NodeCreation(err.to_string()),
                ))
            }
        }
    }

    let stores = match provision_stores(backend, &addrs, &mut teardown) {
        Ok(stores) => stores,
        Err(error) => return Err(SetupFailure::new(teardown, error)),
    };

    Ok((
        Simulation {
            net,
            stores,
            addrs,
            ids,
            connect_stats: Arc::default(),
        },
        teardown,
    ))
}

impl<S> Simulation<S> {
    pub fn net(&self) -> &Network {
        &self.net
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    pub fn addrs(&self) -> &[NodeAddr] {
        &self.addrs
    }

    pub fn stores(&self) -> &[S] {
        &self.stores
    }

    pub fn connect_stats(&self) -> &ConnectStats {
        &self.connect_stats
    }

    /// Brings every node up, wires the topology and executes the evaluation
    /// step under the configured timeout.
    ///
    /// Nodes are started strictly in creation order; a start failure aborts
    /// the run naming the failing node, leaving earlier nodes running (the
    /// caller still owns the teardown). Connection attempts are all issued
    /// concurrently and awaited before evaluation begins; individual
    /// failures are logged and counted but not surfaced.
    pub async fn run(&mut self, conf: &RunConfig) -> Result<StepResult, Error> {
        for id in &self.ids {
            self.net.start(*id).await.map_err(|err| Error::NodeStart {
                node: id.short(),
                source: Box::new(err),
            })?;
            if !conf.start_backoff.is_zero() {
                tokio::time::sleep(conf.start_backoff).await;
            }
        }

        self.connect_topology(conf).await;
        tracing::debug!(nodes = self.addrs.len(), "topology wired");

        let started_at = Instant::now();
        let cancel = CancellationToken::new();
        let _guard = cancel.clone().drop_guard();
        let recorder = PassRecorder::default();
        let cx = StepContext::new(self.net.clone(), cancel.clone(), recorder.clone());
        let step_fut = (conf.step)(cx);
        tokio::pin!(step_fut);
        tokio::select! {
            () = &mut step_fut => {}
            () = tokio::time::sleep(conf.timeout) => {
                cancel.cancel();
                tracing::warn!(timeout = ?conf.timeout, "run timed out, cancelling step");
                let _ = tokio::time::timeout(CANCEL_GRACE, &mut step_fut).await;
            }
        }
        Ok(StepResult {
            started_at,
            finished_at: Instant::now(),
            passes: recorder.snapshot(),
        })
    }

    /// Issues all `(i, j)` connection attempts concurrently and waits for
    /// every one of them. Slot 0 of node `i` targets node `i - 1`; the
    /// remaining slots target seeded-random peers (self-dials are left to
    /// the network layer to reject). Node 0 initiates nothing.
    async fn connect_topology(&self, conf: &RunConfig) {
        let n = self.ids.len();
        let mut rng = SmallRng::seed_from_u64(conf.seed);
        let mut attempts = JoinSet::new();
        for i in 1..n {
            for j in 0..conf.conn_level {
                let k = if j == 0 { i - 1 } else { rng.gen_range(0..n) };
                let net = self.net.clone();
                let stats = self.connect_stats.clone();
                let (from, to) = (self.ids[i], self.ids[k]);
                attempts.spawn(async move {
                    stats.attempted.fetch_add(1, Ordering::SeqCst);
                    if let Err(err) = net.connect(from, to).await {
                        stats.failed.fetch_add(1, Ordering::SeqCst);
                        tracing::debug!(
                            from = %from.short(),
                            to = %to.short(),
                            %err,
                            "connection attempt failed"
                        );
                    }
                });
            }
        }
        while attempts.join_next().await.is_some() {}
    }

    /// Polls until every node past the chain head has at least one link, or
    /// `timeout` elapses. A convenience for steps that only need gross
    /// connectivity; partial topologies are still the evaluator's call.
    pub async fn check_connectivity(&self, timeout: Duration) -> Result<(), Error> {
        let deadline = Instant::now() + timeout;
        loop {
            let missing: Vec<String> = self
                .ids
                .iter()
                .skip(1)
                .filter(|id| self.net.peers(**id).is_empty())
                .map(|id| id.short())
                .collect();
            if missing.is_empty() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Disconnected(missing));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
