//! The network engine: owns node identities, their running services and the
//! link table.
//!
//! `Network` is a cheap-clone handle; connection attempts run on spawned
//! tasks, so the engine synchronizes its own state (dashmap plus atomics)
//! and callers never add locking around it.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::{
    adapters::{Adapter, NodeRuntime},
    config::NetworkConfig,
    error::Error,
    node::{NodeId, Service, ServiceContext, Services},
};

struct NodeEntry {
    index: usize,
    runtime: Option<NodeRuntime>,
    service: Option<Box<dyn Service>>,
    peers: HashSet<NodeId>,
}

struct Inner {
    config: NetworkConfig,
    adapter: Adapter,
    services: Services,
    nodes: DashMap<NodeId, NodeEntry>,
    created: AtomicUsize,
    shutdown: CancellationToken,
}

/// Handle to a simulated network bound to one adapter.
#[derive(Clone)]
pub struct Network {
    inner: Arc<Inner>,
}

impl Network {
    pub fn new(adapter: Adapter, services: Services, config: NetworkConfig) -> Self {
        tracing::debug!(id = %config.id, adapter = adapter.mode(), "creating network");
        Self {
            inner: Arc::new(Inner {
                config,
                adapter,
                services,
                nodes: DashMap::new(),
                created: AtomicUsize::new(0),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Allocates a new node identity. The node is created but not started.
    pub fn new_node(&self) -> Result<NodeId, Error> {
        if self.inner.shutdown.is_cancelled() {
            return Err(Error::NetworkDown);
        }
        let id = NodeId::random();
        let index = self.inner.created.fetch_add(1, Ordering::Relaxed);
        self.inner.nodes.insert(
            id,
            NodeEntry {
                index,
                runtime: None,
                service: None,
                peers: HashSet::new(),
            },
        );
        tracing::debug!(node = %id.short(), index, "node created");
        Ok(id)
    }

    /// Starts `id`: constructs its default service and launches its runtime
    /// through the adapter. Starting an already running node is a no-op.
    pub async fn start(&self, id: NodeId) -> Result<(), Error> {
        let index = {
            let entry = self.inner.nodes.get(&id).ok_or(Error::UnknownNode(id))?;
            if entry.runtime.is_some() {
                return Ok(());
            }
            entry.index
        };
        let cx = ServiceContext {
            id,
            index,
            shutdown: self.inner.shutdown.child_token(),
        };
        let service = self
            .inner
            .services
            .construct(&self.inner.config.default_service, &cx)?;
        let runtime = self.inner.adapter.launch(id, &self.inner.shutdown).await?;
        let mut entry = self.inner.nodes.get_mut(&id).ok_or(Error::UnknownNode(id))?;
        entry.service = Some(service);
        entry.runtime = Some(runtime);
        tracing::debug!(
            node = %id.short(),
            service = %self.inner.config.default_service,
            adapter = self.inner.adapter.mode(),
            "node started"
        );
        Ok(())
    }

    /// Attempts a connection from `a` to `b`. Both must be started;
    /// self-dials are rejected.
    pub async fn connect(&self, a: NodeId, b: NodeId) -> Result<(), Error> {
        if a == b {
            return Err(Error::Connection("self dial rejected".into()));
        }
        self.ensure_started(a)?;
        let endpoint = {
            let entry = self.inner.nodes.get(&b).ok_or(Error::UnknownNode(b))?;
            entry
                .runtime
                .as_ref()
                .ok_or_else(|| Error::Connection(format!("node {} not started", b.short())))?
                .endpoint
                .clone()
        };
        endpoint.dial(a).await?;
        if let Some(mut entry) = self.inner.nodes.get_mut(&a) {
            entry.peers.insert(b);
        }
        if let Some(mut entry) = self.inner.nodes.get_mut(&b) {
            entry.peers.insert(a);
        }
        tracing::trace!(from = %a.short(), to = %b.short(), "connected");
        Ok(())
    }

    fn ensure_started(&self, id: NodeId) -> Result<(), Error> {
        let entry = self.inner.nodes.get(&id).ok_or(Error::UnknownNode(id))?;
        if entry.runtime.is_none() {
            return Err(Error::Connection(format!(
                "node {} not started",
                id.short()
            )));
        }
        Ok(())
    }

    /// Current peers of `id`, in no particular order.
    pub fn peers(&self, id: NodeId) -> Vec<NodeId> {
        self.inner
            .nodes
            .get(&id)
            .map(|entry| entry.peers.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_running(&self, id: NodeId) -> bool {
        self.inner
            .nodes
            .get(&id)
            .is_some_and(|entry| entry.runtime.is_some())
    }

    /// All node identities, in creation order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<(usize, NodeId)> = self
            .inner
            .nodes
            .iter()
            .map(|entry| (entry.index, *entry.key()))
            .collect();
        ids.sort_unstable_by_key(|(index, _)| *index);
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Stops every node and rejects further use. Idempotent.
    pub fn shutdown(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        self.inner.shutdown.cancel();
        for mut entry in self.inner.nodes.iter_mut() {
            if let Some(mut runtime) = entry.runtime.take() {
                runtime.stop();
            }
            if let Some(mut service) = entry.service.take() {
                service.stop();
            }
        }
        tracing::debug!(id = %self.inner.config.id, "network shut down");
    }
}
