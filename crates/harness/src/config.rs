//! Run and network configuration.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    node::{NodeAddr, NodeId, Services},
    step::Step,
};

/// Service started on a node when no explicit selection is made.
pub const DEFAULT_SERVICE: &str = "streamer";

/// Global deadline applied to the evaluation step of a run.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(300);

/// Derives a node's protocol address from its identity.
pub type AddrResolver = Arc<dyn Fn(&NodeId) -> NodeAddr + Send + Sync>;

/// Static configuration of a network engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub id: String,
    /// Service started when a node is brought up without explicit selection.
    pub default_service: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            id: "0".into(),
            default_service: DEFAULT_SERVICE.into(),
        }
    }
}

/// Describes one simulation run. Immutable once passed in; the same value is
/// used for both setup and run.
#[derive(Clone)]
pub struct RunConfig {
    /// Adapter mode name: one of "sim", "socket", "exec", "docker".
    pub adapter: String,
    pub node_count: usize,
    /// Connection slots per node; slot 0 is the chain link to the previous
    /// node, remaining slots target seeded-random peers.
    pub conn_level: usize,
    /// Seed for the topology RNG. Fixing it makes the extra links
    /// reproducible; the chain backbone is deterministic regardless.
    pub seed: u64,
    pub timeout: Duration,
    /// Optional delay between consecutive node starts.
    pub start_backoff: Duration,
    pub to_addr: AddrResolver,
    pub services: Services,
    pub step: Step,
}

impl RunConfig {
    pub fn new(adapter: impl Into<String>, node_count: usize, conn_level: usize, step: Step) -> Self {
        Self {
            adapter: adapter.into(),
            node_count,
            conn_level,
            seed: rand::random(),
            timeout: DEFAULT_RUN_TIMEOUT,
            start_backoff: Duration::ZERO,
            to_addr: Arc::new(NodeAddr::from_id),
            services: Services::new(),
            step,
        }
    }
}
