//! Node identities, protocol addresses and the per-node service registry.

use std::{collections::HashMap, fmt, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::error::Error;

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(
        String::with_capacity(bytes.len() * 2),
        |mut out, b| {
            use fmt::Write;
            let _ = write!(out, "{b:02x}");
            out
        },
    )
}

/// Opaque unique node identity, assigned by the network layer on node
/// creation. Acts as the join key between identities, addresses and stores.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; 16]);

impl NodeId {
    pub(crate) fn random() -> Self {
        Self(rand::random())
    }

    /// Short human-readable form, used in log and error messages.
    pub fn short(&self) -> String {
        hex(&self.0[..4])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex(&self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.short())
    }
}

/// Protocol-level address of a node, derived from its identity. The raw key
/// bytes address the node's storage instance.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NodeAddr {
    key: Vec<u8>,
}

impl NodeAddr {
    pub fn new(key: Vec<u8>) -> Self {
        Self { key }
    }

    /// Default address derivation: the identity bytes themselves.
    pub fn from_id(id: &NodeId) -> Self {
        Self { key: id.0.to_vec() }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl fmt::Debug for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeAddr({})", hex(&self.key))
    }
}

/// A named protocol service running on a simulated node.
///
/// Constructed when the node starts; `stop` is called on network shutdown.
pub trait Service: Send + Sync + 'static {
    fn protocol(&self) -> &'static str;

    fn stop(&mut self) {}
}

/// Handed to service constructors when a node starts.
pub struct ServiceContext {
    pub id: NodeId,
    /// Creation order of the node within its network, starting at 0.
    pub index: usize,
    /// Cancelled when the network shuts down.
    pub shutdown: CancellationToken,
}

type ServiceFn = Arc<dyn Fn(&ServiceContext) -> Result<Box<dyn Service>, Error> + Send + Sync>;

/// Registry of service constructors, keyed by service name.
#[derive(Clone, Default)]
pub struct Services {
    entries: HashMap<String, ServiceFn>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a typed constructor under `name`.
    pub fn register<S, F>(mut self, name: impl Into<String>, ctor: F) -> Self
    where
        S: Service,
        F: Fn(&ServiceContext) -> Result<S, Error> + Send + Sync + 'static,
    {
        self.entries.insert(
            name.into(),
            Arc::new(move |cx| ctor(cx).map(|svc| Box::new(svc) as Box<dyn Service>)),
        );
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub(crate) fn construct(
        &self,
        name: &str,
        cx: &ServiceContext,
    ) -> Result<Box<dyn Service>, Error> {
        let ctor = self
            .entries
            .get(name)
            .ok_or_else(|| Error::UnknownService(name.to_string()))?;
        ctor(cx)
    }
}
