use crate::node::NodeId;

/// Errors produced while setting up or driving a simulation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("adapter needs to be one of sim, socket, exec, docker; got {0:?}")]
    UnsupportedAdapter(String),
    #[error("failed to allocate temporary storage location")]
    ResourceAllocation(#[source] std::io::Error),
    #[error("error creating node: {0}")]
    NodeCreation(String),
    #[error("error starting node {node}")]
    NodeStart {
        node: String,
        #[source]
        source: Box<Error>,
    },
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("unknown node {}", .0.short())]
    UnknownNode(NodeId),
    #[error("no service {0:?} registered")]
    UnknownService(String),
    #[error("storage backend error: {0}")]
    Storage(String),
    #[error("docker runtime unavailable: {0}")]
    DockerUnavailable(String),
    #[error("network already shut down")]
    NetworkDown,
    #[error("found disconnected nodes: {0:?}")]
    Disconnected(Vec<String>),
    #[error("i/o error")]
    Io(#[from] std::io::Error),
}
