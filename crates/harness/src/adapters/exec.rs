//! Subprocess-exec adapter.

use std::{
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

use tokio::process::Command;

use super::{Endpoint, NodeRuntime};
use crate::{error::Error, node::NodeId};

/// Runs every node as a child process of the current executable, each rooted
/// in its own subdirectory of a private base working directory.
#[derive(Debug)]
pub struct ExecAdapter {
    base_dir: PathBuf,
    node_binary: PathBuf,
}

impl ExecAdapter {
    /// Allocates the private base working directory. Failing to allocate it
    /// aborts adapter creation.
    pub fn new() -> Result<Self, Error> {
        let base_dir = tempfile::Builder::new()
            .prefix("exec-node-")
            .tempdir()
            .map_err(Error::ResourceAllocation)?
            .keep();
        let node_binary = std::env::current_exe()?;
        Ok(Self {
            base_dir,
            node_binary,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub(crate) async fn launch(&self, id: NodeId) -> Result<NodeRuntime, Error> {
        let node_dir = self.base_dir.join(format!("node-{}", id.short()));
        tokio::fs::create_dir_all(&node_dir).await?;
        let addr = reserve_port()?;
        let child = Command::new(&self.node_binary)
            .arg("--node-id")
            .arg(id.to_string())
            .arg("--listen")
            .arg(addr.to_string())
            .current_dir(&node_dir)
            .kill_on_drop(true)
            .spawn()?;
        tracing::debug!(node = %id.short(), dir = %node_dir.display(), %addr, "spawned node process");
        Ok(NodeRuntime::external(Endpoint::Tcp(addr), child))
    }
}

/// Picks a free localhost port for a node process to listen on.
pub(crate) fn reserve_port() -> Result<SocketAddr, Error> {
    let listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?)
}
