//! Containerized adapter.

use std::process::Stdio;

use tokio::process::Command;

use super::{exec::reserve_port, Endpoint, NodeRuntime};
use crate::{error::Error, node::NodeId};

const DEFAULT_IMAGE: &str = "protosim-node:latest";

/// Runs every node as a docker container. Creation probes the runtime and
/// fails when it is unavailable.
#[derive(Debug)]
pub struct DockerAdapter {
    image: String,
}

impl DockerAdapter {
    pub fn new() -> Result<Self, Error> {
        let probe = std::process::Command::new("docker")
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match probe {
            Ok(status) if status.success() => Ok(Self {
                image: DEFAULT_IMAGE.into(),
            }),
            Ok(status) => Err(Error::DockerUnavailable(format!(
                "docker version exited with {status}"
            ))),
            Err(err) => Err(Error::DockerUnavailable(err.to_string())),
        }
    }

    pub(crate) async fn launch(&self, id: NodeId) -> Result<NodeRuntime, Error> {
        let addr = reserve_port()?;
        let child = Command::new("docker")
            .args(["run", "--rm", "--network", "host"])
            .arg(&self.image)
            .arg("--node-id")
            .arg(id.to_string())
            .arg("--listen")
            .arg(addr.to_string())
            .kill_on_drop(true)
            .spawn()?;
        tracing::debug!(node = %id.short(), image = %self.image, %addr, "spawned node container");
        Ok(NodeRuntime::external(Endpoint::Tcp(addr), child))
    }
}
