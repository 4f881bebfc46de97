//! Node adapters: process/transport realism for simulated nodes.
//!
//! An adapter launches the runtime of a node and supplies the endpoint other
//! nodes dial when connecting to it. Four modes exist:
//!
//! - `sim` — in-process task with an in-memory mailbox,
//! - `socket` — in-process task listening on localhost TCP,
//! - `exec` — subprocess rooted in a private working directory,
//! - `docker` — containerized process (requires a docker runtime).

use std::net::SocketAddr;

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{error::Error, node::NodeId, teardown::Teardown};

mod docker;
mod exec;
mod sim;
mod socket;

pub use docker::DockerAdapter;
pub use exec::ExecAdapter;
pub use sim::SimAdapter;
pub use socket::SocketAdapter;

pub(crate) const HANDSHAKE: u8 = 0x5a;

/// Resolves a mode name to a concrete adapter plus its teardown.
///
/// Only the `exec` mode has a filesystem side effect (its private base
/// directory); its teardown removes it. All other modes return a no-op
/// teardown.
pub fn new_adapter(mode: &str) -> Result<(Adapter, Teardown), Error> {
    match mode {
        "sim" => Ok((Adapter::Sim(SimAdapter::new()), Teardown::noop())),
        "socket" => Ok((Adapter::Socket(SocketAdapter::new()), Teardown::noop())),
        "exec" => {
            let adapter = ExecAdapter::new()?;
            let base_dir = adapter.base_dir().to_path_buf();
            let teardown = Teardown::defer(move || {
                let _ = std::fs::remove_dir_all(&base_dir);
            });
            Ok((Adapter::Exec(adapter), teardown))
        }
        "docker" => Ok((Adapter::Docker(DockerAdapter::new()?), Teardown::noop())),
        other => Err(Error::UnsupportedAdapter(other.to_string())),
    }
}

/// A concrete node adapter, one variant per supported mode.
pub enum Adapter {
    Sim(SimAdapter),
    Socket(SocketAdapter),
    Exec(ExecAdapter),
    Docker(DockerAdapter),
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Adapter").field(&self.mode()).finish()
    }
}

impl Adapter {
    pub fn mode(&self) -> &'static str {
        match self {
            Adapter::Sim(_) => "sim",
            Adapter::Socket(_) => "socket",
            Adapter::Exec(_) => "exec",
            Adapter::Docker(_) => "docker",
        }
    }

    pub(crate) async fn launch(
        &self,
        id: NodeId,
        shutdown: &CancellationToken,
    ) -> Result<NodeRuntime, Error> {
        match self {
            Adapter::Sim(a) => Ok(a.launch(id, shutdown.child_token())),
            Adapter::Socket(a) => a.launch(id, shutdown.child_token()).await,
            Adapter::Exec(a) => a.launch(id).await,
            Adapter::Docker(a) => a.launch(id).await,
        }
    }
}

/// Handle to a launched node: the endpoint peers dial, plus whatever task or
/// child process backs it.
pub(crate) struct NodeRuntime {
    pub(crate) endpoint: Endpoint,
    task: Option<JoinHandle<()>>,
    child: Option<tokio::process::Child>,
}

impl NodeRuntime {
    pub(crate) fn in_process(endpoint: Endpoint, task: JoinHandle<()>) -> Self {
        Self {
            endpoint,
            task: Some(task),
            child: None,
        }
    }

    pub(crate) fn external(endpoint: Endpoint, child: tokio::process::Child) -> Self {
        Self {
            endpoint,
            task: None,
            child: Some(child),
        }
    }

    pub(crate) fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
    }
}

/// Where a node can be reached for connection attempts.
#[derive(Clone)]
pub(crate) enum Endpoint {
    /// In-memory mailbox of a `sim` node.
    Mailbox(mpsc::Sender<DialRequest>),
    /// TCP listen address of a `socket`, `exec` or `docker` node.
    Tcp(SocketAddr),
}

impl Endpoint {
    /// Performs one connection handshake with the node behind this endpoint.
    pub(crate) async fn dial(&self, from: NodeId) -> Result<(), Error> {
        match self {
            Endpoint::Mailbox(mailbox) => {
                let (ack, acked) = oneshot::channel();
                mailbox
                    .send(DialRequest { from, ack })
                    .await
                    .map_err(|_| Error::Connection("peer mailbox closed".into()))?;
                acked
                    .await
                    .map_err(|_| Error::Connection("handshake dropped".into()))
            }
            Endpoint::Tcp(addr) => {
                let mut stream = TcpStream::connect(addr)
                    .await
                    .map_err(|err| Error::Connection(err.to_string()))?;
                stream
                    .write_u8(HANDSHAKE)
                    .await
                    .map_err(|err| Error::Connection(err.to_string()))?;
                let echo = stream
                    .read_u8()
                    .await
                    .map_err(|err| Error::Connection(err.to_string()))?;
                if echo != HANDSHAKE {
                    return Err(Error::Connection("bad handshake response".into()));
                }
                Ok(())
            }
        }
    }
}

/// In-memory connection attempt delivered to a `sim` node.
pub(crate) struct DialRequest {
    pub(crate) from: NodeId,
    pub(crate) ack: oneshot::Sender<()>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_mode_is_a_configuration_error() {
        let err = new_adapter("carrier-pigeon").unwrap_err();
        assert!(matches!(err, Error::UnsupportedAdapter(mode) if mode == "carrier-pigeon"));
    }

    #[test]
    fn in_process_modes_have_no_side_effects() {
        for mode in ["sim", "socket"] {
            let (adapter, teardown) = new_adapter(mode).unwrap();
            assert_eq!(adapter.mode(), mode);
            assert!(teardown.is_empty());
            teardown.run();
        }
    }

    #[test]
    fn exec_mode_allocates_and_removes_its_base_dir() {
        let (adapter, teardown) = new_adapter("exec").unwrap();
        let base_dir = match &adapter {
            Adapter::Exec(exec) => exec.base_dir().to_path_buf(),
            other => panic!("expected exec adapter, got {}", other.mode()),
        };
        assert!(base_dir.is_dir());
        teardown.run();
        assert!(!base_dir.exists());
    }

    #[test]
    fn docker_mode_probes_the_runtime() {
        // Passes whether or not a docker runtime is installed; the point is
        // that an absent runtime surfaces as a distinct error, not a panic.
        match new_adapter("docker") {
            Ok((adapter, teardown)) => {
                assert_eq!(adapter.mode(), "docker");
                teardown.run();
            }
            Err(err) => assert!(matches!(err, Error::DockerUnavailable(_))),
        }
    }
}
