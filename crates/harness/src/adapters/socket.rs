//! Raw-socket adapter: nodes listen on localhost TCP.

use std::net::Ipv4Addr;

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::{Endpoint, NodeRuntime};
use crate::{error::Error, node::NodeId};

/// Runs every node as a task bound to an ephemeral localhost TCP port, so
/// connection attempts cross a real socket.
#[derive(Debug, Default)]
pub struct SocketAdapter;

impl SocketAdapter {
    pub fn new() -> Self {
        Self
    }

    pub(crate) async fn launch(
        &self,
        id: NodeId,
        shutdown: CancellationToken,
    ) -> Result<NodeRuntime, Error> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;
        let span = tracing::info_span!("socket_node", node = %id.short(), %addr);
        let task = tokio::spawn(
            async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        accepted = listener.accept() => {
                            let Ok((mut stream, peer)) = accepted else { break };
                            tracing::trace!(%peer, "inbound handshake");
                            let mut byte = [0u8; 1];
                            if stream.read_exact(&mut byte).await.is_ok() {
                                let _ = stream.write_all(&byte).await;
                            }
                        }
                    }
                }
            }
            .instrument(span),
        );
        Ok(NodeRuntime::in_process(Endpoint::Tcp(addr), task))
    }
}
