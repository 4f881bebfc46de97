//! In-process simulated adapter.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::{DialRequest, Endpoint, NodeRuntime};
use crate::node::NodeId;

/// Runs every node as a task inside the current process, reachable through
/// an in-memory mailbox. No side effects, no external dependencies.
#[derive(Debug, Default)]
pub struct SimAdapter;

impl SimAdapter {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn launch(&self, id: NodeId, shutdown: CancellationToken) -> NodeRuntime {
        let (mailbox, mut inbox) = mpsc::channel::<DialRequest>(16);
        let span = tracing::info_span!("sim_node", node = %id.short());
        let task = tokio::spawn(
            async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        request = inbox.recv() => match request {
                            Some(DialRequest { from, ack }) => {
                                tracing::trace!(%from, "inbound handshake");
                                let _ = ack.send(());
                            }
                            None => break,
                        },
                    }
                }
            }
            .instrument(span),
        );
        NodeRuntime::in_process(Endpoint::Mailbox(mailbox), task)
    }
}
