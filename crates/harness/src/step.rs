//! The evaluation step seam.
//!
//! The harness does not know what "passing" means for the protocol under
//! test; a caller-supplied step evaluator runs against the live network and
//! records a pass timestamp per node. The run controller scopes the step to
//! its timeout and assembles the [`StepResult`] from whatever was recorded.

use std::{collections::HashMap, future::Future, sync::Arc, time::Instant};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{network::Network, node::NodeId};

/// Caller-supplied evaluation step, executed once per run against the live
/// network. Built with [`step`].
pub type Step = Arc<dyn Fn(StepContext) -> BoxFuture<'static, ()> + Send + Sync>;

/// Wraps an async closure into a [`Step`].
pub fn step<F, Fut>(f: F) -> Step
where
    F: Fn(StepContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |cx| Box::pin(f(cx)))
}

/// Records per-node pass timestamps. The earliest pass per node wins.
#[derive(Clone, Default)]
pub(crate) struct PassRecorder {
    passes: Arc<Mutex<HashMap<NodeId, Instant>>>,
}

impl PassRecorder {
    pub(crate) fn pass(&self, id: NodeId) {
        self.passes.lock().entry(id).or_insert_with(Instant::now);
    }

    pub(crate) fn snapshot(&self) -> HashMap<NodeId, Instant> {
        self.passes.lock().clone()
    }
}

/// Execution context handed to the step evaluator.
#[derive(Clone)]
pub struct StepContext {
    net: Network,
    cancel: CancellationToken,
    recorder: PassRecorder,
}

impl StepContext {
    pub(crate) fn new(net: Network, cancel: CancellationToken, recorder: PassRecorder) -> Self {
        Self {
            net,
            cancel,
            recorder,
        }
    }

    /// The live network the step evaluates against.
    pub fn net(&self) -> &Network {
        &self.net
    }

    /// Marks `id` as passing at the current time.
    pub fn pass(&self, id: NodeId) {
        self.recorder.pass(id);
    }

    /// True once the run timeout elapsed or the controller was torn down.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the bounding context is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

/// Outcome of one bounded evaluation. Read-only input to the reporter.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub started_at: Instant,
    pub finished_at: Instant,
    /// Completion timestamp per passing node.
    pub passes: HashMap<NodeId, Instant>,
}

impl StepResult {
    /// Duration of the result window.
    pub fn window(&self) -> std::time::Duration {
        self.finished_at.saturating_duration_since(self.started_at)
    }
}
