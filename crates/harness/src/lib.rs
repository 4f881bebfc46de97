//! protosim: a test-harness orchestrator for distributed-protocol
//! simulations.
//!
//! The harness provisions a set of virtual network nodes, wires them into a
//! topology (a deterministic chain backbone plus seeded-random extra links),
//! runs a caller-supplied evaluation step under a global deadline and
//! reports per-node completion timing.
//!
//! The protocol under test, the concrete node transports and the storage
//! backend are collaborators behind seams ([`Service`], [`adapters`],
//! [`StorageBackend`]); the harness only sequences setup, connects nodes,
//! bounds execution time and hands off evaluation to the injected step.
//!
//! ```no_run
//! use protosim::{new_simulation, report, step, DirBackend, RunConfig, Services, Service};
//! use std::time::Instant;
//!
//! struct Streamer;
//! impl Service for Streamer {
//!     fn protocol(&self) -> &'static str { "streamer" }
//! }
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let mut conf = RunConfig::new("sim", 4, 1, step(|cx| async move {
//!     for id in cx.net().node_ids() {
//!         cx.pass(id);
//!     }
//! }));
//! conf.services = Services::new().register("streamer", |_| Ok(Streamer));
//!
//! let started_at = Instant::now();
//! let (mut sim, teardown) = new_simulation(&conf, &DirBackend).await.map_err(|fail| {
//!     fail.teardown.run();
//!     fail.error
//! })?;
//! let result = sim.run(&conf).await?;
//! teardown.run();
//! report(&result, started_at, Instant::now());
//! # Ok(())
//! # }
//! ```

pub mod adapters;
mod config;
mod error;
mod network;
mod node;
mod report;
mod simulation;
mod step;
mod storage;
mod teardown;

pub use config::{AddrResolver, NetworkConfig, RunConfig, DEFAULT_RUN_TIMEOUT, DEFAULT_SERVICE};
pub use error::Error;
pub use network::Network;
pub use node::{NodeAddr, NodeId, Service, ServiceContext, Services};
pub use report::{latency_stats, report, LatencyStats};
pub use simulation::{new_simulation, ConnectStats, SetupFailure, Simulation};
pub use step::{step, Step, StepContext, StepResult};
pub use storage::{provision_stores, DirBackend, DirStore, StorageBackend};
pub use teardown::Teardown;
