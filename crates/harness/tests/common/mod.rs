//! Shared fixtures for the harness scenario tests.

use std::time::Duration;

use protosim::{step, RunConfig, Service, Services, Step, StepContext};

pub struct Streamer;

impl Service for Streamer {
    fn protocol(&self) -> &'static str {
        "streamer"
    }
}

pub fn services() -> Services {
    Services::new().register("streamer", |_| Ok(Streamer))
}

pub fn run_config(adapter: &str, nodes: usize, conn_level: usize, step: Step) -> RunConfig {
    let mut conf = RunConfig::new(adapter, nodes, conn_level, step);
    conf.services = services();
    conf
}

/// Passes every node immediately.
#[allow(dead_code)]
pub fn pass_all_step() -> Step {
    step(|cx: StepContext| async move {
        for id in cx.net().node_ids() {
            cx.pass(id);
        }
    })
}

/// Waits until every node past the chain head has at least one link, then
/// passes every node. Returns without passing anyone when cancelled.
#[allow(dead_code)]
pub fn chain_step() -> Step {
    step(|cx: StepContext| async move {
        let ids = cx.net().node_ids();
        loop {
            if cx.is_cancelled() {
                return;
            }
            let wired = ids.len() <= 1
                || ids
                    .iter()
                    .skip(1)
                    .all(|id| !cx.net().peers(*id).is_empty());
            if wired {
                for id in &ids {
                    cx.pass(*id);
                }
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
}
