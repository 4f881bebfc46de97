//! Scenario tests for simulation setup and topology wiring.

mod common;

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use protosim::{new_simulation, report, DirBackend, Error, NodeId, Simulation};

use common::{chain_step, pass_all_step, run_config};

#[test_log::test(tokio::test)]
async fn build_yields_parallel_sequences() {
    for n in [1, 3, 5] {
        let conf = run_config("sim", n, 1, pass_all_step());
        let (sim, teardown) = new_simulation(&conf, &DirBackend).await.unwrap();
        assert_eq!(sim.ids().len(), n);
        assert_eq!(sim.addrs().len(), n);
        assert_eq!(sim.stores().len(), n);
        // index-consistent correspondence with the default derivation
        for (id, addr) in sim.ids().iter().zip(sim.addrs()) {
            assert_eq!(addr.key(), protosim::NodeAddr::from_id(id).key());
        }
        teardown.run();
    }
}

#[test_log::test(tokio::test)]
async fn end_to_end_chain_scenario() {
    let started_at = Instant::now();
    let conf = run_config("sim", 4, 1, chain_step());
    let (mut sim, teardown) = new_simulation(&conf, &DirBackend).await.unwrap();

    let result = sim.run(&conf).await.unwrap();
    sim.check_connectivity(Duration::from_secs(1)).await.unwrap();

    // ConnLevel = 1 forces chain links only: 3 attempts, none failing
    assert_eq!(sim.connect_stats().attempted(), 3);
    assert_eq!(sim.connect_stats().failed(), 0);
    let ids = sim.ids().to_vec();
    for i in 1..ids.len() {
        assert!(
            sim.net().peers(ids[i]).contains(&ids[i - 1]),
            "node {i} is missing its chain link"
        );
    }
    assert_eq!(result.passes.len(), 4);

    let roots: Vec<_> = sim
        .stores()
        .iter()
        .map(|store| store.root().to_path_buf())
        .collect();
    teardown.run();
    assert!(
        roots.iter().all(|root| !root.exists()),
        "teardown left residual store directories"
    );

    assert!(report(&result, started_at, Instant::now()).is_some());
}

#[test_log::test(tokio::test)]
async fn join_barrier_accounts_for_every_attempt() {
    let (n, conn_level) = (5, 3);
    let conf = run_config("sim", n, conn_level, pass_all_step());
    let (mut sim, teardown) = new_simulation(&conf, &DirBackend).await.unwrap();
    sim.run(&conf).await.unwrap();
    assert_eq!(sim.connect_stats().attempted(), conn_level * (n - 1));
    assert!(sim.connect_stats().failed() <= sim.connect_stats().attempted());
    teardown.run();
}

fn topology(sim: &Simulation<protosim::DirStore>) -> BTreeSet<(usize, usize)> {
    let index_of = |id: NodeId| sim.ids().iter().position(|other| *other == id).unwrap();
    let mut links = BTreeSet::new();
    for (i, id) in sim.ids().iter().enumerate() {
        for peer in sim.net().peers(*id) {
            let k = index_of(peer);
            links.insert((i.min(k), i.max(k)));
        }
    }
    links
}

#[test_log::test(tokio::test)]
async fn seeded_topology_is_reproducible() {
    let mut first = None;
    for _ in 0..2 {
        let mut conf = run_config("sim", 6, 3, pass_all_step());
        conf.seed = 0xDEAD_BEEF;
        let (mut sim, teardown) = new_simulation(&conf, &DirBackend).await.unwrap();
        sim.run(&conf).await.unwrap();
        let links = topology(&sim);
        // chain backbone holds regardless of the seed
        for i in 1..sim.ids().len() {
            assert!(links.contains(&(i - 1, i)), "missing chain link {}-{}", i - 1, i);
        }
        teardown.run();
        match &first {
            None => first = Some(links),
            Some(previous) => assert_eq!(previous, &links, "same seed produced a different topology"),
        }
    }
}

#[test_log::test(tokio::test)]
async fn socket_adapter_runs_the_same_scenario() {
    let conf = run_config("socket", 3, 1, chain_step());
    let (mut sim, teardown) = new_simulation(&conf, &DirBackend).await.unwrap();
    let result = sim.run(&conf).await.unwrap();
    assert_eq!(sim.connect_stats().attempted(), 2);
    assert_eq!(sim.connect_stats().failed(), 0);
    assert_eq!(result.passes.len(), 3);
    teardown.run();
}

#[test_log::test(tokio::test)]
async fn unsupported_adapter_fails_setup_with_noop_teardown() {
    let conf = run_config("carrier-pigeon", 2, 1, pass_all_step());
    let failure = new_simulation(&conf, &DirBackend).await.unwrap_err();
    assert!(matches!(failure.error, Error::UnsupportedAdapter(_)));
    assert!(failure.teardown.is_empty());
    failure.teardown.run();
}
