//! End-to-end agent tests over the in-process mesh: a leader dispatches
//! a job and a tag-matched member executes it and records the result.


use std::sync::Arc;
use std::time::Duration;

use cronmesh::agent::Agent;
use cronmesh::cluster::{Member, MeshHub};
use cronmesh::config::AgentConfig;
use cronmesh::scheduler::Job;
use cronmesh::store::{JobStore, MemStore};
use test_harness::wait_for;

fn member_for(config: &AgentConfig) -> Member {
    let mut member = Member::new(&config.node_name, config.bind_addr.to_string());
    member.tags = config.tags.clone();
    member
}

/// Spin up two agents on one hub sharing a store (standing in for the
/// replicated store): node1 leads, node2 advertises `role=worker`.
async fn two_node_setup() -> (Arc<Agent>, Arc<Agent>, Arc<MemStore>) {
    let hub = MeshHub::new(2000);
    let store = Arc::new(MemStore::new());

    let config1 = AgentConfig::new("node1", "127.0.0.1:8946".parse().unwrap());
    let config2 = AgentConfig::new("node2", "127.0.0.1:8947".parse().unwrap())
        .with_tag("role", "worker");

    let (view1, rx1) = hub.join(member_for(&config1));
    let (view2, rx2) = hub.join(member_for(&config2));

    let agent1 = Agent::new(config1, store.clone(), Arc::new(view1));
    let agent2 = Agent::new(config2, store.clone(), Arc::new(view2));

    let shutdown = tokio_util::sync::CancellationToken::new();
    tokio::spawn(agent1.clone().run(rx1, shutdown.clone()));
    tokio::spawn(agent2.clone().run(rx2, shutdown));

    (agent1, agent2, store)
}

#[tokio::test]
async fn test_manual_dispatch_executes_on_tagged_member() {
    let (agent1, _agent2, store) = two_node_setup().await;

    let job = Job::new("greet", "echo hello", "1h").with_tag("role", "worker");
    agent1.set_job(job).await.unwrap();

    let refreshed = agent1.run_job("greet").await.unwrap();
    assert!(refreshed.next.is_some());

    let done = wait_for(
        || async {
            store
                .executions("greet")
                .await
                .unwrap()
                .iter()
                .any(|e| e.finished_at.is_some())
        },
        Duration::from_secs(5),
        Duration::from_millis(50),
    )
    .await;
    assert!(done, "execution never finished");

    let executions = store.executions("greet").await.unwrap();
    let finished = executions.iter().find(|e| e.finished_at.is_some()).unwrap();
    assert_eq!(finished.node_name, "node2");
    assert!(finished.success);
    assert_eq!(finished.output, "hello\n");
}

#[tokio::test]
async fn test_scheduled_job_fires_from_trigger_loop() {
    let (agent1, _agent2, store) = two_node_setup().await;
    assert!(agent1.is_leader());

    let job = Job::new("tick", "echo tick", "1s").with_tag("role", "worker");
    agent1.set_job(job).await.unwrap();

    let fired = wait_for(
        || async {
            store
                .executions("tick")
                .await
                .unwrap()
                .iter()
                .any(|e| e.success)
        },
        Duration::from_secs(10),
        Duration::from_millis(100),
    )
    .await;
    assert!(fired, "scheduled job never executed");
}

#[tokio::test]
async fn test_set_job_rejects_bad_schedule() {
    let (agent1, _agent2, store) = two_node_setup().await;

    let job = Job::new("broken", "echo broken", "often");
    assert!(agent1.set_job(job).await.is_err());

    // Validation happens before anything is persisted
    assert!(store.get_job("broken").await.is_err());
}

#[tokio::test]
async fn test_follower_does_not_fire_schedules() {
    let (_agent1, agent2, _store) = two_node_setup().await;
    assert!(!agent2.is_leader());
}
