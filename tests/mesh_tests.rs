//! Tests for the in-process mesh transport: filtered delivery, ack on
//! delivery, response funneling, and the finished signal.

use std::time::Duration;

use cronmesh::cluster::{ClusterView, Member, MemberStatus, MeshHub, QueryParams};

#[tokio::test]
async fn test_first_member_to_join_leads() {
    let hub = MeshHub::new(1000);
    let (view1, _rx1) = hub.join(Member::new("a", "127.0.0.1:1"));
    let (view2, _rx2) = hub.join(Member::new("b", "127.0.0.1:2"));

    assert_eq!(view1.leader(), Some("a".to_string()));
    assert_eq!(view2.leader(), Some("a".to_string()));
    assert_eq!(view1.members().len(), 2);
    assert_eq!(view2.local_name(), "b");

    hub.set_leader("b");
    assert_eq!(view1.leader(), Some("b".to_string()));
}

#[tokio::test]
async fn test_status_changes_show_in_member_snapshots() {
    let hub = MeshHub::new(1000);
    let (view_a, _rx_a) = hub.join(Member::new("a", "127.0.0.1:1"));
    let (_view_b, _rx_b) = hub.join(Member::new("b", "127.0.0.1:2"));

    hub.set_status("b", MemberStatus::Failed);

    let members = view_a.members();
    let b = members.iter().find(|m| m.name == "b").unwrap();
    assert_eq!(b.status, MemberStatus::Failed);
    assert!(!b.is_alive());
}

#[tokio::test]
async fn test_query_delivers_acks_and_finishes_after_response() {
    let hub = MeshHub::new(5000);
    let (view_a, _rx_a) = hub.join(Member::new("a", "127.0.0.1:1"));
    let (_view_b, mut rx_b) = hub.join(Member::new("b", "127.0.0.1:2"));

    let mut handle = view_a
        .query(
            "run:job",
            b"payload".to_vec(),
            QueryParams {
                filter_nodes: vec!["b".to_string()],
                request_ack: true,
            },
        )
        .await
        .unwrap();

    // Transport acks on delivery, before the receiver does anything
    assert_eq!(handle.acks.recv().await, Some("b".to_string()));

    let inbound = rx_b.recv().await.unwrap();
    assert_eq!(inbound.name, "run:job");
    assert_eq!(inbound.payload, b"payload");
    assert_eq!(inbound.from, "a");
    inbound.respond(b"done".to_vec()).await;

    let response = handle.responses.recv().await.unwrap();
    assert_eq!(response.from, "b");
    assert_eq!(response.payload, b"done");

    handle.done.cancelled().await;
}

#[tokio::test]
async fn test_filter_excludes_unlisted_members() {
    let hub = MeshHub::new(200);
    let (view_a, _rx_a) = hub.join(Member::new("a", "127.0.0.1:1"));
    let (_view_b, mut rx_b) = hub.join(Member::new("b", "127.0.0.1:2"));
    let (_view_c, mut rx_c) = hub.join(Member::new("c", "127.0.0.1:3"));

    let handle = view_a
        .query(
            "run:job",
            b"x".to_vec(),
            QueryParams {
                filter_nodes: vec!["c".to_string()],
                request_ack: true,
            },
        )
        .await
        .unwrap();
    handle.done.cancelled().await;

    assert!(rx_c.try_recv().is_ok());
    assert!(rx_b.try_recv().is_err());
}

#[tokio::test]
async fn test_unknown_target_is_never_acked() {
    let hub = MeshHub::new(100);
    let (view_a, _rx_a) = hub.join(Member::new("a", "127.0.0.1:1"));

    let mut handle = view_a
        .query(
            "run:job",
            b"x".to_vec(),
            QueryParams {
                filter_nodes: vec!["ghost".to_string()],
                request_ack: true,
            },
        )
        .await
        .unwrap();

    // Finishes immediately with nothing delivered
    handle.done.cancelled().await;
    assert_eq!(handle.acks.try_recv().ok(), None);
}

#[tokio::test]
async fn test_removed_member_mailbox_is_not_delivered_to() {
    let hub = MeshHub::new(100);
    let (view_a, _rx_a) = hub.join(Member::new("a", "127.0.0.1:1"));
    let (_view_b, rx_b) = hub.join(Member::new("b", "127.0.0.1:2"));

    hub.remove("b");
    drop(rx_b);

    let mut handle = view_a
        .query(
            "run:job",
            b"x".to_vec(),
            QueryParams {
                filter_nodes: vec!["b".to_string()],
                request_ack: true,
            },
        )
        .await
        .unwrap();

    handle.done.cancelled().await;
    assert_eq!(handle.acks.try_recv().ok(), None);
}

#[tokio::test]
async fn test_unresponsive_target_finishes_at_timeout() {
    let hub = MeshHub::new(100);
    let (view_a, _rx_a) = hub.join(Member::new("a", "127.0.0.1:1"));
    let (_view_b, mut rx_b) = hub.join(Member::new("b", "127.0.0.1:2"));

    let start = tokio::time::Instant::now();
    let mut handle = view_a
        .query(
            "run:job",
            b"x".to_vec(),
            QueryParams {
                filter_nodes: vec!["b".to_string()],
                request_ack: true,
            },
        )
        .await
        .unwrap();

    // Delivered and acked, but b never responds
    assert_eq!(handle.acks.recv().await, Some("b".to_string()));
    let _held = rx_b.recv().await.unwrap();

    handle.done.cancelled().await;
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_empty_filter_finishes_immediately() {
    let hub = MeshHub::new(60_000);
    let (view_a, _rx_a) = hub.join(Member::new("a", "127.0.0.1:1"));

    let start = tokio::time::Instant::now();
    let handle = view_a
        .query(
            "run:job",
            b"x".to_vec(),
            QueryParams {
                filter_nodes: Vec::new(),
                request_ack: true,
            },
        )
        .await
        .unwrap();

    handle.done.cancelled().await;
    assert!(start.elapsed() < Duration::from_secs(5));
}
