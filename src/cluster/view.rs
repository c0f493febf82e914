use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cluster::member::Member;
use crate::error::Result;

/// Parameters for a broadcast query
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    /// Only the named members receive the query. An empty list targets
    /// no one; the query still appears in the transport log.
    pub filter_nodes: Vec<String>,
    /// Ask the transport to confirm delivery per member
    pub request_ack: bool,
}

/// An application-level answer from a member. Informational only;
/// delivery is tracked through acks.
#[derive(Debug, Clone)]
pub struct NodeResponse {
    pub from: String,
    pub payload: Vec<u8>,
}

/// Live handle to an in-flight broadcast query.
///
/// `acks` yields the name of each member that confirmed delivery,
/// `responses` yields application answers, and `done` is cancelled when
/// the transport considers the query finished (all targets heard from,
/// or its timeout elapsed). If the transport drops the streams before
/// signalling `done`, the query is treated as finished with whatever
/// acks were collected.
pub struct QueryHandle {
    pub acks: mpsc::Receiver<String>,
    pub responses: mpsc::Receiver<NodeResponse>,
    pub done: CancellationToken,
}

/// Read-only adapter over the membership and broadcast subsystem.
///
/// This is the only surface the dispatch core sees; the gossip
/// implementation behind it is swappable.
#[async_trait]
pub trait ClusterView: Send + Sync {
    /// Snapshot of all known members, any status
    fn members(&self) -> Vec<Member>;

    /// This node's member name
    fn local_name(&self) -> String;

    /// Name of the current leader, if one is known
    fn leader(&self) -> Option<String>;

    /// Issue a broadcast query to the members named in `params`
    async fn query(&self, name: &str, payload: Vec<u8>, params: QueryParams) -> Result<QueryHandle>;
}
