use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cluster::member::{Member, MemberStatus};
use crate::cluster::view::{ClusterView, NodeResponse, QueryHandle, QueryParams};
use crate::error::{CronmeshError, Result};

const MAILBOX_CAPACITY: usize = 64;

/// A broadcast query delivered to a member's inbound mailbox.
///
/// Delivery was already acknowledged by the transport when this value
/// is handed to the receiver; `respond` carries the informational
/// application answer back to the originator.
pub struct InboundQuery {
    pub name: String,
    pub payload: Vec<u8>,
    /// Originating member name
    pub from: String,
    receiver: String,
    respond_tx: mpsc::Sender<NodeResponse>,
}

impl InboundQuery {
    pub async fn respond(&self, payload: Vec<u8>) {
        let _ = self
            .respond_tx
            .send(NodeResponse {
                from: self.receiver.clone(),
                payload,
            })
            .await;
    }
}

struct NodeSlot {
    member: Member,
    inbound: mpsc::Sender<InboundQuery>,
}

struct HubInner {
    nodes: RwLock<HashMap<String, NodeSlot>>,
    leader: RwLock<Option<String>>,
    query_timeout: Duration,
}

/// In-process broadcast fabric for agents sharing one process.
///
/// Implements the membership/query contract the dispatcher consumes:
/// per-member filtered delivery, ack on delivery, informational
/// responses, and a finished signal. A query finishes once every
/// delivered target has responded, or when the query timeout elapses.
/// Undeliverable targets (unknown name, full or closed mailbox) are
/// simply never acked, which is what drives the caller's retry.
#[derive(Clone)]
pub struct MeshHub {
    inner: Arc<HubInner>,
}

impl MeshHub {
    pub fn new(query_timeout_ms: u64) -> Self {
        Self {
            inner: Arc::new(HubInner {
                nodes: RwLock::new(HashMap::new()),
                leader: RwLock::new(None),
                query_timeout: Duration::from_millis(query_timeout_ms),
            }),
        }
    }

    /// Register a member with the hub. The first member to join becomes
    /// the leader. Returns the member's view of the cluster and the
    /// mailbox its runner consumes.
    pub fn join(&self, member: Member) -> (LocalView, mpsc::Receiver<InboundQuery>) {
        let (inbound_tx, inbound_rx) = mpsc::channel(MAILBOX_CAPACITY);
        let name = member.name.clone();

        self.inner.nodes.write().insert(
            name.clone(),
            NodeSlot {
                member,
                inbound: inbound_tx,
            },
        );

        let mut leader = self.inner.leader.write();
        if leader.is_none() {
            tracing::info!(node = %name, "First member joined, assuming leadership");
            *leader = Some(name.clone());
        }
        drop(leader);

        let view = LocalView {
            hub: self.clone(),
            local_name: name,
        };
        (view, inbound_rx)
    }

    /// Update a member's advertised status without removing its mailbox
    pub fn set_status(&self, name: &str, status: MemberStatus) {
        if let Some(slot) = self.inner.nodes.write().get_mut(name) {
            slot.member.status = status;
        }
    }

    pub fn set_leader(&self, name: &str) {
        *self.inner.leader.write() = Some(name.to_string());
    }

    /// Drop a member entirely, closing its mailbox
    pub fn remove(&self, name: &str) {
        self.inner.nodes.write().remove(name);
    }
}

/// One member's handle onto the [`MeshHub`]
#[derive(Clone)]
pub struct LocalView {
    hub: MeshHub,
    local_name: String,
}

#[async_trait]
impl ClusterView for LocalView {
    fn members(&self) -> Vec<Member> {
        self.hub
            .inner
            .nodes
            .read()
            .values()
            .map(|slot| slot.member.clone())
            .collect()
    }

    fn local_name(&self) -> String {
        self.local_name.clone()
    }

    fn leader(&self) -> Option<String> {
        self.hub.inner.leader.read().clone()
    }

    async fn query(&self, name: &str, payload: Vec<u8>, params: QueryParams) -> Result<QueryHandle> {
        if params.filter_nodes.len() > MAILBOX_CAPACITY {
            return Err(CronmeshError::Transport(format!(
                "query fan-out {} exceeds mailbox capacity",
                params.filter_nodes.len()
            )));
        }

        let (ack_tx, ack_rx) = mpsc::channel(MAILBOX_CAPACITY);
        let (resp_tx, resp_rx) = mpsc::channel(MAILBOX_CAPACITY);
        let (funnel_tx, mut funnel_rx) = mpsc::channel::<NodeResponse>(MAILBOX_CAPACITY);
        let done = CancellationToken::new();

        let hub = self.hub.clone();
        let origin = self.local_name.clone();
        let query_name = name.to_string();
        let query_done = done.clone();
        let request_ack = params.request_ack;
        let filter = params.filter_nodes;
        let timeout = hub.inner.query_timeout;

        tokio::spawn(async move {
            // Snapshot the target mailboxes first so the registry lock
            // is never held across a suspension point.
            let targets: Vec<(String, mpsc::Sender<InboundQuery>)> = {
                let nodes = hub.inner.nodes.read();
                filter
                    .iter()
                    .filter_map(|n| nodes.get(n).map(|slot| (n.clone(), slot.inbound.clone())))
                    .collect()
            };

            let mut delivered: HashSet<String> = HashSet::new();
            for (target, mailbox) in targets {
                let inbound = InboundQuery {
                    name: query_name.clone(),
                    payload: payload.clone(),
                    from: origin.clone(),
                    receiver: target.clone(),
                    respond_tx: funnel_tx.clone(),
                };
                if mailbox.try_send(inbound).is_ok() {
                    if request_ack {
                        let _ = ack_tx.send(target.clone()).await;
                    }
                    delivered.insert(target);
                } else {
                    tracing::debug!(query = %query_name, node = %target, "Mailbox unavailable, skipping delivery");
                }
            }
            drop(funnel_tx);

            let deadline = tokio::time::sleep(timeout);
            tokio::pin!(deadline);
            let mut responded: HashSet<String> = HashSet::new();

            while responded.len() < delivered.len() {
                tokio::select! {
                    _ = &mut deadline => {
                        tracing::debug!(query = %query_name, "Query timeout reached");
                        break;
                    }
                    resp = funnel_rx.recv() => match resp {
                        Some(resp) => {
                            responded.insert(resp.from.clone());
                            let _ = resp_tx.send(resp).await;
                        }
                        None => break,
                    }
                }
            }

            query_done.cancel();
        });

        Ok(QueryHandle {
            acks: ack_rx,
            responses: resp_rx,
            done,
        })
    }
}
