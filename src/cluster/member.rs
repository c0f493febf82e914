use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Membership status as advertised by the gossip layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberStatus {
    Alive,
    Leaving,
    Failed,
    Left,
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberStatus::Alive => write!(f, "alive"),
            MemberStatus::Leaving => write!(f, "leaving"),
            MemberStatus::Failed => write!(f, "failed"),
            MemberStatus::Left => write!(f, "left"),
        }
    }
}

/// Projection of a cluster member as seen through the membership view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    /// Gossip address, host:port
    pub addr: String,
    pub tags: HashMap<String, String>,
    pub status: MemberStatus,
}

impl Member {
    pub fn new(name: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
            tags: HashMap::new(),
            status: MemberStatus::Alive,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_status(mut self, status: MemberStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_alive(&self) -> bool {
        self.status == MemberStatus::Alive
    }
}
