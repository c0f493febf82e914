use std::collections::HashMap;
use std::net::SocketAddr;

/// Port the execution-done RPC listener binds to. Receivers call back
/// on `<bind-host>:<rpc_port>` after finishing a run.
pub const DEFAULT_RPC_PORT: u16 = 6868;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Stable member name advertised to the cluster
    pub node_name: String,
    pub bind_addr: SocketAddr,
    /// Tags advertised for job targeting
    pub tags: HashMap<String, String>,
    pub rpc_port: u16,
    /// How long the transport keeps a broadcast query open
    pub query_timeout_ms: u64,
    /// How often the trigger loop checks for due jobs
    pub trigger_interval_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_name: "node1".to_string(),
            bind_addr: "127.0.0.1:8946".parse().unwrap(),
            tags: HashMap::new(),
            rpc_port: DEFAULT_RPC_PORT,
            query_timeout_ms: 2000,
            trigger_interval_ms: 500,
        }
    }
}

impl AgentConfig {
    pub fn new(node_name: impl Into<String>, bind_addr: SocketAddr) -> Self {
        Self {
            node_name: node_name.into(),
            bind_addr,
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Address receivers call back on to report a finished execution.
    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.bind_addr.ip(), self.rpc_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_addr_uses_bind_host_and_rpc_port() {
        let config = AgentConfig::new("test1", "10.0.0.5:8946".parse().unwrap());
        assert_eq!(config.rpc_addr(), "10.0.0.5:6868");
    }

    #[test]
    fn test_with_tag() {
        let config = AgentConfig::default()
            .with_tag("role", "web")
            .with_tag("dc", "east");
        assert_eq!(config.tags.get("role"), Some(&"web".to_string()));
        assert_eq!(config.tags.len(), 2);
    }
}
