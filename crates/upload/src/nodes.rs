//! Known blockchain nodes and failure injection.

use photochain_protocol::{ChainAck, FailureKind};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::PhotoBackend;
use crate::error::NodeError;

/// Number of nodes in the default local network.
pub const DEFAULT_NODE_COUNT: u32 = 6;

/// First port of the default local network; node `n` listens on `port + n - 1`.
pub const DEFAULT_NODE_BASE_PORT: u16 = 5001;

/// Static description of a node, as stored in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: u32,
    pub name: String,
    pub url: String,
}

impl NodeSpec {
    /// Nodes 1-6 on `localhost:5001..=5006`.
    pub fn local_defaults() -> Vec<NodeSpec> {
        (1..=DEFAULT_NODE_COUNT)
            .map(|id| NodeSpec {
                id,
                name: format!("Node {id}"),
                url: format!("http://localhost:{}", u32::from(DEFAULT_NODE_BASE_PORT) + id - 1),
            })
            .collect()
    }
}

/// A node plus what the client knows about its health.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: u32,
    pub name: String,
    pub base_url: String,
    pub active: bool,
    /// Last failure successfully injected into this node.
    pub last_failure: Option<FailureKind>,
}

impl From<NodeSpec> for Node {
    fn from(spec: NodeSpec) -> Self {
        Self {
            id: spec.id,
            name: spec.name,
            base_url: spec.url,
            active: true,
            last_failure: None,
        }
    }
}

/// Tracks the nodes of the network.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    nodes: Vec<Node>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new(NodeSpec::local_defaults())
    }
}

impl NodeRegistry {
    pub fn new(specs: impl IntoIterator<Item = NodeSpec>) -> Self {
        Self {
            nodes: specs.into_iter().map(Node::from).collect(),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn get(&self, node_id: u32) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    pub fn active_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.active).count()
    }

    /// Asks `node_id` to simulate `kind`.
    ///
    /// The node is only updated once the backend accepts the request.
    /// `node_down` marks it inactive; other kinds leave it active.
    pub async fn simulate_failure(
        &mut self,
        backend: &dyn PhotoBackend,
        node_id: u32,
        kind: FailureKind,
    ) -> Result<ChainAck, NodeError> {
        let url = self
            .get(node_id)
            .ok_or(NodeError::UnknownNode(node_id))?
            .base_url
            .clone();

        let ack = backend
            .simulate_failure(&url, kind)
            .await
            .map_err(|source| {
                warn!(node_id, kind = %kind, error = %source, "failure simulation rejected");
                NodeError::Api { node_id, source }
            })?;

        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == node_id) {
            node.last_failure = Some(kind);
            if kind == FailureKind::NodeDown {
                node.active = false;
            }
            info!(node_id, kind = %kind, active = node.active, "node failure recorded");
        }
        Ok(ack)
    }

    /// Marks a node active again and forgets its last failure.
    pub fn restore(&mut self, node_id: u32) -> Result<(), NodeError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == node_id)
            .ok_or(NodeError::UnknownNode(node_id))?;
        node.active = true;
        node.last_failure = None;
        Ok(())
    }
}
