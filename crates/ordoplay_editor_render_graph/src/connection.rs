// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connections between sockets, by node ID in the document and by node
//! index in a compile snapshot.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A connection from an output socket to an input socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Source node ID
    pub from_node: NodeId,
    /// Source output socket name
    pub from_socket: String,
    /// Target node ID
    pub to_node: NodeId,
    /// Target input socket name
    pub to_socket: String,
}

impl Connection {
    /// Create a new connection
    pub fn new(
        from_node: NodeId,
        from_socket: impl Into<String>,
        to_node: NodeId,
        to_socket: impl Into<String>,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            from_node,
            from_socket: from_socket.into(),
            to_node,
            to_socket: to_socket.into(),
        }
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from_node == node_id || self.to_node == node_id
    }

    /// Check if this connection ends at a specific input
    pub fn ends_at(&self, node_id: NodeId, socket: &str) -> bool {
        self.to_node == node_id && self.to_socket == socket
    }

    /// Check if this connection starts at a specific output
    pub fn starts_at(&self, node_id: NodeId, socket: &str) -> bool {
        self.from_node == node_id && self.from_socket == socket
    }
}

/// Index-based connection inside a graph snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketLink {
    /// Source node index
    pub from_node: usize,
    /// Source output socket name
    pub from_socket: String,
    /// Target node index
    pub to_node: usize,
    /// Target input socket name
    pub to_socket: String,
}
