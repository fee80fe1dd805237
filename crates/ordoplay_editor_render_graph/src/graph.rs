// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph document containing nodes, connections, and viewport frames.

use crate::connection::{Connection, ConnectionId, SocketLink};
use crate::node::{Node, NodeId};
use crate::socket::{Multiplicity, SocketKind};
use crate::viewport::{viewport_for, ViewportFrame};
use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A render graph as edited by the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Graph name
    pub name: String,
    /// Nodes in insertion order
    nodes: IndexMap<NodeId, Node>,
    /// Connections in insertion order
    connections: IndexMap<ConnectionId, Connection>,
    /// Viewport frames in insertion order
    viewport_frames: Vec<ViewportFrame>,
}

impl GraphDocument {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            viewport_frames: Vec::new(),
        }
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node and its connections
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        self.connections.retain(|_, c| !c.involves_node(node_id));
        // Shift, not swap: node order feeds generated resource names
        self.nodes.shift_remove(&node_id)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Position of a node in insertion order
    pub fn node_index(&self, node_id: NodeId) -> Option<usize> {
        self.nodes.get_index_of(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Connect an output socket to an input socket.
    ///
    /// An input holds at most one connection; an existing one is replaced.
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_socket: &str,
        to_node: NodeId,
        to_socket: &str,
    ) -> Result<ConnectionId, ConnectionError> {
        let source_node = self
            .nodes
            .get(&from_node)
            .ok_or(ConnectionError::NodeNotFound(from_node))?;
        let target_node = self.nodes.get(&to_node).ok_or(ConnectionError::NodeNotFound(to_node))?;

        let source = source_node
            .output(from_socket)
            .ok_or_else(|| ConnectionError::SocketNotFound(from_socket.to_string()))?;
        let target = target_node
            .input(to_socket)
            .ok_or_else(|| ConnectionError::SocketNotFound(to_socket.to_string()))?;

        if from_node == to_node {
            return Err(ConnectionError::SelfLoop);
        }

        if !source.can_connect(target) {
            return Err(ConnectionError::IncompatibleSockets {
                from: source.kind,
                to: target.kind,
            });
        }

        if target.multiplicity == Multiplicity::Single {
            self.connections.retain(|_, c| !c.ends_at(to_node, to_socket));
        }

        let connection = Connection::new(from_node, from_socket, to_node, to_socket);
        let id = connection.id;
        self.connections.insert(id, connection);
        Ok(id)
    }

    /// Remove a connection
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        self.connections.shift_remove(&connection_id)
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get connections leaving an output socket
    pub fn connections_from<'a>(
        &'a self,
        node_id: NodeId,
        socket: &'a str,
    ) -> impl Iterator<Item = &'a Connection> {
        self.connections.values().filter(move |c| c.starts_at(node_id, socket))
    }

    /// Get the connection feeding an input socket
    pub fn connection_to(&self, node_id: NodeId, socket: &str) -> Option<&Connection> {
        self.connections.values().find(|c| c.ends_at(node_id, socket))
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.involves_node(node_id))
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Add a viewport frame
    pub fn add_viewport_frame(&mut self, frame: ViewportFrame) -> usize {
        self.viewport_frames.push(frame);
        self.viewport_frames.len() - 1
    }

    /// Remove a viewport frame by index
    pub fn remove_viewport_frame(&mut self, index: usize) -> Option<ViewportFrame> {
        (index < self.viewport_frames.len()).then(|| self.viewport_frames.remove(index))
    }

    /// Get all viewport frames
    pub fn viewport_frames(&self) -> &[ViewportFrame] {
        &self.viewport_frames
    }

    /// Viewport a node currently sits in, `""` if none
    pub fn viewport_for_node(&self, node_id: NodeId) -> &str {
        self.node(node_id)
            .map_or("", |node| viewport_for(&self.viewport_frames, node))
    }

    /// Take an owned copy of everything a compile reads
    pub fn snapshot(&self) -> GraphSnapshot {
        let links = self
            .connections
            .values()
            .filter_map(|c| {
                Some(SocketLink {
                    from_node: self.node_index(c.from_node)?,
                    from_socket: c.from_socket.clone(),
                    to_node: self.node_index(c.to_node)?,
                    to_socket: c.to_socket.clone(),
                })
            })
            .collect();

        GraphSnapshot {
            name: self.name.clone(),
            nodes: self.nodes.values().cloned().collect(),
            links,
            viewport_frames: self.viewport_frames.clone(),
        }
    }
}

impl Default for GraphDocument {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Immutable copy of a graph taken at the start of a compile
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphSnapshot {
    /// Graph name
    pub name: String,
    /// Nodes in document order
    pub nodes: Vec<Node>,
    /// Connections rewritten to node indices
    pub links: Vec<SocketLink>,
    /// Viewport frames in document order
    pub viewport_frames: Vec<ViewportFrame>,
}

impl GraphSnapshot {
    /// Indices of nodes that compile into passes
    pub fn pass_node_indices(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.kind.is_pass())
            .map(|(index, _)| index)
            .collect()
    }

    /// Viewport name of every node, by index
    pub fn node_viewports(&self) -> Vec<String> {
        self.nodes
            .iter()
            .map(|node| viewport_for(&self.viewport_frames, node).to_string())
            .collect()
    }
}

/// Graph document shared between an editor thread and compiles
#[derive(Debug, Clone, Default)]
pub struct SharedGraph(Arc<RwLock<GraphDocument>>);

impl SharedGraph {
    /// Wrap a document
    pub fn new(document: GraphDocument) -> Self {
        Self(Arc::new(RwLock::new(document)))
    }

    /// Lock for reading
    pub fn read(&self) -> RwLockReadGuard<'_, GraphDocument> {
        self.0.read()
    }

    /// Lock for editing
    pub fn write(&self) -> RwLockWriteGuard<'_, GraphDocument> {
        self.0.write()
    }

    /// Snapshot under the read lock; the lock is released on return
    pub fn snapshot(&self) -> GraphSnapshot {
        self.0.read().snapshot()
    }
}

/// Error when creating a connection
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Socket not found
    #[error("Socket not found: {0}")]
    SocketNotFound(String),

    /// Incompatible socket kinds
    #[error("Incompatible sockets: {from} -> {to}")]
    IncompatibleSockets {
        /// Output kind
        from: SocketKind,
        /// Input kind
        to: SocketKind,
    },

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::socket::Socket;

    fn pass(title: &str) -> Node {
        let mut node = Node::bare(title, NodeKind::Pass);
        node.add_input(Socket::input("input_res", SocketKind::Fbo));
        node.add_output(Socket::output("output_res", SocketKind::Fbo));
        node
    }

    #[test]
    fn test_connect_replaces_existing_input() {
        let mut graph = GraphDocument::new("test");
        let a = graph.add_node(pass("A"));
        let b = graph.add_node(pass("B"));
        let c = graph.add_node(pass("C"));

        graph.connect(a, "output_res", c, "input_res").unwrap();
        let second = graph.connect(b, "output_res", c, "input_res").unwrap();

        assert_eq!(graph.connection_count(), 1);
        assert_eq!(graph.connection_to(c, "input_res").unwrap().id, second);
    }

    #[test]
    fn test_connect_validation() {
        let mut graph = GraphDocument::new("test");
        let a = graph.add_node(pass("A"));
        let b = graph.add_node(pass("B"));

        assert!(matches!(
            graph.connect(a, "output_res", a, "input_res"),
            Err(ConnectionError::SelfLoop)
        ));
        assert!(matches!(
            graph.connect(a, "missing", b, "input_res"),
            Err(ConnectionError::SocketNotFound(_))
        ));
        // Inputs cannot act as sources
        assert!(matches!(
            graph.connect(a, "input_res", b, "input_res"),
            Err(ConnectionError::SocketNotFound(_))
        ));
    }

    #[test]
    fn test_remove_node_cascades_and_keeps_order() {
        let mut graph = GraphDocument::new("test");
        let a = graph.add_node(pass("A"));
        let b = graph.add_node(pass("B"));
        let c = graph.add_node(pass("C"));
        graph.connect(a, "output_res", b, "input_res").unwrap();
        graph.connect(b, "output_res", c, "input_res").unwrap();

        graph.remove_node(a);

        assert_eq!(graph.connection_count(), 1);
        assert_eq!(graph.node_index(b), Some(0));
        assert_eq!(graph.node_index(c), Some(1));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let shared = SharedGraph::new(GraphDocument::new("test"));
        let a = shared.write().add_node(pass("A"));
        let b = shared.write().add_node(pass("B"));
        shared.write().connect(a, "output_res", b, "input_res").unwrap();

        let snapshot = shared.snapshot();
        shared.write().remove_node(a);

        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.links.len(), 1);
        assert_eq!(snapshot.links[0].from_node, 0);
        assert_eq!(snapshot.links[0].to_node, 1);
        assert_eq!(shared.read().node_count(), 1);
    }

    #[test]
    fn test_connection_queries() {
        let mut graph = GraphDocument::new("test");
        let a = graph.add_node(pass("A"));
        let b = graph.add_node(pass("B"));
        let c = graph.add_node(pass("C"));
        graph.connect(a, "output_res", b, "input_res").unwrap();
        graph.connect(a, "output_res", c, "input_res").unwrap();

        assert_eq!(graph.connections_from(a, "output_res").count(), 2);
        assert_eq!(graph.connections_for_node(b).count(), 1);
        assert!(graph.connection_to(a, "input_res").is_none());
    }

    #[test]
    fn test_viewport_frames() {
        let mut graph = GraphDocument::new("test");
        let inside = graph.add_node(pass("A").with_position(10.0, 10.0));
        let outside = graph.add_node(pass("B").with_position(900.0, 10.0));
        let frame = ViewportFrame::new("Main", "main", [0.0, 0.0], [400.0, 300.0]);
        let index = graph.add_viewport_frame(frame);

        assert_eq!(graph.viewport_for_node(inside), "main");
        assert_eq!(graph.viewport_for_node(outside), "");
        assert_eq!(graph.snapshot().node_viewports(), vec!["main".to_string(), String::new()]);

        graph.remove_viewport_frame(index);
        assert_eq!(graph.viewport_for_node(inside), "");
    }
}
