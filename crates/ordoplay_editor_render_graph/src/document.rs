// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON graph document format used by the editor.
//!
//! Nodes are stored by class name with optional overrides, connections by
//! node position in the file. Anything left out falls back to the class
//! template, so hand-written documents stay short.

use crate::builtin::builtin_node_registry;
use crate::graph::GraphDocument;
use crate::node::{Node, NodeId, NodeKind, NodeRegistry, ParamValue};
use crate::socket::{Socket, SocketKind};
use crate::viewport::ViewportFrame;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Serialized graph document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerializedGraph {
    /// Graph name
    #[serde(default)]
    pub name: String,
    /// Nodes in document order
    #[serde(default)]
    pub nodes: Vec<SerializedNode>,
    /// Connections by node position
    #[serde(default)]
    pub connections: Vec<SerializedConnection>,
    /// Viewport frames in document order
    #[serde(default)]
    pub viewport_frames: Vec<SerializedFrame>,
}

/// Serialized node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNode {
    /// Class name
    #[serde(rename = "type")]
    pub class: String,
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Node kind, when it differs from the class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeKind>,
    /// Instance name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Parameter overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<IndexMap<String, ParamValue>>,
    /// Width override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    /// Height override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    /// Inputs added beyond the class template, as (name, kind)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_inputs: Option<Vec<(String, SocketKind)>>,
}

/// Serialized connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedConnection {
    /// Source node position
    pub from_node: usize,
    /// Source output socket
    pub from_socket: String,
    /// Target node position
    pub to_node: usize,
    /// Target input socket
    pub to_socket: String,
}

/// Serialized viewport frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedFrame {
    /// Display title
    pub title: String,
    /// Viewport name
    pub viewport_name: String,
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl SerializedGraph {
    /// Parse a document from JSON
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the document as pretty JSON
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Capture a graph document
    pub fn from_document(document: &GraphDocument) -> Self {
        Self::from_document_with(document, builtin_node_registry())
    }

    /// Capture a graph document, diffing nodes against the given templates
    pub fn from_document_with(document: &GraphDocument, registry: &NodeRegistry) -> Self {
        let nodes = document
            .nodes()
            .map(|node| serialize_node(node, registry))
            .collect();

        let connections = document
            .connections()
            .filter_map(|c| {
                Some(SerializedConnection {
                    from_node: document.node_index(c.from_node)?,
                    from_socket: c.from_socket.clone(),
                    to_node: document.node_index(c.to_node)?,
                    to_socket: c.to_socket.clone(),
                })
            })
            .collect();

        let viewport_frames = document
            .viewport_frames()
            .iter()
            .map(|frame| SerializedFrame {
                title: frame.title.clone(),
                viewport_name: frame.viewport_name.clone(),
                x: frame.position[0],
                y: frame.position[1],
                width: frame.size[0],
                height: frame.size[1],
            })
            .collect();

        Self {
            name: document.name.clone(),
            nodes,
            connections,
            viewport_frames,
        }
    }

    /// Build a graph document using the built-in templates
    pub fn to_document(&self) -> Result<GraphDocument, DocumentError> {
        self.to_document_with(builtin_node_registry())
    }

    /// Build a graph document using the given templates.
    ///
    /// Unknown classes are kept as bare nodes so a compile can report them;
    /// their sockets come from `dynamic_inputs` and from the connections
    /// that use them.
    pub fn to_document_with(
        &self,
        registry: &NodeRegistry,
    ) -> Result<GraphDocument, DocumentError> {
        let mut document = GraphDocument::new(self.name.clone());

        let mut nodes: Vec<Node> = self
            .nodes
            .iter()
            .map(|serialized| deserialize_node(serialized, registry))
            .collect();

        for (index, connection) in self.connections.iter().enumerate() {
            for node in [connection.from_node, connection.to_node] {
                if node >= nodes.len() {
                    return Err(DocumentError::InvalidConnection {
                        index,
                        node,
                        node_count: nodes.len(),
                    });
                }
            }
            // Sockets of unknown classes exist only through their connections
            if registry.get(&nodes[connection.from_node].title).is_none()
                && nodes[connection.from_node].output(&connection.from_socket).is_none()
            {
                nodes[connection.from_node]
                    .add_output(Socket::output(&connection.from_socket, SocketKind::Any));
            }
            if registry.get(&nodes[connection.to_node].title).is_none()
                && nodes[connection.to_node].input(&connection.to_socket).is_none()
            {
                nodes[connection.to_node]
                    .add_input(Socket::input(&connection.to_socket, SocketKind::Any));
            }
        }

        let ids: Vec<NodeId> = nodes.into_iter().map(|node| document.add_node(node)).collect();

        for connection in &self.connections {
            let result = document.connect(
                ids[connection.from_node],
                &connection.from_socket,
                ids[connection.to_node],
                &connection.to_socket,
            );
            if let Err(err) = result {
                tracing::warn!(
                    "Dropping connection {}.{} -> {}.{}: {err}",
                    connection.from_node,
                    connection.from_socket,
                    connection.to_node,
                    connection.to_socket
                );
            }
        }

        for frame in &self.viewport_frames {
            document.add_viewport_frame(ViewportFrame::new(
                frame.title.clone(),
                frame.viewport_name.clone(),
                [frame.x, frame.y],
                [frame.width, frame.height],
            ));
        }

        Ok(document)
    }
}

fn deserialize_node(serialized: &SerializedNode, registry: &NodeRegistry) -> Node {
    let mut node = match registry.get(&serialized.class) {
        Some(template) => Node::new(template),
        None => {
            tracing::warn!("Unknown node class '{}'", serialized.class);
            Node::bare(serialized.class.clone(), serialized.node_type.unwrap_or(NodeKind::Pass))
        }
    };

    if let Some(kind) = serialized.node_type {
        node.kind = kind;
    }
    node.instance_name = serialized.name.clone().filter(|name| !name.is_empty());
    if let Some(params) = &serialized.params {
        for (key, value) in params {
            node.params.insert(key.clone(), value.clone());
        }
    }
    for (name, kind) in serialized.dynamic_inputs.iter().flatten() {
        if node.input(name).is_none() {
            node.add_input(Socket::input(name, *kind));
        }
    }

    let default_size = Node::default_size(node.inputs.len(), node.outputs.len());
    node.position = [serialized.x, serialized.y];
    node.size = [
        serialized.width.unwrap_or(default_size[0]),
        serialized.height.unwrap_or(default_size[1]),
    ];
    node
}

fn serialize_node(node: &Node, registry: &NodeRegistry) -> SerializedNode {
    let template = registry.get(&node.title);

    let template_inputs: Vec<&str> = template
        .map(|t| t.inputs.iter().map(|s| s.name.as_str()).collect())
        .unwrap_or_default();
    let dynamic_inputs: Vec<(String, SocketKind)> = node
        .inputs
        .iter()
        .filter(|socket| !template_inputs.contains(&socket.name.as_str()))
        .map(|socket| (socket.name.clone(), socket.kind))
        .collect();

    let node_type = match template {
        Some(t) if t.kind == node.kind => None,
        _ => Some(node.kind),
    };

    SerializedNode {
        class: node.title.clone(),
        x: node.position[0],
        y: node.position[1],
        node_type,
        name: node.instance_name.clone(),
        params: (!node.params.is_empty()).then(|| node.params.clone()),
        width: Some(node.size[0]),
        height: Some(node.size[1]),
        dynamic_inputs: (!dynamic_inputs.is_empty()).then_some(dynamic_inputs),
    }
}

/// Load a graph document from a JSON file
pub fn load_document(path: &Path) -> Result<GraphDocument, DocumentError> {
    let contents = std::fs::read_to_string(path)?;
    let document = SerializedGraph::from_json(&contents)?.to_document()?;
    tracing::info!("Loaded graph '{}' from {:?}", document.name, path);
    Ok(document)
}

/// Save a graph document to a JSON file
pub fn save_document(document: &GraphDocument, path: &Path) -> Result<(), DocumentError> {
    let json = SerializedGraph::from_document(document).to_json()?;
    std::fs::write(path, json)?;
    tracing::info!("Saved graph '{}' to {:?}", document.name, path);
    Ok(())
}

/// Error reading or writing a graph document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Connection refers to a node that does not exist
    #[error("Connection {index} refers to node {node}, but the document has {node_count} nodes")]
    InvalidConnection {
        /// Connection position
        index: usize,
        /// Node position referenced
        node: usize,
        /// Number of nodes in the document
        node_count: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_graph;

    const SCENE: &str = r#"{
        "name": "scene",
        "nodes": [
            {"type": "FBO", "x": 20, "y": 40, "name": "color", "params": {"format": "rgba16f"}},
            {"type": "ColorPass", "x": 260, "y": 40},
            {"type": "PresentToScreenPass", "x": 520, "y": 40}
        ],
        "connections": [
            {"from_node": 0, "from_socket": "output", "to_node": 1, "to_socket": "output_res_target"},
            {"from_node": 1, "from_socket": "output_res", "to_node": 2, "to_socket": "input_res"}
        ],
        "viewport_frames": [
            {"title": "Main Viewport", "viewport_name": "main", "x": 0, "y": 0, "width": 800, "height": 300}
        ]
    }"#;

    #[test]
    fn test_load_applies_template_defaults() {
        let document = SerializedGraph::from_json(SCENE).unwrap().to_document().unwrap();
        assert_eq!(document.name, "scene");
        assert_eq!(document.node_count(), 3);
        assert_eq!(document.connection_count(), 2);

        let fbo = document.nodes().next().unwrap();
        assert_eq!(fbo.instance_name(), Some("color"));
        assert_eq!(fbo.params["format"], ParamValue::from("rgba16f"));
        assert_eq!(fbo.params["samples"], ParamValue::Int(1));
        assert_eq!(fbo.size, Node::default_size(0, 1));
        assert_eq!(document.viewport_frames()[0].viewport_name, "main");
    }

    #[test]
    fn test_round_trip_compiles_the_same() {
        let document = SerializedGraph::from_json(SCENE).unwrap().to_document().unwrap();
        let json = SerializedGraph::from_document(&document).to_json().unwrap();
        let reloaded = SerializedGraph::from_json(&json).unwrap().to_document().unwrap();

        let first = compile_graph(&document).pipeline;
        let second = compile_graph(&reloaded).pipeline;
        assert_eq!(first, second);
        assert_eq!(first.passes.len(), 2);
        assert_eq!(first.resource_specs.len(), 1);
    }

    #[test]
    fn test_serialized_form_is_stable() {
        let document = SerializedGraph::from_json(SCENE).unwrap().to_document().unwrap();
        let once = SerializedGraph::from_document(&document);
        let twice = SerializedGraph::from_document(&once.to_document().unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_invalid_connection_index() {
        let json = r#"{"name": "g", "nodes": [{"type": "DepthPass", "x": 0, "y": 0}],
            "connections": [{"from_node": 0, "from_socket": "depth_res", "to_node": 4, "to_socket": "input_res"}]}"#;
        let err = SerializedGraph::from_json(json).unwrap().to_document().unwrap_err();
        assert!(matches!(
            err,
            DocumentError::InvalidConnection { index: 0, node: 4, node_count: 1 }
        ));
    }

    #[test]
    fn test_unknown_class_keeps_sockets() {
        let json = r#"{"name": "g", "nodes": [
                {"type": "DepthPass", "x": 0, "y": 0},
                {"type": "CustomPass", "x": 200, "y": 0, "dynamic_inputs": [["mask", "texture"]]}
            ],
            "connections": [{"from_node": 0, "from_socket": "depth_res", "to_node": 1, "to_socket": "depth"}]}"#;
        let document = SerializedGraph::from_json(json).unwrap().to_document().unwrap();
        let custom = document.nodes().nth(1).unwrap();

        assert_eq!(custom.kind, NodeKind::Pass);
        assert_eq!(custom.input("mask").unwrap().kind, SocketKind::Texture);
        assert_eq!(custom.input("depth").unwrap().kind, SocketKind::Any);
        assert_eq!(document.connection_count(), 1);

        let serialized = SerializedGraph::from_document(&document);
        assert_eq!(
            serialized.nodes[1].dynamic_inputs,
            Some(vec![
                ("mask".to_string(), SocketKind::Texture),
                ("depth".to_string(), SocketKind::Any),
            ])
        );
    }

    #[test]
    fn test_unknown_socket_on_known_class_is_dropped() {
        let json = r#"{"name": "g", "nodes": [
                {"type": "DepthPass", "x": 0, "y": 0},
                {"type": "PresentToScreenPass", "x": 200, "y": 0}
            ],
            "connections": [{"from_node": 0, "from_socket": "depth_res", "to_node": 1, "to_socket": "missing"}]}"#;
        let document = SerializedGraph::from_json(json).unwrap().to_document().unwrap();
        assert_eq!(document.connection_count(), 0);
    }

    #[test]
    fn test_dynamic_inputs_on_known_class() {
        let json = r#"{"name": "g", "nodes": [
                {"type": "PostProcessPass", "x": 0, "y": 0, "dynamic_inputs": [["noise_tex", "texture"]]}
            ]}"#;
        let document = SerializedGraph::from_json(json).unwrap().to_document().unwrap();
        let node = document.nodes().next().unwrap();
        assert_eq!(node.inputs.len(), 3);
        assert_eq!(node.size, Node::default_size(3, 1));

        let serialized = SerializedGraph::from_document(&document);
        assert_eq!(
            serialized.nodes[0].dynamic_inputs,
            Some(vec![("noise_tex".to_string(), SocketKind::Texture)])
        );
    }
}
