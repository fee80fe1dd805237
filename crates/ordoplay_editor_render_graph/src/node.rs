// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the render graph.

use crate::socket::{Socket, SocketDirection};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Default node width in graph units
pub const NODE_WIDTH: f32 = 180.0;
/// Height of the node title bar
pub const NODE_HEADER_HEIGHT: f32 = 24.0;
/// Height of one socket row
pub const SOCKET_ROW_HEIGHT: f32 = 22.0;
/// Padding below the last socket row
pub const NODE_PADDING: f32 = 8.0;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Role a node plays in the render graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Declares a resource (FBO, texture)
    Resource,
    /// Render pass
    Pass,
    /// Post-process effect pass
    Effect,
    /// Viewport marker
    Viewport,
}

impl NodeKind {
    /// Whether nodes of this kind compile into pipeline passes
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass | Self::Effect)
    }

    /// Lowercase name used in serialized documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Pass => "pass",
            Self::Effect => "effect",
            Self::Viewport => "viewport",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A UI parameter value stored on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// String
    Text(String),
    /// List (colors, vectors)
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Numeric value, accepting integers
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer value, accepting integral floats
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// RGBA color from a list of three or four numbers
    pub fn as_color(&self) -> Option<[f32; 4]> {
        let Self::List(items) = self else {
            return None;
        };
        let values: Option<Vec<f32>> = items.iter().map(|v| v.as_f64().map(|f| f as f32)).collect();
        match values?.as_slice() {
            [r, g, b] => Some([*r, *g, *b, 1.0]),
            [r, g, b, a] => Some([*r, *g, *b, *a]),
            _ => None,
        }
    }

    /// Short type label for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "string",
            Self::List(_) => "list",
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<[f32; 4]> for ParamValue {
    fn from(value: [f32; 4]) -> Self {
        Self::List(value.iter().map(|c| Self::Float(f64::from(*c))).collect())
    }
}

/// Node class definition used to create node instances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTemplate {
    /// Class identifier (becomes the node title)
    pub class: String,
    /// Node kind
    pub kind: NodeKind,
    /// Palette category
    pub category: String,
    /// Description
    pub description: String,
    /// Default input sockets
    pub inputs: Vec<Socket>,
    /// Default output sockets
    pub outputs: Vec<Socket>,
    /// Default UI parameters
    pub params: IndexMap<String, ParamValue>,
}

/// A node instance in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Class identifier
    pub title: String,
    /// User-chosen instance name
    pub instance_name: Option<String>,
    /// Node kind
    pub kind: NodeKind,
    /// Input sockets, index = position
    pub inputs: Vec<Socket>,
    /// Output sockets, index = position
    pub outputs: Vec<Socket>,
    /// UI parameters
    pub params: IndexMap<String, ParamValue>,
    /// Top-left position in the graph UI
    pub position: [f32; 2],
    /// Width and height in the graph UI
    pub size: [f32; 2],
}

impl Node {
    /// Create a new node from a class template
    pub fn new(template: &NodeTemplate) -> Self {
        let mut node = Self::bare(template.class.clone(), template.kind);
        node.inputs = template.inputs.clone();
        node.outputs = template.outputs.clone();
        node.params = template.params.clone();
        node.size = Self::default_size(node.inputs.len(), node.outputs.len());
        node
    }

    /// Create a node with no sockets or parameters
    pub fn bare(title: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(),
            title: title.into(),
            instance_name: None,
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            params: IndexMap::new(),
            position: [0.0, 0.0],
            size: Self::default_size(0, 0),
        }
    }

    /// Size the editor gives a node with the given socket counts
    pub fn default_size(inputs: usize, outputs: usize) -> [f32; 2] {
        let rows = inputs.max(outputs) as f32;
        [NODE_WIDTH, NODE_HEADER_HEIGHT + rows * SOCKET_ROW_HEIGHT + NODE_PADDING]
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Set the instance name
    pub fn with_instance_name(mut self, name: impl Into<String>) -> Self {
        self.instance_name = Some(name.into());
        self
    }

    /// Set a UI parameter
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Append an input socket
    pub fn add_input(&mut self, socket: Socket) -> usize {
        self.inputs.push(Socket {
            direction: SocketDirection::Input,
            ..socket
        });
        self.inputs.len() - 1
    }

    /// Append an output socket
    pub fn add_output(&mut self, socket: Socket) -> usize {
        self.outputs.push(Socket {
            direction: SocketDirection::Output,
            ..socket
        });
        self.outputs.len() - 1
    }

    /// Get an input socket by name
    pub fn input(&self, name: &str) -> Option<&Socket> {
        self.inputs.iter().find(|s| s.name == name)
    }

    /// Get an output socket by name
    pub fn output(&self, name: &str) -> Option<&Socket> {
        self.outputs.iter().find(|s| s.name == name)
    }

    /// Get all sockets
    pub fn sockets(&self) -> impl Iterator<Item = &Socket> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Instance name if set and non-empty
    pub fn instance_name(&self) -> Option<&str> {
        self.instance_name.as_deref().filter(|n| !n.is_empty())
    }

    /// Name shown to users and given to compiled passes
    pub fn display_name(&self) -> &str {
        self.instance_name().unwrap_or(&self.title)
    }

    /// Geometric center used for viewport containment
    pub fn center(&self) -> [f32; 2] {
        [
            self.position[0] + self.size[0] * 0.5,
            self.position[1] + self.size[1] * 0.5,
        ]
    }
}

/// Registry of available node classes
pub struct NodeRegistry {
    /// Registered templates by class
    templates: IndexMap<String, NodeTemplate>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            templates: IndexMap::new(),
        }
    }

    /// Register a node class
    pub fn register(&mut self, template: NodeTemplate) {
        self.templates.insert(template.class.clone(), template);
    }

    /// Get a template by class
    pub fn get(&self, class: &str) -> Option<&NodeTemplate> {
        self.templates.get(class)
    }

    /// Get all registered templates
    pub fn templates(&self) -> impl Iterator<Item = &NodeTemplate> {
        self.templates.values()
    }

    /// Get templates of one kind
    pub fn templates_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &NodeTemplate> {
        self.templates.values().filter(move |t| t.kind == kind)
    }

    /// Create a node from a class name
    pub fn create_node(&self, class: &str) -> Option<Node> {
        self.get(class).map(Node::new)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
