// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pass-class registry.
//!
//! Maps a stable class name to a factory that builds a typed [`PassConfig`]
//! from keyword arguments. The registry is what the editor palette lists and
//! what the instantiator queries when compiling pass nodes.

use crate::node::{NodeKind, NodeRegistry, NodeTemplate, ParamValue};
use crate::pipeline::PassConfig;
use crate::socket::Socket;
use indexmap::IndexMap;

/// Keyword carrying the pass instance name
pub const PASS_NAME_KEY: &str = "pass_name";
/// Keyword carrying the viewport scope
pub const VIEWPORT_NAME_KEY: &str = "viewport_name";

/// Builds a pass configuration from its arguments
pub type PassFactory = fn(&PassArgs<'_>) -> Result<PassConfig, ConstructError>;

/// Arguments handed to a pass factory
pub struct PassArgs<'a> {
    values: &'a IndexMap<String, ParamValue>,
    extras: IndexMap<String, ParamValue>,
}

impl<'a> PassArgs<'a> {
    /// Raw argument value
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Float argument, or the default when absent
    pub fn float(&self, name: &str, default: f32) -> Result<f32, ConstructError> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value
                .as_f64()
                .map(|v| v as f32)
                .ok_or_else(|| ConstructError::invalid(name, "number", value)),
        }
    }

    /// Non-negative integer argument, or the default when absent
    pub fn uint(&self, name: &str, default: u32) -> Result<u32, ConstructError> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value
                .as_i64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| ConstructError::invalid(name, "non-negative integer", value)),
        }
    }

    /// Boolean argument, or the default when absent
    pub fn boolean(&self, name: &str, default: bool) -> Result<bool, ConstructError> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value
                .as_bool()
                .ok_or_else(|| ConstructError::invalid(name, "bool", value)),
        }
    }

    /// String argument, or the default when absent
    pub fn text(&self, name: &str, default: &str) -> Result<String, ConstructError> {
        match self.get(name) {
            None => Ok(default.to_string()),
            Some(value) => value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| ConstructError::invalid(name, "string", value)),
        }
    }

    /// Undeclared, non-resource arguments accepted by a catch-all class
    pub fn extras(&self) -> &IndexMap<String, ParamValue> {
        &self.extras
    }
}

/// A registered pass class
#[derive(Debug, Clone)]
pub struct PassClass {
    /// Stable class name
    pub name: String,
    /// Pass or effect
    pub kind: NodeKind,
    /// Palette category
    pub category: String,
    /// Description
    pub description: String,
    /// Input sockets of nodes of this class
    pub inputs: Vec<Socket>,
    /// Output sockets of nodes of this class
    pub outputs: Vec<Socket>,
    /// Declared UI parameters with defaults
    pub parameters: IndexMap<String, ParamValue>,
    /// Whether the constructor takes a viewport name
    pub accepts_viewport: bool,
    /// Whether the constructor accepts arbitrary keywords
    pub catch_all: bool,
    /// Output socket aliasing an input socket's buffer
    pub inplace: Vec<(String, String)>,
    /// Constructor
    pub factory: PassFactory,
}

impl PassClass {
    /// Create a class with no sockets or parameters
    pub fn new(
        name: impl Into<String>,
        kind: NodeKind,
        category: impl Into<String>,
        description: impl Into<String>,
        factory: PassFactory,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            category: category.into(),
            description: description.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            parameters: IndexMap::new(),
            accepts_viewport: false,
            catch_all: false,
            inplace: Vec::new(),
            factory,
        }
    }

    /// Add an input socket
    pub fn with_input(mut self, socket: Socket) -> Self {
        self.inputs.push(socket);
        self
    }

    /// Add an output socket
    pub fn with_output(mut self, socket: Socket) -> Self {
        self.outputs.push(socket);
        self
    }

    /// Add an output together with its `_target` redirect input
    pub fn with_redirectable_output(mut self, socket: Socket) -> Self {
        self.inputs.push(Socket::input(
            format!("{}{}", socket.name, crate::socket::TARGET_SUFFIX),
            socket.kind,
        ));
        self.outputs.push(socket);
        self
    }

    /// Declare a UI parameter with its default
    pub fn with_param(mut self, name: impl Into<String>, default: impl Into<ParamValue>) -> Self {
        self.parameters.insert(name.into(), default.into());
        self
    }

    /// Accept a viewport name in the constructor
    pub fn with_viewport(mut self) -> Self {
        self.accepts_viewport = true;
        self
    }

    /// Accept arbitrary keywords in the constructor
    pub fn with_catch_all(mut self) -> Self {
        self.catch_all = true;
        self
    }

    /// Declare that an output reuses an input's buffer
    pub fn with_inplace(mut self, output: impl Into<String>, input: impl Into<String>) -> Self {
        self.inplace.push((output.into(), input.into()));
        self
    }

    /// Whether the constructor declares a keyword
    pub fn declares(&self, key: &str) -> bool {
        key == PASS_NAME_KEY
            || (key == VIEWPORT_NAME_KEY && self.accepts_viewport)
            || self.parameters.contains_key(key)
            || self.inputs.iter().any(|s| !s.is_target() && s.name == key)
            || self.outputs.iter().any(|s| s.name == key)
    }

    /// Call the constructor with keyword arguments.
    ///
    /// Fails with [`ConstructError::UnexpectedParameter`] when a keyword is not
    /// declared and the class has no catch-all.
    pub fn construct(
        &self,
        kwargs: &IndexMap<String, ParamValue>,
        bindings: &IndexMap<String, String>,
    ) -> Result<PassConfig, ConstructError> {
        let mut extras = IndexMap::new();
        for (key, value) in kwargs {
            if self.declares(key) {
                continue;
            }
            if !self.catch_all {
                return Err(ConstructError::UnexpectedParameter(key.clone()));
            }
            if !bindings.contains_key(key) && key != VIEWPORT_NAME_KEY {
                extras.insert(key.clone(), value.clone());
            }
        }

        (self.factory)(&PassArgs {
            values: kwargs,
            extras,
        })
    }

    /// Node template for the editor palette
    pub fn node_template(&self) -> NodeTemplate {
        NodeTemplate {
            class: self.name.clone(),
            kind: self.kind,
            category: self.category.clone(),
            description: self.description.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            params: self.parameters.clone(),
        }
    }
}

/// Registry of pass classes by name
#[derive(Debug, Clone, Default)]
pub struct PassRegistry {
    classes: IndexMap<String, PassClass>,
}

impl PassRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pass class, replacing one with the same name
    pub fn register(&mut self, class: PassClass) {
        self.classes.insert(class.name.clone(), class);
    }

    /// Look up a pass class by name
    pub fn get_pass_class(&self, name: &str) -> Option<&PassClass> {
        self.classes.get(name)
    }

    /// Class names grouped by category, in registration order
    pub fn get_pass_categories(&self) -> IndexMap<String, Vec<String>> {
        let mut categories: IndexMap<String, Vec<String>> = IndexMap::new();
        for class in self.classes.values() {
            categories
                .entry(class.category.clone())
                .or_default()
                .push(class.name.clone());
        }
        categories
    }

    /// All registered classes
    pub fn classes(&self) -> impl Iterator<Item = &PassClass> {
        self.classes.values()
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Register node templates for every pass class
    pub fn extend_node_registry(&self, nodes: &mut NodeRegistry) {
        for class in self.classes.values() {
            nodes.register(class.node_template());
        }
    }
}

/// Error raised by a pass constructor
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstructError {
    /// Keyword not declared by the constructor
    #[error("unexpected parameter '{0}'")]
    UnexpectedParameter(String),

    /// Declared keyword with a value of the wrong type
    #[error("parameter '{name}' expects {expected}, got {found}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Expected type
        expected: &'static str,
        /// Type that was supplied
        found: &'static str,
    },

    /// Declared keyword with an unusable value
    #[error("parameter '{name}': {reason}")]
    OutOfRange {
        /// Parameter name
        name: String,
        /// Why the value was rejected
        reason: String,
    },
}

impl ConstructError {
    fn invalid(name: &str, expected: &'static str, value: &ParamValue) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            expected,
            found: value.type_name(),
        }
    }
}
