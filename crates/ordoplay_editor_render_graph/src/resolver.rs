// SPDX-License-Identifier: MIT OR Apache-2.0
//! Resource name resolution.
//!
//! Every socket in the graph is given a resource name. Sockets that share a
//! name share the underlying buffer, which is how connections and `_target`
//! redirects turn into aliasing. Resolution runs in five ordered passes:
//!
//! 1. seed output names,
//! 2. propagate names along connections,
//! 3. apply `_target` overrides, recording superseded names,
//! 4. propagate again so downstream inputs see the overrides,
//! 5. give unconnected inputs a placeholder name.
//!
//! The result is a pure function of the node and connection order.

use crate::connection::SocketLink;
use crate::node::{Node, NodeKind};
use crate::socket::{SocketDirection, SocketKind};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// Prefix of names given to unconnected inputs
pub const PLACEHOLDER_PREFIX: &str = "empty";

/// Identifies one socket within a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SocketKey {
    /// Node index
    pub node: usize,
    /// Socket direction
    pub direction: SocketDirection,
    /// Socket name
    pub socket: String,
}

impl SocketKey {
    /// Key of an input socket
    pub fn input(node: usize, socket: impl Into<String>) -> Self {
        Self {
            node,
            direction: SocketDirection::Input,
            socket: socket.into(),
        }
    }

    /// Key of an output socket
    pub fn output(node: usize, socket: impl Into<String>) -> Self {
        Self {
            node,
            direction: SocketDirection::Output,
            socket: socket.into(),
        }
    }
}

/// Names assigned to every socket of a graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedNames {
    names: HashMap<SocketKey, String>,
    kinds: HashMap<String, SocketKind>,
    target_aliases: IndexMap<String, String>,
    placeholders: HashSet<String>,
}

impl ResolvedNames {
    /// Resource name of a socket
    pub fn get(&self, key: &SocketKey) -> Option<&str> {
        self.names.get(key).map(String::as_str)
    }

    /// Resource name of an input socket
    pub fn input(&self, node: usize, socket: &str) -> Option<&str> {
        self.get(&SocketKey::input(node, socket))
    }

    /// Resource name of an output socket
    pub fn output(&self, node: usize, socket: &str) -> Option<&str> {
        self.get(&SocketKey::output(node, socket))
    }

    /// Socket kind a resource name was introduced with
    pub fn kind(&self, name: &str) -> Option<SocketKind> {
        self.kinds.get(name).copied()
    }

    /// Superseded output names and the redirect target that replaced them
    pub fn target_aliases(&self) -> &IndexMap<String, String> {
        &self.target_aliases
    }

    /// Redirect target replacing a superseded name
    pub fn target_alias(&self, superseded: &str) -> Option<&str> {
        self.target_aliases.get(superseded).map(String::as_str)
    }

    /// Whether a name is a synthetic placeholder for an unconnected input
    pub fn is_placeholder(&self, name: &str) -> bool {
        self.placeholders.contains(name)
    }
}

/// Assigns resource names to the sockets of a graph snapshot
pub struct ResourceNameResolver<'a> {
    nodes: &'a [Node],
    links: &'a [SocketLink],
    resolved: ResolvedNames,
}

impl<'a> ResourceNameResolver<'a> {
    /// Resolve names for the given nodes and connections
    pub fn resolve(nodes: &'a [Node], links: &'a [SocketLink]) -> ResolvedNames {
        let mut resolver = Self {
            nodes,
            links,
            resolved: ResolvedNames::default(),
        };
        resolver.seed_outputs();
        resolver.propagate();
        resolver.apply_target_overrides();
        resolver.propagate();
        resolver.default_unconnected();
        resolver.resolved
    }

    fn seed_outputs(&mut self) {
        let nodes = self.nodes;
        for (index, node) in nodes.iter().enumerate() {
            if is_fbo_resource(node) {
                let name = node
                    .instance_name()
                    .map_or_else(|| format!("fbo_{index}"), str::to_string);
                let key = SocketKey::output(index, node.outputs[0].name.clone());
                self.assign(key, name, SocketKind::Fbo);
                continue;
            }

            let prefix = node
                .instance_name()
                .map_or_else(|| format!("{}_{index}", node.title), str::to_string);
            for socket in &node.outputs {
                let name = format!("{prefix}_{}", socket.name);
                self.assign(SocketKey::output(index, socket.name.clone()), name, socket.kind);
            }
        }
    }

    fn propagate(&mut self) {
        let links = self.links;
        for link in links {
            let target_exists = self
                .nodes
                .get(link.to_node)
                .is_some_and(|node| node.input(&link.to_socket).is_some());
            if !target_exists {
                continue;
            }
            let Some(name) = self.resolved.output(link.from_node, &link.from_socket) else {
                continue;
            };
            let name = name.to_string();
            self.resolved
                .names
                .insert(SocketKey::input(link.to_node, link.to_socket.clone()), name);
        }
    }

    fn apply_target_overrides(&mut self) {
        let nodes = self.nodes;
        for (index, node) in nodes.iter().enumerate() {
            for socket in &node.inputs {
                let Some(output) = socket.target_of() else {
                    continue;
                };
                if node.output(output).is_none() {
                    continue;
                }
                // Unconnected targets have no name yet and never redirect
                let Some(target) = self.resolved.input(index, &socket.name) else {
                    continue;
                };
                let target = self.redirected(target).to_string();

                let key = SocketKey::output(index, output);
                if let Some(old) = self.resolved.names.get(&key).cloned() {
                    if old != target && !self.resolved.target_aliases.contains_key(&old) {
                        tracing::debug!("Redirecting {old} to {target}");
                        for replacement in self.resolved.target_aliases.values_mut() {
                            if *replacement == old {
                                replacement.clone_from(&target);
                            }
                        }
                        self.resolved.target_aliases.insert(old, target.clone());
                    }
                }
                self.resolved.names.insert(key, target);
            }
        }

        // Outputs redirected before their own target moved on
        let aliases = &self.resolved.target_aliases;
        for name in self.resolved.names.values_mut() {
            if let Some(replacement) = aliases.get(name.as_str()) {
                name.clone_from(replacement);
            }
        }
    }

    /// Final name of a possibly superseded name; alias values are never superseded
    fn redirected<'n>(&'n self, name: &'n str) -> &'n str {
        self.resolved.target_alias(name).unwrap_or(name)
    }

    fn default_unconnected(&mut self) {
        let nodes = self.nodes;
        for (index, node) in nodes.iter().enumerate() {
            for socket in &node.inputs {
                let key = SocketKey::input(index, socket.name.clone());
                if self.resolved.names.contains_key(&key) {
                    continue;
                }
                let name = format!("{PLACEHOLDER_PREFIX}_{}_{index}_{}", node.title, socket.name);
                self.resolved.placeholders.insert(name.clone());
                self.assign(key, name, socket.kind);
            }
        }
    }

    fn assign(&mut self, key: SocketKey, name: String, kind: SocketKind) {
        self.resolved.kinds.entry(name.clone()).or_insert(kind);
        self.resolved.names.insert(key, name);
    }
}

/// Whether a node declares a framebuffer resource
pub fn is_fbo_resource(node: &Node) -> bool {
    node.kind == NodeKind::Resource
        && node.outputs.len() == 1
        && node.outputs[0].kind == SocketKind::Fbo
}
