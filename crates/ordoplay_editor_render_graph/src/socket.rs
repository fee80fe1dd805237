// SPDX-License-Identifier: MIT OR Apache-2.0
//! Socket definitions for node inputs/outputs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Socket direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketDirection {
    /// Input socket
    Input,
    /// Output socket
    Output,
}

/// Kind of resource that flows through a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketKind {
    /// Framebuffer object (render target)
    Fbo,
    /// Sampled texture
    Texture,
    /// Shadow map
    Shadow,
    /// Any resource (generic sockets)
    Any,
    /// Ordering-only edge, carries no resource
    Flow,
}

impl SocketKind {
    /// Lowercase name used in serialized documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fbo => "fbo",
            Self::Texture => "texture",
            Self::Shadow => "shadow",
            Self::Any => "any",
            Self::Flow => "flow",
        }
    }

    /// Check if an output of this kind can feed an input of `other`
    pub fn can_connect_to(&self, other: SocketKind) -> bool {
        // Any kind can connect to anything
        if matches!(self, Self::Any) || matches!(other, Self::Any) {
            return true;
        }

        if *self == other {
            return true;
        }

        // Render targets may be sampled downstream
        matches!(
            (self, other),
            (Self::Fbo, Self::Texture) | (Self::Shadow, Self::Texture)
        )
    }
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an unknown socket kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown socket kind: {0}")]
pub struct UnknownSocketKind(pub String);

impl FromStr for SocketKind {
    type Err = UnknownSocketKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fbo" => Ok(Self::Fbo),
            "texture" => Ok(Self::Texture),
            "shadow" => Ok(Self::Shadow),
            "any" => Ok(Self::Any),
            "flow" => Ok(Self::Flow),
            _ => Err(UnknownSocketKind(s.to_string())),
        }
    }
}

/// How many connections a socket accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Multiplicity {
    /// At most one connection; a new one replaces the old
    Single,
    /// Any number of connections
    Multiple,
}

/// A socket on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Socket {
    /// Socket name, unique per direction on a node
    pub name: String,
    /// Resource kind
    pub kind: SocketKind,
    /// Socket direction
    pub direction: SocketDirection,
    /// Accepted connection count
    pub multiplicity: Multiplicity,
}

/// Suffix marking an input that redirects a sibling output into a resource
pub const TARGET_SUFFIX: &str = "_target";

impl Socket {
    /// Create a new input socket
    pub fn input(name: impl Into<String>, kind: SocketKind) -> Self {
        Self {
            name: name.into(),
            kind,
            direction: SocketDirection::Input,
            multiplicity: Multiplicity::Single,
        }
    }

    /// Create a new output socket
    pub fn output(name: impl Into<String>, kind: SocketKind) -> Self {
        Self {
            name: name.into(),
            kind,
            direction: SocketDirection::Output,
            multiplicity: Multiplicity::Multiple, // Outputs fan out by default
        }
    }

    /// Name of the output this socket redirects, if it is a `_target` input
    pub fn target_of(&self) -> Option<&str> {
        if self.direction != SocketDirection::Input {
            return None;
        }
        self.name
            .strip_suffix(TARGET_SUFFIX)
            .filter(|base| !base.is_empty())
    }

    /// Whether this is a `_target` redirect input
    pub fn is_target(&self) -> bool {
        self.target_of().is_some()
    }

    /// Check if a connection from this socket to another is valid
    pub fn can_connect(&self, other: &Socket) -> bool {
        // Must run output -> input
        if self.direction != SocketDirection::Output || other.direction != SocketDirection::Input {
            return false;
        }

        self.kind.can_connect_to(other.kind)
    }
}
