// SPDX-License-Identifier: MIT OR Apache-2.0
//! Viewport frames: rectangular regions that scope the nodes inside them.

use crate::node::Node;
use serde::{Deserialize, Serialize};

/// A spatial grouping that assigns a viewport to contained nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportFrame {
    /// Display title
    pub title: String,
    /// Viewport the contained passes render into
    pub viewport_name: String,
    /// Top-left corner
    pub position: [f32; 2],
    /// Width and height
    pub size: [f32; 2],
}

impl ViewportFrame {
    /// Create a new frame
    pub fn new(
        title: impl Into<String>,
        viewport_name: impl Into<String>,
        position: [f32; 2],
        size: [f32; 2],
    ) -> Self {
        Self {
            title: title.into(),
            viewport_name: viewport_name.into(),
            position,
            size,
        }
    }

    /// Check whether a point lies inside the frame (edges inclusive)
    pub fn contains_point(&self, point: [f32; 2]) -> bool {
        let [x, y] = point;
        x >= self.position[0]
            && x <= self.position[0] + self.size[0]
            && y >= self.position[1]
            && y <= self.position[1] + self.size[1]
    }

    /// Check whether a node's center lies inside the frame
    pub fn contains(&self, node: &Node) -> bool {
        self.contains_point(node.center())
    }
}

/// Viewport name for a node: the first containing frame wins, `""` if none
pub fn viewport_for<'a>(frames: &'a [ViewportFrame], node: &Node) -> &'a str {
    frames
        .iter()
        .find(|frame| frame.contains(node))
        .map_or("", |frame| frame.viewport_name.as_str())
}
