// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compiled pipeline: ordered pass instances and resource creation specs.

use crate::node::ParamValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name given to the pipeline of a graph without passes
pub const EMPTY_PIPELINE_NAME: &str = "empty";

/// Tone mapping curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TonemapOperator {
    /// ACES filmic fit
    #[default]
    Aces,
    /// Reinhard
    Reinhard,
    /// Uncharted 2 filmic
    Filmic,
}

impl FromStr for TonemapOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aces" => Ok(Self::Aces),
            "reinhard" => Ok(Self::Reinhard),
            "filmic" => Ok(Self::Filmic),
            other => Err(format!("unknown tonemap operator '{other}'")),
        }
    }
}

/// Typed configuration of a pass instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PassConfig {
    /// Shadow map rendering
    Shadow {
        /// Shadow map edge length in texels
        resolution: u32,
        /// Cascade count
        cascades: u32,
    },
    /// Depth prepass
    Depth,
    /// Forward color pass
    Color {
        /// Clear the target before drawing
        clear: bool,
        /// Draw wireframes
        wireframe: bool,
    },
    /// Skybox drawn into the color target
    Skybox {
        /// Radiance multiplier
        intensity: f32,
        /// Cubemap asset path
        cubemap: String,
    },
    /// Bloom
    Bloom {
        /// Luminance threshold
        threshold: f32,
        /// Blend strength
        intensity: f32,
        /// Blur iterations
        iterations: u32,
    },
    /// HDR to display tone mapping
    Tonemap {
        /// Exposure multiplier
        exposure: f32,
        /// Curve
        operator: TonemapOperator,
    },
    /// Color grading
    ColorGrading {
        /// Saturation multiplier
        saturation: f32,
        /// Contrast multiplier
        contrast: f32,
    },
    /// Fast approximate anti-aliasing
    Fxaa {
        /// Sub-pixel aliasing removal amount
        subpixel: f32,
    },
    /// User shader post-process
    PostProcess {
        /// Shader asset path
        shader: String,
        /// Extra uniforms
        uniforms: IndexMap<String, ParamValue>,
    },
    /// Present to the swapchain
    Present,
}

/// An output that shares the buffer of one of the pass's inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InplaceAlias {
    /// Resource name written
    pub output: String,
    /// Resource name read, which the output aliases
    pub input: String,
}

/// A compiled pass instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pass {
    /// Registered class the pass was built from
    pub class_name: String,
    /// Pass name (instance name or class)
    pub name: String,
    /// Viewport the pass renders into, empty for off-screen
    pub viewport_name: String,
    /// Typed parameters
    pub config: PassConfig,
    /// Input socket to resource name
    pub inputs: IndexMap<String, String>,
    /// Output socket to resource name
    pub outputs: IndexMap<String, String>,
    /// In-place aliases, by resource name
    pub inplace: Vec<InplaceAlias>,
    /// Parameters the class does not declare, set after construction
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, ParamValue>,
}

impl Pass {
    /// Resource names this pass reads
    pub fn reads(&self) -> impl Iterator<Item = &str> {
        self.inputs.values().map(String::as_str)
    }

    /// Resource names this pass writes
    pub fn writes(&self) -> impl Iterator<Item = &str> {
        self.outputs.values().map(String::as_str)
    }

    /// Resource bound to a socket, inputs first
    pub fn binding(&self, socket: &str) -> Option<&str> {
        self.inputs
            .get(socket)
            .or_else(|| self.outputs.get(socket))
            .map(String::as_str)
    }
}

/// Texel format of a render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureFormat {
    /// 8-bit normalized RGBA
    #[default]
    #[serde(rename = "rgba8")]
    Rgba8Unorm,
    /// 8-bit sRGB RGBA
    #[serde(rename = "rgba8_srgb")]
    Rgba8Srgb,
    /// 16-bit float RGBA
    #[serde(rename = "rgba16f")]
    Rgba16Float,
    /// 32-bit float RGBA
    #[serde(rename = "rgba32f")]
    Rgba32Float,
    /// Packed 11/11/10 float
    #[serde(rename = "r11g11b10f")]
    Rg11b10Float,
    /// 24-bit depth with stencil
    #[serde(rename = "depth24_stencil8")]
    Depth24Stencil8,
    /// 32-bit float depth
    #[serde(rename = "depth32f")]
    Depth32Float,
}

impl TextureFormat {
    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rgba8Unorm => "rgba8",
            Self::Rgba8Srgb => "rgba8_srgb",
            Self::Rgba16Float => "rgba16f",
            Self::Rgba32Float => "rgba32f",
            Self::Rg11b10Float => "r11g11b10f",
            Self::Depth24Stencil8 => "depth24_stencil8",
            Self::Depth32Float => "depth32f",
        }
    }
}

impl fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextureFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgba8" | "rgba8unorm" | "rgba8_unorm" => Ok(Self::Rgba8Unorm),
            "rgba8_srgb" | "rgba8unormsrgb" | "srgba8" => Ok(Self::Rgba8Srgb),
            "rgba16f" | "rgba16float" | "rgba16_float" => Ok(Self::Rgba16Float),
            "rgba32f" | "rgba32float" | "rgba32_float" => Ok(Self::Rgba32Float),
            "r11g11b10f" | "rg11b10float" => Ok(Self::Rg11b10Float),
            "depth24_stencil8" | "depth24plusstencil8" | "d24s8" => Ok(Self::Depth24Stencil8),
            "depth32f" | "depth32float" | "d32f" => Ok(Self::Depth32Float),
            other => Err(format!("unknown texture format '{other}'")),
        }
    }
}

/// How a render target is sized
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SizePolicy {
    /// Scale of the viewport the resource belongs to
    Viewport {
        /// Scale factor applied to both axes
        scale: f32,
    },
    /// Fixed texel dimensions
    Fixed {
        /// Width in texels
        width: u32,
        /// Height in texels
        height: u32,
    },
}

impl Default for SizePolicy {
    fn default() -> Self {
        Self::Viewport { scale: 1.0 }
    }
}

/// Creation parameters for one canonical resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Canonical resource name
    pub name: String,
    /// Texel format
    pub format: TextureFormat,
    /// MSAA sample count
    pub samples: u32,
    /// Size policy
    pub size: SizePolicy,
    /// Clear color, when clearing is enabled
    pub clear_color: Option<[f32; 4]>,
    /// Clear depth, when clearing is enabled
    pub clear_depth: Option<f32>,
    /// Viewport scope, `None` for shared resources
    pub viewport_name: Option<String>,
}

/// An executable render pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,
    /// Passes in execution order
    pub passes: Vec<Pass>,
    /// Resources to create, one per canonical name
    pub resource_specs: Vec<ResourceSpec>,
}

impl Pipeline {
    /// Pipeline with no passes
    pub fn empty() -> Self {
        Self {
            name: EMPTY_PIPELINE_NAME.to_string(),
            passes: Vec::new(),
            resource_specs: Vec::new(),
        }
    }

    /// Whether the pipeline has no passes
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Find a pass by name
    pub fn pass(&self, name: &str) -> Option<&Pass> {
        self.passes.iter().find(|p| p.name == name)
    }

    /// Find a resource spec by name
    pub fn resource_spec(&self, name: &str) -> Option<&ResourceSpec> {
        self.resource_specs.iter().find(|s| s.name == name)
    }

    /// Pretty JSON for display and debugging
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("RGBA16F".parse::<TextureFormat>(), Ok(TextureFormat::Rgba16Float));
        assert_eq!("d24s8".parse::<TextureFormat>(), Ok(TextureFormat::Depth24Stencil8));
        assert!("bgra5".parse::<TextureFormat>().is_err());
    }

    #[test]
    fn test_pipeline_json() {
        let pipeline = Pipeline {
            name: "demo".to_string(),
            passes: vec![Pass {
                class_name: "PresentToScreenPass".to_string(),
                name: "present".to_string(),
                viewport_name: String::new(),
                config: PassConfig::Present,
                inputs: IndexMap::from([("input_res".to_string(), "color".to_string())]),
                outputs: IndexMap::new(),
                inplace: Vec::new(),
                attributes: IndexMap::new(),
            }],
            resource_specs: vec![ResourceSpec {
                name: "color".to_string(),
                format: TextureFormat::Rgba16Float,
                samples: 1,
                size: SizePolicy::default(),
                clear_color: None,
                clear_depth: None,
                viewport_name: None,
            }],
        };

        let json = pipeline.to_json_pretty().unwrap();
        assert!(json.contains("\"rgba16f\""));
        assert!(json.contains("\"type\": \"present\""));
        assert!(!json.contains("attributes"));
        let back: Pipeline = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pipeline);
    }
}
