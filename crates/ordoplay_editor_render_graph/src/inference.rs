// SPDX-License-Identifier: MIT OR Apache-2.0
//! Resource spec inference.
//!
//! Derives creation parameters for render targets: from the resource node
//! that declared the target when there is one, otherwise from the classes
//! of the passes that use it.

use crate::config::CompilerConfig;
use crate::node::{Node, ParamValue};
use crate::pipeline::{ResourceSpec, SizePolicy, TextureFormat};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Derives [`ResourceSpec`]s for canonical resources
pub struct ResourceSpecInferencer<'a> {
    config: &'a CompilerConfig,
}

impl<'a> ResourceSpecInferencer<'a> {
    /// Create an inferencer using the given heuristics
    pub fn new(config: &'a CompilerConfig) -> Self {
        Self { config }
    }

    /// Infer the spec of one resource; the first matching rule wins.
    ///
    /// Returns `Ok(None)` when system defaults should apply.
    pub fn infer(
        &self,
        name: &str,
        resource_node: Option<&Node>,
        consumers: &[String],
        viewport_name: Option<&str>,
    ) -> Result<Option<ResourceSpec>, SpecError> {
        let spec = match resource_node {
            Some(node) => Some(explicit_spec(name, node)?),
            None => self.heuristic_spec(name, consumers),
        };

        Ok(spec.map(|spec| ResourceSpec {
            viewport_name: viewport_name.filter(|v| !v.is_empty()).map(str::to_string),
            ..spec
        }))
    }

    fn heuristic_spec(&self, name: &str, consumers: &[String]) -> Option<ResourceSpec> {
        let hdr = consumers.iter().any(|class| self.config.wants_hdr(class));
        let msaa = consumers.iter().any(|class| self.config.wants_msaa(class));
        if !hdr && !msaa {
            return None;
        }

        Some(ResourceSpec {
            name: name.to_string(),
            format: if hdr {
                self.config.hdr_format
            } else {
                self.config.default_format
            },
            samples: if msaa { self.config.msaa_samples } else { 1 },
            size: SizePolicy::default(),
            clear_color: None,
            clear_depth: None,
            viewport_name: None,
        })
    }
}

fn explicit_spec(name: &str, node: &Node) -> Result<ResourceSpec, SpecError> {
    let params = &node.params;

    let format = match params.get("format") {
        None => TextureFormat::default(),
        Some(value) => {
            let text = value.as_str().ok_or_else(|| SpecError::invalid("format", "string", value))?;
            text.parse::<TextureFormat>()
                .map_err(|_| SpecError::UnknownFormat(text.to_string()))?
        }
    };

    let samples = match params.get("samples") {
        None => 1,
        Some(value) => {
            let count = value
                .as_i64()
                .ok_or_else(|| SpecError::invalid("samples", "integer", value))?;
            match count {
                1 | 2 | 4 | 8 | 16 => count as u32,
                _ => return Err(SpecError::InvalidSamples(count)),
            }
        }
    };

    let size = size_policy(params)?;

    let clear_color = if flag(params, "clear_color", true)? {
        let value = params
            .get("clear_color_value")
            .cloned()
            .unwrap_or_else(|| ParamValue::from([0.0_f32, 0.0, 0.0, 1.0]));
        Some(
            value
                .as_color()
                .ok_or_else(|| SpecError::invalid("clear_color_value", "RGBA list", &value))?,
        )
    } else {
        None
    };

    let clear_depth = if flag(params, "clear_depth", false)? {
        let depth = match params.get("clear_depth_value") {
            None => 1.0,
            Some(value) => value
                .as_f64()
                .ok_or_else(|| SpecError::invalid("clear_depth_value", "number", value))?,
        };
        if !(0.0..=1.0).contains(&depth) {
            return Err(SpecError::InvalidClearDepth(depth));
        }
        Some(depth as f32)
    } else {
        None
    };

    Ok(ResourceSpec {
        name: name.to_string(),
        format,
        samples,
        size,
        clear_color,
        clear_depth,
        viewport_name: None,
    })
}

fn size_policy(params: &IndexMap<String, ParamValue>) -> Result<SizePolicy, SpecError> {
    let mode = match params.get("size_mode") {
        None => "viewport",
        Some(value) => value
            .as_str()
            .ok_or_else(|| SpecError::invalid("size_mode", "string", value))?,
    };

    match mode {
        "viewport" | "relative" => {
            let scale = match params.get("scale") {
                None => 1.0,
                Some(value) => value
                    .as_f64()
                    .ok_or_else(|| SpecError::invalid("scale", "number", value))?,
            };
            if !scale.is_finite() || scale <= 0.0 {
                return Err(SpecError::InvalidScale(scale));
            }
            Ok(SizePolicy::Viewport { scale: scale as f32 })
        }
        "fixed" => {
            let dimension = |key: &str| -> Result<i64, SpecError> {
                let value = params.get(key).ok_or(SpecError::InvalidSize { width: 0, height: 0 })?;
                value.as_i64().ok_or_else(|| SpecError::invalid(key, "integer", value))
            };
            let (width, height) = (dimension("width")?, dimension("height")?);
            match (u32::try_from(width), u32::try_from(height)) {
                (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok(SizePolicy::Fixed { width: w, height: h }),
                _ => Err(SpecError::InvalidSize { width, height }),
            }
        }
        other => Err(SpecError::UnknownSizeMode(other.to_string())),
    }
}

fn flag(
    params: &IndexMap<String, ParamValue>,
    key: &str,
    default: bool,
) -> Result<bool, SpecError> {
    match params.get(key) {
        None => Ok(default),
        Some(value) => value
            .as_bool()
            .ok_or_else(|| SpecError::invalid(key, "bool", value)),
    }
}

/// Viewport scope of every resource declared inside a viewport frame.
///
/// `fbo_nodes` maps resource names to the index of the declaring node. A
/// redirected resource takes the scope of its original name if it has one,
/// otherwise the scope of its redirect target; both names then share it.
pub fn resource_scopes(
    fbo_nodes: &IndexMap<String, usize>,
    node_viewports: &[String],
    target_aliases: &IndexMap<String, String>,
) -> HashMap<String, String> {
    let mut scopes: HashMap<String, String> = HashMap::new();
    for (name, &index) in fbo_nodes {
        if let Some(viewport) = node_viewports.get(index).filter(|v| !v.is_empty()) {
            scopes.insert(name.clone(), viewport.clone());
        }
    }

    for (original, redirect) in target_aliases {
        let scope = scopes.get(original).or_else(|| scopes.get(redirect)).cloned();
        if let Some(scope) = scope {
            scopes.insert(original.clone(), scope.clone());
            scopes.insert(redirect.clone(), scope);
        }
    }

    scopes
}

/// Error building a spec from explicit resource parameters
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpecError {
    /// Format string not recognized
    #[error("Unknown texture format: {0}")]
    UnknownFormat(String),

    /// Sample count not supported
    #[error("Invalid sample count: {0}")]
    InvalidSamples(i64),

    /// Size mode not recognized
    #[error("Unknown size mode: {0}")]
    UnknownSizeMode(String),

    /// Scale not positive
    #[error("Invalid viewport scale: {0}")]
    InvalidScale(f64),

    /// Fixed size not positive
    #[error("Invalid fixed size: {width}x{height}")]
    InvalidSize {
        /// Width
        width: i64,
        /// Height
        height: i64,
    },

    /// Clear depth outside [0, 1]
    #[error("Invalid clear depth: {0}")]
    InvalidClearDepth(f64),

    /// Parameter of the wrong type
    #[error("Parameter '{name}' expects {expected}, got {found}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Expected type
        expected: &'static str,
        /// Type that was supplied
        found: &'static str,
    },
}

impl SpecError {
    fn invalid(name: &str, expected: &'static str, value: &ParamValue) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            expected,
            found: value.type_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{builtin_node_registry, FBO_CLASS};

    fn fbo() -> Node {
        builtin_node_registry().create_node(FBO_CLASS).unwrap()
    }

    #[test]
    fn test_explicit_defaults() {
        let config = CompilerConfig::default();
        let spec = ResourceSpecInferencer::new(&config)
            .infer("color", Some(&fbo()), &[], None)
            .unwrap()
            .unwrap();

        assert_eq!(spec.name, "color");
        assert_eq!(spec.format, TextureFormat::Rgba8Unorm);
        assert_eq!(spec.samples, 1);
        assert_eq!(spec.size, SizePolicy::Viewport { scale: 1.0 });
        assert_eq!(spec.clear_color, Some([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(spec.clear_depth, None);
    }

    #[test]
    fn test_explicit_wins_over_heuristics() {
        let config = CompilerConfig::default();
        let node = fbo()
            .with_param("format", "rgba32f")
            .with_param("samples", 2_i64)
            .with_param("size_mode", "fixed")
            .with_param("width", 512_i64)
            .with_param("height", 256_i64)
            .with_param("clear_depth", true)
            .with_param("clear_depth_value", 0.0);
        let spec = ResourceSpecInferencer::new(&config)
            .infer("hdr", Some(&node), &["BloomPass".to_string()], Some("main"))
            .unwrap()
            .unwrap();

        assert_eq!(spec.format, TextureFormat::Rgba32Float);
        assert_eq!(spec.samples, 2);
        assert_eq!(spec.size, SizePolicy::Fixed { width: 512, height: 256 });
        assert_eq!(spec.clear_depth, Some(0.0));
        assert_eq!(spec.viewport_name.as_deref(), Some("main"));
    }

    #[test]
    fn test_malformed_parameters_fail() {
        let config = CompilerConfig::default();
        let inferencer = ResourceSpecInferencer::new(&config);

        let node = fbo().with_param("format", "bgr565");
        assert_eq!(
            inferencer.infer("a", Some(&node), &[], None),
            Err(SpecError::UnknownFormat("bgr565".to_string()))
        );

        let node = fbo().with_param("samples", 3_i64);
        assert_eq!(
            inferencer.infer("a", Some(&node), &[], None),
            Err(SpecError::InvalidSamples(3))
        );

        let node = fbo().with_param("size_mode", "fixed");
        assert_eq!(
            inferencer.infer("a", Some(&node), &[], None),
            Err(SpecError::InvalidSize { width: 0, height: 0 })
        );
    }

    #[test]
    fn test_heuristics() {
        let config = CompilerConfig::default();
        let inferencer = ResourceSpecInferencer::new(&config);

        let spec = inferencer
            .infer("x", None, &["TonemapPass".to_string()], None)
            .unwrap()
            .unwrap();
        assert_eq!(spec.format, TextureFormat::Rgba16Float);
        assert_eq!(spec.samples, 1);

        let spec = inferencer
            .infer("y", None, &["DepthPass".to_string()], None)
            .unwrap()
            .unwrap();
        assert_eq!(spec.format, TextureFormat::Rgba8Unorm);
        assert_eq!(spec.samples, 4);

        let spec = inferencer
            .infer("z", None, &["ColorPass".to_string()], None)
            .unwrap()
            .unwrap();
        assert_eq!((spec.format, spec.samples), (TextureFormat::Rgba16Float, 4));

        assert_eq!(
            inferencer.infer("w", None, &["PresentToScreenPass".to_string()], None),
            Ok(None)
        );
    }

    #[test]
    fn test_scope_prefers_original() {
        let fbo_nodes = IndexMap::from([("color".to_string(), 0), ("overlay".to_string(), 1)]);
        let viewports = vec!["main".to_string(), "".to_string(), "side".to_string()];
        let aliases = IndexMap::from([
            ("ColorPass_2_output_res".to_string(), "color".to_string()),
            ("BloomPass_3_output_res".to_string(), "overlay".to_string()),
        ]);
        let scopes = resource_scopes(&fbo_nodes, &viewports, &aliases);

        assert_eq!(scopes["color"], "main");
        assert_eq!(scopes["ColorPass_2_output_res"], "main");
        assert!(!scopes.contains_key("overlay"));
        assert!(!scopes.contains_key("BloomPass_3_output_res"));
    }
}
