// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in pass classes and resource node templates.

use crate::node::{NodeKind, NodeRegistry, NodeTemplate, ParamValue};
use crate::pipeline::{PassConfig, TonemapOperator};
use crate::registry::{ConstructError, PassArgs, PassClass, PassRegistry};
use crate::socket::{Socket, SocketKind};
use indexmap::IndexMap;
use std::sync::LazyLock;

/// Class name of framebuffer resource nodes
pub const FBO_CLASS: &str = "FBO";
/// Class name of texture resource nodes
pub const TEXTURE_CLASS: &str = "Texture";
/// Class name of viewport marker nodes
pub const VIEWPORT_CLASS: &str = "Viewport";

static PASS_REGISTRY: LazyLock<PassRegistry> = LazyLock::new(create_render_registry);
static NODE_REGISTRY: LazyLock<NodeRegistry> = LazyLock::new(create_node_registry);

/// Process-wide registry of built-in pass classes
pub fn builtin_pass_registry() -> &'static PassRegistry {
    &PASS_REGISTRY
}

/// Process-wide registry of every built-in node class
pub fn builtin_node_registry() -> &'static NodeRegistry {
    &NODE_REGISTRY
}

/// Create the render pass registry with all built-in classes
pub fn create_render_registry() -> PassRegistry {
    let mut registry = PassRegistry::new();

    // ========================================================================
    // Geometry
    // ========================================================================

    registry.register(
        PassClass::new(
            "ShadowPass",
            NodeKind::Pass,
            "Geometry",
            "Render shadow casters into a shadow map",
            build_shadow,
        )
        .with_output(Socket::output("shadow_map", SocketKind::Shadow))
        .with_param("resolution", 2048_i64)
        .with_param("cascades", 1_i64),
    );

    registry.register(
        PassClass::new(
            "DepthPass",
            NodeKind::Pass,
            "Geometry",
            "Depth-only prepass",
            |_| Ok(PassConfig::Depth),
        )
        .with_redirectable_output(Socket::output("depth_res", SocketKind::Fbo))
        .with_viewport(),
    );

    registry.register(
        PassClass::new(
            "ColorPass",
            NodeKind::Pass,
            "Geometry",
            "Forward-shaded scene color",
            build_color,
        )
        .with_input(Socket::input("input_res", SocketKind::Fbo))
        .with_input(Socket::input("shadow_map", SocketKind::Shadow))
        .with_redirectable_output(Socket::output("output_res", SocketKind::Fbo))
        .with_param("clear", true)
        .with_param("wireframe", false)
        .with_viewport(),
    );

    registry.register(
        PassClass::new(
            "SkyboxPass",
            NodeKind::Pass,
            "Geometry",
            "Draw the sky behind scene color",
            build_skybox,
        )
        .with_input(Socket::input("input_res", SocketKind::Fbo))
        .with_output(Socket::output("output_res", SocketKind::Fbo))
        .with_inplace("output_res", "input_res")
        .with_param("intensity", 1.0)
        .with_param("cubemap", "")
        .with_viewport(),
    );

    // ========================================================================
    // Post Process
    // ========================================================================

    registry.register(
        PassClass::new(
            "BloomPass",
            NodeKind::Effect,
            "Post Process",
            "Threshold, blur, and add bright areas",
            build_bloom,
        )
        .with_input(Socket::input("input_res", SocketKind::Fbo))
        .with_redirectable_output(Socket::output("output_res", SocketKind::Fbo))
        .with_param("threshold", 1.0)
        .with_param("intensity", 0.5)
        .with_param("iterations", 5_i64)
        .with_viewport(),
    );

    registry.register(
        PassClass::new(
            "TonemapPass",
            NodeKind::Effect,
            "Post Process",
            "Map HDR color to display range",
            build_tonemap,
        )
        .with_input(Socket::input("input_res", SocketKind::Fbo))
        .with_redirectable_output(Socket::output("output_res", SocketKind::Fbo))
        .with_param("exposure", 1.0)
        .with_param("operator", "aces")
        .with_viewport(),
    );

    registry.register(
        PassClass::new(
            "ColorGradingPass",
            NodeKind::Effect,
            "Post Process",
            "Adjust saturation and contrast in place",
            build_color_grading,
        )
        .with_input(Socket::input("input_res", SocketKind::Fbo))
        .with_output(Socket::output("output_res", SocketKind::Fbo))
        .with_inplace("output_res", "input_res")
        .with_param("saturation", 1.0)
        .with_param("contrast", 1.0)
        .with_viewport(),
    );

    registry.register(
        PassClass::new(
            "PostProcessPass",
            NodeKind::Effect,
            "Post Process",
            "Run a user shader over the input",
            build_post_process,
        )
        .with_input(Socket::input("input_res", SocketKind::Fbo))
        .with_redirectable_output(Socket::output("output_res", SocketKind::Fbo))
        .with_param("shader", "")
        .with_viewport()
        .with_catch_all(),
    );

    // ========================================================================
    // Anti-Aliasing
    // ========================================================================

    registry.register(
        PassClass::new(
            "FxaaPass",
            NodeKind::Effect,
            "Anti-Aliasing",
            "Fast approximate anti-aliasing",
            build_fxaa,
        )
        .with_input(Socket::input("input_res", SocketKind::Fbo))
        .with_redirectable_output(Socket::output("output_res", SocketKind::Fbo))
        .with_param("subpixel", 0.75)
        .with_viewport(),
    );

    // ========================================================================
    // Output
    // ========================================================================

    registry.register(
        PassClass::new(
            "PresentToScreenPass",
            NodeKind::Pass,
            "Output",
            "Copy the input to the swapchain",
            |_| Ok(PassConfig::Present),
        )
        .with_input(Socket::input("input_res", SocketKind::Fbo)),
    );

    registry
}

/// Create the node registry: resource templates plus every pass class
pub fn create_node_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    registry.register(NodeTemplate {
        class: FBO_CLASS.to_string(),
        kind: NodeKind::Resource,
        category: "Resources".to_string(),
        description: "Render target declared by the user".to_string(),
        inputs: vec![],
        outputs: vec![Socket::output("output", SocketKind::Fbo)],
        params: IndexMap::from([
            ("format".to_string(), ParamValue::from("rgba8")),
            ("samples".to_string(), ParamValue::Int(1)),
            ("size_mode".to_string(), ParamValue::from("viewport")),
            ("scale".to_string(), ParamValue::Float(1.0)),
            ("width".to_string(), ParamValue::Int(0)),
            ("height".to_string(), ParamValue::Int(0)),
            ("clear_color".to_string(), ParamValue::Bool(true)),
            ("clear_color_value".to_string(), ParamValue::from([0.0_f32, 0.0, 0.0, 1.0])),
            ("clear_depth".to_string(), ParamValue::Bool(false)),
            ("clear_depth_value".to_string(), ParamValue::Float(1.0)),
        ]),
    });

    registry.register(NodeTemplate {
        class: TEXTURE_CLASS.to_string(),
        kind: NodeKind::Resource,
        category: "Resources".to_string(),
        description: "Texture asset".to_string(),
        inputs: vec![],
        outputs: vec![Socket::output("texture", SocketKind::Texture)],
        params: IndexMap::from([("path".to_string(), ParamValue::from(""))]),
    });

    registry.register(NodeTemplate {
        class: VIEWPORT_CLASS.to_string(),
        kind: NodeKind::Viewport,
        category: "Output".to_string(),
        description: "Viewport marker".to_string(),
        inputs: vec![],
        outputs: vec![],
        params: IndexMap::new(),
    });

    builtin_pass_registry().extend_node_registry(&mut registry);
    registry
}

fn out_of_range(name: &str, reason: impl Into<String>) -> ConstructError {
    ConstructError::OutOfRange {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn build_shadow(args: &PassArgs<'_>) -> Result<PassConfig, ConstructError> {
    let resolution = args.uint("resolution", 2048)?;
    if resolution == 0 || !resolution.is_power_of_two() {
        return Err(out_of_range("resolution", format!("{resolution} is not a power of two")));
    }
    let cascades = args.uint("cascades", 1)?;
    if !(1..=4).contains(&cascades) {
        return Err(out_of_range("cascades", "must be between 1 and 4"));
    }
    Ok(PassConfig::Shadow { resolution, cascades })
}

fn build_color(args: &PassArgs<'_>) -> Result<PassConfig, ConstructError> {
    Ok(PassConfig::Color {
        clear: args.boolean("clear", true)?,
        wireframe: args.boolean("wireframe", false)?,
    })
}

fn build_skybox(args: &PassArgs<'_>) -> Result<PassConfig, ConstructError> {
    Ok(PassConfig::Skybox {
        intensity: args.float("intensity", 1.0)?,
        cubemap: args.text("cubemap", "")?,
    })
}

fn build_bloom(args: &PassArgs<'_>) -> Result<PassConfig, ConstructError> {
    let iterations = args.uint("iterations", 5)?;
    if !(1..=16).contains(&iterations) {
        return Err(out_of_range("iterations", "must be between 1 and 16"));
    }
    Ok(PassConfig::Bloom {
        threshold: args.float("threshold", 1.0)?,
        intensity: args.float("intensity", 0.5)?,
        iterations,
    })
}

fn build_tonemap(args: &PassArgs<'_>) -> Result<PassConfig, ConstructError> {
    let operator = args
        .text("operator", "aces")?
        .parse::<TonemapOperator>()
        .map_err(|reason| out_of_range("operator", reason))?;
    Ok(PassConfig::Tonemap {
        exposure: args.float("exposure", 1.0)?,
        operator,
    })
}

fn build_color_grading(args: &PassArgs<'_>) -> Result<PassConfig, ConstructError> {
    Ok(PassConfig::ColorGrading {
        saturation: args.float("saturation", 1.0)?,
        contrast: args.float("contrast", 1.0)?,
    })
}

fn build_post_process(args: &PassArgs<'_>) -> Result<PassConfig, ConstructError> {
    Ok(PassConfig::PostProcess {
        shader: args.text("shader", "")?,
        uniforms: args.extras().clone(),
    })
}

fn build_fxaa(args: &PassArgs<'_>) -> Result<PassConfig, ConstructError> {
    let subpixel = args.float("subpixel", 0.75)?;
    if !(0.0..=1.0).contains(&subpixel) {
        return Err(out_of_range("subpixel", "must be between 0 and 1"));
    }
    Ok(PassConfig::Fxaa { subpixel })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_categories() {
        let categories = builtin_pass_registry().get_pass_categories();
        assert_eq!(
            categories.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["Geometry", "Post Process", "Anti-Aliasing", "Output"]
        );
        assert!(categories["Geometry"].contains(&"ColorPass".to_string()));
    }

    #[test]
    fn test_node_registry_covers_passes_and_resources() {
        let nodes = builtin_node_registry();
        let fbo = nodes.create_node(FBO_CLASS).unwrap();
        assert_eq!(fbo.kind, NodeKind::Resource);
        assert_eq!(fbo.outputs.len(), 1);
        assert_eq!(fbo.outputs[0].kind, SocketKind::Fbo);

        let color = nodes.create_node("ColorPass").unwrap();
        assert!(color.input("output_res_target").is_some());
        assert!(color.output("output_res").is_some());
        assert_eq!(color.params["clear"], ParamValue::Bool(true));
    }

    #[test]
    fn test_shadow_resolution_validation() {
        let class = builtin_pass_registry().get_pass_class("ShadowPass").unwrap();
        let args = IndexMap::from([("resolution".to_string(), ParamValue::Int(1000))]);
        assert!(matches!(
            class.construct(&args, &IndexMap::new()),
            Err(ConstructError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_tonemap_operator_parsing() {
        let class = builtin_pass_registry().get_pass_class("TonemapPass").unwrap();
        let args = IndexMap::from([("operator".to_string(), ParamValue::from("Reinhard"))]);
        assert_eq!(
            class.construct(&args, &IndexMap::new()),
            Ok(PassConfig::Tonemap {
                exposure: 1.0,
                operator: TonemapOperator::Reinhard
            })
        );
    }
}
