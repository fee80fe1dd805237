// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pass instantiation.
//!
//! Turns a pass node plus its resolved socket bindings into a [`Pass`] by
//! calling the registered class constructor with keyword arguments.

use crate::node::{Node, ParamValue};
use crate::pipeline::{InplaceAlias, Pass};
use crate::registry::{ConstructError, PassClass, PassRegistry, PASS_NAME_KEY, VIEWPORT_NAME_KEY};
use indexmap::IndexMap;

/// Resolved resource names of a node's sockets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassBindings {
    /// Input socket to resource name, `_target` inputs excluded
    pub inputs: IndexMap<String, String>,
    /// Output socket to resource name
    pub outputs: IndexMap<String, String>,
    /// Input sockets bound to a placeholder because nothing is connected
    pub unconnected: Vec<String>,
}

impl PassBindings {
    /// Whether an input socket reads nothing
    pub fn is_unconnected(&self, socket: &str) -> bool {
        self.unconnected.iter().any(|s| s == socket)
    }

    /// All bindings, inputs then outputs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Flatten into one socket -> resource map
    pub fn to_map(&self) -> IndexMap<String, String> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// Builds passes from nodes using a pass-class registry
pub struct PassInstantiator<'r> {
    registry: &'r PassRegistry,
}

impl<'r> PassInstantiator<'r> {
    /// Create an instantiator backed by a registry
    pub fn new(registry: &'r PassRegistry) -> Self {
        Self { registry }
    }

    /// Build the pass for a node.
    ///
    /// `viewport_name` is empty for off-screen passes.
    pub fn instantiate(
        &self,
        node: &Node,
        bindings: PassBindings,
        viewport_name: &str,
    ) -> Result<Pass, CompileError> {
        let class = self
            .registry
            .get_pass_class(&node.title)
            .ok_or_else(|| CompileError::UnknownPassClass(node.title.clone()))?;

        let pass_name = node.display_name().to_string();
        let kwargs = keyword_arguments(node, &pass_name, &bindings, viewport_name);
        let binding_map = bindings.to_map();

        let (config, leftovers) = match class.construct(&kwargs, &binding_map) {
            Ok(config) => (config, IndexMap::new()),
            Err(ConstructError::UnexpectedParameter(key)) => {
                tracing::debug!("{} rejected '{key}', retrying with declared keywords", class.name);
                let (declared, leftovers): (IndexMap<_, _>, IndexMap<_, _>) = kwargs
                    .into_iter()
                    .partition(|(key, _)| class.catch_all || class.declares(key));
                let config = class
                    .construct(&declared, &binding_map)
                    .map_err(|err| CompileError::construction(class, err))?;
                (config, leftovers)
            }
            Err(err) => return Err(CompileError::construction(class, err)),
        };

        let attributes = leftovers
            .into_iter()
            .filter(|(key, _)| {
                key != VIEWPORT_NAME_KEY && key != PASS_NAME_KEY && !binding_map.contains_key(key)
            })
            .collect();

        let inplace = class
            .inplace
            .iter()
            .filter(|(_, input)| !bindings.is_unconnected(input))
            .filter_map(|(output, input)| {
                let output = bindings.outputs.get(output)?;
                let input = bindings.inputs.get(input)?;
                (output != input).then(|| InplaceAlias {
                    output: output.clone(),
                    input: input.clone(),
                })
            })
            .collect();

        Ok(Pass {
            class_name: class.name.clone(),
            name: pass_name,
            viewport_name: viewport_name.to_string(),
            config,
            inputs: bindings.inputs,
            outputs: bindings.outputs,
            inplace,
            attributes,
        })
    }
}

fn keyword_arguments(
    node: &Node,
    pass_name: &str,
    bindings: &PassBindings,
    viewport_name: &str,
) -> IndexMap<String, ParamValue> {
    let mut kwargs = IndexMap::new();
    kwargs.insert(PASS_NAME_KEY.to_string(), ParamValue::from(pass_name));
    for (socket, resource) in bindings.iter() {
        kwargs.insert(socket.clone(), ParamValue::from(resource.as_str()));
    }
    if !viewport_name.is_empty() {
        kwargs.insert(VIEWPORT_NAME_KEY.to_string(), ParamValue::from(viewport_name));
    }
    for (key, value) in &node.params {
        // Bindings win over a UI parameter of the same name
        kwargs.entry(key.clone()).or_insert_with(|| value.clone());
    }
    kwargs
}

/// Error building a pass from a node
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// Node title is not a registered pass class
    #[error("Unknown pass class: {0}")]
    UnknownPassClass(String),

    /// Constructor rejected the arguments
    #[error("Failed to construct {class}: {source}")]
    Construction {
        /// Pass class
        class: String,
        /// Constructor error
        source: ConstructError,
    },
}

impl CompileError {
    fn construction(class: &PassClass, source: ConstructError) -> Self {
        Self::Construction {
            class: class.name.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::builtin_pass_registry;
    use crate::node::NodeKind;
    use crate::pipeline::PassConfig;

    fn node(class: &str) -> Node {
        builtin_pass_registry()
            .get_pass_class(class)
            .map(|c| Node::new(&c.node_template()))
            .unwrap_or_else(|| Node::bare(class, NodeKind::Pass))
    }

    fn bindings(inputs: &[(&str, &str)], outputs: &[(&str, &str)]) -> PassBindings {
        let map = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(s, r)| (s.to_string(), r.to_string()))
                .collect()
        };
        PassBindings {
            inputs: map(inputs),
            outputs: map(outputs),
            unconnected: Vec::new(),
        }
    }

    #[test]
    fn test_instantiate_color_pass() {
        let instantiator = PassInstantiator::new(builtin_pass_registry());
        let node = node("ColorPass").with_param("wireframe", true);
        let pass = instantiator
            .instantiate(
                &node,
                bindings(&[("input_res", "gbuffer")], &[("output_res", "color")]),
                "main",
            )
            .unwrap();

        assert_eq!(pass.name, "ColorPass");
        assert_eq!(pass.viewport_name, "main");
        assert_eq!(pass.config, PassConfig::Color { clear: true, wireframe: true });
        assert_eq!(pass.binding("output_res"), Some("color"));
        assert!(pass.attributes.is_empty());
    }

    #[test]
    fn test_instance_name_is_pass_name() {
        let instantiator = PassInstantiator::new(builtin_pass_registry());
        let node = node("DepthPass").with_instance_name("prepass");
        let pass = instantiator
            .instantiate(&node, bindings(&[], &[("depth_res", "depth")]), "")
            .unwrap();
        assert_eq!(pass.name, "prepass");
        assert_eq!(pass.viewport_name, "");
    }

    #[test]
    fn test_undeclared_keywords_become_attributes() {
        let instantiator = PassInstantiator::new(builtin_pass_registry());
        let node = node("PresentToScreenPass").with_param("vsync", true);
        let pass = instantiator
            .instantiate(&node, bindings(&[("input_res", "color")], &[]), "main")
            .unwrap();

        assert_eq!(pass.config, PassConfig::Present);
        assert_eq!(pass.viewport_name, "main");
        assert_eq!(pass.attributes.get("vsync"), Some(&ParamValue::Bool(true)));
        assert!(!pass.attributes.contains_key("viewport_name"));
    }

    #[test]
    fn test_catch_all_receives_extras() {
        let instantiator = PassInstantiator::new(builtin_pass_registry());
        let node = node("PostProcessPass")
            .with_param("shader", "vignette.wgsl")
            .with_param("strength", 0.5);
        let pass = instantiator
            .instantiate(
                &node,
                bindings(
                    &[("input_res", "color"), ("noise_tex", "noise")],
                    &[("output_res", "post")],
                ),
                "",
            )
            .unwrap();

        let PassConfig::PostProcess { shader, uniforms } = &pass.config else {
            panic!("expected a post-process config, got {:?}", pass.config);
        };
        assert_eq!(shader, "vignette.wgsl");
        assert_eq!(uniforms.get("strength"), Some(&ParamValue::Float(0.5)));
        assert!(!uniforms.contains_key("noise_tex"));
        assert_eq!(pass.binding("noise_tex"), Some("noise"));
    }

    #[test]
    fn test_inplace_aliases_use_resource_names() {
        let instantiator = PassInstantiator::new(builtin_pass_registry());
        let pass = instantiator
            .instantiate(
                &node("SkyboxPass"),
                bindings(&[("input_res", "color")], &[("output_res", "SkyboxPass_3_output_res")]),
                "",
            )
            .unwrap();
        assert_eq!(
            pass.inplace,
            vec![InplaceAlias {
                output: "SkyboxPass_3_output_res".to_string(),
                input: "color".to_string(),
            }]
        );
    }

    #[test]
    fn test_unconnected_input_is_not_an_inplace_alias() {
        let instantiator = PassInstantiator::new(builtin_pass_registry());
        let mut bindings = bindings(
            &[("input_res", "empty_SkyboxPass_0_input_res")],
            &[("output_res", "SkyboxPass_0_output_res")],
        );
        bindings.unconnected.push("input_res".to_string());

        let pass = instantiator.instantiate(&node("SkyboxPass"), bindings, "").unwrap();
        assert!(pass.inplace.is_empty());
        assert_eq!(pass.binding("input_res"), Some("empty_SkyboxPass_0_input_res"));
    }

    #[test]
    fn test_unknown_class() {
        let instantiator = PassInstantiator::new(builtin_pass_registry());
        let err = instantiator
            .instantiate(&node("NoSuchPass"), PassBindings::default(), "")
            .unwrap_err();
        assert_eq!(err, CompileError::UnknownPassClass("NoSuchPass".to_string()));
    }

    #[test]
    fn test_invalid_declared_parameter() {
        let instantiator = PassInstantiator::new(builtin_pass_registry());
        let node = node("ShadowPass").with_param("resolution", 1000_i64);
        let err = instantiator
            .instantiate(&node, bindings(&[], &[("shadow_map", "shadows")]), "")
            .unwrap_err();
        assert!(
            matches!(err, CompileError::Construction { ref class, .. } if class == "ShadowPass")
        );
    }
}
