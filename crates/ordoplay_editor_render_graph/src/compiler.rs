// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph to pipeline compilation.
//!
//! [`GraphCompiler`] snapshots a [`GraphDocument`], resolves resource names,
//! instantiates one pass per pass or effect node, orders the passes with a
//! [`Scheduler`], and infers resource specs for the render targets the passes
//! use. Per-node failures never abort a compile: the node is skipped and a
//! [`Diagnostic`] is returned next to the best-effort [`Pipeline`].

use crate::builtin::builtin_pass_registry;
use crate::config::CompilerConfig;
use crate::graph::{GraphDocument, GraphSnapshot, SharedGraph};
use crate::inference::{resource_scopes, ResourceSpecInferencer};
use crate::instantiate::{PassBindings, PassInstantiator};
use crate::node::Node;
use crate::pipeline::{Pass, Pipeline, ResourceSpec};
use crate::registry::PassRegistry;
use crate::resolver::{is_fbo_resource, ResolvedNames, ResourceNameResolver};
use crate::schedule::{AliasSet, ScheduleError, Scheduler, TopologicalScheduler};
use crate::socket::SocketKind;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;

/// Stage of a compile, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileStage {
    /// Taking the snapshot
    Collecting,
    /// Assigning resource names
    NameResolving,
    /// Building passes
    Instantiating,
    /// Ordering passes
    Scheduling,
    /// Building resource specs
    SpecInferring,
    /// Finished
    Done,
}

impl fmt::Display for CompileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Collecting => "collecting",
            Self::NameResolving => "name resolving",
            Self::Instantiating => "instantiating",
            Self::Scheduling => "scheduling",
            Self::SpecInferring => "spec inferring",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Output is still complete
    Warning,
    /// Something was left out of the output
    Error,
}

/// A problem found while compiling
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Stage that reported it
    pub stage: CompileStage,
    /// Index of the node involved, if any
    pub node: Option<usize>,
    /// Message
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match self.node {
            Some(node) => write!(f, "{severity} [{}] node {node}: {}", self.stage, self.message),
            None => write!(f, "{severity} [{}]: {}", self.stage, self.message),
        }
    }
}

/// Pipeline plus whatever went wrong building it
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
    /// Best-effort pipeline
    pub pipeline: Pipeline,
    /// Diagnostics in the order they were found
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutput {
    /// Whether any error diagnostic was reported
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    /// Error diagnostics only
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error)
    }

    /// Fail-fast view: the pipeline only if nothing was left out
    pub fn into_result(self) -> Result<Pipeline, CompileFailure> {
        if self.has_errors() {
            Err(CompileFailure {
                diagnostics: self.diagnostics,
            })
        } else {
            Ok(self.pipeline)
        }
    }
}

/// Compile rejected in fail-fast mode
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error(
    "Compilation failed with {} error(s){}",
    error_count(.diagnostics),
    first_error(.diagnostics)
)]
pub struct CompileFailure {
    /// Every diagnostic of the failed compile
    pub diagnostics: Vec<Diagnostic>,
}

fn error_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count()
}

fn first_error(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .find(|d| d.severity == Severity::Error)
        .map(|d| format!(": {d}"))
        .unwrap_or_default()
}

/// Compiles graph documents into pipelines
pub struct GraphCompiler<'r> {
    registry: &'r PassRegistry,
    scheduler: Box<dyn Scheduler>,
    config: CompilerConfig,
}

impl GraphCompiler<'static> {
    /// Compiler over the built-in pass classes with default settings
    pub fn builtin() -> Self {
        Self::new(builtin_pass_registry())
    }
}

impl Default for GraphCompiler<'static> {
    fn default() -> Self {
        Self::builtin()
    }
}

impl<'r> GraphCompiler<'r> {
    /// Create a compiler over a pass registry
    pub fn new(registry: &'r PassRegistry) -> Self {
        Self {
            registry,
            scheduler: Box::new(TopologicalScheduler),
            config: CompilerConfig::default(),
        }
    }

    /// Use a different scheduler
    pub fn with_scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Box::new(scheduler);
        self
    }

    /// Use different settings
    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Current settings
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile a document
    pub fn compile(&self, document: &GraphDocument) -> CompileOutput {
        tracing::debug!("Stage: {}", CompileStage::Collecting);
        self.compile_snapshot(document.snapshot())
    }

    /// Compile a shared document; the lock is held only while copying
    pub fn compile_shared(&self, graph: &SharedGraph) -> CompileOutput {
        tracing::debug!("Stage: {}", CompileStage::Collecting);
        self.compile_snapshot(graph.snapshot())
    }

    /// Compile an already taken snapshot
    pub fn compile_snapshot(&self, snapshot: GraphSnapshot) -> CompileOutput {
        let pass_nodes = snapshot.pass_node_indices();
        if pass_nodes.is_empty() {
            tracing::debug!("No pass nodes in '{}'", snapshot.name);
            return CompileOutput {
                pipeline: Pipeline::empty(),
                diagnostics: Vec::new(),
            };
        }

        let mut run = CompileRun {
            snapshot: &snapshot,
            config: &self.config,
            diagnostics: Vec::new(),
        };

        let node_viewports = snapshot.node_viewports();

        tracing::debug!("Stage: {}", CompileStage::NameResolving);
        let resolved = ResourceNameResolver::resolve(&snapshot.nodes, &snapshot.links);
        let fbo_nodes = run.fbo_nodes(&resolved);
        let scopes = resource_scopes(&fbo_nodes, &node_viewports, resolved.target_aliases());

        tracing::debug!("Stage: {}", CompileStage::Instantiating);
        let instantiator = PassInstantiator::new(self.registry);
        let mut passes = Vec::with_capacity(pass_nodes.len());
        for index in pass_nodes {
            let node = &snapshot.nodes[index];
            let bindings = bindings_for(&resolved, index, node);
            match instantiator.instantiate(node, bindings, &node_viewports[index]) {
                Ok(pass) => {
                    tracing::debug!("Instantiated {} as '{}'", pass.class_name, pass.name);
                    passes.push(pass);
                }
                Err(err) => run.report(
                    Severity::Error,
                    CompileStage::Instantiating,
                    Some(index),
                    format!("Skipping '{}': {err}", node.display_name()),
                ),
            }
        }

        tracing::debug!("Stage: {}", CompileStage::Scheduling);
        let (passes, mut aliases) = run.schedule(self.scheduler.as_ref(), passes);

        tracing::debug!("Stage: {}", CompileStage::SpecInferring);
        let resource_specs =
            run.resource_specs(&passes, &resolved, &fbo_nodes, &scopes, &mut aliases);

        tracing::debug!("Stage: {}", CompileStage::Done);
        tracing::info!(
            "Compiled '{}': {} passes, {} resource specs, {} diagnostics",
            snapshot.name,
            passes.len(),
            resource_specs.len(),
            run.diagnostics.len()
        );

        CompileOutput {
            pipeline: Pipeline {
                name: snapshot.name.clone(),
                passes,
                resource_specs,
            },
            diagnostics: run.diagnostics,
        }
    }
}

/// Compile a document with the built-in pass classes and default settings
pub fn compile_graph(document: &GraphDocument) -> CompileOutput {
    GraphCompiler::builtin().compile(document)
}

/// Resolved non-target bindings of a node, in socket order
fn bindings_for(resolved: &ResolvedNames, index: usize, node: &Node) -> PassBindings {
    let inputs: IndexMap<String, String> = node
        .inputs
        .iter()
        .filter(|socket| !socket.is_target())
        .filter_map(|socket| {
            let name = resolved.input(index, &socket.name)?;
            Some((socket.name.clone(), name.to_string()))
        })
        .collect();
    let outputs = node
        .outputs
        .iter()
        .filter_map(|socket| {
            let name = resolved.output(index, &socket.name)?;
            Some((socket.name.clone(), name.to_string()))
        })
        .collect();
    let unconnected = inputs
        .iter()
        .filter(|(_, name)| resolved.is_placeholder(name))
        .map(|(socket, _)| socket.clone())
        .collect();
    PassBindings {
        inputs,
        outputs,
        unconnected,
    }
}

/// Per-invocation state
struct CompileRun<'a> {
    snapshot: &'a GraphSnapshot,
    config: &'a CompilerConfig,
    diagnostics: Vec<Diagnostic>,
}

impl CompileRun<'_> {
    fn report(
        &mut self,
        severity: Severity,
        stage: CompileStage,
        node: Option<usize>,
        message: String,
    ) {
        let diagnostic = Diagnostic {
            severity,
            stage,
            node,
            message,
        };
        tracing::warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    /// Resource name to the first FBO node declaring it
    fn fbo_nodes(&self, resolved: &ResolvedNames) -> IndexMap<String, usize> {
        let mut fbo_nodes: IndexMap<String, usize> = IndexMap::new();
        for (index, node) in self.snapshot.nodes.iter().enumerate() {
            if !is_fbo_resource(node) {
                continue;
            }
            let Some(name) = resolved.output(index, &node.outputs[0].name) else {
                continue;
            };
            if let Some(&first) = fbo_nodes.get(name) {
                tracing::debug!("FBO '{name}' declared again by node {index}, node {first} wins");
                continue;
            }
            fbo_nodes.insert(name.to_string(), index);
        }
        fbo_nodes
    }

    fn schedule(&mut self, scheduler: &dyn Scheduler, passes: Vec<Pass>) -> (Vec<Pass>, AliasSet) {
        let result = scheduler.schedule(&passes).and_then(|schedule| {
            check_permutation(&schedule.order, passes.len()).map(|()| schedule)
        });

        match result {
            Ok(schedule) => {
                let mut slots: Vec<Option<Pass>> = passes.into_iter().map(Some).collect();
                let ordered = schedule
                    .order
                    .iter()
                    .filter_map(|&index| slots[index].take())
                    .collect();
                (ordered, AliasSet::from_map(&schedule.canonical))
            }
            Err(err) => {
                self.report(
                    Severity::Warning,
                    CompileStage::Scheduling,
                    None,
                    format!("Scheduler failed, keeping node order: {err}"),
                );
                let aliases = AliasSet::from_passes(&passes);
                (passes, aliases)
            }
        }
    }

    fn resource_specs(
        &mut self,
        passes: &[Pass],
        resolved: &ResolvedNames,
        fbo_nodes: &IndexMap<String, usize>,
        scopes: &HashMap<String, String>,
        aliases: &mut AliasSet,
    ) -> Vec<ResourceSpec> {
        // Spec name -> (member names, consuming classes), first use order
        let mut groups: IndexMap<String, (Vec<String>, Vec<String>)> = IndexMap::new();
        for pass in passes {
            for name in pass.reads().chain(pass.writes()) {
                if resolved.is_placeholder(name) || resolved.kind(name) != Some(SocketKind::Fbo) {
                    continue;
                }
                let canonical = aliases.find(name);
                let spec_name = resolved.target_alias(&canonical).unwrap_or(&canonical);
                if resolved.is_placeholder(spec_name) {
                    continue;
                }
                let (members, consumers) = groups.entry(spec_name.to_string()).or_default();
                if !members.iter().any(|m| m == name) {
                    members.push(name.to_string());
                }
                if !consumers.contains(&pass.class_name) {
                    consumers.push(pass.class_name.clone());
                }
            }
        }

        let snapshot = self.snapshot;
        let inferencer = ResourceSpecInferencer::new(self.config);
        let mut specs = Vec::with_capacity(groups.len());
        for (name, (members, consumers)) in groups {
            let candidates =
                || std::iter::once(name.as_str()).chain(members.iter().map(String::as_str));
            let resource_node = candidates()
                .find_map(|member| fbo_nodes.get(member))
                .map(|&index| &snapshot.nodes[index]);
            let scope = candidates().find_map(|member| scopes.get(member));

            match inferencer.infer(&name, resource_node, &consumers, scope.map(String::as_str)) {
                Ok(Some(spec)) => specs.push(spec),
                Ok(None) => tracing::debug!("No spec for '{name}', using defaults"),
                Err(err) => {
                    let node = fbo_nodes.get(&name).copied();
                    self.report(
                        Severity::Error,
                        CompileStage::SpecInferring,
                        node,
                        format!("Omitting spec for '{name}': {err}"),
                    );
                }
            }
        }
        specs
    }
}

fn check_permutation(order: &[usize], len: usize) -> Result<(), ScheduleError> {
    if order.len() != len {
        return Err(ScheduleError::InvalidOrder(format!(
            "expected {len} passes, got {}",
            order.len()
        )));
    }
    let mut seen = vec![false; len];
    for &index in order {
        match seen.get_mut(index) {
            Some(slot) if !*slot => *slot = true,
            _ => {
                return Err(ScheduleError::InvalidOrder(format!(
                    "index {index} is out of range or repeated"
                )))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::builtin_node_registry;
    use crate::node::NodeKind;
    use crate::pipeline::{PassConfig, SizePolicy, TextureFormat};
    use crate::viewport::ViewportFrame;

    fn create(class: &str) -> Node {
        builtin_node_registry().create_node(class).unwrap()
    }

    struct FailingScheduler;

    impl Scheduler for FailingScheduler {
        fn schedule(&self, _passes: &[Pass]) -> Result<crate::schedule::Schedule, ScheduleError> {
            Err(ScheduleError::Cycle(Vec::new()))
        }
    }

    struct ReversingScheduler;

    impl Scheduler for ReversingScheduler {
        fn schedule(&self, passes: &[Pass]) -> Result<crate::schedule::Schedule, ScheduleError> {
            Ok(crate::schedule::Schedule {
                order: (0..passes.len()).rev().collect(),
                canonical: HashMap::new(),
            })
        }
    }

    struct TruncatingScheduler;

    impl Scheduler for TruncatingScheduler {
        fn schedule(&self, _passes: &[Pass]) -> Result<crate::schedule::Schedule, ScheduleError> {
            Ok(crate::schedule::Schedule::default())
        }
    }

    /// present <- grade (in place) <- color -> FBO "hdr"
    fn post_chain() -> GraphDocument {
        let mut doc = GraphDocument::new("chain");
        let present = doc.add_node(create("PresentToScreenPass"));
        let grade = doc.add_node(create("ColorGradingPass"));
        let color = doc.add_node(create("ColorPass"));
        let hdr =
            doc.add_node(create("FBO").with_instance_name("hdr").with_param("format", "rgba16f"));
        doc.connect(hdr, "output", color, "output_res_target").unwrap();
        doc.connect(color, "output_res", grade, "input_res").unwrap();
        doc.connect(grade, "output_res", present, "input_res").unwrap();
        doc
    }

    #[test]
    fn test_empty_graph() {
        let mut doc = GraphDocument::new("scene");
        doc.add_node(create("FBO"));
        let output = compile_graph(&doc);
        assert_eq!(output.pipeline, Pipeline::empty());
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_passes_are_scheduled() {
        let output = compile_graph(&post_chain());
        let order: Vec<&str> = output.pipeline.passes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(order, vec!["ColorPass", "ColorGradingPass", "PresentToScreenPass"]);
        assert_eq!(output.pipeline.name, "chain");
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_inplace_chain_shares_one_spec() {
        let output = compile_graph(&post_chain());
        let specs = &output.pipeline.resource_specs;
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "hdr");
        assert_eq!(specs[0].format, TextureFormat::Rgba16Float);
        assert_eq!(specs[0].samples, 1);
    }

    #[test]
    fn test_heuristic_spec_for_unnamed_target() {
        let mut doc = GraphDocument::new("scene");
        let color = doc.add_node(create("ColorPass"));
        let present = doc.add_node(create("PresentToScreenPass"));
        doc.connect(color, "output_res", present, "input_res").unwrap();

        let output = compile_graph(&doc);
        let spec = output.pipeline.resource_spec("ColorPass_0_output_res").unwrap();
        assert_eq!(spec.format, TextureFormat::Rgba16Float);
        assert_eq!(spec.samples, 4);
        assert_eq!(spec.size, SizePolicy::Viewport { scale: 1.0 });
        assert_eq!(output.pipeline.resource_specs.len(), 1);
    }

    #[test]
    fn test_unknown_class_is_skipped() {
        let mut doc = GraphDocument::new("scene");
        doc.add_node(create("DepthPass"));
        doc.add_node(Node::bare("NoSuchPass", NodeKind::Pass));

        let output = compile_graph(&doc);
        assert_eq!(output.pipeline.passes.len(), 1);
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].node, Some(1));
        assert_eq!(output.diagnostics[0].stage, CompileStage::Instantiating);
        assert!(output.clone().into_result().is_err());
    }

    #[test]
    fn test_scheduler_failure_falls_back() {
        let compiler = GraphCompiler::builtin().with_scheduler(FailingScheduler);
        let output = compiler.compile(&post_chain());

        let order: Vec<&str> = output.pipeline.passes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(order, vec!["PresentToScreenPass", "ColorGradingPass", "ColorPass"]);
        assert_eq!(output.pipeline.resource_specs.len(), 1);
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].severity, Severity::Warning);
        assert!(output.into_result().is_ok());
    }

    #[test]
    fn test_invalid_order_falls_back() {
        let compiler = GraphCompiler::builtin().with_scheduler(TruncatingScheduler);
        let output = compiler.compile(&post_chain());
        assert_eq!(output.pipeline.passes.len(), 3);
        assert_eq!(output.diagnostics[0].stage, CompileStage::Scheduling);
    }

    #[test]
    fn test_external_order_is_used() {
        let compiler = GraphCompiler::builtin().with_scheduler(ReversingScheduler);
        let output = compiler.compile(&post_chain());
        assert_eq!(output.pipeline.passes[0].name, "ColorPass");
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_malformed_fbo_omits_only_its_spec() {
        let mut doc = GraphDocument::new("scene");
        let bad =
            doc.add_node(create("FBO").with_instance_name("bad").with_param("samples", 3_i64));
        let good = doc.add_node(create("FBO").with_instance_name("good"));
        let depth = doc.add_node(create("DepthPass"));
        let color = doc.add_node(create("ColorPass"));
        doc.connect(bad, "output", depth, "depth_res_target").unwrap();
        doc.connect(good, "output", color, "output_res_target").unwrap();

        let output = compile_graph(&doc);
        assert_eq!(output.pipeline.passes.len(), 2);
        assert!(output.pipeline.resource_spec("bad").is_none());
        assert!(output.pipeline.resource_spec("good").is_some());
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].node, Some(0));
    }

    #[test]
    fn test_viewport_scopes() {
        let mut doc = GraphDocument::new("scene");
        let fbo = doc.add_node(create("FBO").with_instance_name("color").with_position(10.0, 10.0));
        let color = doc.add_node(create("ColorPass").with_position(300.0, 10.0));
        let shadow = doc.add_node(create("ShadowPass").with_position(-900.0, 10.0));
        doc.connect(fbo, "output", color, "output_res_target").unwrap();
        doc.connect(shadow, "shadow_map", color, "shadow_map").unwrap();
        doc.add_viewport_frame(ViewportFrame::new(
            "Main Viewport",
            "main",
            [0.0, 0.0],
            [800.0, 400.0],
        ));

        let pipeline = compile_graph(&doc).pipeline;
        assert_eq!(pipeline.pass("ColorPass").unwrap().viewport_name, "main");
        assert_eq!(pipeline.pass("ShadowPass").unwrap().viewport_name, "");
        assert_eq!(
            pipeline.resource_spec("color").unwrap().viewport_name.as_deref(),
            Some("main")
        );
        assert!(matches!(
            pipeline.pass("ShadowPass").unwrap().config,
            PassConfig::Shadow { resolution: 2048, cascades: 1 }
        ));
    }

    #[test]
    fn test_shared_graph_compiles_snapshot() {
        let shared = SharedGraph::new(post_chain());
        let compiler = GraphCompiler::builtin();
        let before = compiler.compile_shared(&shared);
        shared.write().name = "renamed".to_string();
        let after = compiler.compile_shared(&shared);

        assert_eq!(before.pipeline.name, "chain");
        assert_eq!(after.pipeline.name, "renamed");
        assert_eq!(before.pipeline.passes, after.pipeline.passes);
    }
}
