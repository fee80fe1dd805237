// SPDX-License-Identifier: MIT OR Apache-2.0
//! Render graph compiler for `OrdoPlay` Editor.
//!
//! Turns the node graph authored in the render-graph editor into a
//! [`Pipeline`]: an ordered list of pass instances plus creation specs for
//! the render targets they use.
//!
//! ## Architecture
//!
//! - [`GraphDocument`] holds nodes, connections, and viewport frames
//! - [`ResourceNameResolver`] names every socket; shared names are aliases
//! - [`PassInstantiator`] builds passes through the [`PassRegistry`]
//! - [`Scheduler`] orders passes and canonicalizes in-place aliases
//! - [`ResourceSpecInferencer`] derives render target parameters
//! - [`GraphCompiler`] ties the stages together and collects diagnostics
//!
//! ```no_run
//! use ordoplay_editor_render_graph::{compile_graph, load_document};
//! use std::path::Path;
//!
//! let document = load_document(Path::new("scene.graph.json"))?;
//! let output = compile_graph(&document);
//! for diagnostic in &output.diagnostics {
//!     eprintln!("{diagnostic}");
//! }
//! println!("{}", output.pipeline.to_json_pretty()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builtin;
pub mod compiler;
pub mod config;
pub mod connection;
pub mod document;
pub mod graph;
pub mod inference;
pub mod instantiate;
pub mod node;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod schedule;
pub mod socket;
pub mod viewport;

pub use builtin::{builtin_node_registry, builtin_pass_registry};
pub use compiler::{
    compile_graph, CompileFailure, CompileOutput, CompileStage, Diagnostic, GraphCompiler, Severity,
};
pub use config::{CompilerConfig, ConfigError};
pub use connection::{Connection, ConnectionId};
pub use document::{load_document, save_document, DocumentError, SerializedGraph};
pub use graph::{ConnectionError, GraphDocument, GraphSnapshot, SharedGraph};
pub use inference::{ResourceSpecInferencer, SpecError};
pub use instantiate::{CompileError, PassBindings, PassInstantiator};
pub use node::{Node, NodeId, NodeKind, NodeRegistry, NodeTemplate, ParamValue};
pub use pipeline::{Pass, PassConfig, Pipeline, ResourceSpec, SizePolicy, TextureFormat};
pub use registry::{ConstructError, PassClass, PassRegistry};
pub use resolver::{ResolvedNames, ResourceNameResolver};
pub use schedule::{AliasSet, Schedule, ScheduleError, Scheduler, TopologicalScheduler};
pub use socket::{Socket, SocketDirection, SocketKind};
pub use viewport::ViewportFrame;
