// SPDX-License-Identifier: MIT OR Apache-2.0
//! `graphc`: compile render graph documents outside the editor.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ordoplay_editor_render_graph::config::CONFIG_FILE_NAME;
use ordoplay_editor_render_graph::{
    builtin_pass_registry, load_document, CompilerConfig, GraphCompiler,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "graphc", version, about = "OrdoPlay render graph compiler")]
struct Cli {
    /// Log every compile stage
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a graph document to a pipeline
    Compile {
        /// Path to the graph JSON file
        #[arg()]
        file: PathBuf,

        /// Compiler settings (default: render_graph.ron next to the graph, if present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the pipeline JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail when any node or resource had to be left out
        #[arg(long)]
        fail_fast: bool,
    },

    /// List the registered pass classes by category
    Classes,

    /// Write the default compiler settings
    InitConfig {
        /// Destination file
        #[arg(default_value = CONFIG_FILE_NAME)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Compile {
            file,
            config,
            output,
            fail_fast,
        } => compile(&file, config.as_deref(), output.as_deref(), fail_fast),
        Commands::Classes => {
            print_classes();
            Ok(())
        }
        Commands::InitConfig { path, force } => init_config(&path, force),
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("ordoplay_editor_render_graph={level}").parse()?)
        .add_directive(format!("graphc={level}").parse()?);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

fn compile(
    file: &Path,
    config: Option<&Path>,
    output: Option<&Path>,
    fail_fast: bool,
) -> Result<()> {
    let config = load_config(file, config)?;
    let fail_fast = fail_fast || config.fail_fast;

    let document = load_document(file)
        .with_context(|| format!("Failed to load graph {}", file.display()))?;
    let compiled = GraphCompiler::builtin().with_config(config).compile(&document);

    let pipeline = if fail_fast {
        compiled.into_result()?
    } else {
        for diagnostic in &compiled.diagnostics {
            eprintln!("{diagnostic}");
        }
        compiled.pipeline
    };

    let json = pipeline
        .to_json_pretty()
        .context("Failed to serialize pipeline")?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote pipeline '{}' to {}", pipeline.name, path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn load_config(file: &Path, explicit: Option<&Path>) -> Result<CompilerConfig> {
    if let Some(path) = explicit {
        return CompilerConfig::load(path)
            .with_context(|| format!("Failed to load settings {}", path.display()));
    }

    let beside = file
        .parent()
        .map_or_else(|| PathBuf::from(CONFIG_FILE_NAME), |dir| dir.join(CONFIG_FILE_NAME));
    if beside.is_file() {
        tracing::debug!("Using settings from {}", beside.display());
        return CompilerConfig::load(&beside)
            .with_context(|| format!("Failed to load settings {}", beside.display()));
    }
    Ok(CompilerConfig::default())
}

fn print_classes() {
    let registry = builtin_pass_registry();
    for (category, names) in registry.get_pass_categories() {
        println!("{category}");
        for name in names {
            let description = registry
                .get_pass_class(&name)
                .map_or("", |class| class.description.as_str());
            println!("  {name:<22} {description}");
        }
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    CompilerConfig::default()
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default settings to {}", path.display());
    Ok(())
}
