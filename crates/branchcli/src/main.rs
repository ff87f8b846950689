// crates/branchcli/src/main.rs

use anyhow::{Context, Result};
use branchcore::{
    condition_config, Clause, ExecutionEvent, LogicalOperator, NodeEvent, NodeSpec, OperatorKind,
    Path, RoutingMode, Value, Workflow,
};
use branchnodes::standard_registry;
use branchruntime::{BranchRuntime, ExecutionGraph, RuntimeConfig, SchemaRegistry};
use clap::{Parser, Subcommand};
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "branch")]
#[command(about = "Condition routing engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Run input as a JSON document
        #[arg(short, long)]
        input: Option<String>,

        /// Downgrade clause errors to "path not matched"
        #[arg(long)]
        lenient: bool,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Runtime configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// List the variables a node can reference
    Vars {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Node id
        #[arg(short, long)]
        node: String,
    },

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    tracing_subscriber::fmt().with_env_filter(log_filter(verbose)).init();
}

fn log_filter(verbose: bool) -> EnvFilter {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let builder = EnvFilter::builder().with_default_directive(LevelFilter::from_level(level).into());
    // --verbose wins over RUST_LOG
    if verbose {
        builder.parse_lossy("")
    } else {
        builder.from_env_lossy()
    }
}

async fn load_workflow(file: &FsPath) -> Result<Workflow> {
    BranchRuntime::load_workflow(file)
        .await
        .with_context(|| format!("loading workflow {}", file.display()))
}

async fn load_runtime_config(file: Option<&FsPath>) -> Result<RuntimeConfig> {
    let Some(file) = file else {
        return Ok(RuntimeConfig::default());
    };
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading runtime config {}", file.display()))?;
    Ok(serde_json::from_str(&raw)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            lenient,
            verbose,
            config,
        } => {
            init_logging(verbose);
            run_workflow(file, input, lenient, config).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(file).await?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Vars { file, node } => {
            list_variables(file, &node).await?;
        }

        Commands::Init { output } => {
            create_example_workflow(output).await?;
        }
    }

    Ok(())
}

async fn run_workflow(
    file: PathBuf,
    input: Option<String>,
    lenient: bool,
    config: Option<PathBuf>,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let mut workflow = load_workflow(&file).await?;
    if lenient {
        workflow.settings.routing = RoutingMode::Lenient;
    }

    println!("📋 Workflow: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Edges: {}", workflow.edges.len());
    println!("   Routing: {:?}", workflow.settings.routing);
    println!();

    let input = match input {
        Some(raw) => {
            let json: serde_json::Value =
                serde_json::from_str(&raw).context("input must be valid JSON")?;
            Value::from(json)
        }
        None => Value::Null,
    };

    let runtime = BranchRuntime::with_registry(
        Arc::new(standard_registry()),
        load_runtime_config(config.as_deref()).await?,
    );

    // Subscribe to events for real-time output
    let mut events = runtime.subscribe_events();

    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::WorkflowStarted { .. } => {
                    println!("▶️  Workflow started");
                }
                ExecutionEvent::NodeStarted {
                    node_id, node_type, ..
                } => {
                    println!("  ⚡ Starting node: {} ({})", node_id, node_type);
                }
                ExecutionEvent::NodeCompleted {
                    node_id,
                    duration_ms,
                    ..
                } => {
                    println!("  ✅ Node {} completed in {}ms", node_id, duration_ms);
                }
                ExecutionEvent::NodeFailed { node_id, error, .. } => {
                    println!("  ❌ Node {} failed: {}", node_id, error);
                }
                ExecutionEvent::NodeSkipped { node_id, .. } => {
                    println!("  ⏭️  Node {} skipped", node_id);
                }
                ExecutionEvent::PathSelected {
                    node_id,
                    path_id,
                    path_name,
                    matched,
                    ..
                } => {
                    let how = if matched { "" } else { " (fallback)" };
                    println!("  🔀 {} -> {} [{}]{}", node_id, path_name, path_id, how);
                }
                ExecutionEvent::NodeEvent { node_id, event, .. } => match event {
                    NodeEvent::Info { message } => {
                        println!("     ℹ️  [{}] {}", node_id, message);
                    }
                    NodeEvent::Warning { message } => {
                        println!("     ⚠️  [{}] {}", node_id, message);
                    }
                },
                ExecutionEvent::WorkflowCompleted {
                    success,
                    duration_ms,
                    ..
                } => {
                    if success {
                        println!("✨ Workflow completed successfully in {}ms", duration_ms);
                    } else {
                        println!("💥 Workflow failed after {}ms", duration_ms);
                    }
                }
            }
        }
    });

    let outcome = runtime.execute(&workflow, input).await;
    if let Err(e) = &outcome {
        tracing::error!(workflow = %workflow.name, error = %e, "run failed");
    }

    // Wait for events to finish printing
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    let result = outcome?;

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", result.execution_id);
    println!(
        "   Completed: {}/{} nodes",
        result.completed_nodes, result.total_nodes
    );
    if !result.skipped_nodes.is_empty() {
        println!("   Skipped: {}", result.skipped_nodes.join(", "));
    }
    if !result.failed_nodes.is_empty() {
        println!("   Failed: {}", result.failed_nodes.join(", "));
    }

    if !result.routes.is_empty() {
        println!();
        println!("🔀 Routes:");
        for (node_id, path_id) in &result.routes {
            println!("   {} -> {}", node_id, path_id);
        }
    }

    if !result.outputs.is_empty() {
        println!();
        println!("📤 Outputs:");
        let mut node_ids: Vec<_> = result.outputs.keys().collect();
        node_ids.sort();
        for node_id in node_ids {
            let outputs = &result.outputs[node_id];
            if outputs.is_empty() {
                continue;
            }
            println!("   Node {}:", node_id);
            for (key, value) in outputs {
                let json = serde_json::Value::from(value.clone());
                println!("     {}: {}", key, json);
            }
        }
    }

    Ok(())
}

async fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(&file).await?;
    let registry = standard_registry();

    for spec in &workflow.nodes {
        let node = registry.create_node(spec)?;
        node.validate_config(&spec.config)
            .with_context(|| format!("node '{}'", spec.id))?;
    }

    let graph = ExecutionGraph::build(&workflow)?;
    let schemas = SchemaRegistry::from_node_registry(&registry);
    let report = branchruntime::validate(&graph, &schemas)?;

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Edges: {}", workflow.edges.len());

    if !report.is_clean() {
        println!();
        println!("⚠️  Warnings:");
        for warning in &report.warnings {
            println!("   - {}", warning);
        }
    }

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = standard_registry();
    let mut node_types = registry.list_node_types();
    node_types.sort();

    for node_type in node_types {
        if let Some(metadata) = registry.get_metadata(&node_type) {
            println!("  • {} ({})", node_type, metadata.category);
            println!("    {}", metadata.description);
            if !metadata.outputs.is_empty() {
                let names: Vec<_> = metadata.outputs.iter().map(|p| p.name.as_str()).collect();
                println!("    outputs: {}", names.join(", "));
            }
        } else {
            println!("  • {}", node_type);
        }
    }
}

async fn list_variables(file: PathBuf, node: &str) -> Result<()> {
    let workflow = load_workflow(&file).await?;
    let graph = ExecutionGraph::build(&workflow)?;
    if graph.node(node).is_none() {
        anyhow::bail!("node '{}' not found in {}", node, file.display());
    }

    let schemas = SchemaRegistry::from_node_registry(&standard_registry());
    println!("🧩 Variables available to {}:", node);
    for var in graph.available_variables(node, &schemas) {
        println!("   {{{{{}}}}}", var);
    }
    Ok(())
}

async fn create_example_workflow(output: PathBuf) -> Result<()> {
    let mut workflow = Workflow::new("Example Routing Workflow");
    workflow.description =
        Some("Routes a support message by keyword and priority".to_string());

    let form = workflow.add_node(
        NodeSpec::new("n1", "input")
            .with_display_name("form")
            .with_config("inputType", "json")
            .with_config("key", "ticket"),
    );

    let gate = workflow.add_node(
        NodeSpec::new("n2", "condition")
            .with_display_name("triage")
            .with_config_map(condition_config(
                vec![
                    Path::new("urgent", "Urgent")
                        .with_operator(LogicalOperator::Or)
                        .with_clause(Clause::new(
                            "c1",
                            "form.json.message",
                            OperatorKind::Contains,
                            "urgent",
                        ))
                        .with_clause(Clause::new(
                            "c2",
                            "{{form.json.priority}}",
                            OperatorKind::GreaterOrEqual,
                            "8",
                        )),
                    Path::new("normal", "Normal"),
                ],
                Some("route"),
            )),
    );

    let page = workflow.add_node(
        NodeSpec::new("n3", "text")
            .with_display_name("page")
            .with_config("template", "Paging on-call: {{form.json.message}}"),
    );
    let queue = workflow.add_node(
        NodeSpec::new("n4", "output")
            .with_display_name("queue")
            .with_config("value", "{{triage.route}}"),
    );

    workflow.connect(form, gate.clone());
    workflow.connect_branch(gate.clone(), "urgent", page);
    workflow.connect_branch(gate, "normal", queue);

    let json = serde_json::to_string_pretty(&workflow)?;
    tokio::fs::write(&output, json).await?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  branch run --file {} --input '{{\"ticket\": {{\"message\": \"urgent: db down\", \"priority\": 3}}}}'",
        output.display()
    );

    Ok(())
}
