//! Strata CLI - Tool for inspecting layered scene-description files.

use std::env;
use std::path::Path;
use std::sync::Arc;

use strata::compose::ComposedTree;
use strata::layer::source::JsonLayerSource;
use strata::loader::{LoadCoordinator, LoadEvent};
use strata::stats::AggregateStats;
use strata::util::NodePath;

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut verbosity = "warn";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => verbosity = "debug",
            "-vv" | "--trace" => verbosity = "trace",
            "-q" | "--quiet" => verbosity = "error",
            _ => filtered_args.push(arg),
        }
    }

    init_tracing(verbosity);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    match filtered_args[0] {
        // Info command - layer stack summary
        "info" | "i" => {
            let file = require_file(&filtered_args, "info");
            cmd_info(file);
        }

        // Tree command - show composed hierarchy
        "tree" | "t" => {
            let file = require_file(&filtered_args, "tree");
            cmd_tree(file);
        }

        // Stats command - aggregate statistics
        "stats" | "s" => {
            let file = require_file(&filtered_args, "stats");
            cmd_stats(file);
        }

        // Explain command - composition trace for one node
        "explain" | "e" => {
            let file = require_file(&filtered_args, "explain");
            let Some(path) = filtered_args.get(2) else {
                eprintln!("Error: missing node path argument");
                eprintln!("Usage: strata explain <root.json> /node/path");
                std::process::exit(1);
            };
            cmd_explain(file, path);
        }

        "help" | "-h" | "--help" => print_help(),

        other => {
            eprintln!("Error: unknown command '{}'", other);
            print_help();
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbosity: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("strata={}", verbosity)));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn print_help() {
    println!("Strata - inspector for layered scene-description files");
    println!();
    println!("Usage: strata-cli [flags] <command> [args]");
    println!();
    println!("Commands:");
    println!("  info    <root.json>          Layer stack summary");
    println!("  tree    <root.json>          Composed node hierarchy");
    println!("  stats   <root.json>          Aggregate statistics");
    println!("  explain <root.json> <path>   Composition trace for one node");
    println!();
    println!("Flags:");
    println!("  -v, --verbose   Debug logging");
    println!("  -vv, --trace    Trace logging");
    println!("  -q, --quiet     Errors only");
}

fn require_file<'a>(args: &[&'a str], command: &str) -> &'a str {
    match args.get(1) {
        Some(file) => file,
        None => {
            eprintln!("Error: missing file argument");
            eprintln!("Usage: strata {} <root.json>", command);
            std::process::exit(1);
        }
    }
}

/// Load a root layer file to completion, printing progress and warnings.
fn load_file(file: &str) -> (Arc<ComposedTree>, AggregateStats) {
    let path = Path::new(file);
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        eprintln!("Error: not a file path: {}", file);
        std::process::exit(1);
    };

    let source = Arc::new(JsonLayerSource::new(dir));
    let coordinator = LoadCoordinator::new(source);
    coordinator.load(Some(name));

    loop {
        let Some(event) = coordinator.recv_blocking() else {
            eprintln!("Error: load worker disappeared");
            std::process::exit(1);
        };
        let Some(event) = coordinator.accept(event) else {
            continue;
        };
        match event {
            LoadEvent::Progress { message, .. } => {
                tracing::info!("{}", message);
            }
            LoadEvent::Loaded { tree, stats, .. } => {
                for warning in tree.warnings() {
                    eprintln!("[WARN] {}", warning);
                }
                return (tree, stats);
            }
            LoadEvent::Failed { error, .. } => {
                eprintln!("Error: {}", error);
                std::process::exit(1);
            }
        }
    }
}

fn cmd_info(file: &str) {
    let (tree, stats) = load_file(file);

    println!("=== Layer Stack ===");
    for (i, layer) in tree.layers().iter().enumerate() {
        let marker = if i == 0 { "root" } else { "sub " };
        println!("[{}] {}", marker, layer.identifier);
        if layer.is_anonymous {
            println!("      (anonymous)");
        } else {
            println!("      path:  {}", layer.resolved_path);
        }
        println!("      specs: {}", layer.spec_count);
        if !layer.sub_layer_paths.is_empty() {
            println!("      subs:  {}", layer.sub_layer_paths.join(", "));
        }
    }

    println!();
    println!("Top-level nodes: {}", tree.root_names().join(", "));
    println!("Total nodes:     {}", stats.total_nodes);
}

fn cmd_tree(file: &str) {
    let (tree, _stats) = load_file(file);
    print_subtree(&tree, tree.root(), 0);
}

fn print_subtree(tree: &ComposedTree, node: &strata::compose::ComposedNode, depth: usize) {
    if !node.path().is_root() {
        let indent = "  ".repeat(depth - 1);
        let name = node.path().name().unwrap_or("?");
        let suffix = if node.is_unresolved() { "  [unresolved]" } else { "" };
        println!("{}{} ({}){}", indent, name, node.type_name(), suffix);
    }
    for (_, child_path) in node.children() {
        if let Some(child) = tree.get(child_path) {
            print_subtree(tree, child, depth + 1);
        }
    }
}

fn cmd_stats(file: &str) {
    let (_tree, stats) = load_file(file);

    println!("=== Statistics ===");
    println!("Total nodes:  {}", stats.total_nodes);
    println!("Mesh nodes:   {}", stats.total_mesh_nodes);
    println!("Polygons:     {}", stats.total_polygons);

    if !stats.reference_tally.is_empty() {
        println!();
        println!("=== References ===");
        for (target, count) in &stats.reference_tally {
            println!("{:>5}x {}", count, target);
        }
    }
}

fn cmd_explain(file: &str, path_str: &str) {
    let (tree, _stats) = load_file(file);
    let path = NodePath::parse(path_str);

    let Some(explanation) = strata::stats::explain_node(&tree, &path) else {
        println!("{}: not found", path);
        return;
    };

    println!("{} ({})", explanation.path, explanation.type_name);
    if explanation.unresolved {
        println!("  [unresolved arc target]");
    }

    println!();
    println!("Contributions (strongest first):");
    for line in &explanation.trace {
        println!("  {}", line);
    }

    if !explanation.attributes.is_empty() {
        println!();
        println!("Attributes:");
        for attr in &explanation.attributes {
            println!("  {} = {}  (from {})", attr.name, attr.value, attr.origin);
        }
    }
}
