use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use flowcanvas_core::catalog::NodeCatalog;
use flowcanvas_core::config::{
    config_path, data_dir, initialize_data_dir, resolve_relative_to, AppConfig,
};
use flowcanvas_core::export::to_json_value;
use flowcanvas_core::io::{
    load_reversed_file, load_script_via_backend, load_snapshot_file, read_catalog_file,
    write_json_file, ScriptDecompiler,
};
use flowcanvas_core::logging::{self, FileSinkPlan, LoggingInitOptions, DEFAULT_LOG_FILTER};
use flowcanvas_core::EditorState;

#[derive(Parser, Debug)]
#[command(name = "flowcanvas", about = "Headless pipeline graph editor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true,
        help = "Increase log verbosity (-v: debug, -vv: trace)"
    )]
    verbose: u8,

    #[arg(
        long = "log-filter",
        value_name = "FILTER",
        global = true,
        help = "Explicit tracing filter (overrides RUST_LOG and -v)"
    )]
    log_filter: Option<String>,

    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the execution config for a saved editor snapshot.
    Export(ExportArgs),
    /// Decompile a pipeline script through the backend into a snapshot.
    ImportScript(ImportArgs),
    /// Convert an already decompiled script payload into a snapshot.
    ImportReversed(ImportArgs),
    /// Print the nodes and edges of a saved snapshot.
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[arg(help = "Path to snapshot JSON file")]
    snapshot: PathBuf,
    #[arg(short = 'o', long, help = "Write to file instead of stdout")]
    output: Option<PathBuf>,
    #[arg(long, help = "Repository to run against (overrides [repository] default)")]
    repository: Option<String>,
}

#[derive(Args, Debug)]
struct ImportArgs {
    input: PathBuf,
    #[arg(short = 'o', long, help = "Write snapshot to file instead of stdout")]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    #[arg(help = "Path to snapshot JSON file")]
    snapshot: PathBuf,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Export(_) => "export",
            Commands::ImportScript(_) => "import-script",
            Commands::ImportReversed(_) => "import-reversed",
            Commands::Inspect(_) => "inspect",
        }
    }
}

/// Resolved runtime context shared by every command.
struct App {
    data_dir: PathBuf,
    config: AppConfig,
}

pub async fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    let resolved_data_dir = data_dir(cli.data_dir.as_deref());

    // Logging needs the configured log directory, so config problems are
    // reported once the subscriber is installed.
    let init_result = initialize_data_dir(&resolved_data_dir);
    let config_result = AppConfig::load_from_path(&config_path(&resolved_data_dir));
    let log_dir = config_result
        .as_ref()
        .map(|config| config.paths.logs_dir.clone())
        .unwrap_or_else(|_| PathBuf::from(logging::DEFAULT_LOG_DIR_NAME));

    init_logging(
        Some(resolved_data_dir.as_path()),
        log_dir,
        cli.verbose,
        cli.log_filter.as_deref(),
    );
    log_startup_metadata(cli.command.name(), &resolved_data_dir);

    if let Err(e) = init_result {
        warn!(error = %e, "Failed to initialize data directory");
    }
    let config = match config_result {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load config file, using defaults");
            AppConfig::default()
        }
    };

    let app = App {
        data_dir: resolved_data_dir,
        config,
    };
    run_command(&app, cli.command).await
}

#[cfg(test)]
fn select_log_filter(
    noise_base: &str,
    rust_log_env: Option<&str>,
    verbose: u8,
    cli_log_filter: Option<&str>,
) -> String {
    let options = LoggingInitOptions {
        verbose,
        cli_log_filter: cli_log_filter.map(ToString::to_string),
        rust_log_env: rust_log_env.map(ToString::to_string),
        noise_filter: noise_base.to_string(),
        ..Default::default()
    };

    logging::compose_logging_filters(&options).console_filter
}

fn init_logging(
    data_dir: Option<&Path>,
    log_dir: PathBuf,
    verbose: u8,
    cli_log_filter: Option<&str>,
) {
    let init_options = LoggingInitOptions {
        data_dir: data_dir.map(Path::to_path_buf),
        log_dir,
        verbose,
        cli_log_filter: cli_log_filter.map(ToString::to_string),
        rust_log_env: std::env::var("RUST_LOG").ok(),
        ..Default::default()
    };
    let init_plan = logging::compose_logging_init_plan(&init_options);
    let console_filter = init_plan.filters.console_filter;
    let file_filter = init_plan.filters.file_filter;

    match init_plan.file_sink {
        FileSinkPlan::Ready(ready) => {
            let console_env_filter = parse_env_filter_with_fallback(&console_filter, "console");
            let file_env_filter = parse_env_filter_with_fallback(&file_filter, "file");

            let subscriber = tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_filter(console_env_filter),
                )
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(ready.appender)
                        .with_filter(file_env_filter),
                );

            if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
                eprintln!(
                    "Failed to initialize tracing subscriber: {error}. Continuing without structured tracing."
                );
            }
        }
        FileSinkPlan::Fallback(fallback) => {
            let attempted_log_dir = fallback
                .attempted_log_dir
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<none>".to_string());
            let reason = fallback.reason;

            let console_env_filter = parse_env_filter_with_fallback(&console_filter, "console");
            let subscriber = tracing_subscriber::registry().with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(console_env_filter),
            );

            if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
                eprintln!(
                    "Failed to initialize tracing subscriber: {error}. Continuing without structured tracing."
                );
                return;
            }

            eprintln!(
                "Warning: persistent file logging unavailable (path: {attempted_log_dir}; reason: {reason}). Continuing with console-only logging."
            );
            warn!(
                attempted_log_dir = %attempted_log_dir,
                reason = %reason,
                "Persistent file logging unavailable; continuing with console-only logging"
            );
        }
    }
}

fn parse_env_filter_with_fallback(filter: &str, sink_name: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_new(filter).unwrap_or_else(|error| {
        eprintln!(
            "Invalid {sink_name} log filter '{filter}': {error}. Falling back to '{DEFAULT_LOG_FILTER}'."
        );
        tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)
    })
}

fn log_startup_metadata(command: &str, data_dir: &Path) {
    let pid = std::process::id();
    let cfg_path = config_path(data_dir);
    info!(
        command,
        pid,
        data_dir = %data_dir.display(),
        config_path = %cfg_path.display(),
        "Startup metadata"
    );
}

async fn run_command(app: &App, command: Commands) -> Result<()> {
    match command {
        Commands::Export(args) => {
            let mut editor = EditorState::default();
            load_snapshot_file(&mut editor, &args.snapshot).await?;

            let repository = args
                .repository
                .as_deref()
                .or_else(|| app.config.default_repository());
            let exported = editor.export_execution_config(repository)?;
            emit(args.output.as_deref(), &to_json_value(&exported)?).await
        }
        Commands::ImportScript(args) => {
            let script = tokio::fs::read_to_string(&args.input)
                .await
                .with_context(|| format!("failed to read script: {}", args.input.display()))?;
            let decompiler = ScriptDecompiler::new(&app.config.backend.url)?;
            let mut editor = EditorState::new(load_catalog(app).await?);
            load_script_via_backend(&mut editor, &decompiler, &script).await?;
            emit(args.output.as_deref(), &serde_json::to_value(editor.snapshot())?).await
        }
        Commands::ImportReversed(args) => {
            let mut editor = EditorState::new(load_catalog(app).await?);
            load_reversed_file(&mut editor, &args.input).await?;
            emit(args.output.as_deref(), &serde_json::to_value(editor.snapshot())?).await
        }
        Commands::Inspect(args) => {
            let mut editor = EditorState::default();
            load_snapshot_file(&mut editor, &args.snapshot).await?;
            print!("{}", render_summary(&editor));
            Ok(())
        }
    }
}

/// Reads the configured catalog. A missing file yields an empty catalog.
async fn load_catalog(app: &App) -> Result<NodeCatalog> {
    let path = resolve_relative_to(&app.data_dir, &app.config.paths.catalog_file);
    if !path.exists() {
        warn!(path = %path.display(), "Catalog file not found, starting with an empty catalog");
        return Ok(NodeCatalog::new());
    }
    read_catalog_file(&path).await
}

async fn emit(output: Option<&Path>, value: &serde_json::Value) -> Result<()> {
    match output {
        Some(path) => {
            write_json_file(path, value).await?;
            info!(path = %path.display(), "Output written");
        }
        None => {
            let encoded = serde_json::to_string_pretty(value).context("failed to serialize JSON")?;
            println!("{encoded}");
        }
    }
    Ok(())
}

fn render_summary(editor: &EditorState) -> String {
    let mut out = String::new();
    let mut nodes: Vec<_> = editor.graph().nodes().collect();
    nodes.sort_by(|a, b| a.name.cmp(&b.name));

    let _ = writeln!(out, "nodes: {}", nodes.len());
    for node in nodes {
        let marker = if node.selected { " *" } else { "" };
        let _ = writeln!(
            out,
            "  {} [{}] at ({}, {}){marker}",
            node.name, node.package, node.position.x, node.position.y
        );
    }

    let mut edges = editor.graph().edges();
    edges.sort();
    let _ = writeln!(out, "edges: {}", edges.len());
    for edge in edges {
        let _ = writeln!(
            out,
            "  {}.{} -> {}.{}",
            edge.from_node, edge.from_port, edge.to_node, edge.to_port
        );
    }

    match editor.graph().execution_order() {
        Ok(order) => {
            let _ = writeln!(out, "order: {}", order.join(" -> "));
        }
        Err(err) => {
            let _ = writeln!(out, "order: {err}");
        }
    }
    out
}


#[cfg(test)]
mod command_tests {
    use super::*;
    use flowcanvas_core::snapshot::UiSnapshot;

    fn app(data_dir: &Path, repository: Option<&str>) -> App {
        let mut config = AppConfig::default();
        config.repository.default = repository.map(ToString::to_string);
        App {
            data_dir: data_dir.to_path_buf(),
            config,
        }
    }

    fn catalog_json() -> serde_json::Value {
        serde_json::json!([
            {
                "package": "pkg.Source",
                "clazz": "Source",
                "output": {"out": "int"},
                "tags": {"library": "Pandas", "type": "Input"}
            },
            {
                "package": "pkg.Sink",
                "clazz": "Sink",
                "input": {"in": "int"},
                "parameter": [{"name": "path", "type": "str", "default_value": "out.csv"}],
                "tags": {"library": "Base", "type": "Output"}
            }
        ])
    }

    fn reversed_json() -> serde_json::Value {
        serde_json::json!({
            "nodes": [
                {"node": "src", "clazz": "Source", "pos": [0, 0], "params": []},
                {
                    "node": "dst",
                    "clazz": "Sink",
                    "pos": [250, 40],
                    "params": [{"key": "path", "value": "/tmp/result.csv"}]
                }
            ],
            "custom": [],
            "edges": [{"from_node": "src", "from_var": "out", "to_node": "dst", "to_var": "in"}]
        })
    }

    #[tokio::test]
    async fn import_reversed_then_export() {
        let dir = tempfile::tempdir().expect("tempdir");
        tokio::fs::write(dir.path().join("catalog.json"), catalog_json().to_string())
            .await
            .expect("write catalog");
        let reversed_path = dir.path().join("reversed.json");
        tokio::fs::write(&reversed_path, reversed_json().to_string())
            .await
            .expect("write reversed");
        let app = app(dir.path(), Some("demo"));

        let ui_path = dir.path().join("out").join("ui.json");
        run_command(
            &app,
            Commands::ImportReversed(ImportArgs {
                input: reversed_path,
                output: Some(ui_path.clone()),
            }),
        )
        .await
        .expect("import should succeed");

        let raw = tokio::fs::read_to_string(&ui_path).await.expect("read ui");
        let snapshot = UiSnapshot::from_json(&raw).expect("snapshot should parse");
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.edges.len(), 1);

        let config_path = dir.path().join("config.json");
        run_command(
            &app,
            Commands::Export(ExportArgs {
                snapshot: ui_path,
                output: Some(config_path.clone()),
                repository: None,
            }),
        )
        .await
        .expect("export should succeed");

        let raw = tokio::fs::read_to_string(&config_path)
            .await
            .expect("read config");
        let exported: serde_json::Value = serde_json::from_str(&raw).expect("config JSON");
        assert_eq!(exported["repository"], "demo");
        assert_eq!(exported["dependencies"], serde_json::json!(["base", "pandas"]));
        assert_eq!(exported["nodes"][0]["node_id"], "src");
        assert_eq!(exported["nodes"][1]["parameters"]["path"], "/tmp/result.csv");
    }

    #[tokio::test]
    async fn export_without_repository_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ui_path = dir.path().join("ui.json");
        tokio::fs::write(&ui_path, "{}").await.expect("write ui");

        let err = run_command(
            &app(dir.path(), None),
            Commands::Export(ExportArgs {
                snapshot: ui_path,
                output: Some(dir.path().join("config.json")),
                repository: None,
            }),
        )
        .await
        .expect_err("export without repository should fail");

        assert!(err.to_string().contains("repository"), "got: {err}");
        assert!(!dir.path().join("config.json").exists());
    }

    #[tokio::test]
    async fn missing_catalog_file_yields_empty_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        let catalog = load_catalog(&app(dir.path(), None))
            .await
            .expect("missing catalog is not an error");
        assert!(catalog.is_empty());
    }

    #[test]
    fn summary_lists_nodes_edges_and_order() {
        let structures =
            serde_json::from_value(catalog_json()).expect("catalog should deserialize");
        let mut editor = EditorState::new(NodeCatalog::from_structures(structures));
        let a = editor
            .create_node("pkg.Source", Default::default(), None)
            .expect("source");
        let b = editor
            .create_node("pkg.Sink", Default::default(), None)
            .expect("sink");
        editor.connect(&a.name, "out", &b.name, "in").expect("a -> b");
        editor.select(&b.name, false).expect("select sink");

        let summary = render_summary(&editor);
        assert!(summary.contains("nodes: 2"), "got: {summary}");
        assert!(summary.contains("  Sink1 [pkg.Sink] at (0, 0) *"), "got: {summary}");
        assert!(summary.contains("  Source1.out -> Sink1.in"), "got: {summary}");
        assert!(summary.contains("order: Source1 -> Sink1"), "got: {summary}");
    }
}

#[cfg(test)]
mod log_filter_tests {
    use super::*;

    const NOISE: &str = "hyper=warn,reqwest=warn";

    #[test]
    fn uses_noise_and_default_info_without_overrides() {
        let selected = select_log_filter(NOISE, None, 0, None);
        assert_eq!(selected, format!("{NOISE},info"));
    }

    #[test]
    fn uses_noise_with_rust_log_when_no_cli_overrides() {
        let selected = select_log_filter(NOISE, Some("debug"), 0, None);
        assert_eq!(selected, format!("{NOISE},debug"));
    }

    #[test]
    fn verbose_flag_overrides_rust_log() {
        let selected = select_log_filter(NOISE, Some("info"), 1, None);
        assert_eq!(selected, "debug");
    }

    #[test]
    fn double_verbose_enables_trace() {
        let selected = select_log_filter(NOISE, Some("info"), 2, None);
        assert_eq!(selected, "trace");
    }

    #[test]
    fn explicit_log_filter_has_highest_precedence() {
        let selected = select_log_filter(NOISE, Some("warn"), 2, Some("flowcanvas_core=trace"));
        assert_eq!(selected, "flowcanvas_core=trace");
    }
}
