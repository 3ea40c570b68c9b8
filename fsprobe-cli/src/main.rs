use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fsprobe_core::tools::r#trait::ToolRequest;
use fsprobe_core::tools::registry::ToolRegistry;
use fsprobe_core::{FileSearchModule, QueryEngine, SettingsManager};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod serve;

#[derive(Parser, Debug)]
#[command(name = "fsprobe")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sandboxed, ignore-aware read-only queries over one project directory")]
struct Args {
    /// Project root every query is confined to (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Load settings from a specific TOML file
    #[arg(long, global = true, value_name = "FILE")]
    settings_path: Option<PathBuf>,

    /// Log to stderr instead of ~/.fsprobe/trace/fsprobe.log
    #[arg(long, global = true)]
    log_stderr: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the entries of a directory
    Ls {
        #[arg(default_value = ".")]
        directory: String,
    },
    /// Print a whole file
    Read { file_path: String },
    /// Print lines START..=END (1-based) of a file
    Lines {
        file_path: String,
        start_line: usize,
        end_line: usize,
    },
    /// Search file contents with a regular expression
    Grep {
        pattern: String,
        /// Directory to search (defaults to the root)
        #[arg(long)]
        directory: Option<String>,
        /// Glob restricting which files are searched (e.g. "**/*.rs")
        #[arg(long = "files", value_name = "GLOB")]
        file_pattern: Option<String>,
    },
    /// Find files by glob
    Glob {
        pattern: String,
        /// Directory to search (defaults to the root)
        #[arg(long)]
        directory: Option<String>,
    },
    /// Print the tool definitions
    Tools,
    /// Serve tool calls as newline-delimited JSON on stdin/stdout
    Serve,
}

impl Command {
    /// The tool name and arguments a one-shot command maps to.
    fn tool_call(&self) -> Option<(&'static str, Value)> {
        let call = match self {
            Command::Ls { directory } => ("ls", json!({ "directory": directory })),
            Command::Read { file_path } => ("readFile", json!({ "filePath": file_path })),
            Command::Lines {
                file_path,
                start_line,
                end_line,
            } => (
                "readFileLines",
                json!({
                    "filePath": file_path,
                    "startLine": start_line,
                    "endLine": end_line,
                }),
            ),
            Command::Grep {
                pattern,
                directory,
                file_pattern,
            } => (
                "grep",
                json!({
                    "pattern": pattern,
                    "directory": directory,
                    "filePattern": file_pattern,
                }),
            ),
            Command::Glob { pattern, directory } => (
                "glob",
                json!({ "pattern": pattern, "directory": directory }),
            ),
            Command::Tools | Command::Serve => return None,
        };
        Some(call)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = SettingsManager::load(args.settings_path.clone())?;
    setup_tracing(&settings.settings().log_filter, args.log_stderr)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let local = tokio::task::LocalSet::new();
        local.run_until(async_main(args, settings)).await
    })
}

async fn async_main(args: Args, settings: SettingsManager) -> Result<()> {
    let root = match args.root {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    info!(
        root = %root.display(),
        settings_path = ?settings.settings_path(),
        command = ?args.command,
        "fsprobe startup"
    );

    let engine = QueryEngine::with_settings(&root, settings.settings().file.clone())?;
    let registry = ToolRegistry::new(FileSearchModule::new(engine.clone()).tools());

    let Some((name, arguments)) = args.command.tool_call() else {
        return match args.command {
            Command::Serve => serve::run_stdio(registry).await,
            _ => {
                println!("{}", serde_json::to_string_pretty(&registry.definitions())?);
                Ok(())
            }
        };
    };

    // A one-shot command runs after discovery so its output is fully filtered.
    engine.ready().await;
    run_tool(&registry, name, arguments, &mut std::io::stdout()).await
}

/// Runs one tool call and prints its JSON output. A failed call is an error,
/// which makes the process exit non-zero.
async fn run_tool(
    registry: &ToolRegistry,
    name: &str,
    arguments: Value,
    out: &mut impl Write,
) -> Result<()> {
    let output = registry
        .execute(name, &ToolRequest::new(arguments, "cli"))
        .await;
    writeln!(out, "{}", serde_json::to_string_pretty(&output.to_json())?)?;

    if output.is_error() {
        bail!("{name} failed");
    }
    Ok(())
}

fn setup_tracing(default_filter: &str, to_stderr: bool) -> Result<()> {
    use tracing_subscriber::fmt;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .with_context(|| format!("Invalid log filter: {default_filter}"))?,
    };

    let (writer, log_file) = if to_stderr {
        (BoxMakeWriter::new(std::io::stderr), None)
    } else {
        // Create trace directory in user's home
        let home = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
        let trace_dir = home.join(".fsprobe").join("trace");
        fs::create_dir_all(&trace_dir)?;

        let log_file = trace_dir.join("fsprobe.log");
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)?;
        (BoxMakeWriter::new(Mutex::new(file)), Some(log_file))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter)
        .init();

    if let Some(log_file) = log_file {
        info!("Tracing initialized to {:?}", log_file);
    }
    Ok(())
}
