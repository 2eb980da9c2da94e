#![forbid(unsafe_code)]

mod backend;
mod cmd;
mod http;
mod output;
mod snapshot;

use backend::Session;
use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use scena_core::api::ApiError;
use scena_core::config::{ConfigError, Overrides, resolve_config};
use scena_core::drag::DragError;
use scena_core::error::ErrorCode;
use scena_core::sync::SyncError;
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "scena",
    author,
    version,
    about = "scena: kanban and gantt board client",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Server base URL (overrides SCENA_URL and config).
    #[arg(long, global = true)]
    server: Option<String>,

    /// Project id (overrides SCENA_PROJECT and config).
    #[arg(long, global = true)]
    project: Option<String>,

    /// Bearer token (overrides SCENA_TOKEN and config).
    #[arg(long, global = true)]
    token: Option<String>,

    /// Work against a JSON snapshot file instead of a server.
    #[arg(long, global = true, value_name = "FILE")]
    snapshot: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Flag values that take precedence over env and config file.
    fn overrides(&self) -> Overrides {
        Overrides {
            server_url: self.server.clone(),
            project: self.project.clone(),
            token: self.token.clone(),
            output: self.format.map(|mode| mode.as_str().to_string()),
            json: self.json,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "Show the Kanban board",
        long_about = "Show each column with its tasks nested under their parents.",
        after_help = "EXAMPLES:\n    # Whole board\n    scena board\n\n    # One column as JSON\n    scena board --column c2 --json"
    )]
    Board(cmd::board::BoardArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show the Gantt rows",
        long_about = "Show every task nested under its parent across columns, omitting hidden tasks.",
        after_help = "EXAMPLES:\n    # Timeline rows\n    scena gantt\n\n    # Include hidden tasks\n    scena gantt --all"
    )]
    Gantt(cmd::gantt::GanttArgs),

    #[command(
        next_help_heading = "Write",
        about = "Move a task",
        long_about = "Drag a task onto another task (taking its slot) or onto a column (appending). Subtasks follow.",
        after_help = "EXAMPLES:\n    # Append to a column\n    scena move t1 --column c2\n\n    # Take another task's slot\n    scena move t1 --before t7"
    )]
    Move(cmd::move_cmd::MoveArgs),

    #[command(
        name = "reorder-columns",
        next_help_heading = "Write",
        about = "Move a column",
        after_help = "EXAMPLES:\n    # Make c3 the first column\n    scena reorder-columns c3 --onto c1"
    )]
    ReorderColumns(cmd::reorder::ReorderArgs),

    #[command(
        name = "add-task",
        next_help_heading = "Write",
        about = "Create a task",
        after_help = "EXAMPLES:\n    scena add-task \"Colour grade\" --column c2 --parent t1"
    )]
    AddTask(cmd::add::AddTaskArgs),

    #[command(
        name = "add-column",
        next_help_heading = "Write",
        about = "Create a column",
        after_help = "EXAMPLES:\n    scena add-column Review --color '#f59e0b'"
    )]
    AddColumn(cmd::add::AddColumnArgs),

    #[command(
        next_help_heading = "Read",
        about = "Poll the board",
        long_about = "Reload the board at a fixed interval and report concurrent changes.",
        after_help = "EXAMPLES:\n    scena watch --interval-ms 2000"
    )]
    Watch(cmd::watch::WatchArgs),

    #[command(next_help_heading = "Setup", about = "Show the effective configuration")]
    Config,

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    scena completions bash"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("SCENA_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "scena=debug,info"
        } else {
            "scena=info,warn"
        })
    });

    let format = env::var("SCENA_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Best code for an error chain, looking through the core's typed errors.
fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    err.chain().find_map(|cause| {
        cause
            .downcast_ref::<SyncError>()
            .map(SyncError::code)
            .or_else(|| cause.downcast_ref::<ApiError>().map(ApiError::code))
            .or_else(|| cause.downcast_ref::<DragError>().map(DragError::code))
            .or_else(|| cause.downcast_ref::<ConfigError>().map(ConfigError::code))
    })
}

fn run(cli: &Cli, output: OutputMode, session: &Session) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Board(args) => cmd::board::run_board(args, session, output),
        Commands::Gantt(args) => cmd::gantt::run_gantt(args, session, output),
        Commands::Move(args) => cmd::move_cmd::run_move(args, session, output),
        Commands::ReorderColumns(args) => cmd::reorder::run_reorder(args, session, output),
        Commands::AddTask(args) => cmd::add::run_add_task(args, session, output),
        Commands::AddColumn(args) => cmd::add::run_add_column(args, session, output),
        Commands::Watch(args) => cmd::watch::run_watch(args, session, output),
        Commands::Config => cmd::config::run_config(session, output),
        Commands::Completions(args) => cmd::completions::run_completions(args, &mut Cli::command()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let config = match resolve_config(&cli.overrides()) {
        Ok(config) => config,
        Err(err) => {
            let mode = if cli.json { OutputMode::Json } else { OutputMode::Text };
            render_error(
                mode,
                &CliError::new(format!("{err:#}")).with_code(ErrorCode::ConfigParseError),
            )?;
            std::process::exit(1);
        }
    };
    let output = OutputMode::from_resolved(&config.resolved_output);
    let session = Session {
        config,
        snapshot: cli.snapshot.clone(),
    };

    if let Err(err) = run(&cli, output, &session) {
        let mut cli_error = CliError::new(format!("{err:#}"));
        if let Some(code) = error_code(&err) {
            cli_error = cli_error.with_code(code);
        }
        render_error(output, &cli_error)?;
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::parse_from(["scena", "board", "--project", "p1", "--json"]);
        assert_eq!(cli.project.as_deref(), Some("p1"));
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Board(_)));
    }

    #[test]
    fn format_flag_becomes_output_override() {
        let cli = Cli::parse_from(["scena", "--format", "pretty", "config"]);
        let overrides = cli.overrides();
        assert_eq!(overrides.output.as_deref(), Some("pretty"));
        assert!(!overrides.json);
    }

    #[test]
    fn all_subcommands_listed() {
        let subcommands = [
            vec!["scena", "board"],
            vec!["scena", "gantt", "--all"],
            vec!["scena", "move", "t1", "--column", "c2"],
            vec!["scena", "move", "t1", "--before", "t2"],
            vec!["scena", "reorder-columns", "c3", "--onto", "c1"],
            vec!["scena", "add-task", "Grade", "--column", "c2"],
            vec!["scena", "add-column", "Review"],
            vec!["scena", "watch", "--iterations", "1"],
            vec!["scena", "config"],
            vec!["scena", "completions", "bash"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(result.is_ok(), "failed to parse {args:?}: {:?}", result.err());
        }
    }

    #[test]
    fn error_code_looks_through_context() {
        let err = anyhow::Error::new(ApiError::Storage("x".into())).context("change rolled back");
        assert_eq!(error_code(&err), Some(ErrorCode::SnapshotUnavailable));

        let err = anyhow::anyhow!(DragError::UnknownTask("t9".into()));
        assert_eq!(error_code(&err), Some(ErrorCode::TaskNotFound));

        assert_eq!(error_code(&anyhow::anyhow!("plain")), None);
    }
}
