mod cmd_config;
mod cmd_diff;
mod cmd_edit;
mod cmd_import;
mod cmd_init;
mod cmd_tasks;
mod output;

use clap::{Parser, Subcommand};
use gantry_ledger::{Config, GantryPaths};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "gantry",
    version,
    about = "Recover, review and edit task plans pasted from chat output"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a new .gantry/ workspace
    Init,
    /// Recover tasks from text and show what applying them would change
    Preview {
        /// Input file, or `-` for stdin
        input: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recover tasks from text and store them as the latest import
    Apply {
        /// Input file, or `-` for stdin
        input: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Diff two imports (default: latest against its predecessor)
    Diff {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List accepted imports, newest first
    Imports {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List tasks of an import
    Tasks {
        /// Import id (default: latest)
        #[arg(long)]
        import: Option<String>,
        /// Filter by status (scheduled, unscheduled, invalid_date)
        #[arg(long)]
        status: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit one task of the latest import
    Edit(cmd_edit::EditArgs),
    /// Undo the most recent edit
    Undo {
        /// Undo this history entry instead of the newest one
        #[arg(long)]
        entry: Option<i64>,
    },
    /// Redo the most recently undone edit
    Redo {
        /// Redo this history entry instead of the next one in order
        #[arg(long)]
        entry: Option<i64>,
    },
    /// Show edit history of the latest import
    History {
        /// Maximum number of entries to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage workspace configuration
    Config {
        #[command(subcommand)]
        cmd: cmd_config::ConfigCmd,
    },
}

/// Pick the tracing filter: `GANTRY_LOG`, then `RUST_LOG`, then config, then `warn`.
/// Blank or unparsable values fall through to the next source.
fn select_filter(gantry_log: Option<String>, rust_log: Option<String>, config: Option<String>) -> EnvFilter {
    [gantry_log, rust_log, config]
        .into_iter()
        .flatten()
        .find_map(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

fn init_tracing(root: &Path) {
    // An unreadable config must not stop the CLI from starting.
    let configured = Config::load(&GantryPaths::discover(root).config_json)
        .ok()
        .and_then(|c| c.log_filter);
    let filter = select_filter(
        std::env::var("GANTRY_LOG").ok(),
        std::env::var("RUST_LOG").ok(),
        configured,
    );
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn workspace_root(cwd: &Path) -> PathBuf {
    GantryPaths::find_root(cwd).unwrap_or_else(|| cwd.to_path_buf())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;
    let root = match cli.cmd {
        Command::Init => cwd.clone(),
        _ => workspace_root(&cwd),
    };
    init_tracing(&root);

    match cli.cmd {
        Command::Init => cmd_init::execute(&root),
        Command::Preview { input, json } => cmd_import::preview(&root, &input, json),
        Command::Apply { input, json } => cmd_import::apply(&root, &input, json),
        Command::Diff { from, to, json } => {
            cmd_diff::execute(&root, from.as_deref(), to.as_deref(), json)
        }
        Command::Imports { json } => cmd_tasks::imports(&root, json),
        Command::Tasks {
            import,
            status,
            json,
        } => cmd_tasks::tasks(&root, import.as_deref(), status.as_deref(), json),
        Command::Edit(args) => cmd_edit::edit(&root, &args),
        Command::Undo { entry } => cmd_edit::undo(&root, entry),
        Command::Redo { entry } => cmd_edit::redo(&root, entry),
        Command::History { limit, json } => cmd_edit::history(&root, limit, json),
        Command::Config { cmd } => cmd_config::run(cmd, &root),
    }
}
