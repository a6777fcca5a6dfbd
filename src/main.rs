//! # docsync CLI
//!
//! ```bash
//! docsync --config ./config/docsync.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsync sync` | Run one full reconciliation and print the tally |
//! | `docsync watch` | Startup reconciliation, then follow filesystem changes |
//! | `docsync search "<query>"` | Print the nearest chunks |
//! | `docsync context "<question>"` | Print the top matches as one context block |
//! | `docsync completions <shell>` | Print a shell completion script |

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use docsync::{config, logging, search, sync};

/// docsync: keep a chunk index in sync with a directory of documents.
///
/// All commands except `completions` read a TOML configuration file.
/// See `config/docsync.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docsync",
    about = "Keep a searchable chunk index in sync with a directory of documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docsync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the index with the document root once.
    ///
    /// New documents are chunked and embedded, modified ones replaced,
    /// vanished ones removed, and unchanged ones skipped.
    Sync,

    /// Reconcile once, then keep the index up to date until Ctrl-C.
    Watch,

    /// Search indexed chunks.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results.
        #[arg(long)]
        top_k: Option<usize>,

        /// Maximum distance of a result (smaller is more similar).
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Print the best matches for a question as one context block.
    Context {
        /// The question to gather context for.
        question: String,

        /// Maximum distance of a match (smaller is more similar).
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Generate a shell completion script on stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    let _log_guard = logging::init(&cfg.logging)?;

    match cli.command {
        Commands::Sync => {
            sync::run_sync(&cfg).await?;
        }
        Commands::Watch => {
            sync::run_watch(&cfg).await?;
        }
        Commands::Search {
            query,
            top_k,
            threshold,
        } => {
            search::run_search(&cfg, &query, top_k, threshold).await?;
        }
        Commands::Context {
            question,
            threshold,
        } => {
            search::run_context(&cfg, &question, threshold).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
