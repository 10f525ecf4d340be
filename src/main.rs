//! Palaver - round-robin multi-agent conversations
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use palaver::cli::commands;
use palaver::{Config, ErrorPolicy, TurnPolicy};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Palaver - round-robin multi-agent conversations
#[derive(Parser, Debug)]
#[command(name = "palaver")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Backend provider (gemini, openai, hf)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model identifier for the default backend
    #[arg(long, short = 'm', global = true)]
    model: Option<String>,

    /// Turn cap
    #[arg(long, global = true)]
    max_turns: Option<usize>,

    /// Count the turn cap in full rounds of the roster
    #[arg(long, global = true)]
    per_round: bool,

    /// Keep rotating after a failed turn instead of aborting
    #[arg(long, global = true)]
    continue_on_error: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Enable debug output
    #[arg(long, short = 'd', global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a task prompt through the roster
    Run {
        /// Task prompt
        #[arg(long, short = 't', conflicts_with = "task_file")]
        task: Option<String>,

        /// Read the task prompt from a file
        #[arg(long)]
        task_file: Option<PathBuf>,
    },

    /// Analyse a diary (JSON array of records) for one user
    Diary {
        file: PathBuf,

        /// User id (defaults to the file stem)
        #[arg(long, short = 'u')]
        user: Option<String>,
    },

    /// Analyse a record set in concurrent chunks, then follow up on each analysis
    Batch {
        file: PathBuf,

        /// Records per chunk (overrides batch.chunk_size)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Skip the follow-up conversation
        #[arg(long)]
        no_followup: bool,

        /// Write every turn as JSON to this file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Score each line of a transcript
    Score { file: PathBuf },

    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file
    Init,
    /// Print the config file path
    Path,
}

fn init_logging(verbose: u8, debug: bool) {
    let level = match verbose {
        0 if !debug => "warn",
        1 if !debug => "info",
        0..=2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = Config::load()?;

    // Apply CLI overrides
    if let Some(ref provider) = args.provider {
        config.backend.provider = provider.clone();
        config.backend.api_key = None;
        config.backend.fill_api_key_from_env();
    }

    if let Some(ref model) = args.model {
        config.backend.model = model.clone();
    }

    if let Some(max_turns) = args.max_turns {
        config.conversation.max_turns = max_turns;
    }

    if args.per_round {
        config.conversation.turn_policy = TurnPolicy::PerRound;
    }

    if args.continue_on_error {
        config.conversation.on_error = ErrorPolicy::Continue;
    }

    if args.debug {
        config.debug = true;
    }

    init_logging(args.verbose, config.debug);

    if let Command::Config { ref action } = args.command {
        match action {
            ConfigAction::Show => print!("{}", commands::show_config(&config)?),
            ConfigAction::Init => {
                let path = Config::default().save()?;
                println!("Wrote default configuration to {}", path.display());
            }
            ConfigAction::Path => println!("{}", Config::config_file().display()),
        }
        return Ok(());
    }

    if let Command::Batch {
        chunk_size,
        no_followup,
        ..
    } = args.command
    {
        if let Some(size) = chunk_size {
            config.batch.chunk_size = size;
        }
        if no_followup {
            config.batch.followup = false;
        }
    }

    config.validate()?;

    // Ctrl+C cancels the running conversations
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    match args.command {
        Command::Run { task, task_file } => {
            let task = match (task, task_file) {
                (Some(task), _) => task,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                (None, None) => bail!("Provide a task with --task or --task-file"),
            };
            commands::run_task(&config, &task, &cancel).await?;
        }
        Command::Diary { file, user } => {
            commands::run_diary(&config, &file, user.as_deref(), &cancel).await?;
        }
        Command::Batch { file, output, .. } => {
            let failures = commands::run_batch(&config, &file, output.as_deref(), &cancel).await?;
            if failures > 0 {
                bail!("{} chunk(s) failed", failures);
            }
        }
        Command::Score { file } => commands::run_score(&config, &file, &cancel).await?,
        Command::Config { .. } => unreachable!("handled above"),
    }

    Ok(())
}
