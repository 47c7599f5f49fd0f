//! Fableforge CLI: the main entry point.
//!
//! Commands:
//! - `init`    : Write a default config file
//! - `create`  : Plan a new story from a premise
//! - `generate`: Generate the next batch of episodes
//! - `feedback`: Send feedback on a pending episode
//! - `validate`: Commit the pending batch
//! - `read`    : Print a committed episode
//! - `summary` : Refresh the story teaser
//! - `status`  : Show one story's progress
//! - `list`    : List stories
//! - `delete`  : Delete a story

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "fableforge",
    about = "Fableforge: episodic story generation from a one-line premise",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Owner key scoping every story operation
    #[arg(long, global = true, default_value = "local")]
    owner: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LanguageArg {
    English,
    Hinglish,
}

impl From<LanguageArg> for fableforge_core::Language {
    fn from(value: LanguageArg) -> Self {
        match value {
            LanguageArg::English => fableforge_core::Language::English,
            LanguageArg::Hinglish => fableforge_core::Language::Hinglish,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file to ~/.fableforge/config.toml
    Init,

    /// Plan a new story from a premise
    Create {
        /// The story premise
        premise: String,

        /// Total number of episodes
        #[arg(short, long, default_value_t = 6)]
        episodes: u32,

        /// Output language
        #[arg(short, long, value_enum, default_value_t = LanguageArg::English)]
        language: LanguageArg,

        /// Park each batch for human validation instead of auto-committing
        #[arg(long)]
        human: bool,
    },

    /// Generate the next batch of episodes
    Generate {
        /// Story id
        id: String,

        /// Episodes in this batch (defaults from config)
        #[arg(short, long)]
        batch: Option<u32>,
    },

    /// Send feedback on one pending episode
    Feedback {
        /// Story id
        id: String,

        /// Episode number in the pending batch
        #[arg(short, long)]
        episode: u32,

        /// The instruction, in plain words
        instruction: String,
    },

    /// Commit the pending batch
    Validate {
        /// Story id
        id: String,
    },

    /// Print a committed episode
    Read {
        /// Story id
        id: String,

        /// Episode number
        #[arg(short, long)]
        episode: u32,
    },

    /// Refresh the story's spoiler-free teaser
    Summary {
        /// Story id
        id: String,
    },

    /// Show one story's progress
    Status {
        /// Story id
        id: String,
    },

    /// List stories
    List,

    /// Delete a story and everything attached to it
    Delete {
        /// Story id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let owner = fableforge_core::OwnerId::new(cli.owner);

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Create { premise, episodes, language, human } => {
            commands::create::run(&owner, &premise, episodes, language.into(), human).await?
        }
        Commands::Generate { id, batch } => commands::generate::run(&owner, &id, batch).await?,
        Commands::Feedback { id, episode, instruction } => {
            commands::feedback::run(&owner, &id, episode, &instruction).await?
        }
        Commands::Validate { id } => commands::validate::run(&owner, &id).await?,
        Commands::Read { id, episode } => commands::read::run(&owner, &id, episode).await?,
        Commands::Summary { id } => commands::summary::run(&owner, &id).await?,
        Commands::Status { id } => commands::status::run(&owner, &id).await?,
        Commands::List => commands::list::run(&owner).await?,
        Commands::Delete { id } => commands::delete::run(&owner, &id).await?,
    }

    Ok(())
}
