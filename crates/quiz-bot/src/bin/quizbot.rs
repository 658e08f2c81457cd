//! Quiz bot command-line entry point
//!
//! # Usage
//!
//! ```bash
//! # Populate the question store from quiz files
//! quizbot populate_db
//!
//! # Run the bot on one platform (one process = one platform)
//! quizbot run --platform telegram
//! quizbot run --platform vk
//! ```
//!
//! All settings come from the environment; a missing one aborts startup with
//! a listing of everything that is not configured.

use clap::{Parser, Subcommand};
use quiz_bot::platforms::{Platform, TelegramBot, VkBot};
use quiz_bot::{Config, QuizEngine, RedisStorage};
use std::env;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "quizbot")]
#[command(about = "Quiz-playing chat bot for Telegram and VK", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Populate the question store from quiz files
    #[command(name = "populate_db")]
    PopulateDb,
    /// Run the bot on a messaging platform
    Run {
        /// Platform to run on: telegram or vk
        #[arg(long)]
        platform: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            println!("{err}");
            std::process::exit(1);
        }
    };

    // Configuration is validated before any store or transport comes up.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            println!("{err}");
            std::process::exit(1);
        }
    };

    // The platform argument is checked before the store comes up, so a bad
    // value never surfaces as a connection error.
    let platform = match &cli.command {
        Commands::PopulateDb => None,
        Commands::Run { platform } => match Platform::parse(platform) {
            Some(platform) => Some(platform),
            None => {
                println!("Unknown platform: {platform}. Please refer for help.");
                std::process::exit(1);
            }
        },
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let storage = Arc::new(RedisStorage::connect(&config.redis.connection_url()).await?);

    match platform {
        None => {
            quiz_bot::ingest::populate_db(&config, storage.as_ref()).await?;
        }
        Some(platform) => {
            let engine = QuizEngine::new(storage.clone(), storage.clone());
            match platform {
                Platform::Telegram => {
                    TelegramBot::new(&config.telegram_bot_token, engine).run().await?;
                }
                Platform::Vk => VkBot::new(&config.vk_group_token, engine).run().await?,
            }
        }
    }

    Ok(())
}
