//! dbot-dialogue: run the dialogue bots or inspect their configuration. Config from env and optional CLI args.

use anyhow::Result;
use clap::Parser;
use dbot_cli::{load_settings, Cli, Commands};
use dbot_core::init_tracing;
use dbot_telegram::run_dialogue_bots;
use dialogue::{DialogueCoordinator, OpenAiReplyGenerator};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { token } => {
            let settings = load_settings(token)?;
            settings.validate()?;
            init_tracing(&settings.bots.log_file)?;
            info!(
                bots = settings.bots.bots.len(),
                model = %settings.llm.default_model,
                "Starting dialogue bots"
            );

            let coordinator = Arc::new(DialogueCoordinator::new(settings.dialogue));
            let generator = Arc::new(OpenAiReplyGenerator::new(&settings.llm));
            run_dialogue_bots(
                &settings.bots,
                coordinator,
                generator,
                settings.llm.system_prompt.clone(),
            )
            .await
        }
        Commands::CheckConfig => {
            let settings = load_settings(None)?;
            for line in settings.describe() {
                println!("{}", line);
            }
            match settings.validate() {
                Ok(()) => println!("config OK"),
                Err(e) => println!("config invalid: {:#}", e),
            }
            Ok(())
        }
    }
}
