//! Terminal front-end for the quest adventure engine.
//!
//! Plays the role of the chat platform: your terminal is the conversation.
//! Type `start` to begin an adventure; during play, every prompt reads one
//! line from stdin. Type `!end` at any prompt to wind the story down, the
//! same way a platform end-command would.

use async_trait::async_trait;
use quest_core::{
    Adventure, ContentGenerator, EndSignal, Messenger, MessengerError, PlayerStore,
    SessionConfig, SessionDispatcher,
};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

const PLAYER_STORE_PATH: &str = "players.json";

/// Messenger backed by stdin/stdout.
struct TerminalMessenger {
    lines: Lines<BufReader<Stdin>>,
    end_signal: EndSignal,
}

impl TerminalMessenger {
    fn new(lines: Lines<BufReader<Stdin>>, end_signal: EndSignal) -> Self {
        Self { lines, end_signal }
    }

    fn into_lines(self) -> Lines<BufReader<Stdin>> {
        self.lines
    }
}

#[async_trait]
impl Messenger for TerminalMessenger {
    async fn send(&mut self, text: &str) -> Result<(), MessengerError> {
        println!("{text}");
        Ok(())
    }

    async fn reply(&mut self, text: &str) -> Result<(), MessengerError> {
        println!("> {text}");
        Ok(())
    }

    async fn await_reply(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<String>, MessengerError> {
        match tokio::time::timeout(timeout, self.lines.next_line()).await {
            Err(_) => Ok(None),
            Ok(Ok(Some(line))) => {
                if line.trim() == "!end" {
                    self.end_signal.trigger();
                    println!("Winding the story down...");
                    return Ok(None);
                }
                Ok(Some(line))
            }
            Ok(Ok(None)) => Err(MessengerError::Closed),
            Ok(Err(error)) => Err(error.into()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quest=info,quest_core=info".into()),
        )
        .init();

    // Missing credentials are the one fatal startup error.
    let mut generator = match ContentGenerator::from_env() {
        Ok(generator) => Some(generator),
        Err(_) => {
            eprintln!("Error: MISTRAL_API_KEY environment variable not set.");
            eprintln!("Set it in a .env file or with: export MISTRAL_API_KEY=your_key_here");
            std::process::exit(1);
        }
    };

    let user_id = std::env::var("USER").unwrap_or_else(|_| "local-player".to_string());
    let store = PlayerStore::new(PLAYER_STORE_PATH);
    let mut dispatcher = SessionDispatcher::new();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("=== Quest ===");
    println!("Type 'start' to begin an adventure, 'quit' to leave.");

    loop {
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "start" => {
                let Some(token) = dispatcher.begin(user_id.as_str()) else {
                    println!("An adventure is already running!");
                    continue;
                };

                println!("Starting the game...");

                let messenger = TerminalMessenger::new(lines, token.end_signal.clone());
                let mut adventure = Adventure::new(messenger, SessionConfig::new())
                    .with_store(store.clone(), token.user_id.clone())
                    .with_end_signal(token.end_signal.clone());
                if let Some(content) = generator.take() {
                    adventure = adventure.with_generator(Box::new(content));
                }

                match adventure.run().await {
                    Ok(outcome) => tracing::info!(?outcome, "adventure finished"),
                    Err(error) => tracing::error!(%error, "adventure aborted"),
                }

                dispatcher.finish(&token.user_id);
                lines = adventure.into_messenger().into_lines();
                generator = ContentGenerator::from_env().ok();

                println!("Type 'start' for another adventure, 'quit' to leave.");
            }
            "quit" | "exit" => break,
            "" => {}
            other => {
                println!("Unknown command '{other}'. Type 'start' or 'quit'.");
            }
        }
    }

    println!("Farewell, adventurer.");
    Ok(())
}
