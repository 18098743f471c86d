//! AI TTRPG terminal client.
//!
//! A line-oriented interface to the Game Master: lifecycle commands start
//! with `/`, anything else is the player's next action. All state lives in
//! `ttrpg-core`; this binary only reads lines and renders replies.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use ttrpg_core::{
    Command, Config, GameLoop, GeminiNarrator, Reply, RestStore, SessionManager,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let store = RestStore::from_config(&config);
    let sessions = SessionManager::new(Arc::new(store)).with_retry(config.retry_policy());
    let narrator = GeminiNarrator::from_config(&config);
    let mut game =
        GameLoop::new(sessions, narrator).with_scenario_seed(config.scenario_seed.clone());

    println!("Welcome to the AI TTRPG!");
    println!(
        "Type /new to start, /resume <uuid> to continue, /list to see saved games, \
         or /help for all commands."
    );

    if let Some(uuid) = config.auto_resume {
        println!("Auto-resuming session: {uuid}");
        match game.dispatch(Command::Resume(uuid)).await {
            Ok(reply) => render(&reply),
            Err(e) => println!("[ERROR] Auto-resume failed: {e}. Starting normally."),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    prompt(&mut stdout);
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            prompt(&mut stdout);
            continue;
        }

        match game.dispatch_line(line).await {
            Ok(reply) => {
                let paused = matches!(reply, Reply::Paused { .. });
                render(&reply);
                if paused {
                    return Ok(());
                }
            }
            Err(e) => println!("[ERROR] {e}"),
        }

        prompt(&mut stdout);
    }

    Ok(())
}

fn prompt(stdout: &mut io::Stdout) {
    print!("\n> ");
    stdout.flush().ok();
}

fn render(reply: &Reply) {
    match reply {
        Reply::Started { session, opening } => {
            println!("Started a new game. Your session UUID is: {}", session.uuid);
            render_narration(opening.as_deref());
        }
        Reply::Reset { session, opening } => {
            println!(
                "Session has been reset. Your new session UUID is: {}",
                session.uuid
            );
            render_narration(opening.as_deref());
        }
        Reply::Resumed {
            session,
            recap,
            messages,
        } => {
            println!(
                "--- Session Resumed --- ({} entries, UUID {})",
                messages, session.uuid
            );
            render_narration(recap.as_deref());
        }
        Reply::Sessions(summaries) => {
            if summaries.is_empty() {
                println!("No saved sessions found.");
                return;
            }
            println!("--- Saved Sessions ---");
            for summary in summaries {
                println!(
                    "UUID: {} (Created: {}, {} messages)",
                    summary.session.uuid, summary.session.created_at, summary.message_count
                );
                if let Some(ref last) = summary.last_message {
                    println!("  \"{last}\"");
                }
            }
        }
        Reply::Deleted(uuid) => println!("Session {uuid} has been deleted."),
        Reply::Rolled(roll) => println!("You rolled a D20 and got a {}.", roll.value),
        Reply::Paused { resume_hint } => match resume_hint {
            Some(uuid) => {
                println!("Game paused. To resume, restart and use:\n/resume {uuid}");
            }
            None => println!("Exiting application."),
        },
        Reply::Help(text) => println!("{text}"),
        Reply::Narration(text) => render_narration(Some(text)),
    }
}

fn render_narration(text: Option<&str>) {
    if let Some(text) = text {
        println!("\n---------------------------------------------------\nGM:");
        println!("{text}");
    }
}
