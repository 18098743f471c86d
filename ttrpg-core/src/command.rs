//! Command grammar and the interactive state machine.
//!
//! Input lines parse once into a [`Command`] with typed arguments; the
//! [`GameLoop`] dispatches each command against the session manager and the
//! narrator, returning render-free [`Reply`] values. Presentation stays in
//! the caller.

use crate::dice::{roll_d20, DiceRoll};
use crate::narrator::{Narrator, NarratorError};
use crate::session::{SessionError, SessionManager, SessionSummary};
use crate::transcript::{Role, Session};
use thiserror::Error;
use uuid::Uuid;

/// Static help text.
pub const HELP_TEXT: &str = "\
Available commands:
  /new                     Start a new game session.
  /resume <session-uuid>   Resume a saved game session.
  /list                    List all saved game sessions.
  /delete <session-uuid>   Delete a game session and its history.
  /reset                   Abandon the current session and start fresh.
  /roll                    Roll a D20 for a skill check.
  /pause or /exit          Pause the game; resume it later with /resume.
  /help                    Show this help message.
Anything else is sent to the Game Master as your next action.";

/// Errors from parsing one input line.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command {0} - type /help for the list")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("{command} requires a valid session uuid: {source}")]
    BadUuid {
        command: &'static str,
        source: uuid::Error,
    },
}

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New,
    Resume(Uuid),
    List,
    Delete(Uuid),
    Reset,
    Roll,
    Pause,
    Help,
    /// Free text: the player's next narrative action.
    Say(String),
}

impl Command {
    /// Parse one input line. The leading token is case-insensitive and
    /// arguments are space-delimited; anything not starting with `/` is a
    /// narrative turn.
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let line = line.trim();
        if !line.starts_with('/') {
            return Ok(Command::Say(line.to_string()));
        }

        let mut parts = line.split_whitespace();
        let head = parts.next().unwrap_or("/").to_lowercase();
        let arg = parts.next();

        match head.as_str() {
            "/new" => Ok(Command::New),
            "/resume" => parse_uuid_arg("/resume", "/resume <session-uuid>", arg)
                .map(Command::Resume),
            "/list" => Ok(Command::List),
            "/delete" => parse_uuid_arg("/delete", "/delete <session-uuid>", arg)
                .map(Command::Delete),
            "/reset" => Ok(Command::Reset),
            "/roll" => Ok(Command::Roll),
            "/pause" | "/exit" => Ok(Command::Pause),
            "/help" => Ok(Command::Help),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn parse_uuid_arg(
    command: &'static str,
    usage: &'static str,
    arg: Option<&str>,
) -> Result<Uuid, CommandError> {
    let arg = arg.ok_or(CommandError::Usage(usage))?;
    Uuid::parse_str(arg).map_err(|source| CommandError::BadUuid { command, source })
}

/// Errors from dispatching one command.
#[derive(Debug, Error)]
pub enum GameError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// The Game Master failed; any already-persisted player turn is kept.
    #[error("the Game Master did not reply: {0}")]
    Narrator(#[from] NarratorError),
}

/// Render-free outcome of one dispatched command.
#[derive(Debug)]
pub enum Reply {
    Started {
        session: Session,
        /// Opening scene, when a scenario seed triggered one.
        opening: Option<String>,
    },
    Resumed {
        session: Session,
        /// The most recent Game Master line, for re-display.
        recap: Option<String>,
        messages: usize,
    },
    Sessions(Vec<SessionSummary>),
    Deleted(Uuid),
    Reset {
        session: Session,
        opening: Option<String>,
    },
    Rolled(DiceRoll),
    Paused {
        /// Uuid to hand to `/resume` later, if a session was active.
        resume_hint: Option<Uuid>,
    },
    Help(&'static str),
    Narration(String),
}

/// Drives the session state machine over parsed commands.
///
/// Two states: no session, or exactly one active session. Every transition
/// is total; failures leave the state machine where it was.
pub struct GameLoop<N: Narrator> {
    sessions: SessionManager,
    narrator: N,
    scenario_seed: Option<String>,
}

impl<N: Narrator> GameLoop<N> {
    pub fn new(sessions: SessionManager, narrator: N) -> Self {
        Self {
            sessions,
            narrator,
            scenario_seed: None,
        }
    }

    /// Seed every new session with a system scenario message and ask the
    /// Game Master for an opening scene.
    pub fn with_scenario_seed(mut self, seed: impl Into<String>) -> Self {
        self.scenario_seed = Some(seed.into());
        self
    }

    /// The underlying session manager, for status queries.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Parse and execute one input line.
    pub async fn dispatch_line(&mut self, line: &str) -> Result<Reply, GameError> {
        let command = Command::parse(line)?;
        self.dispatch(command).await
    }

    /// Execute one parsed command.
    pub async fn dispatch(&mut self, command: Command) -> Result<Reply, GameError> {
        match command {
            Command::New => {
                let (session, opening) = self.start_session().await?;
                Ok(Reply::Started { session, opening })
            }
            Command::Reset => {
                // Only meaningful while a session is active; the abandoned
                // session stays resumable.
                if !self.sessions.is_active() {
                    return Err(SessionError::NoActiveSession.into());
                }
                let (session, opening) = self.start_session().await?;
                Ok(Reply::Reset { session, opening })
            }
            Command::Resume(uuid) => {
                let session = self.sessions.resume(uuid).await?;
                let transcript = self.sessions.transcript();
                let recap = transcript
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::Assistant)
                    .map(|m| m.content.clone());
                Ok(Reply::Resumed {
                    session,
                    recap,
                    messages: transcript.len(),
                })
            }
            Command::List => Ok(Reply::Sessions(self.sessions.session_summaries().await?)),
            Command::Delete(uuid) => {
                self.sessions.delete(uuid).await?;
                Ok(Reply::Deleted(uuid))
            }
            Command::Roll => {
                let roll = roll_d20();
                self.sessions
                    .append_utterance(Role::System, &roll.text)
                    .await?;
                Ok(Reply::Rolled(roll))
            }
            Command::Pause => {
                let resume_hint = self.sessions.active().map(|s| s.uuid);
                self.sessions.close_active();
                Ok(Reply::Paused { resume_hint })
            }
            Command::Help => Ok(Reply::Help(HELP_TEXT)),
            Command::Say(text) => {
                self.sessions.append_utterance(Role::User, &text).await?;

                // The player's turn is durable; a narrator failure from here
                // on loses only the reply.
                let reply = self.narrator.narrate(self.sessions.transcript()).await?;
                self.sessions
                    .append_utterance(Role::Assistant, &reply)
                    .await?;
                Ok(Reply::Narration(reply))
            }
        }
    }

    async fn start_session(&mut self) -> Result<(Session, Option<String>), GameError> {
        let seed = self.scenario_seed.clone();
        let session = self.sessions.start_new(seed.as_deref()).await?;

        let opening = if seed.is_some() {
            let text = self.narrator.narrate(self.sessions.transcript()).await?;
            self.sessions
                .append_utterance(Role::Assistant, &text)
                .await?;
            Some(text)
        } else {
            None
        };
        Ok((session, opening))
    }
}
