//! Operator commands.
//!
//! A single line of text is parsed into an [`OperatorCommand`] and executed
//! against the event, producing a one-line reply for the operator.
//!
//! | Command | Effect |
//! |---------|--------|
//! | `start [minutes]` | Start; without a positive duration the event runs to the end of today |
//! | `stop` | Stop and collapse every point |
//! | `status` | Active flag, point count, deadline, remaining seconds |
//! | `spawn` | One forced spawn attempt |
//! | `collapse` | Collapse every point without stopping |
//! | `reload` | Re-read the configuration |

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::TimeDelta;
use echorift_types::CollapseReason;
use tracing::info;

use crate::lifecycle::EchoEvent;

/// Command names, in help order.
pub const COMMANDS: [&str; 6] = ["start", "stop", "status", "spawn", "collapse", "reload"];

/// Durations suggested for `start`.
const START_SUGGESTIONS: [&str; 4] = ["10", "30", "60", "120"];

/// A parsed operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Start the event.
    Start {
        /// Run time in minutes. `None` runs to the end of today.
        minutes: Option<u32>,
    },
    /// Stop the event.
    Stop,
    /// Report status.
    Status,
    /// Force one spawn attempt.
    Spawn,
    /// Collapse every point.
    Collapse,
    /// Reload the configuration.
    Reload,
    /// Empty or unknown input.
    Help,
}

impl OperatorCommand {
    /// Parse a command line. Names are case-insensitive; a missing, zero
    /// or malformed duration for `start` means "until end of day".
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Self::Help;
        };
        match name.to_ascii_lowercase().as_str() {
            "start" => Self::Start {
                minutes: words
                    .next()
                    .and_then(|raw| raw.parse::<u32>().ok())
                    .filter(|m| *m > 0),
            },
            "stop" => Self::Stop,
            "status" => Self::Status,
            "spawn" => Self::Spawn,
            "collapse" => Self::Collapse,
            "reload" => Self::Reload,
            _ => Self::Help,
        }
    }

    /// Completions for a partially typed line.
    pub fn complete(line: &str) -> Vec<&'static str> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let trailing_space = line.ends_with(char::is_whitespace);
        match (words.as_slice(), trailing_space) {
            ([], _) => COMMANDS.to_vec(),
            ([partial], false) => COMMANDS
                .iter()
                .copied()
                .filter(|c| starts_with_ignore_case(c, partial))
                .collect(),
            ([name], true) if name.eq_ignore_ascii_case("start") => START_SUGGESTIONS.to_vec(),
            ([name, partial], false) if name.eq_ignore_ascii_case("start") => START_SUGGESTIONS
                .iter()
                .copied()
                .filter(|m| m.starts_with(partial))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Usage text listing every command.
pub fn help_text() -> String {
    let mut help = String::from("Echo commands:");
    for (usage, what) in [
        ("start [minutes]", "start the event"),
        ("stop", "stop the event"),
        ("status", "show event status"),
        ("spawn", "force an echo point spawn"),
        ("collapse", "collapse every echo point"),
        ("reload", "reload the configuration"),
    ] {
        let _ = write!(help, "\n  {usage:<16} {what}");
    }
    help
}

impl EchoEvent {
    /// Execute an operator command and return the reply.
    pub fn execute(self: &Arc<Self>, command: OperatorCommand) -> String {
        info!(?command, "Operator command");
        match command {
            OperatorCommand::Start { minutes } => {
                let ends_at = match minutes {
                    Some(m) => self
                        .clock
                        .now()
                        .checked_add_signed(TimeDelta::minutes(i64::from(m))),
                    None => self.end_of_today(),
                };
                if self.start(ends_at) {
                    ends_at.map_or_else(
                        || "Event started with no deadline.".to_owned(),
                        |deadline| format!("Event started, ends at {deadline}."),
                    )
                } else {
                    "Event is already running.".to_owned()
                }
            }
            OperatorCommand::Stop => {
                if self.stop() {
                    "Event stopped.".to_owned()
                } else {
                    "Event is not running.".to_owned()
                }
            }
            OperatorCommand::Status => {
                let status = self.status();
                let ends_at = status
                    .ends_at
                    .map_or_else(|| "none".to_owned(), |deadline| deadline.to_string());
                format!(
                    "EchoRift: active={}, points={}, ends-at={ends_at}, remaining={}s",
                    status.active,
                    status.zones,
                    status.remaining_seconds.unwrap_or(0),
                )
            }
            OperatorCommand::Spawn => match self.spawn_zone() {
                Ok(zone) => format!(
                    "Spawned {} echo point {} at {} {} {}.",
                    zone.distortion(),
                    zone.id(),
                    zone.world(),
                    zone.center_x(),
                    zone.center_z()
                ),
                Err(abort) => format!("No point spawned: {abort}."),
            },
            OperatorCommand::Collapse => {
                let count = self.collapse_all(CollapseReason::OpCommand);
                format!("Collapsed {count} echo points.")
            }
            OperatorCommand::Reload => {
                self.reload();
                "Configuration reloaded.".to_owned()
            }
            OperatorCommand::Help => help_text(),
        }
    }
}

fn starts_with_ignore_case(candidate: &str, prefix: &str) -> bool {
    candidate
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
