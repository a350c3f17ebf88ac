//! What this player currently knows about the room

use log::{debug, info, warn};
use shared::{player_name, Frame, Outcome, PlayerCount, Stroke};

/// Last outcome announced by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    Correct(Outcome),
    Wrong(Outcome),
}

/// Something the receive loop has to react to beyond updating the view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    None,
    Correct(Outcome),
    Wrong(Outcome),
    /// The server sent DISCONNECT, e.g. because the room is full.
    Refused,
}

/// Local display state, updated from every frame the server sends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientView {
    pub player_number: Option<i32>,
    pub player_count: Option<PlayerCount>,
    /// Strokes received since the last CLEAR
    pub canvas: Vec<Stroke>,
    pub last_outcome: Option<RoundOutcome>,
}

impl ClientView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the server uses for this player, once it has told us our number.
    pub fn local_name(&self) -> Option<String> {
        self.player_number
            .and_then(|n| u32::try_from(n).ok())
            .map(player_name)
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.local_name().as_deref() == Some(name)
    }

    pub fn apply(&mut self, frame: Frame) -> ViewEvent {
        match frame {
            Frame::Draw(stroke) => {
                info!(
                    "[DRAW] ({}, {}) color:{} thick:{}",
                    stroke.x, stroke.y, stroke.color, stroke.thickness
                );
                self.canvas.push(stroke);
            }

            Frame::Clear => {
                info!("[CLEAR] {} strokes wiped", self.canvas.len());
                self.canvas.clear();
            }

            Frame::PlayerNumber { number } => {
                info!("You are {}", player_name(number.max(0) as u32));
                self.player_number = Some(number);
            }

            Frame::PlayerCount(count) => {
                info!("Players: {}/{}", count.current, count.max_players);
                self.player_count = Some(count);
            }

            Frame::Correct(outcome) => {
                info!("[CORRECT] {} guessed '{}'", outcome.name, outcome.word);
                self.last_outcome = Some(RoundOutcome::Correct(outcome.clone()));
                return ViewEvent::Correct(outcome);
            }

            Frame::Wrong(outcome) => {
                info!("[WRONG] {} guessed '{}'", outcome.name, outcome.word);
                self.last_outcome = Some(RoundOutcome::Wrong(outcome.clone()));
                return ViewEvent::Wrong(outcome);
            }

            Frame::Disconnect => {
                warn!("Server closed our session");
                return ViewEvent::Refused;
            }

            Frame::Pong => debug!("Pong"),

            Frame::Unknown { tag } => debug!("Skipping unknown frame type {}", tag),

            other => debug!("Ignoring unexpected {} from server", other.kind()),
        }

        ViewEvent::None
    }
}
