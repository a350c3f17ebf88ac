//! Frame types shared by the sketch server and its clients.
//!
//! Every frame on the wire is a 4-byte tag followed by a tag-specific
//! payload. Fixed-width payloads are plain structs; text fields are
//! length-prefixed. See [`codec`] for the byte layout.

pub mod codec;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use codec::{read_frame, write_frame};

/// Capacity a room falls back to when nobody has negotiated one yet.
pub const DEFAULT_CAPACITY: u32 = 2;

/// Port the game listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 25000;

/// Wire tag values.
pub mod tag {
    pub const DRAW: i32 = 1;
    pub const CLEAR: i32 = 2;
    pub const PING: i32 = 3;
    pub const ANSWER: i32 = 4;
    pub const CORRECT: i32 = 5;
    pub const WRONG: i32 = 6;
    pub const SET_CAPACITY: i32 = 7;
    pub const PLAYER_NUMBER: i32 = 8;
    pub const PLAYER_COUNT: i32 = 9;
    pub const DISCONNECT: i32 = 10;
    pub const PONG: i32 = 11;
}

/// One stroke sample produced by the drawing player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stroke {
    pub x: i32,
    pub y: i32,
    pub color: i32,
    pub thickness: i32,
}

/// Room occupancy as announced to every player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerCount {
    pub current: i32,
    pub max_players: i32,
}

/// Payload shared by CORRECT and WRONG notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub name: String,
    pub word: String,
}

impl Outcome {
    pub fn new(name: impl Into<String>, word: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            word: word.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Draw(Stroke),
    Clear,
    Ping,
    Pong,
    /// Sent once by the first player of a room generation, before registration.
    SetCapacity {
        max_players: i32,
    },
    /// `name` is whatever the sender claims and is informational only.
    Answer {
        name: String,
        guess: String,
    },
    Correct(Outcome),
    Wrong(Outcome),
    PlayerNumber {
        number: i32,
    },
    PlayerCount(PlayerCount),
    Disconnect,
    /// A tag this build does not know. No payload is consumed for it.
    Unknown {
        tag: i32,
    },
}

impl Frame {
    pub fn tag(&self) -> i32 {
        match self {
            Frame::Draw(_) => tag::DRAW,
            Frame::Clear => tag::CLEAR,
            Frame::Ping => tag::PING,
            Frame::Pong => tag::PONG,
            Frame::SetCapacity { .. } => tag::SET_CAPACITY,
            Frame::Answer { .. } => tag::ANSWER,
            Frame::Correct(_) => tag::CORRECT,
            Frame::Wrong(_) => tag::WRONG,
            Frame::PlayerNumber { .. } => tag::PLAYER_NUMBER,
            Frame::PlayerCount(_) => tag::PLAYER_COUNT,
            Frame::Disconnect => tag::DISCONNECT,
            Frame::Unknown { tag } => *tag,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Draw(_) => "DRAW",
            Frame::Clear => "CLEAR",
            Frame::Ping => "PING",
            Frame::Pong => "PONG",
            Frame::SetCapacity { .. } => "SET_CAPACITY",
            Frame::Answer { .. } => "ANSWER",
            Frame::Correct(_) => "CORRECT",
            Frame::Wrong(_) => "WRONG",
            Frame::PlayerNumber { .. } => "PLAYER_NUMBER",
            Frame::PlayerCount(_) => "PLAYER_COUNT",
            Frame::Disconnect => "DISCONNECT",
            Frame::Unknown { .. } => "UNKNOWN",
        }
    }
}

/// Display name the server derives from a player number.
pub fn player_name(number: u32) -> String {
    format!("player{}", number)
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The peer closed the stream cleanly between frames.
    #[error("stream closed by peer")]
    StreamClosed,
    /// The stream ended in the middle of a frame.
    #[error("stream ended after {got} of {expected} bytes")]
    ShortRead { expected: usize, got: usize },
    #[error("text field of {0} bytes does not fit a 32-bit length prefix")]
    FieldTooLong(usize),
    #[error("payload encoding failed: {0}")]
    Payload(#[from] bincode::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// True for both the clean and the mid-frame end of stream.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            ProtocolError::StreamClosed | ProtocolError::ShortRead { .. }
        )
    }
}
