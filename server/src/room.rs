//! Shared room state for the sketch server
//!
//! This module owns the single piece of mutable state every session touches:
//! - The registry of connected players and the write half of their connections
//! - The secret word all answers are checked against
//! - The room capacity negotiated by the first player of a generation
//! - The "first connection" flag that decides who negotiates capacity
//!
//! All access goes through one `tokio::sync::Mutex`, see [`SharedRoom`].

use log::{info, warn};
use shared::{player_name, Frame, PlayerCount};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Room state as seen by every session task.
pub type SharedRoom = Arc<Mutex<Room>>;

/// Write side of a player's connection.
pub type FrameSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Identity of one accepted connection, assigned by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered player and the connection frames are sent through
pub struct Player {
    /// Connection this player arrived on
    pub connection: ConnectionId,
    /// Display name, always `player<number>`
    pub name: String,
    /// 1-based registration order
    pub number: u32,
    sink: FrameSink,
}

impl Player {
    fn new(connection: ConnectionId, number: u32, sink: FrameSink) -> Self {
        Self {
            connection,
            name: player_name(number),
            number,
            sink,
        }
    }

    /// Writes already-encoded frame bytes to this player.
    pub async fn send_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.sink.write_all(bytes).await?;
        self.sink.flush().await
    }

    /// Shuts down the write side so the peer observes end of stream.
    pub async fn close(mut self) {
        if let Err(e) = self.sink.shutdown().await {
            warn!("Failed to close connection of {}: {}", self.name, e);
        }
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("connection", &self.connection)
            .field("name", &self.name)
            .field("number", &self.number)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of the room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub count: usize,
    pub capacity: u32,
    pub secret_word: String,
}

impl RoomSnapshot {
    /// The PLAYER_COUNT frame announcing this snapshot.
    pub fn player_count_frame(&self) -> Frame {
        Frame::PlayerCount(PlayerCount {
            current: i32::try_from(self.count).unwrap_or(i32::MAX),
            max_players: i32::try_from(self.capacity).unwrap_or(i32::MAX),
        })
    }
}

/// Registration refused because the room already holds `capacity` players.
#[derive(Debug, Error)]
#[error("room is full ({current} of {capacity} players)")]
pub struct RoomFull {
    pub capacity: u32,
    pub current: usize,
}

/// Registry of connected players plus the round's fixed parameters
///
/// A room "generation" lasts from the room becoming empty (or process
/// start) until it is empty again. Capacity and first-connection status are
/// scoped to a generation and restored by [`Room::reset_if_empty`].
/// Player numbers keep increasing across generations.
pub struct Room {
    /// Registered players indexed by connection
    players: HashMap<ConnectionId, Player>,
    /// Word every ANSWER is compared against, fixed for the room's lifetime
    secret_word: String,
    /// Capacity restored at the start of every generation
    default_capacity: u32,
    /// Capacity of the current generation
    capacity: u32,
    /// Set while the next connection must negotiate capacity
    awaiting_first: bool,
    /// Next player number to hand out
    next_player_number: u32,
    /// Reject registrations beyond capacity instead of only logging them
    enforce_capacity: bool,
}

impl Room {
    /// Creates an empty room waiting for its first connection.
    ///
    /// A `default_capacity` of zero is treated as one so an empty room can
    /// always admit somebody.
    pub fn new(secret_word: impl Into<String>, default_capacity: u32, enforce_capacity: bool) -> Self {
        let default_capacity = default_capacity.max(1);
        Self {
            players: HashMap::new(),
            secret_word: secret_word.into(),
            default_capacity,
            capacity: default_capacity,
            awaiting_first: true,
            next_player_number: 1,
            enforce_capacity,
        }
    }

    /// Wraps the room for sharing between session tasks.
    pub fn shared(self) -> SharedRoom {
        Arc::new(Mutex::new(self))
    }

    /// Reports whether the caller is the first connection of this generation,
    /// clearing the flag so exactly one connection sees `true`.
    pub fn take_first_connection(&mut self) -> bool {
        std::mem::replace(&mut self.awaiting_first, false)
    }

    /// Applies the capacity requested by the first connection.
    ///
    /// Non-positive requests keep the default. Requests arriving after other
    /// players already registered in this generation are ignored. Returns
    /// the capacity in effect afterwards.
    pub fn set_capacity(&mut self, requested: i32) -> u32 {
        if !self.players.is_empty() {
            warn!(
                "Ignoring capacity {} requested after {} players registered",
                requested,
                self.players.len()
            );
            return self.capacity;
        }

        match u32::try_from(requested) {
            Ok(capacity) if capacity > 0 => {
                self.capacity = capacity;
                info!("Room capacity set to {}", capacity);
            }
            _ => {
                warn!(
                    "Invalid capacity {} requested, keeping {}",
                    requested, self.capacity
                );
            }
        }
        self.capacity
    }

    /// Checks whether one more player may register.
    ///
    /// Always succeeds unless capacity enforcement is enabled.
    pub fn check_admission(&self) -> Result<(), RoomFull> {
        if self.enforce_capacity && self.players.len() >= self.capacity as usize {
            return Err(RoomFull {
                capacity: self.capacity,
                current: self.players.len(),
            });
        }
        Ok(())
    }

    /// Registers a player on `connection` and returns its player number.
    ///
    /// Capacity is advisory here; exceeding it is only logged. Callers that
    /// enforce it go through [`Room::check_admission`] first.
    pub fn register(&mut self, connection: ConnectionId, sink: FrameSink) -> u32 {
        if self.players.len() >= self.capacity as usize {
            warn!(
                "Room out of capacity: registering player {} of {}",
                self.players.len() + 1,
                self.capacity
            );
        }

        let number = self.next_player_number;
        self.next_player_number += 1;

        let player = Player::new(connection, number, sink);
        info!("{} registered on connection {}", player.name, connection);
        self.players.insert(connection, player);

        number
    }

    /// Removes the player registered on `connection`, handing it back so
    /// the caller can close its connection.
    pub fn remove(&mut self, connection: ConnectionId) -> Option<Player> {
        let player = self.players.remove(&connection)?;
        info!("{} removed from room", player.name);
        Some(player)
    }

    /// Starts a new generation if nobody is left: capacity returns to the
    /// default and the next connection negotiates again. Returns true if a
    /// reset happened.
    pub fn reset_if_empty(&mut self) -> bool {
        if !self.players.is_empty() {
            return false;
        }
        self.capacity = self.default_capacity;
        self.awaiting_first = true;
        true
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            count: self.players.len(),
            capacity: self.capacity,
            secret_word: self.secret_word.clone(),
        }
    }

    /// Exact comparison against the secret word.
    pub fn is_correct(&self, guess: &str) -> bool {
        guess == self.secret_word
    }

    pub fn secret_word(&self) -> &str {
        &self.secret_word
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn player(&self, connection: ConnectionId) -> Option<&Player> {
        self.players.get(&connection)
    }

    pub(crate) fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> + '_ {
        self.players.values_mut()
    }

    /// Returns the number of registered players
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns true if no player is registered
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
