//! Fan-out of frames to registered players
//!
//! Callers pass the locked [`Room`], so every send happens while the room
//! lock is held. Broadcasts are therefore delivered to each player in the
//! order they were issued, and a slow peer delays everyone else.

use crate::room::{ConnectionId, Room};
use log::{debug, warn};
use shared::codec::encode;
use shared::{Frame, ProtocolError};
use std::io;

/// Which registered players a frame goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    All,
    AllExcept(ConnectionId),
    Only(ConnectionId),
}

impl Recipients {
    fn includes(self, connection: ConnectionId) -> bool {
        match self {
            Recipients::All => true,
            Recipients::AllExcept(excluded) => connection != excluded,
            Recipients::Only(target) => connection == target,
        }
    }
}

/// A single recipient that could not be reached.
#[derive(Debug)]
pub struct SendFailure {
    pub connection: ConnectionId,
    pub player: String,
    pub error: io::Error,
}

/// Result of one dispatch
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failures: Vec<SendFailure>,
}

pub async fn broadcast_all(room: &mut Room, frame: &Frame) -> Result<BroadcastReport, ProtocolError> {
    dispatch(room, frame, Recipients::All).await
}

pub async fn broadcast_except(
    room: &mut Room,
    frame: &Frame,
    excluded: ConnectionId,
) -> Result<BroadcastReport, ProtocolError> {
    dispatch(room, frame, Recipients::AllExcept(excluded)).await
}

pub async fn send_to(
    room: &mut Room,
    connection: ConnectionId,
    frame: &Frame,
) -> Result<BroadcastReport, ProtocolError> {
    dispatch(room, frame, Recipients::Only(connection)).await
}

/// Encodes `frame` once and writes it to every selected player in turn.
///
/// A failed send is logged and recorded, then delivery continues with the
/// remaining players. Only an encoding failure aborts before anything is sent.
pub async fn dispatch(
    room: &mut Room,
    frame: &Frame,
    recipients: Recipients,
) -> Result<BroadcastReport, ProtocolError> {
    let bytes = encode(frame)?;
    let mut report = BroadcastReport::default();

    for player in room.players_mut() {
        if !recipients.includes(player.connection) {
            continue;
        }

        match player.send_bytes(&bytes).await {
            Ok(()) => report.delivered += 1,
            Err(error) => {
                warn!("Failed to send {} to {}: {}", frame.kind(), player.name, error);
                report.failures.push(SendFailure {
                    connection: player.connection,
                    player: player.name.clone(),
                    error,
                });
            }
        }
    }

    debug!(
        "{} delivered to {} players ({} failed)",
        frame.kind(),
        report.delivered,
        report.failures.len()
    );
    Ok(report)
}
