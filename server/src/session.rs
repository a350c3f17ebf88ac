//! Per-connection control loop
//!
//! A session moves through three states:
//!
//! - **Awaiting capacity**: only for the first connection of a room
//!   generation. Exactly one SET_CAPACITY frame must arrive before the
//!   player is registered; anything else ends the session unregistered.
//! - **Active**: the player is registered, has been told its number, and
//!   everybody has seen the new PLAYER_COUNT. Frames are read and handled
//!   one at a time until the player answers correctly, disconnects, or the
//!   stream ends.
//! - **Terminated**: the player is removed, its connection closed, and the
//!   room reset if it became empty.
//!
//! A correct answer only ends the answering session. Other players keep
//! drawing and guessing; there is no room-wide "round over" state.

use crate::broadcast::{broadcast_all, broadcast_except, send_to};
use crate::room::{ConnectionId, Room, RoomFull, SharedRoom};
use log::{debug, info, warn};
use shared::{read_frame, write_frame, Frame, Outcome, ProtocolError};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// How a session that reached the active state came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The player guessed the secret word.
    Answered,
    /// The player sent DISCONNECT.
    Disconnected,
    /// The peer closed the stream between frames.
    Closed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("first message had tag {tag}, expected SET_CAPACITY")]
    MalformedFirstMessage { tag: i32 },
    #[error("failed to read SET_CAPACITY: {0}")]
    FirstMessageRead(#[source] ProtocolError),
    #[error(transparent)]
    RoomFull(#[from] RoomFull),
    #[error("connection failed: {0}")]
    Protocol(#[from] ProtocolError),
}

enum Step {
    Continue,
    Terminate(SessionEnd),
}

/// Runs one player's session to completion.
///
/// `first` is the listener's verdict on whether this connection opens a new
/// room generation. The reader and writer are the two halves of the
/// player's connection; both are closed by the time this returns.
pub async fn run_session<R, W>(
    room: SharedRoom,
    connection: ConnectionId,
    mut reader: R,
    writer: W,
    first: bool,
) -> Result<SessionEnd, SessionError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Send + Unpin + 'static,
{
    if first {
        match negotiate_capacity(&mut reader).await {
            Ok(requested) => {
                room.lock().await.set_capacity(requested);
            }
            Err(e) => {
                warn!("Connection {} rejected: {}", connection, e);
                room.lock().await.reset_if_empty();
                return Err(e);
            }
        }
    }

    let name = admit(&room, connection, writer).await?;
    let result = active_loop(&room, connection, &name, &mut reader).await;
    terminate(&room, connection).await;

    match &result {
        Ok(end) => info!("{} session ended: {:?}", name, end),
        Err(e) => info!("{} session failed: {}", name, e),
    }
    result
}

async fn negotiate_capacity<R>(reader: &mut R) -> Result<i32, SessionError>
where
    R: AsyncRead + Unpin,
{
    match read_frame(reader).await {
        Ok(Frame::SetCapacity { max_players }) => Ok(max_players),
        Ok(other) => Err(SessionError::MalformedFirstMessage { tag: other.tag() }),
        Err(e) => Err(SessionError::FirstMessageRead(e)),
    }
}

/// Registers the player, sends its number, and announces the new count.
///
/// All three happen under one lock acquisition so no other frame can reach
/// the new player before its PLAYER_NUMBER.
async fn admit<W>(room: &SharedRoom, connection: ConnectionId, mut writer: W) -> Result<String, SessionError>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    let mut room = room.lock().await;

    if let Err(full) = room.check_admission() {
        warn!("Connection {} refused: {}", connection, full);
        if let Err(e) = write_frame(&mut writer, &Frame::Disconnect).await {
            debug!("Could not notify connection {}: {}", connection, e);
        }
        if let Err(e) = writer.shutdown().await {
            debug!("Could not close connection {}: {}", connection, e);
        }
        return Err(full.into());
    }

    let number = room.register(connection, Box::new(writer));
    let name = shared::player_name(number);

    // registration stands even if the welcome does not arrive
    if let Err(e) = announce(&mut room, connection, number).await {
        warn!("Failed to announce {}: {}", name, e);
    }
    Ok(name)
}

async fn announce(room: &mut Room, connection: ConnectionId, number: u32) -> Result<(), ProtocolError> {
    let number = i32::try_from(number).unwrap_or(i32::MAX);
    send_to(room, connection, &Frame::PlayerNumber { number }).await?;

    let count = room.snapshot().player_count_frame();
    broadcast_all(room, &count).await?;
    Ok(())
}

async fn active_loop<R>(
    room: &SharedRoom,
    connection: ConnectionId,
    name: &str,
    reader: &mut R,
) -> Result<SessionEnd, SessionError>
where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = match read_frame(reader).await {
            Ok(frame) => frame,
            Err(ProtocolError::StreamClosed) => return Ok(SessionEnd::Closed),
            Err(e) => return Err(e.into()),
        };
        debug!("{} sent {}", name, frame.kind());

        match handle_frame(room, connection, name, frame).await? {
            Step::Continue => {}
            Step::Terminate(end) => return Ok(end),
        }
    }
}

async fn handle_frame(
    room: &SharedRoom,
    connection: ConnectionId,
    name: &str,
    frame: Frame,
) -> Result<Step, ProtocolError> {
    match frame {
        Frame::Draw(_) | Frame::Clear => {
            let mut room = room.lock().await;
            broadcast_except(&mut room, &frame, connection).await?;
        }

        Frame::Answer { guess, .. } => {
            let mut room = room.lock().await;
            if room.is_correct(&guess) {
                info!("{} guessed the word: {}", name, guess);
                broadcast_all(&mut room, &Frame::Correct(Outcome::new(name, guess))).await?;
                return Ok(Step::Terminate(SessionEnd::Answered));
            }

            info!("{} guessed wrong: {}", name, guess);
            broadcast_all(&mut room, &Frame::Wrong(Outcome::new(name, guess))).await?;
        }

        Frame::Ping => {
            let mut room = room.lock().await;
            send_to(&mut room, connection, &Frame::Pong).await?;
        }

        Frame::Disconnect => return Ok(Step::Terminate(SessionEnd::Disconnected)),

        Frame::Unknown { tag } => {
            warn!("{} sent unknown frame type {}, skipping", name, tag);
        }

        other => {
            debug!("Ignoring {} from {}", other.kind(), name);
        }
    }

    Ok(Step::Continue)
}

/// Removes the player, closes its connection, and either resets the empty
/// room or tells the remaining players the new count.
async fn terminate(room: &SharedRoom, connection: ConnectionId) {
    let mut room = room.lock().await;

    if let Some(player) = room.remove(connection) {
        player.close().await;
    }

    if room.reset_if_empty() {
        info!("Room is empty, next connection starts a new generation");
        return;
    }

    let count = room.snapshot().player_count_frame();
    if let Err(e) = broadcast_all(&mut room, &count).await {
        warn!("Failed to announce departure: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{PlayerCount, Stroke};
    use std::time::Duration;
    use tokio::io::DuplexStream;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    type SessionHandle = JoinHandle<Result<SessionEnd, SessionError>>;

    /// Connects a new in-memory peer the way the listener would.
    async fn connect(room: &SharedRoom, id: u64) -> (DuplexStream, SessionHandle) {
        let first = room.lock().await.take_first_connection();
        let (peer, server_side) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(server_side);
        let handle = tokio::spawn(run_session(
            room.clone(),
            ConnectionId(id),
            reader,
            writer,
            first,
        ));
        (peer, handle)
    }

    async fn send(peer: &mut DuplexStream, frame: Frame) {
        write_frame(peer, &frame).await.unwrap();
    }

    async fn next_frame(peer: &mut DuplexStream) -> Frame {
        timeout(Duration::from_secs(2), read_frame(peer))
            .await
            .expect("timed out waiting for frame")
            .expect("failed to read frame")
    }

    async fn finished(handle: SessionHandle) -> Result<SessionEnd, SessionError> {
        timeout(Duration::from_secs(2), handle)
            .await
            .expect("session did not finish")
            .expect("session panicked")
    }

    fn count(current: i32, max_players: i32) -> Frame {
        Frame::PlayerCount(PlayerCount {
            current,
            max_players,
        })
    }

    /// Registers a first player with `capacity` and drains its welcome.
    async fn open_room(room: &SharedRoom, capacity: i32) -> (DuplexStream, SessionHandle) {
        let (mut peer, handle) = connect(room, 1).await;
        send(&mut peer, Frame::SetCapacity { max_players: capacity }).await;
        assert_eq!(next_frame(&mut peer).await, Frame::PlayerNumber { number: 1 });
        assert_eq!(next_frame(&mut peer).await, count(1, capacity));
        (peer, handle)
    }

    async fn join(
        room: &SharedRoom,
        id: u64,
        number: i32,
        existing: &mut [&mut DuplexStream],
        expected: Frame,
    ) -> (DuplexStream, SessionHandle) {
        let (mut peer, handle) = connect(room, id).await;
        assert_eq!(next_frame(&mut peer).await, Frame::PlayerNumber { number });
        assert_eq!(next_frame(&mut peer).await, expected);
        for other in existing.iter_mut() {
            assert_eq!(next_frame(other).await, expected);
        }
        (peer, handle)
    }

    #[tokio::test]
    async fn test_first_connection_negotiates_capacity() {
        let room = Room::new("apple", 2, false).shared();
        let (_peer, _handle) = open_room(&room, 3).await;

        let room = room.lock().await;
        assert_eq!(room.capacity(), 3);
        assert_eq!(room.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_first_message_rejects_without_registering() {
        let room = Room::new("apple", 2, false).shared();
        let (mut peer, handle) = connect(&room, 1).await;

        send(&mut peer, Frame::Ping).await;

        let err = finished(handle).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::MalformedFirstMessage { tag } if tag == shared::tag::PING
        ));
        let mut room = room.lock().await;
        assert!(room.is_empty());
        assert!(room.take_first_connection());
    }

    #[tokio::test]
    async fn test_short_first_message_rejects() {
        let room = Room::new("apple", 2, false).shared();
        let (mut peer, handle) = connect(&room, 1).await;

        peer.write_all(&shared::tag::SET_CAPACITY.to_le_bytes()).await.unwrap();
        peer.write_all(&[3, 0]).await.unwrap();
        drop(peer);

        let err = finished(handle).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::FirstMessageRead(ProtocolError::ShortRead { .. })
        ));
        assert!(room.lock().await.take_first_connection());
    }

    #[tokio::test]
    async fn test_capacity_arriving_after_another_registration_is_dropped() {
        let room = Room::new("apple", 2, false).shared();
        let (mut first, _h1) = connect(&room, 1).await;
        let (mut second, _h2) = connect(&room, 2).await;

        // the second connection registers while the first is still negotiating
        assert_eq!(next_frame(&mut second).await, Frame::PlayerNumber { number: 1 });
        assert_eq!(next_frame(&mut second).await, count(1, 2));

        send(&mut first, Frame::SetCapacity { max_players: 5 }).await;
        assert_eq!(next_frame(&mut first).await, Frame::PlayerNumber { number: 2 });
        assert_eq!(next_frame(&mut first).await, count(2, 2));
        assert_eq!(next_frame(&mut second).await, count(2, 2));
        assert_eq!(room.lock().await.capacity(), 2);
    }

    #[tokio::test]
    async fn test_each_registration_broadcasts_count() {
        let room = Room::new("apple", 2, false).shared();
        let (mut p1, _h1) = open_room(&room, 4).await;
        let (mut p2, _h2) = join(&room, 2, 2, &mut [&mut p1], count(2, 4)).await;
        let (_p3, _h3) = join(&room, 3, 3, &mut [&mut p1, &mut p2], count(3, 4)).await;
    }

    #[tokio::test]
    async fn test_draw_is_relayed_without_echo() {
        let room = Room::new("apple", 2, false).shared();
        let (mut p1, _h1) = open_room(&room, 3).await;
        let (mut p2, _h2) = join(&room, 2, 2, &mut [&mut p1], count(2, 3)).await;
        let (mut p3, _h3) = join(&room, 3, 3, &mut [&mut p1, &mut p2], count(3, 3)).await;

        let stroke = Frame::Draw(Stroke {
            x: 10,
            y: 7,
            color: 7,
            thickness: 2,
        });
        send(&mut p1, stroke.clone()).await;
        send(&mut p1, Frame::Clear).await;

        assert_eq!(next_frame(&mut p2).await, stroke);
        assert_eq!(next_frame(&mut p2).await, Frame::Clear);
        assert_eq!(next_frame(&mut p3).await, stroke);
        assert_eq!(next_frame(&mut p3).await, Frame::Clear);

        send(&mut p1, Frame::Ping).await;
        assert_eq!(next_frame(&mut p1).await, Frame::Pong);
    }

    #[tokio::test]
    async fn test_wrong_answer_keeps_session_active() {
        let room = Room::new("apple", 2, false).shared();
        let (mut p1, h1) = open_room(&room, 2).await;
        let (mut p2, _h2) = join(&room, 2, 2, &mut [&mut p1], count(2, 2)).await;

        send(
            &mut p2,
            Frame::Answer {
                name: "whoever".to_string(),
                guess: "pear".to_string(),
            },
        )
        .await;

        let wrong = Frame::Wrong(Outcome::new("player2", "pear"));
        assert_eq!(next_frame(&mut p1).await, wrong);
        assert_eq!(next_frame(&mut p2).await, wrong);

        send(&mut p2, Frame::Ping).await;
        assert_eq!(next_frame(&mut p2).await, Frame::Pong);

        send(&mut p1, Frame::Disconnect).await;
        assert_eq!(finished(h1).await.unwrap(), SessionEnd::Disconnected);
        assert_eq!(next_frame(&mut p2).await, count(1, 2));
    }

    #[tokio::test]
    async fn test_correct_answer_ends_only_answering_session() {
        let room = Room::new("apple", 2, false).shared();
        let (mut p1, _h1) = open_room(&room, 2).await;
        let (mut p2, h2) = join(&room, 2, 2, &mut [&mut p1], count(2, 2)).await;

        send(
            &mut p2,
            Frame::Answer {
                name: String::new(),
                guess: "apple".to_string(),
            },
        )
        .await;

        let correct = Frame::Correct(Outcome::new("player2", "apple"));
        assert_eq!(next_frame(&mut p2).await, correct);
        assert_eq!(finished(h2).await.unwrap(), SessionEnd::Answered);
        assert!(matches!(
            read_frame(&mut p2).await,
            Err(ProtocolError::StreamClosed)
        ));

        assert_eq!(next_frame(&mut p1).await, correct);
        assert_eq!(next_frame(&mut p1).await, count(1, 2));

        // no round gate: the remaining player can still answer
        send(
            &mut p1,
            Frame::Answer {
                name: String::new(),
                guess: "apple".to_string(),
            },
        )
        .await;
        assert_eq!(
            next_frame(&mut p1).await,
            Frame::Correct(Outcome::new("player1", "apple"))
        );
    }

    #[tokio::test]
    async fn test_unknown_and_misplaced_frames_are_skipped() {
        let room = Room::new("apple", 2, false).shared();
        let (mut p1, _h1) = open_room(&room, 2).await;

        p1.write_all(&99i32.to_le_bytes()).await.unwrap();
        send(&mut p1, Frame::SetCapacity { max_players: 9 }).await;
        send(&mut p1, Frame::PlayerNumber { number: 4 }).await;
        send(&mut p1, Frame::Ping).await;

        assert_eq!(next_frame(&mut p1).await, Frame::Pong);
        assert_eq!(room.lock().await.capacity(), 2);
    }

    #[tokio::test]
    async fn test_last_departure_resets_room() {
        let room = Room::new("apple", 2, false).shared();
        let (p1, h1) = open_room(&room, 5).await;

        drop(p1);
        assert_eq!(finished(h1).await.unwrap(), SessionEnd::Closed);

        let mut room = room.lock().await;
        assert!(room.is_empty());
        assert_eq!(room.capacity(), 2);
        assert!(room.take_first_connection());
    }

    #[tokio::test]
    async fn test_short_read_terminates_and_deregisters() {
        let room = Room::new("apple", 2, false).shared();
        let (mut p1, _h1) = open_room(&room, 2).await;
        let (mut p2, h2) = join(&room, 2, 2, &mut [&mut p1], count(2, 2)).await;

        p2.write_all(&shared::tag::DRAW.to_le_bytes()).await.unwrap();
        p2.write_all(&[1, 2, 3]).await.unwrap();
        drop(p2);

        assert!(matches!(
            finished(h2).await.unwrap_err(),
            SessionError::Protocol(ProtocolError::ShortRead { .. })
        ));
        assert_eq!(next_frame(&mut p1).await, count(1, 2));
        assert_eq!(room.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_enforced_capacity_refuses_extra_player() {
        let room = Room::new("apple", 2, true).shared();
        let (mut p1, _h1) = open_room(&room, 1).await;

        let (mut p2, h2) = connect(&room, 2).await;

        assert!(matches!(
            finished(h2).await.unwrap_err(),
            SessionError::RoomFull(RoomFull { capacity: 1, .. })
        ));
        assert_eq!(next_frame(&mut p2).await, Frame::Disconnect);
        assert!(matches!(
            read_frame(&mut p2).await,
            Err(ProtocolError::StreamClosed)
        ));
        assert_eq!(room.lock().await.len(), 1);

        send(&mut p1, Frame::Ping).await;
        assert_eq!(next_frame(&mut p1).await, Frame::Pong);
    }
}
