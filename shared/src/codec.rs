//! Byte layout of frames on a stream connection.
//!
//! ```text
//! tag:i32 | payload
//! DRAW           x:i32 y:i32 color:i32 thickness:i32
//! SET_CAPACITY   max_players:i32
//! ANSWER         name:text guess:text
//! CORRECT/WRONG  name:text word:text
//! PLAYER_NUMBER  number:i32
//! PLAYER_COUNT   current:i32 max_players:i32
//! CLEAR/PING/PONG/DISCONNECT  (none)
//! text = len:u32 followed by len raw bytes
//! ```
//!
//! All integers are little-endian. Decoding reads exactly the declared
//! number of bytes; running out of stream mid-frame is a [`ProtocolError::ShortRead`].

use crate::{tag, Frame, Outcome, PlayerCount, ProtocolError, Stroke};
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const TAG_LEN: usize = 4;
const INT_LEN: usize = 4;
const STROKE_LEN: usize = 4 * INT_LEN;
const PLAYER_COUNT_LEN: usize = 2 * INT_LEN;

/// Fixed-width integers in little-endian order, so a struct of four i32
/// fields is exactly sixteen bytes.
fn payload_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

/// Serializes a frame into its complete wire representation.
pub fn encode(frame: &Frame) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::with_capacity(TAG_LEN + STROKE_LEN);
    buf.extend_from_slice(&frame.tag().to_le_bytes());

    match frame {
        Frame::Draw(stroke) => put_fixed(&mut buf, stroke)?,
        Frame::SetCapacity { max_players } => put_fixed(&mut buf, max_players)?,
        Frame::PlayerNumber { number } => put_fixed(&mut buf, number)?,
        Frame::PlayerCount(count) => put_fixed(&mut buf, count)?,
        Frame::Answer { name, guess } => {
            put_text(&mut buf, name)?;
            put_text(&mut buf, guess)?;
        }
        Frame::Correct(outcome) | Frame::Wrong(outcome) => {
            put_text(&mut buf, &outcome.name)?;
            put_text(&mut buf, &outcome.word)?;
        }
        Frame::Clear | Frame::Ping | Frame::Pong | Frame::Disconnect | Frame::Unknown { .. } => {}
    }

    Ok(buf)
}

fn put_fixed<T: Serialize>(buf: &mut Vec<u8>, value: &T) -> Result<(), ProtocolError> {
    payload_options().serialize_into(&mut *buf, value)?;
    Ok(())
}

fn put_text(buf: &mut Vec<u8>, text: &str) -> Result<(), ProtocolError> {
    let len = u32::try_from(text.len()).map_err(|_| ProtocolError::FieldTooLong(text.len()))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(text.as_bytes());
    Ok(())
}

/// Encodes `frame` and writes it out in one piece.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let bytes = encode(frame)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one complete frame, waiting as long as the peer needs to send it.
///
/// Unknown tags decode to [`Frame::Unknown`] without consuming anything past
/// the tag, so the caller can skip them and keep reading.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let tag = read_tag(reader).await?;

    let frame = match tag {
        tag::DRAW => Frame::Draw(read_fixed::<Stroke, _>(reader, STROKE_LEN).await?),
        tag::CLEAR => Frame::Clear,
        tag::PING => Frame::Ping,
        tag::PONG => Frame::Pong,
        tag::SET_CAPACITY => Frame::SetCapacity {
            max_players: read_fixed(reader, INT_LEN).await?,
        },
        tag::ANSWER => {
            let name = read_text(reader).await?;
            let guess = read_text(reader).await?;
            Frame::Answer { name, guess }
        }
        tag::CORRECT => Frame::Correct(read_outcome(reader).await?),
        tag::WRONG => Frame::Wrong(read_outcome(reader).await?),
        tag::PLAYER_NUMBER => Frame::PlayerNumber {
            number: read_fixed(reader, INT_LEN).await?,
        },
        tag::PLAYER_COUNT => {
            Frame::PlayerCount(read_fixed::<PlayerCount, _>(reader, PLAYER_COUNT_LEN).await?)
        }
        tag::DISCONNECT => Frame::Disconnect,
        other => Frame::Unknown { tag: other },
    };

    Ok(frame)
}

async fn read_tag<R>(reader: &mut R) -> Result<i32, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let bytes = match read_exactly(reader, TAG_LEN).await {
        Err(ProtocolError::ShortRead { got: 0, .. }) => return Err(ProtocolError::StreamClosed),
        result => result?,
    };
    Ok(payload_options().deserialize(&bytes)?)
}

async fn read_fixed<T, R>(reader: &mut R, len: usize) -> Result<T, ProtocolError>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin + ?Sized,
{
    let bytes = read_exactly(reader, len).await?;
    Ok(payload_options().deserialize(&bytes)?)
}

async fn read_outcome<R>(reader: &mut R) -> Result<Outcome, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let name = read_text(reader).await?;
    let word = read_text(reader).await?;
    Ok(Outcome { name, word })
}

async fn read_text<R>(reader: &mut R) -> Result<String, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let len: u32 = read_fixed(reader, INT_LEN).await?;
    let bytes = read_exactly(reader, len as usize).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Reads exactly `len` bytes. The buffer grows with what actually arrives,
/// so a bogus length prefix does not allocate up front.
async fn read_exactly<R>(reader: &mut R, len: usize) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::with_capacity(len.min(4096));
    let got = (&mut *reader).take(len as u64).read_to_end(&mut buf).await?;
    if got < len {
        return Err(ProtocolError::ShortRead { expected: len, got });
    }
    Ok(buf)
}
