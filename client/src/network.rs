use crate::game::{ClientView, ViewEvent};
use crate::signal::SignalHooks;
use crate::stroke::StrokeGenerator;
use log::{debug, info, warn};
use shared::{read_frame, write_frame, Frame, ProtocolError, DEFAULT_CAPACITY};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinError;
use tokio::time::{interval, sleep};

const STOP_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("could not connect: {0}")]
    Connect(#[from] io::Error),
    #[error("receive task failed: {0}")]
    Receiver(#[from] JoinError),
}

/// What this client does once connected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Stream strokes until somebody guesses the word.
    Draw,
    /// Send one guess and wait for the verdict.
    Answer(String),
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Sent as SET_CAPACITY right after connecting. Only the first player
    /// of a room's generation is listened to; the server skips it otherwise.
    pub capacity: i32,
    pub draw_interval: Duration,
    pub answer_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY as i32,
            draw_interval: Duration::from_secs(1),
            answer_delay: Duration::from_secs(2),
        }
    }
}

pub struct Client {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    options: ClientOptions,
    stop: Arc<AtomicBool>,
}

impl Client {
    pub async fn connect(server_addr: &str, options: ClientOptions) -> Result<Self, ClientError> {
        info!("Connecting to {}...", server_addr);
        let stream = TcpStream::connect(server_addr).await?;
        stream.set_nodelay(true)?;
        let (reader, mut writer) = stream.into_split();

        write_frame(
            &mut writer,
            &Frame::SetCapacity {
                max_players: options.capacity,
            },
        )
        .await?;

        Ok(Client {
            reader,
            writer,
            options,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Runs the receive loop in its own task and the chosen send side on
    /// this one, then says goodbye and returns what was received.
    pub async fn run<H>(self, mode: Mode, hooks: H) -> Result<ClientView, ClientError>
    where
        H: SignalHooks + 'static,
    {
        let Client {
            reader,
            mut writer,
            options,
            stop,
        } = self;

        let answering = matches!(mode, Mode::Answer(_));
        let receiver = tokio::spawn(receive_loop(reader, hooks, Arc::clone(&stop), answering));

        let sent = match mode {
            Mode::Draw => draw_loop(&mut writer, &stop, options.draw_interval)
                .await
                .map(|strokes| info!("[draw] stopped after {} strokes", strokes)),
            Mode::Answer(guess) => answer_once(&mut writer, &guess, &stop, options.answer_delay).await,
        };

        if let Err(e) = write_frame(&mut writer, &Frame::Disconnect).await {
            debug!("Could not send DISCONNECT: {}", e);
        }
        if let Err(e) = writer.shutdown().await {
            debug!("Could not close the connection: {}", e);
        }

        let view = receiver.await?;
        sent?;
        Ok(view)
    }
}

/// Decodes server frames until the connection ends, firing the signal
/// hooks on outcomes.
///
/// The stop flag is raised on CORRECT, when the server refuses or closes
/// the session, and, if `stop_on_own_wrong` is set, on a WRONG naming this
/// player.
pub async fn receive_loop<R, H>(
    mut reader: R,
    hooks: H,
    stop: Arc<AtomicBool>,
    stop_on_own_wrong: bool,
) -> ClientView
where
    R: AsyncRead + Unpin,
    H: SignalHooks,
{
    let mut view = ClientView::new();

    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(frame) => frame,
            Err(e) if e.is_disconnect() => {
                info!("Server closed the connection: {}", e);
                break;
            }
            Err(e) => {
                warn!("Connection lost: {}", e);
                break;
            }
        };

        match view.apply(frame) {
            ViewEvent::None => {}
            ViewEvent::Correct(_) => {
                hooks.on_correct_signal();
                stop.store(true, Ordering::SeqCst);
            }
            ViewEvent::Wrong(outcome) => {
                hooks.on_wrong_signal();
                if stop_on_own_wrong && view.is_local(&outcome.name) {
                    stop.store(true, Ordering::SeqCst);
                }
            }
            ViewEvent::Refused => break,
        }
    }

    stop.store(true, Ordering::SeqCst);
    view
}

/// Sends one simulated stroke per `period` until `stop` is set. Returns the
/// number of strokes sent.
pub async fn draw_loop<W>(writer: &mut W, stop: &AtomicBool, period: Duration) -> Result<u32, ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let mut ticker = interval(period);
    let mut sent = 0;

    for stroke in StrokeGenerator::new() {
        ticker.tick().await;
        if stop.load(Ordering::SeqCst) {
            break;
        }

        write_frame(writer, &Frame::Draw(stroke)).await?;
        debug!("[draw] sent ({}, {})", stroke.x, stroke.y);
        sent += 1;
    }

    Ok(sent)
}

/// Waits `delay`, sends a single guess, then waits for the stop flag.
pub async fn answer_once<W>(
    writer: &mut W,
    guess: &str,
    stop: &AtomicBool,
    delay: Duration,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    sleep(delay).await;

    // the server names players itself
    let frame = Frame::Answer {
        name: String::new(),
        guess: guess.to_string(),
    };
    write_frame(writer, &frame).await?;
    info!("[answer] sent '{}'", guess);

    let mut poll = interval(STOP_POLL);
    while !stop.load(Ordering::SeqCst) {
        poll.tick().await;
    }
    Ok(())
}
