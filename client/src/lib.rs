//! # Sketch Client Library
//!
//! A headless player for the drawing-and-guessing game. It connects over
//! TCP, asks for a room capacity, and then either draws (a stream of
//! simulated strokes) or answers (a single guess), while a separate task
//! decodes everything the server sends.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The local view of the room: our player number, the player count, the
//! strokes received since the last clear, and the last announced outcome.
//!
//! ### Network Module (`network`)
//! The connection itself, the receive loop, and the two send sides
//! (drawing and answering). The loops share a stop flag; drawing stops
//! once somebody guesses correctly.
//!
//! ### Signal Module (`signal`)
//! Hooks fired on CORRECT and WRONG. The default implementation logs.
//!
//! ### Stroke Module (`stroke`)
//! Deterministic stroke generator used by drawing clients.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{Client, ClientOptions, Mode};
//! use client::signal::LogSignals;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect("127.0.0.1:25000", ClientOptions::default()).await?;
//!     let view = client.run(Mode::Answer("apple".into()), LogSignals).await?;
//!     println!("last outcome: {:?}", view.last_outcome);
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod network;
pub mod signal;
pub mod stroke;
