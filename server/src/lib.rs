//! # Sketch Server Library
//!
//! The central authority of the drawing-and-guessing game. One player
//! sketches, the others guess; the server relays strokes, checks guesses
//! against the secret word, and tells everyone the outcome.
//!
//! ## Module Organization
//!
//! ### Room Module (`room`)
//! The only shared mutable state: registered players, the secret word,
//! the capacity of the current room generation, and the flag marking the
//! next connection as the one that negotiates capacity.
//!
//! ### Broadcast Module (`broadcast`)
//! Sends an encoded frame to all players, all but one, or a single player.
//! Sends run while the room lock is held, which keeps every player's view
//! of broadcasts in the same order.
//!
//! ### Session Module (`session`)
//! The per-connection state machine: capacity negotiation for the first
//! connection, registration, frame handling, and cleanup.
//!
//! ### Network Module (`network`)
//! The TCP accept loop. Each connection gets its own task; the task set
//! is kept only so shutdown can stop them.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         secret_word: "apple".to_string(),
//!         ..ServerConfig::default()
//!     };
//!
//!     // Runs until Ctrl-C
//!     Server::bind(&config).await?.run().await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod network;
pub mod room;
pub mod session;
