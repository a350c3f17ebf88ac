//! Server settings

use crate::room::Room;
use shared::{DEFAULT_CAPACITY, DEFAULT_PORT};

/// Everything needed to start a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to listen on; 0 lets the OS pick one
    pub port: u16,
    /// Word every answer is checked against
    pub secret_word: String,
    /// Capacity used until the first player of a generation negotiates one
    pub default_capacity: u32,
    /// Refuse players beyond capacity instead of only logging
    pub enforce_capacity: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            secret_word: String::new(),
            default_capacity: DEFAULT_CAPACITY,
            enforce_capacity: false,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn new_room(&self) -> Room {
        Room::new(
            self.secret_word.clone(),
            self.default_capacity,
            self.enforce_capacity,
        )
    }
}
