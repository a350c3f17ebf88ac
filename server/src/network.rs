//! TCP listener accepting players and supervising their sessions

use crate::config::ServerConfig;
use crate::room::{ConnectionId, SharedRoom};
use crate::session::run_session;
use log::{debug, error, info, warn};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

/// Accept loop owning the room and the set of running sessions
pub struct Server {
    listener: TcpListener,
    room: SharedRoom,
    next_connection: u64,
    sessions: JoinSet<()>,
}

impl Server {
    pub async fn bind(config: &ServerConfig) -> io::Result<Self> {
        let address = config.address();
        let listener = TcpListener::bind(&address).await?;
        info!(
            "Server listening on {} (capacity {}, {})",
            listener.local_addr()?,
            config.default_capacity,
            if config.enforce_capacity {
                "enforced"
            } else {
                "advisory"
            }
        );

        Ok(Server {
            listener,
            room: config.new_room().shared(),
            next_connection: 1,
            sessions: JoinSet::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn room(&self) -> SharedRoom {
        Arc::clone(&self.room)
    }

    /// Serves until Ctrl-C.
    pub async fn run(self) -> io::Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serves until `shutdown` resolves, then aborts every running session.
    pub async fn run_until<F>(mut self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.spawn_session(stream, addr).await,
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                },

                Some(joined) = self.sessions.join_next(), if !self.sessions.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!("Session task panicked: {}", e);
                        }
                    }
                },

                _ = &mut shutdown => {
                    info!("Shutting down with {} open sessions", self.sessions.len());
                    break;
                }
            }
        }

        self.sessions.shutdown().await;
        Ok(())
    }

    /// Decides whether the connection opens a new room generation and hands
    /// it to its own session task.
    async fn spawn_session(&mut self, stream: TcpStream, addr: SocketAddr) {
        let connection = ConnectionId(self.next_connection);
        self.next_connection += 1;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle on {}: {}", addr, e);
        }

        let first = self.room.lock().await.take_first_connection();
        info!(
            "Connection {} from {}{}",
            connection,
            addr,
            if first { " (first, awaiting capacity)" } else { "" }
        );

        let (reader, writer) = stream.into_split();
        let room = Arc::clone(&self.room);
        self.sessions.spawn(async move {
            match run_session(room, connection, reader, writer, first).await {
                Ok(end) => debug!("Connection {} from {} closed: {:?}", connection, addr, end),
                Err(e) => warn!("Connection {} from {} closed: {}", connection, addr, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{read_frame, write_frame, Frame, PlayerCount};
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    fn test_config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            secret_word: "apple".to_string(),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_bind_on_ephemeral_port() {
        let server = Server::bind(&test_config()).await.unwrap();
        let addr = server.local_addr().unwrap();

        assert_ne!(addr.port(), 0);
        assert_eq!(server.room().lock().await.secret_word(), "apple");
    }

    #[tokio::test]
    async fn test_shutdown_stops_accept_loop() {
        let server = Server::bind(&test_config()).await.unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));

        tx.send(()).unwrap();

        let result = timeout(Duration::from_secs(2), handle)
            .await
            .expect("server did not stop")
            .expect("server task panicked");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_accepted_connection_gets_session() {
        let server = Server::bind(&test_config()).await.unwrap();
        let addr = server.local_addr().unwrap();
        let room = server.room();
        let (_tx, rx) = oneshot::channel::<()>();
        tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_frame(&mut stream, &Frame::SetCapacity { max_players: 3 })
            .await
            .unwrap();

        let welcome = timeout(Duration::from_secs(2), read_frame(&mut stream))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(welcome, Frame::PlayerNumber { number: 1 });
        let count = timeout(Duration::from_secs(2), read_frame(&mut stream))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            count,
            Frame::PlayerCount(PlayerCount {
                current: 1,
                max_players: 3
            })
        );
        assert_eq!(room.lock().await.len(), 1);
    }
}
