use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;

#[derive(Parser, Debug)]
#[command(author, version, about = "Drawing-and-guessing game server", long_about = None)]
struct Args {
    /// Word the players have to guess
    secret_word: String,

    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Capacity used until the first player requests one
    #[arg(long, default_value_t = shared::DEFAULT_CAPACITY)]
    default_capacity: u32,

    /// Refuse players once the room is full instead of only warning
    #[arg(long)]
    enforce_capacity: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        secret_word: args.secret_word,
        default_capacity: args.default_capacity,
        enforce_capacity: args.enforce_capacity,
    };

    let server = Server::bind(&config).await?;
    info!("Waiting for players (answer: {})", config.secret_word);
    server.run().await?;

    info!("Server stopped");
    Ok(())
}
