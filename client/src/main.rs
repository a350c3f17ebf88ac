use clap::{Parser, Subcommand};
use client::network::{Client, ClientOptions, Mode};
use client::signal::LogSignals;
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Drawing-and-guessing game client", long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:25000")]
    server: String,

    /// Room capacity to request if we are the first player
    #[arg(short = 'c', long, default_value_t = shared::DEFAULT_CAPACITY as i32)]
    capacity: i32,

    /// Milliseconds between strokes when drawing
    #[arg(long, default_value = "1000")]
    interval_ms: u64,

    /// Milliseconds to wait before sending the answer
    #[arg(long, default_value = "2000")]
    answer_delay_ms: u64,

    #[command(subcommand)]
    mode: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send simulated strokes until somebody guesses the word
    Draw,
    /// Send one guess
    Answer {
        /// The guess
        word: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let options = ClientOptions {
        capacity: args.capacity,
        draw_interval: Duration::from_millis(args.interval_ms),
        answer_delay: Duration::from_millis(args.answer_delay_ms),
    };
    let mode = match args.mode {
        Command::Draw => Mode::Draw,
        Command::Answer { word } => Mode::Answer(word),
    };

    let client = Client::connect(&args.server, options).await?;
    let view = client.run(mode, LogSignals).await?;

    match view.local_name() {
        Some(name) => info!("{} leaving ({} strokes seen)", name, view.canvas.len()),
        None => info!("Leaving without a player number"),
    }
    Ok(())
}
