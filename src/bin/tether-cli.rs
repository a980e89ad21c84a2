use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use tether::protocol::{encode, MessageKind};

#[derive(Parser)]
#[command(name = "tether-cli")]
#[command(about = "Send frames to a tether server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "127.0.0.1:9632")]
    addr: String,

    /// Send the frame this many times.
    #[arg(short, long, default_value_t = 1)]
    repeat: u32,

    /// Pause between repeated frames.
    #[arg(short, long, default_value_t = 1000)]
    interval_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep the connection alive
    Heartbeat,
    /// Send a UTF-8 text message
    Text { message: String },
    /// Send an image file
    Image { path: PathBuf },
    /// Send a WAV file
    Audio { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let frame = match &cli.command {
        Commands::Heartbeat => encode(MessageKind::Heartbeat, &[]),
        Commands::Text { message } => encode(MessageKind::Text, message.as_bytes()),
        Commands::Image { path } => encode(MessageKind::Image, &tokio::fs::read(path).await?),
        Commands::Audio { path } => encode(MessageKind::Audio, &tokio::fs::read(path).await?),
    };

    let mut stream = TcpStream::connect(&cli.addr).await?;
    println!("Connected to {}", cli.addr);

    for i in 0..cli.repeat {
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(cli.interval_ms)).await;
        }
        stream.write_all(&frame).await?;
        println!("Sent frame {} ({} bytes)", i + 1, frame.len());
    }

    stream.shutdown().await?;
    Ok(())
}
