//! chunkpipe command line: send or receive one stream through a relay.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use chunkpipe_protocol::derive_key;
use chunkpipe_transfer::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY, FileChunker, HttpTransport, ProgressStream, Receiver,
    Sender, TransferConfig,
};

#[derive(Parser)]
#[command(name = "chunkpipe", about = "Chunked file transfer through an HTTP relay")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a file through the relay.
    Send {
        /// File to send.
        file: PathBuf,
        /// Relay server base URL.
        #[arg(long)]
        server: String,
        /// Transfer channel id (generated and printed if omitted).
        #[arg(long, conflicts_with = "passphrase")]
        channel: Option<String>,
        /// Derive the channel from a shared passphrase instead.
        #[arg(long)]
        passphrase: Option<String>,
        /// Chunk size in bytes.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Maximum in-flight requests.
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },
    /// Receive a stream from the relay.
    Recv {
        /// Relay server base URL.
        #[arg(long)]
        server: String,
        /// Transfer channel id.
        #[arg(long, conflicts_with = "passphrase")]
        channel: Option<String>,
        /// Derive the channel from a shared passphrase instead.
        #[arg(long)]
        passphrase: Option<String>,
        /// Output file (stdout if omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Maximum in-flight requests.
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },
}

/// Resolves the transfer channel from the flags.
///
/// A passphrase maps to a channel via key derivation, so both ends agree
/// without exchanging an id. With neither flag, `generate` controls
/// whether a fresh id is created (sender) or the flags are rejected
/// (receiver, which has nothing to guess from).
fn resolve_channel(
    channel: Option<String>,
    passphrase: Option<String>,
    generate: bool,
) -> anyhow::Result<String> {
    if let Some(channel) = channel {
        return Ok(channel);
    }
    if let Some(passphrase) = passphrase {
        return Ok(hex::encode(derive_key(&passphrase)));
    }
    if generate {
        let channel = uuid::Uuid::new_v4().to_string();
        println!("channel: {channel}");
        return Ok(channel);
    }
    anyhow::bail!("either --channel or --passphrase is required")
}

async fn send(
    file: PathBuf,
    server: String,
    config: TransferConfig,
) -> anyhow::Result<()> {
    let chunker = FileChunker::open(&file, config.chunk_size)
        .await
        .with_context(|| format!("opening {}", file.display()))?;
    let total_size = chunker.size();
    tracing::info!(file = %file.display(), size = total_size, "sending");

    let source = ProgressStream::new(
        chunker.into_stream(),
        Box::new(move |sent| tracing::debug!(sent, total_size, "progress")),
    );

    let transport = Arc::new(HttpTransport::new(server));
    let sender = Sender::new(transport, config);
    let sent = sender.send(source).await.context("transfer failed")?;
    tracing::info!(sent, "done");
    Ok(())
}

async fn recv(
    server: String,
    output: Option<PathBuf>,
    config: TransferConfig,
) -> anyhow::Result<()> {
    let transport = Arc::new(HttpTransport::new(server));
    let receiver = Receiver::new(transport, config);

    let mut stream = ProgressStream::new(
        receiver.stream(),
        Box::new(|received| tracing::debug!(received, "progress")),
    );

    let mut writer: Box<dyn tokio::io::AsyncWrite + Unpin> = match &output {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("transfer failed")?;
        writer.write_all(&chunk).await?;
    }
    writer.flush().await?;

    tracing::info!(received = stream.observed(), "done");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Send {
            file,
            server,
            channel,
            passphrase,
            chunk_size,
            concurrency,
        } => {
            let channel = resolve_channel(channel, passphrase, true)?;
            let config = TransferConfig::new(channel)
                .with_chunk_size(chunk_size)
                .with_concurrency(concurrency);
            send(file, server, config).await
        }
        Command::Recv {
            server,
            channel,
            passphrase,
            output,
            concurrency,
        } => {
            let channel = resolve_channel(channel, passphrase, false)?;
            let config = TransferConfig::new(channel).with_concurrency(concurrency);
            recv(server, output, config).await
        }
    }
}
