mod cli;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command};
use tracing::{debug, instrument};
use tracing_subscriber::{fmt, layer::SubscriberExt, registry::Registry, Layer};

use crux_session::resume::{ResumeData, ResumeLayout};
use crux_session::{InfoHash, Value};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let fmt_layer = fmt::Layer::default()
        .pretty()
        .with_writer(std::io::stderr)
        .with_filter(cli.log_level());

    let subscriber = Registry::default().with(fmt_layer);

    tracing::subscriber::set_global_default(subscriber)
        .context("could not set global tracing subscriber")?;

    tokio::select! {
        Ok(_) = tokio::signal::ctrl_c() => {Ok(())},
        result = run_app(cli) => {result}
    }
}

async fn run_app(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Value { file } => print_value(&file).await,
        Command::Resume {
            file,
            num_pieces,
            blocks_per_piece,
            last_piece_blocks,
        } => {
            let bytes = read_file(&file).await?;
            let info_hash = bytes
                .get(..InfoHash::LEN)
                .and_then(InfoHash::from_slice)
                .context("resume data is shorter than an info hash")?;

            let layout = ResumeLayout {
                info_hash,
                num_pieces,
                blocks_per_piece,
                last_piece_blocks: last_piece_blocks.unwrap_or(blocks_per_piece),
            };
            print_resume(&bytes, &layout)
        }
    }
}

async fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    debug!(path = %path.display(), "reading file");
    tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

#[instrument(level = "info", skip_all, fields(file = %file.display()))]
async fn print_value(file: &Path) -> anyhow::Result<()> {
    let bytes = read_file(file).await?;
    let value = Value::from_bencode(&bytes).context("file is not valid bencode")?;
    print!("{value}");
    Ok(())
}

fn print_resume(bytes: &[u8], layout: &ResumeLayout) -> anyhow::Result<()> {
    let resume = ResumeData::decode(bytes, layout).context("rejected resume data")?;

    println!("info hash: {}", resume.info_hash);
    println!("slots: {}", resume.slots.len());
    for (slot, state) in resume.slots.slots().iter().enumerate() {
        println!("  {slot}: {state:?}");
    }
    println!("blocks per piece: {}", resume.blocks_per_piece);
    println!("unfinished pieces: {}", resume.unfinished.len());
    for piece in &resume.unfinished {
        println!(
            "  piece {}: {}/{} blocks",
            piece.piece_index,
            piece.finished.count_ones(),
            piece.finished.len()
        );
    }
    Ok(())
}
