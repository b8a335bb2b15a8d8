use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[command(version, about = "inspect bencoded files and resume data", long_about = None)]
pub struct Cli {
    /// more output, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// print a bencoded file as a structured value
    Value { file: PathBuf },

    /// decode and summarize a resume data file
    Resume {
        file: PathBuf,

        #[arg(long)]
        num_pieces: usize,

        #[arg(long)]
        blocks_per_piece: u32,

        /// blocks in the last piece, defaults to blocks per piece
        #[arg(long)]
        last_piece_blocks: Option<u32>,
    },
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}
