use std::time::Duration;

use super::Bitfield;

/// lifecycle of a torrent: queued and checked in the checking queue, then live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TorrentState {
    QueuedForChecking,
    CheckingFiles,
    Downloading,
    Seeding,
    Error,
}

impl TorrentState {
    pub fn is_checking(self) -> bool {
        matches!(
            self,
            TorrentState::QueuedForChecking | TorrentState::CheckingFiles
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TorrentStatus {
    pub state: TorrentState,
    /// fraction in [0, 1]. While checking it is the fraction of pieces hashed so far.
    pub progress: f32,
    pub pieces: Bitfield,
    pub total_done: u64,
    pub total_wanted: u64,
    pub num_peers: usize,
    pub download_rate: f64,
    pub upload_rate: f64,
    pub total_download: u64,
    pub total_upload: u64,
    pub next_announce: Duration,
    pub block_size: u32,
    pub error: Option<String>,
}

impl TorrentStatus {
    /// reduced status of a torrent still in the checking queue, no piece or peer state exists
    /// for it yet.
    pub(crate) fn checking(
        state: TorrentState,
        progress: f32,
        num_pieces: usize,
        total_wanted: u64,
        block_size: u32,
    ) -> Self {
        let mut pieces = Bitfield::new();
        pieces.resize(num_pieces, false);

        Self {
            state,
            progress,
            pieces,
            total_done: 0,
            total_wanted,
            num_peers: 0,
            download_rate: 0.0,
            upload_rate: 0.0,
            total_download: 0,
            total_upload: 0,
            next_announce: Duration::ZERO,
            block_size,
            error: None,
        }
    }
}
