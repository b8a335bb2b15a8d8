use std::collections::VecDeque;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::storage::PieceStorage;
use crate::torrent::{InfoHash, Torrent, TorrentInfo, TorrentState};

/// a torrent waiting for (or undergoing) the files check.
pub(crate) struct CheckingEntry {
    pub(crate) torrent: Torrent,
    pub(crate) storage: Arc<dyn PieceStorage>,
    pub(crate) resume_data: Option<Vec<u8>>,
    // fraction of pieces hashed, never decreases
    pub(crate) progress: f32,
    pub(crate) cancel: CancellationToken,
}

impl CheckingEntry {
    pub(crate) fn info_hash(&self) -> InfoHash {
        self.torrent.info().info_hash()
    }
}

/// everything the worker needs to check the front entry without holding the queue lock.
pub(crate) struct CheckJob {
    pub(crate) info_hash: InfoHash,
    pub(crate) info: Arc<TorrentInfo>,
    pub(crate) block_size: u32,
    pub(crate) storage: Arc<dyn PieceStorage>,
    pub(crate) resume_data: Option<Vec<u8>>,
    pub(crate) cancel: CancellationToken,
}

/// torrents in check order, the front one is being checked.
#[derive(Default)]
pub(crate) struct CheckingQueue {
    entries: VecDeque<CheckingEntry>,
}

impl CheckingQueue {
    pub(crate) fn push_back(&mut self, entry: CheckingEntry) {
        self.entries.push_back(entry);
    }

    pub(crate) fn contains(&self, info_hash: &InfoHash) -> bool {
        self.position(info_hash).is_some()
    }

    fn position(&self, info_hash: &InfoHash) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.info_hash() == *info_hash)
    }

    /// the entry and its checking state.
    pub(crate) fn find_mut(
        &mut self,
        info_hash: &InfoHash,
    ) -> Option<(TorrentState, &mut CheckingEntry)> {
        let pos = self.position(info_hash)?;
        let state = match pos {
            0 => TorrentState::CheckingFiles,
            _ => TorrentState::QueuedForChecking,
        };
        Some((state, &mut self.entries[pos]))
    }

    pub(crate) fn remove(&mut self, info_hash: &InfoHash) -> Option<CheckingEntry> {
        let pos = self.position(info_hash)?;
        self.entries.remove(pos)
    }

    pub(crate) fn front_job(&self) -> Option<CheckJob> {
        let entry = self.entries.front()?;
        Some(CheckJob {
            info_hash: entry.info_hash(),
            info: Arc::clone(entry.torrent.info()),
            block_size: entry.torrent.picker().block_size(),
            storage: Arc::clone(&entry.storage),
            resume_data: entry.resume_data.clone(),
            cancel: entry.cancel.clone(),
        })
    }

    pub(crate) fn info_hashes(&self) -> impl Iterator<Item = InfoHash> + '_ {
        self.entries.iter().map(CheckingEntry::info_hash)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
