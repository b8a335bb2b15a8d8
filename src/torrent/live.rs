use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SessionSettings;
use crate::peers::{PeerAddr, PeerInfo};
use crate::piece_picker::{PartialPiece, PickerEvent, PiecePicker};
use crate::prelude::*;
use crate::resume::{PieceSlotMap, ResumeData};

use super::{Bitfield, TorrentInfo, TorrentState, TorrentStatus};

/// a torrent with its download state. It sits in the checking queue until its files are
/// checked, and is then moved into the session's live table.
#[derive(Debug)]
pub struct Torrent {
    info: Arc<TorrentInfo>,
    save_path: PathBuf,
    state: TorrentState,
    error: Option<String>,
    picker: PiecePicker,
    slots: PieceSlotMap,
    // connections registered by the peer collaborator, in connection order
    peers: Vec<PeerInfo>,
    max_uploads: Option<u32>,
    next_announce: Duration,
}

impl Torrent {
    /// the piece length must be a whole number of blocks, see [TorrentInfo::block_size_for].
    pub(crate) fn new(
        info: Arc<TorrentInfo>,
        save_path: PathBuf,
        settings: &SessionSettings,
    ) -> Self {
        // pieces smaller than a block are requested whole
        let block_size = settings.block_size.min(info.piece_length());
        debug_assert_eq!(info.block_size_for(settings.block_size), Some(block_size));
        let picker = PiecePicker::new(&info, block_size);
        let slots = PieceSlotMap::unassigned(info.num_pieces());

        Self {
            info,
            save_path,
            state: TorrentState::QueuedForChecking,
            error: None,
            picker,
            slots,
            peers: Vec::new(),
            max_uploads: settings.max_uploads,
            next_announce: Duration::ZERO,
        }
    }

    pub fn info(&self) -> &Arc<TorrentInfo> {
        &self.info
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    pub fn state(&self) -> TorrentState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn picker(&self) -> &PiecePicker {
        &self.picker
    }

    pub fn slot_map(&self) -> &PieceSlotMap {
        &self.slots
    }

    pub fn slot_map_mut(&mut self) -> &mut PieceSlotMap {
        &mut self.slots
    }

    pub fn max_uploads(&self) -> Option<u32> {
        self.max_uploads
    }

    pub fn set_max_uploads(&mut self, max_uploads: Option<u32>) {
        self.max_uploads = max_uploads;
    }

    pub fn set_next_announce(&mut self, next_announce: Duration) {
        self.next_announce = next_announce;
    }

    /// applies a block/piece update and moves to seeding once every piece passed.
    pub fn handle_event(&mut self, event: PickerEvent) -> anyhow::Result<()> {
        self.picker.handle_event(event)?;

        if self.state == TorrentState::Downloading && self.picker.is_seeding() {
            info!(info_hash = %self.info.info_hash(), "all pieces downloaded, seeding");
            self.state = TorrentState::Seeding;
        }
        Ok(())
    }

    /// registers a connection, replacing any earlier record for the same address.
    pub fn add_peer(&mut self, peer: PeerInfo) {
        match self.peers.iter_mut().find(|p| p.addr == peer.addr) {
            Some(existing) => *existing = peer,
            None => self.peers.push(peer),
        }
    }

    pub fn update_peer(&mut self, addr: PeerAddr, update: impl FnOnce(&mut PeerInfo)) -> bool {
        match self.peers.iter_mut().find(|p| p.addr == addr) {
            Some(peer) => {
                update(peer);
                true
            }
            None => false,
        }
    }

    pub fn remove_peer(&mut self, addr: PeerAddr) -> Option<PeerInfo> {
        let pos = self.peers.iter().position(|p| p.addr == addr)?;
        Some(self.peers.remove(pos))
    }

    /// peers that finished the handshake.
    pub fn peer_info(&self) -> Vec<PeerInfo> {
        self.peers
            .iter()
            .filter(|peer| peer.handshake_complete())
            .cloned()
            .collect()
    }

    pub fn download_queue(&self) -> Vec<PartialPiece> {
        self.picker.download_queue().to_vec()
    }

    pub fn resume_data(&self) -> ResumeData {
        ResumeData::from_picker(self.info.info_hash(), self.slots.clone(), &self.picker)
    }

    pub fn status(&self) -> TorrentStatus {
        let total_wanted = self.info.total_length();
        let total_done = self.picker.bytes_done();
        let progress = match total_wanted {
            0 => 1.0,
            wanted => (total_done as f64 / wanted as f64) as f32,
        };

        let connected = self.peers.iter().filter(|p| p.handshake_complete());
        let (download_rate, upload_rate, total_download, total_upload) = connected.clone().fold(
            (0.0, 0.0, 0, 0),
            |(down, up, total_down, total_up), peer| {
                (
                    down + peer.down_speed,
                    up + peer.up_speed,
                    total_down + peer.total_download,
                    total_up + peer.total_upload,
                )
            },
        );

        TorrentStatus {
            state: self.state,
            progress,
            pieces: self.picker.have().clone(),
            total_done,
            total_wanted,
            num_peers: connected.count(),
            download_rate,
            upload_rate,
            total_download,
            total_upload,
            next_announce: self.next_announce,
            block_size: self.picker.block_size(),
            error: self.error.clone(),
        }
    }

    /// installs the outcome of the files check and leaves the checking states.
    pub(crate) fn finish_checking(
        &mut self,
        have: Bitfield,
        partial: Vec<PartialPiece>,
        slots: PieceSlotMap,
    ) {
        self.picker.restore(have, partial);
        self.slots = slots;
        self.state = match self.picker.is_seeding() {
            true => TorrentState::Seeding,
            false => TorrentState::Downloading,
        };
    }

    pub(crate) fn fail_checking(&mut self, error: String) {
        self.state = TorrentState::Error;
        self.error = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece_picker::PieceBlock;
    use crate::torrent::{InfoHash, PeerId};

    fn torrent() -> Torrent {
        let info = TorrentInfo::new(InfoHash::new([3; 20]), "t", 0x8000, 0x10000, vec![[0; 20]; 2])
            .unwrap();
        Torrent::new(Arc::new(info), PathBuf::from("/tmp/t"), &SessionSettings::default())
    }

    fn addr(port: u16) -> PeerAddr {
        PeerAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn only_handshaken_peers_are_exported() {
        let mut torrent = torrent();
        torrent.add_peer(PeerInfo::new(addr(1)));

        let mut connected = PeerInfo::new(addr(2));
        connected.peer_id = Some(PeerId::random());
        connected.down_speed = 100.0;
        torrent.add_peer(connected);

        let peers = torrent.peer_info();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].addr, addr(2));

        let status = torrent.status();
        assert_eq!(status.num_peers, 1);
        assert_eq!(status.download_rate, 100.0);
    }

    #[test]
    fn peer_records_are_updated_in_place() {
        let mut torrent = torrent();
        torrent.add_peer(PeerInfo::new(addr(1)));
        assert!(torrent.update_peer(addr(1), |p| p.total_upload = 7));
        assert!(!torrent.update_peer(addr(9), |p| p.total_upload = 7));
        assert_eq!(torrent.remove_peer(addr(1)).unwrap().total_upload, 7);
        assert!(torrent.remove_peer(addr(1)).is_none());
    }

    #[test]
    fn moves_to_seeding_after_the_last_piece() {
        let mut torrent = torrent();
        let mut have = Bitfield::new();
        have.resize(2, false);
        have.set(0, true);
        torrent.finish_checking(have, Vec::new(), PieceSlotMap::unassigned(2));
        assert_eq!(torrent.state(), TorrentState::Downloading);

        for block in 0..2 {
            torrent
                .handle_event(PickerEvent::Finished {
                    block: PieceBlock::new(1, block),
                    peer: None,
                })
                .unwrap();
        }
        torrent
            .handle_event(PickerEvent::Verified {
                piece_index: 1,
                passed: true,
            })
            .unwrap();

        let status = torrent.status();
        assert_eq!(status.state, TorrentState::Seeding);
        assert_eq!(status.progress, 1.0);
        assert_eq!(status.total_done, 0x10000);
    }

    #[test]
    fn block_size_is_capped_at_piece_length() {
        let info = TorrentInfo::new(InfoHash::new([3; 20]), "t", 0x1000, 0x1800, vec![[0; 20]; 2])
            .unwrap();
        let torrent = Torrent::new(Arc::new(info), PathBuf::new(), &SessionSettings::default());
        assert_eq!(torrent.picker().block_size(), 0x1000);
        assert_eq!(torrent.picker().blocks_per_piece(), 1);
    }
}
