use crate::torrent::{Bitfield, PeerId};

use super::{BlockIndex, PeerAddr, PieceIndex};

/// the block a peer is currently sending us, and how far along it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockProgress {
    pub piece_index: PieceIndex,
    pub block_index: BlockIndex,
    pub bytes_downloaded: u32,
    pub full_block_bytes: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerFlags {
    pub interesting: bool,
    pub choked: bool,
    pub remote_interested: bool,
    pub remote_choked: bool,
    pub supports_extensions: bool,
}

/// snapshot of one peer connection, maintained by the connection collaborator and exported
/// through the torrent handle.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerInfo {
    pub addr: PeerAddr,
    // None until the handshake completes
    pub peer_id: Option<PeerId>,
    pub down_speed: f64,
    pub up_speed: f64,
    pub total_download: u64,
    pub total_upload: u64,
    pub upload_limit: u64,
    pub upload_ceiling: u64,
    pub load_balancing: i64,
    pub download_queue_length: usize,
    pub downloading: Option<BlockProgress>,
    pub flags: PeerFlags,
    pub pieces: Bitfield,
}

impl PeerInfo {
    pub fn new(addr: PeerAddr) -> Self {
        Self {
            addr,
            peer_id: None,
            down_speed: 0.0,
            up_speed: 0.0,
            total_download: 0,
            total_upload: 0,
            upload_limit: 0,
            upload_ceiling: 0,
            load_balancing: 0,
            download_queue_length: 0,
            downloading: None,
            flags: PeerFlags::default(),
            pieces: Bitfield::new(),
        }
    }

    pub fn handshake_complete(&self) -> bool {
        self.peer_id.is_some()
    }
}
