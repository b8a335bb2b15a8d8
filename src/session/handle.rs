use std::path::PathBuf;
use std::sync::{Arc, Weak};

use crate::peers::PeerInfo;
use crate::piece_picker::PartialPiece;
use crate::torrent::{InfoHash, Torrent, TorrentInfo, TorrentStatus};

use super::{InvalidHandle, Session};

/// cheap reference to a torrent in a session. It holds only the info hash, every call looks the
/// torrent up again, so a handle to a removed torrent (or a dropped session) fails with
/// [InvalidHandle] instead of keeping anything alive.
#[derive(Debug, Clone)]
pub struct TorrentHandle {
    info_hash: InfoHash,
    session: Weak<Session>,
}

impl TorrentHandle {
    pub(super) fn new(info_hash: InfoHash, session: Weak<Session>) -> Self {
        Self { info_hash, session }
    }

    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    fn session(&self) -> Result<Arc<Session>, InvalidHandle> {
        self.session.upgrade().ok_or(InvalidHandle)
    }

    pub fn is_valid(&self) -> bool {
        self.session()
            .map(|session| session.is_valid(&self.info_hash))
            .unwrap_or(false)
    }

    pub fn status(&self) -> Result<TorrentStatus, InvalidHandle> {
        self.session()?.status(&self.info_hash)
    }

    pub fn torrent_info(&self) -> Result<Arc<TorrentInfo>, InvalidHandle> {
        self.session()?.torrent_info(&self.info_hash)
    }

    pub fn save_path(&self) -> Result<PathBuf, InvalidHandle> {
        self.session()?.save_path(&self.info_hash)
    }

    pub fn set_max_uploads(&self, max_uploads: Option<u32>) -> Result<(), InvalidHandle> {
        self.session()?.set_max_uploads(&self.info_hash, max_uploads)
    }

    pub fn peer_info(&self) -> Result<Vec<PeerInfo>, InvalidHandle> {
        self.session()?.peer_info(&self.info_hash)
    }

    pub fn download_queue(&self) -> Result<Vec<PartialPiece>, InvalidHandle> {
        self.session()?.download_queue(&self.info_hash)
    }

    /// resume blob of the torrent, None unless it is live.
    pub fn export_resume_data(&self) -> Option<Vec<u8>> {
        self.session().ok()?.export_resume_data(&self.info_hash)
    }

    pub fn with_torrent<R>(&self, f: impl FnOnce(&mut Torrent) -> R) -> Result<R, InvalidHandle> {
        self.session()?.with_torrent(&self.info_hash, f)
    }
}

impl PartialEq for TorrentHandle {
    fn eq(&self, other: &Self) -> bool {
        self.info_hash == other.info_hash && Weak::ptr_eq(&self.session, &other.session)
    }
}

impl Eq for TorrentHandle {}
