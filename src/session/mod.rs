//! the session owns every torrent, in one of two collections with independent locks: the
//! checking queue (torrents whose files are being checked, or waiting to be) and the live table
//! (checked torrents). A torrent is in exactly one of them and moves from the first to the
//! second once, see [Session::promote].
//!
//! All lookups take the live table first and the checking queue second, never both at once.

mod checker;
mod checking;
mod handle;
mod lock_order;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::config::SessionSettings;
use crate::peers::PeerInfo;
use crate::piece_picker::PartialPiece;
use crate::prelude::*;
use crate::resume::PieceSlotMap;
use crate::storage::PieceStorage;
use crate::torrent::{Bitfield, InfoHash, Torrent, TorrentInfo, TorrentState, TorrentStatus};

use checking::{CheckJob, CheckingEntry, CheckingQueue};
use lock_order::LockDomain;

pub use self::errors::{AddTorrentError, InvalidHandle};
pub use checker::CheckingWorker;
pub use handle::TorrentHandle;

type LiveTable = HashMap<InfoHash, Arc<Mutex<Torrent>>>;

pub struct AddTorrentParams {
    pub info: TorrentInfo,
    pub save_path: PathBuf,
    pub storage: Arc<dyn PieceStorage>,
    /// blob from an earlier [TorrentHandle::export_resume_data], lets the check skip hashing
    pub resume_data: Option<Vec<u8>>,
}

/// result of checking a torrent's files.
pub(crate) enum CheckOutcome {
    Checked {
        have: Bitfield,
        partial: Vec<PartialPiece>,
        slots: PieceSlotMap,
    },
    Failed(String),
}

pub struct Session {
    settings: SessionSettings,
    live: Mutex<LiveTable>,
    checking: Mutex<CheckingQueue>,
    // wakes the checking worker when a torrent is queued
    checker_wake: Notify,
    shutdown_token: CancellationToken,
}

impl Session {
    pub fn new(settings: SessionSettings) -> Arc<Self> {
        Arc::new(Self {
            settings,
            live: Mutex::new(LiveTable::new()),
            checking: Mutex::new(CheckingQueue::default()),
            checker_wake: Notify::new(),
            shutdown_token: CancellationToken::new(),
        })
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// the worker that checks queued torrents and promotes them. Run exactly one per session.
    pub fn checking_worker(self: &Arc<Self>) -> CheckingWorker {
        CheckingWorker::new(Arc::clone(self), self.shutdown_token.child_token())
    }

    /// stops the checking worker and aborts the check in progress.
    pub fn shutdown(&self) {
        info!("shutting down session");
        self.shutdown_token.cancel();
    }

    /// queues the torrent for checking.
    #[instrument("add torrent", level = "info", skip_all, fields(info_hash = %params.info.info_hash()))]
    pub fn add_torrent(
        self: &Arc<Self>,
        params: AddTorrentParams,
    ) -> Result<TorrentHandle, AddTorrentError> {
        let AddTorrentParams {
            info,
            save_path,
            storage,
            resume_data,
        } = params;
        let info_hash = info.info_hash();
        if info.block_size_for(self.settings.block_size).is_none() {
            warn!(
                piece_length = info.piece_length(),
                block_size = self.settings.block_size,
                "piece length is not a whole number of blocks"
            );
            return Err(AddTorrentError::PartialBlocks {
                piece_length: info.piece_length(),
                block_size: self.settings.block_size,
            });
        }
        let torrent = Torrent::new(Arc::new(info), save_path, &self.settings);

        {
            // nested like a promotion so the torrent can't be promoted between the two checks
            let _live_order = lock_order::acquire(LockDomain::Live);
            let live = self.live.lock();
            let _checking_order = lock_order::acquire_nested(LockDomain::Checking);
            let mut checking = self.checking.lock();

            if live.contains_key(&info_hash) || checking.contains(&info_hash) {
                warn!("torrent already in session");
                return Err(AddTorrentError::Duplicate(info_hash));
            }

            checking.push_back(CheckingEntry {
                torrent,
                storage,
                resume_data,
                progress: 0.0,
                cancel: self.shutdown_token.child_token(),
            });
            debug!(queue_len = checking.len(), "torrent queued for checking");
        }

        self.checker_wake.notify_one();
        Ok(TorrentHandle::new(info_hash, Arc::downgrade(self)))
    }

    pub fn find_torrent(self: &Arc<Self>, info_hash: &InfoHash) -> Option<TorrentHandle> {
        self.is_valid(info_hash)
            .then(|| TorrentHandle::new(*info_hash, Arc::downgrade(self)))
    }

    /// handles of all torrents, live ones first.
    pub fn torrents(self: &Arc<Self>) -> Vec<TorrentHandle> {
        let mut hashes = self.live_hashes();
        let queued: Vec<InfoHash> = {
            let _order = lock_order::acquire(LockDomain::Checking);
            self.checking.lock().info_hashes().collect()
        };
        // promoted between the two lookups
        let promoted: Vec<InfoHash> = self
            .live_hashes()
            .into_iter()
            .filter(|hash| !hashes.contains(hash))
            .collect();
        hashes.extend(promoted);

        for hash in queued {
            if !hashes.contains(&hash) {
                hashes.push(hash);
            }
        }

        hashes
            .into_iter()
            .map(|hash| TorrentHandle::new(hash, Arc::downgrade(self)))
            .collect()
    }

    fn live_hashes(&self) -> Vec<InfoHash> {
        let _order = lock_order::acquire(LockDomain::Live);
        self.live.lock().keys().copied().collect()
    }

    /// removes the torrent from whichever collection holds it. A torrent being checked has its
    /// check cancelled, the worker notices between two pieces.
    #[instrument("remove torrent", level = "info", skip(self))]
    pub fn remove_torrent(&self, info_hash: &InfoHash) -> Result<(), InvalidHandle> {
        if self.remove_live(info_hash) {
            return Ok(());
        }

        {
            let _order = lock_order::acquire(LockDomain::Checking);
            let mut checking = self.checking.lock();
            if let Some(entry) = checking.remove(info_hash) {
                info!("removing torrent from checking queue");
                entry.cancel.cancel();
                return Ok(());
            }
        }

        // promoted after the live lookup above
        match self.remove_live(info_hash) {
            true => Ok(()),
            false => Err(InvalidHandle),
        }
    }

    fn remove_live(&self, info_hash: &InfoHash) -> bool {
        let _order = lock_order::acquire(LockDomain::Live);
        let removed = self.live.lock().remove(info_hash).is_some();
        if removed {
            info!("removed live torrent");
        }
        removed
    }

    fn find_live(&self, info_hash: &InfoHash) -> Option<Arc<Mutex<Torrent>>> {
        let _order = lock_order::acquire(LockDomain::Live);
        self.live.lock().get(info_hash).cloned()
    }

    // runs `on_live` against the live torrent, or `on_checking` against the checking queue
    // entry. The live table is looked at again after a checking queue miss: a promotion that
    // lands between the first two lookups would otherwise make the torrent look absent.
    fn resolve<R>(
        &self,
        info_hash: &InfoHash,
        on_live: impl FnOnce(&mut Torrent) -> R,
        on_checking: impl FnOnce(TorrentState, &mut CheckingEntry) -> R,
    ) -> Result<R, InvalidHandle> {
        if let Some(torrent) = self.find_live(info_hash) {
            return Ok(on_live(&mut torrent.lock()));
        }

        {
            let _order = lock_order::acquire(LockDomain::Checking);
            let mut checking = self.checking.lock();
            if let Some((state, entry)) = checking.find_mut(info_hash) {
                return Ok(on_checking(state, entry));
            }
        }

        match self.find_live(info_hash) {
            Some(torrent) => Ok(on_live(&mut torrent.lock())),
            None => {
                debug!(%info_hash, "torrent not found in session");
                Err(InvalidHandle)
            }
        }
    }

    pub fn is_valid(&self, info_hash: &InfoHash) -> bool {
        self.resolve(info_hash, |_| (), |_, _| ()).is_ok()
    }

    #[instrument("status", level = "debug", skip(self))]
    pub fn status(&self, info_hash: &InfoHash) -> Result<TorrentStatus, InvalidHandle> {
        self.resolve(
            info_hash,
            |torrent| torrent.status(),
            |state, entry| {
                let info = entry.torrent.info();
                TorrentStatus::checking(
                    state,
                    entry.progress,
                    info.num_pieces(),
                    info.total_length(),
                    entry.torrent.picker().block_size(),
                )
            },
        )
    }

    pub fn torrent_info(&self, info_hash: &InfoHash) -> Result<Arc<TorrentInfo>, InvalidHandle> {
        self.resolve(
            info_hash,
            |torrent| Arc::clone(torrent.info()),
            |_, entry| Arc::clone(entry.torrent.info()),
        )
    }

    pub fn save_path(&self, info_hash: &InfoHash) -> Result<PathBuf, InvalidHandle> {
        self.resolve(
            info_hash,
            |torrent| torrent.save_path().to_path_buf(),
            |_, entry| entry.torrent.save_path().to_path_buf(),
        )
    }

    pub fn set_max_uploads(
        &self,
        info_hash: &InfoHash,
        max_uploads: Option<u32>,
    ) -> Result<(), InvalidHandle> {
        self.resolve(
            info_hash,
            |torrent| torrent.set_max_uploads(max_uploads),
            |_, entry| entry.torrent.set_max_uploads(max_uploads),
        )
    }

    /// connected peers, empty while the torrent is being checked.
    pub fn peer_info(&self, info_hash: &InfoHash) -> Result<Vec<PeerInfo>, InvalidHandle> {
        self.resolve(info_hash, |torrent| torrent.peer_info(), |_, _| Vec::new())
    }

    /// pieces in flight, empty while the torrent is being checked.
    pub fn download_queue(&self, info_hash: &InfoHash) -> Result<Vec<PartialPiece>, InvalidHandle> {
        self.resolve(
            info_hash,
            |torrent| torrent.download_queue(),
            |_, _| Vec::new(),
        )
    }

    /// resume data of a live torrent. None for torrents that are still being checked or that
    /// aren't in the session.
    #[instrument("write resume data", level = "debug", skip(self))]
    pub fn export_resume_data(&self, info_hash: &InfoHash) -> Option<Vec<u8>> {
        // snapshot under the lock, encode after releasing it
        let snapshot = self.find_live(info_hash)?.lock().resume_data();
        Some(snapshot.to_bytes())
    }

    /// runs `f` against the live torrent under its lock. This is how the peer and disk
    /// collaborators report block and peer updates.
    pub fn with_torrent<R>(
        &self,
        info_hash: &InfoHash,
        f: impl FnOnce(&mut Torrent) -> R,
    ) -> Result<R, InvalidHandle> {
        match self.find_live(info_hash) {
            Some(torrent) => Ok(f(&mut torrent.lock())),
            None => Err(InvalidHandle),
        }
    }

    pub(crate) fn next_check_job(&self) -> Option<CheckJob> {
        let _order = lock_order::acquire(LockDomain::Checking);
        self.checking.lock().front_job()
    }

    pub(crate) fn update_check_progress(&self, info_hash: &InfoHash, progress: f32) {
        let _order = lock_order::acquire(LockDomain::Checking);
        if let Some((_, entry)) = self.checking.lock().find_mut(info_hash) {
            entry.progress = entry.progress.max(progress);
        }
    }

    /// moves a checked torrent from the checking queue into the live table. Both collections
    /// change under the live lock, so every lookup sees the torrent in exactly one of them.
    /// Returns false when the torrent was removed (or its check cancelled) in the meantime.
    #[instrument("promote", level = "info", skip(self, cancel, outcome))]
    pub(crate) fn promote(
        &self,
        info_hash: &InfoHash,
        cancel: &CancellationToken,
        outcome: CheckOutcome,
    ) -> bool {
        let _live_order = lock_order::acquire(LockDomain::Live);
        let mut live = self.live.lock();

        let entry = {
            let _checking_order = lock_order::acquire_nested(LockDomain::Checking);
            let mut checking = self.checking.lock();
            // a cancelled token means the entry it belonged to is gone, whatever is queued
            // under this hash now is a new one
            if cancel.is_cancelled() {
                return false;
            }
            match checking.remove(info_hash) {
                Some(entry) => entry,
                None => return false,
            }
        };

        let mut torrent = entry.torrent;
        match outcome {
            CheckOutcome::Checked {
                have,
                partial,
                slots,
            } => torrent.finish_checking(have, partial, slots),
            CheckOutcome::Failed(error) => {
                error!(%error, "files check failed");
                torrent.fail_checking(error);
            }
        }

        info!(state = ?torrent.state(), "torrent is live");
        live.insert(*info_hash, Arc::new(Mutex::new(torrent)));
        true
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

mod errors {
    use thiserror::Error;

    use crate::torrent::InfoHash;

    /// the torrent is in neither the live table nor the checking queue (or the session is gone).
    #[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
    #[error("invalid torrent handle")]
    pub struct InvalidHandle;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum AddTorrentError {
        #[error("torrent {0} is already in the session")]
        Duplicate(InfoHash),

        #[error("piece length {piece_length} is not a whole number of {block_size} byte blocks")]
        PartialBlocks { piece_length: u32, block_size: u32 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use rstest::rstest;

    fn info(seed: u8) -> TorrentInfo {
        TorrentInfo::new(InfoHash::new([seed; 20]), "t", 0x8000, 0x20000, vec![[0; 20]; 4])
            .unwrap()
    }

    fn params(seed: u8) -> AddTorrentParams {
        AddTorrentParams {
            info: info(seed),
            save_path: PathBuf::from("/downloads"),
            storage: Arc::new(MemoryStorage::new()),
            resume_data: None,
        }
    }

    fn checked(num_pieces: usize, have: &[usize]) -> CheckOutcome {
        let mut bits = Bitfield::new();
        bits.resize(num_pieces, false);
        for &piece in have {
            bits.set(piece, true);
        }
        let mut slots = PieceSlotMap::unassigned(num_pieces);
        for &piece in have {
            slots.assign(piece, piece);
        }
        CheckOutcome::Checked {
            have: bits,
            partial: Vec::new(),
            slots,
        }
    }

    fn promote_front(session: &Session, outcome: CheckOutcome) -> bool {
        let job = session.next_check_job().unwrap();
        session.promote(&job.info_hash, &job.cancel, outcome)
    }

    #[test]
    fn checking_torrents_report_a_reduced_status() {
        let session = Session::new(SessionSettings::default());
        let front = session.add_torrent(params(1)).unwrap();
        let queued = session.add_torrent(params(2)).unwrap();

        session.update_check_progress(&front.info_hash(), 0.5);

        let status = session.status(&front.info_hash()).unwrap();
        assert_eq!(status.state, TorrentState::CheckingFiles);
        assert_eq!(status.progress, 0.5);
        assert_eq!(status.pieces.len(), 4);
        assert!(status.pieces.not_any());
        assert_eq!(status.total_wanted, 0x20000);

        let status = session.status(&queued.info_hash()).unwrap();
        assert_eq!(status.state, TorrentState::QueuedForChecking);
        assert_eq!(status.progress, 0.0);

        assert!(session.peer_info(&front.info_hash()).unwrap().is_empty());
        assert!(session.download_queue(&front.info_hash()).unwrap().is_empty());
        assert_eq!(session.export_resume_data(&front.info_hash()), None);
        assert_eq!(
            session.save_path(&queued.info_hash()).unwrap(),
            PathBuf::from("/downloads")
        );
    }

    #[test]
    fn check_progress_never_goes_back() {
        let session = Session::new(SessionSettings::default());
        let handle = session.add_torrent(params(1)).unwrap();

        session.update_check_progress(&handle.info_hash(), 0.75);
        session.update_check_progress(&handle.info_hash(), 0.25);
        assert_eq!(session.status(&handle.info_hash()).unwrap().progress, 0.75);
    }

    #[rstest]
    #[case::nothing(&[], TorrentState::Downloading)]
    #[case::some(&[0, 2], TorrentState::Downloading)]
    #[case::everything(&[0, 1, 2, 3], TorrentState::Seeding)]
    fn promoted_torrents_are_served_from_the_live_table(
        #[case] have: &[usize],
        #[case] state: TorrentState,
    ) {
        let session = Session::new(SessionSettings::default());
        let handle = session.add_torrent(params(1)).unwrap();

        assert!(promote_front(&session, checked(4, have)));

        let status = session.status(&handle.info_hash()).unwrap();
        assert_eq!(status.state, state);
        assert_eq!(status.pieces.count_ones(), have.len());
        assert!(session.export_resume_data(&handle.info_hash()).is_some());
        assert!(session.next_check_job().is_none());
    }

    #[test]
    fn failed_checks_are_promoted_in_the_error_state() {
        let session = Session::new(SessionSettings::default());
        let handle = session.add_torrent(params(1)).unwrap();

        assert!(promote_front(&session, CheckOutcome::Failed("disk gone".into())));

        let status = session.status(&handle.info_hash()).unwrap();
        assert_eq!(status.state, TorrentState::Error);
        assert_eq!(status.error.as_deref(), Some("disk gone"));
    }

    #[test]
    fn unknown_torrents_are_invalid_handles() {
        let session = Session::new(SessionSettings::default());
        let unknown = InfoHash::new([9; 20]);

        assert!(!session.is_valid(&unknown));
        assert_eq!(session.status(&unknown), Err(InvalidHandle));
        assert_eq!(session.save_path(&unknown), Err(InvalidHandle));
        assert_eq!(session.peer_info(&unknown).unwrap_err(), InvalidHandle);
        assert_eq!(session.download_queue(&unknown).unwrap_err(), InvalidHandle);
        assert_eq!(session.set_max_uploads(&unknown, Some(2)), Err(InvalidHandle));
        assert_eq!(session.export_resume_data(&unknown), None);
        assert!(session.with_torrent(&unknown, |_| ()).is_err());
        assert!(session.find_torrent(&unknown).is_none());
        assert_eq!(session.remove_torrent(&unknown), Err(InvalidHandle));
    }

    #[test]
    fn the_same_torrent_cannot_be_added_twice() {
        let session = Session::new(SessionSettings::default());
        session.add_torrent(params(1)).unwrap();

        let err = session.add_torrent(params(1)).unwrap_err();
        assert_eq!(err, AddTorrentError::Duplicate(InfoHash::new([1; 20])));

        assert!(promote_front(&session, checked(4, &[])));
        assert!(session.add_torrent(params(1)).is_err());
    }

    #[rstest]
    #[case::default_block_size(SessionSettings::default())]
    #[case::zero_block_size(SessionSettings { block_size: 0, ..Default::default() })]
    fn pieces_must_be_whole_blocks(#[case] settings: SessionSettings) {
        let session = Session::new(settings);
        let info =
            TorrentInfo::new(InfoHash::new([1; 20]), "t", 0x6000, 0x18000, vec![[0; 20]; 4])
                .unwrap();

        let err = session
            .add_torrent(AddTorrentParams {
                info,
                ..params(1)
            })
            .unwrap_err();
        assert!(matches!(err, AddTorrentError::PartialBlocks { piece_length: 0x6000, .. }));
        assert!(session.torrents().is_empty());
    }

    #[test]
    fn removing_a_checking_torrent_cancels_its_check() {
        let session = Session::new(SessionSettings::default());
        let handle = session.add_torrent(params(1)).unwrap();
        let job = session.next_check_job().unwrap();

        session.remove_torrent(&handle.info_hash()).unwrap();
        assert!(job.cancel.is_cancelled());
        assert!(!session.promote(&job.info_hash, &job.cancel, checked(4, &[])));
        assert!(!session.is_valid(&handle.info_hash()));
    }

    #[test]
    fn a_stale_check_does_not_promote_a_re_added_torrent() {
        let session = Session::new(SessionSettings::default());
        let handle = session.add_torrent(params(1)).unwrap();
        let stale = session.next_check_job().unwrap();

        session.remove_torrent(&handle.info_hash()).unwrap();
        session.add_torrent(params(1)).unwrap();

        assert!(!session.promote(&stale.info_hash, &stale.cancel, checked(4, &[0])));
        assert_eq!(
            session.status(&handle.info_hash()).unwrap().state,
            TorrentState::CheckingFiles
        );
    }

    #[test]
    fn settings_apply_to_either_collection() {
        let session = Session::new(SessionSettings {
            max_uploads: Some(4),
            ..Default::default()
        });
        let handle = session.add_torrent(params(1)).unwrap();

        session.set_max_uploads(&handle.info_hash(), Some(2)).unwrap();
        assert!(promote_front(&session, checked(4, &[])));

        let max_uploads = session
            .with_torrent(&handle.info_hash(), |torrent| torrent.max_uploads())
            .unwrap();
        assert_eq!(max_uploads, Some(2));
    }

    #[test]
    fn torrents_lists_both_collections() {
        let session = Session::new(SessionSettings::default());
        session.add_torrent(params(1)).unwrap();
        session.add_torrent(params(2)).unwrap();
        assert!(promote_front(&session, checked(4, &[])));

        let hashes: Vec<InfoHash> = session.torrents().iter().map(|h| h.info_hash()).collect();
        assert_eq!(hashes, vec![InfoHash::new([1; 20]), InfoHash::new([2; 20])]);

        session.remove_torrent(&InfoHash::new([1; 20])).unwrap();
        assert_eq!(session.torrents().len(), 1);
    }
}
