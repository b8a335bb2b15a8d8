use std::sync::Arc;

use sha1_smol::Sha1;
use tokio_util::sync::CancellationToken;

use crate::prelude::*;
use crate::resume::{PieceSlotMap, ResumeData};
use crate::torrent::Bitfield;

use super::checking::CheckJob;
use super::{CheckOutcome, Session};

/// checks the files of queued torrents one at a time, front of the queue first, and promotes
/// each one into the live table once its check is done.
pub struct CheckingWorker {
    session: Arc<Session>,
    shutdown_token: CancellationToken,
}

impl CheckingWorker {
    pub(super) fn new(session: Arc<Session>, shutdown_token: CancellationToken) -> Self {
        Self {
            session,
            shutdown_token,
        }
    }

    /// runs until [Session::shutdown] is called.
    #[instrument("checking worker", level = "info", skip_all)]
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            while let Some(job) = self.session.next_check_job() {
                if self.shutdown_token.is_cancelled() {
                    break;
                }
                self.check(job).await;
            }

            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    info!("shutdown signal received, stopping checking worker");
                    return Ok(());
                }
                _ = self.session.checker_wake.notified() => {
                    debug!("checking worker woken up");
                }
            }
        }
    }

    #[instrument("check files", level = "info", skip_all, fields(info_hash = %job.info_hash))]
    async fn check(&self, job: CheckJob) {
        let outcome = match self.try_resume(&job) {
            Some(outcome) => outcome,
            None => match self.hash_pieces(&job).await {
                Ok(Some(outcome)) => outcome,
                Ok(None) => {
                    info!("check cancelled");
                    return;
                }
                Err(err) => CheckOutcome::Failed(format!("{err:#}")),
            },
        };

        if !self.session.promote(&job.info_hash, &job.cancel, outcome) {
            debug!("torrent removed before its check finished");
        }
    }

    // pieces in assigned slots are trusted without hashing them
    fn try_resume(&self, job: &CheckJob) -> Option<CheckOutcome> {
        let blob = job.resume_data.as_deref()?;
        let layout = job.info.resume_layout(job.block_size);

        match ResumeData::decode(blob, &layout) {
            Ok(resume) => {
                info!(unfinished = resume.unfinished.len(), "resuming from resume data");
                self.session.update_check_progress(&job.info_hash, 1.0);
                Some(CheckOutcome::Checked {
                    have: resume.verified_pieces(layout.num_pieces),
                    partial: resume.partial_pieces(&layout),
                    slots: resume.slots,
                })
            }
            Err(err) => {
                warn!(%err, "rejecting resume data, checking files from scratch");
                None
            }
        }
    }

    /// hashes every piece in storage. Returns None when the check is cancelled, which is looked
    /// at before each piece.
    async fn hash_pieces(&self, job: &CheckJob) -> anyhow::Result<Option<CheckOutcome>> {
        let num_pieces = job.info.num_pieces();
        let mut have = Bitfield::repeat(false, num_pieces);
        let mut slots = PieceSlotMap::unassigned(num_pieces);

        for piece_id in 0..num_pieces {
            if job.cancel.is_cancelled() {
                return Ok(None);
            }

            let piece = job
                .storage
                .read_piece(piece_id)
                .with_context(|| format!("failed to read piece {piece_id}"))?;

            if let Some(piece) = piece {
                let expected_len = job.info.piece_size(piece_id) as usize;
                if piece.len() == expected_len
                    && Sha1::from(&piece).digest().bytes() == *job.info.piece_hash(piece_id)
                {
                    trace!(piece_id, "piece hash check succeeded");
                    have.set(piece_id, true);
                    slots.assign(piece_id, piece_id);
                } else {
                    debug!(piece_id, "piece hash check failed");
                }
            }

            let progress = (piece_id + 1) as f32 / num_pieces as f32;
            self.session.update_check_progress(&job.info_hash, progress);
            // let facade callers and other tasks in between pieces
            tokio::task::yield_now().await;
        }

        info!(pieces = have.count_ones(), num_pieces, "files check complete");
        Ok(Some(CheckOutcome::Checked {
            have,
            partial: Vec::new(),
            slots,
        }))
    }
}
