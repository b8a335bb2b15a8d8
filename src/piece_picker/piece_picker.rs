use crate::peers::{PeerAddr, PieceIndex, PieceLength};
use crate::prelude::*;
use crate::torrent::{Bitfield, TorrentInfo};

use super::{PartialPiece, PickerEvent, PieceBlock};

/// block level download state of one torrent. It records which pieces we have, and for the
/// pieces in flight which blocks are requested, from whom and which are finished. The choice of
/// what to request next is made by the connection collaborator, this only holds the state it
/// feeds.
#[derive(Debug, Clone)]
pub struct PiecePicker {
    // verified pieces
    have: Bitfield,
    // pieces with requested or finished blocks, in the order they were started
    download_queue: Vec<PartialPiece>,
    piece_length: PieceLength,
    total_length: u64,
    block_size: u32,
}

impl PiecePicker {
    pub fn new(info: &TorrentInfo, block_size: u32) -> Self {
        assert!(block_size > 0, "block size must be non-zero");
        let mut have = Bitfield::new();
        have.resize(info.num_pieces(), false);

        Self {
            have,
            download_queue: Vec::new(),
            piece_length: info.piece_length(),
            total_length: info.total_length(),
            block_size,
        }
    }

    pub fn num_pieces(&self) -> usize {
        self.have.len()
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// block count of every piece but (possibly) the last.
    pub fn blocks_per_piece(&self) -> u32 {
        self.piece_length / self.block_size
    }

    pub fn piece_size(&self, piece_id: PieceIndex) -> PieceLength {
        assert!(piece_id < self.num_pieces(), "piece index out of range");
        let offset = piece_id as u64 * self.piece_length as u64;
        (self.total_length - offset).min(self.piece_length as u64) as PieceLength
    }

    pub fn blocks_in_piece(&self, piece_id: PieceIndex) -> u32 {
        self.piece_size(piece_id).div_ceil(self.block_size)
    }

    pub fn have(&self) -> &Bitfield {
        &self.have
    }

    pub fn have_piece(&self, piece_id: PieceIndex) -> bool {
        self.have.get(piece_id).is_some_and(|bit| *bit)
    }

    pub fn num_have(&self) -> usize {
        self.have.count_ones()
    }

    pub fn is_seeding(&self) -> bool {
        self.have.all()
    }

    /// bytes of verified pieces.
    pub fn bytes_done(&self) -> u64 {
        self.have
            .iter_ones()
            .map(|piece_id| self.piece_size(piece_id) as u64)
            .sum()
    }

    pub fn download_queue(&self) -> &[PartialPiece] {
        &self.download_queue
    }

    pub fn partial_piece(&self, piece_id: PieceIndex) -> Option<&PartialPiece> {
        self.download_queue
            .iter()
            .find(|piece| piece.piece_index() == piece_id)
    }

    // finds the partial piece for the block, adding it to the queue if it isn't there yet
    fn partial_for(&mut self, block: PieceBlock) -> anyhow::Result<&mut PartialPiece> {
        let PieceBlock {
            piece_index,
            block_index,
        } = block;

        if piece_index >= self.num_pieces() {
            anyhow::bail!("piece {piece_index} out of range ({} pieces)", self.num_pieces());
        }

        let blocks_in_piece = self.blocks_in_piece(piece_index);
        if block_index >= blocks_in_piece {
            anyhow::bail!(
                "block {block_index} out of range, piece {piece_index} has {blocks_in_piece} blocks"
            );
        }

        let pos = match self
            .download_queue
            .iter()
            .position(|piece| piece.piece_index() == piece_index)
        {
            Some(pos) => pos,
            None => {
                debug!(piece_index, "adding piece to download queue");
                self.download_queue
                    .push(PartialPiece::new(piece_index, blocks_in_piece));
                self.download_queue.len() - 1
            }
        };

        Ok(&mut self.download_queue[pos])
    }

    pub fn mark_as_requested(&mut self, block: PieceBlock, peer: PeerAddr) -> anyhow::Result<()> {
        if self.have_piece(block.piece_index) {
            anyhow::bail!("piece {} is already downloaded", block.piece_index);
        }

        let state = self
            .partial_for(block)?
            .block_mut(block.block_index)
            .context("block index checked by partial_for")?;

        if state.finished {
            trace!(?block, "request for a finished block, ignoring");
            return Ok(());
        }

        state.requested = true;
        state.peer = Some(peer);
        state.times_requested += 1;
        Ok(())
    }

    /// returns whether the block changed. Finishing an already finished block (or a block of a
    /// piece we already have) is a no-op.
    pub fn mark_as_finished(
        &mut self,
        block: PieceBlock,
        peer: Option<PeerAddr>,
    ) -> anyhow::Result<bool> {
        if self.have_piece(block.piece_index) {
            trace!(?block, "block of an already verified piece");
            return Ok(false);
        }

        let state = self
            .partial_for(block)?
            .block_mut(block.block_index)
            .context("block index checked by partial_for")?;

        if state.finished {
            trace!(?block, "duplicate block");
            return Ok(false);
        }

        state.finished = true;
        state.requested = false;
        if peer.is_some() {
            state.peer = peer;
        }
        Ok(true)
    }

    /// puts a requested block back into the unrequested state.
    pub fn abort_request(&mut self, block: PieceBlock) -> anyhow::Result<()> {
        let Some(pos) = self
            .download_queue
            .iter()
            .position(|piece| piece.piece_index() == block.piece_index)
        else {
            anyhow::bail!("piece {} is not being downloaded", block.piece_index);
        };

        let piece = &mut self.download_queue[pos];
        let Some(state) = piece.block_mut(block.block_index) else {
            anyhow::bail!("block {} out of range", block.block_index);
        };

        if !state.finished {
            state.requested = false;
            state.peer = None;
        }

        // nothing left in flight for this piece
        if piece.num_finished() == 0 && piece.num_requested() == 0 {
            self.download_queue.remove(pos);
        }
        Ok(())
    }

    /// result of the piece hash check. A passed piece leaves the queue and becomes a piece we
    /// have, a failed one is dropped from the queue so all of its blocks get requested again.
    pub fn piece_verified(&mut self, piece_id: PieceIndex, passed: bool) -> anyhow::Result<()> {
        let Some(pos) = self
            .download_queue
            .iter()
            .position(|piece| piece.piece_index() == piece_id)
        else {
            anyhow::bail!("piece {piece_id} is not in the download queue");
        };

        if !self.download_queue[pos].is_complete() {
            anyhow::bail!("piece {piece_id} verified before all its blocks finished");
        }

        self.download_queue.remove(pos);
        if passed {
            debug!(piece_id, "piece passed hash check");
            self.have.set(piece_id, true);
        } else {
            warn!(piece_id, "piece failed hash check, downloading it again");
        }
        Ok(())
    }

    pub fn handle_event(&mut self, event: PickerEvent) -> anyhow::Result<()> {
        type PE = PickerEvent;
        match event {
            PE::Requested { block, peer } => self.mark_as_requested(block, peer),
            PE::Finished { block, peer } => self.mark_as_finished(block, peer).map(|_| ()),
            PE::Aborted(block) => self.abort_request(block),
            PE::Verified {
                piece_index,
                passed,
            } => self.piece_verified(piece_index, passed),
        }
    }

    /// replaces the state with the result of a files check.
    pub(crate) fn restore(&mut self, have: Bitfield, partial: Vec<PartialPiece>) {
        assert_eq!(have.len(), self.num_pieces(), "have bitfield length mismatch");
        for piece in &partial {
            assert_eq!(
                piece.blocks_in_piece(),
                self.blocks_in_piece(piece.piece_index()),
                "block count mismatch for restored piece {}",
                piece.piece_index()
            );
        }
        self.have = have;
        self.download_queue = partial
            .into_iter()
            .filter(|piece| !self.have_piece(piece.piece_index()))
            .collect();
    }
}
