use bitvec::slice::BitSlice;
use bitvec::prelude::Msb0;

use crate::peers::{BlockIndex, PeerAddr, PieceIndex};
use crate::torrent::Bitfield;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockState {
    pub finished: bool,
    pub requested: bool,
    // the peer the block was last requested from (or received from)
    pub peer: Option<PeerAddr>,
    pub times_requested: u32,
}

/// a piece in the download queue: some of its blocks are requested or finished, but the piece
/// as a whole has not been verified yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialPiece {
    piece_index: PieceIndex,
    blocks_in_piece: u32,
    blocks: Vec<BlockState>,
}

impl PartialPiece {
    pub fn new(piece_index: PieceIndex, blocks_in_piece: u32) -> Self {
        Self {
            piece_index,
            blocks_in_piece,
            blocks: vec![BlockState::default(); blocks_in_piece as usize],
        }
    }

    /// partial piece with the set bits of `finished` marked as finished. Bits past
    /// `blocks_in_piece` are ignored.
    pub fn with_finished(
        piece_index: PieceIndex,
        blocks_in_piece: u32,
        finished: &BitSlice<u8, Msb0>,
    ) -> Self {
        let mut piece = Self::new(piece_index, blocks_in_piece);
        for (block, bit) in piece.blocks.iter_mut().zip(finished.iter()) {
            block.finished = *bit;
        }
        piece
    }

    pub fn piece_index(&self) -> PieceIndex {
        self.piece_index
    }

    pub fn blocks_in_piece(&self) -> u32 {
        self.blocks_in_piece
    }

    pub fn blocks(&self) -> &[BlockState] {
        &self.blocks
    }

    pub fn block(&self, block_index: BlockIndex) -> Option<&BlockState> {
        self.blocks.get(block_index as usize)
    }

    pub(super) fn block_mut(&mut self, block_index: BlockIndex) -> Option<&mut BlockState> {
        self.blocks.get_mut(block_index as usize)
    }

    pub fn num_finished(&self) -> usize {
        self.blocks.iter().filter(|b| b.finished).count()
    }

    pub fn num_requested(&self) -> usize {
        self.blocks.iter().filter(|b| b.requested).count()
    }

    pub fn is_complete(&self) -> bool {
        self.blocks.iter().all(|b| b.finished)
    }

    /// one bit per block, set when the block is finished.
    pub fn finished_blocks(&self) -> Bitfield {
        self.blocks.iter().map(|b| b.finished).collect()
    }

    pub fn requested_blocks(&self) -> Bitfield {
        self.blocks.iter().map(|b| b.requested).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitvec::bitvec;

    #[test]
    fn new_piece_has_one_unrequested_block_per_slot() {
        let piece = PartialPiece::new(3, 5);
        assert_eq!(piece.blocks().len(), 5);
        assert_eq!(piece.num_finished(), 0);
        assert_eq!(piece.num_requested(), 0);
        assert!(!piece.is_complete());
    }

    #[test]
    fn with_finished_ignores_bits_past_the_last_block() {
        let bits = bitvec![u8, Msb0; 1, 0, 1, 1, 1, 1, 1, 1];
        let piece = PartialPiece::with_finished(0, 3, &bits);
        assert_eq!(piece.finished_blocks(), bitvec![u8, Msb0; 1, 0, 1]);
        assert_eq!(piece.num_finished(), 2);
    }
}
