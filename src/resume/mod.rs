//! resume data: a snapshot of which storage slot holds which piece and which blocks of the
//! unfinished pieces are already on disk, so a restart doesn't have to hash everything again.
//!
//! The byte layout is the legacy one and has no version tag, all integers are 4 byte big
//! endian:
//!
//! ```text
//! info hash           20 bytes
//! slot count          i32
//! slots               slot count * i32    (piece index, -1 unassigned, -2 reserved)
//! blocks per piece    i32
//! unfinished count    i32
//! unfinished pieces   unfinished count * (piece index i32, finished block bitmask)
//! ```
//!
//! bit `k` of bitmask byte `j` is set when block `j * 8 + k` is finished.

mod codec;
mod slot_map;

use crate::peers::PieceIndex;
use crate::piece_picker::{PartialPiece, PiecePicker};
use crate::torrent::{Bitfield, InfoHash};

pub use self::errors::ResumeDataError;
pub use slot_map::{PieceSlotMap, SlotState};

/// what a resume blob has to look like to be accepted for a given torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeLayout {
    pub info_hash: InfoHash,
    pub num_pieces: usize,
    pub blocks_per_piece: u32,
    // the last piece may be shorter
    pub last_piece_blocks: u32,
}

impl ResumeLayout {
    pub fn blocks_in_piece(&self, piece_id: PieceIndex) -> u32 {
        if piece_id + 1 == self.num_pieces {
            self.last_piece_blocks
        } else {
            self.blocks_per_piece
        }
    }

    pub fn bitmask_len(&self) -> usize {
        (self.blocks_per_piece as usize).div_ceil(8).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnfinishedPiece {
    pub piece_index: PieceIndex,
    // one bit per block of the piece
    pub finished: Bitfield,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeData {
    pub info_hash: InfoHash,
    pub slots: PieceSlotMap,
    pub blocks_per_piece: u32,
    pub unfinished: Vec<UnfinishedPiece>,
}

impl ResumeData {
    /// snapshot of the picker's download queue together with the storage slot map.
    pub fn from_picker(info_hash: InfoHash, slots: PieceSlotMap, picker: &PiecePicker) -> Self {
        let unfinished = picker
            .download_queue()
            .iter()
            .map(|piece| UnfinishedPiece {
                piece_index: piece.piece_index(),
                finished: piece.finished_blocks(),
            })
            .collect();

        Self {
            info_hash,
            slots,
            blocks_per_piece: picker.blocks_per_piece(),
            unfinished,
        }
    }

    /// the unfinished pieces as download queue entries, with no request state.
    pub fn partial_pieces(&self, layout: &ResumeLayout) -> Vec<PartialPiece> {
        self.unfinished
            .iter()
            .map(|piece| {
                PartialPiece::with_finished(
                    piece.piece_index,
                    layout.blocks_in_piece(piece.piece_index),
                    &piece.finished,
                )
            })
            .collect()
    }

    /// pieces that sit in an assigned slot and are not listed as unfinished.
    pub fn verified_pieces(&self, num_pieces: usize) -> Bitfield {
        let mut have = Bitfield::new();
        have.resize(num_pieces, false);

        for piece_id in self.slots.assigned_pieces() {
            if piece_id < num_pieces {
                have.set(piece_id, true);
            }
        }
        for piece in &self.unfinished {
            if piece.piece_index < num_pieces {
                have.set(piece.piece_index, false);
            }
        }
        have
    }
}

mod errors {
    use thiserror::Error;

    use crate::peers::PieceIndex;

    /// why a resume blob was rejected. Any of these means the torrent has to be checked from
    /// scratch.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum ResumeDataError {
        #[error("resume data truncated while reading {field}")]
        Truncated { field: &'static str },

        #[error("resume data belongs to a different torrent")]
        InfoHashMismatch,

        #[error("negative {field}: {value}")]
        NegativeCount { field: &'static str, value: i32 },

        #[error("slot {slot} holds invalid piece index {value}")]
        SlotOutOfRange { slot: usize, value: i32 },

        #[error("piece {piece} is assigned to more than one slot")]
        DuplicateSlotPiece { piece: PieceIndex },

        #[error("resume data has {found} blocks per piece, torrent has {expected}")]
        BlocksPerPieceMismatch { expected: u32, found: i32 },

        #[error("unfinished piece index {value} out of range")]
        PieceOutOfRange { value: i32 },

        #[error("piece {piece} is listed as unfinished more than once")]
        DuplicateUnfinishedPiece { piece: PieceIndex },

        #[error("{count} unexpected bytes after the last unfinished piece")]
        TrailingBytes { count: usize },
    }
}
