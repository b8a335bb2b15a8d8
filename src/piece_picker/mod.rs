mod comms;
mod partial_piece;
mod piece_picker;

use crate::peers::{BlockIndex, PieceIndex};

pub use comms::PickerEvent;
pub use partial_piece::{BlockState, PartialPiece};
pub use piece_picker::PiecePicker;

/// request granularity, the de facto standard 16 KiB. Pieces smaller than this are a single
/// block.
pub const BLOCK_SIZE: u32 = 0x4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PieceBlock {
    pub piece_index: PieceIndex,
    pub block_index: BlockIndex,
}

impl PieceBlock {
    pub fn new(piece_index: PieceIndex, block_index: BlockIndex) -> Self {
        Self {
            piece_index,
            block_index,
        }
    }
}
