use crate::peers::{PeerAddr, PieceIndex};

use super::PieceBlock;

/// block and piece updates reported by the peer connections and the hashing collaborator,
/// applied with [super::PiecePicker::handle_event].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerEvent {
    // a request for the block was sent to the peer
    Requested { block: PieceBlock, peer: PeerAddr },

    // block data arrived. may arrive more than once for the same block in end game mode, the
    // duplicates are ignored
    Finished {
        block: PieceBlock,
        peer: Option<PeerAddr>,
    },

    // the peer choked us or died before sending the block, it can be requested again
    Aborted(PieceBlock),

    // all blocks of the piece are in and the piece hash was checked
    Verified { piece_index: PieceIndex, passed: bool },
}
