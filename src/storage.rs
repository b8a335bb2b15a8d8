use std::collections::HashMap;

use parking_lot::Mutex;

use crate::peers::PieceIndex;

/// read side of the disk collaborator, used by the checking worker to hash what is already on
/// disk.
pub trait PieceStorage: Send + Sync {
    /// bytes stored for the piece, None when nothing was ever written for it.
    fn read_piece(&self, piece_id: PieceIndex) -> anyhow::Result<Option<Vec<u8>>>;
}

/// storage kept in memory, pieces are stored whole.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    pieces: Mutex<HashMap<PieceIndex, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_piece(&self, piece_id: PieceIndex, data: Vec<u8>) {
        self.pieces.lock().insert(piece_id, data);
    }
}

impl PieceStorage for MemoryStorage {
    fn read_piece(&self, piece_id: PieceIndex) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.pieces.lock().get(&piece_id).cloned())
    }
}
