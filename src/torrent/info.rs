use crate::peers::{PieceIndex, PieceLength};
use crate::resume::ResumeLayout;

use super::{InfoHash, PieceHash};

/// immutable metadata of a torrent, shared between the checking queue and the live torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentInfo {
    info_hash: InfoHash,
    name: String,
    piece_length: PieceLength,
    total_length: u64,
    piece_hashes: Vec<PieceHash>,
}

impl TorrentInfo {
    /// `piece_hashes` must hold exactly `ceil(total_length / piece_length)` hashes.
    pub fn new(
        info_hash: InfoHash,
        name: impl Into<String>,
        piece_length: PieceLength,
        total_length: u64,
        piece_hashes: Vec<PieceHash>,
    ) -> anyhow::Result<Self> {
        if piece_length == 0 {
            anyhow::bail!("piece length must be non-zero");
        }

        let expected = total_length.div_ceil(piece_length as u64);
        if expected != piece_hashes.len() as u64 {
            anyhow::bail!(
                "torrent of {total_length} bytes with {piece_length} byte pieces needs {expected} \
                 piece hashes, got {}",
                piece_hashes.len()
            );
        }

        Ok(Self {
            info_hash,
            name: name.into(),
            piece_length,
            total_length,
            piece_hashes,
        })
    }

    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn piece_length(&self) -> PieceLength {
        self.piece_length
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn num_pieces(&self) -> usize {
        self.piece_hashes.len()
    }

    pub fn piece_hash(&self, piece_id: PieceIndex) -> &PieceHash {
        &self.piece_hashes[piece_id]
    }

    /// length of the given piece, only the last one may be shorter than `piece_length`.
    pub fn piece_size(&self, piece_id: PieceIndex) -> PieceLength {
        assert!(piece_id < self.num_pieces(), "piece index out of range");
        let offset = piece_id as u64 * self.piece_length as u64;
        (self.total_length - offset).min(self.piece_length as u64) as PieceLength
    }

    /// block size used for this torrent's pieces when `requested` is configured: capped at the
    /// piece length. None unless every piece but the last is a whole number of blocks, which
    /// the resume data layout depends on.
    pub fn block_size_for(&self, requested: u32) -> Option<u32> {
        let block_size = requested.min(self.piece_length);
        (block_size != 0 && self.piece_length % block_size == 0).then_some(block_size)
    }

    pub fn blocks_in_piece(&self, piece_id: PieceIndex, block_size: u32) -> u32 {
        self.piece_size(piece_id).div_ceil(block_size)
    }

    /// layout a resume blob for this torrent must follow.
    pub fn resume_layout(&self, block_size: u32) -> ResumeLayout {
        let last_piece_blocks = match self.num_pieces() {
            0 => 0,
            n => self.blocks_in_piece(n - 1, block_size),
        };

        ResumeLayout {
            info_hash: self.info_hash,
            num_pieces: self.num_pieces(),
            blocks_per_piece: self.piece_length / block_size,
            last_piece_blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn info(piece_length: u32, total_length: u64) -> TorrentInfo {
        let n = total_length.div_ceil(piece_length as u64) as usize;
        TorrentInfo::new(InfoHash::new([1; 20]), "t", piece_length, total_length, vec![[0; 20]; n])
            .unwrap()
    }

    #[rstest]
    #[case(0, 0x8000)]
    #[case(2, 0x8000)]
    #[case(3, 0x1000)]
    fn last_piece_is_truncated(#[case] piece_id: usize, #[case] expected: u32) {
        let info = info(0x8000, 3 * 0x8000 + 0x1000);
        assert_eq!(info.num_pieces(), 4);
        assert_eq!(info.piece_size(piece_id), expected);
    }

    #[test]
    fn resume_layout_accounts_for_the_short_last_piece() {
        let info = info(0x10000, 2 * 0x10000 + 0x4001);
        let layout = info.resume_layout(0x4000);
        assert_eq!(layout.num_pieces, 3);
        assert_eq!(layout.blocks_per_piece, 4);
        assert_eq!(layout.last_piece_blocks, 2);
    }

    #[rstest]
    #[case::whole_blocks(0x8000, 0x4000, Some(0x4000))]
    #[case::capped_at_piece_length(0x1000, 0x4000, Some(0x1000))]
    #[case::one_and_a_half_blocks(0x6000, 0x4000, None)]
    #[case::zero(0x8000, 0, None)]
    fn block_size_must_divide_the_piece_length(
        #[case] piece_length: u32,
        #[case] requested: u32,
        #[case] expected: Option<u32>,
    ) {
        let info = info(piece_length, 4 * piece_length as u64);
        assert_eq!(info.block_size_for(requested), expected);
    }

    #[test]
    fn rejects_hash_count_mismatch() {
        let res = TorrentInfo::new(InfoHash::new([1; 20]), "t", 16, 33, vec![[0; 20]; 2]);
        assert!(res.is_err());
    }
}
