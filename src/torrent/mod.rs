mod info;
mod live;
mod status;

use std::fmt;

use bitvec::prelude::{BitVec, Msb0};
use rand::Rng;

pub use info::TorrentInfo;
pub use live::Torrent;
pub use status::{TorrentState, TorrentStatus};

pub type PieceHash = [u8; 20];

/// one bit per piece, the first piece being the highest bit of the first byte (same layout as
/// the bitfield message on the wire).
pub type Bitfield = BitVec<u8, Msb0>;

/// sha1 of the bencoded info dictionary, the key every torrent is looked up by.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    pub const LEN: usize = 20;

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; 20] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({self})")
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId([u8; 20]);

impl PeerId {
    const CLIENT_PREFIX: &'static [u8; 8] = b"-CX0001-";

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    // azureus style id, client prefix followed by random bytes
    pub fn random() -> Self {
        let mut bytes = [0u8; 20];
        bytes[..Self::CLIENT_PREFIX.len()].copy_from_slice(Self::CLIENT_PREFIX);
        rand::thread_rng().fill(&mut bytes[Self::CLIENT_PREFIX.len()..]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", hex::encode(self.0))
    }
}
