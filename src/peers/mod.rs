use std::net::SocketAddr;

mod peer_info;

pub use peer_info::{BlockProgress, PeerFlags, PeerInfo};

pub type PeerAddr = SocketAddr;
pub type PieceIndex = usize;
pub type PieceLength = u32;
pub type BlockIndex = u32;
