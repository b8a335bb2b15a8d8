//! session core of a bittorrent client: the torrent lookup facade over the checking queue and
//! the live torrents, the per-torrent download progress model, the resume data codec and the
//! structured value used for metadata and dht messages.

pub mod config;
pub mod peers;
pub mod piece_picker;
mod prelude;
pub mod resume;
pub mod session;
pub mod storage;
pub mod torrent;
pub mod value;

pub use config::SessionSettings;
pub use session::{
    AddTorrentError, AddTorrentParams, CheckingWorker, InvalidHandle, Session, TorrentHandle,
};
pub use torrent::{InfoHash, TorrentInfo, TorrentState, TorrentStatus};
pub use value::Value;
