use serde::Deserialize;

use crate::piece_picker::BLOCK_SIZE;

/// tunables of the session core. The host application owns loading them (it can embed this in
/// its own config file), nothing here reads files or the environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// request granularity, capped at the piece length of each torrent
    pub block_size: u32,
    /// upload slots per torrent, None for unlimited
    pub max_uploads: Option<u32>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            max_uploads: None,
        }
    }
}
