//! Error taxonomy shared by the controller, the media engines and the
//! playlist store.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    /// The track file vanished between listing and playback.
    #[error("file not found: {}", .0.display())]
    FileMissing(PathBuf),

    #[error("track index {index} is out of range (playlist has {len} tracks)")]
    OutOfRange { index: usize, len: usize },

    #[error("volume {0} is outside 0-100")]
    InvalidVolume(i32),

    /// Non-fatal: only the presence side channel is disabled.
    #[error("presence unavailable: {0}")]
    PresenceUnavailable(String),

    #[error("invalid thumbnail: {0}")]
    ThumbnailInvalid(String),

    /// The engine accepted the path but could not decode or start it.
    #[error("playback failed for {}: {reason}", .path.display())]
    PlaybackFailed { path: PathBuf, reason: String },

    #[error("playlist already exists: {0}")]
    PlaylistExists(String),

    #[error("playlist not found: {0}")]
    PlaylistNotFound(String),

    #[error("invalid playlist name: {0:?}")]
    InvalidPlaylistName(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
