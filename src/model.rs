use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "aac", "ogg", "oga", "flac", "wav", "alac", "opus", "wma", "m4a", "aiff", "pcm", "ape",
    "tta", "dsf", "dff", "mpc", "amr",
];

pub const DEFAULT_PRESENCE_CLIENT_ID: &str = "1361395271183106248";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn next(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// A single audio file inside a playlist directory. Only the file name is
/// stored; the absolute path is resolved against the playlist directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Track {
    pub file_name: String,
}

impl Track {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// File name with a supported audio extension stripped.
    pub fn display_name(&self) -> &str {
        display_name(&self.file_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRef {
    pub name: String,
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub name: String,
    pub dir: PathBuf,
    pub tracks: Vec<Track>,
}

impl Playlist {
    pub fn reference(&self) -> PlaylistRef {
        PlaylistRef {
            name: self.name.clone(),
            dir: self.dir.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_volume")]
    pub volume: u8,
    #[serde(default = "default_presence_enabled")]
    pub presence_enabled: bool,
    #[serde(default = "default_presence_client_id")]
    pub presence_client_id: String,
}

fn default_volume() -> u8 {
    50
}

fn default_presence_enabled() -> bool {
    true
}

fn default_presence_client_id() -> String {
    DEFAULT_PRESENCE_CLIENT_ID.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            volume: default_volume(),
            presence_enabled: default_presence_enabled(),
            presence_client_id: default_presence_client_id(),
        }
    }
}

pub fn is_audio_file(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

pub fn display_name(file_name: &str) -> &str {
    let path = Path::new(file_name);
    if !is_audio_file(path) {
        return file_name;
    }
    path.file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or(file_name)
}

/// Case-insensitive file name order, ties broken by exact bytes so the order
/// is total and stable across refreshes.
pub fn compare_file_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

pub fn sort_tracks(tracks: &mut [Track]) {
    tracks.sort_by(|a, b| compare_file_names(&a.file_name, &b.file_name));
}
