use crate::model::Settings;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "playshelf";
const SETTINGS_FILE: &str = "settings.json";
const LOG_FILE: &str = "playshelf.log";
pub const HOME_ENV: &str = "PLAYSHELF_HOME";

/// On-disk layout rooted at the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    pub playlists_dir: PathBuf,
    pub thumbnails_dir: PathBuf,
    pub default_thumbnail: PathBuf,
    pub settings_file: PathBuf,
    pub log_file: PathBuf,
}

impl Layout {
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let contents = root.join("contents");
        Self {
            playlists_dir: root.join("playlists"),
            thumbnails_dir: contents.join("thumbnails"),
            default_thumbnail: contents.join("blank_t.png"),
            settings_file: root.join(SETTINGS_FILE),
            log_file: root.join(LOG_FILE),
            root,
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.root, &self.playlists_dir, &self.thumbnails_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Environment override wins, then the command line, then the per-user
/// config directory.
pub fn data_root(cli_override: Option<&Path>) -> Result<PathBuf> {
    if let Ok(override_dir) = env::var(HOME_ENV)
        && !override_dir.trim().is_empty()
    {
        return Ok(PathBuf::from(override_dir));
    }

    if let Some(path) = cli_override {
        return Ok(path.to_path_buf());
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn load_settings(layout: &Layout) -> Result<Settings> {
    let path = &layout.settings_file;
    if !path.exists() {
        return Ok(Settings::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;
    Ok(settings)
}

pub fn save_settings(layout: &Layout, settings: &Settings) -> Result<()> {
    fs::create_dir_all(&layout.root)
        .with_context(|| format!("failed to create {}", layout.root.display()))?;
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(&layout.settings_file, json)
        .with_context(|| format!("failed to write {}", layout.settings_file.display()))?;
    Ok(())
}
