use crate::config::Layout;
use crate::error::{PlayerError, Result};
use crate::model::{Playlist, Track, compare_file_names, is_audio_file, sort_tracks};
use crate::thumbnail;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Result of copying files into a playlist directory.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub added: Vec<String>,
    pub skipped_existing: Vec<String>,
    pub failed: Vec<(PathBuf, String)>,
}

impl ImportReport {
    pub fn summary(&self) -> String {
        let mut text = format!("Added {} track(s)", self.added.len());
        if !self.skipped_existing.is_empty() {
            text.push_str(&format!(
                ", skipped {} existing (use add! to replace)",
                self.skipped_existing.len()
            ));
        }
        if !self.failed.is_empty() {
            text.push_str(&format!(", {} failed", self.failed.len()));
        }
        text
    }
}

/// One directory per playlist under the playlists root, one PNG per playlist
/// in the thumbnails directory.
#[derive(Debug, Clone)]
pub struct PlaylistStore {
    layout: Layout,
}

impl PlaylistStore {
    /// Creates the store directories and the default cover when missing.
    pub fn open(layout: Layout) -> Result<Self> {
        fs::create_dir_all(&layout.playlists_dir)?;
        fs::create_dir_all(&layout.thumbnails_dir)?;
        if !layout.default_thumbnail.is_file() {
            if let Some(parent) = layout.default_thumbnail.parent() {
                fs::create_dir_all(parent)?;
            }
            thumbnail::write_placeholder(&layout.default_thumbnail)?;
            log::info!("wrote default thumbnail {}", layout.default_thumbnail.display());
        }
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.layout.playlists_dir)?.filter_map(|entry| entry.ok()) {
            if entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false) {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort_by(|a, b| compare_file_names(a, b));
        Ok(names)
    }

    pub fn load(&self, name: &str) -> Result<Playlist> {
        let dir = self.existing_dir(name)?;
        let mut tracks = Vec::new();
        for entry in fs::read_dir(&dir)?.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            let is_file = entry.file_type().map(|kind| kind.is_file()).unwrap_or(false);
            if is_file && is_audio_file(&path) {
                tracks.push(Track::new(entry.file_name().to_string_lossy()));
            }
        }
        sort_tracks(&mut tracks);
        Ok(Playlist {
            name: name.to_string(),
            dir,
            tracks,
        })
    }

    /// Creates the playlist directory. A bad thumbnail does not abort the
    /// creation: it is returned as a warning and the default image is used.
    pub fn create(&self, name: &str, thumbnail: Option<&Path>) -> Result<Option<PlayerError>> {
        let dir = self.playlist_dir(name)?;
        if dir.exists() {
            return Err(PlayerError::PlaylistExists(name.to_string()));
        }
        fs::create_dir_all(&dir)?;
        log::info!("created playlist {name}");

        let Some(source) = thumbnail else {
            return Ok(None);
        };
        match self.set_thumbnail(name, source) {
            Ok(()) => Ok(None),
            Err(err @ PlayerError::ThumbnailInvalid(_)) => {
                log::warn!("playlist {name} falls back to the default thumbnail: {err}");
                Ok(Some(err))
            }
            Err(err) => Err(err),
        }
    }

    pub fn set_thumbnail(&self, name: &str, source: &Path) -> Result<()> {
        self.existing_dir(name)?;
        let image = thumbnail::validate(source)?;
        thumbnail::save_png(&image, &self.thumbnail_path(name))?;
        log::info!("updated thumbnail for {name}");
        Ok(())
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let dir = self.existing_dir(name)?;
        fs::remove_dir_all(&dir)?;
        let thumb = self.thumbnail_path(name);
        if thumb.exists() {
            fs::remove_file(&thumb)?;
        }
        log::info!("deleted playlist {name}");
        Ok(())
    }

    /// The playlist's own PNG, else the default image, else nothing.
    pub fn thumbnail_for(&self, name: &str) -> Option<PathBuf> {
        let own = self.thumbnail_path(name);
        if own.is_file() {
            return Some(own);
        }
        self.layout
            .default_thumbnail
            .is_file()
            .then(|| self.layout.default_thumbnail.clone())
    }

    /// Copies audio files into the playlist. Directories are walked
    /// recursively; files that already exist are skipped unless `overwrite`.
    pub fn import(&self, name: &str, sources: &[PathBuf], overwrite: bool) -> Result<ImportReport> {
        let dir = self.existing_dir(name)?;
        let mut report = ImportReport::default();

        let mut files = Vec::new();
        for source in sources {
            if source.is_dir() {
                files.extend(
                    WalkDir::new(source)
                        .follow_links(true)
                        .into_iter()
                        .filter_map(|entry| entry.ok())
                        .filter(|entry| entry.file_type().is_file() && is_audio_file(entry.path()))
                        .map(|entry| entry.into_path()),
                );
            } else if !source.exists() {
                report
                    .failed
                    .push((source.clone(), String::from("file not found")));
            } else if !is_audio_file(source) {
                report
                    .failed
                    .push((source.clone(), String::from("unsupported audio format")));
            } else {
                files.push(source.clone());
            }
        }

        for file in files {
            let Some(file_name) = file.file_name() else {
                continue;
            };
            let label = file_name.to_string_lossy().to_string();
            let dest = dir.join(file_name);
            if dest.exists() && !overwrite {
                report.skipped_existing.push(label);
                continue;
            }
            match fs::copy(&file, &dest) {
                Ok(_) => report.added.push(label),
                Err(err) => {
                    log::warn!("failed to import {}: {err}", file.display());
                    report.failed.push((file, err.to_string()));
                }
            }
        }

        log::info!("import into {name}: {}", report.summary());
        Ok(report)
    }

    fn thumbnail_path(&self, name: &str) -> PathBuf {
        self.layout.thumbnails_dir.join(format!("{name}.png"))
    }

    fn playlist_dir(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.layout.playlists_dir.join(name))
    }

    fn existing_dir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.playlist_dir(name)?;
        if !dir.is_dir() {
            return Err(PlayerError::PlaylistNotFound(name.to_string()));
        }
        Ok(dir)
    }
}

fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    let invalid = trimmed.is_empty()
        || trimmed != name
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(PlayerError::InvalidPlaylistName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thumbnail::tests::write_png;
    use tempfile::{TempDir, tempdir};

    fn store() -> (TempDir, PlaylistStore) {
        let dir = tempdir().expect("tempdir");
        let store = PlaylistStore::open(Layout::under(dir.path())).expect("store");
        (dir, store)
    }

    #[test]
    fn rejects_names_that_escape_the_root() {
        let (_dir, store) = store();
        for bad in ["", "  ", "..", ".", "a/b", r"a\b", " padded"] {
            assert!(
                matches!(store.create(bad, None), Err(PlayerError::InvalidPlaylistName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn create_twice_reports_existing_playlist() {
        let (_dir, store) = store();
        assert!(store.create("mix", None).expect("create").is_none());
        assert!(matches!(
            store.create("mix", None),
            Err(PlayerError::PlaylistExists(name)) if name == "mix"
        ));
    }

    #[test]
    fn invalid_thumbnail_is_a_warning_not_a_failure() {
        let (dir, store) = store();
        let small = dir.path().join("small.png");
        write_png(&small, 64, 64);

        let warning = store.create("mix", Some(&small)).expect("create");
        assert!(matches!(warning, Some(PlayerError::ThumbnailInvalid(_))));
        assert_eq!(store.list().expect("list"), vec![String::from("mix")]);
        assert_eq!(
            store.thumbnail_for("mix"),
            Some(store.layout().default_thumbnail.clone())
        );
    }

    #[test]
    fn thumbnail_falls_back_to_default_image() {
        let (_dir, store) = store();
        store.create("mix", None).expect("create");
        write_png(&store.layout().default_thumbnail, 512, 512);
        assert_eq!(
            store.thumbnail_for("mix"),
            Some(store.layout().default_thumbnail.clone())
        );
    }

    #[test]
    fn set_thumbnail_keeps_previous_image_on_error() {
        let (dir, store) = store();
        let good = dir.path().join("good.png");
        let bad = dir.path().join("bad.png");
        write_png(&good, 512, 512);
        write_png(&bad, 100, 100);

        store.create("mix", Some(&good)).expect("create");
        let saved = store.thumbnail_for("mix").expect("thumbnail");
        assert!(saved.starts_with(&store.layout().thumbnails_dir));

        assert!(store.set_thumbnail("mix", &bad).is_err());
        assert_eq!(store.thumbnail_for("mix"), Some(saved));
    }

    #[test]
    fn load_lists_supported_tracks_sorted() {
        let (_dir, store) = store();
        store.create("mix", None).expect("create");
        let playlist_dir = store.layout().playlists_dir.join("mix");
        for name in ["b.mp3", "A.flac", "cover.jpg", "c.OGG"] {
            fs::write(playlist_dir.join(name), b"").expect("write");
        }
        fs::create_dir(playlist_dir.join("nested.mp3")).expect("dir");

        let playlist = store.load("mix").expect("load");
        let names: Vec<&str> = playlist.tracks.iter().map(|t| t.file_name.as_str()).collect();
        assert_eq!(names, vec!["A.flac", "b.mp3", "c.OGG"]);
        assert_eq!(playlist.dir, playlist_dir);
    }

    #[test]
    fn load_missing_playlist_fails() {
        let (_dir, store) = store();
        assert!(matches!(store.load("ghost"), Err(PlayerError::PlaylistNotFound(_))));
    }

    #[test]
    fn delete_removes_directory_and_thumbnail() {
        let (dir, store) = store();
        let good = dir.path().join("good.png");
        write_png(&good, 512, 512);
        store.create("mix", Some(&good)).expect("create");

        store.delete("mix").expect("delete");
        assert!(store.list().expect("list").is_empty());
        assert!(!store.layout().thumbnails_dir.join("mix.png").exists());
    }

    #[test]
    fn import_skips_existing_unless_overwriting() {
        let (dir, store) = store();
        store.create("mix", None).expect("create");

        let source_dir = dir.path().join("incoming");
        fs::create_dir_all(source_dir.join("deeper")).expect("dirs");
        fs::write(source_dir.join("one.mp3"), b"new").expect("write");
        fs::write(source_dir.join("deeper").join("two.wav"), b"two").expect("write");
        fs::write(source_dir.join("notes.txt"), b"skip").expect("write");
        let target = store.layout().playlists_dir.join("mix");
        fs::write(target.join("one.mp3"), b"old").expect("write");

        let report = store
            .import("mix", std::slice::from_ref(&source_dir), false)
            .expect("import");
        assert_eq!(report.added, vec![String::from("two.wav")]);
        assert_eq!(report.skipped_existing, vec![String::from("one.mp3")]);
        assert_eq!(fs::read(target.join("one.mp3")).expect("read"), b"old");

        let report = store
            .import("mix", &[source_dir.join("one.mp3")], true)
            .expect("import");
        assert_eq!(report.added, vec![String::from("one.mp3")]);
        assert_eq!(fs::read(target.join("one.mp3")).expect("read"), b"new");
    }

    #[test]
    fn import_reports_missing_and_unsupported_files() {
        let (dir, store) = store();
        store.create("mix", None).expect("create");
        let text = dir.path().join("notes.txt");
        fs::write(&text, b"x").expect("write");

        let report = store
            .import("mix", &[dir.path().join("ghost.mp3"), text], false)
            .expect("import");
        assert!(report.added.is_empty());
        assert_eq!(report.failed.len(), 2);
        assert!(report.summary().contains("2 failed"));
    }
}
