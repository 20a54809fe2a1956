use crate::audio::{MediaEngine, NullMediaEngine, RodioEngine};
use crate::config::{self, Layout};
use crate::controller::PlaybackController;
use crate::library::PlaylistStore;
use crate::model::Settings;
use crate::presence::PresenceReporter;
use crate::thumbnail;
use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use image::RgbImage;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::Rect;
use std::io::{Stdout, stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

const VOLUME_STEP: i32 = 5;

pub struct StartupOptions {
    pub layout: Layout,
    pub presence: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Playlists,
    Playlist,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Command(String),
    ConfirmDelete(String),
}

/// Downscaled thumbnail kept between frames, keyed by source and cell size.
pub struct PreviewCache {
    pub source: PathBuf,
    pub columns: u16,
    pub rows: u16,
    pub pixels: RgbImage,
}

pub struct App {
    pub store: PlaylistStore,
    pub controller: PlaybackController,
    pub settings: Settings,
    pub view: View,
    pub playlists: Vec<String>,
    pub selected_playlist: usize,
    pub selected_track: usize,
    pub input: InputMode,
    pub status: String,
    pub preview: Option<PreviewCache>,
    pub dirty: bool,
    pub should_quit: bool,
}

pub fn run(options: StartupOptions) -> Result<()> {
    let settings = config::load_settings(&options.layout)?;
    let store = PlaylistStore::open(options.layout)?;

    let engine: Box<dyn MediaEngine> = match RodioEngine::new() {
        Ok(engine) => Box::new(engine),
        Err(err) => {
            log::warn!("audio output unavailable, using null engine: {err:#}");
            Box::new(NullMediaEngine::new())
        }
    };
    let presence = if options.presence {
        connect_presence(&settings.presence_client_id)
    } else {
        None
    };
    let controller = PlaybackController::new(engine, presence);
    let mut app = App::new(store, controller, settings);

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = event_loop(&mut terminal, &mut app);
    let restored = restore_terminal(&mut terminal);
    finish(&mut app, result, restored)
}

fn event_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let mut last_draw = Instant::now();
    let mut list_rect = Rect::default();

    loop {
        app.pump(Instant::now());
        if app.should_quit {
            return Ok(());
        }

        if app.dirty || last_draw.elapsed() > Duration::from_millis(250) {
            let area = terminal.size()?;
            let area = Rect::new(0, 0, area.width, area.height);
            let preview = crate::ui::preview_rect(area, app.view);
            app.ensure_preview(preview.width, preview.height);
            terminal.draw(|frame| {
                list_rect = crate::ui::list_rect(frame.area());
                crate::ui::draw(frame, app)
            })?;
            app.dirty = false;
            last_draw = Instant::now();
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key(key),
            Event::Mouse(mouse) => app.handle_mouse(mouse, list_rect),
            Event::Resize(..) => app.dirty = true,
            _ => {}
        }
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Stops playback and saves settings whatever the loop returned, then reports
/// the first error.
fn finish(app: &mut App, result: Result<()>, restored: Result<()>) -> Result<()> {
    let saved = app.shutdown();
    result?;
    restored?;
    saved
}

#[cfg(any(unix, windows))]
fn connect_presence(client_id: &str) -> Option<Box<dyn PresenceReporter>> {
    Some(Box::new(crate::presence::PresenceWorker::connect(
        client_id.to_string(),
    )))
}

#[cfg(not(any(unix, windows)))]
fn connect_presence(_client_id: &str) -> Option<Box<dyn PresenceReporter>> {
    None
}

impl App {
    pub fn new(store: PlaylistStore, mut controller: PlaybackController, settings: Settings) -> Self {
        if let Err(err) = controller.set_volume(i32::from(settings.volume)) {
            log::warn!("ignoring saved volume: {err}");
        }
        controller.set_presence_enabled(settings.presence_enabled);

        let mut app = Self {
            store,
            controller,
            settings,
            view: View::Playlists,
            playlists: Vec::new(),
            selected_playlist: 0,
            selected_track: 0,
            input: InputMode::Normal,
            status: String::from("Ready. Press : for commands"),
            preview: None,
            dirty: true,
            should_quit: false,
        };
        app.reload_playlists();
        app
    }

    pub fn selected_playlist_name(&self) -> Option<&str> {
        self.playlists
            .get(self.selected_playlist)
            .map(String::as_str)
    }

    /// Playlist that commands act on: the open one, else the highlighted one.
    pub fn target_playlist(&self) -> Option<String> {
        match self.view {
            View::Playlist => self
                .controller
                .session()
                .current_playlist
                .as_ref()
                .map(|playlist| playlist.name.clone()),
            View::Playlists => self.selected_playlist_name().map(str::to_string),
        }
    }

    /// Drains engine events and advances the progress clock.
    pub fn pump(&mut self, now: Instant) {
        let before = self.controller.load_count();
        match self.controller.drain_events() {
            Ok(0) => {}
            Ok(_) => {
                if self.controller.load_count() != before {
                    self.follow_current_track();
                    self.announce_current();
                }
                self.dirty = true;
            }
            Err(err) => self.set_status(format!("playback error: {err}")),
        }
        self.controller.tick(now);
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match &mut self.input {
            InputMode::Command(buffer) => {
                match key.code {
                    KeyCode::Esc => self.input = InputMode::Normal,
                    KeyCode::Enter => {
                        let line = std::mem::take(buffer);
                        self.input = InputMode::Normal;
                        self.run_command(&line);
                    }
                    KeyCode::Backspace => {
                        buffer.pop();
                    }
                    KeyCode::Char(ch) => buffer.push(ch),
                    _ => {}
                }
                self.dirty = true;
                return;
            }
            InputMode::ConfirmDelete(name) => {
                let name = name.clone();
                self.input = InputMode::Normal;
                if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                    self.delete_playlist(&name);
                } else {
                    self.set_status(String::from("Delete cancelled"));
                }
                self.dirty = true;
                return;
            }
            InputMode::Normal => {}
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char(':') => self.input = InputMode::Command(String::new()),
            KeyCode::Down => self.move_selection(1),
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Char('r') => self.refresh(),
            _ => match self.view {
                View::Playlists => self.handle_playlists_key(key),
                View::Playlist => self.handle_playlist_key(key),
            },
        }
        self.dirty = true;
    }

    fn handle_playlists_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.open_selected_playlist(),
            KeyCode::Char('t') => {
                self.settings.theme = self.settings.theme.next();
                self.set_status(format!("Theme: {:?}", self.settings.theme));
            }
            _ => {}
        }
    }

    fn handle_playlist_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                let result = self.controller.select_track(self.selected_track);
                self.after_navigation(result);
            }
            KeyCode::Char(' ') => {
                self.controller.toggle_pause();
                if self.controller.session().track_loaded {
                    let label = if self.controller.session().paused {
                        "Paused"
                    } else {
                        "Resumed"
                    };
                    self.set_status(String::from(label));
                }
            }
            KeyCode::Char('n') => {
                let result = self.controller.next(true);
                self.after_navigation(result);
            }
            KeyCode::Char('b') => {
                let result = self.controller.previous();
                self.after_navigation(result);
            }
            KeyCode::Char('x') => {
                let result = self.controller.shuffle();
                self.after_navigation(result);
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.step_volume(VOLUME_STEP),
            KeyCode::Char('-') => self.step_volume(-VOLUME_STEP),
            KeyCode::Char('d') => {
                let enabled = !self.controller.presence_enabled();
                self.controller.set_presence_enabled(enabled);
                self.settings.presence_enabled = enabled;
                let status = match (enabled, self.controller.presence_available()) {
                    (true, true) => "Discord presence on",
                    (true, false) => "Discord presence on (not connected)",
                    (false, _) => "Discord presence off",
                };
                self.set_status(String::from(status));
            }
            KeyCode::Esc | KeyCode::Backspace => self.leave_playlist(),
            _ => {}
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent, list_rect: Rect) {
        if !point_in_rect(mouse.column, mouse.row, list_rect) {
            return;
        }
        match mouse.kind {
            MouseEventKind::ScrollDown => self.move_selection(1),
            MouseEventKind::ScrollUp => self.move_selection(-1),
            _ => return,
        }
        self.dirty = true;
    }

    pub fn run_command(&mut self, raw: &str) {
        let input = raw.trim();
        if input.is_empty() {
            self.set_status(String::from("No command"));
            return;
        }

        let mut split = input.splitn(2, char::is_whitespace);
        let command = split.next().unwrap_or_default();
        let rest = split.next().unwrap_or("").trim();

        match command {
            "help" => self.set_status(String::from(
                "Commands: new <name> [thumbnail] | thumb <path> | add <path> | add! <path> | delete",
            )),
            "new" => self.create_playlist(rest),
            "thumb" => self.change_thumbnail(rest),
            "add" => self.import(rest, false),
            "add!" => self.import(rest, true),
            "delete" => match (self.view, self.selected_playlist_name()) {
                (View::Playlists, Some(name)) => {
                    let name = name.to_string();
                    self.set_status(format!("Delete playlist {name}? (y/n)"));
                    self.input = InputMode::ConfirmDelete(name);
                }
                (View::Playlists, None) => self.set_status(String::from("No playlist selected")),
                (View::Playlist, _) => {
                    self.set_status(String::from("Go back to the playlist list to delete"))
                }
            },
            _ => self.set_status(String::from("Unknown command. Use :help")),
        }
    }

    pub fn shutdown(&mut self) -> Result<()> {
        self.controller.stop_and_clear();
        self.settings.volume = self.controller.session().volume;
        self.settings.presence_enabled = self.controller.presence_enabled();
        config::save_settings(self.store.layout(), &self.settings)
    }

    /// Rebuilds the cached preview when the thumbnail or the target size changed.
    pub fn ensure_preview(&mut self, columns: u16, rows: u16) {
        let source = self
            .target_playlist()
            .and_then(|name| self.store.thumbnail_for(&name));
        let Some(source) = source.filter(|_| columns > 0 && rows > 0) else {
            self.preview = None;
            return;
        };
        let fresh = self.preview.as_ref().is_some_and(|cache| {
            cache.source == source && cache.columns == columns && cache.rows == rows
        });
        if fresh {
            return;
        }
        self.preview = match thumbnail::preview(&source, columns, rows) {
            Ok(pixels) => Some(PreviewCache {
                source,
                columns,
                rows,
                pixels,
            }),
            Err(err) => {
                log::warn!("{err}");
                None
            }
        };
    }

    fn create_playlist(&mut self, args: &str) {
        let mut split = args.splitn(2, char::is_whitespace);
        let name = split.next().unwrap_or_default();
        let thumbnail = split
            .next()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        if name.is_empty() {
            self.set_status(String::from("Usage: new <name> [thumbnail]"));
            return;
        }

        match self.store.create(name, thumbnail.as_deref()) {
            Ok(warning) => {
                self.reload_playlists();
                if let Some(index) = self.playlists.iter().position(|entry| entry == name) {
                    self.selected_playlist = index;
                }
                self.preview = None;
                match warning {
                    Some(err) => self.set_status(format!("Created {name}, default thumbnail used: {err}")),
                    None => self.set_status(format!("Created playlist {name}")),
                }
            }
            Err(err) => self.set_status(format!("Cannot create playlist: {err}")),
        }
    }

    fn change_thumbnail(&mut self, path: &str) {
        if path.is_empty() {
            self.set_status(String::from("Usage: thumb <path>"));
            return;
        }
        let Some(name) = self.target_playlist() else {
            self.set_status(String::from("No playlist selected"));
            return;
        };
        match self.store.set_thumbnail(&name, &PathBuf::from(path)) {
            Ok(()) => {
                self.preview = None;
                self.set_status(format!("Thumbnail updated for {name}"));
            }
            Err(err) => self.set_status(format!("Thumbnail rejected: {err}")),
        }
    }

    fn import(&mut self, path: &str, overwrite: bool) {
        if path.is_empty() {
            self.set_status(String::from("Usage: add <path>"));
            return;
        }
        let Some(name) = self.target_playlist() else {
            self.set_status(String::from("No playlist selected"));
            return;
        };
        match self.store.import(&name, &[PathBuf::from(path)], overwrite) {
            Ok(report) => {
                if self.view == View::Playlist {
                    self.reload_tracks();
                }
                self.set_status(report.summary());
            }
            Err(err) => self.set_status(format!("Import failed: {err}")),
        }
    }

    fn delete_playlist(&mut self, name: &str) {
        match self.store.delete(name) {
            Ok(()) => {
                self.reload_playlists();
                self.preview = None;
                self.set_status(format!("Deleted playlist {name}"));
            }
            Err(err) => self.set_status(format!("Cannot delete playlist: {err}")),
        }
    }

    fn open_selected_playlist(&mut self) {
        let Some(name) = self.selected_playlist_name().map(str::to_string) else {
            self.set_status(String::from("No playlists yet. Use :new <name>"));
            return;
        };
        let playlist = match self.store.load(&name) {
            Ok(playlist) => playlist,
            Err(err) => {
                self.set_status(format!("Cannot open playlist: {err}"));
                self.reload_playlists();
                return;
            }
        };

        self.controller.open_playlist(&playlist);
        self.view = View::Playlist;
        self.selected_track = 0;
        self.preview = None;
        let count = self.controller.session().ordered_tracks.len();
        if count == 0 {
            self.set_status(format!("{name} is empty. Use :add <path>"));
        } else {
            self.set_status(format!("Opened {name} ({count} tracks). Enter plays"));
        }
    }

    fn leave_playlist(&mut self) {
        self.controller.stop_and_clear();
        self.view = View::Playlists;
        self.preview = None;
        self.set_status(String::from("Stopped"));
    }

    fn refresh(&mut self) {
        match self.view {
            View::Playlists => {
                self.reload_playlists();
                self.set_status(format!("{} playlist(s)", self.playlists.len()));
            }
            View::Playlist => {
                self.reload_tracks();
                let count = self.controller.session().ordered_tracks.len();
                self.set_status(format!("{count} track(s)"));
            }
        }
    }

    fn reload_playlists(&mut self) {
        match self.store.list() {
            Ok(names) => self.playlists = names,
            Err(err) => self.set_status(format!("Cannot list playlists: {err}")),
        }
        self.selected_playlist = self
            .selected_playlist
            .min(self.playlists.len().saturating_sub(1));
    }

    fn reload_tracks(&mut self) {
        let Some(name) = self.target_playlist() else {
            return;
        };
        match self.store.load(&name) {
            Ok(playlist) => {
                self.controller.refresh_tracks(playlist.tracks);
                let len = self.controller.session().ordered_tracks.len();
                self.selected_track = self.selected_track.min(len.saturating_sub(1));
            }
            Err(err) => self.set_status(format!("Cannot reload playlist: {err}")),
        }
    }

    fn step_volume(&mut self, delta: i32) {
        let target = (i32::from(self.controller.session().volume) + delta).clamp(0, 100);
        match self.controller.set_volume(target) {
            Ok(()) => self.set_status(format!("Volume: {target}%")),
            Err(err) => self.set_status(err.to_string()),
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let (selected, len) = match self.view {
            View::Playlists => (&mut self.selected_playlist, self.playlists.len()),
            View::Playlist => (
                &mut self.selected_track,
                self.controller.session().ordered_tracks.len(),
            ),
        };
        if len == 0 {
            *selected = 0;
            return;
        }
        *selected = selected.saturating_add_signed(delta).min(len - 1);
        if self.view == View::Playlists {
            self.preview = None;
        }
    }

    fn after_navigation(&mut self, result: crate::error::Result<()>) {
        match result {
            Ok(()) => {
                self.follow_current_track();
                self.announce_current();
            }
            Err(err) => self.set_status(err.to_string()),
        }
    }

    fn follow_current_track(&mut self) {
        self.selected_track = self.controller.session().current_index;
    }

    fn announce_current(&mut self) {
        if let Some(track) = self.controller.current_track() {
            let status = format!("Playing {}", track.display_name());
            self.set_status(status);
        }
    }

    fn set_status(&mut self, status: String) {
        self.status = status;
        self.dirty = true;
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    if rect.width == 0 || rect.height == 0 {
        return false;
    }
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Theme;
    use crate::thumbnail::tests::write_png;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn app() -> (TempDir, App) {
        let dir = tempdir().expect("tempdir");
        let store = PlaylistStore::open(Layout::under(dir.path().join("data"))).expect("store");
        let controller = PlaybackController::new(Box::new(NullMediaEngine::new()), None);
        (dir, App::new(store, controller, Settings::default()))
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_command(app: &mut App, line: &str) {
        press(app, KeyCode::Char(':'));
        for ch in line.chars() {
            press(app, KeyCode::Char(ch));
        }
        press(app, KeyCode::Enter);
    }

    fn seed_tracks(dir: &TempDir, names: &[&str]) -> PathBuf {
        let source = dir.path().join("incoming");
        fs::create_dir_all(&source).expect("source dir");
        for name in names {
            fs::write(source.join(name), b"").expect("track");
        }
        source
    }

    #[test]
    fn unknown_command_is_reported() {
        let (_dir, mut app) = app();
        app.run_command("wat");
        assert!(app.status.contains("Unknown command"));
    }

    #[test]
    fn new_command_creates_and_selects_playlist() {
        let (_dir, mut app) = app();
        type_command(&mut app, "new zeta");
        type_command(&mut app, "new alpha");
        assert_eq!(app.playlists, vec!["alpha", "zeta"]);
        assert_eq!(app.selected_playlist_name(), Some("alpha"));
        assert_eq!(app.input, InputMode::Normal);
    }

    #[test]
    fn new_with_bad_thumbnail_still_creates() {
        let (dir, mut app) = app();
        let thumb = dir.path().join("tiny.png");
        write_png(&thumb, 10, 10);
        app.run_command(&format!("new mix {}", thumb.display()));
        assert_eq!(app.playlists, vec!["mix"]);
        assert!(app.status.contains("default thumbnail"));
    }

    #[test]
    fn delete_requires_confirmation() {
        let (_dir, mut app) = app();
        app.run_command("new mix");

        app.run_command("delete");
        assert_eq!(app.input, InputMode::ConfirmDelete(String::from("mix")));
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.playlists, vec!["mix"]);

        app.run_command("delete");
        press(&mut app, KeyCode::Char('y'));
        assert!(app.playlists.is_empty());
    }

    #[test]
    fn add_imports_into_selected_playlist() {
        let (dir, mut app) = app();
        let source = seed_tracks(&dir, &["b.mp3", "a.mp3", "notes.txt"]);
        app.run_command("new mix");
        app.run_command(&format!("add {}", source.display()));
        assert!(app.status.starts_with("Added 2 track(s)"), "{}", app.status);

        app.run_command(&format!("add {}", source.display()));
        assert!(app.status.contains("skipped 2 existing"), "{}", app.status);
    }

    #[test]
    fn open_navigate_and_leave_playlist() {
        let (dir, mut app) = app();
        let source = seed_tracks(&dir, &["a.mp3", "b.mp3", "c.mp3"]);
        app.run_command("new mix");
        app.run_command(&format!("add {}", source.display()));

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.view, View::Playlist);
        assert!(!app.controller.session().track_loaded, "opening does not play");
        assert_eq!(app.status, "Opened mix (3 tracks). Enter plays");

        press(&mut app, KeyCode::Enter);
        assert!(app.controller.session().track_loaded);
        assert_eq!(app.status, "Playing a");

        press(&mut app, KeyCode::Char('b'));
        assert_eq!(app.controller.session().current_index, 2);
        assert_eq!(app.selected_track, 2);
        app.pump(Instant::now());
        assert_eq!(app.controller.session().current_index, 2, "stop notification absorbed");

        press(&mut app, KeyCode::Up);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.controller.session().current_index, 1);
        app.pump(Instant::now());

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.view, View::Playlists);
        app.pump(Instant::now());
        assert!(!app.controller.session().track_loaded);
        assert_eq!(app.controller.session().current_index, 1);
    }

    #[test]
    fn volume_keys_step_within_bounds() {
        let (dir, mut app) = app();
        let source = seed_tracks(&dir, &["a.mp3"]);
        app.run_command("new mix");
        app.run_command(&format!("add {}", source.display()));
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Enter);

        for _ in 0..15 {
            press(&mut app, KeyCode::Char('+'));
        }
        assert_eq!(app.controller.session().volume, 100);
        assert_eq!(app.status, "Volume: 100%");
        press(&mut app, KeyCode::Char('-'));
        assert_eq!(app.controller.session().volume, 95);
    }

    #[test]
    fn theme_toggle_and_settings_saved_on_shutdown() {
        let (_dir, mut app) = app();
        press(&mut app, KeyCode::Char('t'));
        assert_eq!(app.settings.theme, Theme::Dark);

        app.shutdown().expect("save");
        let saved = config::load_settings(app.store.layout()).expect("load");
        assert_eq!(saved.theme, Theme::Dark);
        assert_eq!(saved.volume, 50);
    }

    #[test]
    fn failed_loop_still_stops_and_saves() {
        let (dir, mut app) = app();
        let source = seed_tracks(&dir, &["a.mp3"]);
        app.run_command("new mix");
        app.run_command(&format!("add {}", source.display()));
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('-'));

        let err = finish(&mut app, Err(anyhow::anyhow!("terminal gone")), Ok(()))
            .expect_err("loop error is returned");
        assert!(err.to_string().contains("terminal gone"));
        assert!(!app.controller.session().track_loaded);
        let saved = config::load_settings(app.store.layout()).expect("load");
        assert_eq!(saved.volume, 45);
    }

    #[test]
    fn wrapping_onto_the_same_track_is_announced_again() {
        use crate::audio::tests::write_test_wav;

        let (dir, mut app) = app();
        let source = dir.path().join("incoming");
        fs::create_dir_all(&source).expect("source dir");
        write_test_wav(&source.join("a.wav"), 30);
        app.run_command("new solo");
        app.run_command(&format!("add {}", source.display()));
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.status, "Playing a");
        press(&mut app, KeyCode::Char('-'));
        assert_eq!(app.status, "Volume: 45%");

        std::thread::sleep(Duration::from_millis(80));
        app.pump(Instant::now());
        app.pump(Instant::now());
        assert_eq!(app.controller.load_count(), 2);
        assert_eq!(app.controller.session().current_index, 0);
        assert_eq!(app.status, "Playing a");
    }

    #[test]
    fn quit_keys_stop_the_loop() {
        let (_dir, mut app) = app();
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }

    #[test]
    fn mouse_scroll_only_inside_list() {
        let (_dir, mut app) = app();
        app.run_command("new a");
        app.run_command("new b");
        app.selected_playlist = 0;
        let list = Rect::new(0, 3, 40, 10);
        let scroll = |column, row| MouseEvent {
            kind: MouseEventKind::ScrollDown,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        };

        app.handle_mouse(scroll(60, 5), list);
        assert_eq!(app.selected_playlist, 0);
        app.handle_mouse(scroll(5, 5), list);
        assert_eq!(app.selected_playlist, 1);
        app.handle_mouse(scroll(5, 5), list);
        assert_eq!(app.selected_playlist, 1);
    }
}
