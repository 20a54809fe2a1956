//! Playback state machine.
//!
//! All state lives in [`PlaybackSession`] and is mutated only from the control
//! loop. The media engine reports end-of-track through a channel that
//! [`PlaybackController::drain_events`] empties on that same loop.

use crate::audio::{EngineEvent, MediaEngine};
use crate::error::{PlayerError, Result};
use crate::model::{Playlist, PlaylistRef, Track, sort_tracks};
use crate::presence::{NowPlaying, PresenceReporter};
use crate::progress::{Progress, ProgressPoller};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::time::Instant;

pub const DEFAULT_VOLUME: u8 = 50;

/// How a track change treats the end-of-track notification the outgoing
/// track still owes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handoff {
    /// Auto-advance and `play_current`.
    Natural,
    /// Picking a track from the list: only a loaded track's stop is absorbed.
    Select,
    /// next, previous and shuffle always arm the one-shot flag.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSession {
    pub current_playlist: Option<PlaylistRef>,
    pub ordered_tracks: Vec<Track>,
    pub current_index: usize,
    pub paused: bool,
    /// One-shot: swallows the next end-of-track notification.
    pub suppress_auto_advance: bool,
    pub volume: u8,
    /// True from a successful load until the track ends or is stopped.
    pub track_loaded: bool,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            current_playlist: None,
            ordered_tracks: Vec::new(),
            current_index: 0,
            paused: false,
            suppress_auto_advance: false,
            volume: DEFAULT_VOLUME,
            track_loaded: false,
        }
    }
}

pub struct PlaybackController {
    session: PlaybackSession,
    engine: Box<dyn MediaEngine>,
    presence: Option<Box<dyn PresenceReporter>>,
    presence_enabled: bool,
    events: Receiver<EngineEvent>,
    poller: ProgressPoller,
    rng: StdRng,
    loads: u64,
}

impl PlaybackController {
    pub fn new(
        engine: Box<dyn MediaEngine>,
        presence: Option<Box<dyn PresenceReporter>>,
    ) -> Self {
        Self::with_rng(engine, presence, StdRng::from_os_rng())
    }

    pub fn with_rng(
        mut engine: Box<dyn MediaEngine>,
        presence: Option<Box<dyn PresenceReporter>>,
        rng: StdRng,
    ) -> Self {
        let (tx, events) = mpsc::channel();
        engine.subscribe(tx);
        engine.set_volume(DEFAULT_VOLUME);
        Self {
            session: PlaybackSession::default(),
            engine,
            presence,
            presence_enabled: true,
            events,
            poller: ProgressPoller::default(),
            rng,
            loads: 0,
        }
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn engine(&self) -> &dyn MediaEngine {
        self.engine.as_ref()
    }

    pub fn presence_available(&self) -> bool {
        self.presence.is_some()
    }

    pub fn presence_enabled(&self) -> bool {
        self.presence_enabled
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.session.ordered_tracks.get(self.session.current_index)
    }

    pub fn current_path(&self) -> Option<PathBuf> {
        let playlist = self.session.current_playlist.as_ref()?;
        self.current_track()
            .map(|track| playlist.dir.join(&track.file_name))
    }

    pub fn now_playing(&self) -> Option<NowPlaying> {
        if !self.session.track_loaded {
            return None;
        }
        let playlist = self.session.current_playlist.as_ref()?;
        let track = self.current_track()?;
        Some(NowPlaying {
            track: track.display_name().to_string(),
            playlist: playlist.name.clone(),
            paused: self.session.paused,
        })
    }

    pub fn progress(&self) -> Progress {
        self.poller.latest()
    }

    /// Number of tracks successfully handed to the engine so far.
    pub fn load_count(&self) -> u64 {
        self.loads
    }

    /// Replaces the track list; playback is not started.
    pub fn open_playlist(&mut self, playlist: &Playlist) {
        let mut tracks = playlist.tracks.clone();
        sort_tracks(&mut tracks);
        self.session.current_playlist = Some(playlist.reference());
        self.session.ordered_tracks = tracks;
        self.session.current_index = 0;
        log::info!(
            "opened playlist {} ({} tracks)",
            playlist.name,
            self.session.ordered_tracks.len()
        );
    }

    /// Re-derives the track list of the open playlist after files changed on
    /// disk. The current track keeps its position when it still exists;
    /// playback stops when the playing track is gone.
    pub fn refresh_tracks(&mut self, mut tracks: Vec<Track>) {
        sort_tracks(&mut tracks);
        let fallback = self.session.current_index.min(tracks.len().saturating_sub(1));
        let kept = self
            .current_track()
            .and_then(|track| tracks.iter().position(|candidate| candidate == track));
        self.session.current_index = kept.unwrap_or(fallback);
        self.session.ordered_tracks = tracks;
        if kept.is_none() && self.session.track_loaded {
            log::info!("playing track was removed from the playlist");
            self.stop_and_clear();
        }
    }

    pub fn select_track(&mut self, index: usize) -> Result<()> {
        let len = self.session.ordered_tracks.len();
        if index >= len {
            return Err(PlayerError::OutOfRange { index, len });
        }
        self.play_index(index, Handoff::Select)
    }

    pub fn play_current(&mut self) -> Result<()> {
        self.play_index(self.session.current_index, Handoff::Natural)
    }

    pub fn next(&mut self, explicit: bool) -> Result<()> {
        let len = self.session.ordered_tracks.len();
        if len == 0 {
            return Ok(());
        }
        let handoff = if explicit {
            Handoff::Skip
        } else {
            Handoff::Natural
        };
        self.play_index((self.session.current_index + 1) % len, handoff)
    }

    pub fn previous(&mut self) -> Result<()> {
        let len = self.session.ordered_tracks.len();
        if len == 0 {
            return Ok(());
        }
        self.play_index((self.session.current_index + len - 1) % len, Handoff::Skip)
    }

    /// Uniform over every index, the current one included.
    pub fn shuffle(&mut self) -> Result<()> {
        let len = self.session.ordered_tracks.len();
        if len == 0 {
            return Ok(());
        }
        let index = self.rng.random_range(0..len);
        self.play_index(index, Handoff::Skip)
    }

    pub fn toggle_pause(&mut self) {
        if !self.session.track_loaded {
            return;
        }
        self.session.paused = !self.session.paused;
        self.engine.set_paused(self.session.paused);
        self.report_presence();
    }

    pub fn on_end_of_track(&mut self) -> Result<()> {
        if self.session.suppress_auto_advance {
            // Belongs to the track that was replaced or stopped.
            self.session.suppress_auto_advance = false;
            log::debug!("end of track absorbed after explicit navigation");
            return Ok(());
        }
        self.session.track_loaded = false;
        self.next(false)
    }

    /// Out-of-range values are rejected and leave the volume unchanged.
    pub fn set_volume(&mut self, volume: i32) -> Result<()> {
        let volume = u8::try_from(volume)
            .ok()
            .filter(|v| *v <= 100)
            .ok_or(PlayerError::InvalidVolume(volume))?;
        self.session.volume = volume;
        self.engine.set_volume(volume);
        Ok(())
    }

    pub fn stop_and_clear(&mut self) {
        if self.session.track_loaded {
            self.session.suppress_auto_advance = true;
        }
        self.engine.stop();
        self.session.track_loaded = false;
        self.session.paused = false;
        self.clear_presence();
    }

    pub fn set_presence_enabled(&mut self, enabled: bool) {
        if enabled == self.presence_enabled {
            return;
        }
        self.presence_enabled = enabled;
        if enabled {
            self.report_presence();
        } else {
            self.clear_presence();
        }
    }

    /// Handles every queued engine event. Stops at the first failure and
    /// leaves the rest queued for the next call.
    pub fn drain_events(&mut self) -> Result<usize> {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            handled += 1;
            match event {
                EngineEvent::EndOfTrack => self.on_end_of_track()?,
                EngineEvent::LoadFailed { path, reason } => {
                    self.session.track_loaded = false;
                    return Err(PlayerError::PlaybackFailed { path, reason });
                }
            }
        }
        Ok(handled)
    }

    pub fn tick(&mut self, now: Instant) {
        self.engine.tick();
        if self.poller.is_due(now) {
            let sample = Progress::sample(self.engine.position(), self.engine.duration());
            self.poller.record(now, sample);
        }
        if let Some(reporter) = self.presence.as_deref_mut()
            && let Err(err) = reporter.health()
        {
            log::warn!("presence reporter failed, disabling it: {err:#}");
            self.presence = None;
        }
    }

    fn play_index(&mut self, index: usize, handoff: Handoff) -> Result<()> {
        let len = self.session.ordered_tracks.len();
        let (Some(playlist), Some(track)) = (
            self.session.current_playlist.as_ref(),
            self.session.ordered_tracks.get(index),
        ) else {
            return Err(PlayerError::OutOfRange { index, len });
        };

        let path = playlist.dir.join(&track.file_name);
        if !path.exists() {
            log::warn!("track vanished: {}", path.display());
            return Err(PlayerError::FileMissing(path));
        }

        // A loaded track reports its end when stopped below; that
        // notification must not advance past the track chosen here.
        match handoff {
            Handoff::Skip => self.session.suppress_auto_advance = true,
            Handoff::Select if self.session.track_loaded => {
                self.session.suppress_auto_advance = true
            }
            Handoff::Select | Handoff::Natural => {}
        }

        self.engine.stop();
        self.session.track_loaded = false;
        self.engine.load(&path)?;
        self.session.current_index = index;
        self.session.track_loaded = true;
        self.session.paused = false;
        self.loads += 1;
        log::info!("playing {}", path.display());

        self.report_presence();
        self.poller.start();
        Ok(())
    }

    fn report_presence(&mut self) {
        if !self.presence_enabled {
            return;
        }
        let now = self.now_playing();
        let Some(reporter) = self.presence.as_deref_mut() else {
            return;
        };
        let result = match now {
            Some(now) => reporter.publish(&now),
            None => reporter.clear(),
        };
        if let Err(err) = result {
            log::warn!("presence update failed, disabling it: {err:#}");
            self.presence = None;
        }
    }

    fn clear_presence(&mut self) {
        if let Some(reporter) = self.presence.as_deref_mut()
            && let Err(err) = reporter.clear()
        {
            log::warn!("presence clear failed: {err:#}");
            self.presence = None;
        }
    }
}
