use crate::error::{PlayerError, Result};
use rodio::Source;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::source::EmptyCallback;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

/// Notifications posted by an engine from its own context. The control
/// thread drains them; engines never touch controller state directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    EndOfTrack,
    LoadFailed { path: PathBuf, reason: String },
}

/// Playback capability used by the controller.
///
/// Every loaded track produces exactly one [`EngineEvent::EndOfTrack`],
/// either when it plays out or when `stop` cuts it short.
pub trait MediaEngine {
    fn subscribe(&mut self, events: Sender<EngineEvent>);
    /// Only a missing file fails synchronously. Decode problems arrive later
    /// as [`EngineEvent::LoadFailed`].
    fn load(&mut self, path: &Path) -> Result<()>;
    fn stop(&mut self);
    fn set_paused(&mut self, paused: bool);
    fn set_volume(&mut self, volume: u8);
    fn position(&self) -> Option<Duration>;
    fn duration(&self) -> Option<Duration>;
    fn is_loaded(&self) -> bool;
    fn tick(&mut self) {}
    fn output_name(&self) -> String;
}

fn volume_gain(volume: u8) -> f32 {
    f32::from(volume.min(100)) / 100.0
}

struct LoadedTrack {
    duration: Option<Duration>,
    live: Arc<AtomicBool>,
}

pub struct RodioEngine {
    stream: OutputStream,
    sink: Sink,
    current: Option<LoadedTrack>,
    volume: u8,
    events: Option<Sender<EngineEvent>>,
}

impl RodioEngine {
    pub fn new() -> anyhow::Result<Self> {
        let (stream, sink) = open_output_stream()?;
        Ok(Self {
            stream,
            sink,
            current: None,
            volume: 100,
            events: None,
        })
    }

    fn post(&self, event: EngineEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn load_failed(&self, path: &Path, reason: String) {
        log::warn!("engine could not start {}: {reason}", path.display());
        self.post(EngineEvent::LoadFailed {
            path: path.to_path_buf(),
            reason,
        });
    }
}

impl MediaEngine for RodioEngine {
    fn subscribe(&mut self, events: Sender<EngineEvent>) {
        self.events = Some(events);
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(PlayerError::FileMissing(path.to_path_buf()));
        }

        self.stop();
        self.sink = Sink::connect_new(self.stream.mixer());

        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                self.load_failed(path, format!("failed to open: {err}"));
                return Ok(());
            }
        };
        let source = match Decoder::try_from(file) {
            Ok(source) => source,
            Err(err) => {
                self.load_failed(path, format!("failed to decode: {err}"));
                return Ok(());
            }
        };

        let duration = source.total_duration().filter(|d| !d.is_zero());
        let live = Arc::new(AtomicBool::new(true));
        let token = Arc::clone(&live);
        let events = self.events.clone();

        self.sink.append(source);
        self.sink.append(EmptyCallback::new(Box::new(move || {
            if token.swap(false, Ordering::SeqCst)
                && let Some(events) = &events
            {
                let _ = events.send(EngineEvent::EndOfTrack);
            }
        })));
        self.sink.set_volume(volume_gain(self.volume));
        self.current = Some(LoadedTrack { duration, live });
        log::debug!("engine loaded {}", path.display());
        Ok(())
    }

    fn stop(&mut self) {
        self.sink.stop();
        if let Some(track) = self.current.take()
            && track.live.swap(false, Ordering::SeqCst)
        {
            self.post(EngineEvent::EndOfTrack);
        }
    }

    fn set_paused(&mut self, paused: bool) {
        if paused {
            self.sink.pause();
        } else {
            self.sink.play();
        }
    }

    fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
        self.sink.set_volume(volume_gain(self.volume));
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.sink.get_pos())
    }

    fn duration(&self) -> Option<Duration> {
        self.current.as_ref().and_then(|track| track.duration)
    }

    fn is_loaded(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|track| track.live.load(Ordering::SeqCst))
    }

    fn output_name(&self) -> String {
        String::from("System default output (rodio)")
    }
}

fn open_output_stream() -> anyhow::Result<(OutputStream, Sink)> {
    use anyhow::Context;

    let mut stream = with_silenced_stderr(|| {
        match OutputStreamBuilder::from_default_device()
            .context("failed to open default system output stream")
            .and_then(|builder| {
                builder
                    .with_error_callback(|_| {})
                    .open_stream_or_fallback()
                    .context("failed to start default output stream")
            }) {
            Ok(stream) => Ok(stream),
            Err(default_err) => {
                let host = rodio::cpal::default_host();
                let devices: Vec<_> = host.output_devices().ok().into_iter().flatten().collect();
                for device in devices {
                    let name = device.name().unwrap_or_default();
                    let opened = OutputStreamBuilder::from_device(device)
                        .context("failed to open fallback output device")
                        .and_then(|builder| {
                            builder
                                .with_error_callback(|_| {})
                                .open_stream_or_fallback()
                                .context("failed to start fallback output stream")
                        });
                    match opened {
                        Ok(stream) => {
                            log::info!("using fallback audio output {name}");
                            return Ok(stream);
                        }
                        Err(err) => log::debug!("output {name} unusable: {err:#}"),
                    }
                }
                Err(default_err).context("unable to start any audio output stream")
            }
        }
    })?;
    stream.log_on_drop(false);
    let sink = Sink::connect_new(stream.mixer());
    Ok((stream, sink))
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

/// Wall-clock stand-in used when no output device can be opened. Tracks
/// with a decodable duration "finish" once the clock passes it. Volume is
/// accepted and ignored.
pub struct NullMediaEngine {
    paused: bool,
    current: Option<PathBuf>,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
    events: Option<Sender<EngineEvent>>,
}

impl NullMediaEngine {
    pub fn new() -> Self {
        Self {
            paused: false,
            current: None,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
            events: None,
        }
    }

    fn estimate_duration(path: &Path) -> Option<Duration> {
        let file = File::open(path).ok()?;
        let source = Decoder::try_from(file).ok()?;
        source
            .total_duration()
            .filter(|duration| !duration.is_zero())
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && self.current.is_some()
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.track_duration {
            return position.min(duration);
        }
        position
    }

    fn post(&self, event: EngineEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn reset_clock(&mut self) {
        self.current = None;
        self.paused = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = None;
    }
}

impl Default for NullMediaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaEngine for NullMediaEngine {
    fn subscribe(&mut self, events: Sender<EngineEvent>) {
        self.events = Some(events);
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(PlayerError::FileMissing(path.to_path_buf()));
        }
        self.stop();
        self.paused = false;
        self.current = Some(path.to_path_buf());
        self.started_at = Some(Instant::now());
        self.position_offset = Duration::ZERO;
        self.track_duration = Self::estimate_duration(path);
        Ok(())
    }

    fn stop(&mut self) {
        if self.current.is_some() {
            self.reset_clock();
            self.post(EngineEvent::EndOfTrack);
        }
    }

    fn set_paused(&mut self, paused: bool) {
        if paused == self.paused {
            return;
        }
        if paused {
            self.position_offset = self.current_position();
            self.started_at = None;
        } else if self.current.is_some() {
            self.started_at = Some(Instant::now());
        }
        self.paused = paused;
    }

    fn set_volume(&mut self, _volume: u8) {}

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.current_position())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn is_loaded(&self) -> bool {
        self.current.is_some()
    }

    fn tick(&mut self) {
        let Some(duration) = self.track_duration else {
            return;
        };
        if self.current.is_some() && !self.paused && self.current_position() >= duration {
            self.reset_clock();
            self.post(EngineEvent::EndOfTrack);
        }
    }

    fn output_name(&self) -> String {
        String::from("Null audio engine")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{EngineEvent, MediaEngine, NullMediaEngine};
    use crate::error::PlayerError;
    use std::fs;
    use std::path::Path;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    pub(crate) fn write_test_wav(path: &Path, duration_ms: u32) {
        let sample_rate: u32 = 44_100;
        let channels: u16 = 1;
        let bits_per_sample: u16 = 16;
        let bytes_per_sample = u32::from(bits_per_sample / 8);
        let total_samples = (u64::from(sample_rate) * u64::from(duration_ms) / 1_000) as u32;
        let data_size = total_samples * u32::from(channels) * bytes_per_sample;
        let byte_rate = sample_rate * u32::from(channels) * bytes_per_sample;
        let block_align = channels * (bits_per_sample / 8);
        let riff_chunk_size = 36_u32.saturating_add(data_size);

        let mut bytes = Vec::with_capacity((44_u32 + data_size) as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&riff_chunk_size.to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16_u32.to_le_bytes());
        bytes.extend_from_slice(&1_u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&byte_rate.to_le_bytes());
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&bits_per_sample.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_size.to_le_bytes());
        bytes.resize((44_u32 + data_size) as usize, 0_u8);

        fs::write(path, bytes).expect("wav fixture should be written");
    }

    #[test]
    fn null_engine_rejects_missing_files() {
        let mut engine = NullMediaEngine::new();
        let err = engine
            .load(Path::new("definitely-not-here.flac"))
            .expect_err("missing file must fail");
        assert!(matches!(err, PlayerError::FileMissing(_)));
        assert!(!engine.is_loaded());
    }

    #[test]
    fn null_engine_pause_freezes_position() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("blank.mp3");
        fs::write(&track, b"").expect("fixture");

        let mut engine = NullMediaEngine::new();
        engine.load(&track).expect("load");
        thread::sleep(Duration::from_millis(20));

        engine.set_paused(true);
        let paused = engine.position().expect("position should be present");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(engine.position(), Some(paused), "position should freeze");

        engine.set_paused(false);
        thread::sleep(Duration::from_millis(20));
        let resumed = engine.position().expect("position should be present");
        assert!(resumed > paused, "position should continue after resume");
    }

    #[test]
    fn null_engine_reports_end_of_track_once_on_stop() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("blank.mp3");
        fs::write(&track, b"").expect("fixture");

        let (tx, rx) = mpsc::channel();
        let mut engine = NullMediaEngine::new();
        engine.subscribe(tx);

        engine.stop();
        assert!(rx.try_recv().is_err(), "idle stop must stay silent");

        engine.load(&track).expect("load");
        engine.stop();
        engine.stop();
        assert_eq!(rx.try_recv(), Ok(EngineEvent::EndOfTrack));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn null_engine_finishes_when_known_duration_elapses() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("fixture.wav");
        write_test_wav(&track, 80);

        let (tx, rx) = mpsc::channel();
        let mut engine = NullMediaEngine::new();
        engine.subscribe(tx);
        engine.load(&track).expect("load");
        let duration = engine.duration().expect("duration should be detected");
        assert!(duration >= Duration::from_millis(70));

        thread::sleep(Duration::from_millis(120));
        engine.tick();
        assert_eq!(rx.try_recv(), Ok(EngineEvent::EndOfTrack));
        assert!(!engine.is_loaded());

        engine.tick();
        assert!(rx.try_recv().is_err(), "end of track is posted once");
    }

    #[test]
    fn null_engine_unknown_duration_does_not_auto_finish() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("blank.flac");
        fs::write(&track, b"").expect("fixture");

        let (tx, rx) = mpsc::channel();
        let mut engine = NullMediaEngine::new();
        engine.subscribe(tx);
        engine.load(&track).expect("load");
        assert_eq!(engine.duration(), None);

        thread::sleep(Duration::from_millis(40));
        engine.tick();
        assert!(rx.try_recv().is_err());
        assert!(engine.is_loaded());
    }
}
