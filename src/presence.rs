//! "Now playing" broadcast over the local Discord IPC socket.
//!
//! Everything here is best-effort: the controller logs and drops every error
//! a reporter returns. [`PresenceWorker`] keeps the socket I/O on its own
//! thread so a stalled Discord client never blocks playback.

use crate::error::PlayerError;
use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Value, json};
use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

const APP_LABEL: &str = "playshelf";
const OP_HANDSHAKE: u32 = 0;
const OP_FRAME: u32 = 1;
const OP_CLOSE: u32 = 2;
const MAX_FRAME_BYTES: u32 = 64 * 1024;
/// Longest a dropped worker waits for its last update and close frame.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub track: String,
    pub playlist: String,
    pub paused: bool,
}

impl NowPlaying {
    pub fn details(&self) -> String {
        format!("{APP_LABEL} | {}", self.track)
    }

    pub fn state(&self) -> String {
        let status = if self.paused { "Paused" } else { "Listening" };
        if self.playlist.is_empty() {
            status.to_string()
        } else {
            format!("{status} - Playlist: {}", self.playlist)
        }
    }
}

pub trait PresenceReporter {
    fn publish(&mut self, now: &NowPlaying) -> Result<()>;
    fn clear(&mut self) -> Result<()>;

    /// Reports a failure that surfaced after an earlier call returned.
    fn health(&mut self) -> Result<()> {
        Ok(())
    }
}

enum PresenceCommand {
    Publish(NowPlaying),
    Clear,
}

/// Forwards updates to a reporter running on a background thread.
///
/// Calls only enqueue. Queued updates are coalesced so the thread always
/// sends the latest state. The first error ends the thread and is returned
/// by the next call or by [`PresenceReporter::health`].
pub struct PresenceWorker {
    commands: Option<Sender<PresenceCommand>>,
    failures: Receiver<String>,
}

impl PresenceWorker {
    /// `open` runs on the worker thread, so a slow handshake does not hold
    /// up the caller either.
    pub fn spawn<R, F>(open: F) -> Self
    where
        R: PresenceReporter + 'static,
        F: FnOnce() -> Result<R> + Send + 'static,
    {
        let (commands, command_rx) = mpsc::channel();
        let (failure_tx, failures) = mpsc::channel();
        thread::spawn(move || worker_loop(open, command_rx, failure_tx));
        Self {
            commands: Some(commands),
            failures,
        }
    }

    #[cfg(any(unix, windows))]
    pub fn connect(client_id: String) -> Self {
        Self::spawn(move || DiscordPresence::connect(&client_id).map_err(anyhow::Error::from))
    }

    fn send(&mut self, command: PresenceCommand) -> Result<()> {
        self.health()?;
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| anyhow!("presence worker stopped"))?;
        commands
            .send(command)
            .map_err(|_| anyhow!("presence worker stopped"))
    }
}

impl PresenceReporter for PresenceWorker {
    fn publish(&mut self, now: &NowPlaying) -> Result<()> {
        self.send(PresenceCommand::Publish(now.clone()))
    }

    fn clear(&mut self) -> Result<()> {
        self.send(PresenceCommand::Clear)
    }

    fn health(&mut self) -> Result<()> {
        match self.failures.try_recv() {
            Ok(reason) => bail!("presence worker failed: {reason}"),
            Err(_) => Ok(()),
        }
    }
}

impl Drop for PresenceWorker {
    fn drop(&mut self) {
        self.commands.take();
        // Wait, bounded, for the thread to flush and hang up.
        let deadline = Instant::now() + SHUTDOWN_GRACE;
        while self
            .failures
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
            .is_ok()
        {}
    }
}

fn worker_loop<R, F>(open: F, commands: Receiver<PresenceCommand>, failures: Sender<String>)
where
    R: PresenceReporter,
    F: FnOnce() -> Result<R>,
{
    let mut reporter = match open() {
        Ok(reporter) => reporter,
        Err(err) => {
            log::warn!("presence unavailable: {err:#}");
            let _ = failures.send(format!("{err:#}"));
            return;
        }
    };
    while let Ok(mut command) = commands.recv() {
        while let Ok(newer) = commands.try_recv() {
            command = newer;
        }
        let result = match &command {
            PresenceCommand::Publish(now) => reporter.publish(now),
            PresenceCommand::Clear => reporter.clear(),
        };
        if let Err(err) = result {
            let _ = failures.send(format!("{err:#}"));
            return;
        }
    }
}

pub struct DiscordPresence<S: Read + Write> {
    stream: S,
    nonce: u64,
}

#[cfg(unix)]
impl DiscordPresence<std::os::unix::net::UnixStream> {
    pub fn connect(client_id: &str) -> Result<Self, PlayerError> {
        use std::os::unix::net::UnixStream;
        use std::time::Duration;

        let base = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
            .iter()
            .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
            .unwrap_or_else(|| String::from("/tmp"));

        let mut last_error = String::from("no discord-ipc socket found");
        for slot in 0..10 {
            let path = std::path::Path::new(&base).join(format!("discord-ipc-{slot}"));
            let stream = match UnixStream::connect(&path) {
                Ok(stream) => stream,
                Err(err) => {
                    last_error = format!("{}: {err}", path.display());
                    continue;
                }
            };
            let timeout = Some(Duration::from_millis(500));
            if stream.set_read_timeout(timeout).is_err() || stream.set_write_timeout(timeout).is_err()
            {
                continue;
            }
            return Self::handshake(stream, client_id)
                .map_err(|err| PlayerError::PresenceUnavailable(format!("{err:#}")));
        }
        Err(PlayerError::PresenceUnavailable(last_error))
    }
}

#[cfg(windows)]
impl DiscordPresence<std::fs::File> {
    pub fn connect(client_id: &str) -> Result<Self, PlayerError> {
        use std::fs::OpenOptions;

        let mut last_error = String::from("no discord-ipc pipe found");
        for slot in 0..10 {
            let path = format!(r"\\.\pipe\discord-ipc-{slot}");
            match OpenOptions::new().read(true).write(true).open(&path) {
                Ok(pipe) => {
                    return Self::handshake(pipe, client_id)
                        .map_err(|err| PlayerError::PresenceUnavailable(format!("{err:#}")));
                }
                Err(err) => last_error = format!("{path}: {err}"),
            }
        }
        Err(PlayerError::PresenceUnavailable(last_error))
    }
}

impl<S: Read + Write> DiscordPresence<S> {
    /// Sends the version/client handshake and waits for the READY dispatch.
    pub fn handshake(mut stream: S, client_id: &str) -> Result<Self> {
        write_frame(
            &mut stream,
            OP_HANDSHAKE,
            &json!({ "v": 1, "client_id": client_id }),
        )
        .context("failed to send handshake")?;

        let (op, reply) = read_frame(&mut stream).context("failed to read handshake reply")?;
        if op == OP_CLOSE {
            bail!(
                "discord closed the connection: {}",
                reply["message"].as_str().unwrap_or("no reason given")
            );
        }
        if reply["evt"] != "READY" {
            bail!("unexpected handshake reply: {reply}");
        }

        log::info!("connected to discord presence");
        Ok(Self { stream, nonce: 0 })
    }

    fn set_activity(&mut self, activity: Value) -> Result<()> {
        self.nonce += 1;
        let payload = json!({
            "cmd": "SET_ACTIVITY",
            "args": { "pid": std::process::id(), "activity": activity },
            "nonce": self.nonce.to_string(),
        });
        write_frame(&mut self.stream, OP_FRAME, &payload).context("failed to send activity")?;

        let (op, reply) = read_frame(&mut self.stream).context("failed to read activity reply")?;
        if op == OP_CLOSE || reply["evt"] == "ERROR" {
            bail!("discord rejected activity: {reply}");
        }
        Ok(())
    }
}

impl<S: Read + Write> PresenceReporter for DiscordPresence<S> {
    fn publish(&mut self, now: &NowPlaying) -> Result<()> {
        let mut activity = json!({
            "details": now.details(),
            "state": now.state(),
            "assets": { "large_image": "music", "large_text": APP_LABEL },
        });
        if !now.paused {
            activity["timestamps"] = json!({ "start": time::OffsetDateTime::now_utc().unix_timestamp() });
        }
        self.set_activity(activity)
    }

    fn clear(&mut self) -> Result<()> {
        self.set_activity(Value::Null)
    }
}

impl<S: Read + Write> Drop for DiscordPresence<S> {
    fn drop(&mut self) {
        let _ = write_frame(&mut self.stream, OP_CLOSE, &json!({}));
    }
}

fn write_frame(stream: &mut impl Write, op: u32, payload: &Value) -> Result<()> {
    let body = serde_json::to_vec(payload)?;
    let len = u32::try_from(body.len()).context("frame too large")?;
    let mut frame = Vec::with_capacity(8 + body.len());
    frame.extend_from_slice(&op.to_le_bytes());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&body);
    stream.write_all(&frame)?;
    stream.flush()?;
    Ok(())
}

fn read_frame(stream: &mut impl Read) -> Result<(u32, Value)> {
    let mut header = [0_u8; 8];
    stream.read_exact(&mut header)?;
    let op = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if len > MAX_FRAME_BYTES {
        bail!("frame of {len} bytes exceeds limit");
    }
    let mut body = vec![0_u8; len as usize];
    stream.read_exact(&mut body)?;
    let value = serde_json::from_slice(&body).context("frame is not valid json")?;
    Ok((op, value))
}
