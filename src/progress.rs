use std::fmt;
use std::time::{Duration, Instant};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Snapshot of the engine clock as shown next to the now-playing title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Progress {
    /// Nothing loaded yet, or the engine cannot report one of the values.
    #[default]
    NotReady,
    Ready {
        position: Duration,
        duration: Duration,
    },
}

impl Progress {
    pub fn sample(position: Option<Duration>, duration: Option<Duration>) -> Self {
        match (position, duration) {
            (Some(position), Some(duration)) => Self::Ready {
                position: position.min(duration),
                duration,
            },
            _ => Self::NotReady,
        }
    }

    pub fn ratio(&self) -> Option<f64> {
        match self {
            Self::Ready { position, duration } if !duration.is_zero() => {
                Some((position.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => f.write_str("--:-- / --:--"),
            Self::Ready { position, duration } => {
                write!(f, "{} / {}", format_clock(*position), format_clock(*duration))
            }
        }
    }
}

pub fn format_clock(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes:02}:{seconds:02}")
}

/// Cooperative 1 Hz poller run from the control loop. Once started it keeps
/// running across track changes and simply samples whatever the engine
/// reports.
#[derive(Debug, Default)]
pub struct ProgressPoller {
    running: bool,
    last_poll: Option<Instant>,
    latest: Progress,
}

impl ProgressPoller {
    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.last_poll = None;
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.running
            && self
                .last_poll
                .is_none_or(|last| now.saturating_duration_since(last) >= POLL_INTERVAL)
    }

    pub fn record(&mut self, now: Instant, progress: Progress) {
        self.last_poll = Some(now);
        self.latest = progress;
    }

    pub fn latest(&self) -> Progress {
        self.latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_and_seconds() {
        let progress = Progress::sample(Some(Duration::from_secs(65)), Some(Duration::from_secs(600)));
        assert_eq!(progress.to_string(), "01:05 / 10:00");
    }

    #[test]
    fn missing_values_are_not_ready() {
        assert_eq!(Progress::sample(None, Some(Duration::from_secs(3))), Progress::NotReady);
        assert_eq!(Progress::sample(Some(Duration::from_secs(3)), None), Progress::NotReady);
        assert_eq!(Progress::NotReady.to_string(), "--:-- / --:--");
        assert_eq!(Progress::NotReady.ratio(), None);
    }

    #[test]
    fn position_is_capped_at_duration() {
        let progress = Progress::sample(Some(Duration::from_secs(12)), Some(Duration::from_secs(10)));
        assert_eq!(progress.ratio(), Some(1.0));
        assert_eq!(progress.to_string(), "00:10 / 00:10");
    }

    #[test]
    fn poller_fires_once_per_interval_after_start() {
        let mut poller = ProgressPoller::default();
        let t0 = Instant::now();
        assert!(!poller.is_due(t0), "idle poller never fires");

        poller.start();
        assert!(poller.is_due(t0));
        poller.record(t0, Progress::NotReady);
        assert!(!poller.is_due(t0 + Duration::from_millis(500)));
        assert!(poller.is_due(t0 + POLL_INTERVAL));

        poller.start();
        assert!(!poller.is_due(t0 + Duration::from_millis(500)), "restart keeps cadence");
    }
}
