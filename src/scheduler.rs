//! Wall-clock alignment and file rotation.

use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, Local, Timelike};

use crate::profile::InstrumentProfile;

pub const ROTATION_INTERVAL: Duration = Duration::from_secs(1800);

const HALF_HOUR_SECS: u32 = 30 * 60;

pub trait Clock {
    fn now(&self) -> DateTime<Local>;
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Second zero of minute 0 or 30.
pub fn is_alignment_boundary(at: &DateTime<Local>) -> bool {
    at.second() == 0 && (at.minute() == 0 || at.minute() == 30)
}

/// Whole seconds until the next top-of-hour or half-hour mark.
pub fn time_to_boundary(at: &DateTime<Local>) -> Duration {
    let into_half_hour = (at.minute() % 30) * 60 + at.second();
    let remaining = (HALF_HOUR_SECS - into_half_hour) % HALF_HOUR_SECS;
    Duration::from_secs(remaining.into())
}

/// Time left until the next whole wall-clock second.
pub fn until_next_second(at: &DateTime<Local>) -> Duration {
    let nanos = at.nanosecond() % 1_000_000_000;
    Duration::from_nanos(u64::from(1_000_000_000 - nanos))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Active { since: DateTime<Local> },
}

/// Idle until an alignment boundary, then active for good.
///
/// Once active, a new file is due every `interval` counted from the first
/// activation. The schedule is not re-aligned to the wall clock afterwards.
#[derive(Debug)]
pub struct RotationScheduler {
    interval: Duration,
    state: State,
}

impl RotationScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Moves to `Active` if `now` is an alignment boundary.
    pub fn poll_idle(&mut self, now: DateTime<Local>) -> bool {
        if self.state == State::Idle && is_alignment_boundary(&now) {
            self.state = State::Active { since: now };
        }
        matches!(self.state, State::Active { .. })
    }

    pub fn activate(&mut self, now: DateTime<Local>) {
        self.state = State::Active { since: now };
    }

    /// True once per elapsed interval; the period start advances by whole intervals.
    pub fn rotation_due(&mut self, now: DateTime<Local>) -> bool {
        let State::Active { since } = self.state else {
            return false;
        };
        let Ok(elapsed) = (now - since).to_std() else {
            return false;
        };
        if elapsed < self.interval {
            return false;
        }
        let since = if self.interval.is_zero() {
            now
        } else {
            let periods = (elapsed.as_secs_f64() / self.interval.as_secs_f64()).floor();
            chrono::TimeDelta::from_std(self.interval.mul_f64(periods))
                .map(|advance| since + advance)
                .unwrap_or(now)
        };
        self.state = State::Active { since };
        true
    }
}

/// Append-only CSV file, reopened for every write.
#[derive(Debug, Clone)]
pub struct LogFile {
    path: PathBuf,
}

impl LogFile {
    pub fn file_name(profile: InstrumentProfile, created: &DateTime<Local>) -> String {
        format!("{}_{}.csv", profile.name(), created.format("%y%m%d%H%M%S"))
    }

    /// Creates `<profile>_<YYMMDDHHMMSS>.csv` in `directory` and writes `header`.
    pub fn create(
        directory: &Path,
        profile: InstrumentProfile,
        created: &DateTime<Local>,
        header: Option<&str>,
    ) -> io::Result<Self> {
        let file = Self {
            path: directory.join(Self::file_name(profile, created)),
        };
        file.append(header.unwrap_or_default())?;
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}
