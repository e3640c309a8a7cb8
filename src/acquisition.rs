//! The sampling loop: wait for alignment, then frame, normalize and append
//! records forever, rotating files on schedule.

use std::{
    fmt::Display,
    fs, io,
    io::Read,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Local};
use status_line::StatusLine;

use crate::{
    error_log::ErrorLog,
    header::{build_header, probe_header},
    link,
    normalizer::{CaptureTimestamp, normalize},
    profile::{HeaderSource, InstrumentProfile},
    reader::{self, FrameReader},
    scheduler::{
        Clock, LogFile, ROTATION_INTERVAL, RotationScheduler, time_to_boundary,
        until_next_second,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error on {}: {source}", .path.display())]
    IoError { path: PathBuf, source: io::Error },

    #[error("link error: {0}")]
    LinkError(link::Error),

    #[error("header probe failed: {0}")]
    HeaderProbe(reader::Error),

    #[error("read error: {0}")]
    ReaderError(reader::Error),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub profile: InstrumentProfile,
    pub port: String,
    pub directory: PathBuf,
    pub interval: Duration,
    pub link_timeout: Duration,
}

impl Settings {
    pub fn new(
        profile: InstrumentProfile,
        port: impl Into<String>,
        directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            profile,
            port: port.into(),
            directory: directory.into(),
            interval: ROTATION_INTERVAL,
            link_timeout: Duration::from_millis(250),
        }
    }

    pub fn ensure_directory(&self) -> Result<(), Error> {
        fs::create_dir_all(&self.directory).map_err(|source| Error::IoError {
            path: self.directory.clone(),
            source,
        })
    }
}

/// Seconds left until acquisition starts, rendered as `MM:SS`.
#[derive(Clone, Default)]
pub struct Countdown {
    remaining: Arc<AtomicU64>,
}

impl Countdown {
    pub fn set(&self, remaining: Duration) {
        self.remaining.store(remaining.as_secs(), Ordering::Relaxed);
    }

    pub fn get(&self) -> Duration {
        Duration::from_secs(self.remaining.load(Ordering::Relaxed))
    }
}

impl Display for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secs = self.remaining.load(Ordering::Relaxed);
        write!(
            f,
            "\tCountdown until data collection (MM:SS):\t{:02}:{:02}",
            secs / 60,
            secs % 60
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub records: u64,
    pub files: u64,
    pub decode_failures: u64,
}

pub struct Acquisition<C> {
    settings: Settings,
    clock: C,
    stop: Arc<AtomicBool>,
    error_log: ErrorLog,
    header: Option<String>,
    countdown: Countdown,
    show_countdown: bool,
}

impl<C: Clock> Acquisition<C> {
    pub fn new(settings: Settings, clock: C, stop: Arc<AtomicBool>) -> Self {
        let error_log = ErrorLog::in_directory(&settings.directory);
        let header = build_header(settings.profile, None);
        Self {
            settings,
            clock,
            stop,
            error_log,
            header,
            countdown: Countdown::default(),
            show_countdown: false,
        }
    }

    /// Draws the idle countdown on a status line while waiting for alignment.
    pub fn with_countdown_display(mut self) -> Self {
        self.show_countdown = true;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    pub fn countdown(&self) -> Countdown {
        self.countdown.clone()
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Reads the column names from instruments that report their own header.
    ///
    /// Uses a link of its own that is closed again before returning. Raising
    /// the stop flag while waiting leaves the header unprobed and returns `Ok`.
    pub fn probe_header<R, F>(&mut self, open: F) -> Result<(), Error>
    where
        R: Read,
        F: FnOnce(&Settings) -> Result<R, link::Error>,
    {
        if self.settings.profile.traits().header != HeaderSource::Probed {
            return Ok(());
        }
        eprintln!("checking {} header...", self.settings.profile);
        let link = open(&self.settings).map_err(Error::LinkError)?;
        let mut reader =
            FrameReader::new(link, self.settings.profile).with_stop(self.stop.clone());
        let probed = match probe_header(&mut reader) {
            Ok(probed) => probed,
            // stopping before the header arrived is a clean shutdown
            Err(reader::Error::Interrupted) => return Ok(()),
            Err(e) => return Err(Error::HeaderProbe(e)),
        };
        log::info!("{} reported columns: {}", self.settings.profile, probed);
        self.header = build_header(self.settings.profile, Some(&probed));
        Ok(())
    }

    /// Sleeps in whole-second ticks until an alignment boundary.
    ///
    /// Returns the activation instant, or `None` if stopped first.
    pub fn wait_for_alignment(
        &self,
        scheduler: &mut RotationScheduler,
    ) -> Option<DateTime<Local>> {
        let _status = self
            .show_countdown
            .then(|| StatusLine::new(self.countdown.clone()));
        loop {
            if self.stopped() {
                return None;
            }
            let now = self.clock.now();
            if scheduler.poll_idle(now) {
                return Some(now);
            }
            self.countdown.set(time_to_boundary(&now));
            self.clock.sleep(until_next_second(&now));
        }
    }

    fn open_log_file(
        &self,
        created: &DateTime<Local>,
        stats: &mut Stats,
    ) -> Result<LogFile, Error> {
        let file = LogFile::create(
            &self.settings.directory,
            self.settings.profile,
            created,
            self.header.as_deref(),
        )
        .map_err(|source| Error::IoError {
            path: self
                .settings
                .directory
                .join(LogFile::file_name(self.settings.profile, created)),
            source,
        })?;
        stats.files += 1;
        eprintln!("New file created: {}", file.path().display());
        Ok(file)
    }

    fn record_decode_failure(&self, error: &reader::Error) {
        log::warn!("dropped malformed record: {error}");
        let now = self.clock.now();
        if let Err(e) = self.error_log.record(&now, &format!("decode error: {error}")) {
            log::error!("failed to write {}: {e}", self.error_log.path().display());
        }
    }

    /// Samples until stopped, rotating the log file whenever the scheduler says so.
    ///
    /// Malformed records are logged and skipped without touching the current
    /// file or index. Returns `Ok` when the stop flag ends the run.
    pub fn run_active<R: Read>(
        &self,
        scheduler: &mut RotationScheduler,
        reader: &mut FrameReader<R>,
        activated: DateTime<Local>,
    ) -> Result<Stats, Error> {
        let mut stats = Stats::default();
        scheduler.activate(activated);
        let mut file = self.open_log_file(&activated, &mut stats)?;
        let mut index: u64 = 0;

        while !self.stopped() {
            let now = self.clock.now();
            if scheduler.rotation_due(now) {
                file = self.open_log_file(&now, &mut stats)?;
                index = 0;
            }

            let record = match reader.read_record() {
                Ok(record) => record,
                Err(e) if e.is_decode() => {
                    self.record_decode_failure(&e);
                    stats.decode_failures += 1;
                    continue;
                }
                Err(reader::Error::Interrupted) => break,
                Err(e) => return Err(Error::ReaderError(e)),
            };
            let captured = CaptureTimestamp::new(self.clock.now());
            let line = normalize(&record, index, &captured);
            log::debug!("{}", line.trim_end());
            file.append(&line).map_err(|source| Error::IoError {
                path: file.path().to_path_buf(),
                source,
            })?;
            index += 1;
            stats.records += 1;
        }
        Ok(stats)
    }

    /// Waits for alignment, opens the link and samples until stopped.
    pub fn run<R, F>(&self, open: F) -> Result<Stats, Error>
    where
        R: Read,
        F: FnOnce(&Settings) -> Result<R, link::Error>,
    {
        let mut scheduler = RotationScheduler::new(self.settings.interval);
        let Some(activated) = self.wait_for_alignment(&mut scheduler) else {
            return Ok(Stats::default());
        };
        let link = open(&self.settings).map_err(Error::LinkError)?;
        let mut reader = FrameReader::new(link, self.settings.profile).with_stop(self.stop.clone());
        self.run_active(&mut scheduler, &mut reader, activated)
    }
}
