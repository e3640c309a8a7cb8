use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};

pub const ERROR_LOG_NAME: &str = "error.log";

/// Plain text side log of recovered failures, one timestamped line each.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn in_directory(directory: &Path) -> Self {
        Self {
            path: directory.join(ERROR_LOG_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, at: &DateTime<Local>, message: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{} {}", at.format("%m/%d/%Y %I:%M:%S %p"), message)
    }
}
