// SPDX-License-Identifier: GPL-3.0-only

//! Capture artifacts on disk and the per-session log

use crate::constants::artifacts::{
    FINAL_EXTENSION, INTERMEDIATE_EXTENSION, LOG_EXTENSION, TRIM_SUFFIX,
};
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{debug, warn};

/// Paths of every file a session produces, all sharing one base name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    /// Final container (`<base>.mkv`)
    pub final_path: PathBuf,
    /// Stream written while capturing (`<base>.ts`)
    pub intermediate: PathBuf,
    /// Append-only session log (`<base>.log`)
    pub log: PathBuf,
    /// Temporary trim output (`<base>.trim.mkv`)
    pub trimmed: PathBuf,
}

impl Artifacts {
    /// Derive artifact paths from the output directory and the validated
    /// filename (which already carries the final extension)
    pub fn new(output_dir: &Path, filename: &str) -> Self {
        let final_path = output_dir.join(filename);
        let stem = final_path.with_extension("");
        let with_ext = |ext: &str| {
            let mut name = stem.clone().into_os_string();
            name.push(".");
            name.push(ext);
            PathBuf::from(name)
        };

        Self {
            intermediate: with_ext(INTERMEDIATE_EXTENSION),
            log: with_ext(LOG_EXTENSION),
            trimmed: with_ext(&format!("{}.{}", TRIM_SUFFIX, FINAL_EXTENSION)),
            final_path,
        }
    }

    /// Artifacts a new session would clobber
    pub fn existing(&self) -> Vec<&Path> {
        [&self.final_path, &self.intermediate, &self.log]
            .into_iter()
            .map(PathBuf::as_path)
            .filter(|p| p.exists())
            .collect()
    }
}

/// A file counts as produced only if it exists and is non-empty
pub fn artifact_present(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// Append-only log shared by the tool and its child processes
#[derive(Debug)]
pub struct SessionLog {
    file: File,
    path: PathBuf,
}

impl SessionLog {
    /// Open (or create) the log for appending
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        debug!(path = %path.display(), "Opened session log");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one timestamped line
    pub fn line(&mut self, message: &str) -> io::Result<()> {
        writeln!(
            self.file,
            "[{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        )?;
        self.file.flush()
    }

    /// Like [`Self::line`], but a failed write is only traced
    ///
    /// Used while children are running, where losing a log line must not
    /// abort the stage.
    pub fn note(&mut self, message: &str) {
        if let Err(e) = self.line(message) {
            warn!(path = %self.path.display(), error = %e, "Failed to write session log");
        }
    }

    /// Write a section banner, used at the start of each stage
    pub fn section(&mut self, title: &str) -> io::Result<()> {
        writeln!(self.file)?;
        self.line(&format!("===== {} =====", title))
    }

    /// Handle for a child's stderr that appends to this log
    pub fn child_sink(&self) -> io::Result<Stdio> {
        Ok(Stdio::from(self.file.try_clone()?))
    }
}
