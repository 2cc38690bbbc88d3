// SPDX-License-Identifier: GPL-3.0-only

//! Live stream fan-out
//!
//! The encoder's stdout is copied to the intermediate file and mirrored into a
//! named FIFO read by the preview. The file always gets every byte; the mirror
//! is best effort and drops chunks when the preview falls behind, so a slow or
//! closed preview window never stalls the capture.

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Bytes read from the encoder per chunk
const CHUNK_SIZE: usize = 64 * 1024;

/// Chunks queued for the preview before new ones are dropped
const MIRROR_BACKLOG: usize = 64;

/// How often the mirror looks for a preview that has not opened the FIFO yet
const CONNECT_POLL: Duration = Duration::from_millis(20);

/// Session-scoped FIFO in a private temporary directory
///
/// Dropping it removes both the FIFO and the directory.
#[derive(Debug)]
pub struct TransientChannel {
    path: PathBuf,
    _dir: tempfile::TempDir,
}

impl TransientChannel {
    pub fn create() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("vhs-capture-").tempdir()?;
        let path = dir.path().join("preview.fifo");

        let cpath = CString::new(path.as_os_str().as_bytes())?;
        if unsafe { libc::mkfifo(cpath.as_ptr(), 0o600) } != 0 {
            return Err(io::Error::last_os_error());
        }

        debug!(path = %path.display(), "Created preview channel");
        Ok(Self { path, _dir: dir })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TransientChannel {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "Removing preview channel");
    }
}

/// Running copy threads of one session
#[derive(Debug)]
pub struct FanOut {
    tee: JoinHandle<io::Result<u64>>,
    mirror: JoinHandle<()>,
    /// Tells a mirror still waiting for a reader to give up
    finished: Arc<AtomicBool>,
}

impl FanOut {
    /// Start copying `source` into `file` and the channel's FIFO
    pub fn start<R>(source: R, file: File, channel: &TransientChannel) -> Self
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(MIRROR_BACKLOG);
        let fifo = channel.path().to_path_buf();
        let finished = Arc::new(AtomicBool::new(false));

        let give_up = Arc::clone(&finished);
        let mirror = thread::spawn(move || mirror_to_fifo(rx, &fifo, &give_up));
        let tee = thread::spawn(move || tee(source, file, tx));

        Self {
            tee,
            mirror,
            finished,
        }
    }

    /// Wait for the source to reach EOF and return the bytes persisted
    ///
    /// Call after the encoder has exited.
    pub fn finish(self) -> io::Result<u64> {
        let written = self
            .tee
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("fan-out thread panicked")));

        self.finished.store(true, Ordering::SeqCst);
        if self.mirror.join().is_err() {
            warn!("Preview mirror thread panicked");
        }
        written
    }
}

fn tee<R: Read>(mut source: R, mut file: File, mirror: SyncSender<Vec<u8>>) -> io::Result<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    let mut dropped = 0u64;
    let mut mirror = Some(mirror);

    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        file.write_all(&buf[..n])?;
        total += n as u64;

        if let Some(sender) = &mirror {
            match sender.try_send(buf[..n].to_vec()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => dropped += 1,
                Err(TrySendError::Disconnected(_)) => {
                    debug!("Preview stopped reading, continuing without it");
                    mirror = None;
                }
            }
        }
    }

    file.sync_all()?;
    if dropped > 0 {
        debug!(dropped, "Chunks skipped while the preview lagged");
    }
    debug!(bytes = total, "Fan-out reached end of stream");
    Ok(total)
}

/// Open the write end once a reader is present
///
/// A non-blocking open fails with ENXIO while nobody reads, so the mirror
/// never hangs in `open()`. Returns `None` when `finished` is set first.
fn connect(fifo: &Path, finished: &AtomicBool) -> io::Result<Option<File>> {
    loop {
        match OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(fifo)
        {
            Ok(out) => {
                set_blocking(&out)?;
                return Ok(Some(out));
            }
            Err(e) if e.raw_os_error() == Some(libc::ENXIO) => {
                if finished.load(Ordering::SeqCst) {
                    return Ok(None);
                }
                thread::sleep(CONNECT_POLL);
            }
            Err(e) => return Err(e),
        }
    }
}

fn set_blocking(file: &File) -> io::Result<()> {
    let fd = file.as_raw_fd();
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 || unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn mirror_to_fifo(chunks: Receiver<Vec<u8>>, fifo: &Path, finished: &AtomicBool) {
    // Chunks queue up (and the tee drops the excess) until the preview connects
    let mut out = match connect(fifo, finished) {
        Ok(Some(out)) => out,
        Ok(None) => {
            debug!("Preview never opened the channel");
            return;
        }
        Err(e) => {
            debug!(error = %e, "Could not open preview channel");
            return;
        }
    };

    for chunk in chunks {
        if let Err(e) = out.write_all(&chunk) {
            debug!(error = %e, "Preview channel closed");
            return;
        }
    }
}
