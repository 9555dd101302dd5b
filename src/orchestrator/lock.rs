//! Cross-invocation run lock.
//!
//! A JSON marker `{pid, timestamp}` at `.qgate/run.lock` says a run is in
//! progress. The marker moves through an explicit state machine:
//!
//! ```text
//! Unlocked ──acquire──▶ Held(pid, since) ──release──▶ Released
//!                            │
//!                            └──(older than the staleness window,
//!                                next acquire)──▶ Reclaimed
//! ```
//!
//! Reading and writing the marker happens inside one critical section guarded
//! by an exclusive `fs2` lock on a sidecar file, so two invocations cannot
//! both observe `Unlocked` and both take the lock. The lock itself stays
//! advisory: `--force` bypasses a live marker. [`RunLockGuard`] releases on
//! every exit path, including panics and early returns.

use chrono::{DateTime, TimeDelta, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{QgateError, Result};

/// A marker older than this is stale and reclaimed automatically.
pub const STALE_AFTER_SECS: i64 = 5 * 60;

const GUARD_SUFFIX: &str = ".guard";
const TMP_SUFFIX: &str = ".tmp";

/// Contents of the lock marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockMarker {
    pub pid: u32,
    pub timestamp: DateTime<Utc>,
}

impl LockMarker {
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.timestamp)
    }

    pub fn is_stale(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        self.age(now) > window
    }
}

/// Where a lock is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Held { pid: u32, since: DateTime<Utc> },
    Released,
    /// A stale marker taken over by a later invocation.
    Reclaimed { pid: u32, since: DateTime<Utc> },
}

impl From<LockMarker> for LockState {
    fn from(marker: LockMarker) -> Self {
        LockState::Held {
            pid: marker.pid,
            since: marker.timestamp,
        }
    }
}

/// What `qgate lock status` reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStatus {
    Free,
    Live(LockMarker),
    Stale(LockMarker),
    /// The marker exists but is not valid JSON.
    Corrupt(String),
}

/// The run lock at a path.
#[derive(Debug, Clone)]
pub struct RunLock {
    path: PathBuf,
    stale_after: TimeDelta,
}

impl RunLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stale_after: TimeDelta::seconds(STALE_AFTER_SECS),
        }
    }

    #[must_use]
    pub fn with_stale_after(mut self, window: TimeDelta) -> Self {
        self.stale_after = window;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard_path(&self) -> PathBuf {
        sibling(&self.path, GUARD_SUFFIX)
    }

    /// Run `f` while holding the exclusive sidecar lock.
    fn critical_section<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let guard = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.guard_path())?;
        FileExt::lock_exclusive(&guard)
            .map_err(|e| QgateError::lock(format!("Failed to enter lock critical section: {e}")))?;

        let result = f();

        if let Err(e) = FileExt::unlock(&guard) {
            debug!(error = %e, "Failed to unlock lock guard");
        }
        result
    }

    /// Read the marker; `Ok(None)` when absent, `Ok(Some(Err))` when corrupt.
    fn read_marker(&self) -> Result<Option<std::result::Result<LockMarker, String>>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(
                serde_json::from_str(&content).map_err(|e| e.to_string()),
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(QgateError::lock(format!(
                "Failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn write_marker(&self, marker: &LockMarker) -> Result<()> {
        let tmp = sibling(&self.path, TMP_SUFFIX);
        let json = serde_json::to_string(marker)?;
        let mut file = File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Observe the lock without changing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker exists but cannot be read.
    pub fn status(&self) -> Result<LockStatus> {
        let now = Utc::now();
        Ok(match self.read_marker()? {
            None => LockStatus::Free,
            Some(Err(e)) => LockStatus::Corrupt(e),
            Some(Ok(m)) if m.is_stale(now, self.stale_after) => LockStatus::Stale(m),
            Some(Ok(m)) => LockStatus::Live(m),
        })
    }

    /// Take the lock.
    ///
    /// A live marker is an error unless `force` is set. Stale and corrupt
    /// markers are reclaimed with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`QgateError::LockHeld`] on contention, or a lock error if the
    /// marker cannot be read or written.
    pub fn acquire(&self, force: bool) -> Result<RunLockGuard> {
        self.critical_section(|| {
            let now = Utc::now();
            let mut notices = Vec::new();

            let previous = match self.read_marker()? {
                None => LockState::Unlocked,
                Some(Err(e)) => {
                    warn!(path = %self.path.display(), error = %e, "Replacing corrupt run lock");
                    notices.push(format!("Replaced an unreadable run lock marker ({})", e));
                    LockState::Unlocked
                }
                Some(Ok(marker)) if marker.is_stale(now, self.stale_after) => {
                    warn!(pid = marker.pid, since = %marker.timestamp, "Reclaiming stale run lock");
                    notices.push(format!(
                        "Reclaimed stale run lock held by pid {} since {}",
                        marker.pid,
                        marker.timestamp.to_rfc3339()
                    ));
                    LockState::Reclaimed {
                        pid: marker.pid,
                        since: marker.timestamp,
                    }
                }
                Some(Ok(marker)) if force => {
                    warn!(pid = marker.pid, "Bypassing live run lock (--force)");
                    notices.push(format!(
                        "Bypassed the run lock held by pid {} (--force)",
                        marker.pid
                    ));
                    LockState::from(marker)
                }
                Some(Ok(marker)) => {
                    return Err(QgateError::LockHeld {
                        pid: marker.pid,
                        since: marker.timestamp.to_rfc3339(),
                    });
                }
            };

            let marker = LockMarker {
                pid: std::process::id(),
                timestamp: now,
            };
            self.write_marker(&marker)
                .map_err(|e| QgateError::lock(format!("Failed to write run lock: {e}")))?;
            debug!(path = %self.path.display(), pid = marker.pid, "Acquired run lock");

            Ok(RunLockGuard {
                lock: self.clone(),
                marker,
                previous,
                state: LockState::from(marker),
                notices,
            })
        })
    }

    /// Remove the marker unconditionally; returns what was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker cannot be removed.
    pub fn clear(&self) -> Result<Option<LockMarker>> {
        self.critical_section(|| {
            let existing = self.read_marker()?;
            if existing.is_none() {
                return Ok(None);
            }
            fs::remove_file(&self.path)?;
            Ok(existing.and_then(|m| m.ok()))
        })
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Scoped ownership of the run lock.
#[derive(Debug)]
pub struct RunLockGuard {
    lock: RunLock,
    marker: LockMarker,
    previous: LockState,
    state: LockState,
    notices: Vec<String>,
}

impl RunLockGuard {
    pub fn state(&self) -> LockState {
        self.state
    }

    /// What the marker was before this acquisition.
    pub fn previous(&self) -> LockState {
        self.previous
    }

    /// Reclaim/bypass notices for the run report.
    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    /// Release explicitly, surfacing any error.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker cannot be removed.
    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        if !matches!(self.state, LockState::Held { .. }) {
            return Ok(());
        }
        self.state = LockState::Released;
        let marker = self.marker;
        let lock = self.lock.clone();
        lock.critical_section(|| {
            // Only remove our own marker; a forced run may have replaced it.
            match lock.read_marker()? {
                Some(Ok(current)) if current == marker => {
                    fs::remove_file(&lock.path)?;
                    debug!(path = %lock.path.display(), "Released run lock");
                }
                _ => debug!(path = %lock.path.display(), "Run lock no longer ours, leaving it"),
            }
            Ok(())
        })
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!(error = %e, "Failed to release run lock");
        }
    }
}
