//! Durable transition state
//!
//! A single JSON file (`metadata/ha_state.json`) holds the state machine,
//! the in-flight attempt marker and the active pair configuration.
//!
//! Writes are atomic:
//! 1. Write to temp file
//! 2. fsync temp file
//! 3. Rename temp to final
//! 4. fsync the directory
//!
//! Every update is a read-modify-write under two locks: an in-process
//! mutex and a lock file that serializes separate processes sharing the
//! same data directory. The file is re-read inside the critical section,
//! so the check and the write form one compare-and-swap.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::state::{TransitionKind, TransitionState};
use crate::errors::{HaError, HaResult};
use crate::pair::PairConfig;
use crate::sync::lock;

const STATE_FILE_NAME: &str = "ha_state.json";
const LOCK_FILE_NAME: &str = "ha_state.lock";

/// A lock file older than this was left by a dead process.
const STALE_LOCK_AGE: Duration = Duration::from_secs(120);
const LOCK_WAIT: Duration = Duration::from_secs(30);
const LOCK_RETRY: Duration = Duration::from_millis(10);

/// The attempt currently holding the transition flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptMarker {
    pub attempt_id: Uuid,
    pub kind: TransitionKind,
    pub started_at: DateTime<Utc>,
    /// Process driving the attempt
    #[serde(default)]
    pub owner_pid: Option<u32>,
}

impl AttemptMarker {
    pub fn new(kind: TransitionKind) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            kind,
            started_at: Utc::now(),
            owner_pid: Some(std::process::id()),
        }
    }

    /// Whether the owning process is still running.
    ///
    /// Probed with signal 0 on unix; elsewhere the owner is assumed gone.
    /// Our own pid means a previous incarnation that reused it.
    pub fn owner_alive(&self) -> bool {
        match self.owner_pid {
            Some(pid) if pid != std::process::id() => process_exists(pid),
            _ => false,
        }
    }
}

#[cfg(unix)]
fn process_exists(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    // EPERM: alive, owned by another user
    matches!(kill(Pid::from_raw(raw), None), Ok(()) | Err(Errno::EPERM))
}

#[cfg(not(unix))]
fn process_exists(_pid: u32) -> bool {
    false
}

/// Everything that survives a restart apart from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub transition_state: TransitionState,

    /// Set while a transition is in flight
    #[serde(default)]
    pub attempt: Option<AttemptMarker>,

    /// Active pair configuration
    #[serde(default)]
    pub pair_config: Option<PairConfig>,

    pub updated_at: DateTime<Utc>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            transition_state: TransitionState::Steady,
            attempt: None,
            pair_config: None,
            updated_at: Utc::now(),
        }
    }
}

/// File-backed store for [`PersistedState`]
pub struct StateStore {
    state_path: PathBuf,
    temp_path: PathBuf,
    lock_path: PathBuf,
    guard: Mutex<()>,
}

impl StateStore {
    /// Open the store under `data_dir/metadata`, creating the directory.
    pub fn open(data_dir: &Path) -> HaResult<Self> {
        let metadata_dir = data_dir.join("metadata");
        fs::create_dir_all(&metadata_dir).map_err(|e| {
            HaError::Storage(format!(
                "failed to create metadata directory {}: {}",
                metadata_dir.display(),
                e
            ))
        })?;
        Ok(Self {
            state_path: metadata_dir.join(STATE_FILE_NAME),
            temp_path: metadata_dir.join(format!("{}.tmp", STATE_FILE_NAME)),
            lock_path: metadata_dir.join(LOCK_FILE_NAME),
            guard: Mutex::new(()),
        })
    }

    /// Current durable state. Absent file means a fresh, unconfigured install.
    pub fn snapshot(&self) -> HaResult<PersistedState> {
        if !self.state_path.exists() {
            return Ok(PersistedState::default());
        }
        let content = fs::read_to_string(&self.state_path)?;
        serde_json::from_str(&content).map_err(|e| {
            HaError::Storage(format!(
                "failed to parse {}: {}",
                self.state_path.display(),
                e
            ))
        })
    }

    /// Atomic read-modify-write.
    ///
    /// `f` works on a copy. The copy is written only if `f` returns Ok,
    /// so a rejected update leaves the durable state untouched.
    pub fn update<T>(&self, f: impl FnOnce(&mut PersistedState) -> HaResult<T>) -> HaResult<T> {
        let _local = lock(&self.guard);
        let _file_lock = FileLock::acquire(&self.lock_path)?;

        let current = self.snapshot()?;
        let mut next = current.clone();
        let result = f(&mut next)?;
        if next != current {
            next.updated_at = Utc::now();
            self.write_atomic(&next)?;
        }
        Ok(result)
    }

    fn write_atomic(&self, state: &PersistedState) -> HaResult<()> {
        let content = serde_json::to_string_pretty(state)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.temp_path)
            .map_err(|e| HaError::Storage(format!("failed to create temp state file: {}", e)))?;
        file.write_all(content.as_bytes())
            .map_err(|e| HaError::Storage(format!("failed to write state file: {}", e)))?;
        file.sync_all()
            .map_err(|e| HaError::Storage(format!("failed to fsync state file: {}", e)))?;

        fs::rename(&self.temp_path, &self.state_path)
            .map_err(|e| HaError::Storage(format!("failed to commit state file: {}", e)))?;

        if let Some(parent) = self.state_path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }
}

/// Exclusive lock file, removed on drop.
struct FileLock {
    path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> HaResult<Self> {
        let deadline = Instant::now() + LOCK_WAIT;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(path) {
                        warn!(path = %path.display(), "removing stale state lock");
                        let _ = fs::remove_file(path);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(HaError::Storage(format!(
                            "timed out waiting for state lock {}",
                            path.display()
                        )));
                    }
                    thread::sleep(LOCK_RETRY);
                }
                Err(e) => {
                    return Err(HaError::Storage(format!(
                        "failed to create state lock {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map(|age| age > STALE_LOCK_AGE)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_store_is_steady_and_unconfigured() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::open(tmp.path()).unwrap();

        let state = store.snapshot().unwrap();
        assert_eq!(state.transition_state, TransitionState::Steady);
        assert!(state.pair_config.is_none());
        assert!(state.attempt.is_none());
    }

    #[test]
    fn test_update_persists_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::open(tmp.path()).unwrap();

        store
            .update(|s| {
                s.transition_state = s.transition_state.begin(TransitionKind::Failover)?;
                s.attempt = Some(AttemptMarker::new(TransitionKind::Failover));
                Ok(())
            })
            .unwrap();
        drop(store);

        let reopened = StateStore::open(tmp.path()).unwrap();
        let state = reopened.snapshot().unwrap();
        assert_eq!(state.transition_state, TransitionState::FailoverInProgress);
        assert_eq!(state.attempt.unwrap().kind, TransitionKind::Failover);
    }

    #[test]
    fn test_rejected_update_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::open(tmp.path()).unwrap();
        store
            .update(|s| {
                s.transition_state = TransitionState::TransitionFailed;
                Ok(())
            })
            .unwrap();

        let err = store
            .update(|s| {
                s.pair_config = None;
                s.transition_state = s.transition_state.begin(TransitionKind::Switchback)?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, HaError::TransitionAlreadyInProgress(_)));
        assert_eq!(
            store.snapshot().unwrap().transition_state,
            TransitionState::TransitionFailed
        );
    }

    #[test]
    fn test_lock_file_released_after_update() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::open(tmp.path()).unwrap();
        store.update(|_| Ok(())).unwrap();

        assert!(!tmp.path().join("metadata").join(LOCK_FILE_NAME).exists());
    }

    /// Another live process holds its marker; once it exits it does not.
    #[cfg(unix)]
    #[test]
    fn test_other_process_owner_liveness() {
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let marker = AttemptMarker {
            owner_pid: Some(child.id()),
            ..AttemptMarker::new(TransitionKind::Failover)
        };
        assert!(marker.owner_alive());

        child.kill().unwrap();
        child.wait().unwrap();
        assert!(!marker.owner_alive());
    }

    #[test]
    fn test_own_pid_is_not_a_live_owner() {
        let marker = AttemptMarker::new(TransitionKind::Failover);
        assert!(!marker.owner_alive());

        let orphan = AttemptMarker {
            owner_pid: None,
            ..marker
        };
        assert!(!orphan.owner_alive());
    }

    #[test]
    fn test_concurrent_begin_admits_one() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(StateStore::open(tmp.path()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store.update(|s| {
                        s.transition_state = s.transition_state.begin(TransitionKind::Failover)?;
                        Ok(())
                    })
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| r.is_ok())
            .count();
        assert_eq!(admitted, 1);
    }

    #[test]
    fn test_two_stores_share_lock_file() {
        let tmp = TempDir::new().unwrap();
        let a = StateStore::open(tmp.path()).unwrap();
        let b = StateStore::open(tmp.path()).unwrap();

        a.update(|s| {
            s.transition_state = s.transition_state.begin(TransitionKind::Failover)?;
            Ok(())
        })
        .unwrap();

        let err = b
            .update(|s| {
                s.transition_state = s.transition_state.begin(TransitionKind::Switchback)?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(
            err,
            HaError::TransitionAlreadyInProgress(TransitionState::FailoverInProgress)
        ));
    }
}
