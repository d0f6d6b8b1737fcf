use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::model::IterationState;
use crate::paths::{RALPH_ACTIVE_FILE, RALPH_COMPLETE_FILE, RALPH_LOCK_FILE, RALPH_STATE_FILE};
use crate::ralph::machine::GateState;
use crate::storage::write_atomic;

/// Persistence for the stop gate.
pub trait IterationPort {
    /// Held across one read-decide-write cycle so concurrent stop events
    /// cannot both consume the same iteration.
    type Guard;

    /// Take the gate's exclusive lock.
    fn lock(&self) -> Result<Self::Guard, CoreError>;

    /// Observe the current state.
    fn snapshot(&self) -> Result<GateState, CoreError>;

    /// Create the state and the active sentinel together.
    fn activate(&self, state: &IterationState) -> Result<(), CoreError>;

    /// Overwrite the state after a blocked stop.
    fn persist(&self, state: &IterationState) -> Result<(), CoreError>;

    /// Drop the completion sentinel.
    fn signal_complete(&self) -> Result<(), CoreError>;

    /// Delete state and both sentinels.
    fn cleanup(&self) -> Result<(), CoreError>;
}

/// Exclusive lock on `ralph.lock`, released on drop.
///
/// The state file itself is replaced by rename on every write, so the lock
/// lives on a separate file that is never replaced.
#[derive(Debug)]
pub struct GateLock(Option<fs::File>);

impl Drop for GateLock {
    fn drop(&mut self) {
        if let Some(file) = &self.0 {
            let _ = fs2::FileExt::unlock(file);
        }
    }
}

/// Gate state kept as files in the project's `.maestro/` directory:
/// `ralph.state` (JSON), `ralph.active` and `ralph.complete` (empty sentinels).
#[derive(Debug, Clone)]
pub struct FileIterationPort {
    dir: PathBuf,
}

impl FileIterationPort {
    pub fn new(meta_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: meta_dir.into(),
        }
    }

    fn state_path(&self) -> PathBuf {
        self.dir.join(RALPH_STATE_FILE)
    }

    fn active_path(&self) -> PathBuf {
        self.dir.join(RALPH_ACTIVE_FILE)
    }

    fn complete_path(&self) -> PathBuf {
        self.dir.join(RALPH_COMPLETE_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(RALPH_LOCK_FILE)
    }

    fn load_state(&self) -> Option<IterationState> {
        let data = fs::read_to_string(self.state_path()).ok()?;
        match serde_json::from_str(&data) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!("Unreadable iteration state: {e}");
                None
            }
        }
    }

    fn write_state(&self, state: &IterationState) -> Result<(), CoreError> {
        let json = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.state_path(), &json)
    }
}

fn touch(path: &Path) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<(), CoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl IterationPort for FileIterationPort {
    type Guard = GateLock;

    fn lock(&self) -> Result<GateLock, CoreError> {
        // No meta directory means no gate; nothing to serialize against.
        if !self.dir.is_dir() {
            return Ok(GateLock(None));
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        fs2::FileExt::lock_exclusive(&file)?;
        Ok(GateLock(Some(file)))
    }

    fn snapshot(&self) -> Result<GateState, CoreError> {
        if !self.active_path().exists() {
            // A state file without its sentinel is left over from a run
            // that was torn down halfway.
            if self.state_path().exists() {
                return Ok(GateState::Orphaned);
            }
            return Ok(GateState::Inactive);
        }
        let Some(state) = self.load_state() else {
            return Ok(GateState::Orphaned);
        };
        if self.complete_path().exists() {
            Ok(GateState::CompletionSignaled(state))
        } else {
            Ok(GateState::Active(state))
        }
    }

    fn activate(&self, state: &IterationState) -> Result<(), CoreError> {
        remove_if_exists(&self.complete_path())?;
        self.write_state(state)?;
        touch(&self.active_path())
    }

    fn persist(&self, state: &IterationState) -> Result<(), CoreError> {
        self.write_state(state)
    }

    fn signal_complete(&self) -> Result<(), CoreError> {
        touch(&self.complete_path())
    }

    fn cleanup(&self) -> Result<(), CoreError> {
        remove_if_exists(&self.state_path())?;
        remove_if_exists(&self.active_path())?;
        remove_if_exists(&self.complete_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IterationMode;
    use tempfile::TempDir;

    #[test]
    fn test_activate_snapshot_cleanup() {
        let tmp = TempDir::new().unwrap();
        let port = FileIterationPort::new(tmp.path().join(".maestro"));
        assert_eq!(port.snapshot().unwrap(), GateState::Inactive);

        let state = IterationState::new(4, IterationMode::Tests, vec!["api".into()]);
        port.activate(&state).unwrap();
        assert_eq!(port.snapshot().unwrap(), GateState::Active(state.clone()));

        port.signal_complete().unwrap();
        assert_eq!(
            port.snapshot().unwrap(),
            GateState::CompletionSignaled(state)
        );

        port.cleanup().unwrap();
        assert_eq!(port.snapshot().unwrap(), GateState::Inactive);
        assert_eq!(fs::read_dir(tmp.path().join(".maestro")).unwrap().count(), 0);
    }

    #[test]
    fn test_sentinels_are_empty_files() {
        let tmp = TempDir::new().unwrap();
        let port = FileIterationPort::new(tmp.path());
        port.activate(&IterationState::new(1, IterationMode::Quality, vec![]))
            .unwrap();
        port.signal_complete().unwrap();
        assert_eq!(fs::metadata(tmp.path().join("ralph.active")).unwrap().len(), 0);
        assert_eq!(fs::metadata(tmp.path().join("ralph.complete")).unwrap().len(), 0);
    }

    #[test]
    fn test_corrupt_state_is_orphaned() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("ralph.active"), "").unwrap();
        fs::write(tmp.path().join("ralph.state"), "{\"max\":").unwrap();
        let port = FileIterationPort::new(tmp.path());
        assert_eq!(port.snapshot().unwrap(), GateState::Orphaned);
    }

    #[test]
    fn test_state_without_sentinel_is_orphaned() {
        let tmp = TempDir::new().unwrap();
        let port = FileIterationPort::new(tmp.path());
        port.activate(&IterationState::new(2, IterationMode::Quality, vec![]))
            .unwrap();
        fs::remove_file(tmp.path().join("ralph.active")).unwrap();
        assert_eq!(port.snapshot().unwrap(), GateState::Orphaned);
    }

    #[test]
    fn test_lock_is_exclusive_and_released_on_drop() {
        let tmp = TempDir::new().unwrap();
        let port = FileIterationPort::new(tmp.path());
        let guard = port.lock().unwrap();
        assert!(tmp.path().join("ralph.lock").exists());

        let other = fs::File::open(tmp.path().join("ralph.lock")).unwrap();
        assert!(fs2::FileExt::try_lock_exclusive(&other).is_err());
        drop(guard);
        assert!(fs2::FileExt::try_lock_exclusive(&other).is_ok());
    }

    #[test]
    fn test_lock_without_meta_dir_creates_nothing() {
        let tmp = TempDir::new().unwrap();
        let port = FileIterationPort::new(tmp.path().join(".maestro"));
        let _guard = port.lock().unwrap();
        assert!(!tmp.path().join(".maestro").exists());
    }

    #[test]
    fn test_activate_clears_stale_completion() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("ralph.complete"), "").unwrap();
        let port = FileIterationPort::new(tmp.path());
        let state = IterationState::new(2, IterationMode::Polish, vec![]);
        port.activate(&state).unwrap();
        assert_eq!(port.snapshot().unwrap(), GateState::Active(state));
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let port = FileIterationPort::new(tmp.path());
        port.cleanup().unwrap();
        port.cleanup().unwrap();
    }
}
