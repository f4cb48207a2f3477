//! Lock file guarding the state documents during `execute` entry and exit.
//!
//! The durable `isRunning` flag is the run-level guard; this lock only
//! serializes the short read-modify-write critical sections so two racing
//! callers cannot both observe `isRunning == false`. The file lives at
//! `.{family}-publisher/lock` and holds JSON metadata about the holder.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PublishError;

pub const LOCK_FILE: &str = "lock";

/// Default age after which a leftover lock is considered stale and taken
/// over. Critical sections are sub-second, so this is generous.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30);

/// Information stored in the lock file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub hostname: String,
    pub acquired_at: DateTime<Utc>,
    /// Run being executed, once known.
    pub run_id: Option<String>,
}

/// Lock file handle; the file is removed on `release` or `Drop`.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    released: bool,
}

impl LockFile {
    /// Acquire the lock in `namespace`, taking over locks older than
    /// `stale_after`. Fails with [`PublishError::LockHeld`] when a live lock
    /// is present.
    pub fn acquire(namespace: &Path, stale_after: Duration) -> Result<Self> {
        let lock_path = namespace.join(LOCK_FILE);

        fs::create_dir_all(namespace)
            .with_context(|| format!("failed to create namespace {}", namespace.display()))?;

        if lock_path.exists() {
            match read_lock_info(&lock_path) {
                Ok(info) => {
                    let age = Utc::now() - info.acquired_at;
                    if age.num_seconds().unsigned_abs() > stale_after.as_secs() {
                        fs::remove_file(&lock_path).with_context(|| {
                            format!("failed to remove stale lock {}", lock_path.display())
                        })?;
                    } else {
                        return Err(PublishError::LockHeld {
                            pid: info.pid,
                            hostname: info.hostname,
                            since: info.acquired_at.to_rfc3339(),
                        }
                        .into());
                    }
                }
                // Corrupt lock file: nobody can legitimately hold it.
                Err(_) => {
                    fs::remove_file(&lock_path).with_context(|| {
                        format!("failed to remove corrupt lock {}", lock_path.display())
                    })?;
                }
            }
        }

        let info = LockInfo {
            pid: std::process::id(),
            hostname: gethostname::gethostname().to_string_lossy().to_string(),
            acquired_at: Utc::now(),
            run_id: None,
        };
        write_lock_info(&lock_path, &info)?;

        Ok(Self {
            path: lock_path,
            released: false,
        })
    }

    /// Record the run id in the lock file once the coordinator has one.
    pub fn set_run_id(&self, run_id: &str) -> Result<()> {
        let mut info = read_lock_info(&self.path)?;
        info.run_id = Some(run_id.to_string());
        write_lock_info(&self.path, &info)
    }

    pub fn release(mut self) -> Result<()> {
        self.remove_file()
    }

    fn remove_file(&mut self) -> Result<()> {
        if !self.released {
            self.released = true;
            if self.path.exists() {
                fs::remove_file(&self.path)
                    .with_context(|| format!("failed to remove lock {}", self.path.display()))?;
            }
        }
        Ok(())
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = self.remove_file();
    }
}

fn read_lock_info(path: &Path) -> Result<LockInfo> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read lock file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse lock file {}", path.display()))
}

fn write_lock_info(path: &Path, info: &LockInfo) -> Result<()> {
    let json = serde_json::to_string_pretty(info).context("failed to serialize lock info")?;
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)
            .with_context(|| format!("failed to create lock tmp file {}", tmp.display()))?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("failed to write lock tmp file {}", tmp.display()))?;
        file.sync_all().ok();
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to rename lock file to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn acquire_writes_and_release_removes() {
        let td = tempdir().expect("tempdir");
        let lock = LockFile::acquire(td.path(), DEFAULT_STALE_AFTER).expect("acquire");
        assert!(td.path().join(LOCK_FILE).exists());

        lock.release().expect("release");
        assert!(!td.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn second_acquire_fails_while_held() {
        let td = tempdir().expect("tempdir");
        let _lock = LockFile::acquire(td.path(), DEFAULT_STALE_AFTER).expect("acquire");

        let err = LockFile::acquire(td.path(), DEFAULT_STALE_AFTER).expect_err("must fail");
        let publish_err = err.downcast_ref::<PublishError>().expect("typed error");
        assert!(matches!(publish_err, PublishError::LockHeld { .. }));
    }

    #[test]
    fn drop_releases_the_lock() {
        let td = tempdir().expect("tempdir");
        {
            let _lock = LockFile::acquire(td.path(), DEFAULT_STALE_AFTER).expect("acquire");
            assert!(td.path().join(LOCK_FILE).exists());
        }
        assert!(!td.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn stale_lock_is_taken_over() {
        let td = tempdir().expect("tempdir");
        let path = td.path().join(LOCK_FILE);
        let stale = LockInfo {
            pid: 1,
            hostname: "elsewhere".to_string(),
            acquired_at: Utc::now() - chrono::Duration::hours(1),
            run_id: None,
        };
        write_lock_info(&path, &stale).expect("write stale");

        let lock = LockFile::acquire(td.path(), DEFAULT_STALE_AFTER).expect("takeover");
        let info = read_lock_info(&path).expect("read");
        assert_eq!(info.pid, std::process::id());
        drop(lock);
    }

    #[test]
    fn corrupt_lock_is_replaced() {
        let td = tempdir().expect("tempdir");
        let path = td.path().join(LOCK_FILE);
        fs::write(&path, "garbage").expect("write");

        let _lock = LockFile::acquire(td.path(), DEFAULT_STALE_AFTER).expect("acquire");
        assert!(read_lock_info(&path).is_ok());
    }

    #[test]
    fn set_run_id_updates_metadata() {
        let td = tempdir().expect("tempdir");
        let lock = LockFile::acquire(td.path(), DEFAULT_STALE_AFTER).expect("acquire");
        lock.set_run_id("abcdef012345").expect("set run id");

        let info = read_lock_info(&td.path().join(LOCK_FILE)).expect("read");
        assert_eq!(info.run_id.as_deref(), Some("abcdef012345"));
    }
}
