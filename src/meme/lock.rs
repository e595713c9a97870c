//! Exclusive lock around a store's load → mutate → save cycle
//!
//! The lock is an OS advisory write lock (`flock` / `LockFileEx` through
//! `fd-lock`) on a sibling `<store>.lock` file. The kernel drops it when the
//! holder's file handle closes, including when the process dies, so a crashed
//! writer never leaves the store locked and there is no stale-lock takeover.
//! The lockfile itself stays on disk; only the lock on it matters.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use super::error::{MemeError, MemeResult};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Timing for lock acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    pub timeout: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
        }
    }
}

/// Open handle on a store's lockfile, not yet locked
pub struct StoreLock {
    path: PathBuf,
    file: fd_lock::RwLock<File>,
    options: LockOptions,
}

impl StoreLock {
    /// Lockfile path for a given store file
    pub fn path_for(store_path: &Path) -> PathBuf {
        let mut name = store_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| ".memes".into());
        name.push(".lock");
        store_path.with_file_name(name)
    }

    /// Open (creating if needed) the lockfile for `store_path`
    pub fn open(store_path: &Path, options: LockOptions) -> MemeResult<Self> {
        let path = Self::path_for(store_path);
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| MemeError::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| MemeError::io(&path, e))?;

        Ok(Self {
            path,
            file: fd_lock::RwLock::new(file),
            options,
        })
    }

    /// Run `f` while holding the write lock.
    ///
    /// Polls until the lock is free or `timeout` has passed; the timeout is
    /// checked on every attempt.
    pub fn hold<T, F>(&mut self, f: F) -> MemeResult<T>
    where
        F: FnOnce() -> MemeResult<T>,
    {
        let started = Instant::now();
        loop {
            match self.file.try_write() {
                Ok(_guard) => {
                    log::debug!("Acquired store lock: {}", self.path.display());
                    let out = f();
                    log::debug!("Released store lock: {}", self.path.display());
                    return out;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    let waited = started.elapsed();
                    if waited >= self.options.timeout {
                        return Err(MemeError::Locked {
                            path: self.path.clone(),
                            waited,
                        });
                    }
                    thread::sleep(POLL_INTERVAL.min(self.options.timeout - waited));
                }
                Err(e) => return Err(MemeError::io(&self.path, e)),
            }
        }
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for StoreLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLock")
            .field("path", &self.path)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;
    use tempfile::tempdir;

    fn quick() -> LockOptions {
        LockOptions {
            timeout: Duration::from_millis(120),
        }
    }

    #[test]
    fn test_lock_path_is_sibling() {
        let path = StoreLock::path_for(Path::new("/tmp/work/.memes"));
        assert_eq!(path, PathBuf::from("/tmp/work/.memes.lock"));
    }

    #[test]
    fn test_lock_released_after_hold() {
        let dir = tempdir().unwrap();
        let store = dir.path().join(".memes");

        let mut lock = StoreLock::open(&store, quick()).unwrap();
        assert!(lock.path().exists());
        assert_eq!(lock.hold(|| Ok(7)).unwrap(), 7);

        let mut again = StoreLock::open(&store, quick()).unwrap();
        assert!(again.hold(|| Ok(())).is_ok());
    }

    #[test]
    fn test_second_writer_times_out() {
        let dir = tempdir().unwrap();
        let store = dir.path().join(".memes");

        let mut held = StoreLock::open(&store, quick()).unwrap();
        held.hold(|| {
            let started = Instant::now();
            let err = StoreLock::open(&store, quick())?.hold(|| Ok(())).unwrap_err();
            assert!(matches!(err, MemeError::Locked { .. }));
            assert!(started.elapsed() < Duration::from_secs(2));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_waiting_writer_gets_lock_after_release() {
        let dir = tempdir().unwrap();
        let store = dir.path().join(".memes");
        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder_store = store.clone();
        let holder = thread::spawn(move || {
            StoreLock::open(&holder_store, quick())
                .unwrap()
                .hold(|| {
                    locked_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    thread::sleep(Duration::from_millis(100));
                    Ok(())
                })
                .unwrap();
        });

        locked_rx.recv().unwrap();
        release_tx.send(()).unwrap();
        let mut waiter = StoreLock::open(
            &store,
            LockOptions {
                timeout: Duration::from_secs(5),
            },
        )
        .unwrap();
        assert!(waiter.hold(|| Ok(())).is_ok());
        holder.join().unwrap();
    }

    #[test]
    fn test_leftover_lockfile_does_not_block() {
        let dir = tempdir().unwrap();
        let store = dir.path().join(".memes");
        // What a crashed writer leaves behind: the file, but no OS lock
        fs::write(StoreLock::path_for(&store), "99999\n").unwrap();

        let mut lock = StoreLock::open(&store, quick()).unwrap();
        assert!(lock.hold(|| Ok(())).is_ok());
    }

    #[test]
    fn test_unusable_lock_path_fails_fast() {
        let dir = tempdir().unwrap();
        let store = dir.path().join(".memes");
        fs::create_dir(StoreLock::path_for(&store)).unwrap();

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let result = StoreLock::open(&store, quick()).and_then(|mut lock| lock.hold(|| Ok(())));
            tx.send(result.map_err(|e| e.to_string())).unwrap();
        });

        let result = rx
            .recv_timeout(Duration::from_secs(3))
            .expect("acquire must return instead of spinning");
        assert!(result.is_err());
    }

    #[test]
    fn test_concurrent_writers_are_exclusive() {
        let dir = tempdir().unwrap();
        let store = Arc::new(dir.path().join(".memes"));
        let inside = Arc::new(AtomicBool::new(false));
        let entered = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..6)
            .map(|_| {
                let store = Arc::clone(&store);
                let inside = Arc::clone(&inside);
                let entered = Arc::clone(&entered);
                thread::spawn(move || {
                    for _ in 0..5 {
                        let mut lock = StoreLock::open(
                            &store,
                            LockOptions {
                                timeout: Duration::from_secs(30),
                            },
                        )
                        .unwrap();
                        lock.hold(|| {
                            assert!(!inside.swap(true, Ordering::SeqCst), "two holders at once");
                            entered.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(2));
                            inside.store(false, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(entered.load(Ordering::SeqCst), 30);
    }
}
