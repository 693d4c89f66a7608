// Per-case writer lock: an advisory flock on a lock file that records the owner's PID

use crate::error::{CasedexError, Result};
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const LOCK_FILE: &str = "writer.lock";

/// Exclusive right to mutate one case. Released on drop.
///
/// The kernel drops the lock when the holding process exits, so a crashed
/// writer never leaves the case locked. The file itself stays behind; its
/// contents only name the holder in conflict errors.
#[derive(Debug)]
pub struct WriterLock {
    namespace: String,
    case_dir: PathBuf,
    lock_file: PathBuf,
    _guard: Flock<File>,
}

impl WriterLock {
    /// Acquire the lock for the case stored in `case_dir`.
    ///
    /// Fails immediately with `WriterConflict` if another open lock
    /// description holds it, whether in this process or another.
    pub fn acquire(case_dir: &Path, namespace: &str) -> Result<Self> {
        fs::create_dir_all(case_dir).map_err(|e| {
            CasedexError::io(
                e,
                format!("Failed to create case directory: {}", case_dir.display()),
            )
        })?;

        let lock_file = case_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_file)
            .map_err(|e| {
                CasedexError::io(e, format!("Failed to open lock file: {}", lock_file.display()))
            })?;

        let mut guard = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(guard) => guard,
            Err((mut file, errno)) if errno == Errno::EWOULDBLOCK => {
                return Err(CasedexError::WriterConflict {
                    namespace: namespace.to_string(),
                    holder_pid: read_holder(&mut file).unwrap_or(0),
                });
            }
            Err((_, errno)) => {
                return Err(CasedexError::io(
                    errno.into(),
                    format!("Failed to lock {}", lock_file.display()),
                ));
            }
        };

        record_holder(&mut guard, std::process::id())
            .map_err(|e| CasedexError::io(e, "Failed to write PID to lock file"))?;

        tracing::debug!("Acquired writer lock for case '{}'", namespace);
        Ok(Self {
            namespace: namespace.to_string(),
            case_dir: case_dir.to_path_buf(),
            lock_file,
            _guard: guard,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn case_dir(&self) -> &Path {
        &self.case_dir
    }

    pub fn lock_file(&self) -> &Path {
        &self.lock_file
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        tracing::debug!("Released writer lock for case '{}'", self.namespace);
    }
}

/// Replace whatever a previous holder left in the file with `pid`
fn record_holder(file: &mut File, pid: u32) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(pid.to_string().as_bytes())?;
    file.sync_all()
}

/// PID written by the current holder, if it has written one yet
fn read_holder(file: &mut File) -> Option<u32> {
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}
