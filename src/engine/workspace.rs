//! Per-request temp files
//!
//! Names combine wall-clock nanoseconds, the process id and a process-wide
//! sequence number, so concurrent handlers never collide.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Temp file prefix
const PREFIX: &str = "maboss-rpc";

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A unique temp-file namespace, removed on drop
#[derive(Debug)]
pub struct Workspace {
    /// `{dir}/maboss-rpc_{nanos}_{pid}_{seq}`
    stem: PathBuf,

    /// Every path handed out, in order
    files: Vec<PathBuf>,
}

impl Workspace {
    /// Open a namespace under `dir`
    pub fn create(dir: &Path) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let stem = dir.join(format!("{}_{}_{}_{}", PREFIX, nanos, std::process::id(), seq));
        Self {
            stem,
            files: Vec::new(),
        }
    }

    /// Reserve a file path; it is removed on drop whether or not it exists
    pub fn path(&mut self, name: &str) -> PathBuf {
        let mut file = self.stem.clone().into_os_string();
        file.push("_");
        file.push(name);
        let path = PathBuf::from(file);
        self.files.push(path.clone());
        path
    }

    /// Reserve a file path and write `contents` to it
    pub fn write(&mut self, name: &str, contents: &str) -> io::Result<PathBuf> {
        let path = self.path(name);
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        for path in &self.files {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Cannot remove temp file {}: {}", path.display(), e),
            }
        }
    }
}

/// Read an output file; one the engine never created reads as empty
pub fn read_output(path: &Path) -> io::Result<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e),
    }
}
