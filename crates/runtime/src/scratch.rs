//! Scratch storage for downloads, transcodes and synthesized outputs.
//!
//! Every artifact gets a random 128-bit name. Intermediates are wrapped in
//! [`ScratchFile`] guards that delete them when the request lets go; outputs
//! are kept and later collected by the reaper.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tts_core::TtsResult;
use uuid::Uuid;

use crate::metrics::TtsMetrics;

/// Root directory for request-scoped files.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Use `root` as scratch storage, creating it if needed.
    pub fn create(root: impl Into<PathBuf>) -> TtsResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The scratch root as configured.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A fresh, unused path with the given extension.
    pub fn unique_path(&self, extension: &str) -> PathBuf {
        let name = Uuid::new_v4().simple().to_string();
        self.root.join(format!("{name}.{extension}"))
    }

    /// A fresh path that is deleted when the guard drops.
    pub fn file(&self, extension: &str) -> ScratchFile {
        ScratchFile::new(self.unique_path(extension))
    }

    /// Resolve a client-supplied path to a file inside the scratch root.
    ///
    /// A leading scratch-root prefix is stripped, so paths handed out by this
    /// directory resolve verbatim. Returns `None` for anything that is not a
    /// regular file strictly inside the root, including traversal attempts.
    pub fn resolve(&self, requested: &str) -> Option<PathBuf> {
        let requested = Path::new(requested.trim());
        let relative = requested.strip_prefix(&self.root).unwrap_or(requested);

        let mut components = relative.components().peekable();
        components.peek()?;
        if !components.all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }

        let root = self.root.canonicalize().ok()?;
        let candidate = root.join(relative).canonicalize().ok()?;

        (candidate.starts_with(&root) && candidate != root && candidate.is_file())
            .then_some(candidate)
    }

    /// Delete regular files older than `ttl`. Returns how many were removed.
    pub fn reap(&self, ttl: Duration) -> TtsResult<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let meta = match entry.metadata() {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };

            let age = meta
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age <= ttl {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    path = %entry.path().display(),
                    error = %e,
                    "Failed to reap scratch file"
                ),
            }
        }

        Ok(removed)
    }

    /// Run [`reap`](Self::reap) every `interval` until `cancel` fires.
    pub fn spawn_reaper(
        &self,
        ttl: Duration,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let dir = self.clone();
        let metrics = TtsMetrics;

        tokio::spawn(async move {
            info!(
                root = %dir.root.display(),
                ttl_secs = ttl.as_secs(),
                interval_secs = interval.as_secs(),
                "Scratch reaper started"
            );

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let sweep = dir.clone();
                match tokio::task::spawn_blocking(move || sweep.reap(ttl)).await {
                    Ok(Ok(0)) => {}
                    Ok(Ok(count)) => {
                        metrics.scratch_reaped(count as u64);
                        info!(count, "Reaped expired scratch files");
                    }
                    Ok(Err(e)) => warn!(error = %e, "Scratch sweep failed"),
                    Err(e) => warn!(error = %e, "Scratch sweep panicked"),
                }
            }

            debug!("Scratch reaper stopped");
        })
    }
}

/// A scratch path deleted on drop unless [`keep`](Self::keep) is called.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    armed: bool,
}

impl ScratchFile {
    /// Guard `path`.
    pub fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// The guarded path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarm the guard and hand the path to the caller.
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed scratch file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove scratch file"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> (tempfile::TempDir, ScratchDir) {
        let tmp = tempfile::tempdir().unwrap();
        let dir = ScratchDir::create(tmp.path().join("TEMP")).unwrap();
        (tmp, dir)
    }

    #[test]
    fn test_unique_path_is_random_hex() {
        let (_tmp, dir) = scratch();
        let a = dir.unique_path("wav");
        let b = dir.unique_path("wav");

        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(dir.root()));
        let stem = a.file_stem().unwrap().to_str().unwrap();
        assert_eq!(stem.len(), 32);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a.extension().unwrap(), "wav");
    }

    #[test]
    fn test_scratch_file_removed_on_drop() {
        let (_tmp, dir) = scratch();
        let file = dir.file("mp3");
        fs::write(file.path(), b"data").unwrap();
        let path = file.path().to_path_buf();

        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_file_keep() {
        let (_tmp, dir) = scratch();
        let file = dir.file("wav");
        fs::write(file.path(), b"data").unwrap();

        let path = file.keep();
        assert!(path.exists());
    }

    #[test]
    fn test_drop_without_file_is_quiet() {
        let (_tmp, dir) = scratch();
        drop(dir.file("wav"));
    }

    #[test]
    fn test_resolve_accepts_returned_paths() {
        let (_tmp, dir) = scratch();
        let path = dir.unique_path("wav");
        fs::write(&path, b"RIFF").unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        let expected = path.canonicalize().unwrap();

        assert_eq!(dir.resolve(name), Some(expected.clone()));
        assert_eq!(dir.resolve(path.to_str().unwrap()), Some(expected));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let (tmp, dir) = scratch();
        fs::write(tmp.path().join("secret.txt"), b"secret").unwrap();

        assert_eq!(dir.resolve("../secret.txt"), None);
        assert_eq!(dir.resolve("../../etc/passwd"), None);
        assert_eq!(dir.resolve("/etc/passwd"), None);
        assert_eq!(dir.resolve(""), None);
        assert_eq!(dir.resolve("."), None);
    }

    #[test]
    fn test_resolve_missing_file() {
        let (_tmp, dir) = scratch();
        assert_eq!(dir.resolve("nope.wav"), None);
    }

    #[test]
    fn test_reap_removes_only_expired() {
        let (_tmp, dir) = scratch();
        let old = dir.unique_path("wav");
        let fresh = dir.unique_path("wav");
        fs::write(&old, b"old").unwrap();
        fs::write(&fresh, b"fresh").unwrap();

        let two_hours_ago = SystemTime::now() - Duration::from_secs(2 * 60 * 60);
        fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(two_hours_ago)
            .unwrap();

        let removed = dir.reap(Duration::from_secs(60 * 60)).unwrap();
        assert_eq!(removed, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[tokio::test]
    async fn test_reaper_stops_on_cancel() {
        let (_tmp, dir) = scratch();
        let cancel = CancellationToken::new();
        let handle = dir.spawn_reaper(
            Duration::from_secs(60),
            Duration::from_millis(10),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        handle.await.unwrap();
    }
}
