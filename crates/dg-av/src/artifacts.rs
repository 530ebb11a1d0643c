//! Temporary artifact management.
//!
//! The [`ArtifactManager`] owns every scratch path it hands out. Names follow
//! `<prefix>_<unix-millis>_<counter><random>.<ext>` inside the temp
//! directory; the counter makes two allocations in the same millisecond
//! distinct. An [`ArtifactScope`] records the allocations of one pipeline
//! run and releases all of them when dropped, whichever way the run ends.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dg_core::config::TempConfig;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Allocates and releases scratch files and directories.
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    dir: PathBuf,
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl ArtifactManager {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_config(config: &TempConfig) -> Self {
        Self::new(config.resolved_dir(), config.prefix.clone())
    }

    /// Directory scratch artifacts live in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// A fresh, unused path with the given extension (leading dot optional,
    /// empty for none). Nothing is created on disk.
    pub fn allocate(&self, ext: &str) -> PathBuf {
        let name = self.next_name();
        let ext = ext.trim_start_matches('.');
        if ext.is_empty() {
            self.dir.join(name)
        } else {
            self.dir.join(format!("{name}.{ext}"))
        }
    }

    /// Create a fresh scratch directory.
    pub fn allocate_dir(&self) -> dg_core::Result<PathBuf> {
        let path = self.dir.join(self.next_name());
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    fn next_name(&self) -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let salt: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(4)
            .map(|c| char::from(c).to_ascii_lowercase())
            .collect();
        format!("{}_{millis}_{n:x}{salt}", self.prefix)
    }

    /// Best-effort delete of a file or directory. A missing path is not an
    /// error; other failures are logged and swallowed.
    pub fn release(&self, path: &Path) {
        let result = match std::fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
            Ok(_) => std::fs::remove_file(path),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => tracing::debug!(path = %path.display(), "Released artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), "Failed to clean up artifact: {e}"),
        }
    }

    /// Delete every entry in the temp directory carrying this manager's
    /// prefix. Run at startup and shutdown to clear leftovers from a run
    /// that was killed before it could clean up. Returns how many entries
    /// were removed.
    pub fn sweep_stale(&self) -> usize {
        if self.prefix.is_empty() {
            return 0;
        }
        let marker = format!("{}_", self.prefix);
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), "Cannot sweep temp directory: {e}");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let matches = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&marker));
            if matches {
                let path = entry.path();
                self.release(&path);
                if std::fs::symlink_metadata(&path).is_err() {
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            tracing::info!(removed, dir = %self.dir.display(), "Swept stale temp artifacts");
        }
        removed
    }

    /// Start a scope whose allocations are released together.
    pub fn scope(&self) -> ArtifactScope {
        ArtifactScope {
            manager: self.clone(),
            owned: Vec::new(),
        }
    }
}

/// Allocations of one pipeline run. Everything still owned is released on
/// drop; [`ArtifactScope::keep`] hands a path back to the caller instead.
#[derive(Debug)]
pub struct ArtifactScope {
    manager: ArtifactManager,
    owned: Vec<PathBuf>,
}

impl ArtifactScope {
    pub fn allocate(&mut self, ext: &str) -> PathBuf {
        let path = self.manager.allocate(ext);
        self.owned.push(path.clone());
        path
    }

    pub fn allocate_dir(&mut self) -> dg_core::Result<PathBuf> {
        let path = self.manager.allocate_dir()?;
        self.owned.push(path.clone());
        Ok(path)
    }

    /// Stop tracking `path` so it survives the scope.
    pub fn keep(&mut self, path: &Path) {
        self.owned.retain(|p| p != path);
    }

    /// Paths currently owned by the scope.
    pub fn owned(&self) -> &[PathBuf] {
        &self.owned
    }

    /// Release everything now.
    pub fn release_all(&mut self) {
        for path in self.owned.drain(..).rev() {
            self.manager.release(&path);
        }
    }
}

impl Drop for ArtifactScope {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Move a finished scratch artifact onto its destination.
///
/// Tries a rename first (same filesystem) and falls back to copy + remove.
/// Returns the destination path.
pub fn finalize(scratch: &Path, dest: &Path) -> dg_core::Result<PathBuf> {
    if !scratch.is_file() {
        return Err(dg_core::Error::Internal(format!(
            "scratch output does not exist: {}",
            scratch.display()
        )));
    }
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    if let Err(rename_err) = std::fs::rename(scratch, dest) {
        tracing::debug!("rename failed ({rename_err}); copying instead");
        std::fs::copy(scratch, dest)?;
        if let Err(e) = std::fs::remove_file(scratch) {
            tracing::warn!(path = %scratch.display(), "Failed to clean up artifact: {e}");
        }
    }

    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;

    fn manager(dir: &Path) -> ArtifactManager {
        ArtifactManager::new(dir, "DeskGif")
    }

    #[test]
    fn allocations_are_distinct_and_prefixed() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        let paths: HashSet<PathBuf> = (0..1000).map(|_| m.allocate("gif")).collect();
        assert_eq!(paths.len(), 1000);
        for p in &paths {
            assert!(p.starts_with(dir.path()));
            let name = p.file_name().unwrap().to_str().unwrap();
            assert!(name.starts_with("DeskGif_"));
            assert!(name.ends_with(".gif"));
        }
    }

    #[test]
    fn allocate_accepts_dotted_and_empty_ext() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        assert_eq!(m.allocate(".png").extension().unwrap(), "png");
        assert!(m.allocate("").extension().is_none());
    }

    #[test]
    fn release_missing_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        m.release(&dir.path().join("DeskGif_missing.gif"));
    }

    #[test]
    fn release_removes_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        let frames = m.allocate_dir().unwrap();
        fs::write(frames.join("frame_001.png"), b"png").unwrap();
        m.release(&frames);
        assert!(!frames.exists());
    }

    #[test]
    fn scope_releases_on_drop_except_kept() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        let (a, b) = {
            let mut scope = m.scope();
            let a = scope.allocate("png");
            let b = scope.allocate("gif");
            fs::write(&a, b"a").unwrap();
            fs::write(&b, b"b").unwrap();
            scope.keep(&b);
            (a, b)
        };
        assert!(!a.exists());
        assert!(b.exists());
    }

    #[test]
    fn sweep_only_touches_prefixed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        fs::write(dir.path().join("DeskGif_1_a.gif"), b"x").unwrap();
        fs::create_dir(dir.path().join("DeskGif_2_b")).unwrap();
        fs::write(dir.path().join("DeskGifnot.gif"), b"x").unwrap();
        fs::write(dir.path().join("holiday.gif"), b"x").unwrap();

        assert_eq!(m.sweep_stale(), 2);
        assert!(dir.path().join("DeskGifnot.gif").exists());
        assert!(dir.path().join("holiday.gif").exists());
        assert!(!dir.path().join("DeskGif_2_b").exists());
    }

    #[test]
    fn sweep_with_empty_prefix_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("_x"), b"x").unwrap();
        assert_eq!(ArtifactManager::new(dir.path(), "").sweep_stale(), 0);
        assert!(dir.path().join("_x").exists());
    }

    #[test]
    fn finalize_moves_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        let scratch = m.allocate("gif");
        fs::write(&scratch, b"GIF89a").unwrap();
        let dest = dir.path().join("out").join("result.gif");

        let final_path = finalize(&scratch, &dest).unwrap();
        assert_eq!(final_path, dest);
        assert_eq!(fs::read(&dest).unwrap(), b"GIF89a");
        assert!(!scratch.exists());
    }

    #[test]
    fn finalize_replaces_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("DeskGif_s.gif");
        let dest = dir.path().join("result.gif");
        fs::write(&scratch, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();
        finalize(&scratch, &dest).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
    }

    #[test]
    fn finalize_fails_when_scratch_missing() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("result.gif");
        assert!(finalize(&dir.path().join("nope.gif"), &dest).is_err());
        assert!(!dest.exists());
    }
}
