use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, warn};

use crate::{PipelineError, Result};

/// A directory that only lives as long as this guard.
///
/// It's removed on `close` or, failing that, when the guard is dropped, whichever way the work
/// inside it ended.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    armed: bool,
}

impl ScratchDir {
    /// Creates the directory, emptying it first if it's left over from a previous run.
    pub fn create<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();

        if path.exists() {
            debug!("clearing leftover {}", path.display());
            fs::remove_dir_all(&path).map_err(PipelineError::io(&path))?;
        }

        fs::create_dir_all(&path).map_err(PipelineError::io(&path))?;
        Ok(Self { path, armed: true })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the directory now, reporting whether that worked.
    pub fn close(mut self) -> Result<()> {
        self.armed = false;
        remove(&self.path).map_err(PipelineError::io(&self.path))
    }

    /// Keeps the directory around, handing its path back.
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        if let Err(e) = remove(&self.path) {
            warn!("failed to remove {}: {e}", self.path.display());
        }
    }
}

fn remove(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_on_close() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path().join("scratch")).unwrap();
        let path = scratch.path().to_path_buf();
        fs::write(path.join("file"), b"x").unwrap();

        scratch.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("scratch");

        {
            let _scratch = ScratchDir::create(&path).unwrap();
            assert!(path.is_dir());
        }

        assert!(!path.exists());
    }

    #[test]
    fn leftovers_are_cleared_and_kept_dirs_survive() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("scratch");
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("stale"), b"x").unwrap();

        let scratch = ScratchDir::create(&path).unwrap();
        assert!(!path.join("stale").exists());

        assert_eq!(scratch.keep(), path);
        assert!(path.is_dir());
    }

    #[test]
    fn closing_an_already_removed_dir_is_fine() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path().join("scratch")).unwrap();

        fs::remove_dir_all(scratch.path()).unwrap();
        scratch.close().unwrap();
    }
}
