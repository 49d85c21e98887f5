use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Scratch directory holding one attempt's source and build products.
/// Removal hangs off `Drop`, so the directory is released on every exit
/// path of the judging task, including compile failures and faults.
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    /// Idempotent: an attempt directory that already exists is reused.
    pub fn prepare(root: &Path, attempt_id: u64) -> Result<Self> {
        let path = root.join(format!("attempt_{}", attempt_id));
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        // a partially missing tree is fine
        let _ = fs::remove_dir_all(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_is_idempotent() -> Result<()> {
        let root = tempfile::TempDir::new()?;

        let first = Workspace::prepare(root.path(), 7)?;
        fs::write(first.path().join("main.py"), "print(1)")?;
        std::mem::forget(first);

        // same attempt id again, directory and content still there
        let second = Workspace::prepare(root.path(), 7)?;
        assert!(second.path().join("main.py").exists());
        Ok(())
    }

    #[test]
    fn dropped_workspace_is_removed() -> Result<()> {
        let root = tempfile::TempDir::new()?;
        let path;
        {
            let workspace = Workspace::prepare(root.path(), 1)?;
            fs::write(workspace.path().join("main"), "x")?;
            path = workspace.path().to_path_buf();
        }
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn drop_tolerates_missing_directory() -> Result<()> {
        let root = tempfile::TempDir::new()?;
        let workspace = Workspace::prepare(root.path(), 2)?;
        fs::remove_dir_all(workspace.path())?;
        drop(workspace);
        Ok(())
    }
}
