//! Keyed image store
//!
//! One file per asset, named `<asset id>.<format>`. A later download of the
//! same asset overwrites the earlier file.

use crate::error::{IngestError, Result};
use std::path::{Path, PathBuf};

/// Formats the dataset stage reads, in probe order
pub const ACCEPTED_FORMATS: [&str; 3] = ["png", "gif", "jpeg"];

#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open the store, creating its directory when missing
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(root);
        std::fs::create_dir_all(&store.root)?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Asset ids end up in file names; anything that could escape the store
    /// directory is refused.
    fn check_id(id: &str) -> Result<()> {
        if id.is_empty()
            || id == "."
            || id == ".."
            || id.contains(['/', '\\', '\0'])
        {
            return Err(IngestError::config(format!("asset id {:?} is not a valid file name", id)));
        }
        Ok(())
    }

    pub fn path_for(&self, id: &str, extension: &str) -> Result<PathBuf> {
        Self::check_id(id)?;
        Ok(self.root.join(format!("{}.{}", id, extension)))
    }

    /// Store raw image bytes for `id`, returning the written path
    pub fn save(&self, id: &str, extension: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(id, extension)?;
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// First stored file for `id` among `formats`, in the given order
    pub fn locate(&self, id: &str, formats: &[&str]) -> Option<PathBuf> {
        formats
            .iter()
            .filter_map(|ext| self.path_for(id, ext).ok())
            .find(|path| path.is_file())
    }
}
