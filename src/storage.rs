//! Named blob persistence used for the reading log and diagnostic log files.

use std::{
    fs::{self, OpenOptions},
    io::Write as _,
    path::{Component, Path, PathBuf},
};

use anyhow::{Context as _, Result, bail};

pub trait Storage: Send + Sync {
    /// Appends `data` to `path`, creating the blob if it does not exist.
    fn append(&self, path: &str, data: &str) -> Result<()>;

    /// Replaces the contents of `path` with `data`.
    fn write(&self, path: &str, data: &str) -> Result<()>;

    fn read(&self, path: &str) -> Result<String>;

    fn exists(&self, path: &str) -> bool;

    fn remove(&self, path: &str) -> Result<()>;
}

/// [`Storage`] backed by a directory on the local filesystem.
///
/// Blob names are resolved relative to `root`; a leading `/` is ignored so flash-style paths such
/// as `/sensor_data.txt` work unchanged.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create storage directory: {root:?}"))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative.as_os_str().is_empty() {
            bail!("empty storage path");
        }
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("storage path escapes the storage root: {path}");
        }

        Ok(self.root.join(relative))
    }

    fn create_parent(file: &Path) -> Result<()> {
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {parent:?}"))?;
        }
        Ok(())
    }
}

impl Storage for FileStorage {
    fn append(&self, path: &str, data: &str) -> Result<()> {
        let file = self.resolve(path)?;
        Self::create_parent(&file)?;

        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)
            .with_context(|| format!("failed to open file for appending: {file:?}"))?;
        handle
            .write_all(data.as_bytes())
            .with_context(|| format!("failed to append to file: {file:?}"))?;

        Ok(())
    }

    fn write(&self, path: &str, data: &str) -> Result<()> {
        let file = self.resolve(path)?;
        Self::create_parent(&file)?;

        fs::write(&file, data).with_context(|| format!("failed to write file: {file:?}"))
    }

    fn read(&self, path: &str) -> Result<String> {
        let file = self.resolve(path)?;
        fs::read_to_string(&file).with_context(|| format!("failed to read file: {file:?}"))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|file| file.is_file()).unwrap_or(false)
    }

    fn remove(&self, path: &str) -> Result<()> {
        let file = self.resolve(path)?;
        fs::remove_file(&file).with_context(|| format!("failed to remove file: {file:?}"))
    }
}

#[cfg(test)]
pub(crate) use memory::MemoryStorage;
