use crate::storage::{BackingStore, Configuration, StorageError, MAX_SERIALIZED_LEN};
use core::future::{ready, Ready};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Persists the registry as a single postcard document. Writes go to a
/// sibling temporary file which then replaces the real one.
pub struct FileBackingStore {
    path: PathBuf,
}

impl FileBackingStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// `$XDG_CONFIG_HOME/zyvega/network.bin`, else under `$HOME/.config`.
    pub fn default_path() -> Option<PathBuf> {
        let base = match std::env::var_os("XDG_CONFIG_HOME") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => PathBuf::from(std::env::var_os("HOME")?).join(".config"),
        };
        Some(base.join("zyvega").join("network.bin"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Configuration, StorageError> {
        match fs::read(&self.path) {
            Ok(bytes) => postcard::from_bytes(&bytes).map_err(|_| StorageError::Deserialization),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Configuration::default()),
            Err(_) => Err(StorageError::Load),
        }
    }

    fn write(&self, config: &Configuration) -> Result<(), StorageError> {
        let mut buf = [0; MAX_SERIALIZED_LEN];
        let bytes =
            postcard::to_slice(config, &mut buf).map_err(|_| StorageError::Serialization)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|_| StorageError::Store)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &*bytes).map_err(|_| StorageError::Store)?;
        fs::rename(&tmp, &self.path).map_err(|_| StorageError::Store)
    }

    fn remove(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(_) => Err(StorageError::Store),
        }
    }
}

impl BackingStore for FileBackingStore {
    type LoadFuture<'m> = Ready<Result<Configuration, StorageError>>
    where
        Self: 'm;
    type StoreFuture<'m> = Ready<Result<(), StorageError>>
    where
        Self: 'm;
    type ClearFuture<'m> = Ready<Result<(), StorageError>>
    where
        Self: 'm;

    fn load(&mut self) -> Self::LoadFuture<'_> {
        ready(self.read())
    }

    fn store<'f>(&'f mut self, config: &'f Configuration) -> Self::StoreFuture<'f> {
        ready(self.write(config))
    }

    fn clear(&mut self) -> Self::ClearFuture<'_> {
        ready(self.remove())
    }
}
