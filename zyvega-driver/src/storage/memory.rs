use crate::storage::{BackingStore, Configuration, StorageError};
use core::future::{ready, Ready};

/// Keeps the registry in memory only; everything is lost on restart.
#[derive(Default)]
pub struct MemoryBackingStore {
    content: Configuration,
}

impl MemoryBackingStore {
    pub fn new(content: Configuration) -> Self {
        Self { content }
    }

    pub fn content(&self) -> &Configuration {
        &self.content
    }
}

impl BackingStore for MemoryBackingStore {
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
        ready(Ok(self.content.clone()))
    }

    fn store<'f>(&'f mut self, content: &'f Configuration) -> Self::StoreFuture<'f> {
        self.content = content.clone();
        ready(Ok(()))
    }

    fn clear(&mut self) -> Self::ClearFuture<'_> {
        self.content = Configuration::default();
        ready(Ok(()))
    }
}
