//! Document Store
//!
//! Typed access to the persisted document. All state transitions go through
//! [`Store::mutate`], which serializes load-modify-save behind one async
//! mutex so concurrent handlers (and the sweeper) cannot lose each other's
//! writes. The lock covers only the in-memory mutation and the save; it is
//! never held across gateway calls.

pub mod backend;
pub mod document;

pub use backend::{DocumentBackend, JsonFileBackend, MemoryBackend};
pub use document::{ApplicantProfile, Channel, Document, Grant, PendingRequest};

use crate::telegram::traits::UserId;
use tokio::sync::Mutex;
use tracing::debug;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Seed applied when no document has been persisted yet
#[derive(Debug, Clone, Default)]
pub struct DocumentSeed {
    pub super_admins: Vec<UserId>,
    pub channels: Vec<Channel>,
}

impl DocumentSeed {
    fn build(&self) -> Document {
        let mut document = Document::default();
        document.global_admins.extend(self.super_admins.iter().copied());
        for channel in &self.channels {
            document.channels.insert(channel.id, channel.clone());
        }
        document
    }
}

/// Serialized access to the persisted document
pub struct Store {
    backend: Box<dyn DocumentBackend>,
    seed: DocumentSeed,
    write_lock: Mutex<()>,
}

impl Store {
    pub fn new(backend: impl DocumentBackend + 'static, seed: DocumentSeed) -> Self {
        Self {
            backend: Box::new(backend),
            seed,
            write_lock: Mutex::new(()),
        }
    }

    /// In-memory store, for tests and dry runs
    pub fn in_memory(seed: DocumentSeed) -> Self {
        Self::new(MemoryBackend::new(), seed)
    }

    /// Load the current document
    ///
    /// A missing backing file yields the seeded default document. Super
    /// admins from the seed are always present in `global_admins`.
    pub async fn load(&self) -> Result<Document, StoreError> {
        self.load_unlocked()
    }

    fn load_unlocked(&self) -> Result<Document, StoreError> {
        let mut document = match self.backend.load()? {
            Some(document) => document,
            None => {
                debug!("No persisted document, using seeded defaults");
                self.seed.build()
            }
        };
        document
            .global_admins
            .extend(self.seed.super_admins.iter().copied());
        Ok(document)
    }

    /// Load, apply one logical change, save
    ///
    /// The closure's error aborts the transition: nothing is written and
    /// the in-memory copy is dropped. A save failure is surfaced as `E`.
    pub async fn mutate<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Document) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load_unlocked()?;
        let value = f(&mut document)?;
        self.backend.save(&document)?;
        Ok(value)
    }

    /// Like [`Store::mutate`] but only saves when the closure reports a change
    pub async fn mutate_if_changed<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Document) -> Result<(T, bool), E>,
        E: From<StoreError>,
    {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load_unlocked()?;
        let (value, changed) = f(&mut document)?;
        if changed {
            self.backend.save(&document)?;
        }
        Ok(value)
    }
}
