//! In-memory database.
//!
//! Stores live in an [`InMemoryDatabaseRoot`] keyed by name, so every context
//! opened against the same name shares one dataset for the life of the root.
//! Nothing is written to disk.

use crate::models::{IdentityUser, Presentation, Speaker};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("the schema of in-memory database '{0}' has not been created")]
    SchemaNotCreated(String),

    #[error("duplicate key in {table}: {key}")]
    DuplicateKey { table: &'static str, key: String },
}

/// Tables of the conference tracker schema
#[derive(Debug, Default)]
pub struct Tables {
    pub speakers: BTreeMap<i64, Speaker>,
    pub presentations: BTreeMap<i64, Presentation>,
    pub users: BTreeMap<Uuid, IdentityUser>,
    last_speaker_id: i64,
    last_presentation_id: i64,
}

impl Tables {
    pub fn next_speaker_id(&mut self) -> i64 {
        self.last_speaker_id += 1;
        self.last_speaker_id
    }

    pub fn next_presentation_id(&mut self) -> i64 {
        self.last_presentation_id += 1;
        self.last_presentation_id
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty() && self.presentations.is_empty() && self.users.is_empty()
    }
}

/// A named in-memory store
#[derive(Debug)]
pub struct Database {
    name: String,
    tables: RwLock<Option<Tables>>,
    open_contexts: AtomicUsize,
}

impl Database {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tables: RwLock::new(None),
            open_contexts: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of contexts currently holding this store
    pub fn open_contexts(&self) -> usize {
        self.open_contexts.load(Ordering::SeqCst)
    }
}

/// Registry of named in-memory stores
#[derive(Debug, Default)]
pub struct InMemoryDatabaseRoot {
    stores: DashMap<String, Arc<Database>>,
}

impl InMemoryDatabaseRoot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the store with the given name, creating it on first use
    pub fn database(&self, name: &str) -> Arc<Database> {
        self.stores
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Database::new(name)))
            .clone()
    }
}

/// Options for opening a [`DbContext`]
#[derive(Debug, Clone)]
pub struct DbContextOptions {
    pub database_name: String,
}

impl DbContextOptions {
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            database_name: name.into(),
        }
    }
}

/// Handle on one named store. Released on drop.
#[derive(Debug)]
pub struct DbContext {
    database: Arc<Database>,
}

impl DbContext {
    pub fn open(root: &InMemoryDatabaseRoot, options: &DbContextOptions) -> Self {
        let database = root.database(&options.database_name);
        database.open_contexts.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(database = %database.name, "DbContext opened");
        Self { database }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    /// Create the schema if it does not exist yet.
    ///
    /// Returns `true` when this call created it.
    pub async fn ensure_created(&self) -> bool {
        let mut tables = self.database.tables.write().await;
        if tables.is_some() {
            return false;
        }
        *tables = Some(Tables::default());
        true
    }

    /// Run a read-only closure against the tables
    pub async fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> Result<R, DbError> {
        let guard = self.database.tables.read().await;
        let tables = guard
            .as_ref()
            .ok_or_else(|| DbError::SchemaNotCreated(self.database.name.clone()))?;
        Ok(f(tables))
    }

    /// Run a mutating closure against the tables
    pub async fn write<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> Result<R, DbError> {
        let mut guard = self.database.tables.write().await;
        let tables = guard
            .as_mut()
            .ok_or_else(|| DbError::SchemaNotCreated(self.database.name.clone()))?;
        Ok(f(tables))
    }
}

impl Drop for DbContext {
    fn drop(&mut self) {
        self.database.open_contexts.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(database = %self.database.name, "DbContext disposed");
    }
}
