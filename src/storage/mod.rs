//! Storage abstractions for collected records.
//!
//! Stores only append. The destination (directory or table) must already
//! exist; `verify` checks this before a collector fetches anything, and no
//! store ever creates schema.

pub mod local;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::credentials::Credentials;
use crate::error::Result;
use crate::models::{NormalizedRecord, StoreConfig, StoreKind};

// Re-export for convenience
pub use local::LocalStorage;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

/// Trait for record storage backends.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Human-readable destination, e.g. a path or table name.
    fn destination(&self) -> String;

    /// Check that the destination exists without creating it.
    async fn verify(&self) -> Result<()>;

    /// Append records and return how many were written.
    async fn insert(&self, records: &[NormalizedRecord]) -> Result<usize>;
}

/// Credential names a store needs in addition to the collector's.
pub fn required_env(config: &StoreConfig) -> Vec<String> {
    match config.kind {
        StoreKind::Postgres => vec![config.uri_env.clone()],
        StoreKind::None | StoreKind::Local => Vec::new(),
    }
}

/// Open the configured store, or `None` for print-only runs.
pub async fn open(
    config: &StoreConfig,
    credentials: &Credentials,
) -> Result<Option<Box<dyn RecordStore>>> {
    match config.kind {
        StoreKind::None => Ok(None),
        StoreKind::Local => Ok(Some(Box::new(LocalStorage::new(&config.local_dir)))),
        StoreKind::Postgres => open_postgres(config, credentials).await,
    }
}

#[cfg(feature = "postgres")]
async fn open_postgres(
    config: &StoreConfig,
    credentials: &Credentials,
) -> Result<Option<Box<dyn RecordStore>>> {
    let uri = credentials.get(&config.uri_env)?;
    let store = PostgresStore::connect(uri, &config.table).await?;
    Ok(Some(Box::new(store)))
}

#[cfg(not(feature = "postgres"))]
async fn open_postgres(
    _config: &StoreConfig,
    _credentials: &Credentials,
) -> Result<Option<Box<dyn RecordStore>>> {
    Err(crate::error::AppError::config(
        "store.kind = \"postgres\" requires the `postgres` feature",
    ))
}
