//! Postgres storage implementation.
//!
//! Appends records to an existing table:
//!
//! ```text
//! source TEXT, external_id TEXT, primary_text TEXT, url TEXT,
//! tags TEXT[], collected_at TIMESTAMPTZ, extra JSONB
//! ```
//!
//! Connections negotiate TLS with rustls against the webpki roots, so hosted
//! databases requiring `sslmode=require` work; `sslmode=disable` stays plain.

use std::sync::Arc;

use async_trait::async_trait;
use rustls::ClientConfig;
use tokio::sync::Mutex;
use tokio_postgres::Client;
use tokio_postgres::types::Json;
use tokio_postgres_rustls::MakeRustlsConnect;

use crate::error::{AppError, Result};
use crate::models::NormalizedRecord;
use crate::storage::RecordStore;

const DEFAULT_SCHEMA: &str = "public";

/// Schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    schema: String,
    table: String,
}

impl TableName {
    /// Parse `table` or `schema.table`.
    pub fn parse(name: &str) -> Result<Self> {
        let (schema, table) = match name.split_once('.') {
            Some((schema, table)) => (schema.trim(), table.trim()),
            None => (DEFAULT_SCHEMA, name.trim()),
        };
        if schema.is_empty() || table.is_empty() {
            return Err(AppError::config(format!("invalid table name '{name}'")));
        }
        Ok(Self {
            schema: schema.to_string(),
            table: table.to_string(),
        })
    }

    /// Fully-qualified reference with quoted identifiers.
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

/// Quote a Postgres identifier, escaping embedded quotes.
fn quote_ident(input: &str) -> String {
    format!("\"{}\"", input.replace('"', "\"\""))
}

fn insert_sql(table: &TableName) -> String {
    format!(
        "INSERT INTO {} \
            (source, external_id, primary_text, url, tags, collected_at, extra) \
            VALUES ($1, $2, $3, $4, $5, $6, $7)",
        table.qualified()
    )
}

fn tls_connector() -> Result<MakeRustlsConnect> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| AppError::store(format!("TLS setup failed: {e}")))?
    .with_root_certificates(roots)
    .with_no_client_auth();
    Ok(MakeRustlsConnect::new(config))
}

/// Postgres-backed record store.
pub struct PostgresStore {
    client: Mutex<Client>,
    table: TableName,
}

impl PostgresStore {
    /// Connect and drive the connection on a background task.
    pub async fn connect(uri: &str, table: &str) -> Result<Self> {
        let table = TableName::parse(table)?;
        let (client, connection) = tokio_postgres::connect(uri, tls_connector()?).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                log::error!("postgres connection error: {err}");
            }
        });
        Ok(Self {
            client: Mutex::new(client),
            table,
        })
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    fn destination(&self) -> String {
        self.table.qualified()
    }

    async fn verify(&self) -> Result<()> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                "SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_name = $2",
                &[&self.table.schema, &self.table.table],
            )
            .await?;
        match row {
            Some(_) => Ok(()),
            None => Err(AppError::store(format!(
                "table {} does not exist",
                self.table.qualified()
            ))),
        }
    }

    async fn insert(&self, records: &[NormalizedRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;
        let statement = transaction.prepare(&insert_sql(&self.table)).await?;
        for record in records {
            transaction
                .execute(
                    &statement,
                    &[
                        &record.source.as_str(),
                        &record.external_id,
                        &record.primary_text,
                        &record.url,
                        &record.tags,
                        &record.collected_at,
                        &Json(&record.extra),
                    ],
                )
                .await?;
        }
        transaction.commit().await?;
        log::debug!("Inserted {} records into {}", records.len(), self.table.qualified());
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_connector_builds() {
        assert!(tls_connector().is_ok());
    }

    #[test]
    fn bare_table_defaults_to_public_schema() {
        let table = TableName::parse("collected_records").unwrap();
        assert_eq!(table.qualified(), r#""public"."collected_records""#);
    }

    #[test]
    fn qualified_name_escapes_quotes() {
        let table = TableName::parse(r#"raw.jobs"2024"#).unwrap();
        assert_eq!(table.qualified(), r#""raw"."jobs""2024""#);
    }

    #[test]
    fn empty_parts_are_rejected() {
        assert!(TableName::parse("").is_err());
        assert!(TableName::parse("analytics.").is_err());
    }

    #[test]
    fn insert_lists_every_column() {
        let sql = insert_sql(&TableName::parse("harvest.records").unwrap());
        assert!(sql.starts_with(r#"INSERT INTO "harvest"."records""#));
        assert!(sql.contains("tags, collected_at, extra"));
        assert!(sql.ends_with("$7)"));
    }
}
