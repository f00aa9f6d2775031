//! SQLite-backed document store.
//!
//! Documents are stored as JSON text keyed by `(db_name, collection, id)`, so a
//! single SQLite file hosts any number of logical databases. Text search goes
//! through an FTS5 table holding the string values of each document.

use std::{str::FromStr, sync::Arc};

use {
    async_trait::async_trait,
    serde_json::{Value, json},
    sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    syntagma_common::{Error, Result},
    tracing::{debug, info},
};

use crate::{
    document::{
        Collection, Connector, Database, Document, DocumentClient, ID_FIELD, InsertManyResult,
    },
    filter::StoreFilter,
};

const MAX_CONNECTIONS: u32 = 5;

/// Create the document and text-index tables if missing.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(Error::store)
}

/// Opens [`SqliteClient`]s from sqlx SQLite URLs (`sqlite::memory:`, `sqlite://file.db`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnector;

#[async_trait]
impl Connector for SqliteConnector {
    async fn connect(&self, url: &str) -> Result<Arc<dyn DocumentClient>> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| Error::configuration(format!("invalid store URL: {e}")))?
            .create_if_missing(true);

        // Each pooled connection to an in-memory database would otherwise see its own data.
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(Error::store)?;
        run_migrations(&pool).await?;
        info!(in_memory, "sqlite document store opened");

        Ok(Arc::new(SqliteClient { pool }))
    }
}

pub struct SqliteClient {
    pool: SqlitePool,
}

impl SqliteClient {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentClient for SqliteClient {
    fn database(&self, name: &str) -> Arc<dyn Database> {
        Arc::new(SqliteDatabase {
            pool: self.pool.clone(),
            name: name.to_string(),
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

struct SqliteDatabase {
    pool: SqlitePool,
    name: String,
}

#[async_trait]
impl Database for SqliteDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        Arc::new(SqliteCollection {
            pool: self.pool.clone(),
            db_name: self.name.clone(),
            name: name.to_string(),
        })
    }

    async fn ping(&self) -> Result<Value> {
        let one: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::store)?;
        Ok(json!({ "ok": one }))
    }
}

struct SqliteCollection {
    pool: SqlitePool,
    db_name: String,
    name: String,
}

#[async_trait]
impl Collection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_many(&self, docs: Vec<Document>) -> Result<InsertManyResult> {
        if docs.is_empty() {
            return Ok(InsertManyResult::default());
        }

        let mut tx = self.pool.begin().await.map_err(Error::store)?;
        let mut inserted_ids = Vec::with_capacity(docs.len());

        for mut doc in docs {
            let id = match doc.get(ID_FIELD) {
                Some(Value::String(id)) => id.clone(),
                Some(other) => other.to_string(),
                None => uuid::Uuid::new_v4().to_string(),
            };
            doc.insert(ID_FIELD.into(), Value::String(id.clone()));
            let body = serde_json::to_string(&doc)?;

            let seq = sqlx::query(
                "INSERT INTO documents (id, db_name, collection, body) VALUES (?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(&self.db_name)
            .bind(&self.name)
            .bind(&body)
            .execute(&mut *tx)
            .await
            .map_err(Error::store)?
            .last_insert_rowid();

            sqlx::query("INSERT INTO documents_fts (doc_seq, content) VALUES (?, ?)")
                .bind(seq)
                .bind(searchable_text(&doc))
                .execute(&mut *tx)
                .await
                .map_err(Error::store)?;

            inserted_ids.push(id);
        }

        tx.commit().await.map_err(Error::store)?;
        debug!(collection = %self.name, count = inserted_ids.len(), "inserted documents");

        Ok(InsertManyResult {
            inserted_count: inserted_ids.len(),
            inserted_ids,
        })
    }

    async fn find(&self, filter: &StoreFilter) -> Result<Vec<Document>> {
        let bodies: Vec<String> = match filter.text_search().and_then(fts_query) {
            Some(match_expr) => sqlx::query_scalar(
                "SELECT body FROM documents \
                 WHERE db_name = ? AND collection = ? \
                   AND seq IN (SELECT doc_seq FROM documents_fts WHERE documents_fts MATCH ?) \
                 ORDER BY seq",
            )
            .bind(&self.db_name)
            .bind(&self.name)
            .bind(match_expr)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::store)?,
            None => sqlx::query_scalar(
                "SELECT body FROM documents WHERE db_name = ? AND collection = ? ORDER BY seq",
            )
            .bind(&self.db_name)
            .bind(&self.name)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::store)?,
        };

        let mut out = Vec::new();
        for body in bodies {
            let doc: Document = serde_json::from_str(&body)?;
            if filter.matches(&doc) {
                out.push(doc);
            }
        }
        debug!(collection = %self.name, matched = out.len(), "find completed");
        Ok(out)
    }
}

/// Build an FTS5 expression matching any of the whitespace-separated words.
fn fts_query(term: &str) -> Option<String> {
    let words: Vec<String> = term
        .split_whitespace()
        .map(|w| w.replace('"', ""))
        .filter(|w| !w.is_empty())
        .map(|w| format!("\"{w}\""))
        .collect();
    (!words.is_empty()).then(|| words.join(" OR "))
}

/// Top-level string values (and strings inside top-level arrays), excluding the id.
fn searchable_text(doc: &Document) -> String {
    let mut parts = Vec::new();
    for (key, value) in doc {
        if key == ID_FIELD {
            continue;
        }
        match value {
            Value::String(s) => parts.push(s.as_str()),
            Value::Array(items) => parts.extend(items.iter().filter_map(Value::as_str)),
            _ => {},
        }
    }
    parts.join("\n")
}
