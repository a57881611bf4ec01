//! PostgreSQL executor
//!
//! Implements the QueryExecutor trait over a SQLx connection pool.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio_util::sync::CancellationToken;

use crate::config::ConnectionSettings;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::pg_values::{bind_param, convert_row};
use crate::engine::traits::QueryExecutor;
use crate::engine::types::{Row, Value};

pub struct PostgresExecutor {
    pool: PgPool,
}

impl PostgresExecutor {
    /// Connects to the database described by the settings and verifies the
    /// connection with a round-trip before returning.
    pub async fn connect(settings: &ConnectionSettings) -> EngineResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(&settings.url())
            .await
            .map_err(|e| EngineError::connection(e.to_string()))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| EngineError::connection(e.to_string()))?;

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    async fn fetch(
        &self,
        cancel: &CancellationToken,
        sql: &str,
        params: &[Value],
    ) -> EngineResult<Vec<Row>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_param(query, param);
        }

        tokio::select! {
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
            result = query.fetch_all(&self.pool) => {
                let pg_rows = result.map_err(|e| EngineError::query(e.to_string()))?;
                Ok(pg_rows.iter().map(convert_row).collect())
            }
        }
    }
}
