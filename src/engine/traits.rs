//! QueryExecutor trait definition
//!
//! This is the capability the extraction engine runs against: a
//! parameterized query in, a fully materialized set of rows out. The
//! PostgreSQL implementation lives in [`crate::engine::executor`]; tests
//! substitute scripted implementations.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::engine::error::EngineResult;
use crate::engine::types::{Row, Value};

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Executes a query with positional bind parameters and returns all rows.
    ///
    /// Implementations must honor the cancellation token: a cancelled call
    /// returns [`crate::engine::EngineError::Cancelled`] promptly rather
    /// than waiting for the round-trip to finish.
    async fn fetch(
        &self,
        cancel: &CancellationToken,
        sql: &str,
        params: &[Value],
    ) -> EngineResult<Vec<Row>>;
}
