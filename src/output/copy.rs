//! COPY-format script writer
//!
//! Wraps the emitted blocks in a transaction with FK triggers suppressed,
//! so tables participating in cycles load in any order.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::Value;
use crate::output::escape::escape_copy_value;
use crate::schema::Table;

pub struct CopyScriptWriter<'w, W> {
    writer: &'w mut W,
    bytes_written: u64,
}

impl<'w, W> CopyScriptWriter<'w, W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: &'w mut W) -> Self {
        Self {
            writer,
            bytes_written: 0,
        }
    }

    async fn write_bytes(&mut self, bytes: &[u8]) -> EngineResult<()> {
        self.writer
            .write_all(bytes)
            .await
            .map_err(|e| EngineError::write(e.to_string()))?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    async fn write_line(&mut self, line: &str) -> EngineResult<()> {
        self.write_bytes(line.as_bytes()).await?;
        self.write_bytes(b"\n").await
    }

    pub async fn write_header(&mut self) -> EngineResult<()> {
        self.write_line("BEGIN;").await?;
        self.write_line("SET session_replication_role = 'replica';")
            .await?;
        self.write_line("").await
    }

    pub async fn write_footer(&mut self) -> EngineResult<()> {
        self.write_line("SET session_replication_role = 'origin';")
            .await?;
        self.write_line("COMMIT;").await
    }

    /// Writes a COPY block for one table. Tables without rows emit nothing.
    pub async fn write_table(&mut self, table: &Table, rows: &[Vec<Value>]) -> EngineResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        self.write_line(&format!(
            "COPY {} ({}) FROM stdin;",
            table.full_name(),
            table.column_names().join(", ")
        ))
        .await?;

        for row in rows {
            let fields: Vec<String> = row.iter().map(escape_copy_value).collect();
            self.write_line(&fields.join("\t")).await?;
        }

        self.write_line("\\.").await?;
        self.write_line("").await
    }

    pub async fn flush(&mut self) -> EngineResult<()> {
        self.writer
            .flush()
            .await
            .map_err(|e| EngineError::write(e.to_string()))
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}
