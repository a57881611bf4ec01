// SPDX-License-Identifier: Apache-2.0

//! Normalized error types for the extraction engine
//!
//! Every failure source (config validation, connection bootstrap, catalog
//! introspection, extraction queries, script emission) is mapped to one of
//! these variants so callers handle a single taxonomy.

use thiserror::Error;

/// Unified error type for all engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid config: {message}")]
    Config { message: String },

    #[error("connection failed: {message}")]
    Connection { message: String },

    #[error("introspection failed: {message}")]
    Introspection { message: String },

    #[error("root table \"{table}\" not found in schema")]
    UnknownRootTable { table: String },

    #[error("query failed: {message}")]
    Query { message: String },

    #[error("write failed: {message}")]
    Write { message: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config { message: msg.into() }
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection { message: msg.into() }
    }

    pub fn introspection(msg: impl Into<String>) -> Self {
        Self::Introspection { message: msg.into() }
    }

    pub fn unknown_root(table: impl Into<String>) -> Self {
        Self::UnknownRootTable { table: table.into() }
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query { message: msg.into() }
    }

    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write { message: msg.into() }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
