//! YAML configuration
//!
//! Connection fields left empty in the file fall back to the usual
//! PostgreSQL environment variables; values in the file always win.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub schemas: Vec<String>,
    #[serde(default)]
    pub roots: Vec<Root>,
    #[serde(default)]
    pub exclude_tables: Vec<String>,
    #[serde(default)]
    pub virtual_relations: Vec<VirtualRelation>,
    #[serde(default)]
    pub output: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionSettings {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub user: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub sslmode: String,
}

impl ConnectionSettings {
    /// Builds a PostgreSQL connection URL.
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.database, self.sslmode
        )
    }
}

/// A root table seeding extraction, with an optional raw WHERE predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Root {
    pub table: String,
    #[serde(default, rename = "where")]
    pub where_clause: Option<String>,
}

/// A user-declared relation the database does not enforce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualRelation {
    pub child_table: String,
    pub child_column: String,
    pub parent_table: String,
    pub parent_column: String,
    /// One of "", "array", or "json".
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub json_path: Option<String>,
}

impl Config {
    /// Reads and parses a YAML config file, applies environment fallbacks,
    /// and validates the fields every command needs.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let data = std::fs::read_to_string(path.as_ref())
            .map_err(|e| EngineError::config(format!("reading config file: {}", e)))?;

        let mut cfg: Config = serde_yaml::from_str(&data)
            .map_err(|e| EngineError::config(format!("parsing config file: {}", e)))?;

        cfg.apply_env();
        cfg.validate()?;

        Ok(cfg)
    }

    fn apply_env(&mut self) {
        let conn = &mut self.connection;
        if conn.host.is_empty() {
            conn.host = env_or(&["PGHOST", "POSTGRES_HOST"]);
        }
        if conn.port == 0 {
            let raw = env_or(&["PGPORT", "POSTGRES_PORT"]);
            if let Ok(p) = raw.parse::<u16>() {
                conn.port = p;
            }
        }
        if conn.database.is_empty() {
            conn.database = env_or(&["PGDATABASE", "POSTGRES_DB"]);
        }
        if conn.user.is_empty() {
            conn.user = env_or(&["PGUSER", "POSTGRES_USER"]);
        }
        if conn.password.is_empty() {
            conn.password = env_or(&["PGPASSWORD", "POSTGRES_PASSWORD"]);
        }
        if conn.sslmode.is_empty() {
            conn.sslmode = env_or(&["PGSSLMODE"]);
        }
    }

    fn validate(&mut self) -> EngineResult<()> {
        if self.connection.host.is_empty() {
            return Err(EngineError::config("connection.host is required"));
        }
        if self.connection.port == 0 {
            self.connection.port = 5432;
        }
        if self.connection.database.is_empty() {
            return Err(EngineError::config("connection.database is required"));
        }
        if self.connection.user.is_empty() {
            return Err(EngineError::config("connection.user is required"));
        }
        if self.connection.sslmode.is_empty() {
            self.connection.sslmode = "disable".to_string();
        }
        if self.schemas.is_empty() {
            self.schemas = vec!["public".to_string()];
        }
        Ok(())
    }

    /// Additional checks required before extraction may start.
    pub fn validate_for_extract(&self) -> EngineResult<()> {
        if self.roots.is_empty() {
            return Err(EngineError::config(
                "at least one root table must be specified in config",
            ));
        }
        for (i, root) in self.roots.iter().enumerate() {
            if root.table.is_empty() {
                return Err(EngineError::config(format!("roots[{}].table is required", i)));
            }
        }
        Ok(())
    }

    /// Excluded table names as a set for O(1) lookup.
    pub fn exclude_set(&self) -> HashSet<String> {
        self.exclude_tables.iter().cloned().collect()
    }
}

fn env_or(names: &[&str]) -> String {
    for name in names {
        if let Ok(v) = std::env::var(name) {
            if !v.is_empty() {
                return v;
            }
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Config {
        serde_yaml::from_str(yaml).expect("should parse")
    }

    #[test]
    fn parses_full_config() {
        let cfg = parse(
            r#"
connection:
  host: localhost
  port: 5433
  database: appdb
  user: app
  password: secret
schemas: [public, billing]
roots:
  - table: tenants
    where: "id IN (1,2)"
  - table: feature_flags
exclude_tables: [audit_log]
virtual_relations:
  - child_table: events
    child_column: meta
    parent_table: users
    parent_column: id
    type: json
    json_path: user_id
output: subset.sql
"#,
        );

        assert_eq!(cfg.connection.port, 5433);
        assert_eq!(cfg.schemas, vec!["public", "billing"]);
        assert_eq!(cfg.roots.len(), 2);
        assert_eq!(cfg.roots[0].where_clause.as_deref(), Some("id IN (1,2)"));
        assert!(cfg.roots[1].where_clause.is_none());
        assert_eq!(cfg.virtual_relations[0].kind, "json");
        assert_eq!(cfg.virtual_relations[0].json_path.as_deref(), Some("user_id"));
        assert!(cfg.exclude_set().contains("audit_log"));
    }

    #[test]
    fn validate_fills_defaults() {
        let mut cfg = parse(
            r#"
connection:
  host: localhost
  database: appdb
  user: app
"#,
        );
        cfg.validate().expect("should validate");

        assert_eq!(cfg.connection.port, 5432);
        assert_eq!(cfg.connection.sslmode, "disable");
        assert_eq!(cfg.schemas, vec!["public"]);
    }

    #[test]
    fn validate_rejects_missing_host() {
        let mut cfg = parse("connection:\n  database: appdb\n  user: app\n");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn extract_requires_roots() {
        let mut cfg = parse(
            "connection:\n  host: h\n  database: d\n  user: u\n",
        );
        cfg.validate().expect("should validate");
        assert!(cfg.validate_for_extract().is_err());

        cfg.roots.push(Root {
            table: "tenants".to_string(),
            where_clause: None,
        });
        assert!(cfg.validate_for_extract().is_ok());
    }

    #[test]
    fn connection_url_building() {
        let mut cfg = parse(
            "connection:\n  host: localhost\n  database: testdb\n  user: user\n  password: pass\n",
        );
        cfg.validate().expect("should validate");

        let url = cfg.connection.url();
        assert!(url.contains("localhost:5432"));
        assert!(url.contains("testdb"));
        assert!(url.contains("sslmode=disable"));
    }
}
