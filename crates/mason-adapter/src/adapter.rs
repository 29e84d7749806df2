//! The dialect contract every warehouse family implements.

use crate::error::{AdapterError, AdapterResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Target credentials, minus the transport details the driver consumes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    /// Default schema for unqualified relations
    #[serde(default)]
    pub schema: String,

    /// Driver-specific settings (host, port, database, ...)
    #[serde(flatten, default)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// A result cursor for one executed statement.
pub trait Cursor: Send {
    /// All result rows, as loosely-typed values.
    fn fetchall(&mut self) -> AdapterResult<Vec<Vec<serde_json::Value>>>;

    /// Driver status line for the statement (e.g. `CREATE TABLE`, `SELECT 3`).
    fn status(&self) -> String;
}

impl fmt::Debug for dyn Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("status", &self.status())
            .finish()
    }
}

/// The opaque driver capability behind an open connection.
pub trait DriverHandle: Send + Sync {
    /// Execute one statement and return its cursor.
    fn execute(&self, sql: &str) -> AdapterResult<Box<dyn Cursor>>;

    /// Commit the open transaction.
    fn commit(&self) -> AdapterResult<()>;

    /// Roll back the open transaction.
    fn rollback(&self) -> AdapterResult<()>;

    /// Close the connection.
    fn close(&self) -> AdapterResult<()>;
}

/// Dialect contract for one warehouse family.
///
/// Everything the protocol layer needs that varies per dialect lives here.
/// Default methods fail with `NotImplemented` so a partial adapter fails
/// loudly at first use rather than producing wrong SQL.
pub trait Adapter: Send + Sync {
    /// Adapter identity, used in logs and connection records.
    fn type_name(&self) -> &'static str;

    /// Open a driver handle for the named connection.
    fn open(&self, credentials: &Credentials, name: &str) -> AdapterResult<Arc<dyn DriverHandle>>;

    /// Dialect's current-date function.
    fn date_function(&self) -> AdapterResult<String> {
        Err(AdapterError::NotImplemented {
            function: "date_function",
        })
    }

    /// Distribution clause for CREATE TABLE, from a config spec.
    fn dist_qualifier(&self, _spec: Option<&str>) -> AdapterResult<String> {
        Err(AdapterError::NotImplemented {
            function: "dist_qualifier",
        })
    }

    /// Sort clause for CREATE TABLE, from a config spec.
    fn sort_qualifier(&self, _kind: &str, _spec: Option<&str>) -> AdapterResult<String> {
        Err(AdapterError::NotImplemented {
            function: "sort_qualifier",
        })
    }

    /// Query returning `(table_name, kind)` rows for one schema, where kind
    /// is `'table'` or `'view'`.
    fn query_for_existing_sql(&self, schema: &str) -> String {
        format!(
            "select table_name,\n  case when table_type = 'VIEW' then 'view' else 'table' end as kind\nfrom information_schema.tables\nwhere table_schema = '{}'",
            schema
        )
    }

    /// ALTER statement widening one column to a new type.
    fn alter_column_type_sql(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        new_type: &str,
    ) -> String {
        format!(
            "alter table \"{}\".\"{}\" alter column \"{}\" type {}",
            schema, table, column, new_type
        )
    }

    /// Normalize a driver failure into a uniform execution error carrying
    /// the SQL text and connection name.
    fn map_execution_error(
        &self,
        err: AdapterError,
        sql: &str,
        connection: &str,
    ) -> AdapterError {
        match err {
            already @ AdapterError::Execution { .. } => already,
            other => AdapterError::Execution {
                connection: connection.to_string(),
                sql: sql.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Neutral ANSI dialect: empty qualifiers, standard information-schema
/// introspection, and no transport of its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnsiAdapter;

impl Adapter for AnsiAdapter {
    fn type_name(&self) -> &'static str {
        "ansi"
    }

    fn open(&self, _credentials: &Credentials, name: &str) -> AdapterResult<Arc<dyn DriverHandle>> {
        Err(AdapterError::Connection(format!(
            "no driver transport is configured for the ansi adapter (connection \"{}\")",
            name
        )))
    }

    fn date_function(&self) -> AdapterResult<String> {
        Ok("current_timestamp".to_string())
    }

    fn dist_qualifier(&self, _spec: Option<&str>) -> AdapterResult<String> {
        Ok(String::new())
    }

    fn sort_qualifier(&self, _kind: &str, _spec: Option<&str>) -> AdapterResult<String> {
        Ok(String::new())
    }
}
