//! Named connections and the transaction protocol.
//!
//! The registry is the single owner of every live connection in a run; it is
//! shared across workers behind its own mutex rather than living in global
//! state. `get_connection` is idempotent by name, and exactly one live
//! connection exists per name at any time.

use crate::adapter::{Adapter, Credentials, Cursor, DriverHandle};
use crate::error::{AdapterError, AdapterResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Name every node binds to unless its config says otherwise.
pub const MASTER_CONNECTION: &str = "master";

/// Lifecycle of a named connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, driver handshake not yet done
    Init,
    /// Driver handle is live
    Open,
    /// Explicitly closed
    Closed,
}

/// A named connection record.
#[derive(Clone)]
pub struct Connection {
    /// Registry key
    pub name: String,

    /// Owning adapter identity
    pub adapter_type: String,

    /// Lifecycle state
    pub state: ConnectionState,

    /// True only while a transaction scope is active on the handle
    pub transaction_open: bool,

    /// Opaque driver capability, present from `Open` onward
    pub handle: Option<Arc<dyn DriverHandle>>,
}

// The driver handle is opaque; only its presence is worth printing.
impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("adapter_type", &self.adapter_type)
            .field("state", &self.state)
            .field("transaction_open", &self.transaction_open)
            .field("handle", &self.handle.as_ref().map(|_| "<driver>"))
            .finish()
    }
}

impl Connection {
    fn live_handle(&self) -> AdapterResult<Arc<dyn DriverHandle>> {
        match (&self.handle, self.state) {
            (Some(handle), ConnectionState::Open) => Ok(Arc::clone(handle)),
            _ => Err(AdapterError::Programming(format!(
                "connection \"{}\" has no live handle",
                self.name
            ))),
        }
    }
}

/// Owner of all connections for a run.
pub struct ConnectionRegistry {
    adapter: Arc<dyn Adapter>,
    credentials: Credentials,
    connections: Mutex<HashMap<String, Connection>>,
}

impl ConnectionRegistry {
    /// Create a registry bound to one adapter and one set of credentials.
    pub fn new(adapter: Arc<dyn Adapter>, credentials: Credentials) -> Self {
        Self {
            adapter,
            credentials,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// The adapter this registry executes through.
    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    /// Default schema from the target credentials.
    pub fn default_schema(&self) -> &str {
        &self.credentials.schema
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Connection>> {
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the cached connection for `name`, acquiring it on first use.
    ///
    /// The registry lock is held across acquisition so concurrent callers
    /// can never race two live connections into existence for one name.
    pub fn get_connection(&self, name: Option<&str>) -> AdapterResult<Connection> {
        let name = name.unwrap_or(MASTER_CONNECTION);
        let mut connections = self.lock();

        if let Some(existing) = connections.get(name) {
            return Ok(existing.clone());
        }

        log::debug!(
            "Acquiring new {} connection \"{}\"",
            self.adapter.type_name(),
            name
        );
        let handle = self.adapter.open(&self.credentials, name)?;
        let connection = Connection {
            name: name.to_string(),
            adapter_type: self.adapter.type_name().to_string(),
            state: ConnectionState::Open,
            transaction_open: false,
            handle: Some(handle),
        };
        connections.insert(name.to_string(), connection.clone());
        Ok(connection)
    }

    /// Open a transaction scope on the named connection.
    pub fn begin(&self, name: &str) -> AdapterResult<Connection> {
        self.get_connection(Some(name))?;
        let mut connections = self.lock();
        let connection = canonical(&mut connections, name)?;

        if connection.transaction_open {
            return Err(AdapterError::Programming(format!(
                "Tried to begin a new transaction on connection \"{}\", but it already had one open!",
                name
            )));
        }

        log::debug!("On {}: BEGIN", name);
        connection.live_handle()?.execute("BEGIN")?;
        connection.transaction_open = true;
        Ok(connection.clone())
    }

    /// Commit the open transaction on the named connection.
    pub fn commit(&self, name: &str) -> AdapterResult<Connection> {
        let mut connections = self.lock();
        let connection = canonical(&mut connections, name)?;

        if !connection.transaction_open {
            return Err(AdapterError::Programming(format!(
                "Tried to commit transaction on connection \"{}\", but it does not have one open!",
                name
            )));
        }

        log::debug!("On {}: COMMIT", name);
        connection.live_handle()?.commit()?;
        connection.transaction_open = false;
        Ok(connection.clone())
    }

    /// Roll back the open transaction on the named connection.
    pub fn rollback(&self, name: &str) -> AdapterResult<Connection> {
        let mut connections = self.lock();
        let connection = canonical(&mut connections, name)?;

        if !connection.transaction_open {
            return Err(AdapterError::Programming(format!(
                "Tried to rollback transaction on connection \"{}\", but it does not have one open!",
                name
            )));
        }

        log::debug!("On {}: ROLLBACK", name);
        connection.live_handle()?.rollback()?;
        connection.transaction_open = false;
        Ok(connection.clone())
    }

    /// Close the named connection. The record stays cached so teardown can
    /// tell closed connections from leaked ones.
    pub fn close(&self, name: &str) -> AdapterResult<Connection> {
        let mut connections = self.lock();
        let connection = canonical(&mut connections, name)?;

        connection.live_handle()?.close()?;
        connection.state = ConnectionState::Closed;
        connection.transaction_open = false;
        Ok(connection.clone())
    }

    /// Execute one statement on the named connection, opening it if needed.
    ///
    /// Driver failures are normalized through the adapter into a uniform
    /// execution error carrying the SQL text and connection name.
    pub fn add_query(&self, name: Option<&str>, sql: &str) -> AdapterResult<Box<dyn Cursor>> {
        let connection = self.get_connection(name)?;
        let handle = connection.live_handle()?;

        log::debug!("On {}: {}", connection.name, sql);
        let started = Instant::now();

        let cursor = handle
            .execute(sql)
            .map_err(|e| self.adapter.map_execution_error(e, sql, &connection.name))?;

        log::debug!(
            "SQL status: {} in {:.2} seconds",
            cursor.status(),
            started.elapsed().as_secs_f64()
        );
        Ok(cursor)
    }

    /// Execute a batch of statements in order on one connection.
    pub fn execute_all(&self, name: Option<&str>, sqls: &[String]) -> AdapterResult<Connection> {
        let connection = self.get_connection(name)?;
        for sql in sqls {
            self.add_query(Some(&connection.name), sql)?;
        }
        Ok(connection)
    }

    /// Tear down the registry: roll back anything left in a transaction,
    /// close every connection still open, and clear the map.
    pub fn cleanup_connections(&self) {
        let mut connections = self.lock();

        for (name, connection) in connections.iter_mut() {
            if connection.transaction_open {
                log::warn!(
                    "Connection '{}' still had an open transaction; rolling back",
                    name
                );
                if let Ok(handle) = connection.live_handle() {
                    if let Err(e) = handle.rollback() {
                        log::warn!("Rollback on '{}' failed during teardown: {}", name, e);
                    }
                }
                connection.transaction_open = false;
            }

            if connection.state == ConnectionState::Closed {
                log::debug!("Connection '{}' was properly closed", name);
                continue;
            }

            log::debug!("Connection '{}' was left open; closing", name);
            if let Ok(handle) = connection.live_handle() {
                if let Err(e) = handle.close() {
                    log::warn!("Close on '{}' failed during teardown: {}", name, e);
                }
            }
            connection.state = ConnectionState::Closed;
        }

        connections.clear();
    }
}

/// The canonical registry entry for `name`. Callers mutate this entry
/// directly rather than a stale clone.
fn canonical<'a>(
    connections: &'a mut HashMap<String, Connection>,
    name: &str,
) -> AdapterResult<&'a mut Connection> {
    connections.get_mut(name).ok_or_else(|| {
        AdapterError::Programming(format!("connection \"{}\" is not in the registry", name))
    })
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
