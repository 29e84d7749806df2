//! Recording driver used by the protocol tests in this crate.

use crate::adapter::{Adapter, Credentials, Cursor, DriverHandle};
use crate::connection::ConnectionRegistry;
use crate::error::{AdapterError, AdapterResult};
use std::sync::{Arc, Mutex};

pub(crate) type Rows = Vec<Vec<serde_json::Value>>;

/// Everything the fake driver observed.
#[derive(Default)]
pub(crate) struct DriverLog {
    /// `(connection name, sql)` in execution order
    pub executed: Vec<(String, String)>,
    pub opens: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub closes: usize,
}

/// Adapter whose handles record into a shared log and answer canned rows.
pub(crate) struct RecordingAdapter {
    pub log: Arc<Mutex<DriverLog>>,
    canned: Vec<(String, Rows)>,
    fail_on: Option<String>,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(DriverLog::default())),
            canned: Vec::new(),
            fail_on: None,
        }
    }

    /// Answer `rows` for any statement containing `needle`.
    pub fn with_rows(mut self, needle: &str, rows: Rows) -> Self {
        self.canned.push((needle.to_string(), rows));
        self
    }

    /// Fail any statement containing `needle` with a driver error.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    pub fn registry(self) -> (ConnectionRegistry, Arc<Mutex<DriverLog>>) {
        let log = Arc::clone(&self.log);
        (
            ConnectionRegistry::new(Arc::new(self), Credentials::default()),
            log,
        )
    }
}

impl Adapter for RecordingAdapter {
    fn type_name(&self) -> &'static str {
        "recording"
    }

    fn open(&self, _credentials: &Credentials, name: &str) -> AdapterResult<Arc<dyn DriverHandle>> {
        self.log
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .opens += 1;
        Ok(Arc::new(RecordingHandle {
            name: name.to_string(),
            log: Arc::clone(&self.log),
            canned: self.canned.clone(),
            fail_on: self.fail_on.clone(),
        }))
    }

    fn dist_qualifier(&self, spec: Option<&str>) -> AdapterResult<String> {
        Ok(spec.map(|s| format!("diststyle {}", s)).unwrap_or_default())
    }

    fn sort_qualifier(&self, kind: &str, spec: Option<&str>) -> AdapterResult<String> {
        Ok(spec
            .map(|s| format!("{} sortkey({})", kind, s))
            .unwrap_or_default())
    }
}

pub(crate) struct RecordingHandle {
    name: String,
    log: Arc<Mutex<DriverLog>>,
    canned: Vec<(String, Rows)>,
    fail_on: Option<String>,
}

impl DriverHandle for RecordingHandle {
    fn execute(&self, sql: &str) -> AdapterResult<Box<dyn Cursor>> {
        if let Some(needle) = &self.fail_on {
            if sql.contains(needle.as_str()) {
                return Err(AdapterError::Connection(
                    "simulated driver failure".to_string(),
                ));
            }
        }

        self.log
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .executed
            .push((self.name.clone(), sql.to_string()));

        let rows = self
            .canned
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default();
        let status = sql
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();

        Ok(Box::new(RecordingCursor { rows, status }))
    }

    fn commit(&self) -> AdapterResult<()> {
        self.log.lock().unwrap_or_else(|p| p.into_inner()).commits += 1;
        Ok(())
    }

    fn rollback(&self) -> AdapterResult<()> {
        self.log
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .rollbacks += 1;
        Ok(())
    }

    fn close(&self) -> AdapterResult<()> {
        self.log.lock().unwrap_or_else(|p| p.into_inner()).closes += 1;
        Ok(())
    }
}

pub(crate) struct RecordingCursor {
    rows: Rows,
    status: String,
}

impl Cursor for RecordingCursor {
    fn fetchall(&mut self) -> AdapterResult<Rows> {
        Ok(std::mem::take(&mut self.rows))
    }

    fn status(&self) -> String {
        self.status.clone()
    }
}
