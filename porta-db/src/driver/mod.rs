//! The driver seam.
//!
//! Everything below this boundary speaks [`DriverError`]; everything above
//! speaks [`DbError`](porta_core::errors::DbError) with canonical kinds.
//! A backend plugs in by implementing the three traits and registering a
//! [`Driver`] factory under its backend name; the bundled SQLite driver
//! registers itself on first lookup.

pub mod sqlite;

use std::sync::{Arc, Mutex, OnceLock};

use rustc_hash::FxHashMap;
use tracing::info;

use porta_core::config::DbConfig;
use porta_core::errors::{DbError, DriverError};
use porta_core::value::Value;

use crate::params::BindArgs;

/// Factory for connections to one backend.
pub trait Driver: Send + Sync {
    fn backend(&self) -> &str;

    fn connect(&self, cfg: &DbConfig) -> Result<Box<dyn DriverConnection>, DriverError>;
}

/// One open connection. Commit and rollback are passthroughs; sequencing
/// them correctly is the caller's responsibility.
pub trait DriverConnection: Send + Sync {
    fn open_cursor(&self) -> Result<Box<dyn DriverCursor>, DriverError>;

    fn commit(&self) -> Result<(), DriverError>;

    fn rollback(&self) -> Result<(), DriverError>;

    fn close(&self) -> Result<(), DriverError>;
}

/// One driver cursor: execute a translated statement, then fetch.
///
/// `description` is Some exactly when the last statement produced a
/// result set, holding the column names as reported by the backend.
pub trait DriverCursor: Send {
    fn execute(&mut self, sql: &str, binds: &BindArgs) -> Result<(), DriverError>;

    fn description(&self) -> Option<Vec<String>>;

    fn rowcount(&self) -> i64;

    fn fetch_one(&mut self) -> Result<Option<Vec<Value>>, DriverError>;

    fn fetch_many(&mut self, size: usize) -> Result<Vec<Vec<Value>>, DriverError>;

    fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>, DriverError>;
}

// ─── Driver registry ────────────────────────────────────────────────────────

fn registry() -> &'static Mutex<FxHashMap<String, Arc<dyn Driver>>> {
    static REGISTRY: OnceLock<Mutex<FxHashMap<String, Arc<dyn Driver>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(FxHashMap::default()))
}

/// The driver registered for `backend`. The bundled SQLite driver is
/// installed on first use; other backends must have been registered by
/// the embedding application.
pub fn driver(backend: &str) -> Result<Arc<dyn Driver>, DbError> {
    let mut reg = registry().lock().expect("driver registry poisoned");
    if let Some(drv) = reg.get(backend) {
        return Ok(Arc::clone(drv));
    }
    if backend == "sqlite" {
        let drv: Arc<dyn Driver> = Arc::new(sqlite::SqliteDriver);
        reg.insert(backend.to_owned(), Arc::clone(&drv));
        return Ok(drv);
    }
    Err(DbError::interface(format!(
        "no driver registered for backend '{backend}'"
    )))
}

/// Register a driver under its backend name. Registering a name twice is
/// an error.
pub fn register_driver(drv: Arc<dyn Driver>) -> Result<(), DbError> {
    let mut reg = registry().lock().expect("driver registry poisoned");
    let backend = drv.backend().to_owned();
    if reg.contains_key(&backend) {
        return Err(DbError::interface(format!(
            "a driver for backend '{backend}' is already registered"
        )));
    }
    info!(backend = %backend, "registered database driver");
    reg.insert(backend, drv);
    Ok(())
}
