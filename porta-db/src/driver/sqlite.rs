//! Bundled SQLite driver on rusqlite.
//!
//! The connection is shared behind a mutex so that streaming cursors can
//! bind to the same connection as their owner. A cursor materializes its
//! whole result set at execute time; SQLite steps lazily anyway, and
//! owning the rows keeps the cursor free of statement lifetimes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use porta_core::config::DbConfig;
use porta_core::errors::DriverError;
use porta_core::value::Value;

use crate::params::BindArgs;

use super::{Driver, DriverConnection, DriverCursor};

pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn backend(&self) -> &str {
        "sqlite"
    }

    fn connect(&self, cfg: &DbConfig) -> Result<Box<dyn DriverConnection>, DriverError> {
        let conn = match cfg.database.as_deref() {
            None | Some(":memory:") => Connection::open_in_memory(),
            Some(path) => Connection::open(path),
        }
        .map_err(driver_error)?;
        debug!(database = cfg.database.as_deref().unwrap_or(":memory:"), "sqlite connected");
        Ok(Box::new(SqliteConnection {
            conn: Arc::new(Mutex::new(conn)),
        }))
    }
}

pub struct SqliteConnection {
    conn: Arc<Mutex<Connection>>,
}

impl DriverConnection for SqliteConnection {
    fn open_cursor(&self) -> Result<Box<dyn DriverCursor>, DriverError> {
        Ok(Box::new(SqliteCursor {
            conn: Arc::clone(&self.conn),
            columns: None,
            rows: VecDeque::new(),
            rowcount: -1,
        }))
    }

    fn commit(&self) -> Result<(), DriverError> {
        let conn = self.conn.lock().expect("sqlite connection mutex poisoned");
        if conn.is_autocommit() {
            return Ok(());
        }
        conn.execute_batch("COMMIT").map_err(driver_error)
    }

    fn rollback(&self) -> Result<(), DriverError> {
        let conn = self.conn.lock().expect("sqlite connection mutex poisoned");
        if conn.is_autocommit() {
            return Ok(());
        }
        conn.execute_batch("ROLLBACK").map_err(driver_error)
    }

    fn close(&self) -> Result<(), DriverError> {
        // rusqlite closes on drop; cursors may still hold the connection.
        Ok(())
    }
}

struct SqliteCursor {
    conn: Arc<Mutex<Connection>>,
    columns: Option<Vec<String>>,
    rows: VecDeque<Vec<Value>>,
    rowcount: i64,
}

impl DriverCursor for SqliteCursor {
    fn execute(&mut self, sql: &str, binds: &BindArgs) -> Result<(), DriverError> {
        let values = match binds {
            BindArgs::Positional(values) => values,
            BindArgs::Named(_) => {
                return Err(DriverError::plain(
                    "sqlite driver expects positional (qmark) binds",
                ))
            }
        };
        let native: Vec<rusqlite::types::Value> =
            values.iter().map(to_native).collect::<Result<_, _>>()?;

        let conn = self.conn.lock().expect("sqlite connection mutex poisoned");
        let mut stmt = conn.prepare(sql).map_err(driver_error)?;

        self.columns = None;
        self.rows.clear();
        if stmt.column_count() > 0 {
            let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
            let mut rows = stmt
                .query(params_from_iter(native.into_iter()))
                .map_err(driver_error)?;
            let mut buffered = VecDeque::new();
            while let Some(row) = rows.next().map_err(driver_error)? {
                let mut values = Vec::with_capacity(columns.len());
                for i in 0..columns.len() {
                    values.push(from_native(row.get_ref(i).map_err(driver_error)?));
                }
                buffered.push_back(values);
            }
            self.rowcount = buffered.len() as i64;
            self.rows = buffered;
            self.columns = Some(columns);
        } else {
            let changed = stmt
                .execute(params_from_iter(native.into_iter()))
                .map_err(driver_error)?;
            self.rowcount = changed as i64;
        }
        Ok(())
    }

    fn description(&self) -> Option<Vec<String>> {
        self.columns.clone()
    }

    fn rowcount(&self) -> i64 {
        self.rowcount
    }

    fn fetch_one(&mut self) -> Result<Option<Vec<Value>>, DriverError> {
        Ok(self.rows.pop_front())
    }

    fn fetch_many(&mut self, size: usize) -> Result<Vec<Vec<Value>>, DriverError> {
        let take = size.min(self.rows.len());
        Ok(self.rows.drain(..take).collect())
    }

    fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>, DriverError> {
        Ok(self.rows.drain(..).collect())
    }
}

fn to_native(value: &Value) -> Result<rusqlite::types::Value, DriverError> {
    use rusqlite::types::Value as Native;
    Ok(match value {
        Value::Null => Native::Null,
        Value::Int(n) => Native::Integer(*n),
        Value::Float(x) => Native::Real(*x),
        Value::Text(s) => Native::Text(s.clone()),
        Value::Bytes(b) => Native::Blob(b.clone()),
        Value::Bool(b) => Native::Integer(i64::from(*b)),
        // Converters normalize these away; reaching here is a bug above
        // the seam.
        Value::Code(_) => {
            return Err(DriverError::plain("unnormalized code value reached the driver"))
        }
    })
}

fn from_native(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Int(n),
        ValueRef::Real(x) => Value::Float(x),
        ValueRef::Text(s) => Value::Text(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

/// Flatten a rusqlite error into the seam error, carrying the primary
/// result code as the classification signature.
fn driver_error(err: rusqlite::Error) -> DriverError {
    let code = match &err {
        rusqlite::Error::SqliteFailure(ffi, _) => Some(code_token(ffi.code)),
        _ => None,
    };
    DriverError::new(code, err.to_string())
}

fn code_token(code: rusqlite::ErrorCode) -> &'static str {
    use rusqlite::ErrorCode;
    match code {
        ErrorCode::ConstraintViolation => "constraint_violation",
        ErrorCode::DatabaseBusy => "database_busy",
        ErrorCode::DatabaseLocked => "database_locked",
        ErrorCode::ReadOnly => "read_only",
        ErrorCode::NotADatabase => "not_a_database",
        ErrorCode::ApiMisuse => "api_misuse",
        ErrorCode::DatabaseCorrupt => "database_corrupt",
        ErrorCode::TooBig => "string_or_blob_too_big",
        ErrorCode::TypeMismatch => "type_mismatch",
        ErrorCode::PermissionDenied => "permission_denied",
        ErrorCode::CannotOpen => "cannot_open",
        _ => "unknown",
    }
}
