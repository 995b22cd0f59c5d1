//! Scriptable mock driver shared by integration tests.
//!
//! Lets tests exercise paramstyle marshalling and error mapping for
//! backends without a live server: each execute pops the next scripted
//! response and records the SQL and binds the driver actually received.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use porta_core::config::DbConfig;
use porta_core::errors::DriverError;
use porta_core::value::Value;
use porta_db::params::BindArgs;
use porta_db::{Driver, DriverConnection, DriverCursor};

/// One scripted reply to an execute call.
#[derive(Clone)]
pub enum Reply {
    /// A result set.
    Rows {
        columns: Vec<&'static str>,
        rows: Vec<Vec<Value>>,
    },
    /// Statement completed without a result set.
    Done(i64),
    /// Fail with a native error signature.
    Fail {
        code: &'static str,
        message: &'static str,
    },
}

#[derive(Default)]
struct Shared {
    script: VecDeque<Reply>,
    log: Vec<(String, BindArgs)>,
}

pub struct MockDriver {
    backend: &'static str,
    shared: Arc<Mutex<Shared>>,
}

impl MockDriver {
    pub fn new(backend: &'static str) -> Arc<Self> {
        Arc::new(Self {
            backend,
            shared: Arc::new(Mutex::new(Shared::default())),
        })
    }

    /// Queue the reply for the next execute.
    pub fn push(&self, reply: Reply) {
        self.shared.lock().unwrap().script.push_back(reply);
    }

    /// Every (sql, binds) pair executed so far.
    pub fn executed(&self) -> Vec<(String, BindArgs)> {
        self.shared.lock().unwrap().log.clone()
    }
}

impl Driver for MockDriver {
    fn backend(&self) -> &str {
        self.backend
    }

    fn connect(&self, _cfg: &DbConfig) -> Result<Box<dyn DriverConnection>, DriverError> {
        Ok(Box::new(MockConnection {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MockConnection {
    shared: Arc<Mutex<Shared>>,
}

impl DriverConnection for MockConnection {
    fn open_cursor(&self) -> Result<Box<dyn DriverCursor>, DriverError> {
        Ok(Box::new(MockCursor {
            shared: Arc::clone(&self.shared),
            columns: None,
            rows: VecDeque::new(),
            rowcount: -1,
        }))
    }

    fn commit(&self) -> Result<(), DriverError> {
        Ok(())
    }

    fn rollback(&self) -> Result<(), DriverError> {
        Ok(())
    }

    fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

struct MockCursor {
    shared: Arc<Mutex<Shared>>,
    columns: Option<Vec<String>>,
    rows: VecDeque<Vec<Value>>,
    rowcount: i64,
}

impl DriverCursor for MockCursor {
    fn execute(&mut self, sql: &str, binds: &BindArgs) -> Result<(), DriverError> {
        let reply = {
            let mut shared = self.shared.lock().unwrap();
            shared.log.push((sql.to_owned(), binds.clone()));
            shared.script.pop_front().unwrap_or(Reply::Done(0))
        };
        self.columns = None;
        self.rows.clear();
        match reply {
            Reply::Rows { columns, rows } => {
                self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
                self.rowcount = rows.len() as i64;
                self.rows = rows.into();
                Ok(())
            }
            Reply::Done(count) => {
                self.rowcount = count;
                Ok(())
            }
            Reply::Fail { code, message } => Err(DriverError::new(Some(code), message)),
        }
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
