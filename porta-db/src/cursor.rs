//! Driver-independent cursor.
//!
//! A cursor owns one statement-translation cache keyed on the raw
//! portability SQL, so re-executing the same application statement with
//! different parameter values skips scanning entirely. All driver errors
//! are caught here, mapped through the descriptor's error table, and
//! re-raised as canonical kinds decorated with the SQL in flight;
//! nothing upstream needs backend-specific error handling.

use std::sync::Arc;

use tracing::debug;

use porta_core::cache::Cache;
use porta_core::errors::{DbError, DriverError, SqlContext};
use porta_core::value::Params;

use crate::database::ConnInner;
use crate::driver::DriverCursor;
use crate::params::BindArgs;
use crate::row::{QueryOne, Row, RowStream};
use crate::translate::{translate, Translation};

const DEFAULT_ARRAYSIZE: usize = 64;

pub struct Cursor {
    inner: Arc<ConnInner>,
    driver: Box<dyn DriverCursor>,
    sql_cache: Cache<String, Arc<Translation>>,
    columns: Option<Arc<[String]>>,
    rowcount: i64,
    arraysize: usize,
}

impl Cursor {
    pub(crate) fn new(inner: Arc<ConnInner>) -> Result<Self, DbError> {
        let driver = inner
            .driver
            .open_cursor()
            .map_err(|e| DbError::new(inner.descriptor.map_error(&e), e.message.clone()))?;
        Ok(Self {
            sql_cache: Cache::lru(inner.sql_cache_size),
            driver,
            columns: None,
            rowcount: -1,
            arraysize: DEFAULT_ARRAYSIZE,
            inner,
        })
    }

    /// Column names of the current result set, lower-cased; None after a
    /// statement that produced no rows (DDL, DML).
    pub fn description(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Rows returned by the last query, or affected by the last DML
    /// statement.
    pub fn rowcount(&self) -> i64 {
        self.rowcount
    }

    /// Fetch batch size used by `fetch_many` defaults and streaming.
    pub fn arraysize(&self) -> usize {
        self.arraysize
    }

    pub fn set_arraysize(&mut self, size: usize) {
        self.arraysize = size.max(1);
    }

    /// Translate (or fetch the cached translation), convert binds, and
    /// execute one statement.
    pub fn execute(&mut self, statement: &str, params: &Params) -> Result<(), DbError> {
        let descriptor = Arc::clone(&self.inner.descriptor);
        let rewrite = descriptor.rewrite_statement(statement);

        let key = statement.to_owned();
        let translation = match self.sql_cache.get(&key) {
            Ok(hit) => {
                debug!(statement, "translation cache hit");
                hit
            }
            Err(_) => {
                let fresh = Arc::new(translate(
                    &descriptor,
                    &self.inner.ctx,
                    &rewrite.statement,
                    params,
                )?);
                if fresh.cacheable {
                    self.sql_cache.set(key, Arc::clone(&fresh));
                }
                fresh
            }
        };

        let mut binds = translation.converter.convert(params)?;
        if descriptor.strict_bind_names {
            if let BindArgs::Named(pairs) = &mut binds {
                pairs.retain(|(name, _)| translation.converter.names().contains(name));
            }
        }

        self.columns = None;
        self.rowcount = -1;
        if translation.sql.trim().is_empty() {
            // A statement the dialect rewrote away entirely.
            return Ok(());
        }

        debug!(sql = %translation.sql, binds = binds.len(), "executing");
        self.driver
            .execute(&translation.sql, &binds)
            .map_err(|e| decorate(&descriptor, e, statement, &translation.sql, params, &binds))?;
        self.columns = self.driver.description().map(|names| {
            names
                .into_iter()
                .map(|n| n.to_lowercase())
                .collect::<Vec<_>>()
                .into()
        });
        self.rowcount = self.driver.rowcount();

        for post in &rewrite.post {
            self.driver
                .execute(post, &BindArgs::none())
                .map_err(|e| decorate(&descriptor, e, statement, post, params, &BindArgs::none()))?;
        }
        Ok(())
    }

    /// Execute once per parameter map. Statements producing a result set
    /// are undefined behaviour for batched execution and fail fast.
    pub fn execute_many(&mut self, statement: &str, param_sets: &[Params]) -> Result<(), DbError> {
        for params in param_sets {
            self.execute(statement, params)?;
            if self.columns.is_some() {
                return Err(DbError::programming("execute_many() produced result set."));
            }
        }
        Ok(())
    }

    /// Execute and fetch every row; None when the statement produced no
    /// result set.
    pub fn query(
        &mut self,
        statement: &str,
        params: &Params,
    ) -> Result<Option<Vec<Row>>, DbError> {
        self.execute(statement, params)?;
        if self.columns.is_none() {
            return Ok(None);
        }
        Ok(Some(self.fetch_all()?))
    }

    /// Execute on a fresh cursor bound to the same connection and return
    /// a lazy row stream. The dedicated cursor keeps iteration intact if
    /// this cursor is reused for another statement mid-stream.
    pub fn query_stream(
        &self,
        statement: &str,
        params: &Params,
    ) -> Result<Option<RowStream>, DbError> {
        let mut fresh = Cursor::new(Arc::clone(&self.inner))?;
        fresh.set_arraysize(self.arraysize);
        fresh.execute(statement, params)?;
        if fresh.columns.is_none() {
            return Ok(None);
        }
        Ok(Some(RowStream::new(fresh)))
    }

    /// Execute a query expected to yield exactly one row.
    ///
    /// Zero rows is `NotFound`, more than one is `TooManyRows`; a single
    /// one-column row collapses to its value.
    pub fn query_1(&mut self, statement: &str, params: &Params) -> Result<QueryOne, DbError> {
        let rows = self.query(statement, params)?.unwrap_or_default();
        match rows.len() {
            0 => Err(DbError::not_found(format!("no rows for {params:?}"))),
            1 => {
                let row = rows.into_iter().next().expect("length checked");
                if row.len() == 1 {
                    let value = row.into_values().pop().expect("length checked");
                    Ok(QueryOne::Scalar(value))
                } else {
                    Ok(QueryOne::Row(row))
                }
            }
            n => Err(DbError::too_many_rows(format!("{n} rows for {params:?}"))),
        }
    }

    pub fn fetch_one(&mut self) -> Result<Option<Row>, DbError> {
        let columns = self.result_columns()?;
        let row = self.driver.fetch_one().map_err(|e| self.driver_error(e))?;
        Ok(row.map(|values| Row::new(columns, values)))
    }

    pub fn fetch_many(&mut self, size: usize) -> Result<Vec<Row>, DbError> {
        let columns = self.result_columns()?;
        let rows = self.driver.fetch_many(size).map_err(|e| self.driver_error(e))?;
        Ok(rows
            .into_iter()
            .map(|values| Row::new(Arc::clone(&columns), values))
            .collect())
    }

    pub fn fetch_all(&mut self) -> Result<Vec<Row>, DbError> {
        let columns = self.result_columns()?;
        let rows = self.driver.fetch_all().map_err(|e| self.driver_error(e))?;
        Ok(rows
            .into_iter()
            .map(|values| Row::new(Arc::clone(&columns), values))
            .collect())
    }

    /// Dialect-correct no-op select verifying the connection is alive.
    pub fn ping(&mut self) -> Result<(), DbError> {
        self.execute("SELECT 1 AS alive [:from_dual]", &Params::default())
    }

    pub fn close(self) {}

    fn result_columns(&self) -> Result<Arc<[String]>, DbError> {
        self.columns
            .clone()
            .ok_or_else(|| DbError::programming("no result set to fetch from"))
    }

    fn driver_error(&self, err: DriverError) -> DbError {
        DbError::new(self.inner.descriptor.map_error(&err), err.message)
    }
}

/// Map a driver error to its canonical kind and attach the SQL in
/// flight for diagnostics.
fn decorate(
    descriptor: &crate::dialect::DriverDescriptor,
    err: DriverError,
    operation: &str,
    sql: &str,
    params: &Params,
    binds: &BindArgs,
) -> DbError {
    let kind = descriptor.map_error(&err);
    DbError::new(kind, err.message).with_context(SqlContext {
        operation: Some(operation.to_owned()),
        sql: Some(sql.to_owned()),
        parameters: Some(format!("{params:?}")),
        binds: Some(format!("{binds:?}")),
    })
}
