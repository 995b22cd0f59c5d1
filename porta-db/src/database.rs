//! Connections and the backend factory.

use std::sync::Arc;

use tracing::{debug, info};

use porta_core::config::DbConfig;
use porta_core::errors::{DbError, ErrorKind};
use porta_core::value::{Params, Value};

use crate::cursor::Cursor;
use crate::dialect::{self, DialectContext, DriverDescriptor};
use crate::driver::{self, Driver, DriverConnection};
use crate::row::{QueryOne, Row, RowStream};

/// Connection state shared between a connection and its cursors.
pub(crate) struct ConnInner {
    pub(crate) descriptor: Arc<DriverDescriptor>,
    pub(crate) ctx: DialectContext,
    pub(crate) driver: Box<dyn DriverConnection>,
    pub(crate) sql_cache_size: usize,
    pub(crate) schema: String,
}

/// Open a connection to the backend named in the config.
///
/// The factory resolves the driver descriptor and the registered driver
/// by backend name; business code passes portability SQL and parameter
/// maps to the result and never sees backend specifics.
pub fn connect(cfg: &DbConfig) -> Result<Connection, DbError> {
    Connection::connect(cfg)
}

/// A database connection wrapping one driver connection, with a default
/// cursor for one-shot statement convenience.
pub struct Connection {
    inner: Arc<ConnInner>,
    default: Cursor,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("schema", &self.inner.schema)
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub fn connect(cfg: &DbConfig) -> Result<Self, DbError> {
        let drv = driver::driver(&cfg.backend)?;
        Self::connect_with(cfg, drv)
    }

    /// Connect through an explicitly supplied driver, bypassing the
    /// driver registry. The descriptor is still resolved by backend name.
    pub fn connect_with(cfg: &DbConfig, drv: Arc<dyn Driver>) -> Result<Self, DbError> {
        let descriptor = dialect::descriptor(&cfg.backend)?;

        let mut cfg = cfg.clone();
        cfg.password = cfg.resolve_password()?;

        let conn = drv
            .connect(&cfg)
            .map_err(|e| DbError::new(descriptor.map_error(&e), e.message.clone()))?;
        info!(backend = %cfg.backend, "database connection established");

        let inner = Arc::new(ConnInner {
            ctx: DialectContext::from_config(&cfg),
            driver: conn,
            sql_cache_size: cfg.effective_sql_cache_size(),
            schema: cfg.effective_schema().to_owned(),
            descriptor,
        });
        let default = Cursor::new(Arc::clone(&inner))?;
        Ok(Self { inner, default })
    }

    /// A fresh cursor on this connection.
    pub fn cursor(&self) -> Result<Cursor, DbError> {
        Cursor::new(Arc::clone(&self.inner))
    }

    pub fn descriptor(&self) -> &DriverDescriptor {
        &self.inner.descriptor
    }

    pub fn commit(&self) -> Result<(), DbError> {
        self.inner
            .driver
            .commit()
            .map_err(|e| DbError::new(self.inner.descriptor.map_error(&e), e.message))
    }

    pub fn rollback(&self) -> Result<(), DbError> {
        self.inner
            .driver
            .rollback()
            .map_err(|e| DbError::new(self.inner.descriptor.map_error(&e), e.message))
    }

    pub fn close(self) -> Result<(), DbError> {
        self.inner
            .driver
            .close()
            .map_err(|e| DbError::new(self.inner.descriptor.map_error(&e), e.message))
    }

    // ── default-cursor conveniences ──

    pub fn execute(&mut self, statement: &str, params: &Params) -> Result<(), DbError> {
        self.default.execute(statement, params)
    }

    pub fn query(
        &mut self,
        statement: &str,
        params: &Params,
    ) -> Result<Option<Vec<Row>>, DbError> {
        self.default.query(statement, params)
    }

    pub fn query_stream(
        &self,
        statement: &str,
        params: &Params,
    ) -> Result<Option<RowStream>, DbError> {
        self.default.query_stream(statement, params)
    }

    pub fn query_1(&mut self, statement: &str, params: &Params) -> Result<QueryOne, DbError> {
        self.default.query_1(statement, params)
    }

    /// Verify database round trips on a throwaway cursor.
    pub fn ping(&self) -> Result<(), DbError> {
        let mut cursor = self.cursor()?;
        cursor.ping()
    }

    // ── sequences ──

    /// Draw the next value from a sequence.
    pub fn nextval(&mut self, name: &str) -> Result<i64, DbError> {
        if self.inner.descriptor.emulated_sequences {
            self.execute(
                &format!("INSERT INTO {name} VALUES (1 + (SELECT MAX(value) FROM {name}))"),
                &Params::default(),
            )?;
            return self.currval(name);
        }
        let schema = self.inner.schema.clone();
        let statement =
            format!("SELECT [:sequence schema={schema} name={name} op=next] [:from_dual]");
        sequence_value(self.query_1(&statement, &Params::default())?)
    }

    /// The current value of a sequence in this session.
    pub fn currval(&mut self, name: &str) -> Result<i64, DbError> {
        if self.inner.descriptor.emulated_sequences {
            let statement = format!("SELECT MAX(value) AS value FROM {name}");
            return sequence_value(self.query_1(&statement, &Params::default())?);
        }
        let schema = self.inner.schema.clone();
        let statement =
            format!("SELECT [:sequence schema={schema} name={name} op=current] [:from_dual]");
        sequence_value(self.query_1(&statement, &Params::default())?)
    }

    // ── table locking ──

    /// `LOCK TABLE name IN mode MODE` on backends that support it; the
    /// lock is released by the next commit or rollback. A no-op
    /// elsewhere.
    pub fn lock_table(&mut self, table: &str, mode: &str) -> Result<(), DbError> {
        if !self.inner.descriptor.table_locking {
            debug!(table, "table locking unsupported on this backend; ignored");
            return Ok(());
        }
        self.execute(
            &format!("LOCK TABLE {table} IN {mode} MODE"),
            &Params::default(),
        )
    }
}

fn sequence_value(result: QueryOne) -> Result<i64, DbError> {
    match result {
        QueryOne::Scalar(value) => value.as_i64().ok_or_else(|| {
            DbError::new(ErrorKind::Data, "sequence produced a non-integer value")
        }),
        QueryOne::Row(_) => Err(DbError::programming(
            "sequence query returned more than one column",
        )),
    }
}

/// Build an SQL comparison for a wildcard pattern.
///
/// Returns the expression text and the value to bind under `ref_name`
/// (defaulting to the column name without any table prefix). A None
/// pattern tests for NULL and binds nothing. `*` and `?` in the pattern
/// become `%` and `_`; unless case sensitivity is forced, a pattern
/// containing upper-case letters compares case-sensitively.
pub fn sql_pattern(
    column: &str,
    pattern: Option<&str>,
    ref_name: Option<&str>,
    case_sensitive: Option<bool>,
) -> (String, Option<Value>) {
    let Some(pattern) = pattern else {
        return (format!("{column} IS NULL"), None);
    };
    let ref_name = ref_name
        .unwrap_or_else(|| column.rsplit('.').next().unwrap_or(column))
        .to_owned();
    let case_sensitive = case_sensitive.unwrap_or_else(|| pattern.to_lowercase() != pattern);
    let (column_expr, pattern) = if case_sensitive {
        (column.to_owned(), pattern.to_owned())
    } else {
        (format!("LOWER({column})"), pattern.to_lowercase())
    };
    let value = pattern.replace('*', "%").replace('?', "_");
    let operand = if !case_sensitive || value.contains('%') || value.contains('_') {
        "LIKE"
    } else {
        "="
    };
    (
        format!("{column_expr} {operand} :{ref_name}"),
        Some(Value::Text(value)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_pattern_null_test() {
        let (expr, value) = sql_pattern("p.name", None, None, None);
        assert_eq!(expr, "p.name IS NULL");
        assert!(value.is_none());
    }

    #[test]
    fn sql_pattern_wildcards_and_case() {
        let (expr, value) = sql_pattern("account_name", Some("bo*"), None, None);
        assert_eq!(expr, "LOWER(account_name) LIKE :account_name");
        assert_eq!(value, Some(Value::Text("bo%".into())));

        let (expr, value) = sql_pattern("a.name", Some("Bootsie"), None, None);
        assert_eq!(expr, "a.name = :name");
        assert_eq!(value, Some(Value::Text("Bootsie".into())));

        let (expr, _) = sql_pattern("a.name", Some("Bo?tsie"), None, None);
        assert_eq!(expr, "a.name LIKE :name");
    }

    #[test]
    fn sql_pattern_explicit_ref_name() {
        let (expr, _) = sql_pattern("t.col", Some("X*"), Some("pat"), Some(true));
        assert_eq!(expr, "t.col LIKE :pat");
    }
}
