//! Canonical error taxonomy for the execution layer.
//!
//! Every failure surfaced above the driver boundary is a [`DbError`]
//! carrying an [`ErrorKind`]. Callers match on the kind; no code upstream
//! of the cursor ever needs to know which backend raised the original
//! error.

use std::fmt;

/// Backend-independent classification of a failure.
///
/// The first ten kinds mirror the classic DB-API hierarchy; `NotFound` and
/// `TooManyRows` are query-cardinality kinds produced by `query_1` (and by
/// cache lookups of absent keys).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Advisory condition, not an error.
    Warning,
    /// Root kind; anything not classified more precisely.
    Error,
    /// Problem in the interface layer rather than the database itself.
    Interface,
    /// Problem reported by the database.
    Database,
    /// Bad data: out-of-range value, division by zero, invalid date.
    Data,
    /// Operational trouble: lost connection, resource exhaustion.
    Operational,
    /// Relational integrity violated, e.g. a constraint check failed.
    Integrity,
    /// The database hit an internal error.
    Internal,
    /// Caller misuse: bad SQL, missing bind, unknown directive.
    Programming,
    /// The backend does not support the requested operation.
    NotSupported,
    /// A lookup that should have matched found nothing.
    NotFound,
    /// A query expected to yield one row yielded several.
    TooManyRows,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Interface => "interface error",
            Self::Database => "database error",
            Self::Data => "data error",
            Self::Operational => "operational error",
            Self::Integrity => "integrity error",
            Self::Internal => "internal error",
            Self::Programming => "programming error",
            Self::NotSupported => "not supported",
            Self::NotFound => "not found",
            Self::TooManyRows => "too many rows",
        };
        f.write_str(name)
    }
}

/// Diagnostic context attached to an error raised during execution.
///
/// All fields are pre-rendered display strings; the values are only ever
/// read by humans looking at logs.
#[derive(Debug, Clone, Default)]
pub struct SqlContext {
    /// The statement as the caller wrote it (portability syntax).
    pub operation: Option<String>,
    /// The translated, driver-dialect SQL.
    pub sql: Option<String>,
    /// The caller's bind parameter map.
    pub parameters: Option<String>,
    /// The driver-native bind values.
    pub binds: Option<String>,
}

impl SqlContext {
    fn is_empty(&self) -> bool {
        self.operation.is_none()
            && self.sql.is_none()
            && self.parameters.is_none()
            && self.binds.is_none()
    }
}

/// An error from the execution layer.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", self.render())]
pub struct DbError {
    kind: ErrorKind,
    message: String,
    context: Option<SqlContext>,
}

impl DbError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    pub fn interface(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Interface, message)
    }

    pub fn programming(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Programming, message)
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotSupported, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn too_many_rows(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TooManyRows, message)
    }

    /// Attach SQL diagnostic context, replacing any previous context.
    pub fn with_context(mut self, context: SqlContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> Option<&SqlContext> {
        self.context.as_ref()
    }

    /// Message followed by one `key=value` line per present context field.
    fn render(&self) -> String {
        let mut body = format!("{}: {}", self.kind, self.message);
        if let Some(ctx) = &self.context {
            if !ctx.is_empty() {
                for (name, value) in [
                    ("operation", &ctx.operation),
                    ("sql", &ctx.sql),
                    ("parameters", &ctx.parameters),
                    ("binds", &ctx.binds),
                ] {
                    if let Some(value) = value {
                        body.push_str(&format!("\n{name}={value}"));
                    }
                }
            }
        }
        body
    }
}

/// What a driver implementation reports when a native call fails.
///
/// `code` is whatever signature the backend uses to classify errors: an
/// SQLSTATE for PostgreSQL-family servers, a vendor error number for
/// Oracle-family ones, a primary result code name for SQLite. The driver
/// descriptor's error table maps it onto an [`ErrorKind`]; drivers never
/// pick kinds themselves.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct DriverError {
    pub code: Option<String>,
    pub message: String,
}

impl DriverError {
    pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_owned),
            message: message.into(),
        }
    }

    /// An error with no classifiable signature.
    pub fn plain(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context_lines() {
        let err = DbError::programming("Bind parameter :id has no value.").with_context(SqlContext {
            operation: Some("SELECT * FROM t WHERE id=:id".into()),
            sql: Some("SELECT * FROM t WHERE id= ?".into()),
            parameters: Some("{}".into()),
            binds: None,
        });
        let text = err.to_string();
        assert!(text.starts_with("programming error: Bind parameter :id has no value."));
        assert!(text.contains("\noperation=SELECT * FROM t WHERE id=:id"));
        assert!(text.contains("\nsql=SELECT * FROM t WHERE id= ?"));
        assert!(text.contains("\nparameters={}"));
        assert!(!text.contains("binds="));
    }

    #[test]
    fn kind_is_preserved() {
        assert_eq!(DbError::not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(DbError::too_many_rows("x").kind(), ErrorKind::TooManyRows);
    }
}
