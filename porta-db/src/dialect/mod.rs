//! Per-backend driver descriptors.
//!
//! A [`DriverDescriptor`] bundles everything the layer needs to know about
//! one backend family: its bind paramstyle, a [`Dialect`] implementing the
//! portability directive hooks, a static native-error → [`ErrorKind`]
//! table, and a few capability flags. Descriptors are created lazily, one
//! immutable instance per backend name for the process lifetime, and
//! shared read-only across threads.

pub mod oracle;
pub mod postgres;
pub mod sqlite;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock};

use rustc_hash::FxHashMap;
use tracing::info;

use porta_core::config::DbConfig;
use porta_core::errors::{DbError, DriverError, ErrorKind};

use crate::params::ParamStyle;

/// SQL fragments a directive hook splices into the output stream.
pub type Fragments = Vec<String>;

/// Sequence access direction in a `[:sequence ... op=...]` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqOp {
    Next,
    Current,
}

/// Per-installation tables some directives consult; effectively constant
/// for the lifetime of a connection.
#[derive(Debug, Clone, Default)]
pub struct DialectContext {
    pub config: BTreeMap<String, String>,
    pub constants: BTreeMap<String, i64>,
}

impl DialectContext {
    pub fn from_config(cfg: &DbConfig) -> Self {
        Self {
            config: cfg.config.clone(),
            constants: cfg.constants.clone(),
        }
    }
}

/// A statement rewritten before translation, plus follow-up statements to
/// run after it. Backends without lexical quirks pass statements through.
pub struct StatementRewrite {
    pub statement: String,
    pub post: Vec<String>,
}

impl StatementRewrite {
    pub fn passthrough(statement: &str) -> Self {
        Self {
            statement: statement.to_owned(),
            post: Vec::new(),
        }
    }
}

/// Directive hooks for one SQL dialect. One typed method per portability
/// op; the descriptor's [`resolve`](DriverDescriptor::resolve) parses and
/// validates arguments before dispatching here.
pub trait Dialect: Send + Sync {
    fn table(&self, schema: &str, name: &str) -> Fragments;

    fn sequence(&self, schema: &str, name: &str, op: SeqOp) -> Result<Fragments, DbError>;

    fn sequence_start(&self, value: &str) -> Fragments;

    fn from_dual(&self) -> Fragments;

    fn now(&self) -> Fragments;

    /// Boolean column DDL type, with an optional DEFAULT clause.
    fn boolean(&self, default: Option<bool>) -> Fragments;

    /// Lexical statement fixups applied before translation.
    fn rewrite(&self, statement: &str) -> StatementRewrite {
        StatementRewrite::passthrough(statement)
    }
}

/// How one entry of the error table matches a driver-reported code.
#[derive(Debug, Clone, Copy)]
pub enum ErrorSignature {
    /// Prefix match: SQLSTATE classes like "23".
    Class(&'static str),
    /// Exact match: vendor error numbers and result-code names.
    Code(&'static str),
}

/// Everything the execution layer knows about one backend.
pub struct DriverDescriptor {
    pub name: String,
    param_style: ParamStyle,
    dialect: Box<dyn Dialect>,
    /// Native error signature to canonical kind; first match wins.
    pub error_map: Vec<(ErrorSignature, ErrorKind)>,
    /// Directive ops whose translations must never be cached on this
    /// backend.
    pub non_cacheable_ops: Vec<String>,
    /// Backend supports `LOCK TABLE ... IN ... MODE`.
    pub table_locking: bool,
    /// Backend rejects unused names in a named bind map; the cursor must
    /// prune to the registered set.
    pub strict_bind_names: bool,
    /// Sequences are emulated with counter tables rather than native
    /// sequence objects.
    pub emulated_sequences: bool,
}

impl DriverDescriptor {
    pub fn new(name: impl Into<String>, param_style: ParamStyle, dialect: Box<dyn Dialect>) -> Self {
        Self {
            name: name.into(),
            param_style,
            dialect,
            error_map: Vec::new(),
            non_cacheable_ops: Vec::new(),
            table_locking: false,
            strict_bind_names: false,
            emulated_sequences: false,
        }
    }

    pub fn param_style(&self) -> ParamStyle {
        self.param_style
    }

    pub fn is_non_cacheable(&self, op: &str) -> bool {
        self.non_cacheable_ops.iter().any(|o| o == op)
    }

    pub fn rewrite_statement(&self, statement: &str) -> StatementRewrite {
        self.dialect.rewrite(statement)
    }

    /// Classify a driver-native error. Unmapped signatures fall back to
    /// the generic `Database` kind.
    pub fn map_error(&self, err: &DriverError) -> ErrorKind {
        if let Some(code) = &err.code {
            for (signature, kind) in &self.error_map {
                let hit = match signature {
                    ErrorSignature::Class(prefix) => code.starts_with(prefix),
                    ErrorSignature::Code(exact) => code == exact,
                };
                if hit {
                    return *kind;
                }
            }
        }
        ErrorKind::Database
    }

    /// Resolve one portability directive to SQL fragments.
    ///
    /// Duplicate argument keys, missing or unexpected arguments, and
    /// unknown ops are all `Programming` errors.
    pub fn resolve(
        &self,
        op: &str,
        args: &[(String, String)],
        ctx: &DialectContext,
    ) -> Result<Fragments, DbError> {
        let mut map: FxHashMap<&str, &str> = FxHashMap::default();
        for (key, value) in args {
            if map.insert(key.as_str(), value.as_str()).is_some() {
                return Err(DbError::programming(format!(
                    "Keyword argument '{key}' used multiple times in '{op}' op."
                )));
            }
        }

        let fragments = match op {
            "table" => {
                let schema = require(&mut map, op, "schema")?;
                let name = require(&mut map, op, "name")?;
                self.dialect.table(schema, name)
            }
            "sequence" => {
                let schema = require(&mut map, op, "schema")?;
                let name = require(&mut map, op, "name")?;
                let seq_op = match require(&mut map, op, "op")? {
                    "next" => SeqOp::Next,
                    "current" => SeqOp::Current,
                    other => {
                        return Err(DbError::programming(format!(
                            "Invalid sequence operation: {other}"
                        )))
                    }
                };
                self.dialect.sequence(schema, name, seq_op)?
            }
            "sequence_start" => {
                let value = require(&mut map, op, "value")?;
                self.dialect.sequence_start(value)
            }
            "from_dual" => self.dialect.from_dual(),
            "now" => self.dialect.now(),
            "boolean" => {
                let default = match map.remove("default") {
                    None => None,
                    Some("true") => Some(true),
                    Some("false") => Some(false),
                    Some(other) => {
                        return Err(DbError::programming(format!(
                            "Invalid boolean default: {other}"
                        )))
                    }
                };
                self.dialect.boolean(default)
            }
            "get_config" => {
                let var = require(&mut map, op, "var")?;
                match ctx.config.get(var) {
                    Some(value) => vec![format!("'{}'", value.replace('\'', "''"))],
                    None => {
                        return Err(DbError::programming(format!(
                            "No config value for '{var}'"
                        )))
                    }
                }
            }
            "get_constant" => {
                let name = require(&mut map, op, "name")?;
                match ctx.constants.get(name) {
                    Some(value) => vec![format!("{value}")],
                    None => {
                        return Err(DbError::programming(format!(
                            "No constant named '{name}'"
                        )))
                    }
                }
            }
            _ => {
                return Err(DbError::programming(format!(
                    "Unknown portability op '{op}'"
                )))
            }
        };

        if let Some(stray) = map.keys().next() {
            return Err(DbError::programming(format!(
                "Unexpected argument '{stray}' in '{op}' op."
            )));
        }
        Ok(fragments)
    }
}

fn require<'a>(
    map: &mut FxHashMap<&str, &'a str>,
    op: &str,
    key: &str,
) -> Result<&'a str, DbError> {
    map.remove(key).ok_or_else(|| {
        DbError::programming(format!("Missing argument '{key}' in '{op}' op."))
    })
}

// ─── Descriptor registry ────────────────────────────────────────────────────

fn registry() -> &'static Mutex<FxHashMap<String, Arc<DriverDescriptor>>> {
    static REGISTRY: OnceLock<Mutex<FxHashMap<String, Arc<DriverDescriptor>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(FxHashMap::default()))
}

/// The descriptor for `name`, building built-in backends on first use.
pub fn descriptor(name: &str) -> Result<Arc<DriverDescriptor>, DbError> {
    let mut reg = registry().lock().expect("descriptor registry poisoned");
    if let Some(desc) = reg.get(name) {
        return Ok(Arc::clone(desc));
    }
    let built = match name {
        "postgres" => postgres::descriptor(),
        "oracle" => oracle::descriptor(),
        "sqlite" => sqlite::descriptor(),
        other => {
            return Err(DbError::interface(format!(
                "unknown database backend '{other}'"
            )))
        }
    };
    info!(backend = name, "initialized driver descriptor");
    let desc = Arc::new(built);
    reg.insert(name.to_owned(), Arc::clone(&desc));
    Ok(desc)
}

/// Register an out-of-tree backend descriptor. Registering a name twice is
/// an error; descriptors are immutable once published.
pub fn register_descriptor(desc: DriverDescriptor) -> Result<(), DbError> {
    let mut reg = registry().lock().expect("descriptor registry poisoned");
    let name = desc.name.clone();
    if reg.contains_key(&name) {
        return Err(DbError::interface(format!(
            "backend '{name}' is already registered"
        )));
    }
    info!(backend = %name, "registered driver descriptor");
    reg.insert(name, Arc::new(desc));
    Ok(())
}
