//! PostgreSQL-family dialect.

use porta_core::errors::{DbError, ErrorKind};

use crate::params::ParamStyle;

use super::{Dialect, DriverDescriptor, ErrorSignature, Fragments, SeqOp};

pub(crate) struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn table(&self, _schema: &str, name: &str) -> Fragments {
        // The schema is carried in the connection's search path.
        vec![name.to_owned()]
    }

    fn sequence(&self, _schema: &str, name: &str, op: SeqOp) -> Result<Fragments, DbError> {
        Ok(match op {
            SeqOp::Next => vec![format!("nextval('{name}')")],
            SeqOp::Current => vec![format!("currval('{name}')")],
        })
    }

    fn sequence_start(&self, value: &str) -> Fragments {
        vec!["START".to_owned(), value.to_owned()]
    }

    fn from_dual(&self) -> Fragments {
        Vec::new()
    }

    fn now(&self) -> Fragments {
        vec!["NOW()".to_owned()]
    }

    fn boolean(&self, default: Option<bool>) -> Fragments {
        let mut out = vec!["BOOLEAN".to_owned()];
        if let Some(default) = default {
            out.push("DEFAULT".to_owned());
            out.push(if default { "TRUE" } else { "FALSE" }.to_owned());
        }
        out
    }
}

/// SQLSTATE class → canonical kind. Classes are the two leading
/// characters; more specific codes may be listed before their class.
const ERROR_MAP: &[(ErrorSignature, ErrorKind)] = &[
    (ErrorSignature::Class("01"), ErrorKind::Warning),
    (ErrorSignature::Class("08"), ErrorKind::Operational),
    (ErrorSignature::Class("0A"), ErrorKind::NotSupported),
    (ErrorSignature::Class("21"), ErrorKind::Programming),
    (ErrorSignature::Class("22"), ErrorKind::Data),
    (ErrorSignature::Class("23"), ErrorKind::Integrity),
    (ErrorSignature::Class("25"), ErrorKind::Internal),
    (ErrorSignature::Class("26"), ErrorKind::Programming),
    (ErrorSignature::Class("34"), ErrorKind::Operational),
    (ErrorSignature::Class("40"), ErrorKind::Operational),
    (ErrorSignature::Class("42"), ErrorKind::Programming),
    (ErrorSignature::Class("53"), ErrorKind::Operational),
    (ErrorSignature::Class("57"), ErrorKind::Operational),
    (ErrorSignature::Class("XX"), ErrorKind::Internal),
];

pub(crate) fn descriptor() -> DriverDescriptor {
    let mut desc = DriverDescriptor::new(
        "postgres",
        ParamStyle::Pyformat,
        Box::new(PostgresDialect),
    );
    desc.error_map = ERROR_MAP.to_vec();
    desc.table_locking = true;
    desc
}
