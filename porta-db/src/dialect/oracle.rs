//! Oracle-family dialect.

use porta_core::errors::{DbError, ErrorKind};

use crate::params::ParamStyle;

use super::{Dialect, DriverDescriptor, ErrorSignature, Fragments, SeqOp};

pub(crate) struct OracleDialect;

impl Dialect for OracleDialect {
    fn table(&self, schema: &str, name: &str) -> Fragments {
        vec![format!("{schema}.{name}")]
    }

    fn sequence(&self, schema: &str, name: &str, op: SeqOp) -> Result<Fragments, DbError> {
        Ok(match op {
            SeqOp::Next => vec![format!("{schema}.{name}.nextval")],
            SeqOp::Current => vec![format!("{schema}.{name}.currval")],
        })
    }

    fn sequence_start(&self, value: &str) -> Fragments {
        vec!["START".to_owned(), "WITH".to_owned(), value.to_owned()]
    }

    fn from_dual(&self) -> Fragments {
        vec!["FROM".to_owned(), "DUAL".to_owned()]
    }

    fn now(&self) -> Fragments {
        vec!["SYSDATE".to_owned()]
    }

    fn boolean(&self, default: Option<bool>) -> Fragments {
        let mut out = vec!["NUMBER(1)".to_owned()];
        if let Some(default) = default {
            out.push("DEFAULT".to_owned());
            out.push(if default { "1" } else { "0" }.to_owned());
        }
        out
    }
}

/// Vendor error number → canonical kind (codes as reported, without the
/// "ORA-" prefix or leading zeroes).
const ERROR_MAP: &[(ErrorSignature, ErrorKind)] = &[
    (ErrorSignature::Code("1"), ErrorKind::Integrity), // unique constraint
    (ErrorSignature::Code("1400"), ErrorKind::Integrity), // NOT NULL
    (ErrorSignature::Code("2290"), ErrorKind::Integrity), // check constraint
    (ErrorSignature::Code("2291"), ErrorKind::Integrity), // FK parent missing
    (ErrorSignature::Code("2292"), ErrorKind::Integrity), // child records exist
    (ErrorSignature::Code("900"), ErrorKind::Programming), // invalid SQL
    (ErrorSignature::Code("904"), ErrorKind::Programming), // invalid identifier
    (ErrorSignature::Code("942"), ErrorKind::Programming), // table or view missing
    (ErrorSignature::Code("1017"), ErrorKind::Operational), // bad credentials
    (ErrorSignature::Code("1034"), ErrorKind::Operational), // not available
    (ErrorSignature::Code("3113"), ErrorKind::Operational), // end-of-file on channel
    (ErrorSignature::Code("12541"), ErrorKind::Operational), // no listener
    (ErrorSignature::Code("1722"), ErrorKind::Data), // invalid number
    (ErrorSignature::Code("1858"), ErrorKind::Data), // bad date text
    (ErrorSignature::Code("600"), ErrorKind::Internal),
];

pub(crate) fn descriptor() -> DriverDescriptor {
    let mut desc = DriverDescriptor::new("oracle", ParamStyle::Named, Box::new(OracleDialect));
    desc.error_map = ERROR_MAP.to_vec();
    desc.table_locking = true;
    // The driver family refuses bind maps holding names the statement
    // never uses, so the cursor prunes to the registered set.
    desc.strict_bind_names = true;
    desc
}
