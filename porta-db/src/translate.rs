//! Statement translation: portability SQL → driver-dialect SQL.
//!
//! Translation is a pure function of the statement, the caller's
//! parameter names, and the driver descriptor (directive resolution is
//! deterministic per backend). The result is cached by the cursor keyed
//! on the raw statement text, so identical application SQL translates
//! once per cursor.

use smallvec::SmallVec;

use porta_core::errors::DbError;
use porta_core::value::Params;

use crate::dialect::{DialectContext, DriverDescriptor};
use crate::params::ParamConverter;
use crate::scan::{scan, Token};

/// Directive arguments as scanned: ordered `key=value` pairs.
pub type DirectiveArgs = SmallVec<[(String, String); 4]>;

/// A translated statement plus its bind converter.
#[derive(Debug, Clone)]
pub struct Translation {
    /// Driver-dialect SQL, fragments joined by single spaces.
    pub sql: String,
    /// Records which bind names the statement uses; reusable across
    /// executions with different values.
    pub converter: ParamConverter,
    /// False when a resolved directive is declared non-cacheable by the
    /// backend; such translations must not be stored.
    pub cacheable: bool,
}

/// Translate one portability statement for the given backend.
///
/// Every bind parameter must have a value in `params`; directives resolve
/// through the descriptor; anything after the statement terminator is an
/// error. All failures are `Programming` and occur before any SQL reaches
/// a driver.
pub fn translate(
    descriptor: &DriverDescriptor,
    ctx: &DialectContext,
    statement: &str,
    params: &Params,
) -> Result<Translation, DbError> {
    let mut out: Vec<String> = Vec::new();
    let mut converter = ParamConverter::new(descriptor.param_style());
    let mut cacheable = true;
    let mut open: Option<(String, DirectiveArgs)> = None;
    let mut done = false;

    for token in scan(statement)? {
        if done {
            return Err(DbError::programming(format!(
                "Token '{}' found after end of SQL statement.",
                describe(&token)
            )));
        }
        match token {
            Token::Text(text) => out.push(text),
            Token::Bind(name) => {
                if !params.contains_key(&name) {
                    return Err(DbError::programming(format!(
                        "Bind parameter :{name} has no value."
                    )));
                }
                out.push(converter.register(&name));
            }
            Token::DirectiveOpen(op) => {
                open = Some((op, DirectiveArgs::new()));
            }
            Token::DirectiveArg(key, value) => {
                match &mut open {
                    Some((_, args)) => args.push((key, value)),
                    // The scanner only emits args inside a directive.
                    None => unreachable!("directive argument outside portability item"),
                }
            }
            Token::DirectiveClose => {
                let (op, args) = open.take().expect("unbalanced portability item");
                if descriptor.is_non_cacheable(&op) {
                    cacheable = false;
                }
                out.extend(descriptor.resolve(&op, &args, ctx)?);
            }
            Token::Terminator => done = true,
        }
    }

    Ok(Translation {
        sql: out.join(" "),
        converter,
        cacheable,
    })
}

fn describe(token: &Token) -> String {
    match token {
        Token::Text(t) => t.clone(),
        Token::Bind(name) => format!(":{name}"),
        Token::DirectiveOpen(op) => format!("[:{op}"),
        Token::DirectiveArg(k, v) => format!("{k}={v}"),
        Token::DirectiveClose => "]".to_owned(),
        Token::Terminator => ";".to_owned(),
    }
}
