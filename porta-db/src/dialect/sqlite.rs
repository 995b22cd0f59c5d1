//! SQLite-family dialect.
//!
//! SQLite has no sequences, no DATE column affinity worth the name, and
//! only rudimentary ALTER TABLE. This dialect keeps portability SQL
//! running anyway: sequences are emulated with one-column counter tables,
//! and a lexical rewrite pass remaps the DDL constructs the backend
//! cannot digest. The backend exists for testing installations without a
//! network database.

use porta_core::errors::{DbError, ErrorKind};

use crate::params::ParamStyle;

use super::{Dialect, DriverDescriptor, ErrorSignature, Fragments, SeqOp, StatementRewrite};

pub(crate) struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn table(&self, _schema: &str, name: &str) -> Fragments {
        vec![name.to_owned()]
    }

    fn sequence(&self, _schema: &str, name: &str, op: SeqOp) -> Result<Fragments, DbError> {
        match op {
            // Incrementing a counter table cannot be expressed inside
            // another statement; callers go through Connection::nextval.
            SeqOp::Next => Err(DbError::not_supported(
                "sequence op=next is not expressible in SQL on sqlite; use nextval()",
            )),
            SeqOp::Current => Ok(vec![format!("(SELECT MAX(value) FROM {name})")]),
        }
    }

    fn sequence_start(&self, _value: &str) -> Fragments {
        // Consumed by the CREATE SEQUENCE rewrite; nothing to emit here.
        Vec::new()
    }

    fn from_dual(&self) -> Fragments {
        Vec::new()
    }

    fn now(&self) -> Fragments {
        vec!["CURRENT_TIMESTAMP".to_owned()]
    }

    fn boolean(&self, default: Option<bool>) -> Fragments {
        let mut out = vec!["INTEGER".to_owned()];
        if let Some(default) = default {
            out.push("DEFAULT".to_owned());
            out.push(if default { "1" } else { "0" }.to_owned());
        }
        out
    }

    fn rewrite(&self, statement: &str) -> StatementRewrite {
        if is_add_constraint(statement) {
            // Only two constraint forms exist on this backend; dropping
            // the statement beats failing half-way through a schema load.
            return StatementRewrite {
                statement: String::new(),
                post: Vec::new(),
            };
        }
        let (statement, post) = match rewrite_create_sequence(statement) {
            Some((rewritten, seed)) => (rewritten, vec![seed]),
            None => (statement.to_owned(), Vec::new()),
        };
        let statement = remap_date_columns(&statement);
        StatementRewrite { statement, post }
    }
}

const ERROR_MAP: &[(ErrorSignature, ErrorKind)] = &[
    (ErrorSignature::Code("constraint_violation"), ErrorKind::Integrity),
    (ErrorSignature::Code("database_busy"), ErrorKind::Operational),
    (ErrorSignature::Code("database_locked"), ErrorKind::Operational),
    (ErrorSignature::Code("read_only"), ErrorKind::Operational),
    (ErrorSignature::Code("not_a_database"), ErrorKind::Operational),
    (ErrorSignature::Code("api_misuse"), ErrorKind::Programming),
    (ErrorSignature::Code("database_corrupt"), ErrorKind::Internal),
    (ErrorSignature::Code("string_or_blob_too_big"), ErrorKind::Data),
];

pub(crate) fn descriptor() -> DriverDescriptor {
    let mut desc = DriverDescriptor::new("sqlite", ParamStyle::Qmark, Box::new(SqliteDialect));
    desc.error_map = ERROR_MAP.to_vec();
    desc.non_cacheable_ops = vec!["sequence".to_owned()];
    desc.emulated_sequences = true;
    desc
}

// ─── Lexical fixups ─────────────────────────────────────────────────────────

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Byte spans of identifier-character runs.
fn ident_spans(statement: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in statement.char_indices() {
        if is_ident_char(c) {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            spans.push((s, i));
        }
    }
    if let Some(s) = start {
        spans.push((s, statement.len()));
    }
    spans
}

fn word_at<'a>(statement: &'a str, span: (usize, usize)) -> &'a str {
    &statement[span.0..span.1]
}

/// Find `keywords` as consecutive identifier words (case-insensitive);
/// returns the index of the first matched span.
fn find_keyword_seq(statement: &str, spans: &[(usize, usize)], keywords: &[&str]) -> Option<usize> {
    if spans.len() < keywords.len() {
        return None;
    }
    (0..=spans.len() - keywords.len()).find(|&i| {
        keywords
            .iter()
            .enumerate()
            .all(|(j, kw)| word_at(statement, spans[i + j]).eq_ignore_ascii_case(kw))
    })
}

/// `ALTER TABLE <name> ADD CONSTRAINT ...` anywhere in the statement.
fn is_add_constraint(statement: &str) -> bool {
    let spans = ident_spans(statement);
    (0..spans.len()).any(|i| {
        spans.len() >= i + 5
            && word_at(statement, spans[i]).eq_ignore_ascii_case("alter")
            && word_at(statement, spans[i + 1]).eq_ignore_ascii_case("table")
            && word_at(statement, spans[i + 3]).eq_ignore_ascii_case("add")
            && word_at(statement, spans[i + 4]).eq_ignore_ascii_case("constraint")
    })
}

/// Rewrite `CREATE SEQUENCE s [:sequence_start value=N]` into a counter
/// table plus a seed insert. The table is seeded with N-1 (default 0) so
/// the first `nextval` yields N.
fn rewrite_create_sequence(statement: &str) -> Option<(String, String)> {
    let spans = ident_spans(statement);
    let i = find_keyword_seq(statement, &spans, &["create", "sequence"])?;
    let name_span = *spans.get(i + 2)?;
    let name = word_at(statement, name_span).to_owned();

    let mut rewritten = format!(
        "{}CREATE TABLE {} (value INTEGER NOT NULL PRIMARY KEY){}",
        &statement[..spans[i].0],
        name,
        &statement[name_span.1..],
    );

    let mut seed: i64 = 0;
    if let Some(dir_start) = rewritten.find("[:sequence_start") {
        if let Some(rel_end) = rewritten[dir_start..].find(']') {
            let dir_end = dir_start + rel_end + 1;
            let directive = &rewritten[dir_start..dir_end];
            if let Some(value) = directive
                .split_once("value=")
                .and_then(|(_, rest)| rest.trim_end_matches(']').trim().parse::<i64>().ok())
            {
                seed = value - 1;
            }
            rewritten.replace_range(dir_start..dir_end, "");
        }
    }

    let insert = format!("INSERT INTO {name} VALUES ({seed})");
    Some((rewritten, insert))
}

/// Remap DATE column types to TEXT inside CREATE TABLE statements; dates
/// are stored as ISO8601 text on this backend.
fn remap_date_columns(statement: &str) -> String {
    let spans = ident_spans(statement);
    if find_keyword_seq(statement, &spans, &["create", "table"]).is_none() {
        return statement.to_owned();
    }
    let mut out = String::with_capacity(statement.len());
    let mut last = 0;
    for span in &spans {
        if word_at(statement, *span).eq_ignore_ascii_case("date") {
            out.push_str(&statement[last..span.0]);
            out.push_str("TEXT");
            last = span.1;
        }
    }
    out.push_str(&statement[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_sequence_becomes_counter_table() {
        let dialect = SqliteDialect;
        let rw = dialect.rewrite("CREATE SEQUENCE person_id_seq");
        assert_eq!(
            rw.statement,
            "CREATE TABLE person_id_seq (value INTEGER NOT NULL PRIMARY KEY)"
        );
        assert_eq!(rw.post, vec!["INSERT INTO person_id_seq VALUES (0)"]);
    }

    #[test]
    fn sequence_start_sets_the_seed() {
        let dialect = SqliteDialect;
        let rw = dialect.rewrite("CREATE SEQUENCE s [:sequence_start value=1000]");
        assert!(!rw.statement.contains("sequence_start"));
        assert_eq!(rw.post, vec!["INSERT INTO s VALUES (999)"]);
    }

    #[test]
    fn date_columns_become_text() {
        let dialect = SqliteDialect;
        let rw = dialect.rewrite("CREATE TABLE t (born DATE, name CHAR(16), expire_date DATE)");
        assert_eq!(
            rw.statement,
            "CREATE TABLE t (born TEXT, name CHAR(16), expire_date TEXT)"
        );
    }

    #[test]
    fn add_constraint_is_dropped() {
        let dialect = SqliteDialect;
        let rw = dialect.rewrite("ALTER TABLE t ADD CONSTRAINT fk FOREIGN KEY (a) REFERENCES b");
        assert!(rw.statement.is_empty());
    }

    #[test]
    fn ordinary_statements_pass_through() {
        let dialect = SqliteDialect;
        let rw = dialect.rewrite("SELECT date FROM t");
        assert_eq!(rw.statement, "SELECT date FROM t");
        assert!(rw.post.is_empty());
    }
}
