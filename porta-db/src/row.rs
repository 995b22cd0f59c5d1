//! Result rows.

use std::ops::Index;
use std::sync::Arc;

use porta_core::errors::DbError;
use porta_core::value::Value;

/// One result-set record: ordered values with case-normalized column
/// names. The column list is shared across all rows of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Value of the named column (names are lower-case).
    pub fn get(&self, name: &str) -> Option<&Value> {
        let i = self.columns.iter().position(|c| c == name)?;
        self.values.get(i)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

/// What `query_1` yields: the lone column value when the single row has
/// exactly one column, the whole row otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOne {
    Scalar(Value),
    Row(Row),
}

impl QueryOne {
    pub fn scalar(self) -> Option<Value> {
        match self {
            QueryOne::Scalar(value) => Some(value),
            QueryOne::Row(_) => None,
        }
    }

    pub fn row(self) -> Option<Row> {
        match self {
            QueryOne::Row(row) => Some(row),
            QueryOne::Scalar(_) => None,
        }
    }
}

/// Lazy, forward-only row sequence over a dedicated cursor.
///
/// Produced by `query_stream`; rows are buffered in arraysize batches.
/// The stream owns its cursor precisely so the caller can keep using the
/// originating cursor for other statements mid-iteration.
pub struct RowStream {
    cursor: crate::cursor::Cursor,
    queue: std::collections::VecDeque<Row>,
    exhausted: bool,
}

impl RowStream {
    pub(crate) fn new(cursor: crate::cursor::Cursor) -> Self {
        Self {
            cursor,
            queue: std::collections::VecDeque::new(),
            exhausted: false,
        }
    }
}

impl Iterator for RowStream {
    type Item = Result<Row, DbError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.queue.is_empty() && !self.exhausted {
            let batch = self.cursor.arraysize();
            match self.cursor.fetch_many(batch) {
                Ok(rows) => {
                    if rows.is_empty() {
                        self.exhausted = true;
                    } else {
                        self.queue.extend(rows);
                    }
                }
                Err(err) => return Some(Err(err)),
            }
        }
        self.queue.pop_front().map(Ok)
    }
}
