use std::collections::BTreeSet;
use std::time::Duration;

use sqlx::{
    self,
    postgres::{PgArguments, PgRow},
    FromRow, PgExecutor, Postgres, Row,
};

use crate::database::manager::DatabaseError;

/// A positional statement parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    IntArray(Vec<i64>),
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Int(v)
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        SqlParam::Float(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl From<&String> for SqlParam {
    fn from(v: &String) -> Self {
        SqlParam::Text(v.clone())
    }
}

impl From<Vec<i64>> for SqlParam {
    fn from(v: Vec<i64>) -> Self {
        SqlParam::IntArray(v)
    }
}

impl From<&[i64]> for SqlParam {
    fn from(v: &[i64]) -> Self {
        SqlParam::IntArray(v.to_vec())
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlParam::Null)
    }
}

/// Metadata of a write statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    /// Value of the `id` column of the last row when the statement has a
    /// `RETURNING id` clause
    pub last_insert_id: Option<i64>,
}

/// SQL text plus its positional parameters. User input only ever travels in
/// `params`; the arity check runs before anything reaches the database.
#[derive(Debug, Clone)]
pub struct Statement {
    sql: String,
    params: Vec<SqlParam>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, param: impl Into<SqlParam>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    /// Distinct `$n` placeholders outside of string literals and quoted identifiers
    pub fn placeholders(&self) -> BTreeSet<usize> {
        let mut found = BTreeSet::new();
        let bytes = self.sql.as_bytes();
        let mut quote: Option<u8> = None;
        let mut i = 0;

        while i < bytes.len() {
            let c = bytes[i];
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if c == b'\'' || c == b'"' => quote = Some(c),
                None if c == b'$' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < bytes.len() && bytes[end].is_ascii_digit() {
                        end += 1;
                    }
                    if end > start {
                        if let Ok(n) = self.sql[start..end].parse::<usize>() {
                            found.insert(n);
                        }
                        i = end;
                        continue;
                    }
                }
                None => {}
            }
            i += 1;
        }

        found
    }

    /// Placeholders must be exactly `$1..=$n` with `n` bound parameters
    pub fn checked(&self) -> Result<(), DatabaseError> {
        let placeholders = self.placeholders();
        let contiguous = placeholders.iter().copied().eq(1..=placeholders.len());
        if !contiguous || placeholders.len() != self.params.len() {
            return Err(DatabaseError::ArityMismatch {
                placeholders: placeholders.len(),
                params: self.params.len(),
            });
        }
        Ok(())
    }

    pub async fn fetch_all<'c, T, E>(self, executor: E, limit: Duration) -> Result<Vec<T>, DatabaseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
        E: PgExecutor<'c>,
    {
        self.checked()?;
        let mut q = sqlx::query_as::<_, T>(&self.sql);
        for p in self.params {
            q = bind_param_query_as(q, p);
        }
        bounded(limit, q.fetch_all(executor)).await
    }

    pub async fn fetch_optional<'c, T, E>(self, executor: E, limit: Duration) -> Result<Option<T>, DatabaseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
        E: PgExecutor<'c>,
    {
        self.checked()?;
        let mut q = sqlx::query_as::<_, T>(&self.sql);
        for p in self.params {
            q = bind_param_query_as(q, p);
        }
        bounded(limit, q.fetch_optional(executor)).await
    }

    pub async fn fetch_one<'c, T, E>(self, executor: E, limit: Duration) -> Result<T, DatabaseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
        E: PgExecutor<'c>,
    {
        self.checked()?;
        let mut q = sqlx::query_as::<_, T>(&self.sql);
        for p in self.params {
            q = bind_param_query_as(q, p);
        }
        bounded(limit, q.fetch_one(executor)).await
    }

    /// Run a write statement. With `RETURNING id` the returned rows are read
    /// to report the last inserted identifier.
    pub async fn execute<'c, E>(self, executor: E, limit: Duration) -> Result<ExecOutcome, DatabaseError>
    where
        E: PgExecutor<'c>,
    {
        self.checked()?;
        let returns_id = self.returns_id();
        let mut q = sqlx::query(&self.sql);
        for p in self.params {
            q = bind_param_query(q, p);
        }

        if returns_id {
            let rows = bounded(limit, q.fetch_all(executor)).await?;
            let last_insert_id = match rows.last() {
                Some(row) => Some(row.try_get::<i64, _>("id")?),
                None => None,
            };
            Ok(ExecOutcome {
                rows_affected: rows.len() as u64,
                last_insert_id,
            })
        } else {
            let result = bounded(limit, q.execute(executor)).await?;
            Ok(ExecOutcome {
                rows_affected: result.rows_affected(),
                last_insert_id: None,
            })
        }
    }

    fn returns_id(&self) -> bool {
        let upper = self.sql.to_ascii_uppercase();
        upper
            .rfind("RETURNING")
            .map(|at| upper[at..].split(|c: char| !c.is_ascii_alphanumeric() && c != '_').any(|w| w == "ID"))
            .unwrap_or(false)
    }
}

async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, DatabaseError>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(DatabaseError::from),
        Err(_) => Err(DatabaseError::Timeout(limit)),
    }
}

fn bind_param_query(
    q: sqlx::query::Query<'_, Postgres, PgArguments>,
    v: SqlParam,
) -> sqlx::query::Query<'_, Postgres, PgArguments> {
    match v {
        SqlParam::Null => q.bind(Option::<String>::None),
        SqlParam::Bool(b) => q.bind(b),
        SqlParam::Int(i) => q.bind(i),
        SqlParam::Float(f) => q.bind(f),
        SqlParam::Text(s) => q.bind(s),
        SqlParam::IntArray(ids) => q.bind(ids),
    }
}

fn bind_param_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, Postgres, O, PgArguments>,
    v: SqlParam,
) -> sqlx::query::QueryAs<'q, Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, PgRow>,
{
    match v {
        SqlParam::Null => q.bind(Option::<String>::None),
        SqlParam::Bool(b) => q.bind(b),
        SqlParam::Int(i) => q.bind(i),
        SqlParam::Float(f) => q.bind(f),
        SqlParam::Text(s) => q.bind(s),
        SqlParam::IntArray(ids) => q.bind(ids),
    }
}
