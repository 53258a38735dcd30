//! A reusable SQL statement bound to a connection pool.
//!
//! Grounded on `original_source/sql/statement.go`'s `Statement`: each call
//! to `execute`/`query` leases a pooled connection, sends one `Query`, and
//! always releases the lease again before returning — the Rust analogue of
//! the source's `defer s.pool.Put(connection)`.

use std::sync::Arc;
use uuid::Uuid;

use crate::conn::ConnectionPool;
use crate::driver::result::QueryResult;
use crate::driver::rows::Rows;
use crate::error::{LbError, LbResult};
use crate::wire::{Parameter, Query};

/// A SQL statement ready to be executed (or queried) against a pool.
pub struct Statement {
    pool: Arc<ConnectionPool>,
    sql: String,
}

impl Statement {
    pub fn new(pool: Arc<ConnectionPool>, sql: impl Into<String>) -> Self {
        Self {
            pool,
            sql: sql.into(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The number of bind-parameter placeholders the statement text
    /// declares (`?1`, `:name`, `@name`, `$name`).
    pub fn num_input(&self) -> usize {
        count_placeholders(&self.sql)
    }

    /// Runs a non-`SELECT` statement and returns its outcome.
    pub async fn execute(&self, parameters: Vec<Parameter>) -> LbResult<QueryResult> {
        let connection = self.pool.get().await?;
        let query = Query::new(Uuid::new_v4().to_string(), self.sql.clone()).with_parameters(parameters);
        let outcome = connection.send(query).await;
        self.pool.put(&connection).await;

        let response = outcome?;
        if !response.error.is_empty() {
            return Err(LbError::Server {
                message: String::from_utf8_lossy(&response.error).to_string(),
            });
        }

        Ok(QueryResult::new(
            response.data.columns,
            response.data.changes,
            response.data.last_insert_row_id,
            response.data.rows,
        ))
    }

    /// Runs a `SELECT` and returns a cursor over its rows.
    pub async fn query(&self, parameters: Vec<Parameter>) -> LbResult<Rows> {
        let connection = self.pool.get().await?;
        let query = Query::new(Uuid::new_v4().to_string(), self.sql.clone()).with_parameters(parameters);
        let outcome = connection.send(query).await;
        self.pool.put(&connection).await;

        let response = outcome?;
        if !response.error.is_empty() {
            return Err(LbError::Server {
                message: String::from_utf8_lossy(&response.error).to_string(),
            });
        }

        Ok(Rows::new(response.data.columns, response.data.rows))
    }
}

fn count_placeholders(sql: &str) -> usize {
    let chars: Vec<char> = sql.chars().collect();
    let mut count = 0;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '?' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
                if j > start {
                    count += 1;
                    i = j;
                    continue;
                }
            }
            ':' | '@' | '$' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                if j > start {
                    count += 1;
                    i = j;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_question_mark_placeholders() {
        assert_eq!(count_placeholders("INSERT INTO t(id,name) VALUES(?1,?2)"), 2);
    }

    #[test]
    fn counts_named_placeholders() {
        assert_eq!(count_placeholders("SELECT * FROM t WHERE id = :id AND name = @name"), 2);
    }

    #[test]
    fn bare_question_mark_without_digits_does_not_count() {
        assert_eq!(count_placeholders("SELECT * FROM t WHERE id = ?"), 0);
    }

    #[test]
    fn statement_with_no_placeholders() {
        assert_eq!(count_placeholders("SELECT 1"), 0);
    }
}
