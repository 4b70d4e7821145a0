//! SQLite dispatch for named-parameter queries.
//!
//! # Responsibility
//! - Translate named SQL into `?N` SQL and run it through `rusqlite`.
//! - Hand callers a [`Scanner`] whether dispatch succeeded or not.

use super::placeholders::{inline_named_placeholders, sqlite_marker};
use super::{MapError, MapResult, NamedArgs, RowCursor, Scanner};
use log::debug;
use rusqlite::{params_from_iter, Connection, Row, Rows};

/// Cursor over `rusqlite` rows.
pub struct SqliteCursor<'stmt> {
    rows: Option<Rows<'stmt>>,
}

impl<'stmt> SqliteCursor<'stmt> {
    pub fn new(rows: Rows<'stmt>) -> Self {
        Self { rows: Some(rows) }
    }
}

impl<'stmt> RowCursor for SqliteCursor<'stmt> {
    type Row = Row<'stmt>;

    fn advance(&mut self) -> MapResult<Option<&Row<'stmt>>> {
        match self.rows.as_mut() {
            Some(rows) => Ok(rows.next()?),
            None => Ok(None),
        }
    }

    fn release(&mut self) {
        // Dropping `Rows` resets the underlying statement.
        self.rows = None;
    }
}

/// Runs a named-parameter query and passes the resulting scanner to
/// `consume`.
///
/// Translation, prepare and dispatch failures reach `consume` as a failed
/// scanner, so callers handle every failure through one retrieval call.
///
/// # Errors
/// - Whatever `consume` returns.
pub fn query_with_map<T, F>(conn: &Connection, sql: &str, args: &NamedArgs, consume: F) -> MapResult<T>
where
    F: FnOnce(Scanner<SqliteCursor<'_>>) -> MapResult<T>,
{
    let (positional_sql, values) = match inline_named_placeholders(sqlite_marker, sql, args) {
        Ok(translated) => translated,
        Err(err) => return consume(Scanner::failed(log_dispatch_error(err))),
    };

    let mut stmt = match conn.prepare(&positional_sql) {
        Ok(stmt) => stmt,
        Err(err) => return consume(Scanner::failed(log_dispatch_error(err.into()))),
    };

    let rows = match stmt.query(params_from_iter(values.iter())) {
        Ok(rows) => rows,
        Err(err) => return consume(Scanner::failed(log_dispatch_error(err.into()))),
    };

    consume(Scanner::new(SqliteCursor::new(rows)))
}

/// Runs a named-parameter statement and returns the affected row count.
///
/// # Errors
/// - [`MapError::MissingParameter`] for unbound tokens.
/// - [`MapError::Db`] when SQLite rejects the statement.
pub fn execute_with_map(conn: &Connection, sql: &str, args: &NamedArgs) -> MapResult<usize> {
    let (positional_sql, values) = inline_named_placeholders(sqlite_marker, sql, args)
        .map_err(log_dispatch_error)?;

    conn.execute(&positional_sql, params_from_iter(values.iter()))
        .map_err(|err| log_dispatch_error(err.into()))
}

fn log_dispatch_error(err: MapError) -> MapError {
    debug!("event=query_dispatch module=mapping status=error error={err}");
    err
}

#[cfg(test)]
mod tests {
    use super::{execute_with_map, query_with_map};
    use crate::mapping::{DecodeRow, MapError, MapResult, NamedArgs, RowSource};
    use rusqlite::types::Value;
    use rusqlite::Connection;

    #[derive(Debug, PartialEq)]
    struct Pair {
        id: i64,
        name: String,
    }

    impl DecodeRow for Pair {
        fn decode_row<R: RowSource>(row: &R) -> MapResult<Self> {
            Ok(Self {
                id: row.column(0)?,
                name: row.column(1)?,
            })
        }
    }

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE pairs (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             INSERT INTO pairs (id, name) VALUES (1, 'one'), (2, 'two'), (3, 'three');",
        )
        .unwrap();
        conn
    }

    fn args(entries: &[(&str, Value)]) -> NamedArgs {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn query_reads_rows_bound_by_name() {
        let conn = seeded();
        let bag = args(&[("min", Value::Integer(2))]);
        let pairs = query_with_map(
            &conn,
            "select id, name from pairs where id >= :min or id = :min order by id",
            &bag,
            |scanner| scanner.read_all::<Pair>(),
        )
        .unwrap();

        assert_eq!(
            pairs,
            vec![
                Pair {
                    id: 2,
                    name: "two".to_string()
                },
                Pair {
                    id: 3,
                    name: "three".to_string()
                },
            ]
        );
    }

    #[test]
    fn missing_parameter_reaches_caller_through_scanner() {
        let conn = seeded();
        let err = query_with_map(
            &conn,
            "select id, name from pairs where id = :id",
            &NamedArgs::new(),
            |scanner| scanner.read::<Pair>(),
        )
        .unwrap_err();

        assert!(matches!(err, MapError::MissingParameter(name) if name == "id"));
    }

    #[test]
    fn rejected_sql_is_replayed_as_dispatch_error() {
        let conn = seeded();
        let mut total = 0_i64;
        let err = query_with_map(&conn, "select count(*) from nowhere", &NamedArgs::new(), |scanner| {
            scanner.scan((&mut total,))
        })
        .unwrap_err();

        assert!(matches!(err, MapError::Db(_)));
    }

    #[test]
    fn execute_reports_affected_rows() {
        let conn = seeded();
        let bag = args(&[("name", Value::Text("renamed".into())), ("id", Value::Integer(1))]);
        let changed =
            execute_with_map(&conn, "update pairs set name = :name where id = :id", &bag).unwrap();
        assert_eq!(changed, 1);
    }
}
