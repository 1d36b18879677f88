//! Драйвер SQLite на базе rusqlite

use crate::common::{ConnectionConfig, Error, Result, Value};
use crate::connection::dialect::{is_write_statement, Dialect};
use crate::connection::driver::{Driver, QueryOutput, RawConnection};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use std::time::Duration;

/// Драйвер SQLite
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn RawConnection>> {
        if config.db_name.is_empty() {
            return Err(Error::connection("Путь к файлу SQLite не задан"));
        }
        let conn = rusqlite::Connection::open(&config.db_name)
            .map_err(|e| Error::connection(format!("{}: {}", config.db_name, e)))?;
        conn.busy_timeout(Duration::from_secs(config.timeout.max(1)))?;
        // journal_mode возвращает строку, поэтому через query
        conn.query_row("PRAGMA journal_mode = TRUNCATE", [], |_| Ok(()))?;
        conn.execute_batch("PRAGMA synchronous = OFF")?;
        log::debug!("SQLite connection opened: {}", config.db_name);
        Ok(Box::new(SqliteConnection {
            conn,
            in_tx: false,
        }))
    }
}

/// Соединение SQLite
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    in_tx: bool,
}

impl SqliteConnection {
    fn read_value(value: ValueRef<'_>) -> Value {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Int(i),
            ValueRef::Real(f) => Value::Float(f),
            ValueRef::Text(t) => Value::Str(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
        }
    }
}

impl RawConnection for SqliteConnection {
    fn run(&mut self, sql: &str, params: &[Value]) -> Result<QueryOutput> {
        if !self.in_tx && is_write_statement(sql) {
            self.begin()?;
        }
        let mut stmt = self.conn.prepare(sql)?;
        let column_count = stmt.column_count();
        if column_count == 0 {
            let rowcount = stmt.execute(rusqlite::params_from_iter(params.iter()))?;
            return Ok(QueryOutput {
                columns: Vec::new(),
                rows: Vec::new(),
                rowcount: rowcount as u64,
            });
        }

        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(Self::read_value(row.get_ref(i)?));
            }
            out.push(values);
        }
        Ok(QueryOutput {
            columns,
            rowcount: out.len() as u64,
            rows: out,
        })
    }

    fn begin(&mut self) -> Result<()> {
        if !self.in_tx {
            self.conn.execute_batch("BEGIN")?;
            self.in_tx = true;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_tx {
            self.conn.execute_batch("COMMIT")?;
            self.in_tx = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_tx {
            self.in_tx = false;
            if !self.conn.is_autocommit() {
                self.conn.execute_batch("ROLLBACK")?;
            }
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_tx
    }

    fn ping(&mut self) -> bool {
        self.conn.query_row("SELECT 1", [], |_| Ok(())).is_ok()
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.rollback()?;
        let this = *self;
        this.conn.close().map_err(|(_, e)| Error::from(e))
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sql;
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(Sql::Null),
            Value::Bool(b) => ToSqlOutput::Owned(Sql::Integer(i64::from(*b))),
            Value::Int(i) => ToSqlOutput::Owned(Sql::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(Sql::Real(*f)),
            Value::Str(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            other => ToSqlOutput::Owned(Sql::Text(other.to_text())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> Box<dyn RawConnection> {
        let config = ConnectionConfig::sqlite(dir.path().join("raw.db"));
        SqliteDriver.connect(&config).unwrap()
    }

    #[test]
    fn test_run_and_read_types() {
        let dir = TempDir::new().unwrap();
        let mut conn = open(&dir);
        conn.run("CREATE TABLE t(id INTEGER PRIMARY KEY AUTOINCREMENT, s TEXT, f REAL, b BLOB)", &[])
            .unwrap();
        let out = conn
            .run(
                "INSERT INTO t (s, f, b) VALUES (?, ?, ?)",
                &[Value::from("x"), Value::Float(1.5), Value::Bytes(vec![1, 2])],
            )
            .unwrap();
        assert_eq!(out.rowcount, 1);
        assert!(conn.in_transaction());
        conn.commit().unwrap();
        assert!(!conn.in_transaction());

        let out = conn.run("SELECT id, s, f, b FROM t", &[]).unwrap();
        assert_eq!(out.columns, vec!["id", "s", "f", "b"]);
        assert_eq!(
            out.rows[0],
            vec![
                Value::Int(1),
                Value::from("x"),
                Value::Float(1.5),
                Value::Bytes(vec![1, 2])
            ]
        );
    }

    #[test]
    fn test_rollback_discards_writes() {
        let dir = TempDir::new().unwrap();
        let mut conn = open(&dir);
        conn.run("CREATE TABLE t(id INTEGER)", &[]).unwrap();
        conn.commit().unwrap();
        conn.run("INSERT INTO t (id) VALUES (?)", &[Value::Int(5)]).unwrap();
        conn.rollback().unwrap();
        let out = conn.run("SELECT count(*) FROM t", &[]).unwrap();
        assert_eq!(out.rows[0][0], Value::Int(0));
        assert!(conn.ping());
    }

    #[test]
    fn test_bad_sql_is_programming_error() {
        let dir = TempDir::new().unwrap();
        let mut conn = open(&dir);
        let err = conn.run("SELECT nope FROM missing", &[]).unwrap_err();
        assert!(matches!(err, Error::Programming { .. }));
    }
}
