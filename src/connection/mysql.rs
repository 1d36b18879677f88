//! Драйвер MySQL на базе крейта `mysql`

use crate::common::{ConnectionConfig, Error, Result, Value};
use crate::connection::dialect::{is_write_statement, Dialect};
use crate::connection::driver::{Driver, QueryOutput, RawConnection};
use chrono::{Datelike, NaiveDate, Timelike};
use mysql::prelude::Queryable;
use std::time::Duration;

/// Драйвер MySQL
pub struct MysqlDriver;

impl Driver for MysqlDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn RawConnection>> {
        let timeout = Duration::from_secs(config.timeout.max(1));
        let opts = mysql::OptsBuilder::new()
            .ip_or_hostname(Some(config.host.clone()))
            .tcp_port(config.effective_port())
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .db_name(Some(config.db_name.clone()))
            .tcp_connect_timeout(Some(timeout));
        let mut conn = mysql::Conn::new(opts)
            .map_err(|e| Error::connection(format!("{}@{}: {}", config.db_name, config.host, e)))?;
        if config.unicode {
            conn.query_drop("SET NAMES utf8mb4")?;
        }
        log::debug!("MySQL connection opened: {}@{}", config.db_name, config.host);
        Ok(Box::new(MysqlConnection { conn, in_tx: false }))
    }
}

/// Соединение MySQL
pub struct MysqlConnection {
    conn: mysql::Conn,
    in_tx: bool,
}

fn to_mysql(value: &Value) -> mysql::Value {
    match value {
        Value::Null => mysql::Value::NULL,
        Value::Bool(b) => mysql::Value::Int(i64::from(*b)),
        Value::Int(i) => mysql::Value::Int(*i),
        Value::Float(f) => mysql::Value::Double(*f),
        Value::Str(s) => mysql::Value::Bytes(s.as_bytes().to_vec()),
        Value::Bytes(b) => mysql::Value::Bytes(b.clone()),
        Value::DateTime(dt) => mysql::Value::Date(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            dt.nanosecond() / 1000,
        ),
        Value::Date(d) => {
            mysql::Value::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0)
        }
        Value::Time(t) => mysql::Value::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1000,
        ),
        Value::List(_) | Value::Json(_) => mysql::Value::Bytes(value.to_text().into_bytes()),
    }
}

fn from_mysql(value: mysql::Value) -> Value {
    match value {
        mysql::Value::NULL => Value::Null,
        mysql::Value::Int(i) => Value::Int(i),
        mysql::Value::UInt(u) => Value::Int(u as i64),
        mysql::Value::Float(f) => Value::Float(f64::from(f)),
        mysql::Value::Double(f) => Value::Float(f),
        mysql::Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => Value::Str(s),
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        mysql::Value::Date(y, m, d, h, mi, s, micro) => {
            let date = NaiveDate::from_ymd_opt(i32::from(y), u32::from(m), u32::from(d));
            match date.and_then(|d| {
                d.and_hms_micro_opt(u32::from(h), u32::from(mi), u32::from(s), micro)
            }) {
                Some(dt) => Value::DateTime(dt),
                None => Value::Null,
            }
        }
        mysql::Value::Time(_, _, h, mi, s, micro) => {
            chrono::NaiveTime::from_hms_micro_opt(u32::from(h), u32::from(mi), u32::from(s), micro)
                .map(Value::Time)
                .unwrap_or(Value::Null)
        }
    }
}

impl RawConnection for MysqlConnection {
    fn run(&mut self, sql: &str, params: &[Value]) -> Result<QueryOutput> {
        if !self.in_tx && is_write_statement(sql) {
            self.begin()?;
        }
        let sql = Dialect::Mysql.native_sql(sql);
        let params = if params.is_empty() {
            mysql::Params::Empty
        } else {
            mysql::Params::Positional(params.iter().map(to_mysql).collect())
        };

        let mut result = self.conn.exec_iter(&*sql, params)?;
        let columns: Vec<String> = result
            .columns()
            .as_ref()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();
        let mut rows = Vec::new();
        for row in result.by_ref() {
            rows.push(mysql::Row::unwrap(row?).into_iter().map(from_mysql).collect());
        }
        let affected = result.affected_rows();
        drop(result);

        let rowcount = if columns.is_empty() {
            affected
        } else {
            rows.len() as u64
        };
        Ok(QueryOutput {
            columns,
            rows,
            rowcount,
        })
    }

    fn begin(&mut self) -> Result<()> {
        if !self.in_tx {
            self.conn.query_drop("START TRANSACTION")?;
            self.in_tx = true;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_tx {
            self.conn.query_drop("COMMIT")?;
            self.in_tx = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_tx {
            self.in_tx = false;
            self.conn.query_drop("ROLLBACK")?;
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_tx
    }

    fn ping(&mut self) -> bool {
        self.conn.query_drop("SELECT 1").is_ok()
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.rollback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_mapping() {
        let dt = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap();
        let mapped = to_mysql(&Value::DateTime(dt));
        assert_eq!(from_mysql(mapped), Value::DateTime(dt));
        assert_eq!(from_mysql(to_mysql(&Value::from("abc"))), Value::from("abc"));
        assert_eq!(from_mysql(mysql::Value::UInt(7)), Value::Int(7));
    }
}
