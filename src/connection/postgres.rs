//! Драйвер PostgreSQL на базе крейта `postgres`

use crate::common::{parse_date, parse_datetime, parse_time, ConnectionConfig, Error, Result, Value};
use crate::connection::dialect::{is_write_statement, Dialect};
use crate::connection::driver::{Driver, QueryOutput, RawConnection};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres::types::{ToSql, Type};
use std::time::Duration;

type Param = Box<dyn ToSql + Sync>;

/// Драйвер PostgreSQL
pub struct PostgresDriver;

impl Driver for PostgresDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn RawConnection>> {
        let mut pg = postgres::Config::new();
        pg.host(&config.host)
            .port(config.effective_port())
            .dbname(&config.db_name)
            .connect_timeout(Duration::from_secs(config.timeout.max(1)));
        if !config.user.is_empty() {
            pg.user(&config.user);
        }
        if !config.password.is_empty() {
            pg.password(&config.password);
        }
        let client = pg
            .connect(postgres::NoTls)
            .map_err(|e| Error::connection(format!("{}@{}: {}", config.db_name, config.host, e)))?;
        log::debug!("PostgreSQL connection opened: {}@{}", config.db_name, config.host);
        Ok(Box::new(PostgresConnection {
            client,
            in_tx: false,
        }))
    }
}

/// Соединение PostgreSQL
pub struct PostgresConnection {
    client: postgres::Client,
    in_tx: bool,
}

/// Приводит значение к типу параметра, который вывел сервер
fn to_pg(value: &Value, ty: &Type) -> Result<Param> {
    let mismatch = || Error::programming(format!("Значение {} не подходит для типа {}", value, ty));
    let null = value.is_null();
    let param: Param = match *ty {
        Type::BOOL => Box::new(if null { None } else { Some(value.is_truthy()) }),
        Type::INT2 => Box::new(if null {
            None
        } else {
            Some(value.as_i64().ok_or_else(mismatch)? as i16)
        }),
        Type::INT4 => Box::new(if null {
            None
        } else {
            Some(value.as_i64().ok_or_else(mismatch)? as i32)
        }),
        Type::INT8 => Box::new(if null {
            None
        } else {
            Some(value.as_i64().ok_or_else(mismatch)?)
        }),
        Type::FLOAT4 => Box::new(if null {
            None
        } else {
            Some(value.as_f64().ok_or_else(mismatch)? as f32)
        }),
        Type::FLOAT8 => Box::new(if null {
            None
        } else {
            Some(value.as_f64().ok_or_else(mismatch)?)
        }),
        Type::TIMESTAMP => Box::new(match value {
            Value::Null => None,
            Value::DateTime(dt) => Some(*dt),
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            Value::Str(s) if s.is_empty() => None,
            Value::Str(s) => Some(parse_datetime(s).ok_or_else(mismatch)?),
            _ => return Err(mismatch()),
        }),
        Type::DATE => Box::new(match value {
            Value::Null => None,
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date()),
            Value::Str(s) if s.is_empty() => None,
            Value::Str(s) => Some(parse_date(s).ok_or_else(mismatch)?),
            _ => return Err(mismatch()),
        }),
        Type::TIME => Box::new(match value {
            Value::Null => None,
            Value::Time(t) => Some(*t),
            Value::DateTime(dt) => Some(dt.time()),
            Value::Str(s) if s.is_empty() => None,
            Value::Str(s) => Some(parse_time(s).ok_or_else(mismatch)?),
            _ => return Err(mismatch()),
        }),
        Type::BYTEA => Box::new(match value {
            Value::Null => None,
            Value::Bytes(b) => Some(b.clone()),
            other => Some(other.to_text().into_bytes()),
        }),
        _ => Box::new(if null { None } else { Some(value.to_text()) }),
    };
    Ok(param)
}

fn from_pg(row: &postgres::Row, index: usize, ty: &Type) -> Result<Value> {
    Ok(match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(index)?.into(),
        Type::INT2 => row.try_get::<_, Option<i16>>(index)?.map(i64::from).into(),
        Type::INT4 => row.try_get::<_, Option<i32>>(index)?.map(i64::from).into(),
        Type::INT8 => row.try_get::<_, Option<i64>>(index)?.into(),
        Type::OID => row.try_get::<_, Option<u32>>(index)?.into(),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(index)?.map(f64::from).into(),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(index)?.into(),
        Type::TIMESTAMP => row.try_get::<_, Option<NaiveDateTime>>(index)?.into(),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(index)?
            .map(|dt| dt.naive_utc())
            .into(),
        Type::DATE => row.try_get::<_, Option<NaiveDate>>(index)?.into(),
        Type::TIME => row.try_get::<_, Option<NaiveTime>>(index)?.into(),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(index)?.into(),
        _ => row
            .try_get::<_, Option<String>>(index)
            .ok()
            .flatten()
            .into(),
    })
}

impl RawConnection for PostgresConnection {
    fn run(&mut self, sql: &str, params: &[Value]) -> Result<QueryOutput> {
        if !self.in_tx && is_write_statement(sql) {
            self.begin()?;
        }
        let sql = Dialect::Postgres.native_sql(sql);
        let stmt = self.client.prepare(&sql)?;
        if stmt.params().len() != params.len() {
            return Err(Error::programming(format!(
                "Ожидалось {} параметров, получено {}",
                stmt.params().len(),
                params.len()
            )));
        }
        let boxed = stmt
            .params()
            .iter()
            .zip(params)
            .map(|(ty, value)| to_pg(value, ty))
            .collect::<Result<Vec<Param>>>()?;
        let refs: Vec<&(dyn ToSql + Sync)> = boxed.iter().map(|p| p.as_ref()).collect();

        if stmt.columns().is_empty() {
            let rowcount = self.client.execute(&stmt, &refs)?;
            return Ok(QueryOutput {
                columns: Vec::new(),
                rows: Vec::new(),
                rowcount,
            });
        }

        let columns: Vec<String> = stmt.columns().iter().map(|c| c.name().to_string()).collect();
        let types: Vec<Type> = stmt.columns().iter().map(|c| c.type_().clone()).collect();
        let mut rows = Vec::new();
        for row in self.client.query(&stmt, &refs)? {
            let values = types
                .iter()
                .enumerate()
                .map(|(i, ty)| from_pg(&row, i, ty))
                .collect::<Result<Vec<_>>>()?;
            rows.push(values);
        }
        Ok(QueryOutput {
            columns,
            rowcount: rows.len() as u64,
            rows,
        })
    }

    fn begin(&mut self) -> Result<()> {
        if !self.in_tx {
            self.client.batch_execute("BEGIN")?;
            self.in_tx = true;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_tx {
            self.client.batch_execute("COMMIT")?;
            self.in_tx = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_tx {
            self.in_tx = false;
            self.client.batch_execute("ROLLBACK")?;
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_tx
    }

    fn ping(&mut self) -> bool {
        !self.client.is_closed() && self.client.simple_query("SELECT 1").is_ok()
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.rollback()?;
        let this = *self;
        this.client.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_conversion_rejects_garbage() {
        assert!(to_pg(&Value::from("abc"), &Type::INT4).is_err());
        assert!(to_pg(&Value::from("12"), &Type::INT4).is_ok());
        assert!(to_pg(&Value::Null, &Type::TIMESTAMP).is_ok());
        assert!(to_pg(&Value::from("2024-01-02 03:04:05"), &Type::TIMESTAMP).is_ok());
    }
}
