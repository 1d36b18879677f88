//! Управление схемой базы данных пула
//!
//! DDL и чтение схемы для каждой поддерживаемой СУБД. Менеджер работает на
//! собственном соединении и фиксирует каждую инструкцию сразу.

use crate::common::{
    is_valid_column_name, is_valid_table_name, parse_datetime, ConnectionConfig, Datatype, Error,
    FieldConf, Result, Value, DEFAULT_LIST_COLUMN_SIZE, DEFAULT_STRING_COLUMN_SIZE, META_TABLE,
};
use crate::common::utils::escape_sql_literal;
use crate::connection::{Connection, Dialect, QueryOutput, RawConnection};
use crate::storage::structure::Structure;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Колонка в том виде, в каком ее описывает СУБД
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbColumn {
    pub id: String,
    /// Тип колонки в синтаксисе СУБД
    pub column_type: String,
    pub identity: bool,
    pub default: String,
    pub nullable: bool,
}

/// Колонка базы данных и ее описание в структуре
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    /// `None`, если колонки еще нет в базе
    pub db: Option<DbColumn>,
    /// `None`, если колонка не описана в структуре
    pub conf: Option<FieldConf>,
}

/// Менеджер схемы базы данных
pub struct DbManager {
    conn: Box<dyn RawConnection>,
    dialect: Dialect,
    engine: String,
    unicode: bool,
}

impl DbManager {
    /// Открывает менеджер на отдельном соединении
    pub fn open(connection: &Connection) -> Result<Self> {
        let raw = connection.private()?;
        Ok(Self::with_raw(raw, connection.dialect(), connection.config()))
    }

    /// Создает менеджер на готовом соединении
    pub fn with_raw(conn: Box<dyn RawConnection>, dialect: Dialect, config: &ConnectionConfig) -> Self {
        Self {
            conn,
            dialect,
            engine: config.engine.clone(),
            unicode: config.unicode,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Закрывает соединение менеджера
    pub fn close(self) -> Result<()> {
        self.conn.close()
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryOutput> {
        self.conn.run(sql, params)
    }

    /// Выполняет DDL и сразу фиксирует его
    fn execute_ddl(&mut self, sql: &str) -> Result<()> {
        log::info!("DDL: {}", sql);
        let result = self.conn.run(sql, &[]).and_then(|_| self.conn.commit());
        if result.is_err() {
            if let Err(e) = self.conn.rollback() {
                log::warn!("Rollback after failed DDL failed: {}", e);
            }
        }
        result
    }

    fn check_table_name(name: &str) -> Result<()> {
        if !is_valid_table_name(name) {
            return Err(Error::validation(format!("Недопустимое имя таблицы: {}", name)));
        }
        Ok(())
    }

    fn check_column_name(name: &str) -> Result<()> {
        if !is_valid_column_name(name) {
            return Err(Error::validation(format!("Недопустимое имя колонки: {}", name)));
        }
        Ok(())
    }

    // База данных ------------------------------------------------------------

    /// Список баз данных сервера; для SQLite пуст
    pub fn get_databases(&mut self) -> Result<Vec<String>> {
        let sql = match self.dialect {
            Dialect::Sqlite => return Ok(Vec::new()),
            Dialect::Mysql => "SHOW DATABASES",
            Dialect::Postgres => "SELECT datname::text FROM pg_database",
        };
        let out = self.query(sql, &[])?;
        Ok(first_column(out))
    }

    /// Существует ли база данных; для SQLite - файл базы
    pub fn is_database(&mut self, name: &str) -> Result<bool> {
        if self.dialect == Dialect::Sqlite {
            return Ok(Path::new(name).is_file());
        }
        Ok(self.get_databases()?.iter().any(|db| db == name))
    }

    pub fn create_database(&mut self, name: &str) -> Result<()> {
        if self.dialect == Dialect::Sqlite {
            return Err(Error::unsupported("create_database on SQLite"));
        }
        Self::check_table_name(name)?;
        self.execute_ddl(&format!("CREATE DATABASE {}", name))
    }

    pub fn use_database(&mut self, name: &str) -> Result<()> {
        if self.dialect != Dialect::Mysql {
            return Err(Error::unsupported(format!("use_database on {:?}", self.dialect)));
        }
        Self::check_table_name(name)?;
        self.query(&format!("USE {}", name), &[])?;
        Ok(())
    }

    // Таблицы --------------------------------------------------------------

    /// Имена таблиц текущей базы данных
    pub fn get_tables(&mut self) -> Result<Vec<String>> {
        let sql = match self.dialect {
            Dialect::Sqlite => {
                "SELECT name FROM (SELECT * FROM sqlite_master UNION ALL SELECT * FROM sqlite_temp_master) \
                 WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
            Dialect::Mysql => "SHOW TABLES",
            Dialect::Postgres => {
                "SELECT table_name::text FROM information_schema.tables WHERE table_schema = 'public' ORDER BY table_name"
            }
        };
        let out = self.query(sql, &[])?;
        Ok(first_column(out))
    }

    pub fn is_table(&mut self, name: &str) -> Result<bool> {
        Ok(self
            .get_tables()?
            .iter()
            .any(|t| t.eq_ignore_ascii_case(name)))
    }

    /// Создает таблицу
    ///
    /// С `create_identity` первой колонкой становится автоинкрементный
    /// первичный ключ `primary_key`; описание с тем же именем пропускается.
    pub fn create_table(
        &mut self,
        name: &str,
        columns: &[FieldConf],
        create_identity: bool,
        primary_key: &str,
    ) -> Result<()> {
        Self::check_table_name(name)?;
        if name.eq_ignore_ascii_case("user") {
            return Err(Error::validation("Имя таблицы user зарезервировано"));
        }
        let mut definitions = Vec::with_capacity(columns.len() + 1);
        if create_identity {
            Self::check_column_name(primary_key)?;
            definitions.push(format!("{} {}", primary_key, self.identity_column_options()));
        } else if columns.is_empty() {
            return Err(Error::configuration(format!("Для таблицы {} не описаны поля", name)));
        }
        for conf in columns {
            if create_identity && conf.id == primary_key {
                continue;
            }
            Self::check_column_name(&conf.id)?;
            definitions.push(format!("{} {}", conf.id, self.convert_conf_to_column_options(conf)?));
        }

        let mut sql = format!("CREATE TABLE {}({})", name, definitions.join(","));
        if self.dialect == Dialect::Mysql {
            sql.push_str(&format!(" ENGINE = {}", self.engine));
            if self.unicode {
                sql.push_str(" CHARACTER SET utf8mb4 COLLATE utf8mb4_general_ci");
            }
        }
        self.execute_ddl(&sql)
    }

    pub fn rename_table(&mut self, name: &str, new_name: &str) -> Result<()> {
        Self::check_table_name(name)?;
        Self::check_table_name(new_name)?;
        self.execute_ddl(&format!("ALTER TABLE {} RENAME TO {}", name, new_name))
    }

    pub fn delete_table(&mut self, name: &str) -> Result<()> {
        Self::check_table_name(name)?;
        self.execute_ddl(&format!("DROP TABLE {}", name))
    }

    // Колонки --------------------------------------------------------------

    /// Колонки таблицы, объединенные с описаниями полей
    ///
    /// Описания без колонки в базе попадают в результат с `db: None`.
    /// Для несуществующей таблицы результат пуст.
    pub fn get_columns(
        &mut self,
        table: &str,
        structure: Option<&[FieldConf]>,
    ) -> Result<IndexMap<String, ColumnInfo>> {
        Self::check_table_name(table)?;
        if !self.is_table(table)? {
            return Ok(IndexMap::new());
        }
        let columns = match self.dialect {
            Dialect::Sqlite => self.sqlite_columns(table)?,
            Dialect::Mysql => self.mysql_columns(table)?,
            Dialect::Postgres => self.postgres_columns(table)?,
        };
        let mut result: IndexMap<String, ColumnInfo> = columns
            .into_iter()
            .map(|c| (c.id.clone(), ColumnInfo { db: Some(c), conf: None }))
            .collect();
        for conf in structure.unwrap_or_default() {
            result
                .entry(conf.id.clone())
                .or_insert(ColumnInfo { db: None, conf: None })
                .conf = Some(conf.clone());
        }
        Ok(result)
    }

    fn sqlite_columns(&mut self, table: &str) -> Result<Vec<DbColumn>> {
        // cid, name, type, notnull, dflt_value, pk
        let out = self.query(&format!("PRAGMA table_info({})", table), &[])?;
        Ok(out
            .rows
            .into_iter()
            .map(|row| DbColumn {
                id: row[1].to_text(),
                column_type: row[2].to_text(),
                identity: row[5].as_i64().unwrap_or(0) > 0,
                default: row[4].to_text(),
                nullable: row[3].as_i64().unwrap_or(0) == 0,
            })
            .collect())
    }

    fn mysql_columns(&mut self, table: &str) -> Result<Vec<DbColumn>> {
        // Field, Type, Null, Key, Default, Extra
        let out = self.query(&format!("SHOW COLUMNS FROM {}", table), &[])?;
        Ok(out
            .rows
            .into_iter()
            .map(|row| DbColumn {
                id: row[0].to_text(),
                column_type: row[1].to_text(),
                identity: row[5].to_text().contains("auto_increment"),
                default: row[4].to_text(),
                nullable: row[2].to_text().eq_ignore_ascii_case("yes"),
            })
            .collect())
    }

    fn postgres_columns(&mut self, table: &str) -> Result<Vec<DbColumn>> {
        let out = self.query(
            "SELECT column_name::text, data_type::text, column_default::text, is_nullable::text, \
             is_identity::text, character_maximum_length::integer \
             FROM information_schema.columns WHERE table_name = %s ORDER BY ordinal_position",
            &[Value::from(table.to_lowercase())],
        )?;
        Ok(out
            .rows
            .into_iter()
            .map(|row| {
                let default = row[2].to_text().replace("::character varying", "");
                let column_type = match row[5].as_i64() {
                    Some(size) => format!("{} ({})", row[1].to_text(), size),
                    None => row[1].to_text(),
                };
                DbColumn {
                    id: row[0].to_text(),
                    column_type,
                    identity: row[4].to_text().eq_ignore_ascii_case("yes")
                        || default.starts_with("nextval("),
                    default,
                    nullable: row[3].to_text().eq_ignore_ascii_case("yes"),
                }
            })
            .collect())
    }

    pub fn is_column(&mut self, table: &str, column: &str) -> Result<bool> {
        let columns = self.get_columns(table, None)?;
        Ok(columns
            .iter()
            .any(|(id, info)| id.eq_ignore_ascii_case(column) && info.db.is_some()))
    }

    /// Добавляет колонку; опция `identity` создает автоинкрементный ключ
    pub fn create_column(&mut self, table: &str, column: &str, options: &str) -> Result<()> {
        Self::check_table_name(table)?;
        Self::check_column_name(column)?;
        if options == "identity" {
            return self.create_identity_column(table, column);
        }
        self.execute_ddl(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, options))
    }

    pub fn create_identity_column(&mut self, table: &str, column: &str) -> Result<()> {
        if self.dialect == Dialect::Sqlite {
            return Err(Error::unsupported("create_identity_column on SQLite"));
        }
        Self::check_table_name(table)?;
        Self::check_column_name(column)?;
        let options = self.identity_column_options();
        self.execute_ddl(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, options))
    }

    /// Меняет тип колонки и, если задано, ее имя
    pub fn modify_column(&mut self, table: &str, column: &str, new_name: &str, options: &str) -> Result<()> {
        Self::check_table_name(table)?;
        Self::check_column_name(column)?;
        if !new_name.is_empty() {
            Self::check_column_name(new_name)?;
        }
        if options.trim().is_empty() {
            return Err(Error::validation(format!("Не заданы параметры колонки {}.{}", table, column)));
        }
        match self.dialect {
            Dialect::Sqlite => Err(Error::unsupported("modify_column on SQLite")),
            Dialect::Mysql => {
                let target = if new_name.is_empty() { column } else { new_name };
                self.execute_ddl(&format!("ALTER TABLE {} CHANGE {} {} {}", table, column, target, options))
            }
            Dialect::Postgres => {
                let mut column = column;
                if !new_name.is_empty() {
                    self.execute_ddl(&format!("ALTER TABLE {} RENAME COLUMN {} TO {}", table, column, new_name))?;
                    column = new_name;
                }
                let column_type = postgres_type_of(options);
                self.execute_ddl(&format!("ALTER TABLE {} ALTER COLUMN {} TYPE {}", table, column, column_type))
            }
        }
    }

    // Структура --------------------------------------------------------------

    /// Приводит таблицу к описанию полей
    ///
    /// Создает отсутствующую таблицу, добавляет недостающие колонки и меняет
    /// тип колонок из `modify`. `identity` задает имя автоинкрементного ключа.
    /// Изменения, которые СУБД не поддерживает, пропускаются с предупреждением.
    pub fn update_structure(
        &mut self,
        table: &str,
        fields: &[FieldConf],
        modify: Option<&[&str]>,
        identity: Option<&str>,
    ) -> Result<()> {
        if !self.is_table(table)? {
            return self.create_table(table, fields, identity.is_some(), identity.unwrap_or("id"));
        }

        let columns = self.get_columns(table, Some(fields))?;
        for conf in fields {
            if identity == Some(conf.id.as_str()) {
                continue;
            }
            let options = self.convert_conf_to_column_options(conf)?;
            let exists = columns.get(&conf.id).is_some_and(|c| c.db.is_some());
            if !exists {
                self.create_column(table, &conf.id, &options)?;
                continue;
            }
            if !modify.is_some_and(|m| m.contains(&conf.id.as_str())) {
                continue;
            }
            match self.modify_column(table, &conf.id, "", &options) {
                Err(Error::Unsupported { operation }) => {
                    log::warn!("Skipping change of {}.{}: {} is not supported", table, conf.id, operation);
                }
                other => other?,
            }
        }

        if let Some(key) = identity {
            if !self.is_column(table, key)? {
                match self.create_identity_column(table, key) {
                    Err(Error::Unsupported { operation }) => {
                        log::warn!("Skipping identity {}.{}: {} is not supported", table, key, operation);
                    }
                    other => other?,
                }
            }
        }
        Ok(())
    }

    /// Создает или обновляет системные таблицы пула
    ///
    /// Таблица метаданных строится из полей структуры, если они заданы.
    pub fn update_pool_tables(&mut self, structure: &Structure) -> Result<()> {
        for system in Structure::system_tables() {
            let fields = match structure.field_confs(system.name) {
                Some(confs) if system.name == META_TABLE => confs,
                _ => system.fields.as_slice(),
            };
            self.update_structure(system.name, fields, None, system.identity)?;
        }
        Ok(())
    }

    /// Создает или обновляет таблицы данных структуры
    pub fn update_data_tables(&mut self, structure: &Structure, modify: Option<&[&str]>) -> Result<()> {
        for table in structure.data_tables() {
            let Some(fields) = structure.field_confs(table) else {
                log::warn!("No field configuration for {}, table skipped", table);
                continue;
            };
            self.update_structure(table, fields, modify, Some("id"))?;
        }
        Ok(())
    }

    /// Нормализует дату по умолчанию; нераспознанное значение дает пустую строку
    pub fn convert_date(value: &str) -> String {
        parse_datetime(value)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default()
    }

    fn identity_column_options(&self) -> &'static str {
        match self.dialect {
            Dialect::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
            Dialect::Mysql => "INT UNSIGNED AUTO_INCREMENT UNIQUE NOT NULL PRIMARY KEY",
            Dialect::Postgres => "SERIAL PRIMARY KEY",
        }
    }

    /// Определение колонки для описания поля в синтаксисе СУБД
    pub fn convert_conf_to_column_options(&self, conf: &FieldConf) -> Result<String> {
        let d = self.dialect;
        let mut datatype = conf.datatype.clone();
        if datatype == Datatype::List {
            datatype = match conf.default {
                serde_json::Value::Number(_) => Datatype::ListN,
                _ => Datatype::ListT,
            };
        }

        let varchar = |default_size: u32| -> String {
            let size = if conf.size == 0 { default_size } else { conf.size };
            format!("VARCHAR({}) NOT NULL DEFAULT '{}'", size, default_str(conf))
        };

        let options = match datatype {
            Datatype::String | Datatype::Email | Datatype::Password => {
                if conf.size > 0 && conf.size <= 3 {
                    format!("CHAR({}) NOT NULL DEFAULT '{}'", conf.size, default_str(conf))
                } else {
                    varchar(DEFAULT_STRING_COLUMN_SIZE)
                }
            }
            Datatype::Number | Datatype::Long | Datatype::Int => {
                let n = default_int(conf)?;
                let column_type = match (d, conf.size) {
                    (Dialect::Postgres, 4) => "SMALLINT",
                    (Dialect::Mysql, 4) => "TINYINT(4)",
                    (_, 4) => "TINYINT",
                    (Dialect::Mysql, s) if s > 16 => "BIGINT(20)",
                    (_, s) if s > 16 => "BIGINT",
                    (Dialect::Mysql, _) => "INT",
                    _ => "INTEGER",
                };
                format!("{} NOT NULL DEFAULT {}", column_type, n)
            }
            Datatype::Float => format!("FLOAT NOT NULL DEFAULT {}", default_float(conf)?),
            Datatype::Bool => {
                let column_type = match d {
                    Dialect::Mysql => "TINYINT(4)",
                    Dialect::Postgres => "SMALLINT",
                    Dialect::Sqlite => "TINYINT",
                };
                format!("{} NOT NULL DEFAULT {}", column_type, i64::from(default_bool(conf)))
            }
            Datatype::Text
            | Datatype::HText
            | Datatype::Url
            | Datatype::UrlList
            | Datatype::Json
            | Datatype::Code
            | Datatype::Lines => match d {
                Dialect::Mysql => "TEXT NULL".to_string(),
                _ => format!("TEXT NOT NULL DEFAULT '{}'", default_str(conf)),
            },
            Datatype::Unit => {
                let column_type = if d == Dialect::Mysql { "INT UNSIGNED" } else { "INTEGER" };
                format!("{} NOT NULL DEFAULT {}", column_type, default_int(conf)?)
            }
            Datatype::UnitList
            | Datatype::MultiList
            | Datatype::Checkbox
            | Datatype::MSelection
            | Datatype::MCheckboxes
            | Datatype::Radio => varchar(DEFAULT_LIST_COLUMN_SIZE),
            Datatype::Date => temporal("DATE", conf, d),
            Datatype::DateTime => match d {
                Dialect::Mysql => temporal("DATETIME(6)", conf, d),
                _ => temporal("TIMESTAMP", conf, d),
            },
            Datatype::Time => match d {
                Dialect::Mysql => temporal("TIME(6)", conf, d),
                _ => temporal("TIME", conf, d),
            },
            Datatype::Timestamp => match d {
                Dialect::Mysql => "TIMESTAMP NULL".to_string(),
                Dialect::Postgres => "TIMESTAMP DEFAULT NOW()".to_string(),
                Dialect::Sqlite => "TIMESTAMP DEFAULT (datetime('now','localtime'))".to_string(),
            },
            Datatype::ListT | Datatype::List => varchar(DEFAULT_STRING_COLUMN_SIZE),
            Datatype::ListN | Datatype::CodeList => {
                let column_type = if d == Dialect::Mysql { "SMALLINT(6)" } else { "SMALLINT" };
                format!("{} NOT NULL DEFAULT {}", column_type, default_int(conf)?)
            }
            Datatype::File => match d {
                Dialect::Postgres => "BYTEA".to_string(),
                _ => "BLOB".to_string(),
            },
            Datatype::ByteSize => {
                let column_type = match d {
                    Dialect::Mysql => "BIGINT(20)",
                    Dialect::Postgres => "BIGINT",
                    Dialect::Sqlite => "INTEGER",
                };
                format!("{} NOT NULL DEFAULT {}", column_type, default_int(conf)?)
            }
            Datatype::Custom(name) => {
                return Err(Error::configuration(format!(
                    "Нет отображения типа {} для колонки {}",
                    name, conf.id
                )))
            }
        };

        if conf.unique {
            Ok(format!("{} UNIQUE", options))
        } else {
            Ok(options)
        }
    }
}

impl std::fmt::Debug for DbManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbManager").field("dialect", &self.dialect).finish()
    }
}

fn first_column(out: QueryOutput) -> Vec<String> {
    out.rows
        .into_iter()
        .filter_map(|row| row.into_iter().next())
        .map(|v| v.to_text())
        .collect()
}

/// Тип колонки PostgreSQL из полного определения
fn postgres_type_of(options: &str) -> &str {
    options.split_whitespace().next().unwrap_or(options)
}

fn default_str(conf: &FieldConf) -> String {
    let text = match &conf.default {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    escape_sql_literal(&text)
}

fn default_int(conf: &FieldConf) -> Result<i64> {
    let invalid = || Error::configuration(format!("Недопустимое значение по умолчанию для {}", conf.id));
    match &conf.default {
        serde_json::Value::Null => Ok(0),
        serde_json::Value::Bool(b) => Ok(i64::from(*b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(invalid),
        serde_json::Value::String(s) if s.trim().is_empty() => Ok(0),
        serde_json::Value::String(s) => s.trim().parse().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn default_float(conf: &FieldConf) -> Result<f64> {
    match &conf.default {
        serde_json::Value::Number(n) => Ok(n.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) if !s.trim().is_empty() => s
            .trim()
            .parse()
            .map_err(|_| Error::configuration(format!("Недопустимое значение по умолчанию для {}", conf.id))),
        _ => Ok(0.0),
    }
}

fn default_bool(conf: &FieldConf) -> bool {
    match &conf.default {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        serde_json::Value::String(s) => {
            matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "checked")
        }
        _ => false,
    }
}

/// Колонка даты или времени с допускающим NULL значением по умолчанию
fn temporal(column_type: &str, conf: &FieldConf, dialect: Dialect) -> String {
    let default = match &conf.default {
        serde_json::Value::String(s) => s.trim().to_string(),
        _ => String::new(),
    };
    match default.as_str() {
        "" | "()" | "NULL" | "now" | "nowdate" | "nowtime" => format!("{} NULL", column_type),
        "NOW" if dialect == Dialect::Sqlite => format!("{} NULL", column_type),
        "NOW" => format!("{} NULL DEFAULT CURRENT_TIMESTAMP", column_type),
        value if conf.datatype == Datatype::Time => {
            format!("{} NULL DEFAULT '{}'", column_type, escape_sql_literal(value))
        }
        value => {
            let date = DbManager::convert_date(value);
            if date.is_empty() {
                format!("{} NULL", column_type)
            } else {
                format!("{} NULL DEFAULT '{}'", column_type, date)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ConnectionConfig;
    use crate::connection::Connection;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> (Connection, DbManager) {
        let conn = Connection::new(ConnectionConfig::sqlite(dir.path().join("ddl.db"))).unwrap();
        let manager = DbManager::open(&conn).unwrap();
        (conn, manager)
    }

    #[test]
    fn test_column_options_per_dialect() {
        let dir = TempDir::new().unwrap();
        let (_conn, m) = manager(&dir);
        let conf = FieldConf::new("code", Datatype::String).with_size(3).with_default("ab");
        assert_eq!(m.convert_conf_to_column_options(&conf).unwrap(), "CHAR(3) NOT NULL DEFAULT 'ab'");

        let conf = FieldConf::new("n", Datatype::Number).with_size(4).with_default("7");
        assert_eq!(m.convert_conf_to_column_options(&conf).unwrap(), "TINYINT NOT NULL DEFAULT 7");

        let conf = FieldConf::new("n", Datatype::Number).with_size(20);
        assert_eq!(m.convert_conf_to_column_options(&conf).unwrap(), "BIGINT NOT NULL DEFAULT 0");

        let conf = FieldConf::new("m", Datatype::MultiList).unique();
        assert_eq!(
            m.convert_conf_to_column_options(&conf).unwrap(),
            "VARCHAR(2048) NOT NULL DEFAULT '' UNIQUE"
        );

        let conf = FieldConf::new("d", Datatype::Date).with_default("2024-01-02");
        assert_eq!(
            m.convert_conf_to_column_options(&conf).unwrap(),
            "DATE NULL DEFAULT '2024-01-02 00:00:00'"
        );

        let conf = FieldConf::new("g", Datatype::Custom("geo".into()));
        assert!(matches!(m.convert_conf_to_column_options(&conf), Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_list_picks_text_or_number_column() {
        let dir = TempDir::new().unwrap();
        let (_conn, m) = manager(&dir);
        let text = FieldConf::new("l", Datatype::List).with_size(35).with_default("");
        assert!(m.convert_conf_to_column_options(&text).unwrap().starts_with("VARCHAR(35)"));
        let number = FieldConf::new("l", Datatype::List).with_default(0);
        assert!(m.convert_conf_to_column_options(&number).unwrap().starts_with("SMALLINT"));
    }

    #[test]
    fn test_create_and_update_structure() {
        let dir = TempDir::new().unwrap();
        let (_conn, mut m) = manager(&dir);
        let fields = vec![
            FieldConf::new("ftext", Datatype::Text),
            FieldConf::new("fnumber", Datatype::Number),
        ];
        m.update_structure("data1", &fields, None, Some("id")).unwrap();
        assert!(m.is_table("DATA1").unwrap());
        assert!(m.is_column("data1", "id").unwrap());

        let mut more = fields.clone();
        more.push(FieldConf::new("fdate", Datatype::DateTime));
        m.update_structure("data1", &more, Some(&["fnumber"]), Some("id")).unwrap();

        let columns = m.get_columns("data1", Some(&more)).unwrap();
        assert_eq!(columns.keys().collect::<Vec<_>>(), ["id", "ftext", "fnumber", "fdate"]);
        assert!(columns["id"].db.as_ref().unwrap().identity);
        assert_eq!(columns["fdate"].conf.as_ref().unwrap().datatype, Datatype::DateTime);
    }

    #[test]
    fn test_sqlite_limitations() {
        let dir = TempDir::new().unwrap();
        let (_conn, mut m) = manager(&dir);
        assert!(matches!(m.create_database("x"), Err(Error::Unsupported { .. })));
        assert!(matches!(
            m.modify_column("t", "c", "", "INTEGER"),
            Err(Error::Unsupported { .. })
        ));
        assert!(m.create_table("user", &[], true, "id").is_err());
        assert!(m.create_table("t1", &[], false, "id").is_err());
    }

    #[test]
    fn test_update_pool_tables() {
        let dir = TempDir::new().unwrap();
        let (_conn, mut m) = manager(&dir);
        let structure = Structure::from_field_confs(&[], IndexMap::new()).unwrap();
        m.update_pool_tables(&structure).unwrap();
        let tables = m.get_tables().unwrap();
        for table in ["pool_meta", "pool_files", "pool_fulltext", "pool_groups", "pool_sys"] {
            assert!(tables.iter().any(|t| t == table), "missing {}", table);
        }
        assert!(m.get_columns("pool_files", None).unwrap()["fileid"].db.as_ref().unwrap().identity);

        m.rename_table("pool_sys", "pool_sys_old").unwrap();
        m.delete_table("pool_sys_old").unwrap();
        assert!(!m.is_table("pool_sys_old").unwrap());
    }

    #[test]
    fn test_convert_date() {
        assert_eq!(DbManager::convert_date("2024-05-06 07:08:09"), "2024-05-06 07:08:09");
        assert_eq!(DbManager::convert_date("garbage"), "");
    }
}
