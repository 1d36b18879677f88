//! Диалекты SQL поддерживаемых СУБД
//!
//! Все различия в синтаксисе между SQLite, MySQL и PostgreSQL, которые нужны
//! построителю запросов и пулу, собраны здесь.

use crate::common::{escape_sql_literal, Backend, Value};
use std::borrow::Cow;

/// Способ обхода дерева записей
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeStrategy {
    /// Последовательные SELECT по уровням
    Recursive,
    /// Один SELECT с развернутыми self-join до максимальной глубины
    Unrolled,
}

/// Диалект SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Sqlite,
    Mysql,
    Postgres,
}

impl From<Backend> for Dialect {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Sqlite => Dialect::Sqlite,
            Backend::Mysql => Dialect::Mysql,
            Backend::Postgres => Dialect::Postgres,
        }
    }
}

impl Dialect {
    /// Плейсхолдер параметра в SQL, который строит пул
    pub fn placeholder(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "?",
            Dialect::Mysql | Dialect::Postgres => "%s",
        }
    }

    /// Ограничение выборки
    pub fn format_limit(&self, start: usize, max: usize) -> String {
        match self {
            Dialect::Postgres => format!("LIMIT {} OFFSET {}", max, start),
            Dialect::Sqlite | Dialect::Mysql => format!("LIMIT {}, {}", start, max),
        }
    }

    /// Запрос последнего выданного автоинкрементного id
    pub fn last_insert_id_sql(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "SELECT last_insert_rowid()",
            Dialect::Mysql => "SELECT LAST_INSERT_ID()",
            Dialect::Postgres => "SELECT LASTVAL()",
        }
    }

    /// Вставка пустой строки, выдающая новый id
    pub fn insert_empty_row_sql(&self, table: &str) -> String {
        match self {
            Dialect::Sqlite => format!("INSERT INTO {} (id) VALUES(null)", table),
            Dialect::Mysql => format!("INSERT INTO {} () VALUES()", table),
            Dialect::Postgres => format!("INSERT INTO {} DEFAULT VALUES", table),
        }
    }

    /// Литерал значения для доверенных участков SQL
    pub fn fmt_param(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            other => {
                let text = other.to_text();
                match self {
                    Dialect::Mysql => {
                        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
                    }
                    Dialect::Sqlite | Dialect::Postgres => {
                        format!("'{}'", escape_sql_literal(&text))
                    }
                }
            }
        }
    }

    /// Условная проекция поля при внешнем соединении
    pub fn conditional_field(&self, condition: &str, then: &str, otherwise: &str) -> String {
        match self {
            Dialect::Mysql => format!("IF({}, {}, {})", condition, then, otherwise),
            Dialect::Sqlite | Dialect::Postgres => {
                format!("CASE WHEN {} THEN {} ELSE {} END", condition, then, otherwise)
            }
        }
    }

    pub fn tree_strategy(&self) -> TreeStrategy {
        match self {
            Dialect::Mysql => TreeStrategy::Unrolled,
            Dialect::Sqlite | Dialect::Postgres => TreeStrategy::Recursive,
        }
    }

    /// Переписывает плейсхолдеры `%s` в родной формат драйвера
    ///
    /// Плейсхолдеры внутри строковых литералов не затрагиваются.
    pub fn native_sql<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        if *self == Dialect::Sqlite || !sql.contains("%s") {
            return Cow::Borrowed(sql);
        }
        let mut out = String::with_capacity(sql.len() + 8);
        let mut index = 0;
        let mut quote: Option<char> = None;
        let mut chars = sql.chars().peekable();
        while let Some(c) = chars.next() {
            match quote {
                Some(q) => {
                    if c == q {
                        quote = None;
                    }
                    out.push(c);
                }
                None if c == '\'' || c == '"' => {
                    quote = Some(c);
                    out.push(c);
                }
                None if c == '%' && chars.peek() == Some(&'s') => {
                    chars.next();
                    index += 1;
                    match self {
                        Dialect::Postgres => {
                            out.push('$');
                            out.push_str(&index.to_string());
                        }
                        _ => out.push('?'),
                    }
                }
                None => out.push(c),
            }
        }
        Cow::Owned(out)
    }
}

/// Инструкция изменяет данные или схему
pub fn is_write_statement(sql: &str) -> bool {
    let keyword = sql
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("")
        .to_ascii_uppercase();
    !matches!(
        keyword.as_str(),
        "SELECT" | "PRAGMA" | "SHOW" | "EXPLAIN" | "WITH" | "DESCRIBE" | "BEGIN" | "COMMIT"
            | "ROLLBACK" | ""
    )
}
