//! Утилиты для datapool

use crate::common::constants::*;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Проверяет, является ли имя таблицы валидным
pub fn is_valid_table_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_TABLE_NAME_LENGTH {
        return false;
    }
    is_identifier(name)
}

/// Проверяет, является ли имя колонки валидным
pub fn is_valid_column_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_COLUMN_NAME_LENGTH {
        return false;
    }
    is_identifier(name)
}

fn is_identifier(name: &str) -> bool {
    // Имя начинается с буквы или подчеркивания и содержит только буквы, цифры и подчеркивания
    match name.chars().next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Разбирает дату и время из строкового представления базы данных
///
/// Принимает `YYYY-MM-DD HH:MM:SS[.ffffff]`, вариант с `T` и чистую дату.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    parse_date(value).and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Разбирает дату (`YYYY-MM-DD`, допускает хвост со временем)
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let head = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(head, DB_DATE_FORMAT).ok()
}

/// Разбирает время суток `HH:MM[:SS[.ffffff]]`
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    for fmt in ["%H:%M:%S%.f", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(value, fmt) {
            return Some(t);
        }
    }
    None
}

/// Форматирует дату и время для записи в базу данных
pub fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(DB_DATETIME_FORMAT).to_string()
}

/// Форматирует размер в байтах в читаемый вид
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Экранирует строку для использования внутри SQL литерала в одинарных кавычках
pub fn escape_sql_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_is_valid_table_name() {
        assert!(is_valid_table_name("pool_meta"));
        assert!(is_valid_table_name("data1"));
        assert!(is_valid_table_name("_temp"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("123table"));
        assert!(!is_valid_table_name("table-name"));
        assert!(!is_valid_table_name("t; drop table x"));
    }

    #[test]
    fn test_is_valid_column_name() {
        assert!(is_valid_column_name("id"));
        assert!(is_valid_column_name("pool_unitref"));
        assert!(!is_valid_column_name(""));
        assert!(!is_valid_column_name("a b"));
    }

    #[test]
    fn test_parse_datetime_variants() {
        let dt = parse_datetime("2024-03-01 12:30:45").unwrap();
        assert_eq!(dt.hour(), 12);
        assert_eq!(dt.second(), 45);

        let dt = parse_datetime("2024-03-01 12:30:45.123456").unwrap();
        assert_eq!(dt.nanosecond(), 123_456_000);

        let dt = parse_datetime("2024-03-01T08:00:00").unwrap();
        assert_eq!(dt.hour(), 8);

        let dt = parse_datetime("2024-03-01").unwrap();
        assert_eq!(dt.hour(), 0);

        assert!(parse_datetime("").is_none());
        assert!(parse_datetime("not a date").is_none());
    }

    #[test]
    fn test_parse_time() {
        let t = parse_time("10:20:30").unwrap();
        assert_eq!((t.hour(), t.minute(), t.second()), (10, 20, 30));
        assert!(parse_time("10:20").is_some());
        assert!(parse_time("x").is_none());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
    }

    #[test]
    fn test_escape_sql_literal() {
        assert_eq!(escape_sql_literal("it's"), "it''s");
    }
}
