//! Трассировка SQL пула данных
//!
//! Уровни детализации:
//! - 0: выключена
//! - 1: только инструкции
//! - 2: инструкции и параметры
//! - 3: инструкции, параметры и время выполнения

use crate::common::{Result, Value};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use parking_lot::Mutex;

/// Запись трассировки
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlTraceEntry {
    /// Временная метка (микросекунды с эпохи Unix)
    pub timestamp: u64,
    /// Текст инструкции
    pub sql: String,
    /// Параметры
    pub values: Option<Vec<Value>>,
    /// Время выполнения (микросекунды)
    pub duration_us: Option<u64>,
    /// Текст ошибки, если инструкция завершилась неудачно
    pub error: Option<String>,
}

impl SqlTraceEntry {
    /// Форматирует запись для лог-файла
    pub fn format(&self) -> String {
        let mut line = format!("[{}] {}", self.timestamp, self.sql.replace('\n', " "));
        if let Some(values) = &self.values {
            let rendered: Vec<String> = values.iter().map(|v| format!("{:?}", v)).collect();
            line.push_str(&format!(" -- [{}]", rendered.join(", ")));
        }
        if let Some(us) = self.duration_us {
            line.push_str(&format!(" ({} us)", us));
        }
        if let Some(error) = &self.error {
            line.push_str(&format!(" !! {}", error));
        }
        line
    }
}

/// Трассировщик SQL
pub struct SqlTrace {
    level: u8,
    path: Option<PathBuf>,
    writer: Mutex<Option<BufWriter<File>>>,
    statements: AtomicU64,
}

impl SqlTrace {
    /// Создает трассировщик; при заданном файле записи дописываются в него
    pub fn new(level: u8, path: Option<&Path>) -> Result<Self> {
        let writer = match (level, path) {
            (0, _) | (_, None) => None,
            (_, Some(path)) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Some(BufWriter::new(file))
            }
        };
        Ok(Self {
            level,
            path: path.map(Path::to_path_buf),
            writer: Mutex::new(writer),
            statements: AtomicU64::new(0),
        })
    }

    /// Выключенный трассировщик
    pub fn disabled() -> Self {
        Self {
            level: 0,
            path: None,
            writer: Mutex::new(None),
            statements: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.level > 0
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Количество записанных инструкций
    pub fn statements(&self) -> u64 {
        self.statements.load(Ordering::Relaxed)
    }

    /// Записывает выполненную инструкцию
    pub fn record(&self, sql: &str, values: &[Value], duration: Duration, error: Option<&str>) {
        if self.level == 0 {
            return;
        }
        let entry = SqlTraceEntry {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_micros() as u64,
            sql: sql.to_string(),
            values: (self.level >= 2).then(|| values.to_vec()),
            duration_us: (self.level >= 3).then(|| duration.as_micros() as u64),
            error: error.map(str::to_string),
        };
        self.statements.fetch_add(1, Ordering::Relaxed);

        let mut writer = self.writer.lock();
        match writer.as_mut() {
            Some(out) => {
                if let Err(e) = writeln!(out, "{}", entry.format()).and_then(|_| out.flush()) {
                    log::warn!("SQL trace write failed: {}", e);
                }
            }
            None => log::debug!(target: "datapool::sql", "{}", entry.format()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_trace_levels() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sql.log");
        let trace = SqlTrace::new(2, Some(&path)).unwrap();
        trace.record(
            "SELECT id\nFROM pool_meta WHERE id = ?",
            &[Value::Int(4)],
            Duration::from_millis(2),
            None,
        );
        assert_eq!(trace.statements(), 1);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("SELECT id FROM pool_meta WHERE id = ?"));
        assert!(content.contains("Int(4)"));
        assert!(!content.contains(" us)"));
    }

    #[test]
    fn test_disabled_trace_records_nothing() {
        let trace = SqlTrace::disabled();
        trace.record("SELECT 1", &[], Duration::ZERO, None);
        assert_eq!(trace.statements(), 0);
        assert!(!trace.is_enabled());
    }
}
