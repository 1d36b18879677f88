//! Общие утилиты для тестирования

use crate::common::{ConnectionConfig, Datatype, FieldConf, PoolConfig};
use crate::core::Pool;
use crate::storage::Structure;
use indexmap::IndexMap;
use std::io::{self, Read};
use std::ops::Deref;
use std::path::Path;
use tempfile::TempDir;

/// Структура с таблицами `data1` и `data2`
pub fn test_structure() -> Structure {
    let mut tables = IndexMap::new();
    tables.insert(
        "data1".to_string(),
        vec![
            FieldConf::new("ftext", Datatype::Text),
            FieldConf::new("fnumber", Datatype::Number).with_size(8),
            FieldConf::new("fdate", Datatype::DateTime),
            FieldConf::new("fmselect", Datatype::MultiList).with_size(100),
            FieldConf::new("flist", Datatype::List).with_size(35),
            FieldConf::new("fbool", Datatype::Bool),
        ],
    );
    tables.insert(
        "data2".to_string(),
        vec![
            FieldConf::new("fstr", Datatype::String).with_size(100),
            FieldConf::new("ftext", Datatype::Text),
        ],
    );
    Structure::from_field_confs(&[], tables).expect("test structure")
}

/// Конфигурация пула на SQLite внутри `dir`
pub fn test_config(dir: &Path) -> PoolConfig {
    PoolConfig {
        root: dir.join("files"),
        connection: ConnectionConfig::sqlite(dir.join("pool.db")),
        ..PoolConfig::default()
    }
}

/// Пул с созданными таблицами во временном каталоге
pub struct TestPool {
    pub pool: Pool,
    pub dir: TempDir,
}

impl TestPool {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let pool = Pool::new(test_config(dir.path()), test_structure()).expect("pool");
        pool.init_database().expect("init database");
        Self { pool, dir }
    }
}

impl Default for TestPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for TestPool {
    type Target = Pool;

    fn deref(&self) -> &Pool {
        &self.pool
    }
}

/// Поток, который отдает `ok` байтов и затем падает
pub struct FailingReader {
    pub ok: usize,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.ok == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader failed"));
        }
        let n = buf.len().min(self.ok);
        buf[..n].fill(b'x');
        self.ok -= n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failing_reader() {
        let mut reader = FailingReader { ok: 3 };
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert!(reader.read(&mut buf).is_err());
    }

    #[test]
    fn test_structure_tables() {
        let s = test_structure();
        assert!(s.contains("data1"));
        assert!(s.contains("data2"));
    }
}
