//! Общие утилиты для интеграционных тестов

use datapool::common::{ConnectionConfig, Datatype, FieldConf, PoolConfig};
use datapool::{EntryId, Pool, Structure, Value};
use indexmap::IndexMap;
use std::ops::Deref;
use std::path::PathBuf;
use tempfile::TempDir;

/// Пул на SQLite во временном каталоге с таблицами `data1` и `data2`
pub struct IntegrationTestContext {
    pub pool: Pool,
    pub temp_dir: TempDir,
}

impl IntegrationTestContext {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let temp_dir = TempDir::new().expect("temp dir");
        let pool = Pool::new(Self::config(&temp_dir), Self::structure()).expect("pool");
        pool.init_database().expect("init database");
        Self { pool, temp_dir }
    }

    pub fn config(dir: &TempDir) -> PoolConfig {
        PoolConfig {
            root: dir.path().join("files"),
            connection: ConnectionConfig::sqlite(dir.path().join("pool.db")),
            ..PoolConfig::default()
        }
    }

    pub fn structure() -> Structure {
        let mut tables = IndexMap::new();
        tables.insert(
            "data1".to_string(),
            vec![
                FieldConf::new("ftext", Datatype::Text),
                FieldConf::new("fnumber", Datatype::Number).with_size(8),
                FieldConf::new("fdate", Datatype::DateTime),
                FieldConf::new("fmselect", Datatype::MultiList).with_size(100),
            ],
        );
        tables.insert(
            "data2".to_string(),
            vec![FieldConf::new("fstr", Datatype::String).with_size(100)],
        );
        Structure::from_field_confs(&[], tables).expect("structure")
    }

    pub fn files_root(&self) -> PathBuf {
        self.temp_dir.path().join("files")
    }

    /// Создает и фиксирует запись `type1`
    pub fn create(&self, table: &str, title: &str, parent: EntryId) -> EntryId {
        let mut entry = self.pool.create_entry(table, 0, "tester").expect("create");
        entry.set_meta("pool_type", "type1").expect("type");
        entry.set_meta("title", title).expect("title");
        entry.set_meta("pool_unitref", parent).expect("parent");
        entry.commit("tester").expect("commit");
        entry.id()
    }

    /// Количество строк таблицы с `column = id`
    pub fn count_rows(&self, table: &str, column: &str, id: EntryId) -> i64 {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?", table, column);
        self.pool
            .query(&sql, &[Value::Int(id)])
            .expect("count")
            .first()
            .and_then(|row| row.first())
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }
}

impl Default for IntegrationTestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for IntegrationTestContext {
    type Target = Pool;

    fn deref(&self) -> &Pool {
        &self.pool
    }
}
