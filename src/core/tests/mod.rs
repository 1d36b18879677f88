//! Тесты для модулей ядра пула данных

pub mod tree_tests;

use crate::common::test_utils::TestPool;
use crate::common::EntryId;

/// Создает и фиксирует запись с заголовком
pub fn create_titled(pool: &TestPool, table: &str, title: &str, parent: EntryId) -> EntryId {
    let mut entry = pool.create_entry(table, 0, "tester").unwrap();
    entry.set_meta("title", title).unwrap();
    entry.set_meta("pool_type", "type1").unwrap();
    entry.set_meta("pool_unitref", parent).unwrap();
    entry.commit("tester").unwrap();
    entry.id()
}
