//! Жизненный цикл записи: создание, чтение, изменение и удаление

use super::common::*;
use datapool::{PreloadOption, Record, Value};

#[test]
fn test_create_read_update_delete() {
    let ctx = IntegrationTestContext::new();

    let mut entry = ctx.create_entry("data1", 0, "alice").unwrap();
    entry.set_meta("pool_type", "type1").unwrap();
    entry
        .update_data(Record::from([
            ("ftext".to_string(), Value::from("hello")),
            ("fnumber".to_string(), Value::Int(42)),
        ]))
        .unwrap();
    entry.commit("alice").unwrap();
    let id = entry.id();
    assert!(id >= 1);

    let mut loaded = ctx.get_entry(id, PreloadOption::All).unwrap().unwrap();
    assert_eq!(loaded.get_meta_field("pool_type", false).unwrap(), Value::from("type1"));
    assert_eq!(loaded.get_data_field("ftext", false).unwrap(), Value::from("hello"));
    assert_eq!(loaded.get_data_field("fnumber", false).unwrap(), Value::Int(42));
    let now = ctx.get_db_date(None).unwrap();
    let created = match loaded.get_meta_field("pool_create", false).unwrap() {
        Value::DateTime(dt) => dt,
        other => panic!("pool_create is {:?}", other),
    };
    assert!((now - created).num_seconds().abs() < 60);

    loaded.set_data("ftext", "world").unwrap();
    loaded.commit("bob").unwrap();

    let mut reread = ctx.get_entry(id, PreloadOption::All).unwrap().unwrap();
    assert_eq!(reread.get_data_field("ftext", false).unwrap(), Value::from("world"));
    assert_eq!(reread.get_meta_field("pool_changedby", false).unwrap(), Value::from("bob"));
    let changed = match reread.get_meta_field("pool_change", false).unwrap() {
        Value::DateTime(dt) => dt,
        other => panic!("pool_change is {:?}", other),
    };
    assert!(changed >= created);

    let data_ref = reread.data_ref().unwrap();
    reread.write_fulltext("hello world").unwrap();
    ctx.add_group(id, "alice", "editors").unwrap();
    ctx.commit().unwrap();

    assert!(ctx.delete_entry(id).unwrap());
    ctx.commit().unwrap();
    assert!(ctx.get_entry(id, PreloadOption::All).unwrap().is_none());
    for table in ["pool_meta", "pool_files", "pool_fulltext", "pool_groups"] {
        assert_eq!(ctx.count_rows(table, "id", id), 0, "rows left in {}", table);
    }
    assert_eq!(ctx.count_rows("data1", "id", data_ref), 0);
    assert!(!ctx.delete_entry(id).unwrap());
}

#[test]
fn test_meta_and_data_reference_each_other() {
    let ctx = IntegrationTestContext::new();
    let a = ctx.create("data1", "a", 0);
    let b = ctx.create("data2", "b", 0);

    for (id, table) in [(a, "data1"), (b, "data2")] {
        let mut entry = ctx.get_entry(id, PreloadOption::Meta).unwrap().unwrap();
        assert_eq!(entry.data_tbl().unwrap(), table);
        let data_ref = entry.data_ref().unwrap();
        assert_eq!(ctx.count_rows(table, "id", data_ref), 1);
    }
}

#[test]
fn test_failed_commit_rolls_back() {
    let ctx = IntegrationTestContext::new();
    let id = ctx.create("data1", "stable", 0);

    let mut entry = ctx.get_entry(id, PreloadOption::All).unwrap().unwrap();
    entry.set_meta("title", "changed").unwrap();
    entry.set_data("fnumber", "not a number").unwrap();
    assert!(entry.commit("tester").is_err());

    let mut fresh = ctx.get_entry(id, PreloadOption::Meta).unwrap().unwrap();
    assert_eq!(fresh.get_meta_field("title", true).unwrap(), Value::from("stable"));
}

#[test]
fn test_update_fields_autoinsert_is_idempotent() {
    let ctx = IntegrationTestContext::new();
    let data = Record::from([("fstr".to_string(), Value::from("same"))]);
    let (_, inserted) = ctx.update_fields("data2", 40, data.clone(), "id", true).unwrap();
    assert_eq!(inserted, 40);
    ctx.update_fields("data2", 40, data, "id", true).unwrap();
    ctx.commit().unwrap();
    assert_eq!(ctx.count_rows("data2", "id", 40), 1);
}
