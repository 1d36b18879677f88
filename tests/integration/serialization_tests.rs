//! Преобразование значений полей при записи и чтении

use super::common::*;
use datapool::{PreloadOption, Value};

#[test]
fn test_multilist_stored_as_json() {
    let ctx = IntegrationTestContext::new();
    let mut entry = ctx.create_entry("data1", 0, "tester").unwrap();
    entry.set_data("fmselect", Value::list(["a", "b", "c"])).unwrap();
    entry.commit("tester").unwrap();
    let id = entry.id();
    let data_ref = entry.data_ref().unwrap();

    let raw = ctx
        .query("SELECT fmselect FROM data1 WHERE id = ?", &[Value::Int(data_ref)])
        .unwrap();
    assert_eq!(raw[0][0], Value::from(r#"["a","b","c"]"#));

    let mut loaded = ctx.get_entry(id, PreloadOption::All).unwrap().unwrap();
    assert_eq!(
        loaded.get_data_field("fmselect", false).unwrap(),
        Value::list(["a", "b", "c"])
    );
}

#[test]
fn test_multilist_legacy_lines() {
    let ctx = IntegrationTestContext::new();
    let mut entry = ctx.create_entry("data1", 0, "tester").unwrap();
    entry.commit("tester").unwrap();
    let id = entry.id();
    let data_ref = entry.data_ref().unwrap();

    ctx.execute(
        "UPDATE data1 SET fmselect = ? WHERE id = ?",
        &[Value::from("a\nb\nc"), Value::Int(data_ref)],
    )
    .unwrap();
    ctx.commit().unwrap();

    let mut loaded = ctx.get_entry(id, PreloadOption::All).unwrap().unwrap();
    assert_eq!(
        loaded.get_data_field("fmselect", false).unwrap(),
        Value::list(["a", "b", "c"])
    );
}

#[test]
fn test_datetime_and_number_coercion() {
    let ctx = IntegrationTestContext::new();
    let mut entry = ctx.create_entry("data1", 0, "tester").unwrap();
    entry.set_data("fnumber", "17").unwrap();
    entry.set_data("fdate", "2024-03-05 10:20:30").unwrap();
    entry.commit("tester").unwrap();

    let mut loaded = ctx.get_entry(entry.id(), PreloadOption::All).unwrap().unwrap();
    assert_eq!(loaded.get_data_field("fnumber", false).unwrap(), Value::Int(17));
    match loaded.get_data_field("fdate", false).unwrap() {
        Value::DateTime(dt) => assert_eq!(dt.to_string(), "2024-03-05 10:20:30"),
        other => panic!("fdate is {:?}", other),
    }
}

#[test]
fn test_system_value_round_trip() {
    let ctx = IntegrationTestContext::new();
    let value = Value::list([Value::Int(1), Value::from("two")]);
    ctx.store_system_value("settings", &value).unwrap();
    ctx.commit().unwrap();
    assert_eq!(ctx.load_system_value("settings").unwrap(), Some(value));
}
