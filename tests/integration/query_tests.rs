//! Построитель SQL и поиск

use super::common::*;
use datapool::{Operator, Record, SelectOptions, Value};

#[test]
fn test_like_with_wildcards() {
    let ctx = IntegrationTestContext::new();
    let hit = ctx.create("data1", "xfooy", 0);
    let exact = ctx.create("data1", "foo", 0);
    ctx.create("data1", "bar", 0);

    let parameter = Record::from([("title".to_string(), Value::from("foo*"))]);
    let options = SelectOptions::new()
        .operator("title", Operator::Like)
        .single_table();
    let (sql, values) = ctx
        .fmt_sql_select(&["id"], &parameter, "pool_meta", &options)
        .unwrap();
    assert_eq!(sql.matches('?').count(), 1);
    assert_eq!(values, vec![Value::from("%foo%")]);

    let mut ids: Vec<i64> = ctx
        .query(&sql, &values)
        .unwrap()
        .into_iter()
        .filter_map(|row| row.first().and_then(Value::as_i64))
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![hit, exact]);
}

#[test]
fn test_search_joins_meta_and_data() {
    let ctx = IntegrationTestContext::new();
    for (title, number) in [("low", 1), ("mid", 5), ("high", 9)] {
        let mut entry = ctx.create_entry("data1", 0, "tester").unwrap();
        entry.set_meta("title", title).unwrap();
        entry.set_data("fnumber", number).unwrap();
        entry.commit("tester").unwrap();
    }

    let parameter = Record::from([("fnumber".to_string(), Value::list([Value::Int(2), Value::Int(9)]))]);
    let options = SelectOptions::new()
        .operator("fnumber", Operator::Between)
        .sort("fnumber")
        .ascending(false);
    let rows = ctx
        .search(&["title", "fnumber"], &parameter, "data1", &options)
        .unwrap();
    let titles: Vec<String> = rows.iter().map(|r| r["title"].to_text()).collect();
    assert_eq!(titles, vec!["high", "mid"]);
}

#[test]
fn test_fulltext_phrase() {
    let ctx = IntegrationTestContext::new();
    let a = ctx.create("data1", "a", 0);
    let b = ctx.create("data1", "b", 0);
    for (id, text) in [(a, "quick brown fox"), (b, "lazy dog")] {
        let entry = ctx.get_entry(id, datapool::PreloadOption::Skip).unwrap().unwrap();
        entry.write_fulltext(text).unwrap();
    }
    ctx.commit().unwrap();

    let rows = ctx
        .search_fulltext("brown*fox", &["id"], &Record::new(), "", &SelectOptions::new())
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], Value::Int(a));
    assert!(ctx
        .search_fulltext("cat", &["id"], &Record::new(), "", &SelectOptions::new())
        .unwrap()
        .is_empty());
}
