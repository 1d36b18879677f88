//! Пакетная загрузка записей

use super::common::*;
use datapool::{BatchOptions, PreloadOption, Value};

#[test]
fn test_batch_follows_requested_order() {
    let ctx = IntegrationTestContext::new();
    let a = ctx.create("data1", "a", 0);
    let b = ctx.create("data2", "b", 0);
    let c = ctx.create("data1", "c", 0);
    let d = ctx.create("data2", "d", 0);

    let options = BatchOptions::new(PreloadOption::All);
    let ids: Vec<_> = ctx
        .get_batch(&[c, a, d, b], &options)
        .unwrap()
        .iter()
        .map(|e| e.id())
        .collect();
    assert_eq!(ids, vec![c, a, d, b]);

    assert!(ctx.delete_entry(b).unwrap());
    ctx.commit().unwrap();
    let entries = ctx.get_batch(&[c, a, d, b], &options).unwrap();
    let ids: Vec<_> = entries.iter().map(|e| e.id()).collect();
    assert_eq!(ids, vec![c, a, d]);
    assert_eq!(entries[0].meta.get("title"), Some(&Value::from("c")));
}

#[test]
fn test_batch_with_known_meta() {
    let ctx = IntegrationTestContext::new();
    let a = ctx.create("data1", "a", 0);
    let b = ctx.create("data2", "b", 0);

    let meta = ctx
        .get_batch(&[b, a], &BatchOptions::new(PreloadOption::Meta))
        .unwrap()
        .into_iter()
        .map(|mut e| e.get_meta().unwrap())
        .collect();
    let options = BatchOptions::new(PreloadOption::All).meta(meta);
    let mut entries = ctx.get_batch(&[b, a], &options).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id(), b);
    assert!(entries[0].get_data().unwrap().unwrap().contains_key("fstr"));
    assert!(entries[1].get_data().unwrap().unwrap().contains_key("ftext"));
}
