//! Обход дерева записей

use super::common::*;

#[test]
fn test_contained_ids_and_parent_path() {
    let ctx = IntegrationTestContext::new();
    let r = ctx.create("data1", "r", 0);
    let c1 = ctx.create("data1", "c1", r);
    let c2 = ctx.create("data1", "c2", r);
    let g1 = ctx.create("data2", "g1", c1);
    let g2 = ctx.create("data2", "g2", c1);

    let mut contained = ctx.get_contained_ids(r, "id", "").unwrap();
    contained.sort_unstable();
    let mut expected = vec![c1, c2, g1, g2];
    expected.sort_unstable();
    assert_eq!(contained, expected);

    assert_eq!(ctx.get_parent_path(g1).unwrap(), vec![r, c1]);
    assert_eq!(ctx.get_parent_titles(g1).unwrap(), vec!["r".to_string(), "c1".to_string()]);

    let tree = ctx.get_tree(&["title"], "title", r, "").unwrap();
    let json = serde_json::to_value(&tree).unwrap();
    assert_eq!(json["items"][0]["title"], "c1");
    assert_eq!(json["items"][0]["items"].as_array().unwrap().len(), 2);
}

#[test]
fn test_deep_chain() {
    let ctx = IntegrationTestContext::new();
    let mut parent = 0;
    let mut chain = Vec::new();
    for level in 0..12 {
        parent = ctx.create("data2", &format!("level{}", level), parent);
        chain.push(parent);
    }
    let leaf = *chain.last().unwrap();
    let path = ctx.get_parent_path(leaf).unwrap();
    assert_eq!(path.len(), 10);
    assert_eq!(path.last(), Some(&chain[10]));
    assert_eq!(ctx.get_contained_ids(chain[0], "id", "").unwrap(), chain[1..].to_vec());
}
