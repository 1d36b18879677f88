//! Тесты дерева записей и путей к корню

use super::create_titled;
use crate::common::test_utils::TestPool;
use crate::common::{EntryId, Value};

struct Tree {
    root: EntryId,
    c1: EntryId,
    c2: EntryId,
    g1: EntryId,
    g2: EntryId,
}

fn build(pool: &TestPool) -> Tree {
    let root = create_titled(pool, "data1", "Root", 0);
    let c1 = create_titled(pool, "data1", "Child1", root);
    let c2 = create_titled(pool, "data1", "Child2", root);
    let g1 = create_titled(pool, "data2", "Grand1", c1);
    let g2 = create_titled(pool, "data2", "Grand2", c1);
    Tree { root, c1, c2, g1, g2 }
}

#[test]
fn test_contained_ids_depth_first() {
    let pool = TestPool::new();
    let t = build(&pool);
    assert_eq!(
        pool.get_contained_ids(t.root, "id", "").unwrap(),
        vec![t.c1, t.g1, t.g2, t.c2]
    );
    assert_eq!(pool.get_contained_ids(t.c1, "id", "").unwrap(), vec![t.g1, t.g2]);
    assert!(pool.get_contained_ids(t.g1, "id", "").unwrap().is_empty());
}

#[test]
fn test_contained_ids_with_parameter() {
    let pool = TestPool::new();
    let t = build(&pool);
    let ids = pool
        .get_contained_ids(t.root, "id", "title <> 'Child2'")
        .unwrap();
    assert_eq!(ids, vec![t.c1, t.g1, t.g2]);
}

#[test]
fn test_tree_values() {
    let pool = TestPool::new();
    let t = build(&pool);
    let tree = pool.get_tree(&["title"], "title", 0, "").unwrap();
    assert_eq!(tree.id, 0);
    assert_eq!(tree.items.len(), 1);
    let child = tree.find(t.c1).unwrap();
    assert_eq!(child.values.get("title"), Some(&Value::from("Child1")));
    assert_eq!(child.items.len(), 2);
}

#[test]
fn test_parent_path_and_titles() {
    let pool = TestPool::new();
    let t = build(&pool);
    assert_eq!(pool.get_parent_path(t.g1).unwrap(), vec![t.root, t.c1]);
    assert_eq!(pool.get_parent_path(t.root).unwrap(), Vec::<EntryId>::new());
    assert_eq!(
        pool.get_parent_titles(t.g2).unwrap(),
        vec!["Root".to_string(), "Child1".to_string()]
    );
    assert!(pool.get_parent_titles(t.root).unwrap().is_empty());
}

#[test]
fn test_delete_recursive() {
    let pool = TestPool::new();
    let t = build(&pool);
    assert_eq!(pool.delete_entry_recursive(t.c1).unwrap(), 3);
    pool.commit().unwrap();
    assert!(!pool.is_id_used(t.g1).unwrap());
    assert!(pool.is_id_used(t.c2).unwrap());
    assert_eq!(pool.get_contained_ids(t.root, "id", "").unwrap(), vec![t.c2]);
}
