use crate::common::{ConnectionConfig, Datatype, FieldConf, Value};
use crate::connection::Connection;
use crate::storage::{DbManager, FileStorage, Structure, StructureConfig};
use indexmap::IndexMap;
use tempfile::TempDir;

fn structure(fields: Vec<FieldConf>) -> Structure {
    let mut tables = IndexMap::new();
    tables.insert("data1".to_string(), fields);
    Structure::from_field_confs(&[], tables).unwrap()
}

#[test]
fn test_new_field_keeps_rows() {
    let dir = TempDir::new().unwrap();
    let conn = Connection::new(ConnectionConfig::sqlite(dir.path().join("schema.db"))).unwrap();

    let mut m = DbManager::open(&conn).unwrap();
    let first = structure(vec![FieldConf::new("ftext", Datatype::Text)]);
    m.update_pool_tables(&first).unwrap();
    m.update_data_tables(&first, None).unwrap();
    m.close().unwrap();

    conn.connect().unwrap();
    conn.run("INSERT INTO data1 (ftext) VALUES (?)", &[Value::from("kept")]).unwrap();
    conn.commit().unwrap();

    let mut m = DbManager::open(&conn).unwrap();
    let second = structure(vec![
        FieldConf::new("ftext", Datatype::Text),
        FieldConf::new("fnumber", Datatype::Number).with_size(8),
    ]);
    m.update_data_tables(&second, None).unwrap();
    assert!(m.is_column("data1", "fnumber").unwrap());
    m.close().unwrap();

    let out = conn.run("SELECT ftext, fnumber FROM data1", &[]).unwrap();
    assert_eq!(out.rows.len(), 1);
    assert_eq!(out.rows[0][0], Value::from("kept"));
    assert_eq!(out.rows[0][1], Value::Int(0));
}

#[test]
fn test_structure_from_toml_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("structure.toml");
    std::fs::write(
        &path,
        r#"
        code_page = "utf-8"

        [[meta]]
        id = "keywords"
        datatype = "multilist"

        [[tables.article]]
        id = "body"
        datatype = "htext"
        "#,
    )
    .unwrap();

    let s = StructureConfig::from_file(&path).unwrap().into_structure().unwrap();
    assert!(s.is_meta_field("keywords"));
    assert!(s.is_meta_field("pool_unitref"));
    assert_eq!(s.get("article").unwrap(), ["body"]);
    assert!(StructureConfig::from_file(&dir.path().join("missing.toml")).is_err());
}

#[test]
fn test_file_layout_matches_entry_ids() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::new(dir.path(), false, 1024);
    let rel = FileStorage::relative_path_for(98765, "icon", "png");
    assert_eq!(rel, "8700/65/098765_icon.png");
    let abs = storage.abs_path(&rel).unwrap();
    assert!(abs.starts_with(dir.path()));
}
