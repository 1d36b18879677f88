use crate::common::{record, FieldConf, Datatype, Record, Value};
use crate::connection::Dialect;
use crate::query::{JoinType, LogicalOperator, Operator, SelectBuilder, SelectOptions};
use crate::storage::Structure;
use chrono::NaiveDate;
use indexmap::IndexMap;

fn structure() -> Structure {
    let mut tables = IndexMap::new();
    tables.insert(
        "data1".to_string(),
        vec![
            FieldConf::new("ftext", Datatype::Text),
            FieldConf::new("fnumber", Datatype::Number),
            FieldConf::new("fdate", Datatype::Date),
        ],
    );
    Structure::from_field_confs(&[], tables).unwrap()
}

#[test]
fn test_like_wildcards_single_table() {
    let s = structure();
    let builder = SelectBuilder::new(&s, Dialect::Sqlite);
    let options = SelectOptions::new()
        .single_table()
        .operator("title", Operator::Like);
    let (sql, values) = builder
        .fmt_sql_select(&["id"], &record([("title", "foo*")]), "pool_meta", &options)
        .unwrap();
    assert_eq!(sql, "SELECT id FROM pool_meta WHERE title LIKE ?");
    assert_eq!(values, vec![Value::from("%foo%")]);
}

#[test]
fn test_meta_data_join_and_aliases() {
    let s = structure();
    let builder = SelectBuilder::new(&s, Dialect::Sqlite);
    let parameter = record([("pool_type", Value::from("type1")), ("fnumber", Value::Int(3))]);
    let options = SelectOptions::new().sort("title, fnumber").ascending(false).limit(10, 5);
    let (sql, values) = builder
        .fmt_sql_select(&["id", "ftext", "-count(*)"], &parameter, "data1", &options)
        .unwrap();
    assert_eq!(
        sql,
        "SELECT meta__.id,data__.ftext,count(*) FROM pool_meta AS meta__ \
         INNER JOIN data1 AS data__ ON (meta__.pool_dataref = data__.id) \
         WHERE meta__.pool_type = ? AND data__.fnumber = ? \
         ORDER BY meta__.title, data__.fnumber DESC LIMIT 10, 5"
    );
    assert_eq!(values, vec![Value::from("type1"), Value::Int(3)]);
}

#[test]
fn test_postgres_placeholders_and_limit() {
    let s = structure();
    let builder = SelectBuilder::new(&s, Dialect::Postgres);
    let options = SelectOptions::new().limit(20, 10);
    let (sql, _) = builder
        .fmt_sql_select(&["id"], &record([("id", 5i64)]), "", &options)
        .unwrap();
    assert_eq!(
        sql,
        "SELECT meta__.id FROM pool_meta AS meta__ WHERE meta__.id = %s LIMIT 10 OFFSET 20"
    );
}

#[test]
fn test_list_operators() {
    let s = structure();
    let builder = SelectBuilder::new(&s, Dialect::Sqlite);

    let options = SelectOptions::new().operator("id", Operator::In);
    let (sql, values) = builder
        .fmt_sql_select(&["id"], &record([("id", Value::list([1i64, 2, 3]))]), "", &options)
        .unwrap();
    assert!(sql.ends_with("WHERE meta__.id IN (?,?,?)"));
    assert_eq!(values.len(), 3);

    let options = SelectOptions::new().operator("id", Operator::NotIn);
    let (sql, values) = builder
        .fmt_sql_select(&["id"], &record([("id", Value::list([7i64]))]), "", &options)
        .unwrap();
    assert!(sql.ends_with("WHERE meta__.id <> ?"));
    assert_eq!(values, vec![Value::Int(7)]);

    let options = SelectOptions::new().operator("pool_stag", Operator::Between);
    let (sql, values) = builder
        .fmt_sql_select(&["id"], &record([("pool_stag", Value::list([1.0, 5.0]))]), "", &options)
        .unwrap();
    assert!(sql.ends_with("WHERE meta__.pool_stag BETWEEN ? AND ?"));
    assert_eq!(values.len(), 2);

    let (sql, values) = builder
        .fmt_sql_select(&["id"], &record([("id", Value::List(vec![]))]), "", &SelectOptions::new())
        .unwrap();
    assert!(!sql.contains("WHERE"));
    assert!(values.is_empty());

    let options = SelectOptions::new().operator("id", Operator::Gt);
    assert!(builder
        .fmt_sql_select(&["id"], &record([("id", Value::list([1i64, 2]))]), "", &options)
        .is_err());
}

#[test]
fn test_multi_like() {
    let s = structure();
    let builder = SelectBuilder::new(&s, Dialect::Sqlite);
    let options = SelectOptions::new().operator("ftext", Operator::LikeOr);
    let (sql, values) = builder
        .fmt_sql_select(
            &["id"],
            &record([("ftext", Value::list(["a", "", "b*c"]))]),
            "data1",
            &options,
        )
        .unwrap();
    assert!(sql.ends_with("WHERE (data__.ftext LIKE ? OR data__.ftext = ? OR data__.ftext LIKE ?)"));
    assert_eq!(
        values,
        vec![Value::from("%a%"), Value::from(""), Value::from("%b%c%")]
    );
}

#[test]
fn test_number_like_and_date_conditions() {
    let s = structure();
    let builder = SelectBuilder::new(&s, Dialect::Sqlite);
    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let parameter: Record = record([("fnumber", Value::Int(4)), ("fdate", Value::Date(date))]);
    let options = SelectOptions::new()
        .operator("fnumber", Operator::Like)
        .operator("fdate", Operator::Ge)
        .logical_operator(LogicalOperator::Or);
    let (sql, values) = builder
        .fmt_sql_select(&["id"], &parameter, "data1", &options)
        .unwrap();
    assert!(sql.ends_with("WHERE data__.fnumber = ? OR DATE(data__.fdate) >= ?"));
    assert_eq!(values, vec![Value::Int(4), Value::Date(date)]);
}

#[test]
fn test_skipped_parameters_and_custom_condition() {
    let s = structure();
    let builder = SelectBuilder::new(&s, Dialect::Sqlite);
    let parameter = record([("title", Value::from("")), ("pool_state", Value::Null)]);
    let options = SelectOptions::new()
        .operator("title", Operator::Like)
        .condition("meta__.pool_unitref > 0");
    let (sql, values) = builder
        .fmt_sql_select(&["id"], &parameter, "", &options)
        .unwrap();
    assert!(sql.ends_with("WHERE meta__.pool_unitref > 0"));
    assert!(values.is_empty());

    let options = SelectOptions::new().condition("meta__.pool_unitref > 0");
    let (sql, _) = builder
        .fmt_sql_select(&["id"], &record([("pool_state", 1i64)]), "", &options)
        .unwrap();
    assert!(sql.ends_with("WHERE meta__.pool_state = ? AND meta__.pool_unitref > 0"));
}

#[test]
fn test_left_join_maps_title() {
    let s = structure();
    let builder = SelectBuilder::new(&s, Dialect::Mysql);
    let options = SelectOptions::new()
        .join_type(JoinType::Left)
        .map_join_field("ftext");
    let (sql, _) = builder
        .fmt_sql_select(&["id", "ftext", "fnumber"], &Record::new(), "data1", &options)
        .unwrap();
    assert!(sql.contains(r#"IF(meta__.pool_datatbl="data1", data__.ftext, meta__.title) AS ftext"#));
    assert!(sql.contains(r#"IF(meta__.pool_datatbl="data1", data__.fnumber, NULL) AS fnumber"#));
    assert!(sql.contains("LEFT JOIN data1 AS data__"));
}

#[test]
fn test_raw_sort_and_group_by() {
    let s = structure();
    let builder = SelectBuilder::new(&s, Dialect::Sqlite);
    let options = SelectOptions::new()
        .sort("!cnt")
        .group_by("meta__.pool_type");
    let (sql, _) = builder
        .fmt_sql_select(&["pool_type", "-count(*) as cnt"], &Record::new(), "", &options)
        .unwrap();
    assert_eq!(
        sql,
        "SELECT meta__.pool_type,count(*) as cnt FROM pool_meta AS meta__ \
         GROUP BY meta__.pool_type ORDER BY cnt ASC"
    );
}

#[test]
fn test_fulltext_phrase_is_first_value() {
    let s = structure();
    let builder = SelectBuilder::new(&s, Dialect::Sqlite);
    let options = SelectOptions::new().logical_operator(LogicalOperator::Or);
    let parameter = record([("pool_type", "type1"), ("title", "x")]);
    let (sql, values) = builder
        .get_fulltext_sql("%hello%", &["id"], &parameter, "", &options)
        .unwrap();
    assert_eq!(
        sql,
        "SELECT meta__.id FROM pool_meta AS meta__ \
         LEFT JOIN pool_fulltext ON (meta__.id = pool_fulltext.id) \
         WHERE pool_fulltext.text LIKE ? AND (meta__.pool_type = ? OR meta__.title = ?)"
    );
    assert_eq!(values[0], Value::from("%hello%"));
    assert_eq!(values.len(), 3);

    let (sql, values) = builder
        .get_fulltext_sql("", &["id"], &Record::new(), "", &SelectOptions::new())
        .unwrap();
    assert!(!sql.contains("WHERE"));
    assert!(values.is_empty());
}

#[test]
fn test_operator_parsing() {
    assert_eq!("not in".parse::<Operator>().unwrap(), Operator::NotIn);
    assert_eq!("LIKE:OR".parse::<Operator>().unwrap(), Operator::LikeOr);
    assert!("~".parse::<Operator>().is_err());
    assert_eq!("".parse::<LogicalOperator>().unwrap(), LogicalOperator::And);
}
