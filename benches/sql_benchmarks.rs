//! Бенчмарки построителя SQL и преобразования значений

use criterion::{criterion_group, criterion_main, Criterion};
use datapool::common::{ConnectionConfig, Datatype, FieldConf, PoolConfig};
use datapool::query::SelectBuilder;
use datapool::{Dialect, Operator, Pool, PreloadOption, Record, SelectOptions, Structure, Value};
use indexmap::IndexMap;
use std::hint::black_box;

fn structure() -> Structure {
    let mut tables = IndexMap::new();
    tables.insert(
        "article".to_string(),
        vec![
            FieldConf::new("body", Datatype::Text),
            FieldConf::new("rating", Datatype::Number).with_size(4),
            FieldConf::new("tags", Datatype::MultiList),
            FieldConf::new("published", Datatype::DateTime),
        ],
    );
    Structure::from_field_confs(&[], tables).unwrap()
}

fn select_builder_benchmark(c: &mut Criterion) {
    let structure = structure();
    let parameter = Record::from([
        ("title".to_string(), Value::from("news*")),
        ("rating".to_string(), Value::list([Value::Int(1), Value::Int(5)])),
        ("tags".to_string(), Value::list(["rust", "sql"])),
    ]);
    let options = SelectOptions::new()
        .operator("title", Operator::Like)
        .operator("rating", Operator::Between)
        .operator("tags", Operator::LikeOr)
        .sort("published")
        .limit(0, 50);

    for dialect in [Dialect::Sqlite, Dialect::Mysql, Dialect::Postgres] {
        let builder = SelectBuilder::new(&structure, dialect);
        c.bench_function(&format!("fmt_sql_select_{:?}", dialect).to_lowercase(), |b| {
            b.iter(|| {
                builder
                    .fmt_sql_select(
                        black_box(&["id", "title", "body", "rating"]),
                        black_box(&parameter),
                        "article",
                        &options,
                    )
                    .unwrap()
            });
        });
    }
}

fn codec_benchmark(c: &mut Criterion) {
    let structure = structure();
    let tags = Value::list(["alpha", "beta", "gamma", "delta"]);
    c.bench_function("serialize_multilist", |b| {
        b.iter(|| structure.serialize("article", "tags", black_box(tags.clone())).unwrap());
    });
    let stored = structure.serialize("article", "tags", tags.clone()).unwrap();
    c.bench_function("deserialize_multilist", |b| {
        b.iter(|| structure.deserialize("article", "tags", black_box(stored.clone())).unwrap());
    });
    c.bench_function("deserialize_datetime", |b| {
        b.iter(|| {
            structure
                .deserialize("article", "published", black_box(Value::from("2024-03-05 10:20:30.000000")))
                .unwrap()
        });
    });
}

fn batch_benchmark(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().unwrap();
    let config = PoolConfig {
        root: dir.path().join("files"),
        connection: ConnectionConfig::sqlite(dir.path().join("bench.db")),
        ..PoolConfig::default()
    };
    let pool = Pool::new(config, structure()).unwrap();
    pool.init_database().unwrap();
    let mut ids = Vec::new();
    for i in 0..200 {
        let mut entry = pool.create_entry("article", 0, "bench").unwrap();
        entry.set_meta("title", format!("article {}", i)).unwrap();
        entry.set_data("rating", i % 5).unwrap();
        entry.commit("bench").unwrap();
        ids.push(entry.id());
    }

    let options = datapool::BatchOptions::new(PreloadOption::All);
    c.bench_function("get_batch_200", |b| {
        b.iter(|| pool.get_batch(black_box(&ids), &options).unwrap().len());
    });
}

criterion_group!(benches, select_builder_benchmark, codec_benchmark, batch_benchmark);
criterion_main!(benches);
