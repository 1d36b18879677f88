//! CLI интерфейс пула данных
//!
//! Обслуживание пула из командной строки: создание таблиц, просмотр схемы,
//! статистика, дерево записей и поиск.

use crate::common::{ConnectionConfig, PoolConfig, PreloadOption, Record, Value};
use crate::core::Pool;
use crate::query::SelectOptions;
use crate::storage::{Structure, StructureConfig};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use std::path::PathBuf;

/// DataPool - типизированный иерархический пул объектов поверх SQL
#[derive(Parser)]
#[command(name = "datapool")]
#[command(about = "DataPool - typed hierarchical object pool on top of SQL")]
#[command(version)]
pub struct Cli {
    /// Конфигурация пула (TOML); переменные окружения DATAPOOL_* имеют приоритет
    #[arg(short, long, value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Описание таблиц данных (TOML)
    #[arg(short, long, value_name = "STRUCTURE")]
    pub structure: Option<PathBuf>,

    /// Файл SQLite, если база не задана в конфигурации
    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// Фильтр логирования в синтаксисе RUST_LOG
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Записать трассу в формате Chrome в файл
    #[arg(long, value_name = "FILE")]
    pub trace: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Создать или обновить системные таблицы и таблицы данных
    Init,

    /// Показать таблицы данных и количество строк
    Tables,

    /// Показать колонки таблицы в базе и в структуре
    Columns {
        /// Имя таблицы
        table: String,
    },

    /// Показать статистику пула
    Stats,

    /// Показать дерево записей
    Tree {
        /// Корневая запись (0 - весь пул)
        #[arg(short, long, default_value = "0")]
        base: i64,

        /// Поле сортировки
        #[arg(long, default_value = "pool_sort")]
        sort: String,
    },

    /// Показать поля записи
    Get {
        id: i64,
    },

    /// Найти файлы записей
    Files {
        /// Точное имя файла
        #[arg(long)]
        filename: Option<String>,

        /// Запись-владелец
        #[arg(long)]
        id: Option<i64>,

        #[arg(long, default_value = "100")]
        max: usize,
    },

    /// Полнотекстовый поиск; `*` заменяет любые символы
    Fulltext {
        phrase: String,

        #[arg(long, default_value = "100")]
        max: usize,
    },
}

impl Cli {
    /// Загружает конфигурацию: файл, затем окружение, затем аргументы
    pub fn load_config(&self) -> Result<PoolConfig> {
        let file = match &self.config {
            Some(path) => PoolConfig::from_file(path)
                .map_err(|e| anyhow!("{}: {}", path.display(), e))?,
            None => PoolConfig::default(),
        };
        let env = PoolConfig::from_env().map_err(|e| anyhow!("environment: {}", e))?;
        let mut config = file.merge(env);
        if let Some(db) = &self.db {
            config.connection = ConnectionConfig::sqlite(db);
        }
        config.validate().map_err(|e| anyhow!(e))?;
        Ok(config)
    }

    /// Загружает структуру таблиц данных
    pub fn load_structure(&self) -> Result<Structure> {
        let config = match &self.structure {
            Some(path) => StructureConfig::from_file(path)
                .with_context(|| format!("reading {}", path.display()))?,
            None => StructureConfig::default(),
        };
        Ok(config.into_structure()?)
    }

    /// Открывает пул по конфигурации
    pub fn open_pool(&self) -> Result<Pool> {
        let pool = Pool::new(self.load_config()?, self.load_structure()?)?;
        Ok(pool)
    }

    /// Выполняет команду
    pub fn execute(&self) -> Result<()> {
        let Some(command) = &self.command else {
            println!("DataPool v{}", crate::VERSION);
            println!("Use --help for usage");
            return Ok(());
        };
        let pool = self.open_pool()?;
        let result = match command {
            Commands::Init => init(&pool),
            Commands::Tables => tables(&pool),
            Commands::Columns { table } => columns(&pool, table),
            Commands::Stats => stats(&pool),
            Commands::Tree { base, sort } => tree(&pool, *base, sort),
            Commands::Get { id } => get(&pool, *id),
            Commands::Files { filename, id, max } => files(&pool, filename.as_deref(), *id, *max),
            Commands::Fulltext { phrase, max } => fulltext(&pool, phrase, *max),
        };
        pool.close();
        result
    }
}

fn init(pool: &Pool) -> Result<()> {
    pool.init_database()?;
    let tables: Vec<&str> = pool.structure().data_tables().collect();
    tracing::info!(tables = tables.len(), "pool tables updated");
    println!("Pool tables updated, data tables: {}", tables.join(", "));
    Ok(())
}

fn tables(pool: &Pool) -> Result<()> {
    for table in pool.structure().data_tables() {
        println!("{:<32} {}", table, pool.get_count_entries(Some(table))?);
    }
    Ok(())
}

fn columns(pool: &Pool, table: &str) -> Result<()> {
    let mut manager = pool.db_manager()?;
    let columns = manager.get_columns(table, pool.structure().field_confs(table))?;
    manager.close()?;
    if columns.is_empty() {
        bail!("table {} does not exist", table);
    }
    for (name, info) in &columns {
        let db = info
            .db
            .as_ref()
            .map_or_else(|| "-".to_string(), |c| c.column_type.clone());
        let conf = info
            .conf
            .as_ref()
            .map_or_else(|| "-".to_string(), |c| c.datatype.to_string());
        println!("{:<24} {:<24} {}", name, db, conf);
    }
    Ok(())
}

fn stats(pool: &Pool) -> Result<()> {
    let mut counts = IndexMap::new();
    for table in Structure::system_tables() {
        counts.insert(table.name.to_string(), pool.get_count_entries(Some(table.name))?);
    }
    for table in pool.structure().data_tables() {
        counts.insert(table.to_string(), pool.get_count_entries(Some(table))?);
    }
    println!("{}", serde_json::to_string_pretty(&counts)?);
    Ok(())
}

fn tree(pool: &Pool, base: i64, sort: &str) -> Result<()> {
    let tree = pool.get_tree(&["title", "pool_type"], sort, base, "")?;
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}

fn get(pool: &Pool, id: i64) -> Result<()> {
    let Some(mut entry) = pool.get_entry(id, PreloadOption::All)? else {
        bail!("entry {} not found", id);
    };
    let mut out = serde_json::Map::new();
    out.insert("meta".into(), record_json(&entry.get_meta()?));
    if let Some(data) = entry.get_data()? {
        out.insert("data".into(), record_json(&data));
    }
    let files = entry.file_records(Record::new())?;
    out.insert("files".into(), serde_json::to_value(files)?);
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn files(pool: &Pool, filename: Option<&str>, id: Option<i64>, max: usize) -> Result<()> {
    let mut parameter = Record::new();
    if let Some(filename) = filename {
        parameter.insert("filename".to_string(), Value::from(filename));
    }
    if let Some(id) = id {
        parameter.insert("id".to_string(), Value::Int(id));
    }
    for file in pool.search_files(&parameter, "fileid", 0, max, true)? {
        println!("{:>8} {:>8} {:<16} {:<32} {}", file.fileid, file.id, file.filekey, file.filename, file.path);
    }
    Ok(())
}

fn fulltext(pool: &Pool, phrase: &str, max: usize) -> Result<()> {
    let options = SelectOptions::new().sort("id").limit(0, max);
    let rows = pool.search_fulltext(phrase, &["id", "title", "pool_type"], &Record::new(), "", &options)?;
    for row in &rows {
        println!("{}", record_json(row));
    }
    tracing::debug!(phrase, found = rows.len(), "fulltext search");
    Ok(())
}

fn record_json(record: &Record) -> serde_json::Value {
    serde_json::Value::Object(record.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}
