//! Структура пула: таблицы, типы полей и преобразование значений
//!
//! Реестр описывает, какие колонки принадлежат таблице метаданных и
//! таблицам данных, и преобразует значения между представлением
//! приложения и представлением базы данных по абстрактному типу поля.

use crate::common::{
    is_valid_column_name, is_valid_table_name, parse_date, parse_datetime, parse_time, CodePage,
    Datatype, Error, FieldConf, Record, Result, Value, DB_DATE_FORMAT, DB_TIME_FORMAT,
    FILES_TABLE, FULLTEXT_TABLE, GROUPS_TABLE, JSON_PREFIX, META_TABLE, SYSTEM_TABLE,
};
use crate::common::utils::format_datetime;
use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Пользовательский преобразователь значения: `(значение, имя поля)`
pub type Codec = Arc<dyn Fn(Value, &str) -> Result<Value> + Send + Sync>;

/// Минимальный набор метаданных для быстрой загрузки
pub const DEFAULT_STD_META: &[&str] = &[
    "id",
    "title",
    "pool_type",
    "pool_state",
    "pool_unitref",
    "pool_stag",
    "pool_filename",
    "pool_datatbl",
    "pool_dataref",
    "pool_create",
    "pool_change",
];

/// Описание системной таблицы пула
#[derive(Debug, Clone)]
pub struct SystemTable {
    pub name: &'static str,
    /// Колонка-идентификатор с автоинкрементом
    pub identity: Option<&'static str>,
    pub fields: Vec<FieldConf>,
}

lazy_static! {
    static ref SYSTEM_META_FIELDS: Vec<FieldConf> = vec![
        FieldConf::new("id", Datatype::Number).with_size(8).readonly(),
        FieldConf::new("title", Datatype::String).with_size(255).with_default(""),
        FieldConf::new("pool_type", Datatype::List).with_size(35).required(),
        FieldConf::new("pool_filename", Datatype::String).with_size(255).with_default(""),
        FieldConf::new("pool_create", Datatype::DateTime).readonly(),
        FieldConf::new("pool_change", Datatype::DateTime).readonly(),
        FieldConf::new("pool_createdby", Datatype::String).with_size(40).with_default(""),
        FieldConf::new("pool_changedby", Datatype::String).with_size(40).with_default(""),
        FieldConf::new("pool_wfp", Datatype::List).with_size(35).with_default(""),
        FieldConf::new("pool_wfa", Datatype::List).with_size(35).with_default(""),
        FieldConf::new("pool_state", Datatype::Number).with_size(4).with_default(1),
        FieldConf::new("pool_unitref", Datatype::Number).with_size(8).with_default(0),
        FieldConf::new("pool_stag", Datatype::Float).with_default(0.0),
        FieldConf::new("pool_sort", Datatype::Number).with_size(8).with_default(0),
        FieldConf::new("pool_category", Datatype::List).with_size(100).with_default(""),
        FieldConf::new("pool_dataref", Datatype::Number).with_size(8).readonly(),
        FieldConf::new("pool_datatbl", Datatype::String).with_size(35).readonly(),
    ];

    static ref SYSTEM_TABLES: Vec<SystemTable> = vec![
        SystemTable {
            name: META_TABLE,
            identity: Some("id"),
            fields: SYSTEM_META_FIELDS.clone(),
        },
        SystemTable {
            name: FILES_TABLE,
            identity: Some("fileid"),
            fields: vec![
                FieldConf::new("fileid", Datatype::Number).with_size(8),
                FieldConf::new("id", Datatype::Number).with_size(8).with_default(0),
                FieldConf::new("filekey", Datatype::String).with_size(35).with_default(""),
                FieldConf::new("filename", Datatype::String).with_size(255).with_default(""),
                FieldConf::new("path", Datatype::String).with_size(255).with_default(""),
                FieldConf::new("size", Datatype::Number).with_size(8).with_default(0),
                FieldConf::new("extension", Datatype::String).with_size(5).with_default(""),
                FieldConf::new("version", Datatype::String).with_size(5).with_default(""),
            ],
        },
        SystemTable {
            name: FULLTEXT_TABLE,
            identity: None,
            fields: vec![
                FieldConf::new("id", Datatype::Number).with_size(8).with_default(0),
                FieldConf::new("text", Datatype::Text),
                FieldConf::new("files", Datatype::Text),
            ],
        },
        SystemTable {
            name: GROUPS_TABLE,
            identity: None,
            fields: vec![
                FieldConf::new("id", Datatype::Number).with_size(8).with_default(0),
                FieldConf::new("userid", Datatype::String).with_size(35).with_default(""),
                FieldConf::new("groupid", Datatype::String).with_size(20).with_default(""),
            ],
        },
        SystemTable {
            name: SYSTEM_TABLE,
            identity: None,
            fields: vec![
                FieldConf::new("id", Datatype::String).with_size(50).with_default(""),
                FieldConf::new("value", Datatype::Text),
                FieldConf::new("ts", Datatype::Number).with_size(8).with_default(0),
            ],
        },
    ];
}

/// Схема пула в формате TOML
///
/// ```toml
/// std_meta = ["id", "title", "pool_type"]
///
/// [[tables.data1]]
/// id = "ftext"
/// datatype = "text"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Дополнительные поля метаданных
    pub meta: Vec<FieldConf>,
    /// Таблицы данных и их поля
    pub tables: IndexMap<String, Vec<FieldConf>>,
    pub std_meta: Option<Vec<String>>,
    pub code_page: Option<String>,
}

impl StructureConfig {
    /// Загружает схему из TOML файла
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::configuration(format!("{}: {}", path.display(), e)))
    }

    /// Строит реестр структуры
    pub fn into_structure(self) -> Result<Structure> {
        let mut meta = Structure::system_meta_fields().to_vec();
        for conf in self.meta {
            match meta.iter_mut().find(|m| m.id == conf.id) {
                Some(existing) => *existing = conf,
                None => meta.push(conf),
            }
        }
        let mut structure = Structure::from_field_confs(&meta, self.tables)?;
        if let Some(std_meta) = self.std_meta {
            structure.std_meta = std_meta;
        }
        if let Some(code_page) = self.code_page {
            structure.code_page = CodePage::from_name(&code_page)
                .ok_or_else(|| Error::configuration(format!("Unsupported code page: {}", code_page)))?;
        }
        structure.validate()?;
        Ok(structure)
    }
}

/// Реестр таблиц и типов полей пула
#[derive(Clone)]
pub struct Structure {
    tables: IndexMap<String, Vec<String>>,
    fieldtypes: HashMap<String, HashMap<String, Datatype>>,
    confs: HashMap<String, Vec<FieldConf>>,
    std_meta: Vec<String>,
    code_page: CodePage,
    serializers: HashMap<String, Codec>,
    deserializers: HashMap<String, Codec>,
}

impl Default for Structure {
    fn default() -> Self {
        let mut tables = IndexMap::new();
        tables.insert(
            META_TABLE.to_string(),
            vec!["pool_dataref".to_string(), "pool_datatbl".to_string()],
        );
        Self {
            tables,
            fieldtypes: HashMap::new(),
            confs: HashMap::new(),
            std_meta: Vec::new(),
            code_page: CodePage::Utf8,
            serializers: HashMap::new(),
            deserializers: HashMap::new(),
        }
    }
}

impl fmt::Debug for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Structure")
            .field("tables", &self.tables)
            .field("std_meta", &self.std_meta)
            .field("code_page", &self.code_page)
            .finish()
    }
}

impl Structure {
    /// Создает реестр из списков полей и карты типов
    ///
    /// Таблица метаданных обязательна; `pool_dataref` и `pool_datatbl`
    /// добавляются в нее всегда.
    pub fn init(
        tables: IndexMap<String, Vec<String>>,
        fieldtypes: HashMap<String, HashMap<String, Datatype>>,
        std_meta: Vec<String>,
        code_page: &str,
    ) -> Result<Self> {
        let mut tables = tables;
        let meta = tables
            .get_mut(META_TABLE)
            .ok_or_else(|| Error::configuration(format!("Таблица {} не описана", META_TABLE)))?;
        for forced in ["pool_dataref", "pool_datatbl"] {
            if !meta.iter().any(|f| f == forced) {
                meta.push(forced.to_string());
            }
        }
        let code_page = CodePage::from_name(code_page)
            .ok_or_else(|| Error::configuration(format!("Unsupported code page: {}", code_page)))?;

        let structure = Self {
            tables,
            fieldtypes,
            confs: HashMap::new(),
            std_meta,
            code_page,
            serializers: HashMap::new(),
            deserializers: HashMap::new(),
        };
        structure.validate()?;
        Ok(structure)
    }

    /// Создает реестр из описаний полей
    pub fn from_field_confs(meta: &[FieldConf], tables: IndexMap<String, Vec<FieldConf>>) -> Result<Self> {
        let mut confs = HashMap::new();
        let mut fieldtypes: HashMap<String, HashMap<String, Datatype>> = HashMap::new();
        let mut names: IndexMap<String, Vec<String>> = IndexMap::new();

        let meta = if meta.is_empty() { Self::system_meta_fields() } else { meta };
        let mut all = IndexMap::new();
        all.insert(META_TABLE.to_string(), meta.to_vec());
        for (table, fields) in tables {
            if table == META_TABLE {
                return Err(Error::configuration(format!(
                    "{} нельзя описывать как таблицу данных",
                    META_TABLE
                )));
            }
            all.insert(table, fields);
        }

        for (table, fields) in all {
            names.insert(table.clone(), fields.iter().map(|f| f.id.clone()).collect());
            fieldtypes.insert(
                table.clone(),
                fields
                    .iter()
                    .map(|f| (f.id.clone(), f.datatype.clone()))
                    .collect::<HashMap<_, _>>(),
            );
            confs.insert(table, fields);
        }

        let std_meta = DEFAULT_STD_META
            .iter()
            .filter(|f| names[META_TABLE].iter().any(|m| m == *f))
            .map(|f| f.to_string())
            .collect();
        let mut structure = Self::init(names, fieldtypes, std_meta, "utf-8")?;
        structure.confs = confs;
        Ok(structure)
    }

    /// Встроенные поля таблицы метаданных
    pub fn system_meta_fields() -> &'static [FieldConf] {
        &SYSTEM_META_FIELDS
    }

    /// Встроенные системные таблицы
    pub fn system_tables() -> &'static [SystemTable] {
        &SYSTEM_TABLES
    }

    /// Проверяет имена таблиц и колонок и согласованность реестра
    pub fn validate(&self) -> Result<()> {
        for (table, fields) in &self.tables {
            if !is_valid_table_name(table) {
                return Err(Error::configuration(format!("Недопустимое имя таблицы: {}", table)));
            }
            for field in fields {
                if !is_valid_column_name(field) {
                    return Err(Error::configuration(format!(
                        "Недопустимое имя колонки {}.{}",
                        table, field
                    )));
                }
            }
        }
        for table in self.fieldtypes.keys() {
            if !self.tables.contains_key(table) {
                return Err(Error::configuration(format!(
                    "Типы полей заданы для неизвестной таблицы {}",
                    table
                )));
            }
        }
        for field in &self.std_meta {
            if !self.is_meta_field(field) {
                return Err(Error::configuration(format!(
                    "Поле {} не входит в таблицу метаданных",
                    field
                )));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.tables.len() <= 1 && self.fieldtypes.is_empty()
    }

    /// Поля таблицы
    pub fn get(&self, table: &str) -> Option<&[String]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Поля зарегистрированной таблицы или ошибка конфигурации
    pub fn ensure_table(&self, table: &str) -> Result<&[String]> {
        self.get(table)
            .ok_or_else(|| Error::configuration(format!("Таблица {} не зарегистрирована", table)))
    }

    /// Имена всех таблиц, начиная с таблицы метаданных
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Имена таблиц данных
    pub fn data_tables(&self) -> impl Iterator<Item = &str> {
        self.tables().filter(|t| *t != META_TABLE)
    }

    pub fn meta_fields(&self) -> &[String] {
        self.get(META_TABLE).unwrap_or_default()
    }

    pub fn is_meta_field(&self, field: &str) -> bool {
        self.meta_fields().iter().any(|f| f == field)
    }

    pub fn std_meta(&self) -> &[String] {
        &self.std_meta
    }

    pub fn code_page(&self) -> CodePage {
        self.code_page
    }

    /// Тип поля, если известен
    pub fn datatype(&self, table: &str, field: &str) -> Option<&Datatype> {
        self.fieldtypes.get(table)?.get(field)
    }

    /// Описания полей таблицы, если реестр построен из них
    pub fn field_confs(&self, table: &str) -> Option<&[FieldConf]> {
        self.confs.get(table).map(Vec::as_slice)
    }

    /// Регистрирует преобразователь записи для типа
    pub fn register_serializer(&mut self, datatype: impl Into<String>, codec: Codec) {
        self.serializers.insert(datatype.into(), codec);
    }

    /// Регистрирует преобразователь чтения для типа
    pub fn register_deserializer(&mut self, datatype: impl Into<String>, codec: Codec) {
        self.deserializers.insert(datatype.into(), codec);
    }

    /// Преобразует значение приложения для записи в базу данных
    pub fn serialize(&self, table: &str, field: &str, value: Value) -> Result<Value> {
        match self.datatype(table, field) {
            None => Ok(self.serialize_untyped(value)),
            Some(datatype) => match self.serializers.get(datatype.name()) {
                Some(codec) => codec(value, field),
                None => self.serialize_typed(datatype, field, value),
            },
        }
    }

    /// Преобразует значение из базы данных в значение приложения
    pub fn deserialize(&self, table: &str, field: &str, value: Value) -> Result<Value> {
        match self.datatype(table, field) {
            None => self.deserialize_untyped(value),
            Some(datatype) => match self.deserializers.get(datatype.name()) {
                Some(codec) => codec(value, field),
                None => self.deserialize_typed(datatype, field, value),
            },
        }
    }

    /// Преобразует все поля записи для записи в базу данных
    pub fn serialize_record(&self, table: &str, record: Record) -> Result<Record> {
        record
            .into_iter()
            .map(|(field, value)| {
                let value = self.serialize(table, &field, value)?;
                Ok((field, value))
            })
            .collect()
    }

    /// Преобразует все поля записи, прочитанной из базы данных
    pub fn deserialize_record(&self, table: &str, record: Record) -> Result<Record> {
        record
            .into_iter()
            .map(|(field, value)| {
                let value = self.deserialize(table, &field, value)?;
                Ok((field, value))
            })
            .collect()
    }

    fn decode(&self, value: Value) -> Value {
        match value {
            Value::Bytes(bytes) => Value::Str(self.code_page.decode(&bytes)),
            other => other,
        }
    }

    fn serialize_untyped(&self, value: Value) -> Value {
        match value {
            Value::DateTime(dt) => Value::Str(format_datetime(&dt)),
            Value::Date(d) => Value::Str(d.format(DB_DATE_FORMAT).to_string()),
            Value::Time(t) => Value::Str(t.format(DB_TIME_FORMAT).to_string()),
            Value::List(_) | Value::Json(_) => {
                let items = match value {
                    Value::List(items) => Value::List(items.into_iter().map(|v| self.decode(v)).collect()),
                    other => other,
                };
                Value::Str(format!("{}{}", JSON_PREFIX, items.to_json()))
            }
            other => self.decode(other),
        }
    }

    fn deserialize_untyped(&self, value: Value) -> Result<Value> {
        match self.decode(value) {
            Value::Str(s) if s.starts_with(JSON_PREFIX) => {
                let json: serde_json::Value = serde_json::from_str(&s[JSON_PREFIX.len()..])?;
                Ok(Value::from_json(json))
            }
            other => Ok(other),
        }
    }

    fn serialize_typed(&self, datatype: &Datatype, field: &str, value: Value) -> Result<Value> {
        let invalid = |v: &Value| {
            Error::validation(format!("Недопустимое значение '{}' для поля {} ({})", v, field, datatype))
        };
        let value = match datatype {
            dt if dt.is_integer() => match value {
                Value::Null => Value::Null,
                Value::Str(ref s) if s.trim().is_empty() => Value::Null,
                other => Value::Int(other.as_i64().ok_or_else(|| invalid(&other))?),
            },
            Datatype::Float => match value {
                Value::Null => Value::Null,
                Value::Str(ref s) if s.trim().is_empty() => Value::Null,
                other => Value::Float(other.as_f64().ok_or_else(|| invalid(&other))?),
            },
            Datatype::Bool => Value::Int(i64::from(bool_from(&value))),
            Datatype::Date | Datatype::DateTime | Datatype::Timestamp => match value {
                Value::DateTime(dt) => Value::Str(format_datetime(&dt)),
                Value::Date(d) => Value::Str(d.format(DB_DATE_FORMAT).to_string()),
                Value::Int(_) | Value::Float(_) => {
                    let dt = from_timestamp(&value).ok_or_else(|| invalid(&value))?;
                    Value::Str(format_datetime(&dt))
                }
                Value::Str(s) if s.trim().is_empty() => Value::Null,
                Value::Null => Value::Null,
                other => Value::Str(self.decode(other).to_text()),
            },
            Datatype::Time => match value {
                Value::Time(t) => Value::Str(t.format(DB_TIME_FORMAT).to_string()),
                Value::DateTime(dt) => Value::Str(dt.time().format(DB_TIME_FORMAT).to_string()),
                Value::Str(s) if s.trim().is_empty() => Value::Null,
                Value::Null => Value::Null,
                other => Value::Str(self.decode(other).to_text()),
            },
            dt if dt.is_single_choice() => match value {
                Value::List(items) => items
                    .into_iter()
                    .next()
                    .map(|v| self.decode(v))
                    .unwrap_or_else(|| Value::Str(String::new())),
                other => self.decode(other),
            },
            dt if dt.is_multi_value() => {
                if !value.is_truthy() {
                    Value::Str(String::new())
                } else {
                    let items = match value {
                        Value::List(items) => items.into_iter().map(|v| self.decode(v)).collect(),
                        Value::Json(serde_json::Value::Array(items)) => {
                            items.into_iter().map(Value::from_json).collect()
                        }
                        other => vec![self.decode(other)],
                    };
                    Value::Str(Value::List(items).to_json().to_string())
                }
            }
            Datatype::Json => match value {
                v if !v.is_truthy() => Value::Str(String::new()),
                Value::Str(s) => Value::Str(s),
                other => Value::Str(other.to_json().to_string()),
            },
            Datatype::File => value,
            _ => self.decode(value),
        };
        Ok(value)
    }

    fn deserialize_typed(&self, datatype: &Datatype, field: &str, value: Value) -> Result<Value> {
        let value = self.decode(value);
        let value = match datatype {
            dt if dt.is_integer() => match value {
                Value::Null => Value::Null,
                Value::Str(ref s) if s.trim().is_empty() => Value::Null,
                other => other.as_i64().map(Value::Int).unwrap_or(other),
            },
            Datatype::Float => match value {
                Value::Null => Value::Null,
                Value::Str(ref s) if s.trim().is_empty() => Value::Null,
                other => other.as_f64().map(Value::Float).unwrap_or(other),
            },
            Datatype::Bool => match value {
                Value::Null => Value::Null,
                other => Value::Bool(bool_from(&other)),
            },
            Datatype::Date | Datatype::DateTime | Datatype::Timestamp => match value {
                Value::DateTime(dt) => Value::DateTime(dt),
                Value::Date(d) => d.and_hms_opt(0, 0, 0).map(Value::DateTime).unwrap_or(Value::Null),
                Value::Str(s) => parse_datetime(&s).map(Value::DateTime).unwrap_or(Value::Null),
                Value::Int(_) | Value::Float(_) => {
                    from_timestamp(&value).map(Value::DateTime).unwrap_or(Value::Null)
                }
                _ => Value::Null,
            },
            Datatype::Time => match value {
                Value::Time(t) => Value::Time(t),
                Value::DateTime(dt) => Value::Time(dt.time()),
                Value::Str(s) => parse_time(&s)
                    .or_else(|| parse_datetime(&s).map(|dt| dt.time()))
                    .map(Value::Time)
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            },
            dt if dt.is_multi_value() => {
                let items = split_multi_value(value)?;
                if *dt == Datatype::UnitList {
                    Value::List(items.iter().filter_map(Value::as_i64).map(Value::Int).collect())
                } else {
                    Value::List(
                        items
                            .into_iter()
                            .map(|v| match v {
                                Value::Str(s) => Value::Str(s),
                                other => Value::Str(other.to_text()),
                            })
                            .collect(),
                    )
                }
            }
            Datatype::Json => match value {
                v if !v.is_truthy() => Value::Null,
                Value::Str(s) => Value::Json(serde_json::from_str(&s).map_err(|e| {
                    Error::validation(format!("Поле {} содержит некорректный JSON: {}", field, e))
                })?),
                Value::List(items) => Value::Json(Value::List(items).to_json()),
                other => other,
            },
            _ => value,
        };
        Ok(value)
    }
}

/// Логическое значение из произвольного ввода
fn bool_from(value: &Value) -> bool {
    match value {
        Value::Str(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "1" | "yes" | "checked" | "on"
        ),
        other => other.is_truthy(),
    }
}

fn from_timestamp(value: &Value) -> Option<NaiveDateTime> {
    let ts = value.as_f64()?;
    let secs = ts.trunc() as i64;
    let nanos = ((ts - ts.trunc()) * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
}

/// Разбирает сохраненный список: JSON массив, `_json_` или строки через перевод строки
fn split_multi_value(value: Value) -> Result<Vec<Value>> {
    let text = match value {
        Value::Null => return Ok(Vec::new()),
        Value::List(items) => return Ok(items),
        Value::Json(serde_json::Value::Array(items)) => {
            return Ok(items.into_iter().map(Value::from_json).collect())
        }
        Value::Str(s) => s,
        other => return Ok(vec![other]),
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let payload = trimmed.strip_prefix(JSON_PREFIX).unwrap_or(trimmed);
    if payload.starts_with('[') {
        if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(payload) {
            return Ok(items.into_iter().map(Value::from_json).collect());
        }
    }
    if text.contains('\n') {
        return Ok(text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(|line| Value::Str(line.to_string()))
            .collect());
    }
    Ok(vec![Value::Str(text)])
}

/// Разбирает значение по умолчанию описания поля в значение приложения
pub fn default_value(conf: &FieldConf) -> Value {
    match &conf.default {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::String(s) if conf.datatype.is_temporal() => match conf.datatype {
            Datatype::Time => parse_time(s).map(Value::Time).unwrap_or(Value::Null),
            Datatype::Date => parse_date(s).map(Value::Date).unwrap_or(Value::Null),
            _ => parse_datetime(s).map(Value::DateTime).unwrap_or(Value::Null),
        },
        other => Value::from_json(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::record;

    fn structure() -> Structure {
        let mut tables = IndexMap::new();
        tables.insert(
            "data1".to_string(),
            vec![
                FieldConf::new("ftext", Datatype::Text),
                FieldConf::new("fnumber", Datatype::Number),
                FieldConf::new("fdate", Datatype::DateTime),
                FieldConf::new("fmselect", Datatype::MultiList),
                FieldConf::new("funitlist", Datatype::UnitList),
                FieldConf::new("flist", Datatype::List),
                FieldConf::new("fbool", Datatype::Bool),
                FieldConf::new("fjson", Datatype::Json),
                FieldConf::new("ftime", Datatype::Time),
            ],
        );
        Structure::from_field_confs(&[], tables).unwrap()
    }

    #[test]
    fn test_meta_forced_fields() {
        let mut tables = IndexMap::new();
        tables.insert(META_TABLE.to_string(), vec!["id".to_string(), "title".to_string()]);
        let s = Structure::init(tables, HashMap::new(), vec![], "utf-8").unwrap();
        assert_eq!(s.meta_fields(), ["id", "title", "pool_dataref", "pool_datatbl"]);
        assert!(s.is_meta_field("pool_datatbl"));
    }

    #[test]
    fn test_init_requires_meta_table() {
        let tables = IndexMap::new();
        let err = Structure::init(tables, HashMap::new(), vec![], "utf-8").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_std_meta_must_be_meta_fields() {
        let mut tables = IndexMap::new();
        tables.insert(META_TABLE.to_string(), vec!["id".to_string()]);
        let err = Structure::init(tables, HashMap::new(), vec!["ftext".to_string()], "utf-8");
        assert!(err.is_err());
    }

    #[test]
    fn test_multilist_round_trip() {
        let s = structure();
        let value = Value::list(["a", "b", "c"]);
        let stored = s.serialize("data1", "fmselect", value.clone()).unwrap();
        assert_eq!(stored, Value::from(r#"["a","b","c"]"#));
        assert_eq!(s.deserialize("data1", "fmselect", stored).unwrap(), value);

        let legacy = s.deserialize("data1", "fmselect", Value::from("a\nb\nc")).unwrap();
        assert_eq!(legacy, value);
        assert_eq!(s.deserialize("data1", "fmselect", Value::from("")).unwrap(), Value::List(vec![]));
        assert_eq!(
            s.deserialize("data1", "fmselect", Value::from("single")).unwrap(),
            Value::list(["single"])
        );
    }

    #[test]
    fn test_unitlist_reads_integers() {
        let s = structure();
        let stored = s.serialize("data1", "funitlist", Value::list([1i64, 2, 3])).unwrap();
        assert_eq!(stored, Value::from("[1,2,3]"));
        assert_eq!(
            s.deserialize("data1", "funitlist", Value::from(r#"["4","5"]"#)).unwrap(),
            Value::list([4i64, 5])
        );
    }

    #[test]
    fn test_scalar_coercions() {
        let s = structure();
        assert_eq!(s.serialize("data1", "fnumber", Value::from("42")).unwrap(), Value::Int(42));
        assert!(s.serialize("data1", "fnumber", Value::from("x")).is_err());
        assert_eq!(s.serialize("data1", "fbool", Value::from("Checked")).unwrap(), Value::Int(1));
        assert_eq!(s.serialize("data1", "fbool", Value::from("no")).unwrap(), Value::Int(0));
        assert_eq!(s.deserialize("data1", "fbool", Value::Int(1)).unwrap(), Value::Bool(true));
        assert_eq!(
            s.serialize("data1", "flist", Value::list(["x", "y"])).unwrap(),
            Value::from("x")
        );
    }

    #[test]
    fn test_datetime_round_trip() {
        let s = structure();
        let dt = parse_datetime("2024-03-04 05:06:07.123456").unwrap();
        let stored = s.serialize("data1", "fdate", Value::DateTime(dt)).unwrap();
        assert_eq!(stored, Value::from("2024-03-04 05:06:07.123456"));
        assert_eq!(s.deserialize("data1", "fdate", stored).unwrap(), Value::DateTime(dt));

        let t = parse_time("10:11:12").unwrap();
        let stored = s.serialize("data1", "ftime", Value::Time(t)).unwrap();
        assert_eq!(s.deserialize("data1", "ftime", stored).unwrap(), Value::Time(t));
    }

    #[test]
    fn test_json_field() {
        let s = structure();
        let json = serde_json::json!({"a": [1, 2]});
        let stored = s.serialize("data1", "fjson", Value::Json(json.clone())).unwrap();
        assert_eq!(s.deserialize("data1", "fjson", stored).unwrap(), Value::Json(json));
        assert_eq!(s.deserialize("data1", "fjson", Value::from("")).unwrap(), Value::Null);
    }

    #[test]
    fn test_untyped_json_prefix() {
        let s = structure();
        let stored = s.serialize("data1", "unknown", Value::list(["a", "b"])).unwrap();
        assert_eq!(stored, Value::from(r#"_json_["a","b"]"#));
        assert_eq!(s.deserialize("data1", "unknown", stored).unwrap(), Value::list(["a", "b"]));
    }

    #[test]
    fn test_callbacks_take_precedence() {
        let mut s = structure();
        s.register_serializer("text", Arc::new(|v: Value, _: &str| Ok(Value::Str(v.to_text().to_uppercase()))));
        let rec = s
            .serialize_record("data1", record([("ftext", Value::from("abc")), ("fnumber", Value::from("7"))]))
            .unwrap();
        assert_eq!(rec["ftext"], Value::from("ABC"));
        assert_eq!(rec["fnumber"], Value::Int(7));
    }

    #[test]
    fn test_structure_config_from_toml() {
        let config: StructureConfig = toml::from_str(
            r#"
            [[tables.data1]]
            id = "ftext"
            datatype = "text"

            [[tables.data1]]
            id = "fnumber"
            datatype = "number"
            size = 4
            "#,
        )
        .unwrap();
        let s = config.into_structure().unwrap();
        assert_eq!(s.get("data1").unwrap(), ["ftext", "fnumber"]);
        assert_eq!(s.datatype("data1", "fnumber"), Some(&Datatype::Number));
        assert_eq!(s.data_tables().collect::<Vec<_>>(), ["data1"]);
        assert!(s.std_meta().contains(&"pool_type".to_string()));
    }
}
