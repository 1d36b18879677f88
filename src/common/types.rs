//! Базовые типы данных для datapool

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Идентификатор записи пула
pub type EntryId = i64;

/// Строка таблицы: имя колонки → значение, порядок колонок сохраняется
pub type Record = IndexMap<String, Value>;

/// Значение поля
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// NULL значение
    #[default]
    Null,
    /// Булево значение
    Bool(bool),
    /// Целое число
    Int(i64),
    /// Число с плавающей точкой
    Float(f64),
    /// Строка
    Str(String),
    /// Двоичные данные
    Bytes(Vec<u8>),
    /// Дата и время
    DateTime(NaiveDateTime),
    /// Дата
    Date(NaiveDate),
    /// Время суток
    Time(NaiveTime),
    /// Список значений
    List(Vec<Value>),
    /// Произвольный JSON
    Json(serde_json::Value),
}

impl Value {
    /// Создает список из итератора значений
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Значение считается истинным (непустым)
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Json(j) => !j.is_null(),
            Value::DateTime(_) | Value::Date(_) | Value::Time(_) => true,
        }
    }

    /// Целочисленное представление; строки разбираются
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Str(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
            Value::Bytes(b) => std::str::from_utf8(b).ok()?.trim().parse().ok(),
            Value::Json(j) => j.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Json(j) => j.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Строковое представление для вывода и сериализации без типа
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Str(s) => s.clone(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Value::DateTime(dt) => crate::common::utils::format_datetime(dt),
            Value::Date(d) => d.format(crate::common::constants::DB_DATE_FORMAT).to_string(),
            Value::Time(t) => t.format(crate::common::constants::DB_TIME_FORMAT).to_string(),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::List(_) | Value::Json(_) => self.to_json().to_string(),
        }
    }

    /// Преобразует значение в JSON
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Null => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int(i) => J::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(J::Number)
                .unwrap_or(J::Null),
            Value::Str(s) => J::String(s.clone()),
            Value::Bytes(b) => J::String(String::from_utf8_lossy(b).into_owned()),
            Value::DateTime(_) | Value::Date(_) | Value::Time(_) => J::String(self.to_text()),
            Value::List(items) => J::Array(items.iter().map(Value::to_json).collect()),
            Value::Json(j) => j.clone(),
        }
    }

    /// Создает значение из JSON; массивы становятся списками
    pub fn from_json(json: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match json {
            J::Null => Value::Null,
            J::Bool(b) => Value::Bool(b),
            J::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            J::String(s) => Value::Str(s),
            J::Array(items) => Value::List(items.into_iter().map(Value::from_json).collect()),
            obj @ J::Object(_) => Value::Json(obj),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            other => write!(f, "{}", other.to_text()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from_json)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Str(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Создает запись из пар (ключ, значение)
pub fn record<K, V, I>(pairs: I) -> Record
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Абстрактный тип данных поля
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Datatype {
    String,
    Email,
    Password,
    Number,
    Long,
    Int,
    Float,
    Bool,
    Text,
    HText,
    Url,
    UrlList,
    Json,
    Code,
    Lines,
    Unit,
    UnitList,
    List,
    ListT,
    ListN,
    CodeList,
    Radio,
    MultiList,
    Checkbox,
    MSelection,
    MCheckboxes,
    Date,
    DateTime,
    Time,
    Timestamp,
    File,
    ByteSize,
    /// Тип, обрабатываемый только пользовательскими кодеками
    Custom(String),
}

impl Datatype {
    /// Имя типа в конфигурации
    pub fn name(&self) -> &str {
        match self {
            Datatype::String => "string",
            Datatype::Email => "email",
            Datatype::Password => "password",
            Datatype::Number => "number",
            Datatype::Long => "long",
            Datatype::Int => "int",
            Datatype::Float => "float",
            Datatype::Bool => "bool",
            Datatype::Text => "text",
            Datatype::HText => "htext",
            Datatype::Url => "url",
            Datatype::UrlList => "urllist",
            Datatype::Json => "json",
            Datatype::Code => "code",
            Datatype::Lines => "lines",
            Datatype::Unit => "unit",
            Datatype::UnitList => "unitlist",
            Datatype::List => "list",
            Datatype::ListT => "listt",
            Datatype::ListN => "listn",
            Datatype::CodeList => "codelist",
            Datatype::Radio => "radio",
            Datatype::MultiList => "multilist",
            Datatype::Checkbox => "checkbox",
            Datatype::MSelection => "mselection",
            Datatype::MCheckboxes => "mcheckboxes",
            Datatype::Date => "date",
            Datatype::DateTime => "datetime",
            Datatype::Time => "time",
            Datatype::Timestamp => "timestamp",
            Datatype::File => "file",
            Datatype::ByteSize => "bytesize",
            Datatype::Custom(name) => name,
        }
    }

    /// Целочисленные типы
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Datatype::Number | Datatype::Long | Datatype::Int | Datatype::Unit | Datatype::ByteSize
        )
    }

    /// Типы с несколькими значениями, хранящимися как JSON массив
    pub fn is_multi_value(&self) -> bool {
        matches!(
            self,
            Datatype::MultiList
                | Datatype::Checkbox
                | Datatype::MSelection
                | Datatype::MCheckboxes
                | Datatype::UrlList
                | Datatype::UnitList
        )
    }

    /// Типы с единственным значением из списка
    pub fn is_single_choice(&self) -> bool {
        matches!(
            self,
            Datatype::List | Datatype::ListT | Datatype::ListN | Datatype::CodeList | Datatype::Radio
        )
    }

    /// Типы даты и времени
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            Datatype::Date | Datatype::DateTime | Datatype::Timestamp | Datatype::Time
        )
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Datatype {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "string" => Datatype::String,
            "email" => Datatype::Email,
            "password" => Datatype::Password,
            "number" => Datatype::Number,
            "long" => Datatype::Long,
            "int" | "integer" => Datatype::Int,
            "float" => Datatype::Float,
            "bool" => Datatype::Bool,
            "text" => Datatype::Text,
            "htext" => Datatype::HText,
            "url" => Datatype::Url,
            "urllist" => Datatype::UrlList,
            "json" => Datatype::Json,
            "code" => Datatype::Code,
            "lines" => Datatype::Lines,
            "unit" => Datatype::Unit,
            "unitlist" => Datatype::UnitList,
            "list" => Datatype::List,
            "listt" => Datatype::ListT,
            "listn" => Datatype::ListN,
            "codelist" => Datatype::CodeList,
            "radio" => Datatype::Radio,
            "multilist" => Datatype::MultiList,
            "checkbox" => Datatype::Checkbox,
            "mselection" => Datatype::MSelection,
            "mcheckboxes" => Datatype::MCheckboxes,
            "date" => Datatype::Date,
            "datetime" => Datatype::DateTime,
            "time" => Datatype::Time,
            "timestamp" => Datatype::Timestamp,
            "file" => Datatype::File,
            "bytesize" => Datatype::ByteSize,
            other => Datatype::Custom(other.to_string()),
        })
    }
}

impl Serialize for Datatype {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Datatype {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(name.parse().unwrap_or(Datatype::Custom(name)))
    }
}

/// Описание поля таблицы
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConf {
    /// Имя колонки
    pub id: String,
    /// Абстрактный тип данных
    pub datatype: Datatype,
    /// Размер колонки
    #[serde(default)]
    pub size: u32,
    /// Значение по умолчанию
    #[serde(default)]
    pub default: serde_json::Value,
    /// Уникальное значение
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub readonly: bool,
    /// Отображаемое имя
    #[serde(default)]
    pub name: String,
}

impl FieldConf {
    /// Создает описание поля
    pub fn new(id: impl Into<String>, datatype: Datatype) -> Self {
        Self {
            id: id.into(),
            datatype,
            size: 0,
            default: serde_json::Value::Null,
            unique: false,
            required: false,
            readonly: false,
            name: String::new(),
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn with_default(mut self, default: impl Into<serde_json::Value>) -> Self {
        self.default = default.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }
}

/// Объем данных, загружаемых при создании записи
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreloadOption {
    /// Ничего не загружать
    Skip,
    /// Все поля метаданных
    Meta,
    /// Минимальный набор полей метаданных
    StdMeta,
    /// Минимальный набор метаданных и данные
    StdMetaData,
    /// Метаданные и данные
    MetaData,
    /// Метаданные и данные
    #[default]
    All,
}

impl FromStr for PreloadOption {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(PreloadOption::Skip),
            "meta" => Ok(PreloadOption::Meta),
            "stdmeta" => Ok(PreloadOption::StdMeta),
            "stdmetadata" => Ok(PreloadOption::StdMetaData),
            "metadata" => Ok(PreloadOption::MetaData),
            "all" => Ok(PreloadOption::All),
            _ => Err(format!("Unsupported preload option: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datatype_names() {
        for name in ["string", "multilist", "unitlist", "datetime", "bytesize"] {
            let dt: Datatype = name.parse().unwrap();
            assert_eq!(dt.name(), name);
        }
        let custom: Datatype = "geo".parse().unwrap();
        assert_eq!(custom, Datatype::Custom("geo".to_string()));
        assert!(Datatype::UnitList.is_multi_value());
        assert!(Datatype::Radio.is_single_choice());
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from("12").as_i64(), Some(12));
        assert_eq!(Value::from(3.9).as_i64(), Some(3));
        assert_eq!(Value::from(true).as_i64(), Some(1));
        assert!(!Value::from("").is_truthy());
        assert!(Value::list(["a"]).is_truthy());
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_value_json() {
        let v = Value::list(["a", "b"]);
        assert_eq!(v.to_json().to_string(), r#"["a","b"]"#);
        let back = Value::from_json(serde_json::json!([1, "x", null]));
        assert_eq!(
            back,
            Value::List(vec![Value::Int(1), Value::from("x"), Value::Null])
        );
    }

    #[test]
    fn test_field_conf_from_toml() {
        let conf: FieldConf = toml::from_str(
            r#"
            id = "fnumber"
            datatype = "number"
            size = 8
            default = 0
            "#,
        )
        .unwrap();
        assert_eq!(conf.datatype, Datatype::Number);
        assert_eq!(conf.size, 8);
        assert_eq!(conf.default, serde_json::json!(0));
    }

    #[test]
    fn test_preload_parse() {
        assert_eq!("stdmeta".parse::<PreloadOption>(), Ok(PreloadOption::StdMeta));
        assert!("bogus".parse::<PreloadOption>().is_err());
    }
}
