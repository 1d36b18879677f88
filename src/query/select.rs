//! Построение SELECT по структуре пула
//!
//! Таблица метаданных получает псевдоним `meta__`, таблица данных
//! присоединяется как `data__` по `meta__.pool_dataref = data__.id`.
//! Поле относится к `meta__`, если оно есть в таблице метаданных, иначе к
//! `data__`. Префикс `-` отключает псевдоним (например, `-count(*)`).

use crate::common::{Error, Record, Result, Value, DATA_ALIAS, FULLTEXT_TABLE, META_ALIAS, META_TABLE};
use crate::connection::Dialect;
use crate::storage::Structure;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Оператор сравнения в условии WHERE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    #[default]
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Like,
    Between,
    In,
    NotIn,
    /// Несколько LIKE, объединенных AND
    LikeAnd,
    LikeOr,
    LikeNot,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Like => "LIKE",
            Operator::Between => "BETWEEN",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::LikeAnd => "LIKE:AND",
            Operator::LikeOr => "LIKE:OR",
            Operator::LikeNot => "LIKE:NOT",
        }
    }

    fn is_multi_like(&self) -> bool {
        matches!(self, Operator::LikeAnd | Operator::LikeOr | Operator::LikeNot)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let op = match s.trim().to_uppercase().as_str() {
            "=" => Operator::Eq,
            "<>" | "!=" => Operator::Ne,
            ">" => Operator::Gt,
            "<" => Operator::Lt,
            ">=" => Operator::Ge,
            "<=" => Operator::Le,
            "LIKE" => Operator::Like,
            "BETWEEN" => Operator::Between,
            "IN" => Operator::In,
            "NOT IN" => Operator::NotIn,
            "LIKE:AND" => Operator::LikeAnd,
            "LIKE:OR" => Operator::LikeOr,
            "LIKE:NOT" => Operator::LikeNot,
            other => return Err(Error::validation(format!("Неизвестный оператор: {}", other))),
        };
        Ok(op)
    }
}

/// Связка условий WHERE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
    /// `AND NOT` перед каждым следующим условием
    Not,
}

impl LogicalOperator {
    fn joiner(&self) -> &'static str {
        match self {
            LogicalOperator::And => " AND ",
            LogicalOperator::Or => " OR ",
            LogicalOperator::Not => " AND NOT ",
        }
    }
}

impl FromStr for LogicalOperator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "" | "AND" => Ok(LogicalOperator::And),
            "OR" => Ok(LogicalOperator::Or),
            "NOT" => Ok(LogicalOperator::Not),
            other => Err(Error::validation(format!("Неизвестная связка условий: {}", other))),
        }
    }
}

/// Тип соединения с таблицей данных
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    LeftOuter,
}

impl JoinType {
    fn as_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::LeftOuter => "LEFT OUTER",
        }
    }
}

/// Параметры построения SELECT
#[derive(Debug, Clone)]
pub struct SelectOptions {
    /// Только таблица данных, без псевдонимов и соединения
    pub single_table: bool,
    pub operators: HashMap<String, Operator>,
    pub join_type: JoinType,
    /// Поле, которое при внешнем соединении заменяется заголовком
    pub map_join_field: Option<String>,
    pub logical_operator: LogicalOperator,
    /// Произвольное условие, добавляемое к WHERE
    pub condition: Option<String>,
    /// Произвольное соединение после соединения с таблицей данных
    pub join: Option<String>,
    pub group_by: Option<String>,
    /// Сортировка; `!` в начале отключает подстановку псевдонимов
    pub sort: Option<String>,
    pub ascending: bool,
    pub start: usize,
    /// Максимум строк; 0 - без ограничения
    pub max: usize,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            single_table: false,
            operators: HashMap::new(),
            join_type: JoinType::Inner,
            map_join_field: None,
            logical_operator: LogicalOperator::And,
            condition: None,
            join: None,
            group_by: None,
            sort: None,
            ascending: true,
            start: 0,
            max: 0,
        }
    }
}

impl SelectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single_table(mut self) -> Self {
        self.single_table = true;
        self
    }

    pub fn operator(mut self, field: impl Into<String>, operator: Operator) -> Self {
        self.operators.insert(field.into(), operator);
        self
    }

    pub fn join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = join_type;
        self
    }

    pub fn map_join_field(mut self, field: impl Into<String>) -> Self {
        self.map_join_field = Some(field.into());
        self
    }

    pub fn logical_operator(mut self, operator: LogicalOperator) -> Self {
        self.logical_operator = operator;
        self
    }

    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn join(mut self, join: impl Into<String>) -> Self {
        self.join = Some(join.into());
        self
    }

    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = Some(group_by.into());
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn ascending(mut self, ascending: bool) -> Self {
        self.ascending = ascending;
        self
    }

    pub fn limit(mut self, start: usize, max: usize) -> Self {
        self.start = start;
        self.max = max;
        self
    }
}

/// Части запроса до сборки в строку
#[derive(Debug, Default)]
struct SelectParts {
    fields: String,
    from: String,
    joins: Vec<String>,
    conditions: Vec<String>,
    group_by: String,
    order: String,
    limit: String,
    values: Vec<Value>,
}

impl SelectParts {
    fn to_sql(&self) -> String {
        let where_clause = self.where_clause();
        let mut sql = format!("SELECT {} FROM {}", self.fields, self.from);
        let tail = [
            where_clause.as_str(),
            self.group_by.as_str(),
            self.order.as_str(),
            self.limit.as_str(),
        ];
        for part in self.joins.iter().map(String::as_str).chain(tail) {
            if !part.is_empty() {
                sql.push(' ');
                sql.push_str(part);
            }
        }
        sql
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.concat())
        }
    }
}

/// Построитель SELECT для структуры и диалекта
#[derive(Debug, Clone, Copy)]
pub struct SelectBuilder<'a> {
    structure: &'a Structure,
    dialect: Dialect,
}

impl<'a> SelectBuilder<'a> {
    pub fn new(structure: &'a Structure, dialect: Dialect) -> Self {
        Self { structure, dialect }
    }

    /// Строит SELECT и список связываемых значений
    pub fn fmt_sql_select(
        &self,
        fields: &[&str],
        parameter: &Record,
        data_table: &str,
        options: &SelectOptions,
    ) -> Result<(String, Vec<Value>)> {
        let parts = self.build(fields, parameter, data_table, options)?;
        Ok((parts.to_sql(), parts.values))
    }

    /// SELECT с поиском по полнотекстовой таблице
    ///
    /// Фраза связывается первым значением; пустая фраза или `%%` только
    /// присоединяет `pool_fulltext`.
    pub fn get_fulltext_sql(
        &self,
        phrase: &str,
        fields: &[&str],
        parameter: &Record,
        data_table: &str,
        options: &SelectOptions,
    ) -> Result<(String, Vec<Value>)> {
        if options.single_table {
            return Err(Error::validation("Полнотекстовый поиск требует таблицы метаданных"));
        }
        let mut parts = self.build(fields, parameter, data_table, options)?;
        parts.joins.insert(
            0,
            format!(
                "LEFT JOIN {ft} ON ({meta}.id = {ft}.id)",
                ft = FULLTEXT_TABLE,
                meta = META_ALIAS
            ),
        );
        if !phrase.is_empty() && phrase != "%%" && phrase != "'%%'" {
            let condition = format!("{}.text LIKE {}", FULLTEXT_TABLE, self.dialect.placeholder());
            if parts.conditions.is_empty() {
                parts.conditions.push(condition);
            } else {
                let rest = parts.conditions.concat();
                parts.conditions = vec![format!("{} AND ({})", condition, rest)];
            }
            parts.values.insert(0, Value::from(phrase));
        }
        Ok((parts.to_sql(), parts.values))
    }

    fn is_meta(&self, field: &str) -> bool {
        self.structure.is_meta_field(field)
    }

    /// Префикс таблицы для поля в условии или сортировке
    fn alias_for(&self, field: &str, data_table: &str, single_table: bool) -> &'static str {
        if single_table {
            ""
        } else if self.is_meta(field) || field == "pool_stag" || data_table.is_empty() {
            "meta__."
        } else {
            "data__."
        }
    }

    fn build(
        &self,
        fields: &[&str],
        parameter: &Record,
        data_table: &str,
        options: &SelectOptions,
    ) -> Result<SelectParts> {
        let single = options.single_table;
        if single && data_table.is_empty() {
            return Err(Error::validation("Для запроса к одной таблице нужна таблица данных"));
        }
        let mut parts = SelectParts {
            fields: self.select_fields(fields, data_table, options),
            from: if single {
                data_table.to_string()
            } else {
                format!("{} AS {}", META_TABLE, META_ALIAS)
            },
            ..SelectParts::default()
        };

        if !single && !data_table.is_empty() {
            parts.joins.push(format!(
                "{} JOIN {} AS {} ON ({}.pool_dataref = {}.id)",
                options.join_type.as_sql(),
                data_table,
                DATA_ALIAS,
                META_ALIAS,
                DATA_ALIAS
            ));
        }
        if let Some(join) = options.join.as_deref().filter(|j| !j.is_empty()) {
            parts.joins.push(join.to_string());
        }

        self.where_conditions(parameter, data_table, options, &mut parts)?;

        if let Some(group_by) = options.group_by.as_deref().filter(|g| !g.is_empty()) {
            parts.group_by = format!("GROUP BY {}", group_by);
        }
        let sort = self.sort_clause(options.sort.as_deref().unwrap_or(""), data_table, single);
        if !sort.is_empty() {
            let order = if options.ascending { "ASC" } else { "DESC" };
            parts.order = format!("ORDER BY {} {}", sort, order);
        }
        if options.max > 0 {
            parts.limit = self.dialect.format_limit(options.start, options.max);
        }
        Ok(parts)
    }

    fn select_fields(&self, fields: &[&str], data_table: &str, options: &SelectOptions) -> String {
        let mut out = Vec::with_capacity(fields.len());
        for field in fields {
            if let Some(raw) = field.strip_prefix('-') {
                out.push(raw.to_string());
                continue;
            }
            if options.single_table {
                out.push(field.to_string());
                continue;
            }
            let name = field.split(" as ").next().unwrap_or(field).trim();
            if self.is_meta(name) || data_table.is_empty() {
                out.push(format!("meta__.{}", field));
            } else if options.join_type != JoinType::Inner {
                let otherwise = if options.map_join_field.as_deref() == Some(name) {
                    "meta__.title"
                } else {
                    "NULL"
                };
                let condition = format!("meta__.pool_datatbl={}", self.dialect.fmt_param(&Value::from(data_table)));
                out.push(format!(
                    "{} AS {}",
                    self.dialect
                        .conditional_field(&condition, &format!("data__.{}", name), otherwise),
                    name
                ));
            } else {
                out.push(format!("data__.{}", field));
            }
        }
        out.join(",")
    }

    fn where_conditions(
        &self,
        parameter: &Record,
        data_table: &str,
        options: &SelectOptions,
        parts: &mut SelectParts,
    ) -> Result<()> {
        let ph = self.dialect.placeholder();
        let joiner = options.logical_operator.joiner();

        for (key, value) in parameter {
            let (column, operator) = {
                let operator = options.operators.get(key).copied().unwrap_or_default();
                match key.strip_prefix('-') {
                    Some(raw) => (raw.to_string(), operator),
                    None => (
                        format!("{}{}", self.alias_for(key, data_table, options.single_table), key),
                        operator,
                    ),
                }
            };

            let mut values = Vec::new();
            let condition = match value {
                Value::Null => continue,
                Value::List(items) => {
                    match self.list_condition(&column, operator, items, ph, &mut values)? {
                        Some(condition) => condition,
                        None => continue,
                    }
                }
                Value::Str(s) => match operator {
                    Operator::Like => {
                        if s.is_empty() {
                            continue;
                        }
                        values.push(Value::Str(like_pattern(s)));
                        format!("{} LIKE {}", column, ph)
                    }
                    Operator::Between => {
                        return Err(Error::validation(format!(
                            "BETWEEN для {} требует двух значений",
                            key
                        )))
                    }
                    op if op.is_multi_like() => {
                        match self.list_condition(&column, op, std::slice::from_ref(value), ph, &mut values)? {
                            Some(condition) => condition,
                            None => continue,
                        }
                    }
                    op => {
                        values.push(value.clone());
                        format!("{} {} {}", column, scalar_operator(op), ph)
                    }
                },
                Value::Date(_) => {
                    values.push(value.clone());
                    format!("DATE({}) {} {}", column, scalar_operator(operator), ph)
                }
                _ => {
                    if operator == Operator::Between {
                        return Err(Error::validation(format!(
                            "BETWEEN для {} требует двух значений",
                            key
                        )));
                    }
                    values.push(value.clone());
                    format!("{} {} {}", column, scalar_operator(operator), ph)
                }
            };

            if !parts.conditions.is_empty() {
                parts.conditions.push(joiner.to_string());
            }
            parts.conditions.push(condition);
            parts.values.extend(values);
        }

        if let Some(condition) = options.condition.as_deref().filter(|c| !c.is_empty()) {
            if !parts.conditions.is_empty() {
                parts.conditions.push(joiner.to_string());
            }
            parts.conditions.push(condition.to_string());
        }
        Ok(())
    }

    /// Условие для списка значений; `None` - условие пропускается
    fn list_condition(
        &self,
        column: &str,
        operator: Operator,
        items: &[Value],
        ph: &str,
        values: &mut Vec<Value>,
    ) -> Result<Option<String>> {
        if items.is_empty() {
            return Ok(None);
        }
        if operator == Operator::Between {
            if items.len() < 2 {
                return Ok(None);
            }
            values.push(items[0].clone());
            values.push(items[1].clone());
            return Ok(Some(format!("{} BETWEEN {} AND {}", column, ph, ph)));
        }
        if operator.is_multi_like() {
            let joiner = match operator {
                Operator::LikeOr => " OR ",
                Operator::LikeNot => " AND NOT ",
                _ => " AND ",
            };
            let mut predicates = Vec::with_capacity(items.len());
            for item in items {
                if item.is_truthy() {
                    predicates.push(format!("{} LIKE {}", column, ph));
                    values.push(Value::Str(like_pattern(&item.to_text())));
                } else {
                    predicates.push(format!("{} = {}", column, ph));
                    values.push(item.clone());
                }
            }
            return Ok(Some(format!("({})", predicates.join(joiner))));
        }
        if items.len() == 1 {
            values.push(items[0].clone());
            return Ok(Some(format!("{} {} {}", column, scalar_operator(operator), ph)));
        }
        let operator = match operator {
            Operator::In | Operator::Eq => "IN",
            Operator::NotIn | Operator::Ne => "NOT IN",
            other => {
                return Err(Error::validation(format!(
                    "Оператор {} не применим к списку для {}",
                    other, column
                )))
            }
        };
        values.extend(items.iter().cloned());
        let placeholders = vec![ph; items.len()].join(",");
        Ok(Some(format!("{} {} ({})", column, operator, placeholders)))
    }

    fn sort_clause(&self, sort: &str, data_table: &str, single_table: bool) -> String {
        let sort = sort.trim();
        if sort.is_empty() {
            return String::new();
        }
        if let Some(raw) = sort.strip_prefix('!') {
            return raw.to_string();
        }
        if single_table {
            return sort.to_string();
        }
        sort.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|field| match field.strip_prefix('-') {
                Some(raw) => raw.to_string(),
                None => {
                    let name = field.split(' ').next().unwrap_or(field);
                    format!("{}{}", self.alias_for(name, data_table, false), field)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Оператор для одиночного значения: LIKE превращается в `=`, IN в `=`
fn scalar_operator(operator: Operator) -> &'static str {
    match operator {
        Operator::Like | Operator::In | Operator::LikeAnd | Operator::LikeOr => "=",
        Operator::NotIn | Operator::LikeNot => "<>",
        other => other.as_sql(),
    }
}

/// Шаблон LIKE: `*` заменяется на `%`, значение обрамляется `%`
pub fn like_pattern(value: &str) -> String {
    format!("%{}%", value.replace('*', "%"))
}
