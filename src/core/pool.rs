//! Пул данных
//!
//! Пул владеет соединением, структурой и файловым хранилищем. Записи
//! состоят из строки `pool_meta` и строки таблицы данных, на которую
//! ссылаются `pool_datatbl` и `pool_dataref`. Изменяющие инструкции не
//! фиксируются автоматически: транзакцию завершает `commit` или `undo`.

use crate::common::{
    CodePage, EntryId, Error, PoolConfig, PreloadOption, Record, Result, Value, FULLTEXT_TABLE,
    GROUPS_TABLE, META_TABLE, SYSTEM_TABLE,
};
use crate::connection::{Connection, Dialect, QueryOutput, Row};
use crate::core::entry::Entry;
use crate::debug::SqlTrace;
use crate::query::{Operator, SelectBuilder, SelectOptions};
use crate::storage::{DbManager, FileStorage, Structure};
use chrono::NaiveDateTime;
use dashmap::DashMap;
use indexmap::IndexSet;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Параметры пакетной загрузки записей
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// `Skip`, `Meta` или полная загрузка для остальных вариантов
    pub preload: PreloadOption,
    pub sort: Option<String>,
    /// Уже известные строки метаданных с `pool_datatbl`
    pub meta: Option<Vec<Record>>,
}

impl BatchOptions {
    pub fn new(preload: PreloadOption) -> Self {
        Self {
            preload,
            ..Self::default()
        }
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn meta(mut self, meta: Vec<Record>) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Пул данных поверх SQL базы и файлового хранилища
pub struct Pool {
    config: PoolConfig,
    structure: Structure,
    connection: Connection,
    files: FileStorage,
    trace: SqlTrace,
    code_page: CodePage,
    db_code_page: CodePage,
    file_locks: DashMap<(EntryId, String), Arc<Mutex<()>>>,
}

impl Pool {
    /// Создает пул; соединение открывается при первом запросе
    pub fn new(config: PoolConfig, structure: Structure) -> Result<Self> {
        let connection = Connection::new(config.connection.clone())?;
        Self::with_connection(config, structure, connection)
    }

    /// Создает пул с готовым соединением
    pub fn with_connection(config: PoolConfig, structure: Structure, connection: Connection) -> Result<Self> {
        config.validate().map_err(Error::configuration)?;
        structure.validate()?;
        let code_page = CodePage::from_name(&config.code_page)
            .ok_or_else(|| Error::configuration(format!("Неизвестная кодировка: {}", config.code_page)))?;
        let db_code_page = CodePage::from_name(&config.db_code_page)
            .ok_or_else(|| Error::configuration(format!("Неизвестная кодировка: {}", config.db_code_page)))?;
        let trace = SqlTrace::new(config.debug, config.log.as_deref())?;
        let files = FileStorage::from_config(&config);
        if !config.root.as_os_str().is_empty() {
            std::fs::create_dir_all(&config.root)?;
        }
        log::debug!(
            "Pool opened: {} ({}), root {}",
            config.connection.db_name,
            config.connection.backend,
            config.root.display()
        );
        Ok(Self {
            config,
            structure,
            connection,
            files,
            trace,
            code_page,
            db_code_page,
            file_locks: DashMap::new(),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn dialect(&self) -> Dialect {
        self.connection.dialect()
    }

    pub fn placeholder(&self) -> &'static str {
        self.connection.placeholder()
    }

    pub fn file_storage(&self) -> &FileStorage {
        &self.files
    }

    /// Корневой каталог файлов
    pub fn root(&self) -> &Path {
        self.files.root()
    }

    pub fn trace(&self) -> &SqlTrace {
        &self.trace
    }

    /// Менеджер схемы на отдельном соединении
    pub fn db_manager(&self) -> Result<DbManager> {
        DbManager::open(&self.connection)
    }

    /// Создает или дополняет системные таблицы и таблицы данных
    pub fn init_database(&self) -> Result<()> {
        let mut manager = self.db_manager()?;
        let result = manager
            .update_pool_tables(&self.structure)
            .and_then(|_| manager.update_data_tables(&self.structure, None));
        manager.close()?;
        result
    }

    /// Закрывает соединение текущей области
    pub fn close(&self) {
        self.connection.close();
    }

    // Транзакции

    pub fn begin(&self) -> Result<()> {
        self.connection.verify_connection()?;
        self.connection.begin()
    }

    /// Откатывает текущую транзакцию
    pub fn undo(&self) -> Result<()> {
        if !self.connection.is_connected() {
            return Ok(());
        }
        self.connection.rollback()
    }

    pub fn commit(&self) -> Result<()> {
        if !self.connection.is_connected() {
            return Ok(());
        }
        self.connection.commit()
    }

    /// Текущее время пула или переданная дата
    pub fn get_db_date(&self, date: Option<NaiveDateTime>) -> Result<NaiveDateTime> {
        match date {
            Some(date) => Ok(date),
            None => self.config.now(),
        }
    }

    // Построение и выполнение SQL

    pub fn select_builder(&self) -> SelectBuilder<'_> {
        SelectBuilder::new(&self.structure, self.dialect())
    }

    pub fn fmt_sql_select(
        &self,
        fields: &[&str],
        parameter: &Record,
        data_table: &str,
        options: &SelectOptions,
    ) -> Result<(String, Vec<Value>)> {
        self.select_builder()
            .fmt_sql_select(fields, parameter, data_table, options)
    }

    pub fn get_fulltext_sql(
        &self,
        phrase: &str,
        fields: &[&str],
        parameter: &Record,
        data_table: &str,
        options: &SelectOptions,
    ) -> Result<(String, Vec<Value>)> {
        self.select_builder()
            .get_fulltext_sql(phrase, fields, parameter, data_table, options)
    }

    /// Выполняет инструкцию
    ///
    /// Ошибка базы данных откатывает текущую транзакцию до возврата.
    pub fn execute(&self, sql: &str, values: &[Value]) -> Result<QueryOutput> {
        self.connection.verify_connection()?;
        let started = Instant::now();
        let result = self.connection.run(sql, values);
        let elapsed = started.elapsed();
        match &result {
            Ok(_) => self.trace.record(sql, values, elapsed, None),
            Err(e) => {
                self.trace.record(sql, values, elapsed, Some(&e.to_string()));
                if e.is_database_error() {
                    log::error!("{}  {}", e, sql);
                    if let Err(rollback) = self.undo() {
                        log::warn!("Rollback after failed statement failed: {}", rollback);
                    }
                }
            }
        }
        result
    }

    /// Выполняет запрос и возвращает все строки
    pub fn query(&self, sql: &str, values: &[Value]) -> Result<Vec<Row>> {
        Ok(self.execute(sql, values)?.rows)
    }

    /// Выполняет запрос и возвращает строки как записи по именам колонок
    pub fn query_records(&self, sql: &str, values: &[Value]) -> Result<Vec<Record>> {
        let output = self.execute(sql, values)?;
        let columns = output.columns;
        Ok(output
            .rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect())
    }

    /// Первая колонка первой строки
    fn query_scalar(&self, sql: &str, values: &[Value]) -> Result<Option<Value>> {
        Ok(self
            .query(sql, values)?
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next()))
    }

    fn last_insert_id(&self) -> Result<EntryId> {
        self.query_scalar(self.dialect().last_insert_id_sql(), &[])?
            .and_then(|v| v.as_i64())
            .ok_or_else(|| Error::internal("Не удалось получить id новой строки"))
    }

    /// Выбирает поля строк с id из списка
    pub fn select_fields(
        &self,
        table: &str,
        fields: &[&str],
        ids: &[Value],
        id_column: Option<&str>,
    ) -> Result<Vec<Row>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ph = self.placeholder();
        let sql = format!(
            "SELECT {} FROM {} WHERE {} IN ({})",
            fields.join(","),
            table,
            id_column.unwrap_or("id"),
            vec![ph; ids.len()].join(",")
        );
        self.query(&sql, ids)
    }

    /// Вставляет строку
    ///
    /// Возвращает преобразованные значения и id новой строки, если задана
    /// колонка автоинкремента.
    pub fn insert_fields(&self, table: &str, data: Record, id_column: Option<&str>) -> Result<(Record, EntryId)> {
        let data = self.structure.serialize_record(table, data)?;
        if data.is_empty() {
            self.execute(&self.dialect().insert_empty_row_sql(table), &[])?;
        } else {
            let ph = self.placeholder();
            let fields: Vec<&str> = data.keys().map(String::as_str).collect();
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                fields.join(","),
                vec![ph; fields.len()].join(",")
            );
            let values: Vec<Value> = data.values().cloned().collect();
            self.execute(&sql, &values)?;
        }
        let id = match id_column {
            Some(column) => match data.get(column).and_then(Value::as_i64) {
                Some(id) => id,
                None => self.last_insert_id()?,
            },
            None => 0,
        };
        Ok((data, id))
    }

    /// Обновляет поля строки `id_column = id`
    ///
    /// С `autoinsert` отсутствующая строка вставляется с этим id;
    /// возвращаемый id ненулевой только после вставки.
    pub fn update_fields(
        &self,
        table: &str,
        id: EntryId,
        data: Record,
        id_column: &str,
        autoinsert: bool,
    ) -> Result<(Record, EntryId)> {
        let ph = self.placeholder();
        if autoinsert {
            let sql = format!("SELECT {} FROM {} WHERE {} = {}", id_column, table, id_column, ph);
            if self.query(&sql, &[Value::Int(id)])?.is_empty() {
                let mut data = data;
                if id > 0 && !data.contains_key(id_column) {
                    data.insert(id_column.to_string(), Value::Int(id));
                }
                return self.insert_fields(table, data, Some(id_column));
            }
        }
        let data = self.structure.serialize_record(table, data)?;
        if data.is_empty() {
            return Ok((data, 0));
        }
        let assignments: Vec<String> = data.keys().map(|k| format!("{}={}", k, ph)).collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {}={}",
            table,
            assignments.join(","),
            id_column,
            ph
        );
        let mut values: Vec<Value> = data.values().cloned().collect();
        values.push(Value::Int(id));
        self.execute(&sql, &values)?;
        Ok((data, 0))
    }

    /// Удаляет строки, совпадающие со всеми параметрами
    pub fn delete_records(&self, table: &str, parameter: &Record) -> Result<bool> {
        if parameter.is_empty() {
            return Ok(false);
        }
        let ph = self.placeholder();
        let conditions: Vec<String> = parameter.keys().map(|k| format!("{}={}", k, ph)).collect();
        let sql = format!("DELETE FROM {} WHERE {}", table, conditions.join(" AND "));
        let values: Vec<Value> = parameter.values().cloned().collect();
        Ok(self.execute(&sql, &values)?.rowcount > 0)
    }

    // Текст

    /// Текст, прочитанный из базы, в кодировке базы
    pub fn encode_text(&self, bytes: &[u8]) -> String {
        self.db_code_page.decode(bytes)
    }

    /// Текст для записи в базу в кодировке приложения
    pub fn decode_text(&self, bytes: &[u8]) -> String {
        self.code_page.decode(bytes)
    }

    /// Строка результата как запись по списку полей
    pub fn convert_rec_to_dict(row: Row, fields: &[&str]) -> Record {
        fields
            .iter()
            .map(|f| f.to_string())
            .zip(row)
            .collect()
    }

    // Записи

    /// Создает запись в таблице данных `data_tbl`
    ///
    /// При `id > 0` запись получает этот id; занятый id дает ошибку.
    /// Метаданные создания лежат в изменениях записи до `commit`.
    pub fn create_entry(&self, data_tbl: &str, id: EntryId, user: &str) -> Result<Entry<'_>> {
        let (id, data_ref) = if id > 0 {
            self.create_fix_id(id, data_tbl)?
        } else {
            self.create_new_id(data_tbl)?
        };
        let mut entry = Entry::new(self, id, Some(data_tbl.to_string()), data_ref);
        entry.init_new(data_tbl, user)?;
        Ok(entry)
    }

    /// Загружает запись; отсутствующая запись дает `None`
    pub fn get_entry(&self, id: EntryId, preload: PreloadOption) -> Result<Option<Entry<'_>>> {
        match Entry::open(self, id, preload) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn ensure_data_table(&self, data_tbl: &str) -> Result<()> {
        if data_tbl.is_empty() || data_tbl == META_TABLE {
            return Err(Error::configuration("Не задана таблица данных записи"));
        }
        self.structure.ensure_table(data_tbl).map(|_| ())
    }

    fn create_new_id(&self, data_tbl: &str) -> Result<(EntryId, EntryId)> {
        self.ensure_data_table(data_tbl)?;
        self.execute(&self.dialect().insert_empty_row_sql(data_tbl), &[])?;
        let data_ref = self.last_insert_id()?;
        let ph = self.placeholder();
        let sql = format!(
            "INSERT INTO {} (pool_datatbl, pool_dataref) VALUES ({}, {})",
            META_TABLE, ph, ph
        );
        self.execute(&sql, &[Value::from(data_tbl), Value::Int(data_ref)])?;
        let id = self.last_insert_id()?;
        Ok((id, data_ref))
    }

    fn create_fix_id(&self, id: EntryId, data_tbl: &str) -> Result<(EntryId, EntryId)> {
        self.ensure_data_table(data_tbl)?;
        if self.is_id_used(id)? {
            return Err(Error::validation(format!("ID {} уже используется", id)));
        }
        self.execute(&self.dialect().insert_empty_row_sql(data_tbl), &[])?;
        let data_ref = self.last_insert_id()?;
        let ph = self.placeholder();
        let sql = format!(
            "INSERT INTO {} (id, pool_datatbl, pool_dataref) VALUES ({}, {}, {})",
            META_TABLE, ph, ph, ph
        );
        self.execute(&sql, &[Value::Int(id), Value::from(data_tbl), Value::Int(data_ref)])?;
        Ok((id, data_ref))
    }

    /// Удаляет запись с файлами, полнотекстом, группами и строкой данных
    ///
    /// Возвращает `false`, если записи нет. Транзакцию фиксирует вызывающий.
    pub fn delete_entry(&self, id: EntryId) -> Result<bool> {
        let options = SelectOptions::new().single_table();
        let (sql, values) = self.fmt_sql_select(
            &["pool_dataref", "pool_datatbl"],
            &Record::from([("id".to_string(), Value::Int(id))]),
            META_TABLE,
            &options,
        )?;
        let Some(row) = self.query(&sql, &values)?.into_iter().next() else {
            return Ok(false);
        };
        let data_ref = row.first().and_then(Value::as_i64).unwrap_or(0);
        let data_tbl = row.get(1).map(Value::to_text).unwrap_or_default();

        self.delete_files(id)?;
        let by_id = Record::from([("id".to_string(), Value::Int(id))]);
        self.delete_records(FULLTEXT_TABLE, &by_id)?;
        self.delete_records(GROUPS_TABLE, &by_id)?;
        if self.structure.contains(&data_tbl) && data_tbl != META_TABLE {
            self.delete_records(&data_tbl, &Record::from([("id".to_string(), Value::Int(data_ref))]))?;
        } else {
            log::warn!("Entry {} references unknown data table '{}'", id, data_tbl);
        }
        self.delete_records(META_TABLE, &by_id)?;
        Ok(true)
    }

    /// Удаляет запись вместе со всеми потомками, начиная с листьев
    ///
    /// Возвращает количество удаленных записей.
    pub fn delete_entry_recursive(&self, id: EntryId) -> Result<usize> {
        let mut ids = self.get_contained_ids(id, "id", "")?;
        ids.reverse();
        ids.push(id);
        let mut deleted = 0;
        for id in ids {
            if self.delete_entry(id)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Есть ли строка метаданных с этим id
    pub fn is_id_used(&self, id: EntryId) -> Result<bool> {
        let options = SelectOptions::new().single_table();
        let (sql, values) = self.fmt_sql_select(
            &["id"],
            &Record::from([("id".to_string(), Value::Int(id))]),
            META_TABLE,
            &options,
        )?;
        Ok(!self.query(&sql, &values)?.is_empty())
    }

    /// Загружает записи пакетом в порядке `ids`
    ///
    /// Отсутствующие id пропускаются, повторный id возвращается один раз
    /// на месте первого вхождения. Полная загрузка делает один запрос на
    /// каждую таблицу данных.
    pub fn get_batch(&self, ids: &[EntryId], options: &BatchOptions) -> Result<Vec<Entry<'_>>> {
        let ids: Vec<EntryId> = ids.iter().copied().collect::<IndexSet<_>>().into_iter().collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if options.preload == PreloadOption::Skip {
            return Ok(ids.iter().map(|&id| Entry::new(self, id, None, 0)).collect());
        }

        let meta_fields: Vec<&str> = self.structure.meta_fields().iter().map(String::as_str).collect();
        if meta_fields.is_empty() {
            return Err(Error::configuration("Слой метаданных пуст"));
        }
        let id_list = Value::List(ids.iter().map(|&id| Value::Int(id)).collect());
        let mut base = SelectOptions::new().operator("id", Operator::In);
        if let Some(sort) = &options.sort {
            base = base.sort(sort.clone());
        }
        let mut loaded: HashMap<EntryId, Entry<'_>> = HashMap::new();

        if options.preload == PreloadOption::Meta {
            let parameter = Record::from([("id".to_string(), id_list)]);
            let (sql, values) =
                self.fmt_sql_select(&meta_fields, &parameter, META_TABLE, &base.clone().single_table())?;
            for row in self.query(&sql, &values)? {
                let meta = self
                    .structure
                    .deserialize_record(META_TABLE, Self::convert_rec_to_dict(row, &meta_fields))?;
                let entry = Entry::from_cache(self, meta, None)?;
                loaded.insert(entry.id(), entry);
            }
        } else {
            let tables = match options.meta.as_deref() {
                Some(meta) if meta.first().is_some_and(|r| r.contains_key("pool_datatbl")) => {
                    let mut tables: Vec<String> = Vec::new();
                    for table in meta.iter().filter_map(|r| r.get("pool_datatbl")).map(Value::to_text) {
                        if !tables.contains(&table) {
                            tables.push(table);
                        }
                    }
                    tables
                }
                _ => {
                    let parameter = Record::from([("id".to_string(), id_list.clone())]);
                    let grouped = SelectOptions::new()
                        .operator("id", Operator::In)
                        .single_table()
                        .group_by("pool_datatbl");
                    let (sql, values) =
                        self.fmt_sql_select(&["pool_datatbl"], &parameter, META_TABLE, &grouped)?;
                    self.query(&sql, &values)?
                        .into_iter()
                        .filter_map(|row| row.into_iter().next())
                        .map(|v| v.to_text())
                        .collect()
                }
            };

            for table in tables {
                let Some(data_fields) = self.structure.get(&table) else {
                    log::warn!("Batch skips unknown data table '{}'", table);
                    continue;
                };
                if table == META_TABLE {
                    continue;
                }
                let data_fields: Vec<&str> = data_fields.iter().map(String::as_str).collect();
                let fields: Vec<&str> = meta_fields.iter().chain(data_fields.iter()).copied().collect();
                let parameter = Record::from([
                    ("id".to_string(), id_list.clone()),
                    ("pool_datatbl".to_string(), Value::from(table.as_str())),
                ]);
                let opts = base.clone().operator("pool_datatbl", Operator::Eq);
                let (sql, values) = self.fmt_sql_select(&fields, &parameter, &table, &opts)?;
                for mut row in self.query(&sql, &values)? {
                    let data_row = row.split_off(meta_fields.len().min(row.len()));
                    let meta = self
                        .structure
                        .deserialize_record(META_TABLE, Self::convert_rec_to_dict(row, &meta_fields))?;
                    let data = self
                        .structure
                        .deserialize_record(&table, Self::convert_rec_to_dict(data_row, &data_fields))?;
                    let entry = Entry::from_cache(self, meta, Some(data))?;
                    loaded.insert(entry.id(), entry);
                }
            }
        }

        Ok(ids.iter().filter_map(|id| loaded.remove(id)).collect())
    }

    // Статистика и поиск

    /// Количество строк в таблице; по умолчанию количество записей
    pub fn get_count_entries(&self, table: Option<&str>) -> Result<i64> {
        let table = table.unwrap_or(META_TABLE);
        let known = self.structure.contains(table)
            || Structure::system_tables().iter().any(|t| t.name == table);
        if !known {
            return Err(Error::configuration(format!("Неизвестная таблица: {}", table)));
        }
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        Ok(self
            .query_scalar(&sql, &[])?
            .and_then(|v| v.as_i64())
            .unwrap_or(0))
    }

    /// Выполняет `fmt_sql_select` и возвращает преобразованные записи
    pub fn search(
        &self,
        fields: &[&str],
        parameter: &Record,
        data_table: &str,
        options: &SelectOptions,
    ) -> Result<Vec<Record>> {
        let (sql, values) = self.fmt_sql_select(fields, parameter, data_table, options)?;
        self.search_rows(&sql, &values, fields, data_table, options.single_table)
    }

    /// Поиск по полнотекстовому индексу
    ///
    /// `*` во фразе означает любую последовательность символов; фраза без
    /// `%` ищется как подстрока.
    pub fn search_fulltext(
        &self,
        phrase: &str,
        fields: &[&str],
        parameter: &Record,
        data_table: &str,
        options: &SelectOptions,
    ) -> Result<Vec<Record>> {
        let phrase = phrase.trim();
        let pattern = if phrase.is_empty() || phrase.contains('%') {
            phrase.to_string()
        } else {
            crate::query::like_pattern(phrase)
        };
        let (sql, values) = self.get_fulltext_sql(&pattern, fields, parameter, data_table, options)?;
        self.search_rows(&sql, &values, fields, data_table, false)
    }

    fn search_rows(
        &self,
        sql: &str,
        values: &[Value],
        fields: &[&str],
        data_table: &str,
        single_table: bool,
    ) -> Result<Vec<Record>> {
        let keys: Vec<String> = fields.iter().map(|f| result_key(f)).collect();
        let rows = self.query(sql, values)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut record = Record::new();
            for (key, value) in keys.iter().zip(row) {
                let table = if single_table {
                    data_table
                } else if self.structure.is_meta_field(key) || data_table.is_empty() {
                    META_TABLE
                } else {
                    data_table
                };
                let value = self.structure.deserialize(table, key, value)?;
                record.insert(key.clone(), value);
            }
            out.push(record);
        }
        Ok(out)
    }

    // Системные значения

    /// Сохраняет значение в `pool_sys`
    pub fn store_system_value(&self, key: &str, value: &Value) -> Result<()> {
        let ph = self.placeholder();
        let payload = Value::Str(value.to_json().to_string());
        let ts = Value::Int(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0),
        );
        let exists = !self
            .query(&format!("SELECT id FROM {} WHERE id = {}", SYSTEM_TABLE, ph), &[Value::from(key)])?
            .is_empty();
        if exists {
            let sql = format!("UPDATE {} SET value = {}, ts = {} WHERE id = {}", SYSTEM_TABLE, ph, ph, ph);
            self.execute(&sql, &[payload, ts, Value::from(key)])?;
        } else {
            let sql = format!("INSERT INTO {} (id, value, ts) VALUES ({}, {}, {})", SYSTEM_TABLE, ph, ph, ph);
            self.execute(&sql, &[Value::from(key), payload, ts])?;
        }
        Ok(())
    }

    /// Загружает значение из `pool_sys`
    pub fn load_system_value(&self, key: &str) -> Result<Option<Value>> {
        let sql = format!("SELECT value FROM {} WHERE id = {}", SYSTEM_TABLE, self.placeholder());
        match self.query_scalar(&sql, &[Value::from(key)])? {
            None | Some(Value::Null) => Ok(None),
            Some(stored) => {
                let json: serde_json::Value = serde_json::from_str(&stored.to_text())?;
                Ok(Some(Value::from_json(json)))
            }
        }
    }

    /// Мьютекс слота файла записи
    pub(crate) fn file_lock(&self, id: EntryId, filekey: &str) -> Arc<Mutex<()>> {
        self.file_locks
            .entry((id, filekey.to_string()))
            .or_default()
            .clone()
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("connection", &self.connection)
            .field("root", &self.files.root())
            .field("tables", &self.structure.tables().collect::<Vec<_>>())
            .finish()
    }
}

/// Имя колонки результата для поля запроса
fn result_key(field: &str) -> String {
    let field = field.strip_prefix('-').unwrap_or(field);
    match field.rsplit_once(" as ") {
        Some((_, alias)) => alias.trim().to_string(),
        None => field.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_key() {
        assert_eq!(result_key("title"), "title");
        assert_eq!(result_key("-count(*) as cnt"), "cnt");
        assert_eq!(result_key("-pool_type"), "pool_type");
    }

    #[test]
    fn test_convert_rec_to_dict() {
        let rec = Pool::convert_rec_to_dict(vec![Value::Int(1), Value::from("a")], &["id", "title"]);
        assert_eq!(rec.get("title"), Some(&Value::from("a")));
        assert_eq!(rec.len(), 2);
    }
}
