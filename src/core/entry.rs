//! Запись пула данных
//!
//! Запись объединяет строку метаданных, строку таблицы данных и файлы.
//! Изменения копятся в обертках и записываются в базу одной транзакцией
//! в `commit`; `undo` отбрасывает их и откатывает транзакцию.

use crate::common::{
    EntryId, Error, PreloadOption, Record, Result, Value, FULLTEXT_TABLE, IMMUTABLE_META_FIELDS,
    META_TABLE,
};
use crate::core::pool::Pool;
use crate::core::wrapper::{FileWrapper, Layer, Wrapper};
use crate::query::SelectOptions;
use crate::storage::File;
use std::fmt;

/// Запись пула данных
pub struct Entry<'p> {
    pool: &'p Pool,
    id: EntryId,
    data_tbl: Option<String>,
    data_ref: EntryId,
    /// Виртуальная запись не читает базу и всегда существует
    is_virtual: bool,
    pub meta: Wrapper,
    pub data: Wrapper,
    pub files: FileWrapper,
}

impl fmt::Debug for Entry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("data_tbl", &self.data_tbl)
            .field("data_ref", &self.data_ref)
            .field("virtual", &self.is_virtual)
            .finish()
    }
}

impl<'p> Entry<'p> {
    pub(crate) fn new(pool: &'p Pool, id: EntryId, data_tbl: Option<String>, data_ref: EntryId) -> Self {
        Self {
            pool,
            id,
            data_tbl,
            data_ref,
            is_virtual: false,
            meta: Wrapper::new(Layer::Meta),
            data: Wrapper::new(Layer::Data),
            files: FileWrapper::new(),
        }
    }

    /// Открывает запись и загружает поля по `preload`
    ///
    /// Отсутствующая запись дает `Error::NotFound`; с `Skip` существование
    /// не проверяется.
    pub fn open(pool: &'p Pool, id: EntryId, preload: PreloadOption) -> Result<Self> {
        if id <= 0 {
            return Err(Error::not_found(id));
        }
        let mut entry = Self::new(pool, id, None, 0);
        if preload != PreloadOption::Skip {
            let loaded = entry.load(preload, false)?;
            if !loaded && entry.meta.is_empty() && entry.data.is_empty() && !entry.exists()? {
                return Err(Error::not_found(id));
            }
        }
        Ok(entry)
    }

    /// Запись без обращений к базе при загрузке
    pub fn virtual_entry(pool: &'p Pool, id: EntryId) -> Self {
        let mut entry = Self::new(pool, id, None, 0);
        entry.is_virtual = true;
        entry
    }

    /// Запись из уже прочитанных метаданных и данных
    pub(crate) fn from_cache(pool: &'p Pool, meta: Record, data: Option<Record>) -> Result<Self> {
        let id = meta
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::internal("Строка метаданных без id"))?;
        let data_tbl = meta
            .get("pool_datatbl")
            .map(Value::to_text)
            .filter(|t| !t.is_empty());
        let data_ref = meta.get("pool_dataref").and_then(Value::as_i64).unwrap_or(0);
        let mut entry = Self::new(pool, id, data_tbl, data_ref);
        entry.update_cache(Some(meta), data);
        Ok(entry)
    }

    pub fn pool(&self) -> &'p Pool {
        self.pool
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// Есть ли запись в базе
    pub fn exists(&self) -> Result<bool> {
        if self.is_virtual {
            return Ok(true);
        }
        if !self.is_valid() {
            return Ok(false);
        }
        self.pool.is_id_used(self.id)
    }

    pub fn is_valid(&self) -> bool {
        self.id > 0
    }

    /// Таблица данных записи
    pub fn data_tbl(&mut self) -> Result<String> {
        if let Some(tbl) = &self.data_tbl {
            return Ok(tbl.clone());
        }
        let tbl = self.get_meta_field("pool_datatbl", false)?.to_text();
        if tbl.is_empty() {
            return Err(Error::configuration(format!("У записи {} нет таблицы данных", self.id)));
        }
        self.data_tbl = Some(tbl.clone());
        Ok(tbl)
    }

    /// Id строки в таблице данных
    pub fn data_ref(&mut self) -> Result<EntryId> {
        if self.data_ref > 0 {
            return Ok(self.data_ref);
        }
        self.data_ref = self
            .get_meta_field("pool_dataref", false)?
            .as_i64()
            .unwrap_or(0);
        Ok(self.data_ref)
    }

    fn layer_table(&mut self, meta: bool) -> Result<String> {
        if meta {
            Ok(META_TABLE.to_string())
        } else {
            self.data_tbl()
        }
    }

    pub fn serialize_value(&mut self, field: &str, value: Value, meta: bool) -> Result<Value> {
        let table = self.layer_table(meta)?;
        self.pool.structure().serialize(&table, field, value)
    }

    pub fn deserialize_value(&mut self, field: &str, value: Value, meta: bool) -> Result<Value> {
        let table = self.layer_table(meta)?;
        self.pool.structure().deserialize(&table, field, value)
    }

    // Изменения до фиксации

    /// Помещает значение поля метаданных в изменения
    pub fn set_meta(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        let value = self.deserialize_value(field, value.into(), true)?;
        self.meta.set(field, value);
        Ok(())
    }

    /// Помещает значение поля данных в изменения
    pub fn set_data(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        let value = self.deserialize_value(field, value.into(), false)?;
        self.data.set(field, value);
        Ok(())
    }

    pub fn update_meta(&mut self, values: Record) -> Result<()> {
        for (field, value) in values {
            self.set_meta(&field, value)?;
        }
        Ok(())
    }

    pub fn update_data(&mut self, values: Record) -> Result<()> {
        for (field, value) in values {
            self.set_data(&field, value)?;
        }
        Ok(())
    }

    /// Ставит файл в очередь на фиксацию
    pub fn set_file(&mut self, key: &str, file: File) -> Result<()> {
        if key.is_empty() {
            return Err(Error::validation("Пустой ключ файла"));
        }
        self.files.set(key, file);
        Ok(())
    }

    // Транзакции

    /// Записывает изменения метаданных, данных и файлов и фиксирует транзакцию
    ///
    /// При ошибке замененные файлы восстанавливаются, изменения
    /// отбрасываются и транзакция откатывается.
    pub fn commit(&mut self, user: &str) -> Result<()> {
        self.touch(user)?;
        let mut files = self.files.take_temp();
        match self.write_changes(&mut files) {
            Ok(()) => {
                self.cleanup(&mut files);
                let meta = self.meta.take_temp();
                if !self.meta.is_empty() {
                    self.meta.set_content(meta);
                }
                let data = self.data.take_temp();
                if !self.data.is_empty() {
                    self.data.set_content(data);
                }
                if !self.files.is_empty() {
                    let id = self.id;
                    self.files
                        .set_content(files.values().map(|file| file.to_record(id)));
                }
                log::debug!("Entry {} committed", self.id);
                Ok(())
            }
            Err(e) => {
                log::warn!("Commit of entry {} failed: {}", self.id, e);
                self.rollback_files(&mut files);
                if let Err(undo) = self.undo() {
                    log::warn!("Undo of entry {} failed: {}", self.id, undo);
                }
                Err(e)
            }
        }
    }

    fn write_changes(&mut self, files: &mut indexmap::IndexMap<String, File>) -> Result<()> {
        if self.meta.has_temp() {
            let temp = self.meta.temp().clone();
            self.pool.update_fields(META_TABLE, self.id, temp, "id", false)?;
        }
        if self.data.has_temp() {
            let table = self.data_tbl()?;
            let data_ref = self.data_ref()?;
            let temp = self.data.temp().clone();
            self.pool.update_fields(&table, data_ref, temp, "id", false)?;
        }
        if !files.is_empty() {
            self.commit_files(files)?;
        }
        self.pool.commit()
    }

    /// Отбрасывает изменения и откатывает транзакцию
    pub fn undo(&mut self) -> Result<()> {
        self.meta.empty_temp();
        self.data.empty_temp();
        self.files.empty_temp();
        self.pool.undo()
    }

    // Чтение

    /// Значение поля метаданных; `from_db` читает мимо кеша
    pub fn get_meta_field(&mut self, field: &str, from_db: bool) -> Result<Value> {
        if field == "id" {
            return Ok(Value::Int(self.id));
        }
        if !from_db {
            if let Some(value) = self.meta.get(field) {
                return Ok(value.clone());
            }
        }
        let value = self.select_field(META_TABLE, field, self.id)?;
        let value = self.pool.structure().deserialize(META_TABLE, field, value)?;
        if !self.meta.is_empty() {
            self.meta
                .set_content(Record::from([(field.to_string(), value.clone())]));
        }
        Ok(value)
    }

    /// Значение поля данных; `from_db` читает мимо кеша
    pub fn get_data_field(&mut self, field: &str, from_db: bool) -> Result<Value> {
        if !from_db {
            if let Some(value) = self.data.get(field) {
                return Ok(value.clone());
            }
        }
        let table = self.data_tbl()?;
        let data_ref = self.data_ref()?;
        let value = self.select_field(&table, field, data_ref)?;
        let value = self.pool.structure().deserialize(&table, field, value)?;
        if !self.data.is_empty() {
            self.data
                .set_content(Record::from([(field.to_string(), value.clone())]));
        }
        Ok(value)
    }

    /// Все поля метаданных с примененными изменениями
    pub fn get_meta(&mut self) -> Result<Record> {
        if self.meta.is_empty() && !self.load(PreloadOption::Meta, false)? {
            return Err(Error::not_found(self.id));
        }
        let mut meta = self.meta.copy();
        meta.insert("id".to_string(), Value::Int(self.id));
        Ok(meta)
    }

    /// Все поля данных; `None`, если таблица данных не зарегистрирована
    pub fn get_data(&mut self) -> Result<Option<Record>> {
        if !self.data.is_empty() {
            return Ok(Some(self.data.copy()));
        }
        let table = self.data_tbl()?;
        if !self.pool.structure().contains(&table) {
            return Ok(None);
        }
        if !self.preload_data()? {
            return Ok(None);
        }
        Ok(Some(self.data.copy()))
    }

    // Немедленная запись

    /// Записывает поле метаданных и сразу фиксирует транзакцию
    pub fn set_meta_field(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        if IMMUTABLE_META_FIELDS.contains(&field) {
            return Err(Error::validation(format!("Поле {} нельзя изменить", field)));
        }
        let value = self
            .pool
            .structure()
            .deserialize(META_TABLE, field, value.into())?;
        self.pool.update_fields(
            META_TABLE,
            self.id,
            Record::from([(field.to_string(), value.clone())]),
            "id",
            false,
        )?;
        self.pool.commit()?;
        if !self.meta.is_empty() {
            self.meta.set_content(Record::from([(field.to_string(), value)]));
        }
        Ok(())
    }

    /// Записывает поле данных и сразу фиксирует транзакцию
    ///
    /// Возвращает `false` для `id` и для записи без строки данных.
    pub fn set_data_field(&mut self, field: &str, value: impl Into<Value>) -> Result<bool> {
        if field == "id" {
            return Ok(false);
        }
        let data_ref = self.data_ref()?;
        if data_ref <= 0 {
            return Ok(false);
        }
        let table = self.data_tbl()?;
        let value = self.pool.structure().deserialize(&table, field, value.into())?;
        self.pool.update_fields(
            &table,
            data_ref,
            Record::from([(field.to_string(), value.clone())]),
            "id",
            false,
        )?;
        self.pool.commit()?;
        if !self.data.is_empty() {
            self.data.set_content(Record::from([(field.to_string(), value)]));
        }
        Ok(true)
    }

    /// Ставит в изменения время и автора изменения
    pub fn touch(&mut self, user: &str) -> Result<()> {
        let now = self.pool.get_db_date(None)?;
        self.meta.set("pool_change", Value::DateTime(now));
        self.meta.set("pool_changedby", Value::from(user));
        Ok(())
    }

    /// Создает копию записи с новым id
    ///
    /// Копия не зафиксирована. Если файл исходной записи отсутствует на
    /// диске, копия удаляется и возвращается `None`.
    pub fn duplicate(&mut self, duplicate_files: bool) -> Result<Option<Entry<'p>>> {
        self.load(PreloadOption::All, false)?;
        let table = self.data_tbl()?;
        let mut copy = self.pool.create_entry(&table, 0, "")?;
        copy.meta.update(self.get_meta()?, false);
        if let Some(mut data) = self.get_data()? {
            data.shift_remove("id");
            copy.data.update(data, false);
        }
        if duplicate_files && !self.duplicate_files(&mut copy)? {
            self.pool.delete_entry(copy.id)?;
            return Ok(None);
        }
        Ok(Some(copy))
    }

    // Загрузка

    /// Загружает набор полей одним запросом
    ///
    /// Без `reload` уже загруженные слои повторно не читаются. Возвращает
    /// `false`, если строка записи не найдена.
    pub fn load(&mut self, option: PreloadOption, reload: bool) -> Result<bool> {
        if self.is_virtual || option == PreloadOption::Skip {
            return Ok(true);
        }
        if !reload {
            let cached = match option {
                PreloadOption::All | PreloadOption::StdMetaData | PreloadOption::MetaData => {
                    !self.meta.is_empty() && !self.data.is_empty()
                }
                PreloadOption::StdMeta | PreloadOption::Meta => !self.meta.is_empty(),
                PreloadOption::Skip => true,
            };
            if cached {
                return Ok(true);
            }
        }
        let meta_fields = self.pool.structure().meta_fields().to_vec();
        let std_meta = self.pool.structure().std_meta().to_vec();
        match option {
            PreloadOption::All | PreloadOption::MetaData => {
                if self.data_tbl.is_none() || self.data_ref <= 0 {
                    if !self.preload_meta(&meta_fields)? {
                        return Ok(false);
                    }
                    self.preload_data()?;
                    Ok(true)
                } else {
                    self.preload_all(&meta_fields)
                }
            }
            PreloadOption::StdMetaData => self.preload_all(&std_meta),
            PreloadOption::StdMeta => self.preload_meta(&std_meta),
            PreloadOption::Meta => self.preload_meta(&meta_fields),
            PreloadOption::Skip => Ok(true),
        }
    }

    fn preload_meta(&mut self, fields: &[String]) -> Result<bool> {
        let Some(meta) = self.select_row(META_TABLE, fields, self.id)? else {
            return Ok(false);
        };
        let meta = self.pool.structure().deserialize_record(META_TABLE, meta)?;
        self.take_refs(&meta)?;
        self.update_cache(Some(meta), None);
        Ok(true)
    }

    fn preload_data(&mut self) -> Result<bool> {
        let table = self.data_tbl()?;
        let fields = self.pool.structure().ensure_table(&table)?.to_vec();
        let data_ref = self.data_ref()?;
        let Some(data) = self.select_row(&table, &fields, data_ref)? else {
            return Ok(false);
        };
        let data = self.pool.structure().deserialize_record(&table, data)?;
        self.update_cache(None, Some(data));
        Ok(true)
    }

    fn preload_all(&mut self, meta_fields: &[String]) -> Result<bool> {
        let table = self.data_tbl()?;
        let data_fields = self.pool.structure().ensure_table(&table)?.to_vec();
        let fields: Vec<&str> = meta_fields
            .iter()
            .chain(data_fields.iter())
            .map(String::as_str)
            .collect();
        let parameter = Record::from([("id".to_string(), Value::Int(self.id))]);
        let (sql, values) = self
            .pool
            .fmt_sql_select(&fields, &parameter, &table, &SelectOptions::new())?;
        let Some(mut row) = self.pool.query(&sql, &values)?.into_iter().next() else {
            return Ok(false);
        };
        let data_row = row.split_off(meta_fields.len().min(row.len()));
        let meta_names: Vec<&str> = meta_fields.iter().map(String::as_str).collect();
        let data_names: Vec<&str> = data_fields.iter().map(String::as_str).collect();
        let meta = self
            .pool
            .structure()
            .deserialize_record(META_TABLE, Pool::convert_rec_to_dict(row, &meta_names))?;
        let data = self
            .pool
            .structure()
            .deserialize_record(&table, Pool::convert_rec_to_dict(data_row, &data_names))?;
        self.update_cache(Some(meta), Some(data));
        Ok(true)
    }

    /// Запоминает таблицу и ссылку данных из прочитанных метаданных
    fn take_refs(&mut self, meta: &Record) -> Result<()> {
        if let Some(tbl) = meta.get("pool_datatbl").map(Value::to_text) {
            if !tbl.is_empty() {
                if !self.pool.structure().contains(&tbl) || tbl == META_TABLE {
                    return Err(Error::configuration(format!(
                        "Запись {} ссылается на неизвестную таблицу данных {}",
                        self.id, tbl
                    )));
                }
                self.data_tbl = Some(tbl);
            }
        }
        if let Some(data_ref) = meta.get("pool_dataref").and_then(Value::as_i64) {
            self.data_ref = data_ref;
        }
        Ok(())
    }

    fn select_row(&self, table: &str, fields: &[String], id: EntryId) -> Result<Option<Record>> {
        let names: Vec<&str> = fields.iter().map(String::as_str).collect();
        let parameter = Record::from([("id".to_string(), Value::Int(id))]);
        let (sql, values) =
            self.pool
                .fmt_sql_select(&names, &parameter, table, &SelectOptions::new().single_table())?;
        Ok(self
            .pool
            .query(&sql, &values)?
            .into_iter()
            .next()
            .map(|row| Pool::convert_rec_to_dict(row, &names)))
    }

    fn select_field(&self, table: &str, field: &str, id: EntryId) -> Result<Value> {
        let parameter = Record::from([("id".to_string(), Value::Int(id))]);
        let (sql, values) =
            self.pool
                .fmt_sql_select(&[field], &parameter, table, &SelectOptions::new().single_table())?;
        self.pool
            .query(&sql, &values)?
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .ok_or_else(|| Error::not_found(self.id))
    }

    // Кеш

    pub(crate) fn update_cache(&mut self, meta: Option<Record>, data: Option<Record>) {
        if let Some(meta) = meta {
            self.meta.set_content(meta);
        }
        if let Some(data) = data {
            self.data.set_content(data);
        }
    }

    /// Ставит метаданные новой записи
    pub(crate) fn init_new(&mut self, data_tbl: &str, user: &str) -> Result<()> {
        let now = self.pool.get_db_date(None)?;
        self.data_tbl = Some(data_tbl.to_string());
        let mut meta = Record::new();
        meta.insert("pool_create".to_string(), Value::DateTime(now));
        meta.insert("pool_change".to_string(), Value::DateTime(now));
        meta.insert("pool_createdby".to_string(), Value::from(user));
        meta.insert("pool_changedby".to_string(), Value::from(user));
        meta.insert("pool_datatbl".to_string(), Value::from(data_tbl));
        self.meta.update(meta, true);
        Ok(())
    }

    /// Сбрасывает кеш и изменения
    pub fn clear(&mut self) {
        self.meta.clear();
        self.data.clear();
        self.files.clear();
    }

    // Полнотекстовый индекс

    /// Создает или заменяет текст записи в полнотекстовом индексе
    pub fn write_fulltext(&self, text: &str) -> Result<()> {
        let parameter = Record::from([("id".to_string(), Value::Int(self.id))]);
        let (sql, values) = self.pool.fmt_sql_select(
            &["id"],
            &parameter,
            FULLTEXT_TABLE,
            &SelectOptions::new().single_table(),
        )?;
        let data = Record::from([("text".to_string(), Value::from(text))]);
        if self.pool.query(&sql, &values)?.is_empty() {
            let mut data = data;
            data.insert("id".to_string(), Value::Int(self.id));
            self.pool.insert_fields(FULLTEXT_TABLE, data, None)?;
        } else {
            self.pool
                .update_fields(FULLTEXT_TABLE, self.id, data, "id", false)?;
        }
        Ok(())
    }

    /// Текст записи из полнотекстового индекса; пустая строка, если его нет
    pub fn get_fulltext(&self) -> Result<String> {
        let parameter = Record::from([("id".to_string(), Value::Int(self.id))]);
        let (sql, values) = self.pool.fmt_sql_select(
            &["text"],
            &parameter,
            FULLTEXT_TABLE,
            &SelectOptions::new().single_table(),
        )?;
        let value = self
            .pool
            .query(&sql, &values)?
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next());
        Ok(match value {
            None | Some(Value::Null) => String::new(),
            Some(Value::Bytes(bytes)) => self.pool.encode_text(&bytes),
            Some(text) => text.to_text(),
        })
    }

    pub fn delete_fulltext(&self) -> Result<bool> {
        self.pool.delete_records(
            FULLTEXT_TABLE,
            &Record::from([("id".to_string(), Value::Int(self.id))]),
        )
    }
}
