//! Обертки слоев записи: метаданные, данные и файлы
//!
//! Обертка хранит загруженное из базы содержимое и отдельно изменения,
//! ожидающие фиксации. Чтение сначала смотрит в изменения, затем в
//! содержимое. Загрузку содержимого выполняет `Entry`.

use crate::common::{Record, Value, IMMUTABLE_META_FIELDS};
use crate::storage::{File, FileRecord};
use indexmap::IndexMap;

/// Слой записи, к которому относится обертка
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Meta,
    Data,
}

/// Обертка строки таблицы метаданных или данных
#[derive(Debug, Clone)]
pub struct Wrapper {
    layer: Layer,
    content: Option<Record>,
    temp: Record,
}

impl Wrapper {
    pub fn new(layer: Layer) -> Self {
        Self {
            layer,
            content: None,
            temp: Record::new(),
        }
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn is_meta(&self) -> bool {
        self.layer == Layer::Meta
    }

    /// Значение поля: сначала изменения, затем содержимое
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.temp
            .get(key)
            .or_else(|| self.content.as_ref().and_then(|c| c.get(key)))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.temp.contains_key(key) || self.content.as_ref().is_some_and(|c| c.contains_key(key))
    }

    /// Помещает уже преобразованное значение в изменения
    ///
    /// Поля `id`, `pool_datatbl` и `pool_dataref` не изменяются.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if IMMUTABLE_META_FIELDS.contains(&key.as_str()) {
            return;
        }
        self.temp.insert(key, value);
    }

    /// Помещает значения в изменения; `force` пропускает проверку
    /// неизменяемых полей
    pub fn update(&mut self, values: Record, force: bool) {
        for (key, value) in values {
            if force {
                self.temp.insert(key, value);
            } else {
                self.set(key, value);
            }
        }
    }

    /// Копия содержимого с примененными изменениями
    pub fn copy(&self) -> Record {
        let mut out = self.content.clone().unwrap_or_default();
        for (key, value) in &self.temp {
            out.insert(key.clone(), value.clone());
        }
        out
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .content
            .as_ref()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();
        for key in self.temp.keys() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys
    }

    /// Содержимое еще не загружено
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
    }

    pub fn temp(&self) -> &Record {
        &self.temp
    }

    pub fn has_temp(&self) -> bool {
        !self.temp.is_empty()
    }

    pub fn has_temp_key(&self, key: &str) -> bool {
        self.temp.contains_key(key)
    }

    pub fn take_temp(&mut self) -> Record {
        std::mem::take(&mut self.temp)
    }

    pub fn empty_temp(&mut self) {
        self.temp.clear();
    }

    /// Дополняет содержимое значениями
    pub fn set_content(&mut self, values: Record) {
        match self.content.as_mut() {
            Some(content) => content.extend(values),
            None => self.content = Some(values),
        }
    }

    /// Сбрасывает содержимое и изменения
    pub fn clear(&mut self) {
        self.content = None;
        self.temp.clear();
    }
}

/// Обертка файлов записи
///
/// Содержимое - описания сохраненных файлов по `filekey`, изменения -
/// новые файлы, ожидающие фиксации.
#[derive(Debug, Default)]
pub struct FileWrapper {
    content: Option<IndexMap<String, FileRecord>>,
    temp: IndexMap<String, File>,
}

impl FileWrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ставит файл в очередь на фиксацию под ключом `key`
    pub fn set(&mut self, key: impl Into<String>, mut file: File) {
        let key = key.into();
        file.filekey = key.clone();
        file.tempfile = true;
        self.temp.insert(key, file);
    }

    /// Убирает файл из очереди или из загруженного содержимого
    pub fn remove(&mut self, key: &str) {
        if self.temp.shift_remove(key).is_none() {
            if let Some(content) = self.content.as_mut() {
                content.shift_remove(key);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&FileRecord> {
        self.content.as_ref().and_then(|c| c.get(key))
    }

    pub fn get_temp(&self, key: &str) -> Option<&File> {
        self.temp.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.temp.contains_key(key) || self.content.as_ref().is_some_and(|c| c.contains_key(key))
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .content
            .as_ref()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();
        for key in self.temp.keys() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none()
    }

    pub fn has_temp(&self) -> bool {
        !self.temp.is_empty()
    }

    pub fn take_temp(&mut self) -> IndexMap<String, File> {
        std::mem::take(&mut self.temp)
    }

    pub fn empty_temp(&mut self) {
        self.temp.clear();
    }

    /// Дополняет содержимое описаниями файлов
    pub fn set_content(&mut self, records: impl IntoIterator<Item = FileRecord>) {
        let content = self.content.get_or_insert_with(IndexMap::new);
        for record in records {
            content.insert(record.filekey.clone(), record);
        }
    }

    pub fn clear(&mut self) {
        self.content = None;
        self.temp.clear();
    }
}
