//! Файлы записей
//!
//! Новый файл пишется во временный файл рядом с целевым, заменяемый файл
//! переименовывается в резервную копию, затем временный файл занимает
//! постоянное место и обновляется строка `pool_files`. Резервные копии
//! удаляются после фиксации транзакции или возвращаются на место при
//! ошибке. Запись в один слот `(id, filekey)` сериализуется мьютексом пула.

use crate::common::{EntryId, Error, Record, Result, Value, FILES_TABLE};
use crate::core::entry::Entry;
use crate::core::pool::Pool;
use crate::query::{Operator, SelectOptions};
use crate::storage::{File, FileRecord, FileStorage};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Источник файла для `Entry::commit_file`
#[derive(Debug)]
pub enum FileInput {
    File(File),
    /// Внешний файл на диске
    Path(PathBuf),
    /// Файл, уже сохраненный в пуле; содержимое копируется
    Record(FileRecord),
}

impl From<File> for FileInput {
    fn from(file: File) -> Self {
        FileInput::File(file)
    }
}

impl From<PathBuf> for FileInput {
    fn from(path: PathBuf) -> Self {
        FileInput::Path(path)
    }
}

impl From<&Path> for FileInput {
    fn from(path: &Path) -> Self {
        FileInput::Path(path.to_path_buf())
    }
}

impl From<FileRecord> for FileInput {
    fn from(record: FileRecord) -> Self {
        FileInput::Record(record)
    }
}

impl FileInput {
    fn into_file(self, key: &str, root: &Path) -> Result<File> {
        let mut file = match self {
            FileInput::File(file) => file,
            FileInput::Path(path) => File::from_path(key, path)?,
            FileInput::Record(record) => {
                let mut file = File::from_record(&record, root);
                file.fileid = 0;
                file.tempfile = true;
                file
            }
        };
        file.filekey = key.to_string();
        Ok(file)
    }
}

fn file_records(rows: Vec<Vec<Value>>) -> Vec<FileRecord> {
    rows.into_iter()
        .map(|row| FileRecord::from_record(&Pool::convert_rec_to_dict(row, &FileRecord::COLUMNS)))
        .collect()
}

impl<'p> Entry<'p> {
    /// Описания файлов записи, совпадающие с параметрами
    pub fn file_records(&self, parameter: Record) -> Result<Vec<FileRecord>> {
        let pool = self.pool();
        let mut parameter = parameter;
        parameter.insert("id".to_string(), Value::Int(self.id()));
        let options = SelectOptions::new()
            .single_table()
            .operator("filekey", Operator::Eq)
            .operator("filename", Operator::Eq);
        let (sql, values) = pool.fmt_sql_select(&FileRecord::COLUMNS, &parameter, FILES_TABLE, &options)?;
        Ok(file_records(pool.query(&sql, &values)?))
    }

    /// Файлы записи, совпадающие с параметрами
    pub fn files(&self, parameter: Record) -> Result<Vec<File>> {
        let root = self.pool().root();
        Ok(self
            .file_records(parameter)?
            .iter()
            .map(|record| File::from_record(record, root))
            .collect())
    }

    /// Ключи сохраненных файлов
    pub fn file_keys(&self) -> Result<Vec<String>> {
        let pool = self.pool();
        let sql = format!(
            "SELECT filekey FROM {} WHERE id = {} GROUP BY filekey",
            FILES_TABLE,
            pool.placeholder()
        );
        Ok(pool
            .query(&sql, &[Value::Int(self.id())])?
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .map(|v| v.to_text())
            .collect())
    }

    /// Сохраненный файл по ключу или по `fileid`
    pub fn get_file(&self, key: &str, fileid: Option<i64>) -> Result<Option<File>> {
        if key.is_empty() {
            return Ok(None);
        }
        let parameter = match fileid {
            Some(fileid) => Record::from([("fileid".to_string(), Value::Int(fileid))]),
            None => Record::from([("filekey".to_string(), Value::from(key))]),
        };
        Ok(self.files(parameter)?.into_iter().next())
    }

    fn lookup_file(&self, key: &str) -> Result<Option<FileRecord>> {
        let parameter = Record::from([("filekey".to_string(), Value::from(key))]);
        Ok(self.file_records(parameter)?.into_iter().next())
    }

    /// Записывает файлы по порядку; при ошибке откат делает вызывающий
    pub(crate) fn commit_files(&self, files: &mut IndexMap<String, File>) -> Result<()> {
        for (key, file) in files.iter_mut() {
            self.store_file(key, file)?;
        }
        Ok(())
    }

    /// Сохраняет файл под ключом `key` без фиксации транзакции
    ///
    /// При ошибке прежний файл возвращается на место.
    pub fn commit_file(&self, key: &str, input: impl Into<FileInput>) -> Result<File> {
        if key.is_empty() {
            return Err(Error::validation("Пустой ключ файла"));
        }
        let mut file = input.into().into_file(key, self.pool().root())?;
        match self.store_file(key, &mut file) {
            Ok(()) => Ok(file),
            Err(e) => {
                self.rollback_file(&mut file);
                Err(e)
            }
        }
    }

    fn store_file(&self, key: &str, file: &mut File) -> Result<()> {
        if key.is_empty() {
            return Err(Error::validation("Пустой ключ файла"));
        }
        let pool = self.pool();
        let id = self.id();
        let storage = pool.file_storage();
        // Сохраненный файл другой записи или другого ключа копируется
        if file.entry().is_some_and(|owner| owner != id) || file.filekey != key {
            file.tempfile = true;
        }
        file.filekey = key.to_string();
        file.bind(storage.root(), id);

        let lock = pool.file_lock(id, key);
        let _guard = lock.lock();

        // Строка `pool_files` определяется только слотом (id, filekey)
        let existing = self.lookup_file(key)?;
        file.fileid = existing.as_ref().map_or(0, |r| r.fileid);
        if file.tempfile {
            if file.size > storage.max_file_size() {
                return Err(Error::validation(format!(
                    "Файл {} больше допустимых {} байт",
                    file.filename,
                    storage.max_file_size()
                )));
            }
            let relative = FileStorage::relative_path_for(id, key, &file.extension);
            let target = storage.abs_path(&relative)?;
            let mut reader = file.take_reader()?;
            let (temp, size) = storage.write_temp(&target, &mut reader)?;
            drop(reader);

            if let Err(e) = self.replace_file(storage, existing.as_ref(), &relative, &target, &temp, file) {
                remove_quietly(&temp);
                restore_backups(storage, file);
                return Err(e);
            }
            file.created = Some(target);
            file.mark_stored(relative, size);
        }
        update_file_meta(pool, id, file)
    }

    fn replace_file(
        &self,
        storage: &FileStorage,
        existing: Option<&FileRecord>,
        relative: &str,
        target: &Path,
        temp: &Path,
        file: &mut File,
    ) -> Result<()> {
        if let Some(old) = existing.filter(|r| !r.path.is_empty() && r.path != relative) {
            let old_path = storage.abs_path(&old.path)?;
            if let Some(backup) = storage.backup(&old_path)? {
                file.delete_on_success.push((backup, old_path));
            }
        }
        if let Some(backup) = storage.backup(target)? {
            file.delete_on_success.push((backup, target.to_path_buf()));
        }
        storage.move_into_place(temp, target)
    }

    /// Удаляет резервные копии записанных файлов
    pub fn cleanup(&self, files: &mut IndexMap<String, File>) {
        let storage = self.pool().file_storage();
        for file in files.values_mut() {
            let backups: Vec<PathBuf> = file.delete_on_success.drain(..).map(|(backup, _)| backup).collect();
            storage.cleanup(&backups);
            file.created = None;
        }
    }

    /// Удаляет записанные файлы и возвращает резервные копии на место
    pub fn rollback_files(&self, files: &mut IndexMap<String, File>) {
        for file in files.values_mut() {
            self.rollback_file(file);
        }
    }

    fn rollback_file(&self, file: &mut File) {
        if let Some(created) = file.created.take() {
            remove_quietly(&created);
        }
        restore_backups(self.pool().file_storage(), file);
    }

    /// Копирует файлы записи в `copy`
    ///
    /// Возвращает `false`, если какого-то файла нет на диске; остальные
    /// файлы при этом копируются.
    pub fn duplicate_files(&self, copy: &mut Entry<'_>) -> Result<bool> {
        let mut complete = true;
        for file in self.files(Record::new())? {
            if !file.exists() {
                log::warn!("File {} of entry {} is missing", file.path, self.id());
                complete = false;
                continue;
            }
            let record = file.to_record(self.id());
            let key = record.filekey.clone();
            copy.commit_file(&key, FileInput::Record(record))?;
        }
        Ok(complete)
    }

    /// Удаляет файл по ключу с диска и из `pool_files`
    pub fn delete_file(&mut self, key: &str) -> Result<bool> {
        self.files.remove(key);
        let Some(file) = self.get_file(key, None)? else {
            return Ok(false);
        };
        let pool = self.pool();
        let lock = pool.file_lock(self.id(), key);
        let _guard = lock.lock();
        pool.file_storage().delete(&file.path)?;
        pool.delete_records(
            FILES_TABLE,
            &Record::from([("fileid".to_string(), Value::Int(file.fileid))]),
        )?;
        Ok(true)
    }

    /// Меняет имя файла `key`
    pub fn rename_file(&mut self, key: &str, filename: &str) -> Result<bool> {
        self.files.remove(key);
        let Some(file) = self.get_file(key, None)? else {
            return Ok(false);
        };
        self.pool().update_fields(
            FILES_TABLE,
            file.fileid,
            Record::from([("filename".to_string(), Value::from(filename))]),
            "fileid",
            false,
        )?;
        Ok(true)
    }
}

/// Вставляет или обновляет строку `pool_files`
fn update_file_meta(pool: &Pool, id: EntryId, file: &mut File) -> Result<()> {
    let mut data = file.to_record(id).to_record();
    if file.fileid > 0 {
        data.shift_remove("id");
        pool.update_fields(FILES_TABLE, file.fileid, data, "fileid", false)?;
    } else {
        let (_, fileid) = pool.insert_fields(FILES_TABLE, data, Some("fileid"))?;
        file.fileid = fileid;
    }
    Ok(())
}

fn restore_backups(storage: &FileStorage, file: &mut File) {
    for (backup, original) in file.delete_on_success.drain(..).rev() {
        if let Err(e) = storage.restore(&backup, &original) {
            log::error!("Restoring {} failed: {}", original.display(), e);
        }
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("File {} not removed: {}", path.display(), e);
        }
    }
}

impl Pool {
    /// Поиск файлов по параметрам `pool_files`
    pub fn search_files(
        &self,
        parameter: &Record,
        sort: &str,
        start: usize,
        max: usize,
        ascending: bool,
    ) -> Result<Vec<FileRecord>> {
        let options = SelectOptions::new()
            .single_table()
            .sort(sort)
            .ascending(ascending)
            .limit(start, max);
        let (sql, values) = self.fmt_sql_select(&FileRecord::COLUMNS, parameter, FILES_TABLE, &options)?;
        Ok(file_records(self.query(&sql, &values)?))
    }

    /// Файлы с точным именем
    pub fn search_filename(&self, filename: &str) -> Result<Vec<FileRecord>> {
        let parameter = Record::from([("filename".to_string(), Value::from(filename))]);
        self.search_files(&parameter, "filename", 0, 100, true)
    }

    /// Удаляет все файлы записи с диска и из `pool_files`
    pub fn delete_files(&self, id: EntryId) -> Result<usize> {
        let parameter = Record::from([("id".to_string(), Value::Int(id))]);
        let options = SelectOptions::new().single_table();
        let (sql, values) = self.fmt_sql_select(&FileRecord::COLUMNS, &parameter, FILES_TABLE, &options)?;
        let records = file_records(self.query(&sql, &values)?);
        for record in &records {
            let lock = self.file_lock(id, &record.filekey);
            let _guard = lock.lock();
            self.file_storage().delete(&record.path)?;
        }
        self.delete_records(FILES_TABLE, &parameter)?;
        Ok(records.len())
    }
}
