//! Файл записи пула и потоковое чтение

use crate::common::{
    EntryId, Error, Record, Result, Value, FILE_ITER_CHUNK_SIZE, MAX_EXTENSION_LENGTH,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Строка таблицы `pool_files`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub fileid: i64,
    /// Запись-владелец
    pub id: EntryId,
    pub filekey: String,
    pub filename: String,
    /// Путь относительно корня пула
    pub path: String,
    pub size: u64,
    pub extension: String,
    pub version: String,
}

impl FileRecord {
    /// Колонки `pool_files` в порядке чтения
    pub const COLUMNS: [&'static str; 8] = [
        "fileid", "id", "filekey", "filename", "path", "size", "extension", "version",
    ];

    /// Создает описание из строки базы данных
    pub fn from_record(record: &Record) -> Self {
        let text = |key: &str| record.get(key).map(Value::to_text).unwrap_or_default();
        let int = |key: &str| record.get(key).and_then(Value::as_i64).unwrap_or(0);
        Self {
            fileid: int("fileid"),
            id: int("id"),
            filekey: text("filekey"),
            filename: text("filename"),
            path: text("path"),
            size: u64::try_from(int("size")).unwrap_or(0),
            extension: text("extension"),
            version: text("version"),
        }
    }

    /// Поля для записи в `pool_files` без `fileid`
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("id".to_string(), Value::Int(self.id));
        record.insert("filekey".to_string(), Value::from(self.filekey.as_str()));
        record.insert("filename".to_string(), Value::from(self.filename.as_str()));
        record.insert("path".to_string(), Value::from(self.path.as_str()));
        record.insert("size".to_string(), Value::Int(i64::try_from(self.size).unwrap_or(i64::MAX)));
        record.insert("extension".to_string(), Value::from(self.extension.as_str()));
        record.insert("version".to_string(), Value::from(self.version.as_str()));
        record
    }
}

/// Источник содержимого файла, еще не записанного в пул
pub enum FileSource {
    /// Содержимое уже лежит в пуле по `path`
    Stored,
    Bytes(Vec<u8>),
    /// Внешний файл; читается при фиксации
    Path(PathBuf),
    Reader(Box<dyn Read + Send>),
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSource::Stored => write!(f, "Stored"),
            FileSource::Bytes(b) => write!(f, "Bytes({})", b.len()),
            FileSource::Path(p) => write!(f, "Path({})", p.display()),
            FileSource::Reader(_) => write!(f, "Reader"),
        }
    }
}

/// Файл записи пула
///
/// Новый файл несет источник содержимого; после фиксации `path` указывает
/// на постоянное место относительно корня пула. Файл, прочитанный из пула,
/// привязан к корню и записи и читается по абсолютному пути.
#[derive(Debug)]
pub struct File {
    pub filekey: String,
    pub filename: String,
    pub size: u64,
    pub extension: String,
    pub path: String,
    pub fileid: i64,
    pub version: String,
    /// Файл еще не записан в пул
    pub tempfile: bool,
    source: FileSource,
    root: Option<PathBuf>,
    entry: Option<EntryId>,
    /// Резервные копии и исходные пути; копии удаляются после успешной фиксации
    pub(crate) delete_on_success: Vec<(PathBuf, PathBuf)>,
    /// Файл, созданный фиксацией на месте, где раньше ничего не было
    pub(crate) created: Option<PathBuf>,
}

impl File {
    fn with_source(filekey: impl Into<String>, filename: impl Into<String>, source: FileSource) -> Self {
        let filename = filename.into();
        Self {
            filekey: filekey.into(),
            extension: extension_of(&filename),
            filename,
            size: 0,
            path: String::new(),
            fileid: 0,
            version: String::new(),
            tempfile: !matches!(source, FileSource::Stored),
            source,
            root: None,
            entry: None,
            delete_on_success: Vec::new(),
            created: None,
        }
    }

    /// Новый файл из байтов
    pub fn from_bytes(filekey: impl Into<String>, filename: impl Into<String>, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        let mut file = Self::with_source(filekey, filename, FileSource::Bytes(data));
        file.size = size;
        file
    }

    /// Новый файл из внешнего пути; имя берется из пути
    pub fn from_path(filekey: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let meta = fs::metadata(path).map_err(|_| Error::file_not_found(path.display().to_string()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut file = Self::with_source(filekey, filename, FileSource::Path(path.to_path_buf()));
        file.size = meta.len();
        Ok(file)
    }

    /// Новый файл из потока
    pub fn from_reader(
        filekey: impl Into<String>,
        filename: impl Into<String>,
        reader: Box<dyn Read + Send>,
    ) -> Self {
        Self::with_source(filekey, filename, FileSource::Reader(reader))
    }

    /// Файл, уже сохраненный в пуле
    pub fn from_record(record: &FileRecord, root: &Path) -> Self {
        Self {
            filekey: record.filekey.clone(),
            filename: record.filename.clone(),
            size: record.size,
            extension: record.extension.clone(),
            path: record.path.clone(),
            fileid: record.fileid,
            version: record.version.clone(),
            tempfile: false,
            source: FileSource::Stored,
            root: Some(root.to_path_buf()),
            entry: Some(record.id),
            delete_on_success: Vec::new(),
            created: None,
        }
    }

    /// Описание для таблицы `pool_files`
    pub fn to_record(&self, id: EntryId) -> FileRecord {
        FileRecord {
            fileid: self.fileid,
            id,
            filekey: self.filekey.clone(),
            filename: self.filename.clone(),
            path: self.path.clone(),
            size: self.size,
            extension: self.extension.clone(),
            version: self.version.clone(),
        }
    }

    /// Привязывает файл к записи и корню пула
    pub(crate) fn bind(&mut self, root: &Path, entry: EntryId) {
        self.root = Some(root.to_path_buf());
        self.entry = Some(entry);
    }

    /// Запись, к которой привязан файл
    pub fn entry(&self) -> Option<EntryId> {
        self.entry
    }

    /// Абсолютный путь содержимого, если оно лежит на диске
    pub fn abs_path(&self) -> Option<PathBuf> {
        match &self.source {
            FileSource::Path(p) => Some(p.clone()),
            FileSource::Stored if !self.path.is_empty() => {
                self.root.as_ref().map(|root| root.join(&self.path))
            }
            _ => None,
        }
    }

    pub fn exists(&self) -> bool {
        match &self.source {
            FileSource::Bytes(_) | FileSource::Reader(_) => true,
            _ => self.abs_path().is_some_and(|p| p.is_file()),
        }
    }

    /// Забирает поток содержимого для записи в пул
    pub(crate) fn take_reader(&mut self) -> Result<Box<dyn Read + Send>> {
        match std::mem::replace(&mut self.source, FileSource::Stored) {
            FileSource::Bytes(data) => Ok(Box::new(Cursor::new(data))),
            FileSource::Reader(reader) => Ok(reader),
            FileSource::Path(path) => {
                let file = fs::File::open(&path).map_err(|_| Error::file_not_found(path.display().to_string()))?;
                Ok(Box::new(file))
            }
            FileSource::Stored => {
                let path = self
                    .abs_path()
                    .ok_or_else(|| Error::file_not_found(self.filename.clone()))?;
                let file = fs::File::open(&path).map_err(|_| Error::file_not_found(path.display().to_string()))?;
                Ok(Box::new(file))
            }
        }
    }

    /// Помечает файл как сохраненный по относительному пути
    pub(crate) fn mark_stored(&mut self, path: String, size: u64) {
        self.path = path;
        self.size = size;
        self.tempfile = false;
        self.source = FileSource::Stored;
    }

    /// Читает содержимое целиком
    pub fn read(&mut self) -> Result<Vec<u8>> {
        match &self.source {
            FileSource::Bytes(data) => Ok(data.clone()),
            FileSource::Reader(_) => {
                let mut reader = self.take_reader()?;
                let mut data = Vec::new();
                reader.read_to_end(&mut data)?;
                self.source = FileSource::Bytes(data.clone());
                Ok(data)
            }
            _ => {
                let path = self
                    .abs_path()
                    .ok_or_else(|| Error::file_not_found(self.filename.clone()))?;
                fs::read(&path).map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => Error::file_not_found(path.display().to_string()),
                    _ => Error::Io(e),
                })
            }
        }
    }

    /// Потоковое чтение сохраненного файла блоками
    pub fn iter(&self) -> Result<FileIterable> {
        let path = self
            .abs_path()
            .ok_or_else(|| Error::file_not_found(self.filename.clone()))?;
        FileIterable::new(path)
    }
}

/// Расширение файла в нижнем регистре, не длиннее допустимого
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .map(|e| e.chars().take(MAX_EXTENSION_LENGTH).collect())
        .unwrap_or_default()
}

/// Итерируемое содержимое файла с поддержкой диапазонов байтов
#[derive(Debug, Clone)]
pub struct FileIterable {
    path: PathBuf,
    size: u64,
    start: u64,
    end: Option<u64>,
}

impl FileIterable {
    pub fn new(path: PathBuf) -> Result<Self> {
        let size = fs::metadata(&path)
            .map_err(|_| Error::file_not_found(path.display().to_string()))?
            .len();
        Ok(Self {
            path,
            size,
            start: 0,
            end: None,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Ограничивает чтение диапазоном `[start, end)` для ответов с Range
    pub fn app_iter_range(&self, start: u64, end: Option<u64>) -> Self {
        Self {
            path: self.path.clone(),
            size: self.size,
            start,
            end,
        }
    }

    /// Открывает итератор блоков
    pub fn open(&self) -> Result<FileIterator> {
        FileIterator::new(&self.path, self.start, self.end.map_or(self.size, |e| e.min(self.size)))
    }
}

impl IntoIterator for FileIterable {
    type Item = Result<Vec<u8>>;
    type IntoIter = FileIterator;

    fn into_iter(self) -> Self::IntoIter {
        match self.open() {
            Ok(iter) => iter,
            Err(e) => FileIterator::failed(e),
        }
    }
}

/// Итератор блоков файла по 10 КиБ
pub struct FileIterator {
    file: Option<fs::File>,
    remaining: u64,
    error: Option<Error>,
}

impl FileIterator {
    fn new(path: &Path, start: u64, end: u64) -> Result<Self> {
        let mut file = fs::File::open(path).map_err(|_| Error::file_not_found(path.display().to_string()))?;
        file.seek(SeekFrom::Start(start))?;
        Ok(Self {
            file: Some(file),
            remaining: end.saturating_sub(start),
            error: None,
        })
    }

    fn failed(error: Error) -> Self {
        Self {
            file: None,
            remaining: 0,
            error: Some(error),
        }
    }
}

impl Iterator for FileIterator {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.error.take() {
            return Some(Err(e));
        }
        if self.remaining == 0 {
            self.file = None;
            return None;
        }
        let file = self.file.as_mut()?;
        let want = self.remaining.min(FILE_ITER_CHUNK_SIZE as u64) as usize;
        let mut chunk = vec![0u8; want];
        match file.read(&mut chunk) {
            Ok(0) => {
                self.remaining = 0;
                None
            }
            Ok(n) => {
                chunk.truncate(n);
                self.remaining -= n as u64;
                Some(Ok(chunk))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(Error::Io(e)))
            }
        }
    }
}
