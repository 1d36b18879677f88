//! Файловое хранилище пула
//!
//! Файлы записей лежат под корнем пула по схеме
//! `<root>/<dir(id)>/<id>_<filekey>.<ext>`, где `dir(1234) = "1200/34"`.
//! Запись идет через временный файл рядом с целевым и переименование на
//! место; заменяемый файл сначала переименовывается в резервную копию
//! `_del_`, которая удаляется после успешной фиксации.

use crate::common::{EntryId, Error, PoolConfig, Result, FILE_COPY_CHUNK_SIZE, TRASHCAN_DIR};
use std::fs;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// Файловое хранилище под корнем пула
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    use_trashcan: bool,
    max_file_size: u64,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>, use_trashcan: bool, max_file_size: u64) -> Self {
        Self {
            root: root.into(),
            use_trashcan,
            max_file_size,
        }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.root.clone(), config.use_trashcan, config.max_file_size)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Каталог файлов записи относительно корня
    pub fn directory_for(id: EntryId) -> String {
        let padded = format!("{:06}", id);
        let len = padded.len();
        format!("{}00/{}", &padded[len - 4..len - 2], &padded[len - 2..])
    }

    /// Имя файла записи для слота `filekey`
    pub fn file_name_for(id: EntryId, filekey: &str, extension: &str) -> String {
        if extension.is_empty() {
            format!("{:06}_{}", id, filekey)
        } else {
            format!("{:06}_{}.{}", id, filekey, extension)
        }
    }

    /// Относительный путь файла записи с разделителями `/`
    pub fn relative_path_for(id: EntryId, filekey: &str, extension: &str) -> String {
        format!(
            "{}/{}",
            Self::directory_for(id),
            Self::file_name_for(id, filekey, extension)
        )
    }

    /// Абсолютный путь для относительного; выход за корень запрещен
    pub fn abs_path(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        if relative.is_empty() {
            return Err(Error::validation("Пустой путь файла"));
        }
        for component in path.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(Error::validation(format!(
                        "Путь {} выходит за пределы корня пула",
                        relative
                    )))
                }
            }
        }
        Ok(self.root.join(path))
    }

    /// Путь относительно корня с разделителями `/`
    pub fn relative_path(&self, abs: &Path) -> Result<String> {
        let rel = abs.strip_prefix(&self.root).map_err(|_| {
            Error::validation(format!("Путь {} вне корня пула", abs.display()))
        })?;
        Ok(rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"))
    }

    /// Создает каталоги для файла
    pub fn create_path(&self, abs: &Path) -> Result<()> {
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Путь рядом с `path`: `<stem>_<marker>_<uuid>.<ext>`
    pub fn sibling_path(path: &Path, marker: &str) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut name = format!("{}_{}_{}", stem, marker, Uuid::new_v4());
        if let Some(ext) = path.extension() {
            name.push('.');
            name.push_str(&ext.to_string_lossy());
        }
        path.with_file_name(name)
    }

    /// Пишет поток во временный файл рядом с `target`
    ///
    /// Возвращает путь временного файла и число байтов. При превышении
    /// максимального размера или ошибке ввода-вывода временный файл удаляется.
    pub fn write_temp(&self, target: &Path, reader: &mut dyn Read) -> Result<(PathBuf, u64)> {
        self.create_path(target)?;
        let temp = Self::sibling_path(target, "temp");
        match self.copy_limited(&temp, reader) {
            Ok(size) => Ok((temp, size)),
            Err(e) => {
                if let Err(remove) = fs::remove_file(&temp) {
                    if remove.kind() != std::io::ErrorKind::NotFound {
                        log::warn!("Temp file {} not removed: {}", temp.display(), remove);
                    }
                }
                Err(e)
            }
        }
    }

    fn copy_limited(&self, temp: &Path, reader: &mut dyn Read) -> Result<u64> {
        let mut out = fs::File::create(temp)?;
        let mut buffer = vec![0u8; FILE_COPY_CHUNK_SIZE];
        let mut size = 0u64;
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            size += n as u64;
            if size > self.max_file_size {
                return Err(Error::validation(format!(
                    "Файл больше допустимых {} байт",
                    self.max_file_size
                )));
            }
            out.write_all(&buffer[..n])?;
        }
        out.sync_all()?;
        Ok(size)
    }

    /// Переименовывает существующий файл в резервную копию `_del_`
    pub fn backup(&self, path: &Path) -> Result<Option<PathBuf>> {
        if !path.is_file() {
            return Ok(None);
        }
        let backup = Self::sibling_path(path, "del");
        fs::rename(path, &backup)?;
        Ok(Some(backup))
    }

    /// Возвращает резервную копию на исходное место
    pub fn restore(&self, backup: &Path, original: &Path) -> Result<()> {
        fs::rename(backup, original)?;
        Ok(())
    }

    /// Перемещает временный файл на постоянное место
    pub fn move_into_place(&self, temp: &Path, target: &Path) -> Result<()> {
        self.create_path(target)?;
        fs::rename(temp, target)?;
        Ok(())
    }

    /// Удаляет резервные копии после успешной фиксации; ошибки только логируются
    pub fn cleanup(&self, backups: &[PathBuf]) {
        for backup in backups {
            if let Err(e) = fs::remove_file(backup) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Backup {} not removed: {}", backup.display(), e);
                }
            }
        }
    }

    /// Путь файла в корзине
    pub fn trashcan_path(&self, relative: &str) -> Result<PathBuf> {
        let abs = self.abs_path(relative)?;
        let rel = abs.strip_prefix(&self.root).unwrap_or(&abs);
        Ok(self.root.join(TRASHCAN_DIR).join(rel))
    }

    /// Удаляет файл пула или перемещает его в корзину
    ///
    /// Отсутствующий файл не считается ошибкой. Если перенос в корзину не
    /// удался, ошибка логируется и файл удаляется.
    pub fn delete(&self, relative: &str) -> Result<()> {
        if relative.is_empty() {
            return Ok(());
        }
        let abs = self.abs_path(relative)?;
        if !abs.is_file() {
            return Ok(());
        }
        if self.use_trashcan {
            match self.move_to_trashcan(relative, &abs) {
                Ok(()) => return Ok(()),
                Err(e) => log::warn!("Moving {} to trashcan failed: {}", abs.display(), e),
            }
        }
        fs::remove_file(&abs)?;
        Ok(())
    }

    fn move_to_trashcan(&self, relative: &str, abs: &Path) -> Result<()> {
        let target = self.trashcan_path(relative)?;
        self.create_path(&target)?;
        if target.exists() {
            fs::remove_file(&target)?;
        }
        fs::rename(abs, &target)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn storage(dir: &TempDir, trashcan: bool) -> FileStorage {
        FileStorage::new(dir.path(), trashcan, 100)
    }

    #[test]
    fn test_directory_layout() {
        assert_eq!(FileStorage::directory_for(1234), "1200/34");
        assert_eq!(FileStorage::directory_for(5), "0000/05");
        assert_eq!(FileStorage::directory_for(1234567), "4500/67");
        assert_eq!(
            FileStorage::relative_path_for(12, "icon", "png"),
            "0000/12/000012_icon.png"
        );
        assert_eq!(FileStorage::file_name_for(12, "raw", ""), "000012_raw");
    }

    #[test]
    fn test_abs_path_stays_under_root() {
        let dir = TempDir::new().unwrap();
        let s = storage(&dir, false);
        assert!(s.abs_path("0000/12/a.txt").is_ok());
        assert!(s.abs_path("../etc/passwd").is_err());
        assert!(s.abs_path("/etc/passwd").is_err());
        assert!(s.abs_path("").is_err());
        let abs = s.abs_path("0000/12/a.txt").unwrap();
        assert_eq!(s.relative_path(&abs).unwrap(), "0000/12/a.txt");
    }

    #[test]
    fn test_write_temp_enforces_limit() {
        let dir = TempDir::new().unwrap();
        let s = storage(&dir, false);
        let target = s.abs_path("0000/01/000001_big.bin").unwrap();

        let (temp, size) = s.write_temp(&target, &mut Cursor::new(vec![1u8; 50])).unwrap();
        assert_eq!(size, 50);
        assert!(temp.file_name().unwrap().to_string_lossy().contains("_temp_"));
        s.move_into_place(&temp, &target).unwrap();
        assert_eq!(fs::read(&target).unwrap().len(), 50);

        let err = s.write_temp(&target, &mut Cursor::new(vec![1u8; 150]));
        assert!(matches!(err, Err(Error::Validation { .. })));
        let leftovers = fs::read_dir(target.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_backup_restore_and_cleanup() {
        let dir = TempDir::new().unwrap();
        let s = storage(&dir, false);
        let target = s.abs_path("0000/02/000002_doc.txt").unwrap();
        s.create_path(&target).unwrap();
        fs::write(&target, b"old").unwrap();

        let backup = s.backup(&target).unwrap().unwrap();
        assert!(!target.exists());
        assert!(backup.to_string_lossy().contains("_del_"));
        s.restore(&backup, &target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"old");

        let backup = s.backup(&target).unwrap().unwrap();
        s.cleanup(&[backup.clone()]);
        assert!(!backup.exists());
        assert!(s.backup(&target).unwrap().is_none());
    }

    #[test]
    fn test_delete_moves_to_trashcan() {
        let dir = TempDir::new().unwrap();
        let s = storage(&dir, true);
        let rel = FileStorage::relative_path_for(3, "doc", "txt");
        let abs = s.abs_path(&rel).unwrap();
        s.create_path(&abs).unwrap();
        fs::write(&abs, b"bye").unwrap();

        s.delete(&rel).unwrap();
        assert!(!abs.exists());
        assert_eq!(fs::read(s.trashcan_path(&rel).unwrap()).unwrap(), b"bye");
        s.delete(&rel).unwrap();
    }
}
