//! Константы для datapool

/// Таблица метаданных всех записей
pub const META_TABLE: &str = "pool_meta";

/// Таблица файловых записей
pub const FILES_TABLE: &str = "pool_files";

/// Таблица полнотекстового индекса
pub const FULLTEXT_TABLE: &str = "pool_fulltext";

/// Таблица локальных групп
pub const GROUPS_TABLE: &str = "pool_groups";

/// Системная таблица ключ/значение
pub const SYSTEM_TABLE: &str = "pool_sys";

/// Псевдоним таблицы метаданных в запросах
pub const META_ALIAS: &str = "meta__";

/// Псевдоним таблицы данных в запросах
pub const DATA_ALIAS: &str = "data__";

/// Поля метаданных, которые нельзя изменить после создания записи
pub const IMMUTABLE_META_FIELDS: [&str; 3] = ["id", "pool_datatbl", "pool_dataref"];

/// Максимальная глубина поиска предков
pub const MAX_PARENT_DEPTH: usize = 10;

/// Максимальный размер файла по умолчанию (500 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 500 * 1000 * 1024;

/// Размер блока при копировании файлов
pub const FILE_COPY_CHUNK_SIZE: usize = 10_000;

/// Размер блока при потоковой отдаче файлов
pub const FILE_ITER_CHUNK_SIZE: usize = 10 * 1024;

/// Максимальная длина расширения файла
pub const MAX_EXTENSION_LENGTH: usize = 5;

/// Каталог корзины внутри корня пула
pub const TRASHCAN_DIR: &str = "_trashcan";

/// Префикс для сериализованных списков без известного типа
pub const JSON_PREFIX: &str = "_json_";

/// Формат даты и времени в базе данных
pub const DB_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Формат даты в базе данных
pub const DB_DATE_FORMAT: &str = "%Y-%m-%d";

/// Формат времени в базе данных
pub const DB_TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Максимальная длина имени таблицы
pub const MAX_TABLE_NAME_LENGTH: usize = 64;

/// Максимальная длина имени колонки
pub const MAX_COLUMN_NAME_LENGTH: usize = 64;

/// Размер VARCHAR для списочных типов без явного размера
pub const DEFAULT_LIST_COLUMN_SIZE: u32 = 2048;

/// Размер VARCHAR для строк без явного размера
pub const DEFAULT_STRING_COLUMN_SIZE: u32 = 255;

/// Таймаут соединения по умолчанию (в секундах)
pub const DEFAULT_CONNECTION_TIMEOUT: u64 = 3;

/// Интервал повторной проверки соединения по умолчанию (в секундах)
pub const DEFAULT_REVALIDATE_INTERVAL: u64 = 60;
