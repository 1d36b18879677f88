//! Хранилище пула данных
//!
//! Структура таблиц и типов полей, управление схемой базы данных и
//! файловое хранилище вложений.

pub mod db_manager;
pub mod file;
pub mod file_manager;
pub mod structure;

#[cfg(test)]
pub mod tests;

pub use db_manager::{ColumnInfo, DbColumn, DbManager};
pub use file::{extension_of, File, FileIterable, FileIterator, FileRecord, FileSource};
pub use file_manager::FileStorage;
pub use structure::{Codec, Structure, StructureConfig, SystemTable};
