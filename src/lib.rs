//! datapool - типизированный иерархический пул объектов поверх SQL
//!
//! Записи пула состоят из строки метаданных `pool_meta`, строки в одной из
//! таблиц данных и набора файлов. Записи образуют дерево через
//! `pool_unitref`, значения полей преобразуются по типам из структуры.
//! Поддерживаются SQLite, MySQL и PostgreSQL.

pub mod cli;
pub mod common;
pub mod connection;
pub mod core;
pub mod debug;
pub mod query;
pub mod storage;

pub use crate::common::error::{Error, Result};
pub use crate::common::types::*;
pub use crate::common::{ConnectionConfig, PoolConfig};
pub use crate::connection::{Connection, Dialect};
pub use crate::core::{BatchOptions, Entry, FileInput, GroupAssignment, Pool, TreeNode};
pub use crate::query::{Operator, SelectOptions};
pub use crate::storage::{File, FileRecord, Structure, StructureConfig};

/// Версия библиотеки
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
