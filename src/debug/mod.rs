//! Отладка пула данных
//!
//! Трассировка SQL инструкций: уровень детализации и файл журнала задаются
//! в конфигурации пула (`debug`, `log`).

pub mod sql_trace;

pub use sql_trace::{SqlTrace, SqlTraceEntry};
