//! Тесты для модуля storage
//!
//! Сквозные проверки схемы: структура, менеджер базы данных и файловое
//! хранилище вместе.

pub mod schema_tests;
