//! Тесты построителя запросов

pub mod select_tests;
