//! Интеграционные тесты для DataPool

pub mod batch_tests;
pub mod common;
pub mod file_tests;
pub mod lifecycle_tests;
pub mod query_tests;
pub mod serialization_tests;
pub mod tree_tests;

pub use common::*;
