//! Интеграционные тесты для DataPool
//!
//! Сквозные сценарии на SQLite во временном каталоге: жизненный цикл
//! записи, файлы, пакетная загрузка, дерево, типы полей и построитель SQL.

mod integration;
