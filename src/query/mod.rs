//! Построитель SQL запросов пула данных

pub mod select;

#[cfg(test)]
pub mod tests;

pub use select::{like_pattern, JoinType, LogicalOperator, Operator, SelectBuilder, SelectOptions};
