//! Ядро пула данных
//!
//! Пул, записи и их обертки, файлы записей, дерево и группы.

pub mod entry;
pub mod file_entry;
pub mod groups;
pub mod pool;
pub mod tree;
pub mod wrapper;

#[cfg(test)]
pub mod tests;

pub use entry::Entry;
pub use file_entry::FileInput;
pub use groups::GroupAssignment;
pub use pool::{BatchOptions, Pool};
pub use tree::TreeNode;
pub use wrapper::{FileWrapper, Layer, Wrapper};
