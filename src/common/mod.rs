//! Общие типы и утилиты для datapool

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
pub mod utils;

#[cfg(test)]
pub mod test_utils;

pub use config::*;
pub use constants::*;
pub use error::{Error, Result};
pub use types::*;
pub use utils::*;
