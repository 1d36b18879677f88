//! Соединения с базой данных для datapool
//!
//! Драйверы SQLite, MySQL и PostgreSQL, диалекты SQL и кеширование
//! соединений по потокам и запросам.

pub mod dialect;
pub mod driver;
pub mod handle;
pub mod scope;
pub mod sqlite;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use dialect::{Dialect, TreeStrategy};
pub use driver::{driver_for, Driver, QueryOutput, RawConnection, Row};
pub use handle::{Connection, ConnectionState, Cursor};
pub use scope::RequestScope;
