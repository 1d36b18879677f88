//! Абстракция драйвера СУБД

use crate::common::{Backend, ConnectionConfig, Error, Result, Value};
use crate::connection::dialect::Dialect;
use std::sync::Arc;

/// Строка результата запроса
pub type Row = Vec<Value>;

/// Результат выполнения одной инструкции
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    /// Имена колонок результата
    pub columns: Vec<String>,
    /// Строки результата
    pub rows: Vec<Row>,
    /// Количество затронутых строк
    pub rowcount: u64,
}

/// Открытое соединение с СУБД
///
/// Транзакция начинается неявно перед первой изменяющей инструкцией и
/// завершается `commit` или `rollback`.
pub trait RawConnection: Send {
    /// Выполняет инструкцию с плейсхолдерами в формате диалекта пула
    fn run(&mut self, sql: &str, params: &[Value]) -> Result<QueryOutput>;

    /// Явно начинает транзакцию
    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Открыта ли транзакция
    fn in_transaction(&self) -> bool;

    /// Проверяет, что соединение живо
    fn ping(&mut self) -> bool;

    /// Закрывает соединение, откатывая незавершенную транзакцию
    fn close(self: Box<Self>) -> Result<()>;
}

/// Фабрика соединений для конкретной СУБД
pub trait Driver: Send + Sync {
    fn dialect(&self) -> Dialect;

    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn RawConnection>>;
}

/// Возвращает драйвер для СУБД из конфигурации
pub fn driver_for(backend: Backend) -> Result<Arc<dyn Driver>> {
    match backend {
        Backend::Sqlite => Ok(Arc::new(super::sqlite::SqliteDriver)),
        #[cfg(feature = "mysql")]
        Backend::Mysql => Ok(Arc::new(super::mysql::MysqlDriver)),
        #[cfg(feature = "postgres")]
        Backend::Postgres => Ok(Arc::new(super::postgres::PostgresDriver)),
        #[allow(unreachable_patterns)]
        other => Err(Error::unsupported(format!(
            "backend '{}' is not compiled in; enable the '{}' feature",
            other, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_driver_available() {
        let driver = driver_for(Backend::Sqlite).unwrap();
        assert_eq!(driver.dialect(), Dialect::Sqlite);
    }

    #[cfg(not(feature = "mysql"))]
    #[test]
    fn test_mysql_driver_requires_feature() {
        assert!(matches!(
            driver_for(Backend::Mysql),
            Err(Error::Unsupported { .. })
        ));
    }
}
