//! Обработка ошибок для datapool

use thiserror::Error;

/// Основной тип ошибки пула данных
#[derive(Error, Debug)]
pub enum Error {
    /// Ошибка I/O операций
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Сбой связи с сервером или выполнения SQL
    #[error("Operational error: {message}")]
    Operational { message: String },

    /// Некорректный SQL или несоответствие схемы
    #[error("Programming error: {message}")]
    Programming { message: String },

    /// Нет пригодного соединения
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Запись с указанным id отсутствует
    #[error("Entry not found: {id}")]
    NotFound { id: i64 },

    /// Файл отсутствует в файловой системе
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// Структура, тип или отображение противоречивы
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Ошибка валидации
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Неподдерживаемая операция
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Внутренняя ошибка
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Тип результата для datapool
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Создает ошибку выполнения
    pub fn operational(message: impl Into<String>) -> Self {
        Self::Operational {
            message: message.into(),
        }
    }

    /// Создает ошибку программирования (SQL/схема)
    pub fn programming(message: impl Into<String>) -> Self {
        Self::Programming {
            message: message.into(),
        }
    }

    /// Создает ошибку соединения
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Создает ошибку отсутствующей записи
    pub fn not_found(id: i64) -> Self {
        Self::NotFound { id }
    }

    /// Создает ошибку отсутствующего файла
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Создает ошибку конфигурации
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Создает ошибку валидации
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Создает ошибку неподдерживаемой операции
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Создает внутреннюю ошибку
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Ошибка означает отсутствие записи
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Ошибка пришла от драйвера базы данных
    pub fn is_database_error(&self) -> bool {
        matches!(
            self,
            Self::Operational { .. } | Self::Programming { .. } | Self::Connection { .. }
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;
        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                // SQLITE_ERROR: синтаксис, неизвестная таблица или колонка
                ErrorCode::Unknown => Error::programming(err.to_string()),
                ErrorCode::CannotOpen | ErrorCode::NotADatabase => {
                    Error::connection(err.to_string())
                }
                _ => Error::operational(err.to_string()),
            },
            rusqlite::Error::InvalidParameterCount(..)
            | rusqlite::Error::InvalidParameterName(_)
            | rusqlite::Error::InvalidColumnIndex(_)
            | rusqlite::Error::InvalidColumnName(_)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::MultipleStatement => Error::programming(err.to_string()),
            _ => Error::operational(err.to_string()),
        }
    }
}

#[cfg(feature = "mysql")]
impl From<mysql::Error> for Error {
    fn from(err: mysql::Error) -> Self {
        match &err {
            // 1054 unknown column, 1064 syntax, 1146 unknown table
            mysql::Error::MySqlError(server) if matches!(server.code, 1054 | 1064 | 1146) => {
                Error::programming(err.to_string())
            }
            mysql::Error::IoError(_) | mysql::Error::DriverError(_) => {
                Error::connection(err.to_string())
            }
            _ => Error::operational(err.to_string()),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<postgres::Error> for Error {
    fn from(err: postgres::Error) -> Self {
        use postgres::error::SqlState;
        if err.is_closed() {
            return Error::connection(err.to_string());
        }
        match err.code() {
            Some(code)
                if *code == SqlState::SYNTAX_ERROR
                    || *code == SqlState::UNDEFINED_TABLE
                    || *code == SqlState::UNDEFINED_COLUMN
                    || *code == SqlState::DATATYPE_MISMATCH =>
            {
                Error::programming(err.to_string())
            }
            _ => Error::operational(err.to_string()),
        }
    }
}
