//! Конфигурация для datapool
//!
//! Предоставляет структуры конфигурации пула и соединения с базой данных

use crate::common::constants::*;
use crate::common::error::{Error, Result};
use chrono::{FixedOffset, Local, NaiveDateTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Поддерживаемые СУБД
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Mysql,
    Postgres,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Sqlite => write!(f, "sqlite"),
            Backend::Mysql => write!(f, "mysql"),
            Backend::Postgres => write!(f, "postgres"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Backend::Sqlite),
            "mysql" => Ok(Backend::Mysql),
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            _ => Err(format!("Unsupported backend: {}", s)),
        }
    }
}

/// Область кеширования соединения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionScope {
    /// Одно соединение на пул, защищенное мьютексом
    Shared,
    /// Одно соединение на поток
    #[default]
    Thread,
    /// Соединение на запрос; без активного запроса - на поток
    Request,
}

impl FromStr for ConnectionScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shared" => Ok(ConnectionScope::Shared),
            "thread" | "threadlocal" => Ok(ConnectionScope::Thread),
            "request" => Ok(ConnectionScope::Request),
            _ => Err(format!("Unsupported connection scope: {}", s)),
        }
    }
}

/// Конфигурация соединения с базой данных
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// СУБД
    pub backend: Backend,
    /// Имя базы данных (для SQLite - путь к файлу)
    pub db_name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Таймаут драйвера (в секундах)
    pub timeout: u64,
    /// Проверять соединение перед использованием
    pub verify_connection: bool,
    /// Интервал, в течение которого проверка пропускается (в секундах)
    pub revalidate: u64,
    /// Передавать строки как unicode
    pub unicode: bool,
    /// Область кеширования соединения
    pub scope: ConnectionScope,
    /// Движок таблиц MySQL
    pub engine: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            db_name: String::new(),
            host: String::new(),
            port: 0,
            user: String::new(),
            password: String::new(),
            timeout: DEFAULT_CONNECTION_TIMEOUT,
            verify_connection: false,
            revalidate: DEFAULT_REVALIDATE_INTERVAL,
            unicode: true,
            scope: ConnectionScope::Thread,
            engine: "InnoDB".to_string(),
        }
    }
}

impl ConnectionConfig {
    /// Конфигурация SQLite для файла базы данных
    pub fn sqlite(path: impl AsRef<Path>) -> Self {
        Self {
            backend: Backend::Sqlite,
            db_name: path.as_ref().to_string_lossy().into_owned(),
            ..Self::default()
        }
    }

    /// Порт по умолчанию для выбранной СУБД
    pub fn effective_port(&self) -> u16 {
        if self.port != 0 {
            return self.port;
        }
        match self.backend {
            Backend::Sqlite => 0,
            Backend::Mysql => 3306,
            Backend::Postgres => 5432,
        }
    }

    /// Загружает конфигурацию из переменных окружения
    pub fn from_env() -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let mut config = ConnectionConfig::default();

        if let Ok(backend) = std::env::var("DATAPOOL_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Ok(name) = std::env::var("DATAPOOL_DB_NAME") {
            config.db_name = name;
        }
        if let Ok(host) = std::env::var("DATAPOOL_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("DATAPOOL_PORT") {
            config.port = port.parse()?;
        }
        if let Ok(user) = std::env::var("DATAPOOL_USER") {
            config.user = user;
        }
        if let Ok(password) = std::env::var("DATAPOOL_PASSWORD") {
            config.password = password;
        }
        if let Ok(timeout) = std::env::var("DATAPOOL_TIMEOUT") {
            config.timeout = timeout.parse()?;
        }
        if let Ok(scope) = std::env::var("DATAPOOL_SCOPE") {
            config.scope = scope.parse()?;
        }

        Ok(config)
    }

    /// Объединяет конфигурацию с другой; непустые значения `other` имеют приоритет
    pub fn merge(mut self, other: Self) -> Self {
        let defaults = Self::default();
        if other.backend != defaults.backend {
            self.backend = other.backend;
        }
        if !other.db_name.is_empty() {
            self.db_name = other.db_name;
        }
        if !other.host.is_empty() {
            self.host = other.host;
        }
        if other.port != 0 {
            self.port = other.port;
        }
        if !other.user.is_empty() {
            self.user = other.user;
        }
        if !other.password.is_empty() {
            self.password = other.password;
        }
        if other.timeout != defaults.timeout {
            self.timeout = other.timeout;
        }
        if other.verify_connection != defaults.verify_connection {
            self.verify_connection = other.verify_connection;
        }
        if other.revalidate != defaults.revalidate {
            self.revalidate = other.revalidate;
        }
        if other.scope != defaults.scope {
            self.scope = other.scope;
        }
        if other.engine != defaults.engine {
            self.engine = other.engine;
        }
        self
    }

    /// Валидирует конфигурацию
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.db_name.is_empty() {
            return Err("Database name cannot be empty".to_string());
        }
        if self.backend != Backend::Sqlite && self.host.is_empty() {
            return Err(format!("Host is required for {}", self.backend));
        }
        Ok(())
    }
}

/// Конфигурация пула данных
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Корневой каталог файлов
    pub root: PathBuf,
    /// Кодировка текста приложения
    pub code_page: String,
    /// Кодировка текста в базе данных
    pub db_code_page: String,
    /// Сохранять версии файлов до фиксации
    pub use_backups: bool,
    /// Перемещать удаленные файлы в корзину
    pub use_trashcan: bool,
    /// Часовой пояс для pool_create/pool_change: `UTC`, `local` или смещение `+02:00`
    pub timezone: Option<String>,
    /// Уровень трассировки SQL (0 - выключена)
    pub debug: u8,
    /// Файл трассировки SQL
    pub log: Option<PathBuf>,
    /// Максимальный размер файла в байтах
    pub max_file_size: u64,
    /// Соединение с базой данных
    pub connection: ConnectionConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./files"),
            code_page: "utf-8".to_string(),
            db_code_page: "utf-8".to_string(),
            use_backups: false,
            use_trashcan: false,
            timezone: None,
            debug: 0,
            log: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            connection: ConnectionConfig::default(),
        }
    }
}

impl PoolConfig {
    /// Загружает конфигурацию из TOML файла
    pub fn from_file(path: &Path) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PoolConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Сохраняет конфигурацию в TOML файл
    pub fn to_file(&self, path: &Path) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Загружает конфигурацию из переменных окружения
    pub fn from_env() -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let mut config = PoolConfig {
            connection: ConnectionConfig::from_env()?,
            ..PoolConfig::default()
        };

        if let Ok(root) = std::env::var("DATAPOOL_ROOT") {
            config.root = PathBuf::from(root);
        }
        if let Ok(code_page) = std::env::var("DATAPOOL_CODE_PAGE") {
            config.code_page = code_page;
        }
        if let Ok(trash) = std::env::var("DATAPOOL_USE_TRASHCAN") {
            config.use_trashcan = parse_flag(&trash);
        }
        if let Ok(tz) = std::env::var("DATAPOOL_TIMEZONE") {
            config.timezone = Some(tz);
        }
        if let Ok(debug) = std::env::var("DATAPOOL_DEBUG") {
            config.debug = debug.parse()?;
        }
        if let Ok(log) = std::env::var("DATAPOOL_LOG") {
            config.log = Some(PathBuf::from(log));
        }

        Ok(config)
    }

    /// Объединяет конфигурацию с другой
    pub fn merge(mut self, other: Self) -> Self {
        let defaults = Self::default();
        if other.root != defaults.root {
            self.root = other.root;
        }
        if other.code_page != defaults.code_page {
            self.code_page = other.code_page;
        }
        if other.db_code_page != defaults.db_code_page {
            self.db_code_page = other.db_code_page;
        }
        if other.use_backups {
            self.use_backups = true;
        }
        if other.use_trashcan {
            self.use_trashcan = true;
        }
        if other.timezone.is_some() {
            self.timezone = other.timezone;
        }
        if other.debug != 0 {
            self.debug = other.debug;
        }
        if other.log.is_some() {
            self.log = other.log;
        }
        if other.max_file_size != defaults.max_file_size {
            self.max_file_size = other.max_file_size;
        }
        self.connection = self.connection.merge(other.connection);
        self
    }

    /// Валидирует конфигурацию
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.root.as_os_str().is_empty() {
            return Err("Pool root cannot be empty".to_string());
        }
        if self.max_file_size == 0 {
            return Err("Max file size must be greater than 0".to_string());
        }
        if self.debug > 3 {
            return Err("Debug level must be between 0 and 3".to_string());
        }
        for code_page in [&self.code_page, &self.db_code_page] {
            if CodePage::from_name(code_page).is_none() {
                return Err(format!("Unsupported code page: {}", code_page));
            }
        }
        if let Some(tz) = &self.timezone {
            parse_timezone(tz).map_err(|e| e.to_string())?;
        }
        self.connection.validate()
    }

    /// Текущее время в настроенном часовом поясе
    pub fn now(&self) -> Result<NaiveDateTime> {
        match &self.timezone {
            None => Ok(Local::now().naive_local()),
            Some(tz) => {
                let offset = parse_timezone(tz)?;
                Ok(Utc::now().with_timezone(&offset).naive_local())
            }
        }
    }
}

/// Кодировка текста
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePage {
    Utf8,
    Latin1,
}

impl CodePage {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Some(CodePage::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => Some(CodePage::Latin1),
            _ => None,
        }
    }

    /// Декодирует байты в строку
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            CodePage::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            CodePage::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }

    /// Кодирует строку в байты; символы вне latin-1 заменяются на `?`
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            CodePage::Utf8 => text.as_bytes().to_vec(),
            CodePage::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }
}

/// Разбирает часовой пояс конфигурации
pub fn parse_timezone(tz: &str) -> Result<FixedOffset> {
    let tz = tz.trim();
    if tz.eq_ignore_ascii_case("utc") || tz.eq_ignore_ascii_case("z") {
        return Ok(Utc.fix());
    }
    if tz.eq_ignore_ascii_case("local") {
        return Ok(*Local::now().offset());
    }
    tz.parse::<FixedOffset>()
        .map_err(|_| Error::configuration(format!("Неизвестный часовой пояс: {}", tz)))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
