//! Соединение пула с базой данных

use crate::common::{ConnectionConfig, ConnectionScope, Error, Result, Value};
use crate::connection::dialect::Dialect;
use crate::connection::driver::{driver_for, Driver, QueryOutput, RawConnection, Row};
use crate::connection::scope::{self, Slot, ThreadSlot};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

static NEXT_CONNECTION_KEY: AtomicU64 = AtomicU64::new(1);

/// Состояние соединения в текущей области
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Closed,
}

/// Соединение с базой данных с кешированием по области
///
/// Сам объект разделяется между потоками; живое соединение драйвера
/// хранится в зависимости от `ConnectionScope`: одно на объект, одно на
/// поток или одно на запрос.
pub struct Connection {
    config: ConnectionConfig,
    driver: Arc<dyn Driver>,
    dialect: Dialect,
    key: u64,
    shared: Mutex<Option<Slot>>,
    /// Ячейки потоков, открывавших соединение с `ConnectionScope::Thread`
    thread_slots: Mutex<Vec<Weak<ThreadSlot>>>,
}

impl Connection {
    /// Создает соединение для СУБД из конфигурации; подключение ленивое
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let driver = driver_for(config.backend)?;
        Ok(Self::with_driver(config, driver))
    }

    /// Создает соединение с явно заданным драйвером
    pub fn with_driver(config: ConnectionConfig, driver: Arc<dyn Driver>) -> Self {
        let dialect = driver.dialect();
        Self {
            config,
            driver,
            dialect,
            key: NEXT_CONNECTION_KEY.fetch_add(1, Ordering::Relaxed),
            shared: Mutex::new(None),
            thread_slots: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Плейсхолдер параметра для SQL пула
    pub fn placeholder(&self) -> &'static str {
        self.dialect.placeholder()
    }

    /// Литерал значения для доверенных участков SQL
    pub fn fmt_param(&self, value: &Value) -> String {
        self.dialect.fmt_param(value)
    }

    /// Выполняет `f` над соединением текущей области
    fn with_slot<R>(&self, f: impl FnOnce(&mut Option<Slot>) -> R) -> R {
        match self.config.scope {
            ConnectionScope::Shared => {
                let mut guard = self.shared.lock();
                f(&mut guard)
            }
            ConnectionScope::Request => match scope::take_request_slot(&self.config.db_name) {
                Some(mut slot) => {
                    let result = f(&mut slot);
                    if let Some(slot) = slot {
                        scope::put_request_slot(&self.config.db_name, slot);
                    }
                    result
                }
                None => self.with_thread_slot(f),
            },
            ConnectionScope::Thread => self.with_thread_slot(f),
        }
    }

    fn with_thread_slot<R>(&self, f: impl FnOnce(&mut Option<Slot>) -> R) -> R {
        let cell = scope::thread_slot(self.key, |cell| {
            let mut registry = self.thread_slots.lock();
            registry.retain(|weak| weak.strong_count() > 0);
            registry.push(Arc::downgrade(cell));
        });
        match cell {
            Some(cell) => {
                let mut slot = cell.lock();
                f(&mut *slot)
            }
            None => f(&mut None),
        }
    }

    /// Количество потоков, держащих ячейку соединения
    pub fn thread_connections(&self) -> usize {
        self.thread_slots
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Открывает новое соединение в текущей области, закрывая прежнее
    pub fn connect(&self) -> Result<()> {
        let raw = self.driver.connect(&self.config)?;
        self.with_slot(|slot| {
            if let Some(old) = slot.replace(Slot::new(raw)) {
                old.shutdown(&self.config.db_name);
            }
        });
        Ok(())
    }

    /// Открывает независимое соединение, не участвующее в кешировании
    pub fn private(&self) -> Result<Box<dyn RawConnection>> {
        self.driver.connect(&self.config)
    }

    pub fn is_connected(&self) -> bool {
        self.with_slot(|slot| slot.is_some())
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Closed
        }
    }

    /// Проверяет соединение и переподключается при необходимости
    ///
    /// Без соединения подключается. Проба пропускается, если проверка
    /// отключена или соединение проверялось в пределах `revalidate`.
    pub fn verify_connection(&self) -> Result<bool> {
        if !self.is_connected() {
            self.connect()?;
            return Ok(true);
        }
        if !self.config.verify_connection {
            return Ok(true);
        }
        let window = Duration::from_secs(self.config.revalidate);
        let alive = self.with_slot(|slot| match slot {
            Some(slot) if slot.validated_at.elapsed() < window => true,
            Some(slot) => {
                let alive = slot.raw.ping();
                if alive {
                    slot.validated_at = Instant::now();
                }
                alive
            }
            None => false,
        });
        if alive {
            return Ok(true);
        }
        log::warn!("Connection to {} lost, reconnecting", self.config.db_name);
        self.connect()?;
        Ok(self.is_connected())
    }

    /// Проверяет живость соединения
    pub fn ping(&self) -> bool {
        self.with_slot(|slot| slot.as_mut().is_some_and(|s| s.raw.ping()))
    }

    /// Выполняет инструкцию на соединении текущей области
    pub fn run(&self, sql: &str, params: &[Value]) -> Result<QueryOutput> {
        self.with_slot(|slot| match slot {
            Some(slot) => slot.raw.run(sql, params),
            None => Err(Error::connection("Database connection is closed")),
        })
    }

    /// Создает курсор; без соединения возвращает ошибку
    pub fn cursor(&self) -> Result<Cursor<'_>> {
        if !self.is_connected() {
            return Err(Error::connection("Database connection is closed"));
        }
        Ok(Cursor::new(self))
    }

    pub fn begin(&self) -> Result<()> {
        self.with_open(|raw| raw.begin())
    }

    pub fn commit(&self) -> Result<()> {
        self.with_open(|raw| raw.commit())
    }

    pub fn rollback(&self) -> Result<()> {
        self.with_open(|raw| raw.rollback())
    }

    /// Открыта ли транзакция на соединении текущей области
    pub fn in_transaction(&self) -> bool {
        self.with_slot(|slot| slot.as_ref().is_some_and(|s| s.raw.in_transaction()))
    }

    fn with_open(&self, f: impl FnOnce(&mut dyn RawConnection) -> Result<()>) -> Result<()> {
        self.with_slot(|slot| match slot {
            Some(slot) => f(slot.raw.as_mut()),
            None => Err(Error::connection("Database connection is closed")),
        })
    }

    /// Закрывает соединение текущей области, откатывая незафиксированное
    pub fn close(&self) {
        if let Some(slot) = self.with_slot(Option::take) {
            slot.shutdown(&self.config.db_name);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(slot) = self.shared.get_mut().take() {
            slot.shutdown(&self.config.db_name);
        }
        for cell in self.thread_slots.get_mut().drain(..) {
            if let Some(cell) = cell.upgrade() {
                cell.retire(&self.config.db_name);
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &self.config.backend)
            .field("db_name", &self.config.db_name)
            .field("scope", &self.config.scope)
            .finish()
    }
}

/// Курсор с буферизованным результатом
pub struct Cursor<'c> {
    conn: &'c Connection,
    columns: Vec<String>,
    rows: VecDeque<Row>,
    rowcount: u64,
    closed: bool,
}

impl<'c> Cursor<'c> {
    fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            columns: Vec::new(),
            rows: VecDeque::new(),
            rowcount: 0,
            closed: false,
        }
    }

    /// Выполняет инструкцию, заменяя предыдущий результат
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<()> {
        if self.closed {
            return Err(Error::programming("Cursor is closed"));
        }
        let output = self.conn.run(sql, params)?;
        self.columns = output.columns;
        self.rowcount = output.rowcount;
        self.rows = output.rows.into();
        Ok(())
    }

    pub fn fetch_one(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    pub fn fetch_all(&mut self) -> Vec<Row> {
        self.rows.drain(..).collect()
    }

    /// Имена колонок последнего результата
    pub fn description(&self) -> &[String] {
        &self.columns
    }

    /// Количество затронутых или возвращенных строк
    pub fn rowcount(&self) -> u64 {
        self.rowcount
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.rows.clear();
    }
}
