//! Кеширование соединений по потокам и запросам

use crate::connection::driver::RawConnection;
use parking_lot::{Mutex, MutexGuard};
use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Кешированное соединение и время его последней проверки
pub(crate) struct Slot {
    pub raw: Box<dyn RawConnection>,
    pub validated_at: Instant,
}

impl Slot {
    pub fn new(raw: Box<dyn RawConnection>) -> Self {
        Self {
            raw,
            validated_at: Instant::now(),
        }
    }

    /// Откатывает и закрывает соединение; ошибки только логируются
    pub fn shutdown(self, label: &str) {
        let mut raw = self.raw;
        if let Err(e) = raw.rollback() {
            log::warn!("Rollback on close failed for {}: {}", label, e);
        }
        if let Err(e) = raw.close() {
            log::warn!("Closing connection {} failed: {}", label, e);
        }
    }
}

/// Соединение одного потока для одного `Connection`
///
/// Ячейка лежит в кеше потока, а `Connection` держит на нее слабую ссылку,
/// чтобы при удалении закрыть соединения всех потоков. Закрытая ячейка
/// помечается и вычищается из кеша потока при следующем обращении.
#[derive(Default)]
pub(crate) struct ThreadSlot {
    slot: Mutex<Option<Slot>>,
    retired: AtomicBool,
}

impl ThreadSlot {
    pub fn lock(&self) -> MutexGuard<'_, Option<Slot>> {
        self.slot.lock()
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Закрывает соединение ячейки; дальше ячейка не используется
    pub fn retire(&self, label: &str) {
        self.retired.store(true, Ordering::Release);
        if let Some(slot) = self.slot.lock().take() {
            slot.shutdown(label);
        }
    }
}

impl Drop for ThreadSlot {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.get_mut().take() {
            slot.shutdown("thread");
        }
    }
}

thread_local! {
    /// Соединения текущего потока по ключу экземпляра `Connection`
    static THREAD_SLOTS: RefCell<HashMap<u64, Arc<ThreadSlot>>> = RefCell::new(HashMap::new());

    /// Соединения активного запроса по имени базы данных
    static REQUEST_SLOTS: RefCell<Option<HashMap<String, Slot>>> = const { RefCell::new(None) };
}

/// Ячейка соединения текущего потока
///
/// Новая ячейка передается в `register`. Закрытые ячейки удаленных
/// `Connection` при этом вычищаются. `None`, если поток уже завершается.
pub(crate) fn thread_slot(key: u64, register: impl FnOnce(&Arc<ThreadSlot>)) -> Option<Arc<ThreadSlot>> {
    THREAD_SLOTS
        .try_with(|slots| {
            let mut slots = slots.borrow_mut();
            if let Some(cell) = slots.get(&key) {
                return Arc::clone(cell);
            }
            slots.retain(|_, cell| !cell.is_retired());
            let cell = Arc::new(ThreadSlot::default());
            register(&cell);
            slots.insert(key, Arc::clone(&cell));
            cell
        })
        .ok()
}

/// Количество ячеек в кеше текущего потока
#[cfg(test)]
pub(crate) fn thread_slot_count() -> usize {
    THREAD_SLOTS.with(|slots| slots.borrow().len())
}

/// Забирает соединение активного запроса.
/// Внешний `None` означает, что активного запроса нет.
pub(crate) fn take_request_slot(db_name: &str) -> Option<Option<Slot>> {
    REQUEST_SLOTS.with(|slots| slots.borrow_mut().as_mut().map(|map| map.remove(db_name)))
}

/// Возвращает соединение в кеш активного запроса; без запроса - закрывает его
pub(crate) fn put_request_slot(db_name: &str, slot: Slot) {
    let rejected = REQUEST_SLOTS.with(|slots| match slots.borrow_mut().as_mut() {
        Some(map) => map.insert(db_name.to_string(), slot),
        None => Some(slot),
    });
    if let Some(old) = rejected {
        old.shutdown(db_name);
    }
}

/// Контекст запроса
///
/// Пока объект жив, соединения с `ConnectionScope::Request` кешируются в нем по
/// имени базы данных. При завершении все кешированные соединения откатываются
/// и закрываются, поэтому незафиксированная работа запроса теряется.
/// Объект привязан к потоку, в котором создан.
pub struct RequestScope {
    owner: bool,
    _not_send: PhantomData<*const ()>,
}

impl RequestScope {
    /// Начинает запрос в текущем потоке; вложенный вызов разделяет внешний контекст
    pub fn begin() -> Self {
        let owner = REQUEST_SLOTS.with(|slots| {
            let mut slots = slots.borrow_mut();
            if slots.is_none() {
                *slots = Some(HashMap::new());
                true
            } else {
                false
            }
        });
        Self {
            owner,
            _not_send: PhantomData,
        }
    }

    /// Есть ли активный запрос в текущем потоке
    pub fn is_active() -> bool {
        REQUEST_SLOTS.with(|slots| slots.borrow().is_some())
    }

    /// Количество кешированных соединений активного запроса
    pub fn cached_connections() -> usize {
        REQUEST_SLOTS.with(|slots| slots.borrow().as_ref().map_or(0, HashMap::len))
    }

    /// Явно завершает запрос
    pub fn finish(self) {}
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        if !self.owner {
            return;
        }
        let cached = REQUEST_SLOTS.with(|slots| slots.borrow_mut().take());
        for (db_name, slot) in cached.into_iter().flatten() {
            slot.shutdown(&db_name);
        }
    }
}
