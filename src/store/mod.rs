mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use chrono::NaiveDate;
use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::clock::Clock;
use crate::error::Result;
use crate::month::{Direction, YearMonth};

/// Identifier the host assigns to a widget instance.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    From,
    Into,
    FromStr,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct InstanceId(i32);

/// Everything persisted for one widget instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceRecord {
    pub anchor: YearMonth,
    pub selected: Option<NaiveDate>,
}

impl InstanceRecord {
    pub fn new(anchor: YearMonth) -> Self {
        InstanceRecord {
            anchor,
            selected: None,
        }
    }
}

/// Durable key-value storage for instance records.
///
/// `store` and `delete` must have committed by the time they return, and
/// `delete` of an unknown id is not an error.
pub trait Backend: Send + Sync {
    fn load(&self, id: InstanceId) -> Result<Option<InstanceRecord>>;
    fn store(&self, id: InstanceId, record: &InstanceRecord) -> Result<()>;
    fn delete(&self, id: InstanceId) -> Result<()>;
    fn ids(&self) -> Result<Vec<InstanceId>>;

    /// Replaces the record of `id` with `change(current)` and returns what
    /// was stored. Backends shared between processes override this so that
    /// nothing else writes between the read and the write.
    fn update(
        &self,
        id: InstanceId,
        change: &mut dyn FnMut(Option<InstanceRecord>) -> InstanceRecord,
    ) -> Result<InstanceRecord> {
        let record = change(self.load(id)?);
        self.store(id, &record)?;
        Ok(record)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the displayed month of every widget instance.
///
/// Each mutating call holds a lock for its instance over the whole
/// read-modify-write. Backend failures never reach the caller on the
/// render path: values that could not be persisted are kept in an
/// in-memory overlay that shadows the backend until a later write succeeds.
pub struct InstanceStateStore {
    backend: Box<dyn Backend>,
    clock: Box<dyn Clock>,
    locks: Mutex<HashMap<InstanceId, Arc<Mutex<()>>>>,
    overlay: Mutex<HashMap<InstanceId, InstanceRecord>>,
}

impl InstanceStateStore {
    pub fn new<B, C>(backend: B, clock: C) -> Self
    where
        B: Backend + 'static,
        C: Clock + 'static,
    {
        Self::from_boxed(Box::new(backend), Box::new(clock))
    }

    pub fn from_boxed(backend: Box<dyn Backend>, clock: Box<dyn Clock>) -> Self {
        InstanceStateStore {
            backend,
            clock,
            locks: Mutex::new(HashMap::new()),
            overlay: Mutex::new(HashMap::new()),
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Runs `f` while holding the lock of `id`. The lock entry is dropped
    /// from the table again once nobody else holds or waits for it.
    fn exclusive<T, F>(&self, id: InstanceId, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let instance_lock = lock(&self.locks).entry(id).or_default().clone();
        let result = {
            let _guard = lock(&instance_lock);
            f()
        };

        let mut locks = lock(&self.locks);
        drop(instance_lock);
        if locks
            .get(&id)
            .map_or(false, |entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(&id);
        }

        result
    }

    fn read(&self, id: InstanceId) -> Option<InstanceRecord> {
        if let Some(record) = lock(&self.overlay).get(&id) {
            return Some(*record);
        }

        match self.backend.load(id) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Could not load state of instance {}: {}", id, e);
                None
            }
        }
    }

    /// Applies `change` to the record of `id` in one backend step. A value
    /// kept in the overlay takes precedence over the stored one.
    fn modify<F>(&self, id: InstanceId, change: F) -> InstanceRecord
    where
        F: Fn(InstanceRecord) -> InstanceRecord,
    {
        let pending = lock(&self.overlay).get(&id).copied();
        let fresh = InstanceRecord::new(self.clock.current_month());
        let mut computed = None;

        let res = self.backend.update(id, &mut |stored| {
            let record = change(pending.or(stored).unwrap_or(fresh));
            computed = Some(record);
            record
        });

        match res {
            Ok(record) => {
                lock(&self.overlay).remove(&id);
                record
            }
            Err(e) => {
                let record = computed.unwrap_or_else(|| change(pending.unwrap_or(fresh)));
                log::warn!(
                    "Could not persist state of instance {}, keeping it in memory: {}",
                    id,
                    e
                );
                lock(&self.overlay).insert(id, record);
                record
            }
        }
    }

    /// The month displayed by `id`, or the current month if nothing is
    /// stored yet. Never creates an entry.
    pub fn current(&self, id: InstanceId) -> YearMonth {
        self.read(id)
            .map(|record| record.anchor)
            .unwrap_or_else(|| self.clock.current_month())
    }

    pub fn selected(&self, id: InstanceId) -> Option<NaiveDate> {
        self.read(id).and_then(|record| record.selected)
    }

    pub fn advance(&self, id: InstanceId, direction: Direction) -> YearMonth {
        let record = self.exclusive(id, || {
            self.modify(id, |mut record| {
                record.anchor = record.anchor.step(direction);
                record
            })
        });

        log::debug!("Instance {}: moved {:?} to {}", id, direction, record.anchor);
        record.anchor
    }

    pub fn select(&self, id: InstanceId, date: NaiveDate) {
        self.exclusive(id, || {
            self.modify(id, |mut record| {
                record.selected = Some(date);
                record
            })
        });

        log::debug!("Instance {}: selected {}", id, date);
    }

    pub fn remove(&self, id: InstanceId) -> Result<()> {
        self.exclusive(id, || {
            lock(&self.overlay).remove(&id);
            self.backend.delete(id)
        })?;

        log::debug!("Instance {}: removed", id);
        Ok(())
    }

    /// Removes every listed instance, continuing past failures. Returns the
    /// number of instances whose state could not be deleted.
    pub fn remove_all<I>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = InstanceId>,
    {
        ids.into_iter()
            .map(|id| self.remove(id).map_err(|e| (id, e)))
            .inspect(|res| {
                if let Err((id, e)) = res {
                    log::warn!("Could not remove state of instance {}: {}", id, e)
                }
            })
            .filter(|res| res.is_err())
            .count()
    }

    /// Instances with stored state, in ascending order.
    pub fn instances(&self) -> Vec<InstanceId> {
        let mut ids = self.backend.ids().unwrap_or_else(|e| {
            log::warn!("Could not list stored instances: {}", e);
            Vec::new()
        });
        ids.extend(lock(&self.overlay).keys().copied());
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::{Error, ErrorKind};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn ym(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).unwrap()
    }

    fn clock() -> FixedClock {
        FixedClock(NaiveDate::from_ymd_opt(2024, 5, 17).unwrap())
    }

    fn id(raw: i32) -> InstanceId {
        InstanceId::from(raw)
    }

    /// Wraps a memory backend and fails every call while `down` is set.
    #[derive(Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        down: Arc<AtomicBool>,
    }

    impl FlakyBackend {
        fn check(&self) -> Result<()> {
            if self.down.load(Ordering::SeqCst) {
                Err(Error::new(ErrorKind::Persistence, "backend is down"))
            } else {
                Ok(())
            }
        }
    }

    impl Backend for FlakyBackend {
        fn load(&self, id: InstanceId) -> Result<Option<InstanceRecord>> {
            self.check()?;
            self.inner.load(id)
        }

        fn store(&self, id: InstanceId, record: &InstanceRecord) -> Result<()> {
            self.check()?;
            self.inner.store(id, record)
        }

        fn delete(&self, id: InstanceId) -> Result<()> {
            self.check()?;
            self.inner.delete(id)
        }

        fn ids(&self) -> Result<Vec<InstanceId>> {
            self.check()?;
            self.inner.ids()
        }
    }

    /// Refuses to delete one particular instance.
    struct StubbornBackend {
        inner: MemoryBackend,
        stuck: InstanceId,
    }

    impl Backend for StubbornBackend {
        fn load(&self, id: InstanceId) -> Result<Option<InstanceRecord>> {
            self.inner.load(id)
        }

        fn store(&self, id: InstanceId, record: &InstanceRecord) -> Result<()> {
            self.inner.store(id, record)
        }

        fn delete(&self, id: InstanceId) -> Result<()> {
            if id == self.stuck {
                return Err(Error::new(ErrorKind::Persistence, "refusing delete"));
            }
            self.inner.delete(id)
        }

        fn ids(&self) -> Result<Vec<InstanceId>> {
            self.inner.ids()
        }
    }

    #[test]
    fn defaults_to_current_month_without_persisting() {
        let store = InstanceStateStore::new(MemoryBackend::default(), clock());
        assert_eq!(store.current(id(1)), ym(2024, 5));
        assert!(store.instances().is_empty());
        assert_eq!(store.selected(id(1)), None);
    }

    #[test]
    fn advance_persists() {
        let store = InstanceStateStore::new(MemoryBackend::default(), clock());
        assert_eq!(store.advance(id(1), Direction::Next), ym(2024, 6));
        assert_eq!(store.current(id(1)), ym(2024, 6));
        assert_eq!(store.instances(), vec![id(1)]);
    }

    #[test]
    fn navigation_round_trip() {
        let store = InstanceStateStore::new(MemoryBackend::default(), clock());
        let start = store.current(id(3));
        store.advance(id(3), Direction::Next);
        assert_eq!(store.advance(id(3), Direction::Prev), start);
    }

    #[test]
    fn year_rollover() {
        let backend = MemoryBackend::default();
        backend
            .store(id(1), &InstanceRecord::new(ym(2024, 12)))
            .unwrap();
        backend.store(id(2), &InstanceRecord::new(ym(2024, 1))).unwrap();

        let store = InstanceStateStore::new(backend, clock());
        assert_eq!(store.advance(id(1), Direction::Next), ym(2025, 1));
        assert_eq!(store.advance(id(2), Direction::Prev), ym(2023, 12));
    }

    #[test]
    fn instances_are_independent() {
        let store = InstanceStateStore::new(MemoryBackend::default(), clock());
        store.advance(id(1), Direction::Next);
        store.advance(id(1), Direction::Next);
        store.advance(id(2), Direction::Prev);

        assert_eq!(store.current(id(1)), ym(2024, 7));
        assert_eq!(store.current(id(2)), ym(2024, 4));
        assert_eq!(store.current(id(3)), ym(2024, 5));
    }

    #[test]
    fn remove_is_idempotent() {
        let store = InstanceStateStore::new(MemoryBackend::default(), clock());
        store.advance(id(1), Direction::Next);

        store.remove(id(1)).unwrap();
        store.remove(id(1)).unwrap();

        assert!(store.instances().is_empty());
        assert_eq!(store.current(id(1)), ym(2024, 5));
    }

    #[test]
    fn remove_all_is_best_effort() {
        let backend = StubbornBackend {
            inner: MemoryBackend::default(),
            stuck: id(2),
        };
        let store = InstanceStateStore::new(backend, clock());
        for raw in 1..=3 {
            store.advance(id(raw), Direction::Next);
        }

        let failed = store.remove_all(vec![id(1), id(2), id(3), id(4)]);

        assert_eq!(failed, 1);
        assert_eq!(store.instances(), vec![id(2)]);
    }

    #[test]
    fn select_keeps_anchor() {
        let store = InstanceStateStore::new(MemoryBackend::default(), clock());
        store.advance(id(1), Direction::Prev);
        let date = NaiveDate::from_ymd_opt(2024, 4, 9).unwrap();

        store.select(id(1), date);

        assert_eq!(store.selected(id(1)), Some(date));
        assert_eq!(store.current(id(1)), ym(2024, 4));
    }

    #[test]
    fn degraded_persistence_keeps_navigating() {
        let backend = FlakyBackend::default();
        let down = backend.down.clone();
        let store = InstanceStateStore::new(backend, clock());

        down.store(true, Ordering::SeqCst);
        assert_eq!(store.current(id(1)), ym(2024, 5));
        assert_eq!(store.advance(id(1), Direction::Next), ym(2024, 6));
        assert_eq!(store.advance(id(1), Direction::Next), ym(2024, 7));
        assert_eq!(store.instances(), vec![id(1)]);

        down.store(false, Ordering::SeqCst);
        assert_eq!(store.advance(id(1), Direction::Next), ym(2024, 8));
        assert_eq!(store.current(id(1)), ym(2024, 8));
    }

    #[test]
    fn remove_reports_backend_failure() {
        let backend = FlakyBackend::default();
        let down = backend.down.clone();
        let store = InstanceStateStore::new(backend, clock());

        down.store(true, Ordering::SeqCst);
        assert!(store.remove(id(1)).is_err());
        assert_eq!(store.remove_all(vec![id(1), id(2)]), 2);
    }

    #[test]
    fn concurrent_advances_are_not_lost() {
        let store = Arc::new(InstanceStateStore::new(MemoryBackend::default(), clock()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        store.advance(id(1), Direction::Prev);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.current(id(1)), ym(2024, 5) - 200);
        assert!(lock(&store.locks).is_empty());
    }

    #[test]
    fn lock_table_does_not_grow() {
        let store = InstanceStateStore::new(MemoryBackend::default(), clock());
        store.advance(id(1), Direction::Next);
        store.select(id(2), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(store.remove_all((10..20).map(id)), 0);

        assert!(lock(&store.locks).is_empty());
    }

    #[test]
    fn held_lock_is_kept_in_table() {
        let store = InstanceStateStore::new(MemoryBackend::default(), clock());

        store.exclusive(id(1), || {
            store.exclusive(id(2), || ());
            assert_eq!(lock(&store.locks).len(), 1);
            assert!(lock(&store.locks).contains_key(&id(1)));
        });

        assert!(lock(&store.locks).is_empty());
    }
}
