// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use pageboard_app::{
    ChangeKind, Completer, EditedRecord, EntityKind, EntityStore, NewRecord, Pending, Record,
    RecordEdits, RecordKey, RecordQuery, StoreChange, StoreError, pending,
};
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::{Database, store_error};

/// Listings kept per store. Each search term is its own query, so typing a
/// term would otherwise leave one entry per keystroke.
const MAX_CACHED_QUERIES: usize = 16;

#[derive(Default)]
struct QueryCache {
    resolved: bool,
    /// `None` when the fetch failed.
    keys: Option<Vec<RecordKey>>,
    last_read: u64,
}

#[derive(Default)]
struct CacheState {
    records: BTreeMap<RecordKey, Record>,
    queries: BTreeMap<RecordQuery, QueryCache>,
    edits: BTreeMap<RecordKey, RecordEdits>,
    saving: BTreeMap<Option<RecordKey>, usize>,
    deleting: BTreeMap<RecordKey, usize>,
    save_errors: BTreeMap<Option<RecordKey>, StoreError>,
    delete_errors: BTreeMap<RecordKey, StoreError>,
    reads: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.reads += 1;
        self.reads
    }

    /// Starts tracking `query`, dropping the least recently read listings
    /// beyond the cap. The new entry is never the one dropped.
    fn track(&mut self, query: RecordQuery) {
        let last_read = self.tick();
        self.queries.insert(
            query,
            QueryCache {
                last_read,
                ..QueryCache::default()
            },
        );
        while self.queries.len() > MAX_CACHED_QUERIES {
            let Some(oldest) = self
                .queries
                .iter()
                .min_by_key(|(_, cached)| cached.last_read)
                .map(|(query, _)| query.clone())
            else {
                break;
            };
            tracing::trace!(search = ?oldest.search, "query evicted");
            self.queries.remove(&oldest);
        }
    }

    fn upsert(&mut self, record: Record) {
        let key = record.id;
        for (query, cached) in &mut self.queries {
            let Some(keys) = cached.keys.as_mut() else {
                continue;
            };
            keys.retain(|listed| *listed != key);
            if query.matches(&record) {
                let position = keys.partition_point(|listed| *listed > key);
                keys.insert(position, key);
            }
        }
        self.records.insert(key, record);
    }

    fn remove(&mut self, key: RecordKey) {
        for cached in self.queries.values_mut() {
            if let Some(keys) = cached.keys.as_mut() {
                keys.retain(|listed| *listed != key);
            }
        }
        self.records.remove(&key);
        self.edits.remove(&key);
    }

    fn finish_save(&mut self, key: Option<RecordKey>) {
        finish(&mut self.saving, key);
    }

    fn finish_delete(&mut self, key: RecordKey) {
        finish(&mut self.deleting, key);
    }
}

fn finish<K: Ord>(counters: &mut BTreeMap<K, usize>, key: K) {
    if let Some(count) = counters.get_mut(&key) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            counters.remove(&key);
        }
    }
}

struct Shared {
    kind: EntityKind,
    db: Mutex<Database>,
    state: Mutex<CacheState>,
    listeners: Mutex<Vec<Sender<StoreChange>>>,
    latency: Duration,
}

type Job = Box<dyn FnOnce(&Shared) + Send>;

/// [`EntityStore`] backed by the SQLite pages table.
///
/// Reads are served from an in-memory cache and never touch the database on
/// the caller's thread. Query fetches and writes are queued to a single
/// worker thread, so they settle in the order they were issued. The worker
/// exits once the last clone of the store is dropped.
#[derive(Clone)]
pub struct RecordStore {
    shared: Arc<Shared>,
    jobs: Sender<Job>,
}

impl RecordStore {
    pub fn new(db: Database, latency: Duration) -> Self {
        let shared = Arc::new(Shared {
            kind: EntityKind::PAGE,
            db: Mutex::new(db),
            state: Mutex::new(CacheState::default()),
            listeners: Mutex::new(Vec::new()),
            latency,
        });
        let (jobs, queue) = mpsc::channel::<Job>();
        let worker = Arc::clone(&shared);
        thread::spawn(move || {
            for job in queue {
                job(&*worker);
            }
            tracing::debug!("record store worker stopped");
        });
        Self { shared, jobs }
    }

    fn serves(&self, kind: EntityKind) -> bool {
        kind == self.shared.kind
    }

    /// A job that cannot be queued is dropped, which abandons any pending
    /// handle it owns.
    fn enqueue(&self, job: impl FnOnce(&Shared) + Send + 'static) {
        if self.jobs.send(Box::new(job)).is_err() {
            tracing::error!("record store worker is gone");
        }
    }

    fn spawn_fetch(&self, query: RecordQuery) {
        self.enqueue(move |shared| {
            let db = lock(&shared.db);
            let fetched = db.list_pages(&query);
            {
                let mut state = lock(&shared.state);
                let keys = match fetched {
                    Ok(records) => {
                        tracing::debug!(search = ?query.search, count = records.len(), "query resolved");
                        let keys = records.iter().map(|record| record.id).collect();
                        for record in records {
                            state.records.insert(record.id, record);
                        }
                        Some(keys)
                    }
                    Err(error) => {
                        tracing::warn!(search = ?query.search, error = %format!("{error:#}"), "query failed");
                        None
                    }
                };
                // Evicted while in flight: the records stay, the listing does not.
                if let Some(cached) = state.queries.get_mut(&query) {
                    cached.resolved = true;
                    cached.keys = keys;
                }
            }
            drop(db);
            shared.notify(None, ChangeKind::QueryResolved);
        });
    }
}

impl Shared {
    fn notify(&self, key: Option<RecordKey>, change: ChangeKind) {
        let event = StoreChange {
            kind: self.kind,
            key,
            change,
        };
        lock(&self.listeners).retain(|listener| listener.send(event).is_ok());
    }

    fn run_save(
        &self,
        key: Option<RecordKey>,
        write: impl FnOnce(&Database) -> anyhow::Result<Record>,
        sent: Option<RecordEdits>,
        completer: Completer<Option<Record>>,
    ) {
        thread::sleep(self.latency);
        let db = lock(&self.db);
        let outcome = write(&*db);
        let saved = {
            let mut state = lock(&self.state);
            state.finish_save(key);
            match outcome {
                Ok(record) => {
                    if let Some(key) = key
                        && state.edits.get(&key) == sent.as_ref()
                    {
                        state.edits.remove(&key);
                    }
                    tracing::info!(page = %record.id, "page saved");
                    state.upsert(record.clone());
                    Some(record)
                }
                Err(error) => {
                    let error = store_error(&error);
                    tracing::warn!(page = ?key, code = %error.code, error = %error, "save failed");
                    state.save_errors.insert(key, error);
                    None
                }
            }
        };
        drop(db);
        completer.complete(saved);
        self.notify(key, ChangeKind::SaveSettled);
    }

    fn run_delete(&self, key: RecordKey, completer: Completer<bool>) {
        thread::sleep(self.latency);
        let db = lock(&self.db);
        let outcome = db.delete_page(key);
        let deleted = {
            let mut state = lock(&self.state);
            state.finish_delete(key);
            match outcome {
                Ok(()) => {
                    tracing::info!(page = %key, "page deleted");
                    state.remove(key);
                    true
                }
                Err(error) => {
                    let error = store_error(&error);
                    tracing::warn!(page = %key, code = %error.code, error = %error, "delete failed");
                    state.delete_errors.insert(key, error);
                    false
                }
            }
        };
        drop(db);
        completer.complete(deleted);
        self.notify(Some(key), ChangeKind::DeleteSettled);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl EntityStore for RecordStore {
    fn entity_records(&self, kind: EntityKind, query: &RecordQuery) -> Option<Vec<Record>> {
        if !self.serves(kind) {
            return None;
        }
        let mut state = lock(&self.shared.state);
        let tick = state.tick();
        if let Some(cached) = state.queries.get_mut(query) {
            cached.last_read = tick;
            let keys = cached.keys.clone()?;
            return Some(
                keys.iter()
                    .filter_map(|key| state.records.get(key).cloned())
                    .collect(),
            );
        }
        state.track(query.clone());
        drop(state);
        self.spawn_fetch(query.clone());
        None
    }

    fn has_finished_resolution(&self, kind: EntityKind, query: &RecordQuery) -> bool {
        self.serves(kind)
            && lock(&self.shared.state)
                .queries
                .get(query)
                .is_some_and(|cached| cached.resolved)
    }

    fn edited_entity_record(&self, kind: EntityKind, key: RecordKey) -> Option<EditedRecord> {
        if !self.serves(kind) {
            return None;
        }
        let state = lock(&self.shared.state);
        let record = state.records.get(&key)?;
        Some(EditedRecord::merged(record, state.edits.get(&key)))
    }

    fn edit_entity_record(&self, kind: EntityKind, key: RecordKey, edits: RecordEdits) {
        if !self.serves(kind) {
            return;
        }
        {
            let mut state = lock(&self.shared.state);
            let Some(record) = state.records.get(&key).cloned() else {
                tracing::debug!(page = %key, "edit for unknown page ignored");
                return;
            };
            let mut merged = state.edits.remove(&key).unwrap_or_default();
            merged.merge(edits);
            let merged = merged.without_noops(&record);
            if !merged.is_empty() {
                state.edits.insert(key, merged);
            }
        }
        self.shared.notify(Some(key), ChangeKind::Edited);
    }

    fn has_edits_for_entity_record(&self, kind: EntityKind, key: RecordKey) -> bool {
        self.serves(kind) && lock(&self.shared.state).edits.contains_key(&key)
    }

    fn save_edited_entity_record(
        &self,
        kind: EntityKind,
        key: RecordKey,
    ) -> Pending<Option<Record>> {
        if !self.serves(kind) {
            return Pending::ready(None);
        }
        let (completer, handle) = pending();
        let edits = {
            let mut state = lock(&self.shared.state);
            *state.saving.entry(Some(key)).or_default() += 1;
            state.save_errors.remove(&Some(key));
            state.edits.get(&key).cloned()
        };
        self.shared.notify(Some(key), ChangeKind::SaveStarted);

        tracing::debug!(page = %key, "saving page");
        self.enqueue(move |shared| {
            let payload = edits.clone().unwrap_or_default();
            shared.run_save(
                Some(key),
                |db| db.update_page(key, &payload),
                edits,
                completer,
            );
        });
        handle
    }

    fn save_entity_record(&self, kind: EntityKind, record: NewRecord) -> Pending<Option<Record>> {
        if !self.serves(kind) {
            return Pending::ready(None);
        }
        let (completer, handle) = pending();
        {
            let mut state = lock(&self.shared.state);
            *state.saving.entry(None).or_default() += 1;
            state.save_errors.remove(&None);
        }
        self.shared.notify(None, ChangeKind::SaveStarted);

        tracing::debug!(title = %record.title, "creating page");
        self.enqueue(move |shared| {
            shared.run_save(None, |db| db.create_page(&record), None, completer);
        });
        handle
    }

    fn delete_entity_record(&self, kind: EntityKind, key: RecordKey) -> Pending<bool> {
        if !self.serves(kind) {
            return Pending::ready(false);
        }
        let (completer, handle) = pending();
        {
            let mut state = lock(&self.shared.state);
            *state.deleting.entry(key).or_default() += 1;
            state.delete_errors.remove(&key);
        }
        self.shared.notify(Some(key), ChangeKind::DeleteStarted);

        tracing::debug!(page = %key, "deleting page");
        self.enqueue(move |shared| shared.run_delete(key, completer));
        handle
    }

    fn last_entity_save_error(
        &self,
        kind: EntityKind,
        key: Option<RecordKey>,
    ) -> Option<StoreError> {
        if !self.serves(kind) {
            return None;
        }
        lock(&self.shared.state).save_errors.get(&key).cloned()
    }

    fn last_entity_delete_error(&self, kind: EntityKind, key: RecordKey) -> Option<StoreError> {
        if !self.serves(kind) {
            return None;
        }
        lock(&self.shared.state).delete_errors.get(&key).cloned()
    }

    fn is_saving_entity_record(&self, kind: EntityKind, key: Option<RecordKey>) -> bool {
        self.serves(kind) && lock(&self.shared.state).saving.contains_key(&key)
    }

    fn is_deleting_entity_record(&self, kind: EntityKind, key: RecordKey) -> bool {
        self.serves(kind) && lock(&self.shared.state).deleting.contains_key(&key)
    }

    fn subscribe(&self) -> Receiver<StoreChange> {
        let (tx, rx) = mpsc::channel();
        lock(&self.shared.listeners).push(tx);
        rx
    }
}
