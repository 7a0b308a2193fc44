// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use pageboard_app::{
    ChangeKind, Completer, EditedRecord, EntityKind, EntityStore, NewRecord, PageStatus, Pending,
    Record, RecordEdits, RecordKey, RecordQuery, RenderedText, StoreChange, StoreError, pending,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;

pub fn page(id: i64, title: &str) -> Record {
    Record {
        id: RecordKey::new(id),
        title: RenderedText::from_raw(title),
        status: PageStatus::Publish,
        modified: OffsetDateTime::UNIX_EPOCH,
    }
}

/// Record whose rendered title is given verbatim, for exercising decoding.
pub fn page_rendered(id: i64, raw: &str, rendered: &str) -> Record {
    Record {
        id: RecordKey::new(id),
        title: RenderedText {
            raw: raw.to_owned(),
            rendered: rendered.to_owned(),
        },
        status: PageStatus::Publish,
        modified: OffsetDateTime::UNIX_EPOCH,
    }
}

/// Every call a controller made against the store, in order. Reads other
/// than the list query are not recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    EntityRecords(RecordQuery),
    Edit(RecordKey, RecordEdits),
    SaveEdited(RecordKey),
    Create(NewRecord),
    Delete(RecordKey),
}

struct SaveRequest {
    completer: Completer<Option<Record>>,
    create: Option<NewRecord>,
}

#[derive(Default)]
struct QueryState {
    resolved: bool,
    keys: Vec<RecordKey>,
}

#[derive(Default)]
struct FakeState {
    deferred: bool,
    records: BTreeMap<RecordKey, Record>,
    queries: BTreeMap<RecordQuery, QueryState>,
    edits: BTreeMap<RecordKey, RecordEdits>,
    saves: BTreeMap<Option<RecordKey>, VecDeque<SaveRequest>>,
    deletes: BTreeMap<RecordKey, VecDeque<Completer<bool>>>,
    save_errors: BTreeMap<Option<RecordKey>, StoreError>,
    delete_errors: BTreeMap<RecordKey, StoreError>,
    calls: Vec<StoreCall>,
    listeners: Vec<Sender<StoreChange>>,
    next_id: i64,
}

/// In-memory [`EntityStore`] driven by the test. Writes stay in flight until
/// the test settles them with `succeed_*`, `fail_*` or `abandon_save`.
///
/// By default queries resolve immediately against the inserted records. A
/// [`FakeStore::deferred`] store leaves every query unresolved until
/// [`FakeStore::resolve`] is called for it.
pub struct FakeStore {
    kind: EntityKind,
    state: Mutex<FakeState>,
}

impl Default for FakeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            kind: EntityKind::PAGE,
            state: Mutex::new(FakeState {
                next_id: 1,
                ..FakeState::default()
            }),
        }
    }

    pub fn deferred() -> Self {
        let store = Self::new();
        store.lock().deferred = true;
        store
    }

    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    pub fn insert(&self, record: Record) {
        let mut state = self.lock();
        state.next_id = state.next_id.max(record.id.get() + 1);
        state.records.insert(record.id, record);
    }

    /// Marks `query` resolved with exactly `records`, in the given order.
    pub fn resolve(&self, query: &RecordQuery, records: Vec<Record>) {
        {
            let mut state = self.lock();
            let keys = records.iter().map(|record| record.id).collect();
            for record in records {
                state.next_id = state.next_id.max(record.id.get() + 1);
                state.records.insert(record.id, record);
            }
            state.queries.insert(
                query.clone(),
                QueryState {
                    resolved: true,
                    keys,
                },
            );
        }
        self.notify(None, ChangeKind::QueryResolved);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn record(&self, key: RecordKey) -> Option<Record> {
        self.lock().records.get(&key).cloned()
    }

    pub fn pending_saves(&self, key: Option<RecordKey>) -> usize {
        self.lock().saves.get(&key).map_or(0, VecDeque::len)
    }

    pub fn pending_deletes(&self, key: RecordKey) -> usize {
        self.lock().deletes.get(&key).map_or(0, VecDeque::len)
    }

    /// Settles the oldest save for `key` (`None` for creates) successfully.
    pub fn succeed_save(&self, key: Option<RecordKey>) -> Result<Record> {
        let saved = {
            let mut state = self.lock();
            let request = pop_save(&mut state, key)?;
            let saved = match (key, request.create) {
                (Some(key), _) => {
                    let edits = state.edits.remove(&key).unwrap_or_default();
                    let record = state
                        .records
                        .get_mut(&key)
                        .ok_or_else(|| anyhow!("no record {key} to save"))?;
                    if let Some(title) = edits.title {
                        record.title = RenderedText::from_raw(title);
                    }
                    record.clone()
                }
                (None, Some(create)) => {
                    let id = RecordKey::new(state.next_id);
                    state.next_id += 1;
                    let record = Record {
                        id,
                        title: RenderedText::from_raw(create.title),
                        status: create.status,
                        modified: OffsetDateTime::UNIX_EPOCH,
                    };
                    state.records.insert(id, record.clone());
                    for query in state.queries.values_mut() {
                        query.keys.insert(0, id);
                    }
                    record
                }
                (None, None) => bail!("create request without a payload"),
            };
            request.completer.complete(Some(saved.clone()));
            saved
        };
        self.notify(key, ChangeKind::SaveSettled);
        Ok(saved)
    }

    pub fn fail_save(&self, key: Option<RecordKey>, message: &str) -> Result<()> {
        {
            let mut state = self.lock();
            let request = pop_save(&mut state, key)?;
            state
                .save_errors
                .insert(key, StoreError::new("fake_failure", message));
            request.completer.complete(None);
        }
        self.notify(key, ChangeKind::SaveSettled);
        Ok(())
    }

    /// Drops the oldest save for `key` without completing it.
    pub fn abandon_save(&self, key: Option<RecordKey>) -> Result<()> {
        {
            let mut state = self.lock();
            drop(pop_save(&mut state, key)?);
        }
        self.notify(key, ChangeKind::SaveSettled);
        Ok(())
    }

    pub fn succeed_delete(&self, key: RecordKey) -> Result<()> {
        {
            let mut state = self.lock();
            let completer = pop_delete(&mut state, key)?;
            state.records.remove(&key);
            state.edits.remove(&key);
            for query in state.queries.values_mut() {
                query.keys.retain(|listed| *listed != key);
            }
            completer.complete(true);
        }
        self.notify(Some(key), ChangeKind::DeleteSettled);
        Ok(())
    }

    pub fn fail_delete(&self, key: RecordKey, message: &str) -> Result<()> {
        {
            let mut state = self.lock();
            let completer = pop_delete(&mut state, key)?;
            state
                .delete_errors
                .insert(key, StoreError::new("fake_failure", message));
            completer.complete(false);
        }
        self.notify(Some(key), ChangeKind::DeleteSettled);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn notify(&self, key: Option<RecordKey>, change: ChangeKind) {
        let event = StoreChange {
            kind: self.kind,
            key,
            change,
        };
        self.lock()
            .listeners
            .retain(|listener| listener.send(event).is_ok());
    }

    fn listed(state: &FakeState, query: &RecordQuery) -> Option<Vec<Record>> {
        if state.deferred {
            let listed = state.queries.get(query)?;
            if !listed.resolved {
                return None;
            }
            return Some(
                listed
                    .keys
                    .iter()
                    .filter_map(|key| state.records.get(key).cloned())
                    .collect(),
            );
        }
        Some(
            state
                .records
                .values()
                .rev()
                .filter(|record| query.matches(record))
                .cloned()
                .collect(),
        )
    }
}

fn pop_save(state: &mut FakeState, key: Option<RecordKey>) -> Result<SaveRequest> {
    state
        .saves
        .get_mut(&key)
        .and_then(VecDeque::pop_front)
        .ok_or_else(|| anyhow!("no save in flight for {key:?}"))
}

fn pop_delete(state: &mut FakeState, key: RecordKey) -> Result<Completer<bool>> {
    state
        .deletes
        .get_mut(&key)
        .and_then(VecDeque::pop_front)
        .ok_or_else(|| anyhow!("no delete in flight for {key}"))
}

impl EntityStore for FakeStore {
    fn entity_records(&self, kind: EntityKind, query: &RecordQuery) -> Option<Vec<Record>> {
        if kind != self.kind {
            return None;
        }
        let mut state = self.lock();
        state.calls.push(StoreCall::EntityRecords(query.clone()));
        Self::listed(&state, query)
    }

    fn has_finished_resolution(&self, kind: EntityKind, query: &RecordQuery) -> bool {
        let state = self.lock();
        kind == self.kind
            && (!state.deferred || state.queries.get(query).is_some_and(|q| q.resolved))
    }

    fn edited_entity_record(&self, kind: EntityKind, key: RecordKey) -> Option<EditedRecord> {
        if kind != self.kind {
            return None;
        }
        let state = self.lock();
        let record = state.records.get(&key)?;
        Some(EditedRecord::merged(record, state.edits.get(&key)))
    }

    fn edit_entity_record(&self, kind: EntityKind, key: RecordKey, edits: RecordEdits) {
        if kind != self.kind {
            return;
        }
        {
            let mut state = self.lock();
            state.calls.push(StoreCall::Edit(key, edits.clone()));
            let Some(record) = state.records.get(&key).cloned() else {
                return;
            };
            let mut merged = state.edits.remove(&key).unwrap_or_default();
            merged.merge(edits);
            let merged = merged.without_noops(&record);
            if !merged.is_empty() {
                state.edits.insert(key, merged);
            }
        }
        self.notify(Some(key), ChangeKind::Edited);
    }

    fn has_edits_for_entity_record(&self, kind: EntityKind, key: RecordKey) -> bool {
        kind == self.kind && self.lock().edits.contains_key(&key)
    }

    fn save_edited_entity_record(
        &self,
        _kind: EntityKind,
        key: RecordKey,
    ) -> Pending<Option<Record>> {
        let (completer, handle) = pending();
        {
            let mut state = self.lock();
            state.calls.push(StoreCall::SaveEdited(key));
            state.save_errors.remove(&Some(key));
            state
                .saves
                .entry(Some(key))
                .or_default()
                .push_back(SaveRequest {
                    completer,
                    create: None,
                });
        }
        self.notify(Some(key), ChangeKind::SaveStarted);
        handle
    }

    fn save_entity_record(&self, _kind: EntityKind, record: NewRecord) -> Pending<Option<Record>> {
        let (completer, handle) = pending();
        {
            let mut state = self.lock();
            state.calls.push(StoreCall::Create(record.clone()));
            state.save_errors.remove(&None);
            state.saves.entry(None).or_default().push_back(SaveRequest {
                completer,
                create: Some(record),
            });
        }
        self.notify(None, ChangeKind::SaveStarted);
        handle
    }

    fn delete_entity_record(&self, _kind: EntityKind, key: RecordKey) -> Pending<bool> {
        let (completer, handle) = pending();
        {
            let mut state = self.lock();
            state.calls.push(StoreCall::Delete(key));
            state.delete_errors.remove(&key);
            state.deletes.entry(key).or_default().push_back(completer);
        }
        self.notify(Some(key), ChangeKind::DeleteStarted);
        handle
    }

    fn last_entity_save_error(
        &self,
        kind: EntityKind,
        key: Option<RecordKey>,
    ) -> Option<StoreError> {
        if kind != self.kind {
            return None;
        }
        self.lock().save_errors.get(&key).cloned()
    }

    fn last_entity_delete_error(&self, kind: EntityKind, key: RecordKey) -> Option<StoreError> {
        if kind != self.kind {
            return None;
        }
        self.lock().delete_errors.get(&key).cloned()
    }

    fn is_saving_entity_record(&self, kind: EntityKind, key: Option<RecordKey>) -> bool {
        kind == self.kind && self.lock().saves.get(&key).is_some_and(|q| !q.is_empty())
    }

    fn is_deleting_entity_record(&self, kind: EntityKind, key: RecordKey) -> bool {
        kind == self.kind && self.lock().deletes.get(&key).is_some_and(|q| !q.is_empty())
    }

    fn subscribe(&self) -> Receiver<StoreChange> {
        let (tx, rx) = mpsc::channel();
        self.lock().listeners.push(tx);
        rx
    }
}
