// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::sync::mpsc::Receiver;
use thiserror::Error;

use crate::{
    EditedRecord, EntityKind, NewRecord, Pending, Record, RecordEdits, RecordKey, RecordQuery,
};

/// Failure reported by the store for a single write. Only the message is
/// ever shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    pub code: String,
    pub message: String,
}

impl StoreError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    QueryResolved,
    Edited,
    SaveStarted,
    SaveSettled,
    DeleteStarted,
    DeleteSettled,
}

/// Notification sent to subscribers whenever store state that a view may
/// derive from has changed. `key` is `None` for query-level changes and for
/// writes that create a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreChange {
    pub kind: EntityKind,
    pub key: Option<RecordKey>,
    pub change: ChangeKind,
}

/// Generic entity-record store the panel runs against.
///
/// Reads never block: a query the store has not seen yet returns `None` and
/// reports itself unresolved until a background fetch lands. Writes return a
/// [`Pending`] handle. Per-key ordering of overlapping writes is the store's
/// responsibility.
pub trait EntityStore {
    fn entity_records(&self, kind: EntityKind, query: &RecordQuery) -> Option<Vec<Record>>;
    fn has_finished_resolution(&self, kind: EntityKind, query: &RecordQuery) -> bool;

    fn edited_entity_record(&self, kind: EntityKind, key: RecordKey) -> Option<EditedRecord>;
    fn edit_entity_record(&self, kind: EntityKind, key: RecordKey, edits: RecordEdits);
    fn has_edits_for_entity_record(&self, kind: EntityKind, key: RecordKey) -> bool;

    fn save_edited_entity_record(
        &self,
        kind: EntityKind,
        key: RecordKey,
    ) -> Pending<Option<Record>>;
    fn save_entity_record(&self, kind: EntityKind, record: NewRecord) -> Pending<Option<Record>>;
    fn delete_entity_record(&self, kind: EntityKind, key: RecordKey) -> Pending<bool>;

    /// `key == None` addresses the slot used by record creation.
    fn last_entity_save_error(&self, kind: EntityKind, key: Option<RecordKey>)
    -> Option<StoreError>;
    fn last_entity_delete_error(&self, kind: EntityKind, key: RecordKey) -> Option<StoreError>;
    fn is_saving_entity_record(&self, kind: EntityKind, key: Option<RecordKey>) -> bool;
    fn is_deleting_entity_record(&self, kind: EntityKind, key: RecordKey) -> bool;

    fn subscribe(&self) -> Receiver<StoreChange>;
}
