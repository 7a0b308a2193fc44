// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{ButtonView, EntityKind, EntityStore, Pending, RecordKey, Settlement};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteEvent {
    Deleted { key: RecordKey },
    DeleteFailed { key: RecordKey, message: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteView {
    pub button: ButtonView,
    pub error: Option<String>,
}

/// Row-level delete action. There is no confirmation step here; a prompt,
/// if wanted, belongs to whatever presents the button.
pub struct RecordDeleteController<S: EntityStore + ?Sized> {
    store: Arc<S>,
    kind: EntityKind,
    key: RecordKey,
    in_flight: Option<Pending<bool>>,
    settled: VecDeque<DeleteEvent>,
}

impl<S: EntityStore + ?Sized> RecordDeleteController<S> {
    pub fn new(store: Arc<S>, kind: EntityKind, key: RecordKey) -> Self {
        Self {
            store,
            kind,
            key,
            in_flight: None,
            settled: VecDeque::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.settled.is_empty()
    }

    /// Store-side flag, so a delete issued elsewhere disables this button too.
    pub fn is_deleting(&self) -> bool {
        self.store.is_deleting_entity_record(self.kind, self.key)
    }

    pub fn last_error(&self) -> Option<String> {
        self.store
            .last_entity_delete_error(self.kind, self.key)
            .map(|error| error.message)
    }

    pub fn delete(&mut self) -> Result<()> {
        self.settle();
        if self.in_flight.is_some() || self.is_deleting() {
            bail!("delete for record {} is already in flight", self.key);
        }
        self.in_flight = Some(self.store.delete_entity_record(self.kind, self.key));
        debug!(key = %self.key, "delete issued");
        Ok(())
    }

    pub fn poll(&mut self) -> Option<DeleteEvent> {
        self.settle();
        self.settled.pop_front()
    }

    fn settle(&mut self) {
        let settlement = match self.in_flight.as_mut() {
            Some(pending) => pending.poll(),
            None => return,
        };
        let event = match settlement {
            Settlement::Waiting => return,
            Settlement::Settled(true) => {
                debug!(key = %self.key, "delete finished");
                DeleteEvent::Deleted { key: self.key }
            }
            Settlement::Settled(false) | Settlement::Abandoned => {
                let message = self.last_error();
                warn!(key = %self.key, error = ?message, "delete failed");
                DeleteEvent::DeleteFailed {
                    key: self.key,
                    message,
                }
            }
        };
        self.in_flight = None;
        self.settled.push_back(event);
    }

    pub fn view(&self) -> DeleteView {
        let deleting = self.is_deleting();
        DeleteView {
            button: ButtonView {
                label: if deleting { "Deleting" } else { "Delete" },
                disabled: deleting,
                busy: deleting,
            },
            error: self.last_error().map(|message| format!("Error: {message}")),
        }
    }
}
