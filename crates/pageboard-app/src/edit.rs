// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    DEFAULT_CREATE_STATUS, EntityKind, EntityStore, NewRecord, Pending, Record, RecordEdits,
    RecordKey, Settlement,
};

/// Which record an editor is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EditorTarget {
    Create,
    Existing(RecordKey),
}

impl EditorTarget {
    pub const fn key(self) -> Option<RecordKey> {
        match self {
            Self::Create => None,
            Self::Existing(key) => Some(key),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorPhase {
    Closed,
    Clean,
    Dirty,
    Saving,
    Errored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    SaveFinished {
        target: EditorTarget,
        key: RecordKey,
    },
    SaveFailed {
        target: EditorTarget,
        message: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonView {
    pub label: &'static str,
    pub disabled: bool,
    pub busy: bool,
}

impl ButtonView {
    pub const fn enabled(label: &'static str) -> Self {
        Self {
            label,
            disabled: false,
            busy: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorView {
    pub target: EditorTarget,
    pub phase: EditorPhase,
    pub heading: &'static str,
    pub field_label: &'static str,
    pub title: String,
    pub error: Option<String>,
    pub save: ButtonView,
    pub cancel: ButtonView,
}

enum EditorMode {
    Existing(RecordKey),
    Create { title: String },
}

/// Modal editor for one record, or for a record that does not exist yet.
///
/// In edit mode the store holds the draft: every title change is pushed to
/// it immediately and nothing is mirrored here. In create mode there is no
/// key to attach edits to, so the draft title lives in the controller until
/// the create call is issued.
///
/// Everything rendered comes from the store's flags. The pending handle kept
/// here only produces the completion event and guards against a second save.
pub struct RecordEditController<S: EntityStore + ?Sized> {
    store: Arc<S>,
    kind: EntityKind,
    mode: EditorMode,
    open: bool,
    in_flight: Option<Pending<Option<Record>>>,
    settled: VecDeque<EditorEvent>,
}

impl<S: EntityStore + ?Sized> RecordEditController<S> {
    pub fn existing(store: Arc<S>, kind: EntityKind, key: RecordKey) -> Self {
        Self {
            store,
            kind,
            mode: EditorMode::Existing(key),
            open: false,
            in_flight: None,
            settled: VecDeque::new(),
        }
    }

    pub fn create(store: Arc<S>, kind: EntityKind) -> Self {
        Self {
            store,
            kind,
            mode: EditorMode::Create {
                title: String::new(),
            },
            open: false,
            in_flight: None,
            settled: VecDeque::new(),
        }
    }

    pub fn target(&self) -> EditorTarget {
        match &self.mode {
            EditorMode::Existing(key) => EditorTarget::Existing(*key),
            EditorMode::Create { .. } => EditorTarget::Create,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// True when no save issued through this controller is unsettled or
    /// still waiting to be reported.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.settled.is_empty()
    }

    pub fn title(&self) -> String {
        match &self.mode {
            EditorMode::Existing(key) => self
                .store
                .edited_entity_record(self.kind, *key)
                .map(|record| record.title)
                .unwrap_or_default(),
            EditorMode::Create { title } => title.clone(),
        }
    }

    pub fn has_edits(&self) -> bool {
        match &self.mode {
            EditorMode::Existing(key) => self.store.has_edits_for_entity_record(self.kind, *key),
            EditorMode::Create { title } => !title.is_empty(),
        }
    }

    pub fn is_saving(&self) -> bool {
        self.store
            .is_saving_entity_record(self.kind, self.target().key())
    }

    pub fn last_error(&self) -> Option<String> {
        self.store
            .last_entity_save_error(self.kind, self.target().key())
            .map(|error| error.message)
    }

    pub fn save_disabled(&self) -> bool {
        !self.has_edits() || self.is_saving()
    }

    pub fn phase(&self) -> EditorPhase {
        if !self.open {
            return EditorPhase::Closed;
        }
        if self.is_saving() {
            return EditorPhase::Saving;
        }
        let dirty = self.has_edits();
        if dirty && self.last_error().is_some() {
            EditorPhase::Errored
        } else if dirty {
            EditorPhase::Dirty
        } else {
            EditorPhase::Clean
        }
    }

    pub fn open_button(&self) -> ButtonView {
        match self.mode {
            EditorMode::Existing(_) => ButtonView::enabled("Edit"),
            EditorMode::Create { .. } => ButtonView::enabled("Create Page"),
        }
    }

    pub fn open(&mut self) {
        if !self.open {
            debug!(editor = ?self.target(), "editor opened");
            self.open = true;
        }
    }

    pub fn change_title(&mut self, title: impl Into<String>) -> Result<()> {
        if !self.open {
            bail!("editor for {:?} is closed; open it before editing", self.target());
        }
        let title = title.into();
        match &mut self.mode {
            EditorMode::Existing(key) => {
                self.store
                    .edit_entity_record(self.kind, *key, RecordEdits::title(title));
            }
            EditorMode::Create { title: draft } => *draft = title,
        }
        Ok(())
    }

    pub fn save(&mut self) -> Result<()> {
        self.settle();
        if !self.open {
            bail!("editor for {:?} is closed; open it before saving", self.target());
        }
        if self.in_flight.is_some() || self.is_saving() {
            bail!("save for {:?} is already in flight", self.target());
        }
        if !self.has_edits() {
            bail!("nothing to save for {:?}", self.target());
        }

        let pending = match &self.mode {
            EditorMode::Existing(key) => self.store.save_edited_entity_record(self.kind, *key),
            EditorMode::Create { title } => self.store.save_entity_record(
                self.kind,
                NewRecord {
                    title: title.clone(),
                    status: DEFAULT_CREATE_STATUS,
                },
            ),
        };
        debug!(editor = ?self.target(), "save issued");
        self.in_flight = Some(pending);
        Ok(())
    }

    /// Closes the editor without touching the store. Edits already sent to
    /// the store stay there.
    pub fn cancel(&mut self) -> Result<()> {
        self.settle();
        if !self.open {
            return Ok(());
        }
        if self.in_flight.is_some() || self.is_saving() {
            bail!(
                "cannot cancel {:?} while its save is in flight",
                self.target()
            );
        }
        self.close();
        Ok(())
    }

    /// Checks the in-flight save, if any. Yields an event exactly once per
    /// issued save.
    pub fn poll(&mut self) -> Option<EditorEvent> {
        self.settle();
        self.settled.pop_front()
    }

    fn settle(&mut self) {
        let target = self.target();
        let settlement = match self.in_flight.as_mut() {
            Some(pending) => pending.poll(),
            None => return,
        };
        let event = match settlement {
            Settlement::Waiting => return,
            Settlement::Settled(Some(record)) => {
                self.close();
                debug!(editor = ?target, key = %record.id, "save finished");
                EditorEvent::SaveFinished {
                    target,
                    key: record.id,
                }
            }
            Settlement::Settled(None) | Settlement::Abandoned => {
                let message = self.last_error();
                warn!(editor = ?target, error = ?message, "save failed");
                EditorEvent::SaveFailed { target, message }
            }
        };
        self.in_flight = None;
        self.settled.push_back(event);
    }

    pub fn view(&self) -> Option<EditorView> {
        if !self.open {
            return None;
        }
        let saving = self.is_saving();
        let heading = match self.mode {
            EditorMode::Existing(_) => "Edit Page",
            EditorMode::Create { .. } => "Create Page",
        };
        Some(EditorView {
            target: self.target(),
            phase: self.phase(),
            heading,
            field_label: "Page title",
            title: self.title(),
            error: self.last_error().map(|message| format!("Error: {message}")),
            save: ButtonView {
                label: if saving { "Saving" } else { "Save" },
                disabled: self.save_disabled(),
                busy: saving,
            },
            cancel: ButtonView {
                label: "Cancel",
                disabled: saving,
                busy: false,
            },
        })
    }

    fn close(&mut self) {
        self.open = false;
        if let EditorMode::Create { title } = &mut self.mode {
            title.clear();
        }
        debug!(editor = ?self.target(), "editor closed");
    }
}
