// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use tracing::{debug, trace};

use crate::{
    ButtonView, DeleteEvent, DeleteView, EditorEvent, EditorTarget, EditorView, EntityKind,
    EntityStore, RecordDeleteController, RecordEditController, RecordKey, RecordQuery,
    StoreChange, decode_entities,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRow {
    pub key: RecordKey,
    pub title: String,
}

/// Derived state of the list. `Loading` and `Empty` are deliberately
/// separate: one means "not fetched yet", the other "fetched, nothing matched".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Loading,
    Empty,
    Rows(Vec<PageRow>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    pub key: RecordKey,
    pub title: String,
    pub edit: ButtonView,
    pub delete: DeleteView,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingView {
    Loading,
    Empty,
    Rows(Vec<RowView>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSnapshot {
    pub search: String,
    pub listing: ListingView,
    pub create: ButtonView,
    pub editors: Vec<EditorView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    Editor(EditorEvent),
    Delete(DeleteEvent),
}

struct RowControls<S: EntityStore + ?Sized> {
    edit: RecordEditController<S>,
    delete: RecordDeleteController<S>,
}

impl<S: EntityStore + ?Sized> RowControls<S> {
    fn is_idle(&self) -> bool {
        self.edit.is_idle() && !self.edit.is_open() && self.delete.is_idle()
    }
}

/// Searchable list of records with per-row edit/delete controls and a
/// create editor.
///
/// The listing is re-derived from the store whenever the store reports a
/// change for this entity kind; nothing else triggers a refresh.
pub struct CollectionView<S: EntityStore + ?Sized> {
    store: Arc<S>,
    kind: EntityKind,
    search: String,
    changes: Receiver<StoreChange>,
    listing: Listing,
    rows: BTreeMap<RecordKey, RowControls<S>>,
    creator: RecordEditController<S>,
}

impl<S: EntityStore + ?Sized> CollectionView<S> {
    pub fn new(store: Arc<S>, kind: EntityKind) -> Self {
        let changes = store.subscribe();
        let creator = RecordEditController::create(Arc::clone(&store), kind);
        let mut view = Self {
            store,
            kind,
            search: String::new(),
            changes,
            listing: Listing::Loading,
            rows: BTreeMap::new(),
            creator,
        };
        view.refresh();
        view
    }

    pub fn search_term(&self) -> &str {
        &self.search
    }

    pub fn query(&self) -> RecordQuery {
        RecordQuery::from_search(&self.search)
    }

    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    pub fn search(&mut self, term: impl Into<String>) {
        self.search = term.into();
        debug!(search = %self.search, "search term changed");
        self.refresh();
    }

    /// Settles child controllers, then drains store notifications and
    /// re-derives the listing if anything relevant changed.
    pub fn poll(&mut self) -> Vec<ViewEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.creator.poll() {
            events.push(ViewEvent::Editor(event));
        }
        for controls in self.rows.values_mut() {
            while let Some(event) = controls.edit.poll() {
                events.push(ViewEvent::Editor(event));
            }
            while let Some(event) = controls.delete.poll() {
                events.push(ViewEvent::Delete(event));
            }
        }

        let mut stale = !events.is_empty();
        while let Ok(change) = self.changes.try_recv() {
            trace!(?change, "store change");
            stale |= change.kind == self.kind;
        }
        if stale {
            self.refresh();
        }
        events
    }

    pub fn editor(&self, target: EditorTarget) -> Option<&RecordEditController<S>> {
        match target {
            EditorTarget::Create => Some(&self.creator),
            EditorTarget::Existing(key) => self.rows.get(&key).map(|controls| &controls.edit),
        }
    }

    pub fn editor_mut(&mut self, target: EditorTarget) -> Option<&mut RecordEditController<S>> {
        match target {
            EditorTarget::Create => Some(&mut self.creator),
            EditorTarget::Existing(key) => {
                self.rows.get_mut(&key).map(|controls| &mut controls.edit)
            }
        }
    }

    pub fn deleter(&self, key: RecordKey) -> Option<&RecordDeleteController<S>> {
        self.rows.get(&key).map(|controls| &controls.delete)
    }

    pub fn deleter_mut(&mut self, key: RecordKey) -> Option<&mut RecordDeleteController<S>> {
        self.rows.get_mut(&key).map(|controls| &mut controls.delete)
    }

    /// The editor currently shown as a modal, if any. The create editor wins
    /// when several are open.
    pub fn open_editor(&self) -> Option<EditorTarget> {
        if self.creator.is_open() {
            return Some(EditorTarget::Create);
        }
        self.rows
            .iter()
            .find(|(_, controls)| controls.edit.is_open())
            .map(|(key, _)| EditorTarget::Existing(*key))
    }

    pub fn open(&mut self, target: EditorTarget) -> Result<()> {
        self.require_editor(target)?.open();
        Ok(())
    }

    pub fn change_title(&mut self, target: EditorTarget, title: impl Into<String>) -> Result<()> {
        self.require_editor(target)?.change_title(title)
    }

    pub fn save(&mut self, target: EditorTarget) -> Result<()> {
        self.require_editor(target)?.save()
    }

    pub fn cancel(&mut self, target: EditorTarget) -> Result<()> {
        self.require_editor(target)?.cancel()
    }

    pub fn delete(&mut self, key: RecordKey) -> Result<()> {
        self.deleter_mut(key)
            .ok_or_else(|| anyhow!("no listed page with id {key}"))?
            .delete()
    }

    pub fn snapshot(&self) -> CollectionSnapshot {
        let listing = match &self.listing {
            Listing::Loading => ListingView::Loading,
            Listing::Empty => ListingView::Empty,
            Listing::Rows(rows) => ListingView::Rows(
                rows.iter()
                    .filter_map(|row| {
                        let controls = self.rows.get(&row.key)?;
                        Some(RowView {
                            key: row.key,
                            title: row.title.clone(),
                            edit: controls.edit.open_button(),
                            delete: controls.delete.view(),
                        })
                    })
                    .collect(),
            ),
        };

        let editors = std::iter::once(&self.creator)
            .chain(self.rows.values().map(|controls| &controls.edit))
            .filter_map(|editor| editor.view())
            .collect();

        CollectionSnapshot {
            search: self.search.clone(),
            listing,
            create: self.creator.open_button(),
            editors,
        }
    }

    fn require_editor(&mut self, target: EditorTarget) -> Result<&mut RecordEditController<S>> {
        self.editor_mut(target)
            .ok_or_else(|| anyhow!("no listed page for editor {target:?}"))
    }

    fn refresh(&mut self) {
        let query = self.query();
        let records = self.store.entity_records(self.kind, &query);
        let resolved = self.store.has_finished_resolution(self.kind, &query);

        self.listing = match records {
            _ if !resolved => Listing::Loading,
            Some(records) if !records.is_empty() => Listing::Rows(
                records
                    .iter()
                    .map(|record| PageRow {
                        key: record.id,
                        title: decode_entities(&record.title.rendered),
                    })
                    .collect(),
            ),
            _ => Listing::Empty,
        };

        let listed: BTreeSet<RecordKey> = match &self.listing {
            Listing::Rows(rows) => rows.iter().map(|row| row.key).collect(),
            Listing::Loading | Listing::Empty => BTreeSet::new(),
        };
        self.rows
            .retain(|key, controls| listed.contains(key) || !controls.is_idle());
        for key in listed {
            self.rows.entry(key).or_insert_with(|| RowControls {
                edit: RecordEditController::existing(Arc::clone(&self.store), self.kind, key),
                delete: RecordDeleteController::new(Arc::clone(&self.store), self.kind, key),
            });
        }
    }
}
