// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use pageboard_app::{
    CollectionView, DeleteEvent, EditorEvent, EditorTarget, EntityKind, Listing, ListingView,
    NewRecord, PageRow, PageStatus, RecordKey, RecordQuery, ViewEvent,
};
use pageboard_testkit::{FakeStore, StoreCall, page, page_rendered};
use std::sync::Arc;

fn view_over(store: &Arc<FakeStore>) -> CollectionView<FakeStore> {
    CollectionView::new(Arc::clone(store), EntityKind::PAGE)
}

fn queries(store: &FakeStore) -> Vec<RecordQuery> {
    store
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            StoreCall::EntityRecords(query) => Some(query),
            _ => None,
        })
        .collect()
}

#[test]
fn empty_search_sends_unconstrained_query() {
    let store = Arc::new(FakeStore::deferred());
    let view = view_over(&store);
    assert_eq!(view.search_term(), "");
    assert_eq!(queries(&store), vec![RecordQuery { search: None }]);
}

#[test]
fn unresolved_query_shows_loading_without_rows() {
    let store = Arc::new(FakeStore::deferred());
    store.insert(page(1, "About"));
    let view = view_over(&store);
    assert_eq!(view.listing(), &Listing::Loading);
    assert_eq!(view.snapshot().listing, ListingView::Loading);
}

#[test]
fn resolved_empty_query_is_distinct_from_loading() {
    let store = Arc::new(FakeStore::deferred());
    let mut view = view_over(&store);
    store.resolve(&RecordQuery::default(), Vec::new());
    view.poll();
    assert_eq!(view.listing(), &Listing::Empty);
    assert_eq!(view.snapshot().listing, ListingView::Empty);
}

#[test]
fn search_scenario_renders_decoded_row() -> Result<()> {
    let store = Arc::new(FakeStore::deferred());
    let mut view = view_over(&store);

    view.search("Hello");
    let hello = RecordQuery {
        search: Some("Hello".to_owned()),
    };
    assert_eq!(queries(&store).last(), Some(&hello));
    assert_eq!(view.listing(), &Listing::Loading);

    store.resolve(
        &hello,
        vec![page_rendered(5, "Hello & World", "Hello &amp; World")],
    );
    assert!(view.poll().is_empty());

    assert_eq!(
        view.listing(),
        &Listing::Rows(vec![PageRow {
            key: RecordKey::new(5),
            title: "Hello & World".to_owned(),
        }])
    );
    let ListingView::Rows(rows) = view.snapshot().listing else {
        panic!("expected rows");
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "Hello & World");
    assert_eq!(rows[0].edit.label, "Edit");
    assert!(!rows[0].edit.disabled);
    assert_eq!(rows[0].delete.button.label, "Delete");
    assert!(!rows[0].delete.button.disabled);
    Ok(())
}

#[test]
fn clearing_search_drops_the_constraint() {
    let store = Arc::new(FakeStore::new());
    let mut view = view_over(&store);
    view.search("Hello");
    view.search("");
    assert_eq!(
        queries(&store),
        vec![
            RecordQuery { search: None },
            RecordQuery {
                search: Some("Hello".to_owned())
            },
            RecordQuery { search: None },
        ]
    );
}

#[test]
fn rows_follow_store_order() {
    let store = Arc::new(FakeStore::deferred());
    let mut view = view_over(&store);
    store.resolve(
        &RecordQuery::default(),
        vec![page(2, "Zeta"), page(9, "Alpha"), page(4, "Mid")],
    );
    view.poll();
    let Listing::Rows(rows) = view.listing() else {
        panic!("expected rows");
    };
    let keys: Vec<i64> = rows.iter().map(|row| row.key.get()).collect();
    assert_eq!(keys, vec![2, 9, 4]);
}

#[test]
fn create_scenario_adds_row_and_closes_modal() -> Result<()> {
    let store = Arc::new(FakeStore::new());
    let mut view = view_over(&store);
    assert_eq!(view.listing(), &Listing::Empty);

    view.open(EditorTarget::Create)?;
    assert_eq!(view.open_editor(), Some(EditorTarget::Create));
    view.change_title(EditorTarget::Create, "New Page")?;
    assert!(!view.snapshot().editors[0].save.disabled);
    view.save(EditorTarget::Create)?;
    assert!(store.calls().contains(&StoreCall::Create(NewRecord {
        title: "New Page".to_owned(),
        status: PageStatus::Publish,
    })));

    let created = store.succeed_save(None)?;
    let events = view.poll();
    assert_eq!(
        events,
        vec![ViewEvent::Editor(EditorEvent::SaveFinished {
            target: EditorTarget::Create,
            key: created.id,
        })]
    );
    assert_eq!(view.open_editor(), None);
    assert!(view.snapshot().editors.is_empty());
    assert_eq!(
        view.listing(),
        &Listing::Rows(vec![PageRow {
            key: created.id,
            title: "New Page".to_owned(),
        }])
    );
    Ok(())
}

#[test]
fn create_failure_keeps_modal_with_error() -> Result<()> {
    let store = Arc::new(FakeStore::new());
    let mut view = view_over(&store);
    view.open(EditorTarget::Create)?;
    view.change_title(EditorTarget::Create, "New Page")?;
    view.save(EditorTarget::Create)?;

    store.fail_save(None, "Could not reach the server.")?;
    let events = view.poll();
    assert!(matches!(
        events.as_slice(),
        [ViewEvent::Editor(EditorEvent::SaveFailed { .. })]
    ));
    assert_eq!(view.open_editor(), Some(EditorTarget::Create));
    let editors = view.snapshot().editors;
    assert_eq!(
        editors[0].error.as_deref(),
        Some("Error: Could not reach the server.")
    );
    Ok(())
}

#[test]
fn row_edit_updates_listing_after_save() -> Result<()> {
    let store = Arc::new(FakeStore::with_records([page(3, "Team")]));
    let key = RecordKey::new(3);
    let target = EditorTarget::Existing(key);
    let mut view = view_over(&store);

    view.open(target)?;
    view.change_title(target, "Our Team")?;
    view.save(target)?;
    store.succeed_save(Some(key))?;

    let events = view.poll();
    assert_eq!(
        events,
        vec![ViewEvent::Editor(EditorEvent::SaveFinished { target, key })]
    );
    assert_eq!(
        view.listing(),
        &Listing::Rows(vec![PageRow {
            key,
            title: "Our Team".to_owned(),
        }])
    );
    Ok(())
}

#[test]
fn deleted_row_drops_out_of_listing() -> Result<()> {
    let store = Arc::new(FakeStore::with_records([page(1, "About"), page(2, "Blog")]));
    let key = RecordKey::new(2);
    let mut view = view_over(&store);

    view.delete(key)?;
    let ListingView::Rows(rows) = view.snapshot().listing else {
        panic!("expected rows");
    };
    let busy = rows
        .iter()
        .find(|row| row.key == key)
        .expect("row still listed while deleting");
    assert_eq!(busy.delete.button.label, "Deleting");
    assert!(busy.delete.button.disabled);
    let other = rows
        .iter()
        .find(|row| row.key != key)
        .expect("other row listed");
    assert!(!other.delete.button.disabled, "other rows stay interactive");

    store.succeed_delete(key)?;
    let events = view.poll();
    assert_eq!(events, vec![ViewEvent::Delete(DeleteEvent::Deleted { key })]);
    assert_eq!(
        view.listing(),
        &Listing::Rows(vec![PageRow {
            key: RecordKey::new(1),
            title: "About".to_owned(),
        }])
    );
    assert!(view.deleter(key).is_none());
    assert!(view.delete(key).is_err());
    Ok(())
}

#[test]
fn delete_settling_after_refresh_still_reports() -> Result<()> {
    let store = Arc::new(FakeStore::deferred());
    let key = RecordKey::new(2);
    let mut view = view_over(&store);
    store.resolve(&RecordQuery::default(), vec![page(2, "Blog")]);
    view.poll();
    view.delete(key)?;

    // The listing moves on without the row before the delete is polled.
    store.resolve(&RecordQuery::default(), vec![page(8, "Later")]);
    view.poll();
    assert!(view.deleter(key).is_some(), "busy controls are kept");

    store.succeed_delete(key)?;
    let events = view.poll();
    assert_eq!(events, vec![ViewEvent::Delete(DeleteEvent::Deleted { key })]);
    assert!(view.deleter(key).is_none());
    Ok(())
}

#[test]
fn intents_for_unlisted_rows_are_rejected() {
    let store = Arc::new(FakeStore::new());
    let mut view = view_over(&store);
    let target = EditorTarget::Existing(RecordKey::new(42));
    assert!(view.open(target).is_err());
    assert!(view.save(target).is_err());
    assert!(view.delete(RecordKey::new(42)).is_err());
    assert!(store.calls().iter().all(|call| matches!(call, StoreCall::EntityRecords(_))));
}
