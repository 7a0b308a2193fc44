// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use pageboard_app::{
    ChangeKind, CollectionView, DeleteEvent, EditorEvent, EditorTarget, EntityKind, EntityStore,
    Listing, NewRecord, PageStatus, RecordEdits, RecordKey, RecordQuery, Settlement, ViewEvent,
};
use pageboard_db::{Database, RecordStore};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

fn seeded_store(titles: &[&str]) -> Result<RecordStore> {
    let db = Database::open_memory()?;
    db.bootstrap()?;
    for title in titles {
        db.create_page(&NewRecord {
            title: (*title).to_owned(),
            status: PageStatus::Publish,
        })?;
    }
    Ok(RecordStore::new(db, Duration::ZERO))
}

fn wait_for<T>(mut step: impl FnMut() -> Option<T>) -> Result<T> {
    let deadline = Instant::now() + WAIT;
    loop {
        if let Some(value) = step() {
            return Ok(value);
        }
        if Instant::now() > deadline {
            bail!("timed out after {WAIT:?}");
        }
        thread::sleep(Duration::from_millis(5));
    }
}

fn resolved(store: &RecordStore, query: &RecordQuery) -> Result<Option<Vec<String>>> {
    store.entity_records(EntityKind::PAGE, query);
    wait_for(|| store.has_finished_resolution(EntityKind::PAGE, query).then_some(()))?;
    Ok(store
        .entity_records(EntityKind::PAGE, query)
        .map(|records| records.into_iter().map(|record| record.title.raw).collect()))
}

fn settle<T>(handle: &mut pageboard_app::Pending<T>) -> Result<Option<T>> {
    wait_for(|| match handle.poll() {
        Settlement::Waiting => None,
        Settlement::Settled(value) => Some(Some(value)),
        Settlement::Abandoned => Some(None),
    })
}

#[test]
fn first_read_is_unresolved_then_lands() -> Result<()> {
    let store = seeded_store(&["About", "Hello & World"])?;
    let query = RecordQuery::default();
    let changes = store.subscribe();

    assert_eq!(store.entity_records(EntityKind::PAGE, &query), None);
    assert!(!store.has_finished_resolution(EntityKind::PAGE, &query));

    let change = changes.recv_timeout(WAIT)?;
    assert_eq!(change.change, ChangeKind::QueryResolved);
    assert_eq!(
        resolved(&store, &query)?,
        Some(vec!["Hello & World".to_owned(), "About".to_owned()])
    );
    Ok(())
}

#[test]
fn other_entity_kinds_are_not_served() -> Result<()> {
    let store = seeded_store(&["About"])?;
    let posts = EntityKind {
        root: "postType",
        name: "post",
    };
    let query = RecordQuery::default();
    assert_eq!(store.entity_records(posts, &query), None);
    assert!(!store.has_finished_resolution(posts, &query));

    let mut save = store.save_entity_record(
        posts,
        NewRecord {
            title: "Nope".to_owned(),
            status: PageStatus::Publish,
        },
    );
    assert_eq!(save.poll(), Settlement::Settled(None));
    let mut delete = store.delete_entity_record(posts, RecordKey::new(1));
    assert_eq!(delete.poll(), Settlement::Settled(false));
    Ok(())
}

#[test]
fn saving_edits_updates_cache_and_clears_draft() -> Result<()> {
    let store = seeded_store(&["About"])?;
    let query = RecordQuery::default();
    resolved(&store, &query)?;
    let key = RecordKey::new(1);

    store.edit_entity_record(EntityKind::PAGE, key, RecordEdits::title("About us"));
    assert!(store.has_edits_for_entity_record(EntityKind::PAGE, key));
    assert_eq!(
        store
            .edited_entity_record(EntityKind::PAGE, key)
            .map(|record| record.title),
        Some("About us".to_owned())
    );

    let mut save = store.save_edited_entity_record(EntityKind::PAGE, key);
    let saved = settle(&mut save)?.flatten().expect("save succeeds");
    assert_eq!(saved.title.raw, "About us");
    assert!(!store.is_saving_entity_record(EntityKind::PAGE, Some(key)));
    assert!(!store.has_edits_for_entity_record(EntityKind::PAGE, key));
    assert_eq!(resolved(&store, &query)?, Some(vec!["About us".to_owned()]));
    Ok(())
}

#[test]
fn failed_save_records_error_until_next_attempt() -> Result<()> {
    let store = seeded_store(&["About"])?;
    resolved(&store, &RecordQuery::default())?;
    let key = RecordKey::new(1);

    store.edit_entity_record(EntityKind::PAGE, key, RecordEdits::title("x".repeat(250)));
    let mut save = store.save_edited_entity_record(EntityKind::PAGE, key);
    assert_eq!(settle(&mut save)?, Some(None));

    let error = store
        .last_entity_save_error(EntityKind::PAGE, Some(key))
        .expect("error recorded");
    assert_eq!(error.code, "invalid_title");
    assert!(
        store.has_edits_for_entity_record(EntityKind::PAGE, key),
        "draft survives a failed save"
    );

    store.edit_entity_record(EntityKind::PAGE, key, RecordEdits::title("About us"));
    let mut retry = store.save_edited_entity_record(EntityKind::PAGE, key);
    assert_eq!(
        store.last_entity_save_error(EntityKind::PAGE, Some(key)),
        None
    );
    assert!(settle(&mut retry)?.flatten().is_some());
    Ok(())
}

#[test]
fn created_page_joins_matching_queries() -> Result<()> {
    let store = seeded_store(&["About"])?;
    let everything = RecordQuery::default();
    let hello = RecordQuery::from_search("hello");
    resolved(&store, &everything)?;
    assert_eq!(resolved(&store, &hello)?, Some(Vec::new()));

    let mut create = store.save_entity_record(
        EntityKind::PAGE,
        NewRecord {
            title: "Hello there".to_owned(),
            status: PageStatus::Publish,
        },
    );
    assert!(store.is_saving_entity_record(EntityKind::PAGE, None));
    let created = settle(&mut create)?.flatten().expect("create succeeds");
    assert_eq!(created.id, RecordKey::new(2));
    assert!(!store.is_saving_entity_record(EntityKind::PAGE, None));

    assert_eq!(
        resolved(&store, &everything)?,
        Some(vec!["Hello there".to_owned(), "About".to_owned()])
    );
    assert_eq!(
        resolved(&store, &hello)?,
        Some(vec!["Hello there".to_owned()])
    );
    Ok(())
}

#[test]
fn deleting_missing_page_reports_error() -> Result<()> {
    let store = seeded_store(&[])?;
    let key = RecordKey::new(9);
    let mut delete = store.delete_entity_record(EntityKind::PAGE, key);
    assert!(store.is_deleting_entity_record(EntityKind::PAGE, key));
    assert_eq!(settle(&mut delete)?, Some(false));
    assert!(!store.is_deleting_entity_record(EntityKind::PAGE, key));
    assert_eq!(
        store
            .last_entity_delete_error(EntityKind::PAGE, key)
            .map(|error| error.code),
        Some("invalid_id".to_owned())
    );
    Ok(())
}

#[test]
fn latency_delays_settlement() -> Result<()> {
    let db = Database::open_memory()?;
    db.bootstrap()?;
    let store = RecordStore::new(db, Duration::from_millis(50));
    let started = Instant::now();
    let mut create = store.save_entity_record(
        EntityKind::PAGE,
        NewRecord {
            title: "Slow".to_owned(),
            status: PageStatus::Publish,
        },
    );
    assert_eq!(create.poll(), Settlement::Waiting);
    assert!(settle(&mut create)?.flatten().is_some());
    assert!(started.elapsed() >= Duration::from_millis(50));
    Ok(())
}

#[test]
fn collection_view_runs_end_to_end() -> Result<()> {
    let store = Arc::new(seeded_store(&["About", "Blog"])?);
    let mut view = CollectionView::new(Arc::clone(&store), EntityKind::PAGE);
    assert_eq!(view.listing(), &Listing::Loading);

    wait_for(|| {
        view.poll();
        matches!(view.listing(), Listing::Rows(_)).then_some(())
    })?;

    let blog = RecordKey::new(2);
    let target = EditorTarget::Existing(blog);
    view.open(target)?;
    view.change_title(target, "Journal")?;
    view.save(target)?;
    let events = wait_for(|| {
        let events = view.poll();
        (!events.is_empty()).then_some(events)
    })?;
    assert_eq!(
        events,
        vec![ViewEvent::Editor(EditorEvent::SaveFinished { target, key: blog })]
    );
    assert_eq!(view.open_editor(), None);

    view.delete(RecordKey::new(1))?;
    let events = wait_for(|| {
        let events = view.poll();
        (!events.is_empty()).then_some(events)
    })?;
    assert_eq!(
        events,
        vec![ViewEvent::Delete(DeleteEvent::Deleted {
            key: RecordKey::new(1)
        })]
    );
    let Listing::Rows(rows) = view.listing() else {
        bail!("expected rows, got {:?}", view.listing());
    };
    let titles: Vec<&str> = rows.iter().map(|row| row.title.as_str()).collect();
    assert_eq!(titles, vec!["Journal"]);
    Ok(())
}
