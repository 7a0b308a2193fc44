// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::RecordKey;

/// Scope for every store call: an entity root ("postType") plus the entity
/// name within it ("page").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKind {
    pub root: &'static str,
    pub name: &'static str,
}

impl EntityKind {
    pub const PAGE: Self = Self {
        root: "postType",
        name: "page",
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageStatus {
    Draft,
    Pending,
    Private,
    Publish,
}

impl PageStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Private => "private",
            Self::Publish => "publish",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "private" => Some(Self::Private),
            "publish" => Some(Self::Publish),
            _ => None,
        }
    }
}

/// Status given to every page created from the panel.
pub const DEFAULT_CREATE_STATUS: PageStatus = PageStatus::Publish;

/// A text field as the store transports it: `raw` is what an editor works
/// with, `rendered` is the entity-encoded form meant for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedText {
    pub raw: String,
    pub rendered: String,
}

impl RenderedText {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let rendered = crate::text::encode_entities(&raw);
        Self { raw, rendered }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: RecordKey,
    pub title: RenderedText,
    pub status: PageStatus,
    pub modified: OffsetDateTime,
}

/// Persisted record with pending edits merged over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditedRecord {
    pub id: RecordKey,
    pub title: String,
    pub status: PageStatus,
}

impl EditedRecord {
    pub fn merged(record: &Record, edits: Option<&RecordEdits>) -> Self {
        let title = edits
            .and_then(|edits| edits.title.clone())
            .unwrap_or_else(|| record.title.raw.clone());
        Self {
            id: record.id,
            title,
            status: record.status,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordEdits {
    pub title: Option<String>,
}

impl RecordEdits {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
    }

    /// Folds `other` over `self`, later values winning.
    pub fn merge(&mut self, other: RecordEdits) {
        if other.title.is_some() {
            self.title = other.title;
        }
    }

    /// Drops edits that match the persisted values.
    pub fn without_noops(mut self, record: &Record) -> Self {
        if self.title.as_deref() == Some(record.title.raw.as_str()) {
            self.title = None;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub title: String,
    pub status: PageStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordQuery {
    pub search: Option<String>,
}

impl RecordQuery {
    /// An empty term means "unconstrained", so the search key is left out
    /// rather than sent as an empty string.
    pub fn from_search(term: &str) -> Self {
        if term.is_empty() {
            Self::default()
        } else {
            Self {
                search: Some(term.to_owned()),
            }
        }
    }

    /// Case-insensitive substring match on the raw title. Case folding is
    /// ASCII-only, the same as SQLite's `LIKE`.
    pub fn matches(&self, record: &Record) -> bool {
        match &self.search {
            None => true,
            Some(term) => record
                .title
                .raw
                .to_ascii_lowercase()
                .contains(&term.to_ascii_lowercase()),
        }
    }
}
