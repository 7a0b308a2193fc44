// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod record_store;

pub use record_store::RecordStore;

use anyhow::{Context, Result, anyhow, bail};
use pageboard_app::{
    NewRecord, PageStatus, Record, RecordEdits, RecordKey, RecordQuery, RenderedText, StoreError,
};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const APP_NAME: &str = "pageboard";
pub const MAX_TITLE_CHARS: usize = 200;

const REQUIRED_COLUMNS: &[&str] = &["id", "title", "status", "created_at", "modified_at"];

const DEMO_PAGES: [(&str, PageStatus); 6] = [
    ("Home", PageStatus::Publish),
    ("About Us", PageStatus::Publish),
    ("Hello & Welcome", PageStatus::Publish),
    ("Contact", PageStatus::Publish),
    ("Privacy Policy", PageStatus::Draft),
    ("Terms <Draft>", PageStatus::Private),
];

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if table_exists(&self.conn, "pages")? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }
        Ok(())
    }

    pub fn seed_demo_pages(&self) -> Result<()> {
        for (title, status) in DEMO_PAGES {
            self.create_page(&NewRecord {
                title: title.to_owned(),
                status,
            })
            .with_context(|| format!("seed demo page {title:?}"))?;
        }
        Ok(())
    }

    pub fn count_pages(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))
            .context("count pages")?;
        usize::try_from(count).context("page count out of range")
    }

    /// Pages matching `query`, newest first.
    pub fn list_pages(&self, query: &RecordQuery) -> Result<Vec<Record>> {
        let mut sql = String::from(
            "
            SELECT id, title, status, modified_at
            FROM pages
            ",
        );
        let pattern = query.search.as_deref().map(like_pattern);
        if pattern.is_some() {
            sql.push_str("WHERE title LIKE ?1 ESCAPE '\\'\n");
        }
        sql.push_str("ORDER BY id DESC");

        let mut stmt = self.conn.prepare(&sql).context("prepare pages query")?;
        let rows = match &pattern {
            Some(pattern) => stmt.query_map(params![pattern], page_from_row),
            None => stmt.query_map([], page_from_row),
        }
        .context("query pages")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect pages")
    }

    pub fn get_page(&self, key: RecordKey) -> Result<Option<Record>> {
        self.conn
            .query_row(
                "
                SELECT id, title, status, modified_at
                FROM pages
                WHERE id = ?
                ",
                params![key.get()],
                page_from_row,
            )
            .optional()
            .with_context(|| format!("load page {key}"))
    }

    pub fn create_page(&self, page: &NewRecord) -> Result<Record> {
        validate_title(&page.title)?;
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO pages (title, status, created_at, modified_at)
                VALUES (?, ?, ?, ?)
                ",
                params![page.title, page.status.as_str(), now, now],
            )
            .context("insert page")?;
        let key = RecordKey::new(self.conn.last_insert_rowid());
        self.get_page(key)?
            .ok_or_else(|| anyhow!("page {key} vanished after insert"))
    }

    /// Applies `edits` and returns the stored page. Empty edits just return
    /// the current row.
    pub fn update_page(&self, key: RecordKey, edits: &RecordEdits) -> Result<Record> {
        if let Some(title) = &edits.title {
            validate_title(title)?;
            let changed = self
                .conn
                .execute(
                    "UPDATE pages SET title = ?, modified_at = ? WHERE id = ?",
                    params![title, now_rfc3339()?, key.get()],
                )
                .with_context(|| format!("update page {key}"))?;
            if changed == 0 {
                return Err(invalid_id(key).into());
            }
        }
        self.get_page(key)?.ok_or_else(|| invalid_id(key).into())
    }

    pub fn delete_page(&self, key: RecordKey) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM pages WHERE id = ?", params![key.get()])
            .with_context(|| format!("delete page {key}"))?;
        if changed == 0 {
            return Err(invalid_id(key).into());
        }
        Ok(())
    }
}

/// Converts a failed database call into the error shape the panel shows.
pub fn store_error(error: &anyhow::Error) -> StoreError {
    match error.downcast_ref::<StoreError>() {
        Some(store_error) => store_error.clone(),
        None => StoreError::new("db_error", format!("{error:#}")),
    }
}

pub fn validate_title(title: &str) -> std::result::Result<(), StoreError> {
    let length = title.chars().count();
    if length > MAX_TITLE_CHARS {
        return Err(StoreError::new(
            "invalid_title",
            format!("Title is {length} characters long; the limit is {MAX_TITLE_CHARS}."),
        ));
    }
    Ok(())
}

fn invalid_id(key: RecordKey) -> StoreError {
    StoreError::new("invalid_id", format!("Invalid page ID {key}."))
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("PAGEBOARD_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    Ok(data_dir()?.join("pageboard.db"))
}

pub fn default_log_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("pageboard.log"))
}

fn data_dir() -> Result<PathBuf> {
    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set PAGEBOARD_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir)
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn page_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    let status_raw: String = row.get(2)?;
    let status = PageStatus::parse(&status_raw)
        .ok_or_else(|| to_sql_error(anyhow!("unknown page status {status_raw}")))?;
    let modified_raw: String = row.get(3)?;
    let title: String = row.get(1)?;

    Ok(Record {
        id: RecordKey::new(row.get(0)?),
        title: RenderedText::from_raw(title),
        status,
        modified: parse_datetime(&modified_raw).map_err(to_sql_error)?,
    })
}

fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn validate_schema(conn: &Connection) -> Result<()> {
    let columns = table_columns(conn, "pages")?;
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !columns.contains(*column))
        .collect();

    if !missing.is_empty() {
        bail!(
            "table `pages` is missing required columns: {}; run migration before launching",
            missing.join(", ")
        );
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339).with_context(|| format!("unsupported datetime {raw:?}"))
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            error.to_string(),
        )),
    )
}
