//! Embedded persistence gateway: CRUD over image, page, window, and
//! annotation records in a local SQLite database.
//!
//! `Ok(None)` / an empty list means "not yet initialized" and is distinct
//! from a `StorageError`.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::geometry::Color;
use crate::model::{
    AnnotationId, AnnotationRecord, ImageId, ImageRecord, PageState, WindowMode, WindowState,
};

const DB_DIR: &str = "markview";
const DB_FILE: &str = "viewer.db";

/// Stand-in for a stored color string that no longer parses.
const FALLBACK_COLOR: Color = Color::new(255, 0, 255);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("missing HOME environment variable")]
    MissingHomeDirectory,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

pub trait RecordStore {
    fn images(&self) -> StorageResult<Vec<ImageRecord>>;
    fn image(&self, id: ImageId) -> StorageResult<Option<ImageRecord>>;
    fn insert_image(&self, record: &ImageRecord) -> StorageResult<ImageId>;
    fn update_image(&self, record: &ImageRecord) -> StorageResult<()>;
    /// Removes the image row and, with it, every annotation it owns.
    fn remove_image(&self, id: ImageId) -> StorageResult<()>;

    fn page(&self) -> StorageResult<Option<PageState>>;
    fn insert_page(&self, page: &PageState) -> StorageResult<i64>;
    fn update_page(&self, page: &PageState) -> StorageResult<()>;

    fn window(&self) -> StorageResult<Option<WindowState>>;
    fn insert_window(&self, window: &WindowState) -> StorageResult<i64>;
    fn update_window(&self, window: &WindowState) -> StorageResult<()>;

    fn annotations(&self, image_id: ImageId) -> StorageResult<Vec<AnnotationRecord>>;
    fn insert_annotation(&self, record: &AnnotationRecord) -> StorageResult<AnnotationId>;
    fn remove_annotation(&self, id: AnnotationId) -> StorageResult<()>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn open_default() -> StorageResult<Self> {
        Self::open(Self::default_db_path()?)
    }

    /// `$XDG_DATA_HOME/markview/viewer.db`, falling back to
    /// `$HOME/.local/share`.
    pub fn default_db_path() -> StorageResult<PathBuf> {
        let mut root = match std::env::var_os("XDG_DATA_HOME") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let home = std::env::var_os("HOME").ok_or(StorageError::MissingHomeDirectory)?;
                let mut path = PathBuf::from(home);
                path.push(".local");
                path.push("share");
                path
            }
        };
        root.push(DB_DIR);
        root.push(DB_FILE);
        Ok(root)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StorageResult<()> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE IF NOT EXISTS images (
                 id          INTEGER PRIMARY KEY AUTOINCREMENT,
                 full_path   TEXT NOT NULL,
                 scale_x     REAL NOT NULL,
                 scale_y     REAL NOT NULL,
                 angle       REAL NOT NULL
             );
             CREATE TABLE IF NOT EXISTS page (
                 id               INTEGER PRIMARY KEY AUTOINCREMENT,
                 list_visible     INTEGER NOT NULL,
                 edit_bar_visible INTEGER NOT NULL,
                 image_id         INTEGER REFERENCES images(id) ON DELETE SET NULL
             );
             CREATE TABLE IF NOT EXISTS window (
                 id      INTEGER PRIMARY KEY AUTOINCREMENT,
                 \"left\" REAL NOT NULL,
                 top     REAL NOT NULL,
                 width   REAL NOT NULL,
                 height  REAL NOT NULL,
                 mode    INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS annotations (
                 id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                 image_id           INTEGER NOT NULL REFERENCES images(id) ON DELETE CASCADE,
                 path               TEXT NOT NULL,
                 border_color       TEXT NOT NULL,
                 background_color   TEXT NOT NULL,
                 background_opacity REAL NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_annotations_image_id ON annotations(image_id);",
        )?;
        Ok(())
    }
}

fn parse_stored_color(raw: &str) -> Color {
    Color::from_hex(raw).unwrap_or_else(|| {
        tracing::warn!(color = raw, "unreadable stored color, using fallback");
        FALLBACK_COLOR
    })
}

fn parse_stored_window_mode(code: i64) -> WindowMode {
    WindowMode::from_code(code).unwrap_or_else(|| {
        tracing::warn!(code, "unknown stored window mode, using normal");
        WindowMode::default()
    })
}

impl RecordStore for SqliteStore {
    fn images(&self) -> StorageResult<Vec<ImageRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, full_path, scale_x, scale_y, angle FROM images ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(ImageRecord {
                id: row.get(0)?,
                full_path: row.get(1)?,
                scale_x: row.get(2)?,
                scale_y: row.get(3)?,
                angle: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn image(&self, id: ImageId) -> StorageResult<Option<ImageRecord>> {
        self.conn
            .query_row(
                "SELECT id, full_path, scale_x, scale_y, angle FROM images WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ImageRecord {
                        id: row.get(0)?,
                        full_path: row.get(1)?,
                        scale_x: row.get(2)?,
                        scale_y: row.get(3)?,
                        angle: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    fn insert_image(&self, record: &ImageRecord) -> StorageResult<ImageId> {
        self.conn.execute(
            "INSERT INTO images (full_path, scale_x, scale_y, angle) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.full_path,
                record.scale_x,
                record.scale_y,
                record.angle
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_image(&self, record: &ImageRecord) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE images SET scale_x = ?1, scale_y = ?2, angle = ?3 WHERE id = ?4",
            params![record.scale_x, record.scale_y, record.angle, record.id],
        )?;
        Ok(())
    }

    fn remove_image(&self, id: ImageId) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM images WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn page(&self) -> StorageResult<Option<PageState>> {
        self.conn
            .query_row(
                "SELECT id, list_visible, edit_bar_visible, image_id FROM page LIMIT 1",
                [],
                |row| {
                    Ok(PageState {
                        id: row.get(0)?,
                        list_visible: row.get(1)?,
                        edit_bar_visible: row.get(2)?,
                        image_id: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    fn insert_page(&self, page: &PageState) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO page (list_visible, edit_bar_visible, image_id) VALUES (?1, ?2, ?3)",
            params![page.list_visible, page.edit_bar_visible, page.image_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_page(&self, page: &PageState) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE page SET list_visible = ?1, edit_bar_visible = ?2, image_id = ?3 WHERE id = ?4",
            params![
                page.list_visible,
                page.edit_bar_visible,
                page.image_id,
                page.id
            ],
        )?;
        Ok(())
    }

    fn window(&self) -> StorageResult<Option<WindowState>> {
        self.conn
            .query_row(
                "SELECT id, \"left\", top, width, height, mode FROM window LIMIT 1",
                [],
                |row| {
                    Ok(WindowState {
                        id: row.get(0)?,
                        left: row.get(1)?,
                        top: row.get(2)?,
                        width: row.get(3)?,
                        height: row.get(4)?,
                        mode: parse_stored_window_mode(row.get(5)?),
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    fn insert_window(&self, window: &WindowState) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO window (\"left\", top, width, height, mode) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                window.left,
                window.top,
                window.width,
                window.height,
                window.mode.code()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_window(&self, window: &WindowState) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE window SET \"left\" = ?1, top = ?2, width = ?3, height = ?4, mode = ?5 \
             WHERE id = ?6",
            params![
                window.left,
                window.top,
                window.width,
                window.height,
                window.mode.code(),
                window.id
            ],
        )?;
        Ok(())
    }

    fn annotations(&self, image_id: ImageId) -> StorageResult<Vec<AnnotationRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, image_id, path, border_color, background_color, background_opacity \
             FROM annotations WHERE image_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![image_id], |row| {
            Ok(AnnotationRecord {
                id: row.get(0)?,
                image_id: row.get(1)?,
                path: row.get(2)?,
                border_color: parse_stored_color(&row.get::<_, String>(3)?),
                background_color: parse_stored_color(&row.get::<_, String>(4)?),
                background_opacity: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn insert_annotation(&self, record: &AnnotationRecord) -> StorageResult<AnnotationId> {
        self.conn.execute(
            "INSERT INTO annotations (image_id, path, border_color, background_color, \
             background_opacity) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.image_id,
                record.path,
                record.border_color.to_hex(),
                record.background_color.to_hex(),
                record.background_opacity
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn remove_annotation(&self, id: AnnotationId) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM annotations WHERE id = ?1", params![id])?;
        Ok(())
    }
}
