use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags};

use crate::index::domain::span::{Span, SpanTable};
use crate::index::domain::span_repository::{SpanSink, SpanSource, StoreError};

/// Span store backed by a single SQLite file with one table per
/// [`SpanTable`], each indexed on `text`.
///
/// Rows are only ever appended. Re-indexing the same video appends a second
/// copy of every span.
pub struct SqliteSpanStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteSpanStore {
    /// Open or create the store and make sure both tables exist.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let open_err = |e: rusqlite::Error| StoreError::Open {
            path: path.to_path_buf(),
            source: e.into(),
        };
        let conn = Connection::open(path).map_err(open_err)?;
        create_schema(&conn).map_err(open_err)?;
        log::debug!("Opened span store {}", path.display());
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an existing store for lookups only. Nothing is created.
    pub fn open_read_only(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StoreError::Open {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let open_err = |e: rusqlite::Error| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source: e.into(),
        };
        let conn = Connection::open_in_memory().map_err(open_err)?;
        create_schema(&conn).map_err(open_err)?;
        Ok(Self { conn, path: None })
    }

    /// Trade per-row durability for write throughput. A crash mid-run may
    /// lose the batch in flight.
    pub fn tune_for_bulk_load(&self) -> Result<(), StoreError> {
        let open_err = |e: rusqlite::Error| StoreError::Open {
            path: self.path.clone().unwrap_or_else(|| PathBuf::from(":memory:")),
            source: e.into(),
        };
        self.conn
            .execute_batch("PRAGMA synchronous = OFF; PRAGMA cache_size = 10000;")
            .map_err(open_err)?;
        let mode: String = self
            .conn
            .query_row("PRAGMA journal_mode = MEMORY", [], |row| row.get(0))
            .map_err(open_err)?;
        log::debug!("Span store journal mode: {mode}");
        Ok(())
    }

    pub fn count(&self, table: SpanTable) -> Result<usize, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.table_name());
        let count: i64 = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| StoreError::Read {
                table,
                source: e.into(),
            })?;
        Ok(count as usize)
    }
}

impl SpanSink for SqliteSpanStore {
    fn append_many(&mut self, table: SpanTable, spans: &[Span]) -> Result<(), StoreError> {
        if spans.is_empty() {
            return Ok(());
        }
        insert_batch(&mut self.conn, table, spans).map_err(|e| StoreError::Write {
            table,
            count: spans.len(),
            source: e.into(),
        })
    }
}

impl SpanSource for SqliteSpanStore {
    fn lookup(
        &self,
        table: SpanTable,
        text: &str,
        min_confidence: f64,
    ) -> Result<Vec<Span>, StoreError> {
        select_matching(&self.conn, table, text, min_confidence).map_err(|e| StoreError::Read {
            table,
            source: e.into(),
        })
    }
}

fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    for table in SpanTable::ALL {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {name} (
                text TEXT NOT NULL,
                start_time REAL NOT NULL,
                end_time REAL NOT NULL,
                confidence REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS {index} ON {name}(text);",
            name = table.table_name(),
            index = table.index_name(),
        ))?;
    }
    Ok(())
}

fn insert_batch(conn: &mut Connection, table: SpanTable, spans: &[Span]) -> rusqlite::Result<()> {
    let sql = format!(
        "INSERT INTO {} (text, start_time, end_time, confidence) VALUES (?1, ?2, ?3, ?4)",
        table.table_name()
    );
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(&sql)?;
        for span in spans {
            stmt.execute(params![
                span.text,
                span.start_time,
                span.end_time,
                span.confidence
            ])?;
        }
    }
    tx.commit()
}

fn select_matching(
    conn: &Connection,
    table: SpanTable,
    text: &str,
    min_confidence: f64,
) -> rusqlite::Result<Vec<Span>> {
    let sql = format!(
        "SELECT text, start_time, end_time, confidence FROM {}
         WHERE text = ?1 AND confidence >= ?2
         ORDER BY start_time ASC",
        table.table_name()
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map(params![text, min_confidence], |row| {
            Ok(Span {
                text: row.get(0)?,
                start_time: row.get(1)?,
                end_time: row.get(2)?,
                confidence: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
