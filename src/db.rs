use std::path::Path;

use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, Row};

use crate::error::{Error, Result};
use crate::frame::FrameLabel;
use crate::pipeline::{ExcerptRecord, SourceDocument};

pub const SCHEMA_VERSION: i64 = 1;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    let found: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    if found > SCHEMA_VERSION {
        return Err(Error::SchemaVersion {
            found,
            supported: SCHEMA_VERSION,
        });
    }
    if found == SCHEMA_VERSION {
        return Ok(());
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            id           INTEGER PRIMARY KEY,
            content_key  TEXT UNIQUE NOT NULL,
            url          TEXT NOT NULL,
            text         TEXT NOT NULL,
            speaker      TEXT,
            date         TEXT,
            year         INTEGER,
            title        TEXT,
            house        TEXT,
            processed    BOOLEAN NOT NULL DEFAULT 0,
            processed_at TEXT,
            created_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_documents_processed ON documents(processed);

        CREATE TABLE IF NOT EXISTS excerpts (
            id                INTEGER PRIMARY KEY,
            document_id       INTEGER NOT NULL REFERENCES documents(id),
            dedup_key         TEXT UNIQUE NOT NULL,
            url               TEXT NOT NULL,
            speaker           TEXT NOT NULL,
            date              TEXT,
            year              INTEGER,
            house             TEXT,
            title             TEXT,
            text              TEXT NOT NULL,
            word_count        INTEGER NOT NULL,
            migration_terms   INTEGER NOT NULL,
            labour_terms      INTEGER NOT NULL,
            min_distance      INTEGER,
            extraction_method TEXT NOT NULL,
            frame             TEXT NOT NULL CHECK(frame IN ('NEED','THREAT','RACIALIZED','MIXED','OTHER')),
            confidence        INTEGER NOT NULL CHECK(confidence BETWEEN 0 AND 10),
            linkage           TEXT NOT NULL DEFAULT '[]',
            quality           INTEGER NOT NULL,
            gloss             TEXT NOT NULL,
            created_at        TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_excerpts_year ON excerpts(year);
        CREATE INDEX IF NOT EXISTS idx_excerpts_frame ON excerpts(frame);
        CREATE INDEX IF NOT EXISTS idx_excerpts_confidence ON excerpts(confidence);

        CREATE VIRTUAL TABLE IF NOT EXISTS excerpts_fts USING fts5(
            text, speaker, gloss,
            content='excerpts', content_rowid='id', tokenize='porter'
        );
        CREATE TRIGGER IF NOT EXISTS excerpts_ai AFTER INSERT ON excerpts BEGIN
            INSERT INTO excerpts_fts(rowid, text, speaker, gloss)
            VALUES (new.id, new.text, new.speaker, new.gloss);
        END;
        CREATE TRIGGER IF NOT EXISTS excerpts_ad AFTER DELETE ON excerpts BEGIN
            INSERT INTO excerpts_fts(excerpts_fts, rowid, text, speaker, gloss)
            VALUES ('delete', old.id, old.text, old.speaker, old.gloss);
        END;
        CREATE TRIGGER IF NOT EXISTS excerpts_au AFTER UPDATE ON excerpts BEGIN
            INSERT INTO excerpts_fts(excerpts_fts, rowid, text, speaker, gloss)
            VALUES ('delete', old.id, old.text, old.speaker, old.gloss);
            INSERT INTO excerpts_fts(rowid, text, speaker, gloss)
            VALUES (new.id, new.text, new.speaker, new.gloss);
        END;
        ",
    )?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

// ── Documents ──

pub fn insert_documents(conn: &Connection, docs: &[SourceDocument]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO documents
             (content_key, url, text, speaker, date, year, title, house)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for d in docs {
            count += stmt.execute(params![
                d.content_key(), d.url, d.text, d.speaker, d.date, d.year(), d.title, d.house,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub struct StoredDocument {
    pub id: i64,
    pub doc: SourceDocument,
}

pub fn fetch_unprocessed(conn: &Connection, limit: Option<usize>) -> Result<Vec<StoredDocument>> {
    let sql = format!(
        "SELECT id, url, text, speaker, date, title, house
         FROM documents
         WHERE processed = 0
         ORDER BY id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(StoredDocument {
                id: row.get(0)?,
                doc: SourceDocument {
                    url: row.get(1)?,
                    text: row.get(2)?,
                    speaker: row.get(3)?,
                    date: row.get(4)?,
                    title: row.get(5)?,
                    house: row.get(6)?,
                },
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Store the excerpts of a batch of documents and mark them processed, in
/// one transaction. Returns the number of newly inserted excerpts.
pub fn save_processed(conn: &Connection, batch: &[(i64, Vec<ExcerptRecord>)]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut e_stmt = tx.prepare(
            "INSERT OR IGNORE INTO excerpts
             (document_id, dedup_key, url, speaker, date, year, house, title, text,
              word_count, migration_terms, labour_terms, min_distance, extraction_method,
              frame, confidence, linkage, quality, gloss)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19)",
        )?;
        let mut d_stmt = tx.prepare(
            "UPDATE documents SET processed = 1, processed_at = datetime('now') WHERE id = ?1",
        )?;
        for (doc_id, records) in batch {
            for r in records {
                let linkage = serde_json::to_string(&r.linkage)?;
                count += e_stmt.execute(params![
                    doc_id, r.dedup_key, r.url, r.speaker, r.date, r.year, r.house, r.title,
                    r.text, r.word_count, r.migration_terms, r.labour_terms, r.min_distance,
                    r.extraction_method, r.frame.as_str(), r.confidence, linkage, r.quality,
                    r.gloss,
                ])?;
            }
            d_stmt.execute(params![doc_id])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Excerpts ──

pub struct StoredExcerpt {
    pub id: i64,
    pub record: ExcerptRecord,
}

const EXCERPT_COLUMNS: &str = "e.id, e.dedup_key, e.url, e.speaker, e.date, e.year, e.house, e.title,
     e.text, e.word_count, e.migration_terms, e.labour_terms, e.min_distance,
     e.extraction_method, e.frame, e.confidence, e.linkage, e.quality, e.gloss";

fn excerpt_from_row(row: &Row) -> rusqlite::Result<StoredExcerpt> {
    let frame: String = row.get(14)?;
    let frame = frame
        .parse::<FrameLabel>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(14, Type::Text, Box::new(e)))?;
    let linkage: String = row.get(16)?;
    let linkage = serde_json::from_str(&linkage)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(16, Type::Text, Box::new(e)))?;

    Ok(StoredExcerpt {
        id: row.get(0)?,
        record: ExcerptRecord {
            dedup_key: row.get(1)?,
            url: row.get(2)?,
            speaker: row.get(3)?,
            date: row.get(4)?,
            year: row.get(5)?,
            house: row.get(6)?,
            title: row.get(7)?,
            text: row.get(8)?,
            word_count: row.get(9)?,
            migration_terms: row.get(10)?,
            labour_terms: row.get(11)?,
            min_distance: row.get(12)?,
            extraction_method: row.get(13)?,
            frame,
            confidence: row.get(15)?,
            linkage,
            quality: row.get(17)?,
            gloss: row.get(18)?,
        },
    })
}

pub fn fetch_all_excerpts(conn: &Connection) -> Result<Vec<StoredExcerpt>> {
    let sql = format!("SELECT {} FROM excerpts e ORDER BY e.id", EXCERPT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], excerpt_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Write back classification fields. Extraction columns are never touched.
/// Returns the number of rows that changed.
pub fn update_assessments(conn: &Connection, rows: &[StoredExcerpt]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut changed = 0;
    {
        let mut stmt = tx.prepare(
            "UPDATE excerpts
             SET min_distance = ?2, frame = ?3, confidence = ?4, linkage = ?5, gloss = ?6
             WHERE id = ?1 AND (min_distance IS NOT ?2 OR frame != ?3 OR confidence != ?4
                                OR linkage != ?5 OR gloss != ?6)",
        )?;
        for s in rows {
            let r = &s.record;
            changed += stmt.execute(params![
                s.id, r.min_distance, r.frame.as_str(), r.confidence,
                serde_json::to_string(&r.linkage)?, r.gloss,
            ])?;
        }
    }
    tx.commit()?;
    Ok(changed)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SortOrder {
    /// Oldest debate first.
    #[default]
    Chrono,
    /// Highest confidence, then quality.
    Confidence,
}

#[derive(Debug, Clone, Default)]
pub struct ExcerptFilter {
    pub from_year: Option<i32>,
    pub to_year: Option<i32>,
    pub frame: Option<FrameLabel>,
    pub min_confidence: Option<u8>,
    pub search: Option<String>,
    pub sort: SortOrder,
    pub limit: Option<usize>,
}

pub fn query_excerpts(conn: &Connection, filter: &ExcerptFilter) -> Result<Vec<StoredExcerpt>> {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(y) = filter.from_year {
        conditions.push(format!("e.year >= ?{}", params.len() + 1));
        params.push(Box::new(y));
    }
    if let Some(y) = filter.to_year {
        conditions.push(format!("e.year <= ?{}", params.len() + 1));
        params.push(Box::new(y));
    }
    if let Some(f) = filter.frame {
        conditions.push(format!("e.frame = ?{}", params.len() + 1));
        params.push(Box::new(f.as_str()));
    }
    if let Some(c) = filter.min_confidence {
        conditions.push(format!("e.confidence >= ?{}", params.len() + 1));
        params.push(Box::new(c));
    }
    if let Some(q) = filter.search.as_deref().map(fts_query).filter(|q| !q.is_empty()) {
        conditions.push(format!(
            "e.id IN (SELECT rowid FROM excerpts_fts WHERE excerpts_fts MATCH ?{})",
            params.len() + 1
        ));
        params.push(Box::new(q));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    let order = match filter.sort {
        SortOrder::Chrono => "e.year IS NULL, e.year, e.date, e.id",
        SortOrder::Confidence => "e.confidence DESC, e.quality DESC, e.year, e.id",
    };
    let limit = match filter.limit {
        Some(n) => format!(" LIMIT {}", n),
        None => String::new(),
    };

    let sql = format!(
        "SELECT {} FROM excerpts e{} ORDER BY {}{}",
        EXCERPT_COLUMNS, where_clause, order, limit
    );
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), excerpt_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Quote each word so user input never reaches FTS5 query syntax.
fn fts_query(q: &str) -> String {
    q.split_whitespace()
        .map(|w| format!("\"{}\"", w.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Stats ──

pub struct Stats {
    pub documents: usize,
    pub processed: usize,
    pub unprocessed: usize,
    pub excerpts: usize,
    pub avg_words: f64,
    pub avg_confidence: f64,
    pub avg_migration_terms: f64,
    pub avg_labour_terms: f64,
    pub frames: Vec<(FrameLabel, usize)>,
    pub years: Option<(i32, i32)>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let documents: usize = conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?;
    let processed: usize =
        conn.query_row("SELECT COUNT(*) FROM documents WHERE processed = 1", [], |r| r.get(0))?;
    let (excerpts, avg_words, avg_confidence, avg_migration_terms, avg_labour_terms) = conn
        .query_row(
            "SELECT COUNT(*), COALESCE(AVG(word_count), 0), COALESCE(AVG(confidence), 0),
                    COALESCE(AVG(migration_terms), 0), COALESCE(AVG(labour_terms), 0)
             FROM excerpts",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
        )?;
    let years: (Option<i32>, Option<i32>) =
        conn.query_row("SELECT MIN(year), MAX(year) FROM excerpts", [], |r| {
            Ok((r.get(0)?, r.get(1)?))
        })?;

    let mut stmt = conn.prepare("SELECT frame, COUNT(*) FROM excerpts GROUP BY frame")?;
    let counts = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, usize>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let frames = FrameLabel::ALL
        .iter()
        .map(|f| {
            let n = counts
                .iter()
                .find(|(name, _)| name == f.as_str())
                .map_or(0, |(_, n)| *n);
            (*f, n)
        })
        .collect();

    Ok(Stats {
        documents,
        processed,
        unprocessed: documents - processed,
        excerpts,
        avg_words,
        avg_confidence,
        avg_migration_terms,
        avg_labour_terms,
        frames,
        years: years.0.zip(years.1),
    })
}
