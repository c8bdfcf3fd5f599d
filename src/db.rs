use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;

use crate::error::PipelineError;

/// One failure event. Every column is TEXT and never NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BankRecord {
    pub name: String,
    pub city: String,
    pub state: String,
    pub cert: String,
    pub acquiring_institution: String,
    pub closing_date: String,
    pub fund: String,
}

/// A stored record together with its stable row id.
#[derive(Debug, Clone)]
pub struct StoredBank {
    pub rowid: i64,
    pub record: BankRecord,
}

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    Connection::open(path).with_context(|| format!("Failed to open {:?}", path))
}

pub fn connect_read_only(path: &Path) -> Result<Connection> {
    if !path.is_file() {
        return Err(PipelineError::MissingStore { path: path.to_path_buf() }.into());
    }
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open {:?} read-only", path))
}

/// Drop and recreate both tables, insert `records`, rebuild the search index.
/// Runs as a single transaction so a failure leaves the previous store intact.
pub fn rebuild(conn: &Connection, records: &[BankRecord]) -> Result<usize> {
    rebuild_with(conn, |tx| insert_records(tx, records))
}

/// `rebuild` with the row-loading step supplied by the caller.
fn rebuild_with<F>(conn: &Connection, load: F) -> Result<usize>
where
    F: FnOnce(&Connection) -> Result<usize>,
{
    let tx = conn.unchecked_transaction()?;
    reset_schema(&tx)?;
    let inserted = load(&tx)?;
    populate_fts(&tx)?;
    tx.commit()?;
    Ok(inserted)
}

pub fn reset_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        DROP TABLE IF EXISTS failed_banks_fts;
        DROP TABLE IF EXISTS failed_banks;

        CREATE TABLE failed_banks (
            bank_name             TEXT NOT NULL DEFAULT '',
            city                  TEXT NOT NULL DEFAULT '',
            state                 TEXT NOT NULL DEFAULT '',
            cert                  TEXT NOT NULL DEFAULT '',
            acquiring_institution TEXT NOT NULL DEFAULT '',
            closing_date          TEXT NOT NULL DEFAULT '',
            fund                  TEXT NOT NULL DEFAULT ''
        );

        -- closing_date and fund are not searchable
        CREATE VIRTUAL TABLE failed_banks_fts USING fts5(
            bank_name,
            city,
            state,
            cert,
            acquiring_institution,
            content='failed_banks',
            content_rowid='rowid'
        );
        ",
    )
    .context("Failed to reset schema")?;
    Ok(())
}

pub fn insert_records(conn: &Connection, records: &[BankRecord]) -> Result<usize> {
    let mut count = 0;
    let mut stmt = conn.prepare(
        "INSERT INTO failed_banks
         (bank_name, city, state, cert, acquiring_institution, closing_date, fund)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for r in records {
        count += stmt.execute(rusqlite::params![
            r.name, r.city, r.state, r.cert, r.acquiring_institution, r.closing_date, r.fund,
        ])?;
    }
    Ok(count)
}

/// Bulk copy from the primary table into the external-content index.
pub fn populate_fts(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT INTO failed_banks_fts (rowid, bank_name, city, state, cert, acquiring_institution)
         SELECT rowid, bank_name, city, state, cert, acquiring_institution
         FROM failed_banks",
        [],
    )
    .context("Failed to populate search index")?;
    Ok(())
}

// ── Reads ──

pub fn fetch_all(conn: &Connection) -> Result<Vec<StoredBank>> {
    let mut stmt = conn.prepare(
        "SELECT rowid, bank_name, city, state, cert, acquiring_institution, closing_date, fund
         FROM failed_banks
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(StoredBank {
                rowid: row.get(0)?,
                record: BankRecord {
                    name: row.get(1)?,
                    city: row.get(2)?,
                    state: row.get(3)?,
                    cert: row.get(4)?,
                    acquiring_institution: row.get(5)?,
                    closing_date: row.get(6)?,
                    fund: row.get(7)?,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn state_counts(conn: &Connection) -> Result<BTreeMap<String, usize>> {
    let mut stmt = conn.prepare("SELECT state, COUNT(*) FROM failed_banks GROUP BY state")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, usize>(1)?)))?
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(rows)
}

// ── Search ──

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub rowid: i64,
    #[serde(flatten)]
    pub record: BankRecord,
}

/// Quote each whitespace-separated token so user input is never parsed as FTS5 syntax.
pub fn fts_query(input: &str) -> Option<String> {
    let terms: Vec<String> = input
        .split_whitespace()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

pub fn search(conn: &Connection, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
    let Some(q) = fts_query(query) else {
        return Ok(Vec::new());
    };
    let mut stmt = conn.prepare(
        "SELECT b.rowid, b.bank_name, b.city, b.state, b.cert,
                b.acquiring_institution, b.closing_date, b.fund
         FROM failed_banks_fts
         JOIN failed_banks b ON b.rowid = failed_banks_fts.rowid
         WHERE failed_banks_fts MATCH ?1
         ORDER BY rank
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![q, limit as i64], |row| {
            Ok(SearchHit {
                rowid: row.get(0)?,
                record: BankRecord {
                    name: row.get(1)?,
                    city: row.get(2)?,
                    state: row.get(3)?,
                    cert: row.get(4)?,
                    acquiring_institution: row.get(5)?,
                    closing_date: row.get(6)?,
                    fund: row.get(7)?,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub rows: usize,
    pub indexed: usize,
    pub states: usize,
    pub top_states: Vec<(String, usize)>,
}

pub fn row_count(conn: &Connection) -> Result<usize> {
    Ok(conn.query_row("SELECT COUNT(*) FROM failed_banks", [], |r| r.get(0))?)
}

/// Documents held by the index itself; a scan of an external-content table
/// would only read back the primary table.
pub fn fts_row_count(conn: &Connection) -> Result<usize> {
    Ok(conn.query_row("SELECT COUNT(*) FROM failed_banks_fts_docsize", [], |r| r.get(0))?)
}

pub fn get_stats(conn: &Connection, top: usize) -> Result<Stats> {
    let rows = row_count(conn)?;
    let indexed = fts_row_count(conn)?;
    let counts = state_counts(conn)?;
    let states = counts.len();

    let mut top_states: Vec<(String, usize)> = counts.into_iter().collect();
    top_states.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_states.truncate(top);

    Ok(Stats { rows, indexed, states, top_states })
}
