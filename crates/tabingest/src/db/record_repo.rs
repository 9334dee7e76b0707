//! Record repository: writes and reads for the `records` table.

use std::collections::HashSet;

use rusqlite::{params, Row};
use serde_json::{Map, Value};

use super::{Database, DatabaseError};

/// Key under which values beyond the header width are stored.
pub const EXTRA_KEY: &str = "_extra";

/// A raw record row from the database.
#[derive(Debug, Clone)]
pub struct RecordRow {
    pub id: i64,
    pub source_filename: String,
    pub row_number: i64,
    pub template: Option<String>,
    pub payload: String,
    pub ingested_at: String,
}

impl RecordRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            source_filename: row.get("source_filename")?,
            row_number: row.get("row_number")?,
            template: row.get("template")?,
            payload: row.get("payload")?,
            ingested_at: row.get("ingested_at")?,
        })
    }

    pub fn payload_json(&self) -> Result<Value, DatabaseError> {
        serde_json::from_str(&self.payload).map_err(|e| DatabaseError::Payload {
            id: self.id,
            source: e,
        })
    }
}

/// Inserts all `rows` for one source in a single transaction.
///
/// Either every row is stored or none is; on error the transaction is
/// rolled back and the connection remains usable. Returns the number of
/// rows inserted.
pub fn insert_rows(
    db: &Database,
    source_filename: &str,
    template: &str,
    header: &[String],
    rows: &[Vec<String>],
) -> Result<usize, DatabaseError> {
    let keys = payload_keys(header);
    let ingested_at = chrono::Utc::now().to_rfc3339();

    db.with_conn_mut(|conn| {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO records (source_filename, row_number, template, payload, ingested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (idx, row) in rows.iter().enumerate() {
                let payload = row_payload(&keys, row).to_string();
                stmt.execute(params![
                    source_filename,
                    (idx + 1) as i64,
                    template,
                    payload,
                    ingested_at
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    })
    .inspect_err(|e| log::warn!("Insert for '{}' rolled back: {}", source_filename, e))
}

/// Total number of stored records.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |r| r.get(0))?;
        Ok(n as u64)
    })
}

pub fn count_for_source(db: &Database, source_filename: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE source_filename = ?1",
            params![source_filename],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    })
}

/// Records for one source in row order.
pub fn list_for_source(
    db: &Database,
    source_filename: &str,
) -> Result<Vec<RecordRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM records WHERE source_filename = ?1 ORDER BY row_number, id",
        )?;
        let rows = stmt
            .query_map(params![source_filename], RecordRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn payloads_for_source(
    db: &Database,
    source_filename: &str,
) -> Result<Vec<Value>, DatabaseError> {
    list_for_source(db, source_filename)?
        .iter()
        .map(RecordRow::payload_json)
        .collect()
}

/// Unique, non-empty JSON keys for a header. Blank names become
/// `column_<n>`; repeats get `_2`, `_3`, ... appended.
pub fn payload_keys(header: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keys = Vec::with_capacity(header.len());
    for (idx, name) in header.iter().enumerate() {
        let base = if name.is_empty() {
            format!("column_{}", idx + 1)
        } else {
            name.clone()
        };
        let mut key = base.clone();
        let mut suffix = 2;
        while key == EXTRA_KEY || !seen.insert(key.clone()) {
            key = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        keys.push(key);
    }
    keys
}

/// JSON payload for one row.
///
/// With keys: an object in header order, missing trailing values omitted
/// and surplus values collected under [`EXTRA_KEY`]. Without keys: an array
/// of the positional values.
pub fn row_payload(keys: &[String], row: &[String]) -> Value {
    if keys.is_empty() {
        return Value::Array(row.iter().cloned().map(Value::String).collect());
    }

    let mut object = Map::new();
    for (key, value) in keys.iter().zip(row) {
        object.insert(key.clone(), Value::String(value.clone()));
    }
    if row.len() > keys.len() {
        let extra = row[keys.len()..].iter().cloned().map(Value::String).collect();
        object.insert(EXTRA_KEY.to_string(), Value::Array(extra));
    }
    Value::Object(object)
}
