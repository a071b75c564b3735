//! Record store queries.
//!
//! Records are stored as JSON documents next to their lookup columns so new
//! fields never need a migration.

use chrono::Utc;
use metaforge_common::{Error, Record, Result};
use rusqlite::Connection;

use super::parse_timestamp;
use crate::models::StoredRecord;

fn parse_record_row(row: &rusqlite::Row) -> rusqlite::Result<(String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn to_stored(data: &str, created: &str, modified: &str) -> Result<StoredRecord> {
    Ok(StoredRecord {
        record: serde_json::from_str(data)?,
        created_at: parse_timestamp(created),
        modified_at: parse_timestamp(modified),
    })
}

/// Insert a record or replace the stored copy with the same
/// `(provider, remote_ref)`.
///
/// The original `created_at` is kept on update.
pub fn upsert_record(conn: &Connection, record: &Record) -> Result<()> {
    let data = serde_json::to_string(record)?;
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO records (provider, remote_ref, num, data, created_at, modified_at)
         VALUES (:provider, :remote_ref, :num, :data, :now, :now)
         ON CONFLICT (provider, remote_ref) DO UPDATE SET
            num = excluded.num,
            data = excluded.data,
            modified_at = excluded.modified_at",
        rusqlite::named_params! {
            ":provider": &record.provider,
            ":remote_ref": &record.remote_ref,
            ":num": &record.num,
            ":data": data,
            ":now": now,
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

/// Find a record by its identity.
///
/// # Returns
///
/// * `Ok(Some(StoredRecord))` - The record if found
/// * `Ok(None)` - If no record is stored under that identity
/// * `Err(Error)` - On database or decode failure
pub fn find_record(
    conn: &Connection,
    provider: &str,
    remote_ref: &str,
) -> Result<Option<StoredRecord>> {
    let result = conn.query_row(
        "SELECT data, created_at, modified_at FROM records
         WHERE provider = :provider AND remote_ref = :remote_ref",
        rusqlite::named_params! { ":provider": provider, ":remote_ref": remote_ref },
        parse_record_row,
    );

    match result {
        Ok((data, created, modified)) => to_stored(&data, &created, &modified).map(Some),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// All records for a title code, compared case-insensitively, most recently
/// modified first.
pub fn find_by_num(conn: &Connection, num: &str) -> Result<Vec<StoredRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT data, created_at, modified_at FROM records
             WHERE num = :num COLLATE NOCASE
             ORDER BY modified_at DESC",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map(rusqlite::named_params! { ":num": num }, parse_record_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    rows.iter()
        .map(|(data, created, modified)| to_stored(data, created, modified))
        .collect()
}
