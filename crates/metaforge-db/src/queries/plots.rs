//! Synopsis cache queries.

use chrono::Utc;
use metaforge_common::{Error, Result};
use rusqlite::Connection;

use super::parse_timestamp;
use crate::models::PlotEntry;

/// Get the cached synopsis for a normalized title code and source.
pub fn get_plot(conn: &Connection, num: &str, provider: &str) -> Result<Option<PlotEntry>> {
    let result = conn.query_row(
        "SELECT num, provider, plot, url, created_at, modified_at
         FROM plots WHERE num = :num AND provider = :provider",
        rusqlite::named_params! { ":num": num, ":provider": provider },
        |row| {
            Ok(PlotEntry {
                num: row.get(0)?,
                provider: row.get(1)?,
                plot: row.get(2)?,
                url: row.get(3)?,
                created_at: parse_timestamp(&row.get::<_, String>(4)?),
                modified_at: parse_timestamp(&row.get::<_, String>(5)?),
            })
        },
    );

    match result {
        Ok(entry) => Ok(Some(entry)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Store a synopsis, replacing any previous text for the same key.
pub fn save_plot(conn: &Connection, num: &str, provider: &str, plot: &str, url: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO plots (num, provider, plot, url, created_at, modified_at)
         VALUES (:num, :provider, :plot, :url, :now, :now)
         ON CONFLICT (num, provider) DO UPDATE SET
            plot = excluded.plot,
            url = excluded.url,
            modified_at = excluded.modified_at",
        rusqlite::named_params! {
            ":num": num,
            ":provider": provider,
            ":plot": plot,
            ":url": url,
            ":now": now,
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}
