//! Point-of-interest cache queries.

use chrono::Utc;
use metaforge_common::{Error, Result};
use rusqlite::Connection;

use super::parse_timestamp;
use crate::models::PointOfInterest;

/// Get the stored subject position for an image URL.
pub fn get_point(conn: &Connection, url: &str) -> Result<Option<PointOfInterest>> {
    let result = conn.query_row(
        "SELECT url, x, created_at FROM poi_points WHERE url = :url",
        rusqlite::named_params! { ":url": url },
        |row| {
            Ok(PointOfInterest {
                url: row.get(0)?,
                x: row.get(1)?,
                created_at: parse_timestamp(&row.get::<_, String>(2)?),
            })
        },
    );

    match result {
        Ok(point) => Ok(Some(point)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Insert or update the subject position for an image URL.
pub fn upsert_point(conn: &Connection, url: &str, x: f64) -> Result<()> {
    conn.execute(
        "INSERT INTO poi_points (url, x, created_at) VALUES (:url, :x, :now)
         ON CONFLICT (url) DO UPDATE SET x = excluded.x, created_at = excluded.created_at",
        rusqlite::named_params! {
            ":url": url,
            ":x": x,
            ":now": Utc::now().to_rfc3339(),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}
