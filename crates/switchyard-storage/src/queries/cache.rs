// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable response cache rows.

use chrono::{DateTime, Utc};
use rusqlite::params;
use switchyard_core::types::timestamp;
use switchyard_core::{CacheEntry, SwitchyardError};

use crate::database::{Database, map_tr_err};
use crate::queries::{parse_col, parse_time};

/// Convert an f32 vector to a little-endian SQLite BLOB.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert a SQLite BLOB back to an f32 vector. Trailing partial chunks are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub async fn save(db: &Database, entry: &CacheEntry) -> Result<(), SwitchyardError> {
    let entry = entry.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO cache_entries (key, response, class, origin, pattern, \
                 embedding, created_at, ttl_secs, expires_at, hit_count, last_access) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    entry.key,
                    entry.response,
                    entry.class.to_string(),
                    entry.origin.to_string(),
                    entry.pattern,
                    entry.embedding.as_deref().map(vec_to_blob),
                    timestamp(entry.created_at),
                    entry.ttl_secs as i64,
                    timestamp(entry.expires_at()),
                    entry.hit_count as i64,
                    timestamp(entry.last_access),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete(db: &Database, key: &str) -> Result<(), SwitchyardError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete every entry backed by `signature`. Returns the number removed.
pub async fn delete_by_pattern(db: &Database, signature: &str) -> Result<usize, SwitchyardError> {
    let signature = signature.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM cache_entries WHERE pattern = ?1",
                params![signature],
            )?;
            Ok(removed)
        })
        .await
        .map_err(map_tr_err)
}

/// Purge expired rows and return the rest, most recently used first.
pub async fn load_live(db: &Database, now: DateTime<Utc>) -> Result<Vec<CacheEntry>, SwitchyardError> {
    let now = timestamp(now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM cache_entries WHERE expires_at <= ?1",
                params![now],
            )?;
            let mut stmt = conn.prepare(
                "SELECT key, response, class, origin, pattern, embedding, created_at, ttl_secs, \
                 hit_count, last_access FROM cache_entries ORDER BY last_access DESC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    let class: String = row.get(2)?;
                    let origin: String = row.get(3)?;
                    let embedding: Option<Vec<u8>> = row.get(5)?;
                    let created_at: String = row.get(6)?;
                    let ttl_secs: i64 = row.get(7)?;
                    let hit_count: i64 = row.get(8)?;
                    let last_access: String = row.get(9)?;
                    Ok(CacheEntry {
                        key: row.get(0)?,
                        response: row.get(1)?,
                        class: parse_col(2, &class)?,
                        origin: parse_col(3, &origin)?,
                        pattern: row.get(4)?,
                        embedding: embedding.as_deref().map(blob_to_vec),
                        created_at: parse_time(6, &created_at)?,
                        ttl_secs: ttl_secs.max(0) as u64,
                        hit_count: hit_count.max(0) as u64,
                        last_access: parse_time(9, &last_access)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_conversion_preserves_values() {
        let original = vec![0.1_f32, -0.5, 1.0];
        let recovered = blob_to_vec(&vec_to_blob(&original));
        assert_eq!(original, recovered);
        assert_eq!(vec_to_blob(&original).len(), 12);
    }

    #[test]
    fn blob_to_vec_ignores_partial_chunk() {
        assert_eq!(blob_to_vec(&[0, 0, 128, 63, 1]), vec![1.0]);
    }
}
