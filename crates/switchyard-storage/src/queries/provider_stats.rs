// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Learned provider statistics keyed by (provider, complexity class).

use rusqlite::{OptionalExtension, Row, params};
use switchyard_core::{ComplexityClass, ProviderStats, SwitchyardError};

use crate::database::{Database, map_tr_err};
use crate::queries::parse_col;

const COLUMNS: &str =
    "provider_id, class, success_rate, satisfaction, avg_latency_ms, samples, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<ProviderStats> {
    let class: String = row.get(1)?;
    let samples: i64 = row.get(5)?;
    Ok(ProviderStats {
        provider_id: row.get(0)?,
        class: parse_col(1, &class)?,
        success_rate: row.get(2)?,
        satisfaction: row.get(3)?,
        avg_latency_ms: row.get(4)?,
        samples: samples.max(0) as u64,
        updated_at: row.get(6)?,
    })
}

pub async fn get(
    db: &Database,
    provider_id: &str,
    class: ComplexityClass,
) -> Result<Option<ProviderStats>, SwitchyardError> {
    let provider_id = provider_id.to_string();
    let class = class.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM provider_stats WHERE provider_id = ?1 AND class = ?2"),
                params![provider_id, class],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or replace the stats row for the bucket.
pub async fn upsert(db: &Database, stats: &ProviderStats) -> Result<(), SwitchyardError> {
    let stats = stats.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO provider_stats (provider_id, class, success_rate, satisfaction, \
                 avg_latency_ms, samples, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
                 ON CONFLICT(provider_id, class) DO UPDATE SET \
                 success_rate = excluded.success_rate, satisfaction = excluded.satisfaction, \
                 avg_latency_ms = excluded.avg_latency_ms, samples = excluded.samples, \
                 updated_at = excluded.updated_at",
                params![
                    stats.provider_id,
                    stats.class.to_string(),
                    stats.success_rate,
                    stats.satisfaction,
                    stats.avg_latency_ms,
                    stats.samples as i64,
                    stats.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list(db: &Database) -> Result<Vec<ProviderStats>, SwitchyardError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM provider_stats ORDER BY provider_id, class"
            ))?;
            let rows = stmt
                .query_map([], from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}
