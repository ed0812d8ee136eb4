// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pattern statistics and follow-up co-occurrence counts.

use rusqlite::{OptionalExtension, params};
use switchyard_core::types::timestamp;
use switchyard_core::{Pattern, SwitchyardError};

use crate::database::{Database, map_tr_err};
use crate::queries::parse_time;

pub async fn get(db: &Database, signature: &str) -> Result<Option<Pattern>, SwitchyardError> {
    let signature = signature.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT signature, frequency, success_rate, avg_complexity, exemplar, last_seen \
                 FROM patterns WHERE signature = ?1",
                params![signature],
                |row| {
                    let last_seen: String = row.get(5)?;
                    Ok(Pattern {
                        signature: row.get(0)?,
                        frequency: row.get(1)?,
                        success_rate: row.get(2)?,
                        avg_complexity: row.get(3)?,
                        exemplar: row.get(4)?,
                        last_seen: parse_time(5, &last_seen)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn upsert(db: &Database, pattern: &Pattern) -> Result<(), SwitchyardError> {
    let pattern = pattern.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO patterns (signature, frequency, success_rate, avg_complexity, \
                 exemplar, last_seen) VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(signature) DO UPDATE SET frequency = excluded.frequency, \
                 success_rate = excluded.success_rate, avg_complexity = excluded.avg_complexity, \
                 exemplar = excluded.exemplar, last_seen = excluded.last_seen",
                params![
                    pattern.signature,
                    pattern.frequency,
                    pattern.success_rate,
                    pattern.avg_complexity,
                    pattern.exemplar,
                    timestamp(pattern.last_seen),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Increment the `from -> to` co-occurrence count.
pub async fn record_transition(db: &Database, from: &str, to: &str) -> Result<(), SwitchyardError> {
    let from = from.to_string();
    let to = to.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO pattern_transitions (from_signature, to_signature, count) \
                 VALUES (?1, ?2, 1) \
                 ON CONFLICT(from_signature, to_signature) DO UPDATE SET count = count + 1",
                params![from, to],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Follow-ups of `from`, most frequent first.
pub async fn transitions_from(
    db: &Database,
    from: &str,
) -> Result<Vec<(String, u64)>, SwitchyardError> {
    let from = from.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT to_signature, count FROM pattern_transitions \
                 WHERE from_signature = ?1 ORDER BY count DESC, to_signature ASC",
            )?;
            let rows = stmt
                .query_map(params![from], |row| {
                    let count: i64 = row.get(1)?;
                    Ok((row.get::<_, String>(0)?, count.max(0) as u64))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}
