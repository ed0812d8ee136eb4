// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing decision log.

use rusqlite::types::Type;
use rusqlite::{OptionalExtension, params};
use switchyard_core::{DecisionId, DecisionState, RoutingDecision, SessionId, SwitchyardError};

use crate::database::{Database, map_tr_err};
use crate::queries::parse_col;

pub async fn insert(db: &Database, decision: &RoutingDecision) -> Result<(), SwitchyardError> {
    let d = decision.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO decisions (id, query_id, session_id, query_hash, class, path, \
                 provider_id, cost_usd, latency_ms, state, pattern, coalesced, satisfaction, \
                 created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    d.id.0,
                    d.query_id,
                    d.session_id.0,
                    d.query_hash,
                    d.class.to_string(),
                    d.path.to_string(),
                    d.provider_id,
                    d.cost_usd,
                    d.latency_ms as i64,
                    d.state.to_string(),
                    d.pattern,
                    d.coalesced,
                    d.satisfaction,
                    d.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(db: &Database, id: &DecisionId) -> Result<Option<RoutingDecision>, SwitchyardError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, query_id, session_id, query_hash, class, path, provider_id, cost_usd, \
                 latency_ms, state, pattern, coalesced, satisfaction, created_at \
                 FROM decisions WHERE id = ?1",
                params![id],
                |row| {
                    let class: String = row.get(4)?;
                    let path: String = row.get(5)?;
                    let latency_ms: i64 = row.get(8)?;
                    let state: String = row.get(9)?;
                    let state = DecisionState::parse_terminal(&state).ok_or_else(|| {
                        rusqlite::Error::FromSqlConversionFailure(
                            9,
                            Type::Text,
                            format!("not a terminal decision state: {state}").into(),
                        )
                    })?;
                    Ok(RoutingDecision {
                        id: DecisionId(row.get(0)?),
                        query_id: row.get(1)?,
                        session_id: SessionId(row.get(2)?),
                        query_hash: row.get(3)?,
                        class: parse_col(4, &class)?,
                        path: parse_col(5, &path)?,
                        provider_id: row.get(6)?,
                        cost_usd: row.get(7)?,
                        latency_ms: latency_ms.max(0) as u64,
                        state,
                        pattern: row.get(10)?,
                        coalesced: row.get(11)?,
                        satisfaction: row.get(12)?,
                        created_at: row.get(13)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Set the satisfaction score if none is recorded yet.
pub async fn set_satisfaction(
    db: &Database,
    id: &DecisionId,
    satisfaction: f64,
) -> Result<bool, SwitchyardError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let updated = conn.execute(
                "UPDATE decisions SET satisfaction = ?2 WHERE id = ?1 AND satisfaction IS NULL",
                params![id, satisfaction],
            )?;
            Ok(updated == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Decision counts per path within `[start, end)`.
pub async fn count_by_path(
    db: &Database,
    start: &str,
    end: &str,
) -> Result<Vec<(String, u64)>, SwitchyardError> {
    let start = start.to_string();
    let end = end.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT path, COUNT(*) FROM decisions \
                 WHERE created_at >= ?1 AND created_at < ?2 GROUP BY path ORDER BY path",
            )?;
            let rows = stmt
                .query_map(params![start, end], |row| {
                    let count: i64 = row.get(1)?;
                    Ok((row.get::<_, String>(0)?, count.max(0) as u64))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}
