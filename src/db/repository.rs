use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::AnalysisRecord;

/// Insert or overwrite the record stored under `record.id`.
pub fn upsert_analysis(conn: &Connection, record: &AnalysisRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR REPLACE INTO analysis_records
         (id, filename, query, verification, analysis, risk, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.id.to_string(),
            record.filename,
            record.query,
            record.verification,
            record.analysis,
            record.risk,
            record.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_analysis(conn: &Connection, id: &Uuid) -> Result<Option<AnalysisRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, filename, query, verification, analysis, risk, created_at
         FROM analysis_records WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], |row| {
        Ok(AnalysisRow {
            id: row.get::<_, String>(0)?,
            filename: row.get::<_, String>(1)?,
            query: row.get::<_, String>(2)?,
            verification: row.get::<_, String>(3)?,
            analysis: row.get::<_, String>(4)?,
            risk: row.get::<_, String>(5)?,
            created_at: row.get::<_, String>(6)?,
        })
    });

    match result {
        Ok(row) => Ok(Some(analysis_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

struct AnalysisRow {
    id: String,
    filename: String,
    query: String,
    verification: String,
    analysis: String,
    risk: String,
    created_at: String,
}

fn analysis_from_row(row: AnalysisRow) -> Result<AnalysisRecord, DatabaseError> {
    let id = Uuid::parse_str(&row.id).map_err(|_| DatabaseError::InvalidValue {
        field: "id".into(),
        value: row.id.clone(),
    })?;
    let created_at = DateTime::parse_from_rfc3339(&row.created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DatabaseError::InvalidValue {
            field: "created_at".into(),
            value: row.created_at.clone(),
        })?;

    Ok(AnalysisRecord {
        id,
        filename: row.filename,
        query: row.query,
        verification: row.verification,
        analysis: row.analysis,
        risk: row.risk,
        created_at,
    })
}
