use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::repository::{get_analysis, upsert_analysis};
use super::sqlite::open_database;
use super::DatabaseError;
use crate::models::{AnalysisRecord, AnalysisRequest, AnalysisResult};

/// Durable analysis records keyed by request id.
///
/// Every call opens its own connection, so the store can be shared freely
/// between blocking workers.
#[derive(Debug, Clone)]
pub struct ResultStore {
    db_path: PathBuf,
}

impl ResultStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Create the schema if needed. Safe to call repeatedly.
    pub fn initialize(&self) -> Result<(), DatabaseError> {
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        open_database(&self.db_path)?;
        tracing::info!(path = %self.db_path.display(), "Result store ready");
        Ok(())
    }

    pub fn save(
        &self,
        request: &AnalysisRequest,
        result: &AnalysisResult,
    ) -> Result<(), DatabaseError> {
        let conn = open_database(&self.db_path)?;
        upsert_analysis(&conn, &AnalysisRecord::new(request, result))?;
        tracing::debug!(analysis_id = %request.id, "Analysis record saved");
        Ok(())
    }

    pub fn get(&self, id: &Uuid) -> Result<Option<AnalysisRecord>, DatabaseError> {
        let conn = open_database(&self.db_path)?;
        get_analysis(&conn, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ResultStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("analysis.db"));
        store.initialize().unwrap();
        (dir, store)
    }

    fn result(tag: &str) -> AnalysisResult {
        AnalysisResult {
            verification: format!("verification {tag}\nreadability: good"),
            analysis: format!("analysis {tag}\n## Disclaimer"),
            risk: format!("risk {tag}"),
        }
    }

    #[test]
    fn initialize_is_idempotent() {
        let (_dir, store) = store();
        store.initialize().unwrap();
        store.initialize().unwrap();
    }

    #[test]
    fn initialize_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("nested/deeper/analysis.db"));
        store.initialize().unwrap();
        assert!(store.db_path().exists());
    }

    #[test]
    fn save_then_get_round_trips_every_field() {
        let (_dir, store) = store();
        let request = AnalysisRequest::new("report.pdf", "What was the revenue?");
        store.save(&request, &result("one")).unwrap();

        let record = store.get(&request.id).unwrap().unwrap();
        assert_eq!(record, AnalysisRecord::new(&request, &result("one")));
    }

    #[test]
    fn saving_same_id_overwrites() {
        let (_dir, store) = store();
        let request = AnalysisRequest::new("report.pdf", "q");
        store.save(&request, &result("first")).unwrap();
        store.save(&request, &result("second")).unwrap();

        let record = store.get(&request.id).unwrap().unwrap();
        assert_eq!(record.risk, "risk second");
    }

    #[test]
    fn unknown_id_is_none() {
        let (_dir, store) = store();
        assert!(store.get(&Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn distinct_requests_are_both_retrievable() {
        let (_dir, store) = store();
        let a = AnalysisRequest::new("same.pdf", "same query");
        let b = AnalysisRequest::new("same.pdf", "same query");
        store.save(&a, &result("a")).unwrap();
        store.save(&b, &result("b")).unwrap();

        assert_eq!(store.get(&a.id).unwrap().unwrap().risk, "risk a");
        assert_eq!(store.get(&b.id).unwrap().unwrap().risk, "risk b");
    }

    #[test]
    fn concurrent_saves_on_distinct_ids() {
        let (_dir, store) = store();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let request = AnalysisRequest::new(format!("{i}.pdf"), "q");
                    store.save(&request, &result(&i.to_string())).unwrap();
                    request.id
                })
            })
            .collect();

        for handle in handles {
            let id = handle.join().unwrap();
            assert!(store.get(&id).unwrap().is_some());
        }
    }
}
