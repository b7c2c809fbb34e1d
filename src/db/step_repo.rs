//! Durable step log — committed pipeline step outputs keyed by
//! (message_id, step_name).
//!
//! Works like a write-ahead log for orchestration state: a step's output is
//! recorded here before the next step starts, so a run interrupted between
//! steps can resume without re-executing anything already committed.

use rusqlite::params;
use serde_json::Value;

use super::{Database, DatabaseError};

/// Records a step's committed output. Idempotent: if the step was already
/// recorded for this message, the first committed output wins.
pub fn record(
    db: &Database,
    message_id: &str,
    step_name: &str,
    output: &Value,
) -> Result<(), DatabaseError> {
    let serialized = serde_json::to_string(output)?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO pipeline_steps (message_id, step_name, output)
             VALUES (?1, ?2, ?3)",
            params![message_id, step_name, serialized],
        )?;
        Ok(())
    })
}

/// Overwrites a step's committed output. Reserved for the case where a
/// stored output turned out to be unreadable and the step was recomputed;
/// `record` would leave the unreadable row in place.
pub fn replace(
    db: &Database,
    message_id: &str,
    step_name: &str,
    output: &Value,
) -> Result<(), DatabaseError> {
    let serialized = serde_json::to_string(output)?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO pipeline_steps (message_id, step_name, output)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (message_id, step_name)
             DO UPDATE SET output = excluded.output, completed_at = datetime('now')",
            params![message_id, step_name, serialized],
        )?;
        Ok(())
    })
}

/// Returns a step's committed output, if any.
pub fn find(
    db: &Database,
    message_id: &str,
    step_name: &str,
) -> Result<Option<Value>, DatabaseError> {
    let raw: Option<String> = db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT output FROM pipeline_steps WHERE message_id = ?1 AND step_name = ?2",
        )?;
        let mut rows = stmt.query_map(params![message_id, step_name], |row| {
            row.get::<_, String>(0)
        })?;
        match rows.next() {
            Some(Ok(val)) => Ok(Some(val)),
            Some(Err(e)) => Err(DatabaseError::from(e)),
            None => Ok(None),
        }
    })?;

    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

/// Deletes all step records for a message. Called after a successful
/// finalize, when the ledger row itself proves completion.
/// Returns the number of rows deleted.
pub fn clear_for_message(db: &Database, message_id: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn.execute(
            "DELETE FROM pipeline_steps WHERE message_id = ?1",
            params![message_id],
        )?;
        Ok(count as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_record_and_find() {
        let db = test_db();
        record(&db, "<m@x>", "extract_text", &json!({"text": "hi", "source": "body"})).unwrap();

        let found = find(&db, "<m@x>", "extract_text").unwrap().unwrap();
        assert_eq!(found["source"], "body");
    }

    #[test]
    fn test_find_missing_returns_none() {
        let db = test_db();
        assert!(find(&db, "<m@x>", "extract_text").unwrap().is_none());
    }

    #[test]
    fn test_first_committed_output_wins() {
        let db = test_db();
        record(&db, "<m@x>", "classify", &json!({"vendor": "Acme"})).unwrap();
        record(&db, "<m@x>", "classify", &json!({"vendor": "Other"})).unwrap();

        let found = find(&db, "<m@x>", "classify").unwrap().unwrap();
        assert_eq!(found["vendor"], "Acme");
    }

    #[test]
    fn test_replace_overwrites_committed_output() {
        let db = test_db();
        record(&db, "<m@x>", "classify", &json!({"vendor": "Acme"})).unwrap();
        replace(&db, "<m@x>", "classify", &json!({"vendor": "Other"})).unwrap();

        let found = find(&db, "<m@x>", "classify").unwrap().unwrap();
        assert_eq!(found["vendor"], "Other");
    }

    #[test]
    fn test_replace_inserts_when_missing() {
        let db = test_db();
        replace(&db, "<m@x>", "classify", &json!({"vendor": "Acme"})).unwrap();

        let found = find(&db, "<m@x>", "classify").unwrap().unwrap();
        assert_eq!(found["vendor"], "Acme");
    }

    #[test]
    fn test_steps_are_scoped_by_message() {
        let db = test_db();
        record(&db, "<m1@x>", "classify", &json!(1)).unwrap();
        record(&db, "<m2@x>", "classify", &json!(2)).unwrap();

        assert_eq!(find(&db, "<m1@x>", "classify").unwrap().unwrap(), json!(1));
        assert_eq!(find(&db, "<m2@x>", "classify").unwrap().unwrap(), json!(2));
    }

    #[test]
    fn test_clear_for_message() {
        let db = test_db();
        record(&db, "<m@x>", "extract_text", &json!("a")).unwrap();
        record(&db, "<m@x>", "classify", &json!("b")).unwrap();
        record(&db, "<other@x>", "classify", &json!("c")).unwrap();

        assert_eq!(clear_for_message(&db, "<m@x>").unwrap(), 2);
        assert!(find(&db, "<m@x>", "classify").unwrap().is_none());
        assert!(find(&db, "<other@x>", "classify").unwrap().is_some());
    }
}
