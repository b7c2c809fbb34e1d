//! Category repository — the allowed expense classification labels.

use rusqlite::params;

use super::{Database, DatabaseError};

/// Returns the names of all active categories, in id order.
///
/// The seed migration installs the fixed eight-category list; operators may
/// deactivate entries but the pipeline only ever classifies into active ones.
pub fn active_names(db: &Database) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT name FROM categories WHERE is_active = 1 ORDER BY id")?;
        let names: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    })
}

/// Deactivates a category by name. Returns false if no such category exists.
pub fn deactivate(db: &Database, name: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let updated = conn.execute(
            "UPDATE categories SET is_active = 0 WHERE name = ?1",
            params![name],
        )?;
        Ok(updated > 0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_list_is_active() {
        let db = Database::open_in_memory().unwrap();
        let names = active_names(&db).unwrap();
        assert_eq!(
            names,
            vec![
                "Meals",
                "Travel",
                "Office Supplies",
                "Software",
                "Hardware",
                "Training",
                "Telecom",
                "Other"
            ]
        );
    }

    #[test]
    fn test_deactivate_removes_from_active_list() {
        let db = Database::open_in_memory().unwrap();
        assert!(deactivate(&db, "Telecom").unwrap());

        let names = active_names(&db).unwrap();
        assert_eq!(names.len(), 7);
        assert!(!names.contains(&"Telecom".to_string()));
    }

    #[test]
    fn test_deactivate_missing_category() {
        let db = Database::open_in_memory().unwrap();
        assert!(!deactivate(&db, "Yachts").unwrap());
    }
}
