//! Email ledger repository — lifecycle records for the `processed_emails` table.

use chrono::Utc;
use rusqlite::params;

use super::{Database, DatabaseError};

/// Processing lifecycle of an inbound email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailStatus {
    Pending,
    Processed,
    Failed,
    Skipped,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Pending => "pending",
            EmailStatus::Processed => "processed",
            EmailStatus::Failed => "failed",
            EmailStatus::Skipped => "skipped",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "processed" => EmailStatus::Processed,
            "failed" => EmailStatus::Failed,
            "skipped" => EmailStatus::Skipped,
            _ => EmailStatus::Pending,
        }
    }
}

/// A row from the `processed_emails` table.
#[derive(Debug, Clone)]
pub struct EmailLedgerEntry {
    pub id: i64,
    pub message_id: String,
    pub subject: Option<String>,
    pub from_address: String,
    pub received_at: Option<String>,
    pub processed_at: Option<String>,
    pub status: EmailStatus,
    pub is_reimbursable: bool,
}

/// Fields for a new pending ledger entry.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub message_id: String,
    pub subject: Option<String>,
    pub from_address: String,
    pub received_at: Option<String>,
    pub is_reimbursable: bool,
}

/// Inserts a pending ledger entry and returns its id.
///
/// A duplicate `message_id` surfaces as `DatabaseError::UniqueViolation`;
/// callers decide whether that is an error or an already-recorded email.
pub fn insert_pending(db: &Database, entry: &NewLedgerEntry) -> Result<i64, DatabaseError> {
    let received_at = entry
        .received_at
        .clone()
        .unwrap_or_else(|| Utc::now().to_rfc3339());

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO processed_emails (message_id, subject, from_address, received_at, status, is_reimbursable)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
            params![
                entry.message_id,
                entry.subject,
                entry.from_address,
                received_at,
                entry.is_reimbursable,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Finds a ledger entry by its globally unique message id.
pub fn find_by_message_id(
    db: &Database,
    message_id: &str,
) -> Result<Option<EmailLedgerEntry>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, message_id, subject, from_address, received_at, processed_at, status, is_reimbursable
             FROM processed_emails WHERE message_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![message_id], row_to_entry)?;
        match rows.next() {
            Some(Ok(entry)) => Ok(Some(entry)),
            Some(Err(e)) => Err(DatabaseError::from(e)),
            None => Ok(None),
        }
    })
}

/// Finds a ledger entry by primary key.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<EmailLedgerEntry>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, message_id, subject, from_address, received_at, processed_at, status, is_reimbursable
             FROM processed_emails WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], row_to_entry)?;
        match rows.next() {
            Some(Ok(entry)) => Ok(Some(entry)),
            Some(Err(e)) => Err(DatabaseError::from(e)),
            None => Ok(None),
        }
    })
}

/// Marks an entry processed and stamps `processed_at`.
/// Returns false if no row with that id exists.
pub fn mark_processed(db: &Database, id: i64) -> Result<bool, DatabaseError> {
    let now = Utc::now().to_rfc3339();
    db.with_conn(|conn| {
        let updated = conn.execute(
            "UPDATE processed_emails SET status = 'processed', processed_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        Ok(updated > 0)
    })
}

/// Marks an entry failed. Returns false if no row with that id exists.
pub fn mark_failed(db: &Database, id: i64) -> Result<bool, DatabaseError> {
    let now = Utc::now().to_rfc3339();
    db.with_conn(|conn| {
        let updated = conn.execute(
            "UPDATE processed_emails SET status = 'failed', processed_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        Ok(updated > 0)
    })
}

/// Counts all ledger entries.
pub fn count_all(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 =
            conn.query_row("SELECT COUNT(*) FROM processed_emails", [], |r| r.get(0))?;
        Ok(count)
    })
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> Result<EmailLedgerEntry, rusqlite::Error> {
    let status: String = row.get(6)?;
    Ok(EmailLedgerEntry {
        id: row.get(0)?,
        message_id: row.get(1)?,
        subject: row.get(2)?,
        from_address: row.get(3)?,
        received_at: row.get(4)?,
        processed_at: row.get(5)?,
        status: EmailStatus::parse(&status),
        is_reimbursable: row.get(7)?,
    })
}
