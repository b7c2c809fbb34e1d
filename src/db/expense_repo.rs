//! Expense repository — validated expense rows linked to ledger entries.

use rusqlite::params;

use super::{Database, DatabaseError};

/// Fields for a new expense row. `status` is derived at insert time.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub email_id: i64,
    pub amount: f64,
    pub currency: String,
    pub description: String,
    pub expense_date: String,
    pub category: String,
    pub vendor: String,
    pub is_reimbursable: bool,
}

/// A row from the `expenses` table.
#[derive(Debug, Clone)]
pub struct ExpenseRow {
    pub id: i64,
    pub email_id: i64,
    pub amount: f64,
    pub currency: String,
    pub description: String,
    pub expense_date: String,
    pub category: String,
    pub vendor: String,
    pub is_reimbursable: bool,
    pub status: String,
}

/// Derives the expense status from the reimbursable flag.
///
/// Non-reimbursable expenses never enter the approval lifecycle; everything
/// else starts at `pending`.
pub fn derived_status(is_reimbursable: bool) -> &'static str {
    if is_reimbursable {
        "pending"
    } else {
        "non_reimbursable"
    }
}

/// Inserts an expense row and returns its id.
///
/// Store-level constraints surface as typed errors: a missing ledger entry
/// is a `ForeignKeyViolation`, a non-positive amount or bad currency length
/// is a `CheckViolation`.
pub fn insert(db: &Database, expense: &NewExpense) -> Result<i64, DatabaseError> {
    let status = derived_status(expense.is_reimbursable);
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO expenses
                (email_id, amount, currency, description, expense_date, category, vendor, is_reimbursable, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                expense.email_id,
                expense.amount,
                expense.currency,
                expense.description,
                expense.expense_date,
                expense.category,
                expense.vendor,
                expense.is_reimbursable,
                status,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Returns all expenses linked to a ledger entry.
pub fn find_by_email_id(db: &Database, email_id: i64) -> Result<Vec<ExpenseRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, email_id, amount, currency, description, expense_date, category, vendor, is_reimbursable, status
             FROM expenses WHERE email_id = ?1 ORDER BY id",
        )?;
        let rows: Vec<ExpenseRow> = stmt
            .query_map(params![email_id], |row| {
                Ok(ExpenseRow {
                    id: row.get(0)?,
                    email_id: row.get(1)?,
                    amount: row.get(2)?,
                    currency: row.get(3)?,
                    description: row.get(4)?,
                    expense_date: row.get(5)?,
                    category: row.get(6)?,
                    vendor: row.get(7)?,
                    is_reimbursable: row.get(8)?,
                    status: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
