use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

use crate::parser::{Category, ParsedTransaction, TransactionParser, TransactionType};

/// Default page size for history queries
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// A parsed message stored for one user
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    pub description: String,
    pub category: Category,

    #[serde(rename = "type")]
    pub transaction_type: TransactionType,

    pub raw_text: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Give a parsed record its identity: UUID, owner and timestamp
    pub fn from_parsed(user_id: &str, parsed: &ParsedTransaction) -> Self {
        Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount: parsed.amount,
            description: parsed.description.clone(),
            category: parsed.category,
            transaction_type: parsed.transaction_type,
            raw_text: parsed.raw_text.clone(),
            created_at: Utc::now(),
        }
    }

    /// Income counts up, everything else counts down
    pub fn signed_amount(&self) -> f64 {
        match self.transaction_type {
            TransactionType::Income => self.amount,
            TransactionType::Expense | TransactionType::Transfer => -self.amount,
        }
    }
}

// ============================================================================
// COLUMN CODECS
// ============================================================================

impl ToSql for Category {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Category {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Open the ledger at `path`, or an in-memory ledger when no path is set
pub fn open_database(path: Option<&Path>) -> Result<Connection> {
    let conn = match path {
        Some(path) => Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?,
        None => {
            tracing::warn!("no database path configured, running in memory (data is not kept)");
            Connection::open_in_memory().context("Failed to open in-memory database")?
        }
    };

    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            amount REAL NOT NULL CHECK (amount >= 0),
            description TEXT NOT NULL,
            category TEXT NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('income', 'expense', 'transfer')),
            raw_text TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_user_created
         ON transactions(user_id, created_at)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// WRITES
// ============================================================================

pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<()> {
    conn.execute(
        "INSERT INTO transactions (
            id, user_id, amount, description, category, type, raw_text, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            tx.id,
            tx.user_id,
            tx.amount,
            tx.description,
            tx.category,
            tx.transaction_type,
            tx.raw_text,
            tx.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        ],
    )
    .with_context(|| format!("Failed to insert transaction {}", tx.id))?;

    Ok(())
}

/// Store a parsed message for `user_id` and return the stored record
pub fn add_transaction(
    conn: &Connection,
    user_id: &str,
    parsed: &ParsedTransaction,
) -> Result<Transaction> {
    let tx = Transaction::from_parsed(user_id, parsed);
    insert_transaction(conn, &tx)?;

    tracing::info!(
        id = %tx.id,
        user_id,
        amount = tx.amount,
        category = %tx.category,
        "transaction added"
    );

    Ok(tx)
}

// ============================================================================
// READS
// ============================================================================

/// Sum of signed amounts; 0.0 for a user with no transactions
pub fn get_user_balance(conn: &Connection, user_id: &str) -> Result<f64> {
    let balance: f64 = conn.query_row(
        "SELECT COALESCE(SUM(CASE WHEN type = 'income' THEN amount ELSE -amount END), 0.0)
         FROM transactions
         WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;

    Ok(balance)
}

/// Newest first; rows written in the same instant keep insertion order
pub fn get_recent_transactions(
    conn: &Connection,
    user_id: &str,
    limit: u32,
) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, amount, description, category, type, raw_text, created_at
         FROM transactions
         WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?2",
    )?;

    let transactions = stmt
        .query_map(params![user_id, i64::from(limit)], transaction_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

pub fn count_transactions(conn: &Connection, user_id: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;

    Ok(count)
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let created_at: String = row.get(7)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        transaction_type: row.get(5)?,
        raw_text: row.get(6)?,
        created_at,
    })
}

// ============================================================================
// BULK IMPORT
// ============================================================================

/// One CSV row: who sent it and what they typed
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MessageRow {
    pub user_id: String,
    pub text: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    pub skipped: usize,
}

pub fn load_messages_csv(csv_path: &Path) -> Result<Vec<MessageRow>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file: {}", csv_path.display()))?;

    load_messages(file)
}

/// Read `user_id,text` rows (with header) from any reader
pub fn load_messages<R: Read>(reader: R) -> Result<Vec<MessageRow>> {
    let mut rdr = csv::Reader::from_reader(reader);

    let mut rows = Vec::new();
    for (line_num, result) in rdr.deserialize().enumerate() {
        let row: MessageRow = result
            .with_context(|| format!("Failed to read message on CSV line {}", line_num + 2))?;
        rows.push(row);
    }

    Ok(rows)
}

/// Parse and store every row; rows with a blank user or text are skipped
pub fn import_messages(
    conn: &Connection,
    parser: &TransactionParser,
    rows: &[MessageRow],
) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for (index, row) in rows.iter().enumerate() {
        if row.user_id.trim().is_empty() || row.text.trim().is_empty() {
            tracing::warn!(row = index + 1, "skipping message with blank user_id or text");
            report.skipped += 1;
            continue;
        }

        let parsed = parser.parse(&row.text);
        add_transaction(conn, row.user_id.trim(), &parsed)?;
        report.inserted += 1;
    }

    tracing::info!(
        inserted = report.inserted,
        skipped = report.skipped,
        "message import finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    /// Helper function to create a stored transaction at a fixed time
    fn create_test_transaction(
        user_id: &str,
        amount: f64,
        tx_type: TransactionType,
        category: Category,
        minutes_ago: i64,
    ) -> Transaction {
        Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount,
            description: "Test".to_string(),
            category,
            transaction_type: tx_type,
            raw_text: "test".to_string(),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_add_and_read_back() {
        let conn = test_db();
        let parser = TransactionParser::default();

        let stored = add_transaction(&conn, "user-1", &parser.parse("Lunch 15000")).unwrap();
        let history = get_recent_transactions(&conn, "user-1", 10).unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, stored.id);
        assert_eq!(history[0].amount, 15000.0);
        assert_eq!(history[0].category, Category::Food);
        assert_eq!(history[0].transaction_type, TransactionType::Expense);
        assert_eq!(history[0].description, "Lunch 15000");
        assert_eq!(history[0].raw_text, "Lunch 15000");
    }

    #[test]
    fn test_open_database_without_path_is_in_memory() {
        let conn = open_database(None).unwrap();
        let parser = TransactionParser::default();

        let stored = add_transaction(&conn, "local", &parser.parse("TZS 50,000 received salary")).unwrap();
        let history = get_recent_transactions(&conn, "local", DEFAULT_HISTORY_LIMIT).unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, stored.id);
        assert_eq!(get_user_balance(&conn, "local").unwrap(), 50000.0);
        assert_eq!(count_transactions(&conn, "local").unwrap(), 1);
    }

    #[test]
    fn test_balance_signs() {
        let conn = test_db();

        let rows = [
            create_test_transaction("u", 50000.0, TransactionType::Income, Category::Income, 3),
            create_test_transaction("u", 15000.0, TransactionType::Expense, Category::Food, 2),
            create_test_transaction("u", 5000.0, TransactionType::Transfer, Category::Other, 1),
            create_test_transaction("other", 999.0, TransactionType::Income, Category::Income, 1),
        ];
        for tx in &rows {
            insert_transaction(&conn, tx).unwrap();
        }

        assert_eq!(get_user_balance(&conn, "u").unwrap(), 30000.0);
        assert_eq!(get_user_balance(&conn, "other").unwrap(), 999.0);
    }

    #[test]
    fn test_balance_unknown_user_is_zero() {
        let conn = test_db();
        assert_eq!(get_user_balance(&conn, "nobody").unwrap(), 0.0);
    }

    #[test]
    fn test_history_newest_first_with_limit() {
        let conn = test_db();

        for minutes_ago in [30, 10, 20] {
            let tx = create_test_transaction(
                "u",
                minutes_ago as f64,
                TransactionType::Expense,
                Category::Food,
                minutes_ago,
            );
            insert_transaction(&conn, &tx).unwrap();
        }

        let history = get_recent_transactions(&conn, "u", 2).unwrap();
        let amounts: Vec<f64> = history.iter().map(|tx| tx.amount).collect();

        assert_eq!(amounts, vec![10.0, 20.0]);
        assert_eq!(count_transactions(&conn, "u").unwrap(), 3);
    }

    #[test]
    fn test_same_instant_keeps_insertion_order() {
        let conn = test_db();
        let now = Utc::now();

        for amount in [1.0, 2.0, 3.0] {
            let mut tx = create_test_transaction("u", amount, TransactionType::Expense, Category::Other, 0);
            tx.created_at = now;
            insert_transaction(&conn, &tx).unwrap();
        }

        let history = get_recent_transactions(&conn, "u", 10).unwrap();
        let amounts: Vec<f64> = history.iter().map(|tx| tx.amount).collect();
        assert_eq!(amounts, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_rejects_unknown_type_label() {
        let conn = test_db();
        let result = conn.execute(
            "INSERT INTO transactions (id, user_id, amount, description, category, type, raw_text, created_at)
             VALUES ('x', 'u', 1.0, 'd', 'food', 'refund', '', '2024-01-01T00:00:00Z')",
            [],
        );

        assert!(result.is_err(), "CHECK constraint should reject unknown types");
    }

    #[test]
    fn test_import_messages() {
        let conn = test_db();
        let parser = TransactionParser::default();
        let csv = "user_id,text\n\
                   demo,lunch 15000\n\
                   demo,\"TZS 50,000 received salary\"\n\
                   demo,   \n";

        let rows = load_messages(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);

        let report = import_messages(&conn, &parser, &rows).unwrap();

        assert_eq!(report, ImportReport { inserted: 2, skipped: 1 });
        assert_eq!(get_user_balance(&conn, "demo").unwrap(), 35000.0);
    }

    #[test]
    fn test_load_messages_csv_missing_file() {
        let result = load_messages_csv(Path::new("/nonexistent/messages.csv"));
        assert!(result.is_err());
    }
}
