//! SQLite-backed submission store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    StatusUpdate, Submission, SubmissionError, SubmissionFilter, SubmissionStatus,
    SubmissionStore,
};

const SELECT_COLUMNS: &str =
    "SELECT id, content, status, created_at, processing_started_at, processed_at FROM submissions";

/// SQLite-backed submission store.
///
/// A single connection guarded by a mutex serializes all access, which is what
/// makes `update_status` atomic per submission within one process. The
/// `WHERE status = ?` guard on the write covers other processes sharing the
/// database file.
pub struct SqliteSubmissionStore {
    conn: Mutex<Connection>,
}

impl SqliteSubmissionStore {
    /// Create a new SQLite store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, SubmissionError> {
        let conn = Connection::open(path).map_err(|e| SubmissionError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory() -> Result<Self, SubmissionError> {
        let conn =
            Connection::open_in_memory().map_err(|e| SubmissionError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), SubmissionError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS submissions (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                processing_started_at TEXT,
                processed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_submissions_status ON submissions(status);
            CREATE INDEX IF NOT EXISTS idx_submissions_created_at ON submissions(created_at);
            "#,
        )
        .map_err(|e| SubmissionError::Database(e.to_string()))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, SubmissionError> {
        self.conn
            .lock()
            .map_err(|_| SubmissionError::Database("connection lock poisoned".to_string()))
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<Submission>, SubmissionError> {
        conn.query_row(
            &format!("{} WHERE id = ?", SELECT_COLUMNS),
            params![id],
            Self::row_to_submission,
        )
        .optional()
        .map_err(|e| SubmissionError::Database(e.to_string()))
    }

    fn build_where_clause(filter: &SubmissionFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        let where_clause = match filter.status {
            Some(status) => {
                params.push(Box::new(status.as_str()));
                "WHERE status = ?".to_string()
            }
            None => String::new(),
        };

        (where_clause, params)
    }

    fn row_to_submission(row: &rusqlite::Row) -> rusqlite::Result<Submission> {
        let status_str: String = row.get(2)?;
        let status = status_str.parse::<SubmissionStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into())
        })?;

        Ok(Submission {
            id: row.get(0)?,
            content: row.get(1)?,
            status,
            created_at: parse_timestamp(3, row.get(3)?)?,
            processing_started_at: row
                .get::<_, Option<String>>(4)?
                .map(|s| parse_timestamp(4, s))
                .transpose()?,
            processed_at: row
                .get::<_, Option<String>>(5)?
                .map(|s| parse_timestamp(5, s))
                .transpose()?,
        })
    }
}

/// Fixed-width RFC 3339 so lexical order in SQLite matches time order.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl SubmissionStore for SqliteSubmissionStore {
    fn create(&self, content: &str) -> Result<Submission, SubmissionError> {
        let conn = self.conn()?;

        let id = uuid::Uuid::new_v4().to_string();
        // Stored with microsecond precision; keep the returned value identical.
        let now = Utc::now().trunc_subsecs(6);
        let status = SubmissionStatus::Pending;

        conn.execute(
            "INSERT INTO submissions (id, content, status, created_at) VALUES (?, ?, ?, ?)",
            params![id, content, status.as_str(), format_timestamp(now)],
        )
        .map_err(|e| SubmissionError::Database(e.to_string()))?;

        Ok(Submission {
            id,
            content: content.to_string(),
            status,
            created_at: now,
            processing_started_at: None,
            processed_at: None,
        })
    }

    fn get(&self, id: &str) -> Result<Option<Submission>, SubmissionError> {
        let conn = self.conn()?;
        Self::fetch(&conn, id)
    }

    fn update_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> Result<Option<Submission>, SubmissionError> {
        let conn = self.conn()?;

        let current = match Self::fetch(&conn, id)? {
            Some(submission) => submission,
            None => return Ok(None),
        };

        if !current.status.can_transition_to(update.status) {
            return Err(SubmissionError::InvalidTransition {
                id: id.to_string(),
                from: current.status,
                to: update.status,
            });
        }

        let missing_timestamp = match update.status {
            SubmissionStatus::Processing => update.processing_started_at.is_none(),
            SubmissionStatus::Passed | SubmissionStatus::Failed => update.processed_at.is_none(),
            SubmissionStatus::Pending => false,
        };
        if missing_timestamp {
            return Err(SubmissionError::MissingTimestamp {
                id: id.to_string(),
                status: update.status,
            });
        }

        // processed_at is write-once; processing_started_at is replaced on every claim.
        let changed = conn
            .execute(
                "UPDATE submissions SET status = ?, \
                 processing_started_at = COALESCE(?, processing_started_at), \
                 processed_at = COALESCE(processed_at, ?) \
                 WHERE id = ? AND status = ?",
                params![
                    update.status.as_str(),
                    update.processing_started_at.map(format_timestamp),
                    update.processed_at.map(format_timestamp),
                    id,
                    current.status.as_str(),
                ],
            )
            .map_err(|e| SubmissionError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(SubmissionError::Conflict {
                id: id.to_string(),
                expected: current.status,
            });
        }

        Self::fetch(&conn, id)
    }

    fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, SubmissionError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "{} {} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            SELECT_COLUMNS, where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| SubmissionError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_submission)
            .map_err(|e| SubmissionError::Database(e.to_string()))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| SubmissionError::Database(e.to_string()))
    }

    fn list_pending(&self) -> Result<Vec<Submission>, SubmissionError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "{} WHERE status = ? ORDER BY created_at ASC, rowid ASC",
                SELECT_COLUMNS
            ))
            .map_err(|e| SubmissionError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![SubmissionStatus::Pending.as_str()],
                Self::row_to_submission,
            )
            .map_err(|e| SubmissionError::Database(e.to_string()))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| SubmissionError::Database(e.to_string()))
    }

    fn count(&self, filter: &SubmissionFilter) -> Result<i64, SubmissionError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!("SELECT COUNT(*) FROM submissions {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| SubmissionError::Database(e.to_string()))
    }
}
