//! Generic query tools: add/read/update/delete over raw statements.
//!
//! Callers pass complete statements. The tools never raise a store fault to
//! the caller: every call ends in a [`QueryOutcome`]. Statement execution sits
//! behind [`StatementStore`], so [`GuardedStore`] can be swapped in to reject
//! statements of the wrong kind before they reach SQLite.

use crate::tools::registry::{Tool, ToolRegistry};
use crate::tools::schema::{ParamDef, ParamType, ToolDescriptor};
use crate::types::{Error, Result};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// One result row, values in column order.
pub type Row = Vec<Value>;

const PEOPLE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS people (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        age INTEGER NOT NULL,
        profession TEXT NOT NULL
    );
";

/// How long a connection waits on a locked database file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default statement for `read_data`.
pub const DEFAULT_READ_QUERY: &str = "SELECT * FROM people";

// =============================================================================
// Outcome
// =============================================================================

/// Success payload of a query tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryValue {
    Rows(Vec<Row>),
    Committed(bool),
    Confirmation(String),
}

/// Result of a query tool call. Never carries a raw store fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    Success {
        #[serde(flatten)]
        value: QueryValue,
    },
    Failure {
        message: String,
    },
}

impl QueryOutcome {
    pub fn rows(rows: Vec<Row>) -> Self {
        Self::Success {
            value: QueryValue::Rows(rows),
        }
    }

    pub fn committed() -> Self {
        Self::Success {
            value: QueryValue::Committed(true),
        }
    }

    pub fn confirmation(message: impl Into<String>) -> Self {
        Self::Success {
            value: QueryValue::Confirmation(message.into()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

// =============================================================================
// Store boundary
// =============================================================================

/// Kind of statement a tool expects to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Select,
    Update,
    Delete,
}

impl StatementKind {
    fn keyword(self) -> &'static str {
        match self {
            StatementKind::Insert => "INSERT",
            StatementKind::Select => "SELECT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
        }
    }
}

/// Narrow execution boundary between the query tools and the store.
///
/// Implementations are called from the blocking pool.
pub trait StatementStore: Send + Sync + 'static {
    /// Run a write statement, returning the number of affected rows.
    fn execute(&self, kind: StatementKind, statement: &str) -> Result<usize>;

    /// Run a read statement, returning every row.
    fn query(&self, statement: &str) -> Result<Vec<Row>>;
}

/// SQLite file store. Opens a fresh connection per call; the connection is
/// closed when it goes out of scope, whichever way the call ends.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(PEOPLE_SCHEMA)?;
        Ok(conn)
    }
}

impl StatementStore for SqliteStore {
    fn execute(&self, _kind: StatementKind, statement: &str) -> Result<usize> {
        let conn = self.connect()?;
        let affected = conn.execute(statement, [])?;
        Ok(affected)
    }

    fn query(&self, statement: &str) -> Result<Vec<Row>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(statement)?;
        let columns = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                (0..columns)
                    .map(|i| row.get_ref(i).map(sql_to_json))
                    .collect::<rusqlite::Result<Row>>()
            })?
            .collect::<rusqlite::Result<Vec<Row>>>()?;
        Ok(rows)
    }
}

fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}

/// Validating wrapper: the statement must start with the keyword matching the
/// operation, otherwise it never reaches the inner store.
#[derive(Debug, Clone)]
pub struct GuardedStore<S> {
    inner: S,
}

impl<S: StatementStore> GuardedStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    fn check(kind: StatementKind, statement: &str) -> Result<()> {
        let leading = statement
            .trim_start()
            .split_whitespace()
            .next()
            .unwrap_or("");
        if !leading.eq_ignore_ascii_case(kind.keyword()) {
            return Err(Error::store(format!(
                "statement rejected: expected {} statement",
                kind.keyword()
            )));
        }
        Ok(())
    }
}

impl<S: StatementStore> StatementStore for GuardedStore<S> {
    fn execute(&self, kind: StatementKind, statement: &str) -> Result<usize> {
        Self::check(kind, statement)?;
        self.inner.execute(kind, statement)
    }

    fn query(&self, statement: &str) -> Result<Vec<Row>> {
        Self::check(StatementKind::Select, statement)?;
        self.inner.query(statement)
    }
}

// =============================================================================
// Tools
// =============================================================================

/// The four query operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOp {
    Add,
    Read,
    Update,
    Delete,
}

impl QueryOp {
    pub const ALL: [QueryOp; 4] = [QueryOp::Add, QueryOp::Read, QueryOp::Update, QueryOp::Delete];

    pub fn tool_name(self) -> &'static str {
        match self {
            QueryOp::Add => "add_data",
            QueryOp::Read => "read_data",
            QueryOp::Update => "update_people",
            QueryOp::Delete => "delete_person",
        }
    }

    fn kind(self) -> StatementKind {
        match self {
            QueryOp::Add => StatementKind::Insert,
            QueryOp::Read => StatementKind::Select,
            QueryOp::Update => StatementKind::Update,
            QueryOp::Delete => StatementKind::Delete,
        }
    }

    fn description(self) -> &'static str {
        match self {
            QueryOp::Add => {
                "Add a new person to the 'people' table using a SQL INSERT query. \
                 Columns: name TEXT, age INTEGER, profession TEXT (all required); id is generated. \
                 Example: INSERT INTO people (name, age, profession) VALUES ('Alice Smith', 25, 'Developer')"
            }
            QueryOp::Read => {
                "Read records from the 'people' table using a SQL SELECT query. \
                 Returns a list of rows. Defaults to SELECT * FROM people. \
                 Example: SELECT name, profession FROM people WHERE age < 30"
            }
            QueryOp::Update => {
                "Update records in the 'people' table using a SQL UPDATE query. \
                 Example: UPDATE people SET age = 27 WHERE name = 'Subhamoy'"
            }
            QueryOp::Delete => {
                "Delete records from the 'people' table using a SQL DELETE query. \
                 Example: DELETE FROM people WHERE name = 'Alice Smith'"
            }
        }
    }
}

/// One query operation bound to a store.
pub struct QueryTool {
    op: QueryOp,
    store: Arc<dyn StatementStore>,
}

impl fmt::Debug for QueryTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryTool").field("op", &self.op).finish_non_exhaustive()
    }
}

impl QueryTool {
    pub fn new(op: QueryOp, store: Arc<dyn StatementStore>) -> Self {
        Self { op, store }
    }

    /// Run the operation. Always resolves to an outcome for store faults.
    pub async fn run(&self, query: String) -> Result<QueryOutcome> {
        let store = self.store.clone();
        let op = self.op;
        tracing::debug!(tool = op.tool_name(), %query, "Executing statement");

        let outcome = match op {
            QueryOp::Read => {
                let result = tokio::task::spawn_blocking(move || store.query(&query))
                    .await
                    .map_err(|e| Error::internal(format!("store task failed: {}", e)))?;
                match result {
                    Ok(rows) => QueryOutcome::rows(rows),
                    Err(e) => {
                        // Read faults surface as an empty result set.
                        tracing::warn!("Error reading data: {}", e);
                        QueryOutcome::rows(Vec::new())
                    }
                }
            }
            QueryOp::Add | QueryOp::Update | QueryOp::Delete => {
                let kind = op.kind();
                let result = tokio::task::spawn_blocking(move || store.execute(kind, &query))
                    .await
                    .map_err(|e| Error::internal(format!("store task failed: {}", e)))?;
                match (op, result) {
                    (QueryOp::Add, Ok(_)) => QueryOutcome::committed(),
                    (QueryOp::Update, Ok(n)) => {
                        QueryOutcome::confirmation(format!("Update successful ({} rows affected).", n))
                    }
                    (_, Ok(n)) => {
                        QueryOutcome::confirmation(format!("Delete successful ({} rows affected).", n))
                    }
                    (QueryOp::Add, Err(e)) => {
                        tracing::warn!("Error adding data: {}", e);
                        QueryOutcome::failure(format!("Error adding data: {}", e))
                    }
                    (QueryOp::Update, Err(e)) => {
                        tracing::warn!("Error updating data: {}", e);
                        QueryOutcome::failure(format!("Error updating data: {}", e))
                    }
                    (_, Err(e)) => QueryOutcome::failure(format!("Error deleting data: {}", e)),
                }
            }
        };

        Ok(outcome)
    }
}

#[async_trait]
impl Tool for QueryTool {
    fn describe(&self) -> ToolDescriptor {
        let query = match self.op {
            QueryOp::Read => ParamDef::with_default(
                "query",
                ParamType::String,
                "SQL SELECT statement",
                Value::String(DEFAULT_READ_QUERY.to_string()),
            ),
            op => ParamDef::required(
                "query",
                ParamType::String,
                format!("SQL {} statement", op.kind().keyword()),
            ),
        };
        ToolDescriptor::new(self.op.tool_name(), self.op.description()).param(query)
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value> {
        let query = match (arguments.get("query").and_then(Value::as_str), self.op) {
            (Some(q), _) => q.to_string(),
            (None, QueryOp::Read) => DEFAULT_READ_QUERY.to_string(),
            (None, op) => {
                return Err(Error::invalid_arguments(format!(
                    "{} requires a query",
                    op.tool_name()
                )))
            }
        };

        let outcome = self.run(query).await?;
        Ok(serde_json::to_value(outcome)?)
    }
}

/// Register all four query tools against one store.
pub fn register_query_tools(
    registry: &mut ToolRegistry,
    store: Arc<dyn StatementStore>,
) -> Result<()> {
    for op in QueryOp::ALL {
        registry.register(QueryTool::new(op, store.clone()))?;
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
