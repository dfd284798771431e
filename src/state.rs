//! Workflow state threaded through every node of the query pipeline.
//!
//! A [`WorkflowState`] is created fresh per incoming question, mutated only
//! by the engine's named transitions, and discarded once the terminal
//! formatted result has been emitted. Nothing here persists across requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One intermediate step recorded by the execution agent's repair loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    /// Action taken (e.g. "execute_sql", "repair_sql")
    pub action: String,
    /// Input to the action, typically the SQL candidate
    pub detail: String,
    /// What came back: rows, an error message, a rewritten query
    pub observation: String,
    /// When the step happened
    pub timestamp: DateTime<Utc>,
}

impl TraceStep {
    /// Record a step with the current timestamp.
    pub fn new(
        action: impl Into<String>,
        detail: impl Into<String>,
        observation: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            detail: detail.into(),
            observation: observation.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Output of the execution agent: raw textual result plus the intermediate
/// trace of its internal repair loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecOutcome {
    /// Raw query result as text
    pub raw_output: String,
    /// Ordered trace of agent steps that produced the output
    pub intermediate: Vec<TraceStep>,
}

impl ExecOutcome {
    pub fn new(raw_output: impl Into<String>, intermediate: Vec<TraceStep>) -> Self {
        Self {
            raw_output: raw_output.into(),
            intermediate,
        }
    }
}

/// Mutable record carried through the generate/validate/execute/format
/// state machine. One writer at a time; snapshots are cloned at every node
/// boundary for the stream adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// The original question, immutable once set
    pub user_query: String,
    /// Last candidate query; cleared on retry
    pub generated_sql: Option<String>,
    /// Tri-state: unset, passed, failed
    pub sql_validation: Option<bool>,
    /// Why the last validation/execution failed
    pub sql_error: Option<String>,
    /// Agent execution result, present only after a successful execute
    pub exec_result: Option<ExecOutcome>,
    /// Final user-facing text
    pub formatted_result: Option<String>,
    /// Completed retries; only the retry transition increments this
    pub retry_count: u32,
    /// Append-only log of progress messages emitted so far
    pub streaming_queue: Vec<String>,
    /// Most recent progress message; always also present in the queue
    pub streaming_progress: String,
}

impl WorkflowState {
    /// Fresh state for one incoming question.
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            generated_sql: None,
            sql_validation: None,
            sql_error: None,
            exec_result: None,
            formatted_result: None,
            retry_count: 0,
            streaming_queue: Vec::new(),
            streaming_progress: String::new(),
        }
    }

    /// Record a progress message: updates the latest-message field and
    /// appends to the queue, keeping the two in sync.
    pub fn progress(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.streaming_progress = message.clone();
        self.streaming_queue.push(message);
    }
}
