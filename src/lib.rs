//! # nl2sql-core
//!
//! A natural-language-to-SQL workflow library: given a free-text question,
//! generate a candidate read-only query, validate it for safety, execute it
//! through a review/repair agent, format the result, and retry generation a
//! bounded number of times on validation failure — while streaming
//! deduplicated progress lines to the caller.
//!
//! ## Core Components
//!
//! - **Topk**: row-limit extraction from the question text
//! - **Validate**: forbidden-keyword safety check on generated SQL
//! - **Workflow**: the generate/validate/execute/format state machine
//! - **Stream**: line-stream adapter for event-stream HTTP responses
//! - **Generator / Agent**: LLM collaborators behind narrow trait seams
//! - **Schema**: SQLite store with pooled connections and introspection
//!
//! ## Example
//!
//! ```rust,ignore
//! use nl2sql_core::{run_query, WorkflowEngine};
//! use futures::StreamExt;
//!
//! let mut stream = run_query(engine, "前3个股票，按市值排序");
//! while let Some(chunk) = stream.next().await {
//!     print!("{chunk}");
//! }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod format;
pub mod generator;
pub mod llm;
pub mod schema;
pub mod state;
pub mod stream;
pub mod topk;
pub mod validate;
pub mod workflow;

// Re-exports for convenience
pub use agent::{ExecutionAgent, SqlExecutionAgent};
pub use config::{DatabaseConfig, WorkflowConfig};
pub use error::{Error, Result};
pub use format::{format_result, EMPTY_RESULT_TEXT, RESULT_HEADING, UNKNOWN_ERROR_TEXT};
pub use generator::{LlmSqlGenerator, SqlGenerator};
pub use llm::{ChatRequest, ClientConfig, LlmClient, OpenAiClient};
pub use schema::{SchemaProvider, SqliteStore};
pub use state::{ExecOutcome, TraceStep, WorkflowState};
pub use stream::{run_query, QueryStream};
pub use topk::{extract_top_k, extract_top_k_in, DEFAULT_TOP_K, MAX_TOP_K, MIN_TOP_K};
pub use validate::{
    find_forbidden_keyword, forbidden_reason, FORBIDDEN_KEYWORDS, NOT_GENERATED_REASON,
};
pub use workflow::WorkflowEngine;
