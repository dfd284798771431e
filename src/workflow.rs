//! Workflow engine: the generate/validate/execute/format state machine.
//!
//! Transitions are strictly ordered and mutate one [`WorkflowState`] in
//! place; a snapshot is handed to the sink after every progress append so
//! the stream adapter can surface incremental progress. The only suspension
//! points are the two collaborator calls.
//!
//! ```text
//! start → GENERATE → VALIDATE ─┬─ pass ──────────→ EXECUTE → FORMAT (done)
//!                              ├─ fail, retries left → RETRY → GENERATE
//!                              └─ fail, exhausted ──→ FORMAT (failed)
//! ```

use futures::channel::mpsc::{self, UnboundedSender};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agent::ExecutionAgent;
use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::format::{format_result, EMPTY_RESULT_TEXT, UNKNOWN_ERROR_TEXT};
use crate::generator::SqlGenerator;
use crate::schema::SchemaProvider;
use crate::state::WorkflowState;
use crate::topk::extract_top_k_in;
use crate::validate::{find_forbidden_keyword, forbidden_reason, NOT_GENERATED_REASON};

/// Nodes of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkflowNode {
    Generate,
    Validate,
    Retry,
    Execute,
    Format,
}

/// Orchestrates one question through generation, validation, execution and
/// formatting, with a bounded outer retry on validation failure.
///
/// Collaborators are injected so tests can run against stubs. One engine
/// serves many concurrent questions; each run owns its own state.
pub struct WorkflowEngine {
    generator: Arc<dyn SqlGenerator>,
    agent: Arc<dyn ExecutionAgent>,
    schema: Arc<dyn SchemaProvider>,
    config: WorkflowConfig,
}

impl WorkflowEngine {
    pub fn new(
        generator: Arc<dyn SqlGenerator>,
        agent: Arc<dyn ExecutionAgent>,
        schema: Arc<dyn SchemaProvider>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            generator,
            agent,
            schema,
            config,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Run the workflow to completion, ignoring intermediate snapshots.
    pub async fn run(&self, question: &str) -> Result<WorkflowState> {
        let (sink, _discard) = mpsc::unbounded();
        self.run_with_sink(question, sink).await
    }

    /// Run the workflow, sending a state snapshot to `sink` after every
    /// progress append. A dropped receiver stops emission but not the run.
    pub async fn run_with_sink(
        &self,
        question: &str,
        sink: UnboundedSender<WorkflowState>,
    ) -> Result<WorkflowState> {
        let mut state = WorkflowState::new(question);
        let mut node = WorkflowNode::Generate;

        loop {
            node = match node {
                WorkflowNode::Generate => {
                    self.generate(&mut state, &sink).await?;
                    WorkflowNode::Validate
                }
                WorkflowNode::Validate => {
                    self.validate(&mut state, &sink);
                    self.route(&state)
                }
                WorkflowNode::Retry => {
                    self.retry(&mut state, &sink);
                    WorkflowNode::Generate
                }
                WorkflowNode::Execute => {
                    self.execute(&mut state, &sink).await?;
                    WorkflowNode::Format
                }
                WorkflowNode::Format => {
                    self.format(&mut state, &sink);
                    break;
                }
            };
        }

        Ok(state)
    }

    /// Route decision after validation: pass goes to execution, failure
    /// retries while the bound allows, then degrades to failure formatting.
    /// The bound is checked before the retry increment; with the default of
    /// 2 retries the engine makes exactly 3 generation attempts.
    fn route(&self, state: &WorkflowState) -> WorkflowNode {
        if state.sql_validation == Some(true) {
            WorkflowNode::Execute
        } else if state.retry_count < self.config.max_retries {
            WorkflowNode::Retry
        } else {
            WorkflowNode::Format
        }
    }

    async fn generate(
        &self,
        state: &mut WorkflowState,
        sink: &UnboundedSender<WorkflowState>,
    ) -> Result<()> {
        state.progress("🔄 正在分析用户需求,生成相应的Sql查询...");
        emit(sink, state);

        let top_k = extract_top_k_in(
            &state.user_query,
            self.config.default_top_k,
            self.config.top_k_min,
            self.config.top_k_max,
        );
        debug!(top_k, "generation attempt started");

        let schema_info = self.schema.describe_schema()?;
        let sql = self
            .generator
            .generate(&state.user_query, &schema_info, top_k)
            .await?;

        state.generated_sql = Some(sql);
        state.sql_validation = Some(true);
        state.sql_error = None;
        state.progress("✅ SQL生成完成");
        emit(sink, state);
        Ok(())
    }

    fn validate(&self, state: &mut WorkflowState, sink: &UnboundedSender<WorkflowState>) {
        let Some(sql) = state
            .generated_sql
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_owned)
        else {
            state.progress("❌ SQL未生成或生成失败");
            state.sql_validation = Some(false);
            state.sql_error = Some(NOT_GENERATED_REASON.to_string());
            emit(sink, state);
            return;
        };

        state.progress("正在校验sql语句的合规性");
        if let Some(keyword) = find_forbidden_keyword(&sql) {
            let reason = forbidden_reason(keyword);
            warn!(keyword, "validation rejected SQL candidate");
            state.progress(format!("❌ {reason}"));
            state.sql_validation = Some(false);
            state.sql_error = Some(reason);
            emit(sink, state);
            return;
        }

        // Idempotent: never flips an already-failed validation back to
        // passed, and skips the pass message when already passed.
        if state.sql_validation != Some(true) {
            state.progress("✅ SQL语法校验通过");
            state.sql_validation = Some(true);
        }
        emit(sink, state);
    }

    fn retry(&self, state: &mut WorkflowState, sink: &UnboundedSender<WorkflowState>) {
        state.progress(format!("🔄 第{}次重试生成SQL...", state.retry_count + 1));
        state.retry_count += 1;
        state.generated_sql = None;
        state.sql_validation = Some(false);
        info!(retry_count = state.retry_count, "retrying SQL generation");
        emit(sink, state);
    }

    async fn execute(
        &self,
        state: &mut WorkflowState,
        sink: &UnboundedSender<WorkflowState>,
    ) -> Result<()> {
        // Defensive: the route should never send a failed validation here.
        let sql = match (state.sql_validation, state.generated_sql.clone()) {
            (Some(true), Some(sql)) => sql,
            _ => {
                state.progress("❌ SQL未通过校验，跳过执行");
                state.exec_result = None;
                emit(sink, state);
                return Ok(());
            }
        };

        state.progress("🚀 正在执行SQL查询...");
        emit(sink, state);

        let schema_info = self.schema.describe_schema()?;
        let mut outcome = self
            .agent
            .execute_and_repair(&sql, &state.user_query, &schema_info)
            .await?;

        if outcome.raw_output.trim().is_empty() {
            outcome.raw_output = EMPTY_RESULT_TEXT.to_string();
        }

        state.progress("✅ SQL查询完成");
        state.exec_result = Some(outcome);
        state.sql_error = None;
        emit(sink, state);
        Ok(())
    }

    fn format(&self, state: &mut WorkflowState, sink: &UnboundedSender<WorkflowState>) {
        if state.exec_result.is_none() {
            let reason = state
                .sql_error
                .clone()
                .unwrap_or_else(|| UNKNOWN_ERROR_TEXT.to_string());
            state.progress(format!("❌ 查询失败：{reason}"));
            state.formatted_result =
                Some(format_result(None, Some(&reason)));
            emit(sink, state);
            return;
        }

        state.progress("🎨 正在格式化查询结果...");
        emit(sink, state);

        let formatted = format_result(state.exec_result.as_ref(), state.sql_error.as_deref());
        state.progress("✅ 结果格式化完成");
        state.formatted_result = Some(formatted);
        emit(sink, state);
    }
}

/// Hand a snapshot to the sink; a dropped receiver is a best-effort stop,
/// never an error.
fn emit(sink: &UnboundedSender<WorkflowState>, state: &WorkflowState) {
    let _ = sink.unbounded_send(state.clone());
}
