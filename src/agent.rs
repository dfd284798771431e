//! Query execution agent collaborator.
//!
//! Executes a candidate query against the store and, when execution fails,
//! asks the model to repair it — a bounded inner loop that is opaque to the
//! workflow engine. The engine's own retry is a different, outer-level
//! retry that restarts generation from scratch.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::generator::strip_code_fence;
use crate::llm::{ChatRequest, LlmClient};
use crate::schema::SqliteStore;
use crate::state::{ExecOutcome, TraceStep};
use crate::validate::find_forbidden_keyword;

/// Execution-and-repair seam used by the workflow engine.
#[async_trait]
pub trait ExecutionAgent: Send + Sync {
    /// Execute the query, repairing it if needed, and return the raw output
    /// plus the intermediate trace. Fails only on unrecoverable errors.
    async fn execute_and_repair(
        &self,
        sql: &str,
        question: &str,
        schema_info: &str,
    ) -> Result<ExecOutcome>;
}

const AGENT_SYSTEM_PROMPT: &str = "你是一个SQL执行和校准专家。\n\
    你的任务是：\n\
    1. 检查SQL语法是否正确\n\
    2. 如果SQL有误，先修正再返回\n\
    3. 仅返回修正后的查询SQL语句，无额外解释\n\
    注意：\n\
    - 只允许SELECT查询，拒绝其他类型的SQL";

/// LLM-assisted agent executing against a [`SqliteStore`].
pub struct SqlExecutionAgent {
    client: Arc<dyn LlmClient>,
    store: Arc<SqliteStore>,
    max_iterations: u32,
}

impl SqlExecutionAgent {
    pub fn new(client: Arc<dyn LlmClient>, store: Arc<SqliteStore>) -> Self {
        Self {
            client,
            store,
            max_iterations: 5,
        }
    }

    /// Set the repair-loop iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    async fn repair(
        &self,
        sql: &str,
        error: &str,
        question: &str,
        schema_info: &str,
    ) -> Result<String> {
        let prompt = format!(
            "以下SQL查询执行失败，请修正：\n\
             SQL: {sql}\n\
             错误信息：{error}\n\
             用户需求：{question}\n\
             表结构：{schema_info}\n\
             要求：分析SQL是否满足查询需求，修正语法错误，仅返回修正后的SQL。"
        );
        let request = ChatRequest::new(prompt)
            .with_system(AGENT_SYSTEM_PROMPT)
            .with_temperature(0.0);

        let reply = self
            .client
            .complete(request)
            .await
            .map_err(|e| Error::execution(e.to_string()))?;
        Ok(strip_code_fence(&reply).to_string())
    }
}

#[async_trait]
impl ExecutionAgent for SqlExecutionAgent {
    async fn execute_and_repair(
        &self,
        sql: &str,
        question: &str,
        schema_info: &str,
    ) -> Result<ExecOutcome> {
        let mut current = sql.trim().to_string();
        let mut steps = Vec::new();
        let mut last_error = String::new();

        for iteration in 1..=self.max_iterations {
            // Destructive SQL is refused here as well, even if a repair
            // round produced it.
            if let Some(keyword) = find_forbidden_keyword(&current) {
                warn!(keyword, "agent refusing destructive SQL");
                return Err(Error::execution(format!("拒绝执行危险操作：{keyword}")));
            }

            match self.store.run_query(&current) {
                Ok(output) => {
                    debug!(iteration, "query executed by agent");
                    steps.push(TraceStep::new(
                        "execute_sql",
                        current.clone(),
                        truncate(&output, 200),
                    ));
                    return Ok(ExecOutcome::new(output, steps));
                }
                Err(e) => {
                    last_error = e.to_string();
                    steps.push(TraceStep::new(
                        "execute_sql",
                        current.clone(),
                        last_error.clone(),
                    ));
                    if iteration == self.max_iterations {
                        break;
                    }
                    info!(iteration, error = %last_error, "repairing failed SQL");
                    let repaired = self
                        .repair(&current, &last_error, question, schema_info)
                        .await?;
                    steps.push(TraceStep::new(
                        "repair_sql",
                        last_error.clone(),
                        repaired.clone(),
                    ));
                    current = repaired;
                }
            }
        }

        Err(Error::execution(format!(
            "SQL经{}次修正后仍执行失败：{last_error}",
            self.max_iterations
        )))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedClient {
        replies: Vec<String>,
        calls: AtomicU32,
    }

    impl ScriptedClient {
        fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: replies.into_iter().map(String::from).collect(),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, _request: ChatRequest) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            self.replies
                .get(n)
                .cloned()
                .ok_or_else(|| Error::llm("script exhausted"))
        }
    }

    fn seeded_store() -> Arc<SqliteStore> {
        let store = SqliteStore::in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE stocks (name TEXT, cap REAL);
                 INSERT INTO stocks VALUES ('贵州茅台', 21000.0), ('宁德时代', 11000.0);",
            )
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_valid_sql_executes_without_repair() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let agent = SqlExecutionAgent::new(client.clone(), seeded_store());

        let outcome = agent
            .execute_and_repair("SELECT name FROM stocks ORDER BY cap DESC LIMIT 1", "前1个股票", "")
            .await
            .unwrap();

        assert!(outcome.raw_output.contains("贵州茅台"));
        assert_eq!(outcome.intermediate.len(), 1);
        assert_eq!(outcome.intermediate[0].action, "execute_sql");
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_broken_sql_is_repaired_then_executed() {
        let client = Arc::new(ScriptedClient::new(vec![
            "SELECT name FROM stocks LIMIT 1",
        ]));
        let agent = SqlExecutionAgent::new(client.clone(), seeded_store());

        let outcome = agent
            .execute_and_repair("SELECT name FROM stokcs LIMIT 1", "股票", "")
            .await
            .unwrap();

        assert!(outcome.raw_output.contains("name"));
        // failed execute, repair, successful execute
        assert_eq!(outcome.intermediate.len(), 3);
        assert_eq!(outcome.intermediate[1].action, "repair_sql");
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_destructive_sql_is_refused() {
        let agent = SqlExecutionAgent::new(Arc::new(ScriptedClient::new(vec![])), seeded_store());
        let err = agent
            .execute_and_repair("DROP TABLE stocks", "删表", "")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("拒绝执行危险操作"));
    }

    #[tokio::test]
    async fn test_destructive_repair_is_refused() {
        let client = Arc::new(ScriptedClient::new(vec!["DELETE FROM stocks"]));
        let agent = SqlExecutionAgent::new(client, seeded_store());
        let err = agent
            .execute_and_repair("SELECT nope FROM stocks", "q", "")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("DELETE"));
    }

    #[tokio::test]
    async fn test_repair_loop_is_bounded() {
        // Every repair round returns another broken query.
        let client = Arc::new(ScriptedClient::new(vec![
            "SELECT a FROM nothing",
            "SELECT b FROM nothing",
        ]));
        let agent = SqlExecutionAgent::new(client.clone(), seeded_store()).with_max_iterations(3);

        let err = agent
            .execute_and_repair("SELECT x FROM missing", "q", "")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Execution(_)));
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }
}
