//! Query generator collaborator.
//!
//! Turns (question, schema info, row limit) into a single SQL string. The
//! prompt instructs the model to emit only a query statement, honor the
//! limit, and never mutate anything; the validator remains the enforcement
//! backstop for that contract.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::llm::{ChatRequest, LlmClient};

/// Natural-language-to-SQL generation seam.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Generate one SQL statement for the question, whitespace-trimmed.
    async fn generate(&self, question: &str, schema_info: &str, top_k: u32) -> Result<String>;
}

/// LLM-backed generator.
pub struct LlmSqlGenerator {
    client: Arc<dyn LlmClient>,
}

impl LlmSqlGenerator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    fn build_prompt(question: &str, schema_info: &str, top_k: u32) -> String {
        format!(
            "你是专业的SQL生成专家\n\
             你的责职如下：\n\
             1：仅生成查询SQL语句，无额外解释；\n\
             2：表结构：{schema_info}\n\
             3：严禁生成任何可以影响数据库数据内容或结构的sql\n\
             4：最多返回{top_k}条记录\n\
             用户需求：{question}"
        )
    }
}

#[async_trait]
impl SqlGenerator for LlmSqlGenerator {
    async fn generate(&self, question: &str, schema_info: &str, top_k: u32) -> Result<String> {
        debug!(top_k, "generating SQL candidate");
        let request =
            ChatRequest::new(Self::build_prompt(question, schema_info, top_k)).with_temperature(0.0);

        let reply = self
            .client
            .complete(request)
            .await
            .map_err(|e| Error::generation(e.to_string()))?;

        let sql = strip_code_fence(reply.trim()).to_string();
        info!(sql_len = sql.len(), "SQL candidate generated");
        Ok(sql)
    }
}

/// Models often wrap SQL in a ``` fence despite the query-only instruction.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("sql").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
