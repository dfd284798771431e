//! Stream adapter: turns workflow snapshots into a line stream for a caller.
//!
//! One workflow invocation = one finite stream, not restartable. Each chunk
//! is newline-terminated so a line-buffered event-stream response can
//! forward chunks as they arrive. Progress strings are deduplicated across
//! the whole run; the first generated SQL is announced once; the formatted
//! result is the final content line. Collaborator failures become a single
//! diagnostic line — the stream always terminates, it never leaves the
//! caller hanging.

use futures::channel::mpsc::{self, UnboundedSender};
use futures::{Stream, StreamExt};
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::state::WorkflowState;
use crate::workflow::WorkflowEngine;

/// A boxed stream of text chunks produced by one workflow run.
pub type QueryStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Run a question through the engine and stream progress lines and the
/// final result to the caller.
///
/// The engine runs on a spawned task; if the caller drops the stream,
/// further emission stops best-effort (in-flight collaborator calls are
/// not aborted).
pub fn run_query(engine: Arc<WorkflowEngine>, question: impl Into<String>) -> QueryStream {
    let question = question.into();
    let (chunk_tx, chunk_rx) = mpsc::unbounded::<String>();

    tokio::spawn(async move {
        drive(engine, question, chunk_tx).await;
    });

    Box::pin(chunk_rx)
}

async fn drive(engine: Arc<WorkflowEngine>, question: String, out: UnboundedSender<String>) {
    let mut emitter = LineEmitter::new(out);

    emitter.send(format!("开始处理,用户问题：{question}\n"));
    emitter.send(format!("{}\n", "-".repeat(50)));
    emitter.send("工作流已编译完成，开始流程任务\n");
    emitter.send("开始执行工作流...\n");

    let (snap_tx, mut snap_rx) = mpsc::unbounded::<WorkflowState>();
    let run = {
        let engine = engine.clone();
        let question = question.clone();
        tokio::spawn(async move { engine.run_with_sink(&question, snap_tx).await })
    };

    while let Some(snapshot) = snap_rx.next().await {
        emitter.forward(&snapshot);
        if emitter.closed() {
            debug!("caller disconnected, stopping stream emission");
            return;
        }
    }

    match run.await {
        Ok(Ok(_)) => emitter.send("工作流执行完成。\n"),
        Ok(Err(e)) => {
            warn!(error = %e, "workflow run failed");
            emitter.send(format!("工作流执行出错: {e}\n"));
        }
        Err(e) => {
            // The engine task itself died; still terminate with a line.
            warn!(error = %e, "workflow task failed");
            emitter.send(format!("工作流执行出错: {e}\n"));
        }
    }
}

/// Deduplicating line sink over the outbound chunk channel.
struct LineEmitter {
    out: UnboundedSender<String>,
    seen: HashSet<String>,
    sql_announced: bool,
    result_sent: bool,
    closed: bool,
}

impl LineEmitter {
    fn new(out: UnboundedSender<String>) -> Self {
        Self {
            out,
            seen: HashSet::new(),
            sql_announced: false,
            result_sent: false,
            closed: false,
        }
    }

    fn closed(&self) -> bool {
        self.closed
    }

    fn send(&mut self, chunk: impl Into<String>) {
        if self.out.unbounded_send(chunk.into()).is_err() {
            self.closed = true;
        }
    }

    /// Emit everything new carried by one state snapshot.
    fn forward(&mut self, snapshot: &WorkflowState) {
        for message in &snapshot.streaming_queue {
            // Set-based dedup across the whole run, keyed on exact equality.
            if self.seen.insert(message.clone()) {
                self.send(format!("{message}\n"));
            }
        }

        if !self.sql_announced {
            if let Some(sql) = snapshot.generated_sql.as_deref() {
                self.send(format!("首次生成的SQL: {sql}\n"));
                self.sql_announced = true;
            }
        }

        if !self.result_sent {
            if let Some(result) = snapshot.formatted_result.as_deref() {
                self.send(format!("{result}\n"));
                self.result_sent = true;
            }
        }
    }
}
