//! Keeps the index in step with file tools as they run.

use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::IndexerService;
use crate::services::tools::paths::normalize_relative;
use crate::services::tools::ToolContext;

/// Index change implied by one executed tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexAction {
    /// Re-index with content taken from the call's arguments
    Reindex { file_path: String, content: String },
    /// Re-index from the file as it now is on disk
    ReindexFromDisk { file_path: String },
    Delete { file_path: String },
}

/// Map a tool call to its index change, if it has one.
pub fn action_for(tool_name: &str, raw_args: &str) -> Option<IndexAction> {
    let args: Value = serde_json::from_str(raw_args).ok()?;
    let file_path = args
        .get("relativeFilePath")
        .and_then(Value::as_str)
        .map(normalize_relative)
        .filter(|p| !p.is_empty())?;

    match tool_name {
        "writeFile" => {
            let content = args.get("content").and_then(Value::as_str)?.to_string();
            Some(IndexAction::Reindex { file_path, content })
        }
        "modifyFile" => Some(IndexAction::ReindexFromDisk { file_path }),
        "deleteFile" => Some(IndexAction::Delete { file_path }),
        _ => None,
    }
}

/// Reacts to executed tools by updating the index off the generation path.
///
/// Updates go through one FIFO queue drained by a single worker task, so
/// two writes to the same file always land in the order the tools ran.
#[derive(Clone)]
pub struct RagListener {
    inner: Arc<ListenerInner>,
}

struct ListenerInner {
    indexer: IndexerService,
    queue: OnceLock<mpsc::UnboundedSender<IndexJob>>,
}

struct IndexJob {
    project_id: String,
    action: IndexAction,
    ctx: ToolContext,
    done: oneshot::Sender<()>,
}

impl RagListener {
    pub fn new(indexer: IndexerService) -> Self {
        Self {
            inner: Arc::new(ListenerInner {
                indexer,
                queue: OnceLock::new(),
            }),
        }
    }

    /// Queue the index change for one executed call. Never waits on the
    /// index; the returned receiver resolves once the change is applied.
    /// Failures are logged and never reach the caller.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_tool_executed(
        &self,
        tool_name: &str,
        raw_args: &str,
        ctx: &ToolContext,
    ) -> Option<oneshot::Receiver<()>> {
        let action = action_for(tool_name, raw_args)?;
        if !self.inner.indexer.supports(action.file_path()) {
            return None;
        }

        let project_id = ctx.app_id.to_string();
        debug!(project_id = %project_id, tool = tool_name, ?action, "Queueing index update");

        let (done, applied) = oneshot::channel();
        let job = IndexJob {
            project_id,
            action,
            ctx: ctx.clone(),
            done,
        };
        if self.queue().send(job).is_err() {
            warn!(tool = tool_name, "Index worker stopped, update dropped");
            return None;
        }
        Some(applied)
    }

    fn queue(&self) -> &mpsc::UnboundedSender<IndexJob> {
        self.inner.queue.get_or_init(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(run_queue(self.inner.indexer.clone(), rx));
            tx
        })
    }
}

/// Apply queued changes one at a time until every sender is gone.
async fn run_queue(indexer: IndexerService, mut rx: mpsc::UnboundedReceiver<IndexJob>) {
    while let Some(job) = rx.recv().await {
        apply(&indexer, &job.project_id, job.action, &job.ctx).await;
        let _ = job.done.send(());
    }
    debug!("Index worker stopped");
}

async fn apply(indexer: &IndexerService, project_id: &str, action: IndexAction, ctx: &ToolContext) {
    let result = match action {
        IndexAction::Reindex { file_path, content } => indexer.index(project_id, &file_path, &content).await.map(|_| ()),
        IndexAction::ReindexFromDisk { file_path } => match ctx.resolve(&file_path) {
            Ok(path) => match tokio::fs::read_to_string(&path).await {
                Ok(content) => indexer.index(project_id, &file_path, &content).await.map(|_| ()),
                Err(e) => {
                    warn!(file = %file_path, error = %e, "Modified file unreadable, skipping index");
                    Ok(())
                }
            },
            Err(message) => {
                warn!(file = %file_path, %message, "Modified file outside project, skipping index");
                Ok(())
            }
        },
        IndexAction::Delete { file_path } => indexer.delete_file(project_id, &file_path).await,
    };
    if let Err(e) = result {
        warn!(project_id = %project_id, error = %e, "Index update failed");
    }
}

impl IndexAction {
    pub fn file_path(&self) -> &str {
        match self {
            IndexAction::Reindex { file_path, .. }
            | IndexAction::ReindexFromDisk { file_path }
            | IndexAction::Delete { file_path } => file_path,
        }
    }
}
