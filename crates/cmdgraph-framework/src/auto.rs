//! Auto-dispatch job evaluation.
//!
//! One tick runs every [`AutoJob`](cmdgraph_core::AutoJob) concurrently with
//! empty arguments and keeps the replies that are not `None`. A job whose
//! plugin is missing or fails is logged and skipped; the others still run.
//! Fan-out to subscribed users is the scheduler's concern.

use std::sync::Arc;

use cmdgraph_core::{AutoJob, Reply};
use futures::future;
use tracing::{debug, error, warn};

use crate::plugin::{PluginArgs, PluginRegistry, load_plugin};
use crate::repository::GraphView;

/// Runs every auto job of `view` once and returns the replies, in job order.
pub async fn collect_auto_replies(
    view: &GraphView,
    registry: &Arc<dyn PluginRegistry>,
) -> Vec<Reply> {
    let jobs = view.auto_jobs();
    debug!(jobs = jobs.len(), generation = view.generation(), "Running auto jobs");

    let replies = future::join_all(jobs.iter().cloned().map(|job| run_job(job, registry))).await;
    replies.into_iter().flatten().collect()
}

async fn run_job(job: AutoJob, registry: &Arc<dyn PluginRegistry>) -> Option<Reply> {
    let Some(handle) = load_plugin(registry, &job.plugin_ref).await else {
        error!(plugin = %job.plugin_ref, "Auto job refers to an unregistered plugin");
        return None;
    };

    match handle.invoke(PluginArgs::new(Vec::new(), job.params)).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(plugin = %job.plugin_ref, error = %e, "Auto job failed");
            None
        }
    }
}
