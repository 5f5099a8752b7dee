//! Auto-dispatch scheduler.
//!
//! Every interval the scheduler runs all auto jobs and sends each reply's
//! lines to every auto-subscribed user. Jobs and subscribers come from the
//! graph version the [`Router`] validated; while the repository holds a
//! graph that has not passed the integrity check, ticks are skipped.
//! Failures are contained:
//!
//! - a job that fails is skipped by [`collect_auto_replies`];
//! - a user that cannot be reached does not stop delivery to the others;
//! - a tick that fails as a whole is logged and followed by a pause of
//!   `retry_delay` before the cadence resumes.
//!
//! A slow tick delays the next one; ticks never overlap.

use std::sync::Arc;
use std::time::Duration;

use cmdgraph_core::Reply;
use cmdgraph_framework::{Router, RouterError, RouterResult, collect_auto_replies};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::gateway::{Gateway, Recipient};

/// Counts for one completed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The graph was replaced after validation; nothing ran.
    pub skipped: bool,
    pub replies: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Periodic auto-job runner.
pub struct Scheduler {
    router: Arc<Router>,
    gateway: Arc<dyn Gateway>,
    interval: Duration,
    retry_delay: Duration,
}

impl Scheduler {
    pub fn new(router: Arc<Router>, gateway: Arc<dyn Gateway>) -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            router,
            gateway,
            interval: defaults.interval(),
            retry_delay: defaults.retry_delay(),
        }
    }

    pub fn with_config(mut self, config: &SchedulerConfig) -> Self {
        self.interval = config.interval();
        self.retry_delay = config.retry_delay();
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Runs one tick: collect replies, then fan them out.
    pub async fn tick(&self) -> RouterResult<TickReport> {
        let view = match self.router.current_view().await {
            Ok(view) => view,
            Err(RouterError::StaleGraph { validated, current }) => {
                warn!(validated, current, "Graph not validated, auto tick skipped");
                return Ok(TickReport {
                    skipped: true,
                    ..Default::default()
                });
            }
            Err(e) => return Err(e),
        };

        let replies = collect_auto_replies(&view, self.router.registry()).await;
        let mut report = TickReport {
            replies: replies.len(),
            ..Default::default()
        };
        if replies.is_empty() {
            return Ok(report);
        }

        let users = view.auto_subscribed_users();
        for reply in &replies {
            for line in outgoing_lines(reply) {
                for uid in &users {
                    let recipient = Recipient::User(uid.clone());
                    match self.gateway.send_message(&recipient, line).await {
                        Ok(()) => report.delivered += 1,
                        Err(e) => {
                            report.failed += 1;
                            warn!(user = %uid, error = %e, "Auto message not delivered");
                        }
                    }
                }
            }
        }

        debug!(
            replies = report.replies,
            delivered = report.delivered,
            failed = report.failed,
            "Auto tick finished"
        );
        Ok(report)
    }

    /// Ticks until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval = ?self.interval, "Auto scheduler started");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.tick().await {
                error!(error = %e, retry_in = ?self.retry_delay, "Auto tick failed");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = time::sleep(self.retry_delay) => {}
                }
                ticker.reset();
            }
        }

        info!("Auto scheduler stopped");
    }

    /// Runs the scheduler on its own task.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

/// Lines an auto reply sends. Menus are not meaningful without a chat and
/// are skipped; errors contribute their text.
fn outgoing_lines(reply: &Reply) -> Vec<&str> {
    match reply {
        Reply::Message { text, data } => std::iter::once(text.as_str())
            .filter(|t| !t.is_empty())
            .chain(data.iter().map(String::as_str))
            .collect(),
        Reply::Error { text, .. } => vec![text.as_str()],
        Reply::Menu { text, .. } => {
            warn!(menu = %text, "Auto job produced a menu, skipping");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::RecordingGateway;
    use async_trait::async_trait;
    use cmdgraph_core::{AutoJob, Button, Connection, Graph, Menu, Target, TextCommand, User};
    use cmdgraph_framework::{
        FromArgs, MemoryRepository, Plugin, PluginArgs, PluginDescriptor, PluginResult,
        Repository, StaticRegistry,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    static RUNS: AtomicUsize = AtomicUsize::new(0);

    struct News;

    impl FromArgs for News {
        fn from_args(_: PluginArgs) -> PluginResult<Self> {
            Ok(News)
        }
    }

    #[async_trait]
    impl Plugin for News {
        async fn run(&self) -> PluginResult<Option<Reply>> {
            RUNS.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Reply::message(["headline", "weather"])))
        }
    }

    fn graph() -> Graph {
        Graph {
            users: vec![
                User::new("alice").subscribed(true),
                User::new("bob"),
                User::new("carol").subscribed(true),
            ],
            auto_jobs: vec![AutoJob::new("news"), AutoJob::new("missing")],
            ..Default::default()
        }
    }

    fn registry() -> Arc<StaticRegistry> {
        Arc::new(StaticRegistry::new().with(PluginDescriptor::of::<News>("news")))
    }

    fn scheduler(gateway: Arc<RecordingGateway>) -> Scheduler {
        let router = Router::new_unchecked(
            Arc::new(MemoryRepository::with_graph(graph())),
            registry(),
        );
        Scheduler::new(Arc::new(router), gateway)
    }

    /// `graph()` with everything the integrity check asks for.
    fn live_graph() -> Graph {
        Graph {
            connections: vec![Connection {
                api_id: 1,
                api_hash: "h".into(),
                session: "s".into(),
                token: "t".into(),
                info: None,
            }],
            menus: vec![
                Menu::new("ROOT").button(Button::new("Back", "TOKENBAK", Target::menu("ROOT"))),
            ],
            text_commands: vec![TextCommand::new("start", Target::menu("ROOT"))],
            auto_jobs: vec![AutoJob::new("news")],
            ..graph()
        }
    }

    #[tokio::test]
    async fn test_tick_fans_out_to_subscribers() {
        let gateway = Arc::new(RecordingGateway::new());
        let report = scheduler(gateway.clone()).tick().await.unwrap();

        assert_eq!(report.replies, 1);
        assert_eq!(report.delivered, 4);
        for uid in ["alice", "carol"] {
            assert_eq!(
                gateway.messages_to(&Recipient::User(uid.into())),
                ["headline", "weather"]
            );
        }
        assert!(gateway.messages_to(&Recipient::User("bob".into())).is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_user_does_not_block_others() {
        let gateway =
            Arc::new(RecordingGateway::new().unreachable(Recipient::User("alice".into())));
        let report = scheduler(gateway.clone()).tick().await.unwrap();

        assert_eq!(report.failed, 2);
        assert_eq!(report.delivered, 2);
        assert_eq!(
            gateway.messages_to(&Recipient::User("carol".into())),
            ["headline", "weather"]
        );
    }

    #[tokio::test]
    async fn test_unvalidated_graph_is_not_dispatched() {
        let repo = Arc::new(MemoryRepository::with_graph(live_graph()));
        let router = Router::activate(repo.clone(), registry()).await.unwrap();
        let gateway = Arc::new(RecordingGateway::new());
        let scheduler = Scheduler::new(Arc::new(router), gateway.clone());

        let report = scheduler.tick().await.unwrap();
        assert!(!report.skipped);
        assert_eq!(report.delivered, 4);

        // Swapped in without passing the check: no connection, missing plugin.
        repo.replace_all(graph()).await.unwrap();
        let report = scheduler.tick().await.unwrap();
        assert!(report.skipped);
        assert_eq!(report.replies, 0);
        assert_eq!(gateway.deliveries().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_until_cancelled() {
        let gateway = Arc::new(RecordingGateway::new());
        let shutdown = CancellationToken::new();
        let before = RUNS.load(Ordering::SeqCst);

        let handle = scheduler(gateway.clone())
            .interval(Duration::from_secs(10))
            .spawn(shutdown.clone());

        // First tick fires immediately, then one more at t = 10s.
        time::sleep(Duration::from_secs(15)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert!(RUNS.load(Ordering::SeqCst) - before >= 2);
        assert_eq!(
            gateway.messages_to(&Recipient::User("alice".into())).len(),
            4
        );
    }

    #[test]
    fn test_outgoing_lines() {
        let reply = Reply::Message {
            text: "Daily".into(),
            data: vec!["a".into()],
        };
        assert_eq!(outgoing_lines(&reply), ["Daily", "a"]);
        assert_eq!(outgoing_lines(&Reply::error("oops", ["x"])), ["oops"]);
        assert!(outgoing_lines(&Reply::menu("ROOT", vec![], false)).is_empty());
    }
}
