//! Bot process orchestration.
//!
//! [`BotRuntime`] wires the pieces of a running bot together:
//!
//! ```text
//!  signals ──▶ Router::resolve ──▶ deliver ──▶ Gateway
//!                  │
//!             Repository ◀── Scheduler (own task) ──▶ Gateway
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cmdgraph_runtime::BotRuntime;
//!
//! // Loads cmdgraph.toml / CMDGRAPH_* and opens the JSON store
//! let runtime = BotRuntime::builder().build().await?;
//!
//! let (tx, rx) = tokio::sync::mpsc::channel(64);
//! // hand `tx` to the transport, then
//! runtime.run(rx).await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use cmdgraph_core::{Connection, Reply, Signal};
use cmdgraph_framework::{
    BuiltinRegistry, DirectoryRegistry, LayeredRegistry, PluginRegistry, Repository,
    RepositoryError, Router,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::{CmdGraphConfig, ConfigLoader, PluginsConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::gateway::{ConsoleGateway, Gateway, deliver};
use crate::logging;
use crate::scheduler::Scheduler;
use crate::store::JsonFileRepository;

/// Builds the plugin registry described by `config`: compiled-in plugins
/// first (when enabled), then the manifest directory.
pub fn registry_from_config(config: &PluginsConfig) -> LayeredRegistry {
    let mut registry = LayeredRegistry::new();
    if config.builtin {
        registry = registry.layer(BuiltinRegistry::new());
    }
    registry.layer(DirectoryRegistry::new(&config.dir))
}

/// A validated graph being served on one gateway.
pub struct BotRuntime {
    config: CmdGraphConfig,
    connection: Connection,
    router: Arc<Router>,
    gateway: Arc<dyn Gateway>,
}

impl BotRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Builds a runtime from an already loaded configuration.
    pub async fn from_config(config: CmdGraphConfig) -> RuntimeResult<Self> {
        RuntimeBuilder::new().config(config).build().await
    }

    pub fn config(&self) -> &CmdGraphConfig {
        &self.config
    }

    /// The connection declared for the configured session.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        self.router.repository()
    }

    /// Resolves one signal and delivers its reply.
    ///
    /// Delivery failures are logged; they never stop the runtime.
    pub async fn handle(&self, signal: &Signal) -> Reply {
        let span = info_span!(
            "signal",
            chat_id = signal.chat_id,
            kind = %signal.kind,
            user = %signal.user_uid
        );
        async {
            let reply = self.router.resolve(signal).await;
            if let Err(e) = deliver(self.gateway.as_ref(), signal, &reply).await {
                warn!(error = %e, "Reply not delivered");
            }
            reply
        }
        .instrument(span)
        .await
    }

    /// Serves `signals` until the channel closes, Ctrl+C or SIGTERM.
    pub async fn run(&self, signals: mpsc::Receiver<Signal>) -> RuntimeResult<()> {
        info!(session = %self.connection.session, "Bot running. Press Ctrl+C to stop.");
        self.run_until(signals, wait_for_shutdown()).await
    }

    /// Serves `signals` until the channel closes or `shutdown` completes.
    ///
    /// Signals are handled one at a time in arrival order. The scheduler,
    /// when enabled, runs on its own task and is cancelled on return.
    pub async fn run_until<F>(
        &self,
        mut signals: mpsc::Receiver<Signal>,
        shutdown: F,
    ) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let cancel = CancellationToken::new();
        let scheduler = self.config.scheduler.enabled.then(|| {
            Scheduler::new(self.router.clone(), self.gateway.clone())
                .with_config(&self.config.scheduler)
                .spawn(cancel.clone())
        });

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                next = signals.recv() => match next {
                    Some(signal) => {
                        self.handle(&signal).await;
                    }
                    None => {
                        debug!("Signal channel closed");
                        break;
                    }
                },
            }
        }

        cancel.cancel();
        if let Some(handle) = scheduler
            && let Err(e) = handle.await
        {
            error!(error = %e, "Scheduler task ended abnormally");
        }

        info!("Bot stopped");
        Ok(())
    }
}

/// Completes on Ctrl+C or SIGTERM. If the handlers cannot be installed the
/// failure is logged and the future never completes.
async fn wait_for_shutdown() {
    if let Err(e) = listen_for_shutdown().await {
        let e = RuntimeError::Signal(e);
        error!(error = %e, "Shutdown signals unavailable");
        std::future::pending::<()>().await;
    }
}

async fn listen_for_shutdown() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`BotRuntime`].
///
/// Anything not supplied is derived from the configuration: the JSON store at
/// `storage.path`, the registry from `plugins`, and a [`ConsoleGateway`].
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<CmdGraphConfig>,
    repository: Option<Arc<dyn Repository>>,
    registry: Option<Arc<dyn PluginRegistry>>,
    gateway: Option<Arc<dyn Gateway>>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            config: None,
            repository: None,
            registry: None,
            gateway: None,
        }
    }

    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path.as_ref());
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path.as_ref());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Uses `config` as is instead of loading one.
    pub fn config(mut self, config: CmdGraphConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn repository(mut self, repository: Arc<dyn Repository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn registry(mut self, registry: Arc<dyn PluginRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn Gateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Loads configuration, opens storage and runs the integrity gate.
    ///
    /// # Errors
    ///
    /// Any configuration or storage failure, a graph with violations, or a
    /// session that has no declared connection.
    pub async fn build(self) -> RuntimeResult<BotRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };
        logging::init_from_config(&config.logging);

        let repository = match self.repository {
            Some(repository) => repository,
            None => Arc::new(JsonFileRepository::open(&config.storage.path).await?),
        };
        let registry = match self.registry {
            Some(registry) => registry,
            None => Arc::new(registry_from_config(&config.plugins)),
        };
        let gateway = self.gateway.unwrap_or_else(|| Arc::new(ConsoleGateway::new()));

        let router = Router::activate(repository, registry).await?;

        let session = config.bot.session.clone();
        let connection = match router.repository().get_connection(&session).await {
            Ok(connection) => connection,
            Err(RepositoryError::NotFound { .. }) => {
                error!(session = %session, "Session is not declared");
                return Err(RuntimeError::SessionNotFound(session));
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            session = %connection.session,
            api_id = connection.api_id,
            scheduler = config.scheduler.enabled,
            "Runtime initialized"
        );

        Ok(BotRuntime {
            config,
            connection,
            router: Arc::new(router),
            gateway,
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Delivery, Recipient, RecordingGateway};
    use async_trait::async_trait;
    use cmdgraph_core::from_declaration;
    use cmdgraph_framework::{
        FromArgs, MemoryRepository, Plugin, PluginArgs, PluginDescriptor, PluginResult,
        RouterError, StaticRegistry,
    };
    use serde_json::{Value, json};

    struct Ping;

    impl FromArgs for Ping {
        fn from_args(_: PluginArgs) -> PluginResult<Self> {
            Ok(Ping)
        }
    }

    #[async_trait]
    impl Plugin for Ping {
        async fn run(&self) -> PluginResult<Option<Reply>> {
            Ok(Some(Reply::message(["pong"])))
        }
    }

    fn declaration() -> Value {
        json!({
            "connect": [{ "api_id": 1, "api_hash": "h", "session": "tg_cmd_bot", "token": "t" }],
            "users": [{ "user_uid": "alice" }],
            "menu": [{ "title": "ROOT", "buttons": [
                { "text": "Ping", "token": "PINGPING", "target": { "to_plugin": "ping" } }
            ] }],
            "text_command": [{ "text": "START", "target": { "to_menu": "ROOT" } }]
        })
    }

    fn config() -> CmdGraphConfig {
        let mut config = CmdGraphConfig::default();
        config.scheduler.enabled = false;
        config
    }

    async fn build(doc: Value, gateway: Arc<RecordingGateway>) -> RuntimeResult<BotRuntime> {
        BotRuntime::builder()
            .config(config())
            .repository(Arc::new(MemoryRepository::with_graph(
                from_declaration(&doc).unwrap(),
            )))
            .registry(Arc::new(
                StaticRegistry::new().with(PluginDescriptor::of::<Ping>("ping")),
            ))
            .gateway(gateway)
            .build()
            .await
    }

    #[tokio::test]
    async fn test_signals_are_served_in_order() {
        let gateway = Arc::new(RecordingGateway::new());
        let runtime = build(declaration(), gateway.clone()).await.unwrap();
        assert_eq!(runtime.connection().api_id, 1);

        let (tx, rx) = mpsc::channel(8);
        tx.send(Signal::text(7, 1, "alice", "start")).await.unwrap();
        tx.send(Signal::button(7, 2, "alice", "PINGPING")).await.unwrap();
        tx.send(Signal::text(7, 3, "eve", "start")).await.unwrap();
        drop(tx);

        runtime
            .run_until(rx, std::future::pending())
            .await
            .unwrap();

        assert_eq!(
            gateway.deliveries(),
            [
                Delivery::Menu {
                    chat_id: 7,
                    title: "ROOT".into(),
                    buttons: vec![("Ping".into(), "PINGPING".into())],
                },
                Delivery::Message(Recipient::Chat(7), "pong".into()),
                Delivery::Message(Recipient::Chat(7), "Access Denied".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_shutdown_future_stops_loop() {
        let gateway = Arc::new(RecordingGateway::new());
        let runtime = build(declaration(), gateway).await.unwrap();
        let (_tx, rx) = mpsc::channel(1);
        runtime.run_until(rx, async {}).await.unwrap();
    }

    #[tokio::test]
    async fn test_undeclared_session_is_fatal() {
        let mut doc = declaration();
        doc["connect"][0]["session"] = json!("other_bot");
        let result = build(doc, Arc::new(RecordingGateway::new())).await;
        assert!(matches!(result, Err(RuntimeError::SessionNotFound(s)) if s == "tg_cmd_bot"));
    }

    #[tokio::test]
    async fn test_violations_block_startup() {
        let mut doc = declaration();
        doc["text_command"][0]["target"] = json!({ "to_plugin": "missing" });
        let result = build(doc, Arc::new(RecordingGateway::new())).await;
        match result {
            Err(RuntimeError::Router(RouterError::IntegrityFailed(v))) => assert_eq!(v.len(), 1),
            _ => panic!("expected integrity failure"),
        }
    }

    #[test]
    fn test_registry_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_from_config(&PluginsConfig {
            dir: dir.path().to_path_buf(),
            builtin: false,
        });
        assert_eq!(registry.len(), 1);
        assert!(registry.list().is_empty());
    }
}
