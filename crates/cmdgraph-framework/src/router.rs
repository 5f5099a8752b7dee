//! Signal routing.
//!
//! [`Router::resolve`] turns one inbound [`Signal`] into exactly one
//! [`Reply`]:
//!
//! ```text
//! Signal ──▶ authorize ──▶ look up command ──▶ follow Target ──▶ Reply
//!              │                 │                 ├─ menu   → MENU reply
//!              ▼                 ▼                 └─ plugin → plugin's reply
//!        "Access Denied"  "Command not found"
//! ```
//!
//! # Integrity gate
//!
//! A router only exists for a graph that passed [`check`](crate::validator::check)
//! in its persisted form ([`Router::activate`]). The router remembers the
//! repository generation it validated; once the repository is replaced it
//! refuses every signal until [`Router::reload`] validates the new graph.
//! Each signal is answered from one [`GraphView`], whose generation is the
//! one compared.
//!
//! # Failure policy
//!
//! Expected outcomes (denied, unknown command) are ordinary replies. Plugin
//! failures, configuration defects and storage errors are logged and turned
//! into a generic ERROR reply for that signal only; `resolve` never fails.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cmdgraph_core::{Params, Reply, Signal, SignalKind, Target};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{RouterError, RouterResult};
use crate::plugin::{PluginArgs, PluginRegistry, list_plugins, load_plugin};
use crate::repository::{GraphView, Repository};
use crate::validator::check;

/// User-facing text of the generic failure reply.
pub const INTERNAL_ERROR: &str = "Internal error";

/// Resolves signals against a validated graph.
pub struct Router {
    repository: Arc<dyn Repository>,
    registry: Arc<dyn PluginRegistry>,
    /// Generation that passed the integrity check; `None` when the gate was
    /// skipped.
    validated: Option<AtomicU64>,
    /// Title of the last menu rendered in each chat.
    last_menu: Mutex<HashMap<i64, String>>,
}

/// A matched command, ready to dispatch.
struct Resolved {
    target: Option<Target>,
    params: Params,
    args: Vec<String>,
}

impl Router {
    /// Validates the persisted graph and returns a router serving it.
    ///
    /// # Errors
    ///
    /// [`RouterError::IntegrityFailed`] with every violation when the graph is
    /// not live; [`RouterError::Repository`] when it cannot be read.
    pub async fn activate(
        repository: Arc<dyn Repository>,
        registry: Arc<dyn PluginRegistry>,
    ) -> RouterResult<Self> {
        let generation = validate(repository.as_ref(), &registry).await?;
        Ok(Self {
            repository,
            registry,
            validated: Some(AtomicU64::new(generation)),
            last_menu: Mutex::new(HashMap::new()),
        })
    }

    /// Returns a router that serves whatever the repository holds.
    ///
    /// Targets that do not resolve surface as configuration defects at
    /// request time.
    pub fn new_unchecked(
        repository: Arc<dyn Repository>,
        registry: Arc<dyn PluginRegistry>,
    ) -> Self {
        Self {
            repository,
            registry,
            validated: None,
            last_menu: Mutex::new(HashMap::new()),
        }
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    pub fn registry(&self) -> &Arc<dyn PluginRegistry> {
        &self.registry
    }

    /// Re-runs the integrity gate against the current repository contents and
    /// forgets every chat's last menu.
    ///
    /// On failure the router keeps refusing signals.
    pub async fn reload(&self) -> RouterResult<()> {
        let generation = validate(self.repository.as_ref(), &self.registry).await?;
        if let Some(validated) = &self.validated {
            validated.store(generation, Ordering::SeqCst);
        }
        self.last_menu.lock().clear();
        Ok(())
    }

    /// Title of the menu most recently rendered in `chat_id`.
    pub fn last_menu(&self, chat_id: i64) -> Option<String> {
        self.last_menu.lock().get(&chat_id).cloned()
    }

    /// Resolves one signal.
    pub async fn resolve(&self, signal: &Signal) -> Reply {
        debug!(signal = %signal.summary(), "Resolving signal");

        match self.try_resolve(signal).await {
            Ok(reply) => reply,
            Err(RouterError::Plugin(e)) => {
                error!(
                    user = %signal.user_uid,
                    payload = %signal.payload,
                    error = %e,
                    "Plugin failed"
                );
                Reply::error("Plugin error", [e.to_string()])
            }
            Err(RouterError::ConfigurationDefect(context)) => {
                error!(
                    user = %signal.user_uid,
                    kind = %signal.kind,
                    payload = %signal.payload,
                    chat = signal.chat_id,
                    defect = %context,
                    "Configuration defect"
                );
                Reply::error(INTERNAL_ERROR, [context])
            }
            Err(e) => {
                error!(signal = %signal.summary(), error = %e, "Signal not served");
                Reply::error(INTERNAL_ERROR, [e.to_string()])
            }
        }
    }

    /// The repository's current view, if it is the version this router
    /// validated.
    ///
    /// Everything one caller reads comes from the returned view, so a
    /// replacement landing mid-request cannot mix two graphs.
    ///
    /// # Errors
    ///
    /// [`RouterError::StaleGraph`] once the repository has moved past the
    /// validated generation.
    pub async fn current_view(&self) -> RouterResult<Arc<GraphView>> {
        let view = self.repository.view().await?;
        if let Some(validated) = &self.validated {
            let validated = validated.load(Ordering::SeqCst);
            let current = view.generation();
            if validated != current {
                return Err(RouterError::StaleGraph { validated, current });
            }
        }
        Ok(view)
    }

    async fn try_resolve(&self, signal: &Signal) -> RouterResult<Reply> {
        let view = self.current_view().await?;

        if view.user(&signal.user_uid).is_none() {
            warn!(user = %signal.user_uid, kind = %signal.kind, "Access denied");
            return Ok(Reply::error("Access Denied", [signal.summary()]));
        }

        let Some(resolved) = lookup(&view, signal) else {
            info!(user = %signal.user_uid, payload = %signal.payload, "Command not found");
            return Ok(Reply::error("Command not found", [signal.payload.clone()]));
        };

        match resolved.target {
            None => {
                info!(payload = %signal.payload, "Command has no target");
                Ok(Reply::error("Command has no target", [signal.payload.clone()]))
            }
            Some(Target::ToMenu(title)) => {
                let menu = view.menu(&title).ok_or_else(|| {
                    RouterError::defect(format!(
                        "menu <{title}> referenced by <{}> does not exist",
                        signal.payload
                    ))
                })?;
                let reply = Reply::menu(
                    menu.title.clone(),
                    menu.entries(),
                    signal.kind == SignalKind::Button,
                );
                self.last_menu.lock().insert(signal.chat_id, title);
                Ok(reply)
            }
            Some(Target::ToPlugin(uid)) => {
                let handle = load_plugin(&self.registry, &uid).await.ok_or_else(|| {
                    RouterError::defect(format!(
                        "plugin <{uid}> referenced by <{}> is not registered",
                        signal.payload
                    ))
                })?;
                let reply = handle
                    .invoke(PluginArgs::new(resolved.args, resolved.params))
                    .await?;
                Ok(reply.unwrap_or_else(|| Reply::message(Vec::<String>::new())))
            }
        }
    }
}

/// Finds the command a signal refers to.
fn lookup(view: &GraphView, signal: &Signal) -> Option<Resolved> {
    match signal.kind {
        SignalKind::Text => {
            let mut words = signal.payload.split_whitespace();
            let command = view.text_command(words.next()?)?;
            Some(Resolved {
                target: command.target.clone(),
                params: command.params.clone(),
                args: words.map(str::to_string).collect(),
            })
        }
        SignalKind::Button => view.button(&signal.payload).map(|button| Resolved {
            target: button.target.clone(),
            params: button.params.clone(),
            args: Vec::new(),
        }),
        // Ticks are handled by auto-dispatch, never routed here.
        SignalKind::AutoTick => None,
    }
}

/// Runs the integrity gate, returning the generation that passed.
async fn validate(
    repository: &dyn Repository,
    registry: &Arc<dyn PluginRegistry>,
) -> RouterResult<u64> {
    let view = repository.view().await?;
    let generation = view.generation();
    let graph = view.graph();
    let violations = check(graph, &list_plugins(registry).await);

    if !violations.is_empty() {
        for violation in &violations {
            error!(generation, "{violation}");
        }
        return Err(RouterError::IntegrityFailed(violations));
    }

    info!(
        generation,
        menus = graph.menus.len(),
        buttons = graph.button_count(),
        text_commands = graph.text_commands.len(),
        auto_jobs = graph.auto_jobs.len(),
        "Command graph activated"
    );
    Ok(generation)
}
