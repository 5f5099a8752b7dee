//! Graph storage.
//!
//! The router never reads the declaration directly; it asks a [`Repository`]
//! for a [`GraphView`], one immutable version of the graph with lookup
//! indexes, and answers a whole signal from that view. The repository
//! replaces the whole graph at once, and a view never changes after it was
//! handed out.
//!
//! [`MemoryRepository`] keeps the current view behind a single lock and
//! swaps it atomically. Durable stores wrap it and persist before they swap.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cmdgraph_core::{
    AutoJob, Button, Connection, Graph, Menu, TextCommand, User, normalize_command,
};
use parking_lot::RwLock;

use crate::error::{RepositoryError, RepositoryResult};

// ─── GraphView ───────────────────────────────────────────────────────────────

/// One version of the stored graph together with lookup indexes into it.
#[derive(Debug, Default)]
pub struct GraphView {
    generation: u64,
    graph: Arc<Graph>,
    connections: HashMap<String, usize>,
    users: HashMap<String, usize>,
    menus: HashMap<String, usize>,
    commands: HashMap<String, usize>,
    /// token → (menu index, button index); the first holder of a token wins.
    buttons: HashMap<String, (usize, usize)>,
}

impl GraphView {
    /// Indexes `graph` as version `generation`.
    pub fn new(graph: Graph, generation: u64) -> Self {
        fn index<T>(items: &[T], key: impl Fn(&T) -> &str) -> HashMap<String, usize> {
            let mut map = HashMap::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                map.entry(key(item).to_string()).or_insert(i);
            }
            map
        }

        let mut buttons = HashMap::with_capacity(graph.button_count());
        for (m, menu) in graph.menus.iter().enumerate() {
            for (b, button) in menu.buttons.iter().enumerate() {
                buttons.entry(button.token.clone()).or_insert((m, b));
            }
        }

        Self {
            generation,
            connections: index(&graph.connections, |c| c.session.as_str()),
            users: index(&graph.users, |u| u.user_uid.as_str()),
            menus: index(&graph.menus, |m| m.title.as_str()),
            commands: index(&graph.text_commands, |c| c.text.as_str()),
            buttons,
            graph: Arc::new(graph),
        }
    }

    /// Counter bumped by every [`Repository::replace_all`].
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn connection(&self, session: &str) -> Option<&Connection> {
        self.connections
            .get(session)
            .map(|&i| &self.graph.connections[i])
    }

    pub fn user(&self, user_uid: &str) -> Option<&User> {
        self.users.get(user_uid).map(|&i| &self.graph.users[i])
    }

    pub fn menu(&self, title: &str) -> Option<&Menu> {
        self.menus.get(title).map(|&i| &self.graph.menus[i])
    }

    /// Looks a command up by word; the word is normalized first.
    pub fn text_command(&self, text: &str) -> Option<&TextCommand> {
        self.commands
            .get(&normalize_command(text))
            .map(|&i| &self.graph.text_commands[i])
    }

    /// Looks a button up by exact token.
    pub fn button(&self, token: &str) -> Option<&Button> {
        self.buttons
            .get(token)
            .map(|&(m, b)| &self.graph.menus[m].buttons[b])
    }

    pub fn auto_jobs(&self) -> &[AutoJob] {
        &self.graph.auto_jobs
    }

    /// Uids of users with `auto_subscribed` set, in declaration order.
    pub fn auto_subscribed_users(&self) -> Vec<String> {
        self.graph
            .users
            .iter()
            .filter(|u| u.auto_subscribed)
            .map(|u| u.user_uid.clone())
            .collect()
    }

    /// The same version with `user_uid`'s subscription flag changed.
    fn with_subscription(&self, user_uid: &str, subscribed: bool) -> RepositoryResult<Graph> {
        let &i = self
            .users
            .get(user_uid)
            .ok_or_else(|| RepositoryError::not_found("user", user_uid))?;
        let mut graph = (*self.graph).clone();
        graph.users[i].auto_subscribed = subscribed;
        Ok(graph)
    }
}

// ─── Repository trait ────────────────────────────────────────────────────────

/// Durable store of one command graph.
///
/// Point lookups each read the current view; callers that need several
/// answers from the same version take one [`view`](Self::view) instead.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Replaces the stored graph as a unit and bumps the generation.
    async fn replace_all(&self, graph: Graph) -> RepositoryResult<()>;

    /// The current version of the graph.
    async fn view(&self) -> RepositoryResult<Arc<GraphView>>;

    /// Generation of the current view.
    fn generation(&self) -> u64;

    /// Sets a user's subscription flag. Does not change the generation.
    async fn set_auto_subscribed(&self, user_uid: &str, subscribed: bool) -> RepositoryResult<()>;

    /// The stored graph as one value.
    async fn snapshot(&self) -> RepositoryResult<Arc<Graph>> {
        Ok(self.view().await?.graph().clone())
    }

    async fn get_connection(&self, session: &str) -> RepositoryResult<Connection> {
        self.view()
            .await?
            .connection(session)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found("connection", session))
    }

    async fn get_user(&self, user_uid: &str) -> RepositoryResult<Option<User>> {
        Ok(self.view().await?.user(user_uid).cloned())
    }

    async fn get_menu(&self, title: &str) -> RepositoryResult<Option<Menu>> {
        Ok(self.view().await?.menu(title).cloned())
    }

    async fn get_text_command(&self, text: &str) -> RepositoryResult<Option<TextCommand>> {
        Ok(self.view().await?.text_command(text).cloned())
    }

    async fn get_button(&self, token: &str) -> RepositoryResult<Option<Button>> {
        Ok(self.view().await?.button(token).cloned())
    }

    async fn list_auto_jobs(&self) -> RepositoryResult<Vec<AutoJob>> {
        Ok(self.view().await?.auto_jobs().to_vec())
    }

    async fn list_auto_subscribed_users(&self) -> RepositoryResult<Vec<String>> {
        Ok(self.view().await?.auto_subscribed_users())
    }
}

// ─── MemoryRepository ────────────────────────────────────────────────────────

/// In-memory [`Repository`].
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<Arc<GraphView>>,
}

impl MemoryRepository {
    /// Creates an empty repository at generation 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository holding `graph` at generation 1.
    pub fn with_graph(graph: Graph) -> Self {
        Self {
            state: RwLock::new(Arc::new(GraphView::new(graph, 1))),
        }
    }

    pub fn current(&self) -> Arc<GraphView> {
        self.state.read().clone()
    }

    /// Swaps in a new graph and bumps the generation.
    pub fn replace(&self, graph: Graph) {
        let mut state = self.state.write();
        *state = Arc::new(GraphView::new(graph, state.generation + 1));
    }

    /// Builds the graph that setting `user_uid`'s flag would produce,
    /// without committing it.
    pub fn prepare_subscription(
        &self,
        user_uid: &str,
        subscribed: bool,
    ) -> RepositoryResult<Graph> {
        self.current().with_subscription(user_uid, subscribed)
    }

    /// Swaps in `graph` at the current generation.
    ///
    /// Used to commit a graph from [`prepare_subscription`](Self::prepare_subscription)
    /// once it has been made durable.
    pub fn commit_unversioned(&self, graph: Graph) {
        let mut state = self.state.write();
        *state = Arc::new(GraphView::new(graph, state.generation));
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn replace_all(&self, graph: Graph) -> RepositoryResult<()> {
        self.replace(graph);
        Ok(())
    }

    async fn view(&self) -> RepositoryResult<Arc<GraphView>> {
        Ok(self.current())
    }

    fn generation(&self) -> u64 {
        self.state.read().generation
    }

    async fn set_auto_subscribed(&self, user_uid: &str, subscribed: bool) -> RepositoryResult<()> {
        let mut state = self.state.write();
        let graph = state.with_subscription(user_uid, subscribed)?;
        *state = Arc::new(GraphView::new(graph, state.generation));
        Ok(())
    }
}
