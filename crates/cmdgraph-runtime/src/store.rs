//! JSON-file graph storage.
//!
//! [`JsonFileRepository`] keeps the live graph in a [`MemoryRepository`] and
//! mirrors it to a declaration document on disk on every mutation. A change
//! becomes visible in memory only after the document is on disk. The file is
//! written beside its destination and renamed over it, so a crash mid-write
//! leaves the previous document intact.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cmdgraph_core::{Graph, from_declaration_str, to_declaration_string};
use cmdgraph_framework::{GraphView, MemoryRepository, Repository, RepositoryResult};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// A [`Repository`] persisted as one JSON declaration file.
#[derive(Debug)]
pub struct JsonFileRepository {
    path: PathBuf,
    inner: MemoryRepository,
    /// Serializes writers so the file always matches the last mutation.
    writer: Mutex<()>,
}

impl JsonFileRepository {
    /// Opens the store at `path`.
    ///
    /// A missing file yields an empty graph. A file that does not parse as a
    /// declaration is reported as
    /// [`RepositoryError::Corrupt`](cmdgraph_framework::RepositoryError::Corrupt).
    pub async fn open(path: impl Into<PathBuf>) -> RepositoryResult<Self> {
        let path = path.into();
        let inner = match fs::read_to_string(&path).await {
            Ok(text) => {
                let graph = from_declaration_str(&text)?;
                info!(
                    path = %path.display(),
                    menus = graph.menus.len(),
                    buttons = graph.button_count(),
                    "Loaded stored graph"
                );
                MemoryRepository::with_graph(graph)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No stored graph, starting empty");
                MemoryRepository::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            inner,
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, graph: &Graph) -> RepositoryResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, to_declaration_string(graph)).await?;
        fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "Graph persisted");
        Ok(())
    }
}

#[async_trait]
impl Repository for JsonFileRepository {
    async fn replace_all(&self, graph: Graph) -> RepositoryResult<()> {
        let _guard = self.writer.lock().await;
        self.persist(&graph).await?;
        self.inner.replace(graph);
        Ok(())
    }

    async fn view(&self) -> RepositoryResult<Arc<GraphView>> {
        self.inner.view().await
    }

    fn generation(&self) -> u64 {
        self.inner.generation()
    }

    async fn set_auto_subscribed(&self, user_uid: &str, subscribed: bool) -> RepositoryResult<()> {
        let _guard = self.writer.lock().await;
        let graph = self.inner.prepare_subscription(user_uid, subscribed)?;
        self.persist(&graph).await?;
        self.inner.commit_unversioned(graph);
        Ok(())
    }
}
