//! Out-of-process plugins discovered from a directory.
//!
//! Every `*.json` file in the plugin directory is a candidate manifest:
//!
//! ```json
//! { "uid": "weather", "command": "./weather.py", "args": ["--metric"], "info": "Current weather" }
//! ```
//!
//! Files that fail to parse or carry no `uid` are skipped without error, so
//! unrelated files may share the directory. The directory is re-scanned on
//! every [`list`](PluginRegistry::list) and [`load`](PluginRegistry::load),
//! which makes new manifests visible without a restart.
//!
//! # Invocation protocol
//!
//! The command is spawned with the manifest's `args`. It receives one JSON
//! object on stdin:
//!
//! ```json
//! { "args": ["word", "word"], "params": { "key": "value" } }
//! ```
//!
//! and prints a [`Reply`] as JSON on stdout, or nothing (or `null`) when it
//! has nothing to say. A non-zero exit status or unparsable output is a
//! [`PluginError`].

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use cmdgraph_core::Reply;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};

use super::{BoxedPlugin, Plugin, PluginArgs, PluginHandle, PluginLoader, PluginRegistry};
use crate::error::{PluginError, PluginResult};

/// Extension of manifest files.
pub const MANIFEST_EXTENSION: &str = "json";

// ─── Manifest ────────────────────────────────────────────────────────────────

/// Description of one external plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub uid: String,
    /// Executable to run. A relative path containing a separator is resolved
    /// against the manifest's directory; a bare name is looked up on `PATH`.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub info: Option<String>,
}

impl PluginManifest {
    /// Reads a manifest, returning `None` for anything that is not one.
    pub fn read(path: &Path) -> Option<Self> {
        let text = fs::read_to_string(path).ok()?;
        match serde_json::from_str::<Self>(&text) {
            Ok(manifest) if !manifest.uid.is_empty() => Some(manifest),
            Ok(_) => None,
            Err(e) => {
                trace!(path = %path.display(), error = %e, "Skipping non-manifest file");
                None
            }
        }
    }

    fn resolve_command(&self, base: &Path) -> PathBuf {
        let command = Path::new(&self.command);
        if command.is_relative() && command.components().count() > 1 {
            base.join(command)
        } else {
            command.to_path_buf()
        }
    }
}

// ─── DirectoryRegistry ───────────────────────────────────────────────────────

/// Registry backed by a directory of plugin manifests.
///
/// Every query reads the directory with blocking I/O. Async code goes
/// through [`load_plugin`](super::load_plugin) and
/// [`list_plugins`](super::list_plugins), which run it on the blocking pool.
#[derive(Debug, Clone)]
pub struct DirectoryRegistry {
    dir: PathBuf,
}

impl DirectoryRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Scans the directory, returning manifests in file-name order.
    ///
    /// A missing or unreadable directory yields nothing.
    pub fn scan(&self) -> Vec<PluginManifest> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.dir.display(), error = %e, "Plugin directory not readable");
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(MANIFEST_EXTENSION)
            })
            .collect();
        paths.sort();

        paths.iter().filter_map(|p| PluginManifest::read(p)).collect()
    }
}

impl PluginRegistry for DirectoryRegistry {
    fn list(&self) -> BTreeSet<String> {
        self.scan().into_iter().map(|m| m.uid).collect()
    }

    fn load(&self, uid: &str) -> Option<PluginHandle> {
        let manifest = self.scan().into_iter().find(|m| m.uid == uid)?;
        let loader = ExternalLoader {
            program: manifest.resolve_command(&self.dir),
            manifest,
        };
        Some(PluginHandle::new(
            loader.manifest.uid.clone(),
            loader.manifest.info.clone(),
            Arc::new(loader),
        ))
    }
}

// ─── External plugin ─────────────────────────────────────────────────────────

struct ExternalLoader {
    manifest: PluginManifest,
    program: PathBuf,
}

impl PluginLoader for ExternalLoader {
    fn instantiate(&self, args: PluginArgs) -> PluginResult<BoxedPlugin> {
        Ok(Box::new(ExternalPlugin {
            uid: self.manifest.uid.clone(),
            program: self.program.clone(),
            command_args: self.manifest.args.clone(),
            input: args,
        }))
    }
}

#[derive(Serialize)]
struct Invocation<'a> {
    args: &'a [String],
    params: &'a cmdgraph_core::Params,
}

struct ExternalPlugin {
    uid: String,
    program: PathBuf,
    command_args: Vec<String>,
    input: PluginArgs,
}

impl ExternalPlugin {
    fn spawn_error(&self, source: io::Error) -> PluginError {
        PluginError::Spawn {
            uid: self.uid.clone(),
            command: self.program.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl Plugin for ExternalPlugin {
    async fn run(&self) -> PluginResult<Option<Reply>> {
        let payload = serde_json::to_vec(&Invocation {
            args: &self.input.args,
            params: &self.input.params,
        })
        .map_err(|e| PluginError::run(&self.uid, e.to_string()))?;

        let mut child = Command::new(&self.program)
            .args(&self.command_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A plugin that ignores its input may exit before reading it.
            match stdin.write_all(&payload).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(self.spawn_error(e)),
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(PluginError::Exit {
                uid: self.uid.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            return Ok(None);
        }

        serde_json::from_str::<Option<Reply>>(stdout).map_err(|source| PluginError::Output {
            uid: self.uid.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_manifest(dir: &Path, file: &str, body: serde_json::Value) {
        fs::write(dir.join(file), body.to_string()).unwrap();
    }

    #[test]
    fn test_scan_skips_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "a.json", json!({ "uid": "alpha", "command": "true" }));
        write_manifest(dir.path(), "b.json", json!({ "command": "true" }));
        write_manifest(dir.path(), "c.json", json!({ "uid": "", "command": "true" }));
        fs::write(dir.path().join("d.json"), "not json").unwrap();
        fs::write(dir.path().join("readme.txt"), "{\"uid\":\"txt\",\"command\":\"x\"}").unwrap();

        let registry = DirectoryRegistry::new(dir.path());
        assert_eq!(registry.list(), BTreeSet::from(["alpha".to_string()]));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DirectoryRegistry::new(dir.path().join("nope"));
        assert!(registry.list().is_empty());
        assert!(registry.load("alpha").is_none());
    }

    #[test]
    fn test_rescan_picks_up_new_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DirectoryRegistry::new(dir.path());
        assert!(!registry.contains("late"));

        write_manifest(
            dir.path(),
            "late.json",
            json!({ "uid": "late", "command": "true", "info": "added later" }),
        );
        assert!(registry.contains("late"));
        assert_eq!(registry.load("late").unwrap().info(), Some("added later"));
    }

    #[test]
    fn test_relative_command_resolves_against_directory() {
        let manifest = PluginManifest {
            uid: "x".into(),
            command: "./bin/x".into(),
            args: vec![],
            info: None,
        };
        assert_eq!(manifest.resolve_command(Path::new("/plugins")), Path::new("/plugins/./bin/x"));

        let bare = PluginManifest {
            command: "python3".into(),
            ..manifest
        };
        assert_eq!(bare.resolve_command(Path::new("/plugins")), Path::new("python3"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_plugin_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        // Echoes the first argument back inside a message reply.
        let script = concat!(
            "input=$(cat); ",
            r#"arg=$(printf '%s' "$input" | sed -n 's/.*"args":\["\([^"]*\)".*/\1/p'); "#,
            r#"printf '{"kind":"message","data":["%s"]}' "$arg""#,
        );
        write_manifest(
            dir.path(),
            "echo.json",
            json!({ "uid": "sh_echo", "command": "sh", "args": ["-c", script] }),
        );

        let handle = DirectoryRegistry::new(dir.path()).load("sh_echo").unwrap();
        let reply = handle
            .invoke(PluginArgs::new(vec!["hello".into()], Default::default()))
            .await
            .unwrap();
        assert_eq!(reply, Some(Reply::message(["hello"])));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_plugin_silence_is_none() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "quiet.json", json!({ "uid": "quiet", "command": "true" }));

        let handle = DirectoryRegistry::new(dir.path()).load("quiet").unwrap();
        assert_eq!(handle.invoke(PluginArgs::default()).await.unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_plugin_failures() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            "fail.json",
            json!({ "uid": "fail", "command": "sh", "args": ["-c", "echo boom >&2; exit 3"] }),
        );
        write_manifest(
            dir.path(),
            "garbage.json",
            json!({ "uid": "garbage", "command": "sh", "args": ["-c", "echo not-a-reply"] }),
        );
        write_manifest(
            dir.path(),
            "absent.json",
            json!({ "uid": "absent", "command": "./does-not-exist" }),
        );
        let registry = DirectoryRegistry::new(dir.path());

        let err = registry
            .load("fail")
            .unwrap()
            .invoke(PluginArgs::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::Exit { ref stderr, .. } if stderr == "boom"));

        let err = registry
            .load("garbage")
            .unwrap()
            .invoke(PluginArgs::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::Output { .. }));

        let err = registry
            .load("absent")
            .unwrap()
            .invoke(PluginArgs::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::Spawn { .. }));
    }
}
