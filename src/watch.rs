//! File watching with per-pattern subscriptions
//!
//! A [`WatchRegistry`] holds `(patterns, handler)` subscriptions. The watch
//! loop collects debounced change batches; for every batch each subscription
//! with at least one matching path runs exactly once, and the subscriptions
//! of one batch run concurrently.

use crate::build::{DiscoveryError, PatternSet};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::time::Duration;

/// How often the watch loop checks its stop flag.
const STOP_POLL: Duration = Duration::from_millis(250);

/// Error during watch mode
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch {}: {}", .0.display(), .1)]
    WatchPath(PathBuf, #[source] notify::Error),
    /// Channel receive error
    #[error("Watch channel error: {0}")]
    Channel(String),
    /// Invalid subscription pattern
    #[error(transparent)]
    Pattern(#[from] DiscoveryError),
}

/// Callback invoked with the matching changed paths.
pub type WatchHandler = Box<dyn Fn(&[PathBuf]) + Send + Sync>;

/// A single `(patterns, handler)` pair.
pub struct Subscription {
    name: String,
    root: PathBuf,
    /// Canonical form of `root`, for watchers that report resolved paths
    canonical_root: Option<PathBuf>,
    patterns: PatternSet,
    handler: WatchHandler,
}

impl Subscription {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Changed paths under this subscription's root that match its patterns.
    pub fn matching(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        paths
            .iter()
            .filter(|path| {
                let relative = path.strip_prefix(&self.root).ok().or_else(|| {
                    self.canonical_root.as_ref().and_then(|root| path.strip_prefix(root).ok())
                });
                relative.map(|r| self.patterns.matches(r)).unwrap_or(false)
            })
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

/// Registry of watch subscriptions.
#[derive(Debug)]
pub struct WatchRegistry {
    subscriptions: Vec<Subscription>,
    debounce: Duration,
}

impl WatchRegistry {
    pub fn new(debounce: Duration) -> Self {
        Self { subscriptions: Vec::new(), debounce }
    }

    /// Subscribe `handler` to changes below `root` matching `patterns`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        patterns: PatternSet,
        handler: impl Fn(&[PathBuf]) + Send + Sync + 'static,
    ) {
        let root = root.into();
        let canonical_root = root.canonicalize().ok().filter(|c| *c != root);
        self.subscriptions.push(Subscription {
            name: name.into(),
            root,
            canonical_root,
            patterns,
            handler: Box::new(handler),
        });
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Run every subscription matching the batch once, concurrently.
    ///
    /// Returns when all of them have finished, with the names of the
    /// subscriptions that ran in registration order.
    pub fn dispatch(&self, paths: &[PathBuf]) -> Vec<String> {
        let matched: Vec<(&Subscription, Vec<PathBuf>)> = self
            .subscriptions
            .iter()
            .map(|sub| (sub, sub.matching(paths)))
            .filter(|(_, hits)| !hits.is_empty())
            .collect();

        rayon::scope(|scope| {
            for (sub, hits) in &matched {
                scope.spawn(move |_| {
                    tracing::debug!(group = %sub.name, changed = hits.len(), "running");
                    (sub.handler)(hits);
                });
            }
        });

        matched.into_iter().map(|(sub, _)| sub.name.clone()).collect()
    }

    /// Directories the watcher must observe.
    pub fn roots(&self) -> Vec<PathBuf> {
        let roots: BTreeSet<PathBuf> = self.subscriptions.iter().map(|s| s.root.clone()).collect();
        roots.into_iter().collect()
    }

    /// Watch until the process exits.
    pub fn run(&self) -> Result<(), WatchError> {
        self.run_until(&AtomicBool::new(false))
    }

    /// Watch until `stop` is set.
    pub fn run_until(&self, stop: &AtomicBool) -> Result<(), WatchError> {
        let (tx, rx) = channel();
        let mut debouncer = new_debouncer(self.debounce, tx).map_err(WatchError::WatcherInit)?;

        for root in self.roots() {
            if !root.is_dir() {
                tracing::warn!(root = %root.display(), "not watching missing directory");
                continue;
            }
            debouncer
                .watcher()
                .watch(&root, RecursiveMode::Recursive)
                .map_err(|e| WatchError::WatchPath(root.clone(), e))?;
            tracing::info!("Watching {} for changes...", root.display());
        }

        while !stop.load(Ordering::Relaxed) {
            match rx.recv_timeout(STOP_POLL) {
                Ok(Ok(events)) => {
                    let changed: BTreeSet<PathBuf> = events
                        .into_iter()
                        .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                        .map(|e| e.path)
                        .collect();
                    if changed.is_empty() {
                        continue;
                    }
                    for path in &changed {
                        if let Some(name) = path.file_name() {
                            tracing::info!("Changed: {}", name.to_string_lossy());
                        }
                    }

                    let changed: Vec<PathBuf> = changed.into_iter().collect();
                    let ran = self.dispatch(&changed);
                    if !ran.is_empty() {
                        tracing::debug!(groups = ?ran, "batch handled");
                    }
                }
                Ok(Err(error)) => {
                    // Non-fatal; keep watching
                    tracing::warn!("Watch error: {:?}", error);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(WatchError::Channel("watcher disconnected".to_string()));
                }
            }
        }
        Ok(())
    }
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}
