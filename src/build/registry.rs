//! Build match registry
//!
//! Expands build-rule globs into one [`BuildMatch`] per concrete source
//! file. A match owns its scratch directory and worker process exclusively;
//! `source_path` is unique across the registry. `resolve` is idempotent and
//! incremental: matches survive across calls while their file exists, and
//! are disposed (worker killed, scratch directory removed) once the file or
//! rule disappears.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::artifact::{Artifact, BuildResult};
use super::worker::WorkerHandle;
use crate::fs::{GlobSource, IgnoreRules};
use crate::routing::STATIC_BUILDER_ID;

/// A project-level declaration mapping a source glob to a builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRule {
    #[serde(rename = "src")]
    pub source_pattern: String,
    #[serde(rename = "use")]
    pub builder_id: String,
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl BuildRule {
    pub fn new(source_pattern: impl Into<String>, builder_id: impl Into<String>) -> Self {
        Self {
            source_pattern: source_pattern.into(),
            builder_id: builder_id.into(),
            config: Map::new(),
        }
    }

    /// Fallback applied when a project declares no build rules: everything
    /// is served statically.
    pub fn default_rules() -> Vec<BuildRule> {
        vec![BuildRule::new("**", STATIC_BUILDER_ID)]
    }
}

/// Mutable per-match build state. Guarded by the match's mutex, which also
/// serializes builds for the match: a worker process accepts one
/// outstanding request at a time.
#[derive(Debug, Default)]
pub(crate) struct MatchState {
    pub(crate) worker: Option<WorkerHandle>,
    /// Results keyed by the request path that triggered them. Bounded by
    /// distinct request paths; invalidated wholesale on source change.
    pub(crate) output_cache: HashMap<Option<String>, BuildResult>,
    /// Merged snapshot of the most recent builds, published atomically.
    pub(crate) latest_output: Arc<HashMap<String, Artifact>>,
    pub(crate) watch: BTreeSet<String>,
    pub(crate) last_build: Option<DateTime<Utc>>,
}

/// One concrete (rule, file) pairing with its isolated build state.
#[derive(Debug)]
pub struct BuildMatch {
    source_path: String,
    builder_id: String,
    config: Map<String, Value>,
    work_path: PathBuf,
    pub(crate) state: Mutex<MatchState>,
}

impl BuildMatch {
    fn new(source_path: String, rule: &BuildRule, work_path: PathBuf) -> Self {
        Self {
            source_path,
            builder_id: rule.builder_id.clone(),
            config: rule.config.clone(),
            work_path,
            state: Mutex::new(MatchState::default()),
        }
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn builder_id(&self) -> &str {
        &self.builder_id
    }

    pub fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    /// The match's exclusively owned scratch directory. Allocated up front,
    /// created on disk lazily by the first build.
    pub fn work_path(&self) -> &Path {
        &self.work_path
    }

    /// Published artifact snapshot of the most recent successful build.
    pub async fn latest_output(&self) -> Arc<HashMap<String, Artifact>> {
        self.state.lock().await.latest_output.clone()
    }

    pub async fn cached_result(&self, request_path: Option<&str>) -> Option<BuildResult> {
        self.state
            .lock()
            .await
            .output_cache
            .get(&request_path.map(str::to_string))
            .cloned()
    }

    pub async fn last_build(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_build
    }

    /// Drops every cached result. Called when the source or a watched path
    /// changes.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.output_cache.clear();
    }

    /// Whether any of `paths` is the match's source or in its watch set.
    pub async fn watches_any(&self, paths: &[String]) -> bool {
        if paths.iter().any(|p| p == &self.source_path) {
            return true;
        }
        let state = self.state.lock().await;
        paths.iter().any(|p| state.watch.contains(p))
    }
}

/// Registry of all live build matches, keyed by source path.
#[derive(Debug)]
pub struct BuildMatchRegistry {
    work_root: PathBuf,
    matches: RwLock<HashMap<String, Arc<BuildMatch>>>,
}

impl BuildMatchRegistry {
    pub fn new(work_root: PathBuf) -> Self {
        Self {
            work_root,
            matches: RwLock::new(HashMap::new()),
        }
    }

    /// Expands `rules` against the project tree and reconciles the registry
    /// with the outcome: existing matches are reused, new files get fresh
    /// matches, and matches for vanished files are disposed.
    ///
    /// Returns the matches in rule-then-path order.
    pub async fn resolve(
        &self,
        rules: &[BuildRule],
        project_dir: &Path,
        globber: &dyn GlobSource,
        ignore: &dyn IgnoreRules,
    ) -> anyhow::Result<Vec<Arc<BuildMatch>>> {
        let effective: Vec<BuildRule> = if rules.is_empty() {
            BuildRule::default_rules()
        } else {
            rules.to_vec()
        };

        let mut resolved: Vec<Arc<BuildMatch>> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut replaced: Vec<Arc<BuildMatch>> = Vec::new();

        for rule in &effective {
            // A leading slash means "project root", not the filesystem root.
            let pattern = rule
                .source_pattern
                .strip_prefix('/')
                .unwrap_or(&rule.source_pattern);
            let entries = globber.glob(pattern, project_dir)?;

            for source_path in entries.keys() {
                if ignore.is_ignored(source_path) {
                    continue;
                }
                // The first rule matching a file claims it; source paths are
                // unique across the registry.
                if !seen.insert(source_path.clone()) {
                    continue;
                }
                resolved.push(self.reuse_or_create(source_path, rule, &mut replaced));
            }
        }

        let stale = {
            let mut matches = self.matches.write().expect("match table poisoned");
            let stale: Vec<Arc<BuildMatch>> = matches
                .iter()
                .filter(|(path, _)| !seen.contains(path.as_str()))
                .map(|(_, m)| m.clone())
                .collect();
            matches.retain(|path, _| seen.contains(path));
            stale
        };

        for old in stale.into_iter().chain(replaced) {
            dispose(old).await;
        }

        debug!(matches = resolved.len(), "Build match resolution completed");
        Ok(resolved)
    }

    fn reuse_or_create(
        &self,
        source_path: &str,
        rule: &BuildRule,
        replaced: &mut Vec<Arc<BuildMatch>>,
    ) -> Arc<BuildMatch> {
        let mut matches = self.matches.write().expect("match table poisoned");

        if let Some(existing) = matches.get(source_path) {
            if existing.builder_id == rule.builder_id && existing.config == rule.config {
                return existing.clone();
            }
            // The rule changed under the file; the old match's worker and
            // scratch directory belong to the old configuration.
            replaced.push(existing.clone());
        }

        let work_path = self
            .work_root
            .join(uuid::Uuid::new_v4().simple().to_string());
        let created = Arc::new(BuildMatch::new(
            source_path.to_string(),
            rule,
            work_path,
        ));
        debug!(
            source = source_path,
            builder = %rule.builder_id,
            work_path = %created.work_path.display(),
            "Created build match"
        );
        matches.insert(source_path.to_string(), created.clone());
        created
    }

    pub fn get(&self, source_path: &str) -> Option<Arc<BuildMatch>> {
        self.matches
            .read()
            .expect("match table poisoned")
            .get(source_path)
            .cloned()
    }

    /// Source paths of all live matches.
    pub fn source_paths(&self) -> Vec<String> {
        self.matches
            .read()
            .expect("match table poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.matches.read().expect("match table poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears the output cache of every match watching one of `changed`.
    pub async fn invalidate_for_paths(&self, changed: &[String]) {
        let snapshot: Vec<Arc<BuildMatch>> = {
            let matches = self.matches.read().expect("match table poisoned");
            matches.values().cloned().collect()
        };
        for build_match in snapshot {
            if build_match.watches_any(changed).await {
                debug!(source = build_match.source_path(), "Invalidating build cache");
                build_match.invalidate().await;
            }
        }
    }

    /// Disposes every match. Used at dev-server shutdown.
    pub async fn clear(&self) {
        let drained: Vec<Arc<BuildMatch>> = {
            let mut matches = self.matches.write().expect("match table poisoned");
            matches.drain().map(|(_, m)| m).collect()
        };
        for build_match in drained {
            dispose(build_match).await;
        }
    }
}

/// Kills the match's worker and removes its scratch directory.
async fn dispose(build_match: Arc<BuildMatch>) {
    let mut state = build_match.state.lock().await;
    if let Some(worker) = state.worker.take() {
        worker.shutdown().await;
    }
    drop(state);

    match tokio::fs::remove_dir_all(build_match.work_path()).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(
            source = build_match.source_path(),
            error = %err,
            "Failed to remove work directory"
        ),
    }
    debug!(source = build_match.source_path(), "Disposed build match");
}
