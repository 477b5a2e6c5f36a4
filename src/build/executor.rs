//! Build execution engine
//!
//! Ties the registry, worker supervision, output normalization and runtime
//! emulation together: the dev server resolves matches for a request, then
//! asks the engine to build one. A successful build atomically publishes the
//! match's latest output snapshot; a failed build leaves all published state
//! untouched.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::artifact::{BuildResult, FileRef};
use super::catalog::BuilderCatalog;
use super::normalize::{normalize_result, resolve_max_lambda_size};
use super::registry::{BuildMatch, BuildMatchRegistry, BuildRule};
use super::worker::{BuildMeta, BuildParams, WorkerSupervisor};
use crate::config::EngineConfig;
use crate::emulator::{FunctionRuntime, RuntimeEmulator};
use crate::fs::{GlobSource, IgnoreRules};

/// The build orchestration facade used by the dev server.
pub struct DevEngine {
    config: EngineConfig,
    registry: BuildMatchRegistry,
    supervisor: WorkerSupervisor,
    catalog: Arc<dyn BuilderCatalog>,
    emulator: Arc<RuntimeEmulator>,
}

impl DevEngine {
    pub fn new(
        config: EngineConfig,
        catalog: Arc<dyn BuilderCatalog>,
        runtime: Arc<dyn FunctionRuntime>,
    ) -> Self {
        let registry = BuildMatchRegistry::new(config.work_root.clone());
        let supervisor = WorkerSupervisor::new(config.build_env.clone(), config.ready_timeout());
        let emulator = Arc::new(RuntimeEmulator::new(
            runtime,
            config.project_env.clone(),
            config.override_env.clone(),
        ));
        Self {
            config,
            registry,
            supervisor,
            catalog,
            emulator,
        }
    }

    pub fn registry(&self) -> &BuildMatchRegistry {
        &self.registry
    }

    pub fn emulator(&self) -> &Arc<RuntimeEmulator> {
        &self.emulator
    }

    /// Reconciles the match registry with the current project tree and
    /// tears down emulated instances of matches that disappeared.
    pub async fn resolve_matches(
        &self,
        rules: &[BuildRule],
        project_dir: &Path,
        globber: &dyn GlobSource,
        ignore: &dyn IgnoreRules,
    ) -> Result<Vec<Arc<BuildMatch>>> {
        let before = self.registry.source_paths();
        let matches = self
            .registry
            .resolve(rules, project_dir, globber, ignore)
            .await?;

        for source_path in before {
            if self.registry.get(&source_path).is_none() {
                self.emulator.remove_instances_for(&source_path).await;
            }
        }
        Ok(matches)
    }

    /// Runs one build for `build_match` and publishes the result.
    ///
    /// Builds for the same match are serialized by the match's state lock;
    /// builds for different matches proceed concurrently. Worker startup and
    /// protocol failures, as well as an oversized artifact, abort this build
    /// only - the match stays buildable and its published output is
    /// preserved.
    pub async fn execute_build(
        &self,
        build_match: &BuildMatch,
        files: &BTreeMap<String, FileRef>,
        request_path: Option<&str>,
        files_changed: Vec<String>,
        files_removed: Vec<String>,
    ) -> Result<BuildResult> {
        let entrypoint = build_match.source_path();
        let descriptor = self.catalog.resolve(build_match.builder_id())?;

        debug!(
            entrypoint,
            builder = %descriptor.name,
            work_path = %build_match.work_path().display(),
            "Building entrypoint"
        );

        // Serializes builds for this match for the whole request/normalize/
        // publish sequence.
        let mut state = build_match.state.lock().await;

        tokio::fs::create_dir_all(build_match.work_path())
            .await
            .with_context(|| {
                format!(
                    "failed to create work directory {}",
                    build_match.work_path().display()
                )
            })?;

        let params = BuildParams {
            files: files.clone(),
            entrypoint: entrypoint.to_string(),
            work_path: build_match.work_path().to_path_buf(),
            config: build_match.config().clone(),
            meta: BuildMeta {
                is_dev: true,
                request_path: request_path.map(str::to_string),
                files_changed,
                files_removed,
            },
        };

        let raw = self
            .supervisor
            .build(&descriptor, build_match.work_path(), &mut state, params)
            .await?;

        let max_bytes = resolve_max_lambda_size(
            &descriptor.config,
            build_match.config(),
            self.config.max_lambda_bytes,
        );
        let result = normalize_result(raw, descriptor.protocol_version, entrypoint, max_bytes)?;

        self.emulator.sync_lambdas(entrypoint, &result.output).await?;

        // Publish: merge the new artifacts over the previous snapshot and
        // swap it in as one unit.
        let mut latest = (*state.latest_output).clone();
        latest.extend(
            result
                .output
                .iter()
                .map(|(name, artifact)| (name.clone(), artifact.clone())),
        );
        state.latest_output = Arc::new(latest);
        state.watch = result.watch.clone();
        state
            .output_cache
            .insert(request_path.map(str::to_string), result.clone());
        state.last_build = Some(Utc::now());

        info!(
            entrypoint,
            artifacts = result.output.len(),
            routes = result.routes.len(),
            "Build completed"
        );
        Ok(result)
    }

    /// Disposes all matches and emulated instances.
    pub async fn shutdown(&self) {
        for source_path in self.registry.source_paths() {
            self.emulator.remove_instances_for(&source_path).await;
        }
        self.registry.clear().await;
    }
}
