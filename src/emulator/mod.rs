//! Local function runtime emulation
//!
//! Every Lambda artifact in a normalized build result is backed by one live
//! emulated instance. Rebuilds swap instances atomically: the replacement is
//! created first, published, and only then is the superseded instance torn
//! down - a request dispatched at any point observes either the old or the
//! new instance, never neither.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::build::artifact::Artifact;

/// Memory given to emulated instances.
pub const DEFAULT_MEMORY_MB: u32 = 3008;

/// Opaque reference to a live emulated instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle(pub u64);

/// Everything needed to boot one emulated function instance.
#[derive(Debug, Clone)]
pub struct InstanceSpec {
    pub zip_payload: Bytes,
    pub handler: String,
    pub runtime_id: String,
    pub memory_mb: u32,
    pub environment: HashMap<String, String>,
}

/// The emulated-runtime collaborator: boots and destroys function
/// instances. The engine only ever drives it through the create-then-destroy
/// handoff below.
#[async_trait]
pub trait FunctionRuntime: Send + Sync {
    async fn create_instance(&self, spec: InstanceSpec) -> anyhow::Result<InstanceHandle>;
    async fn destroy_instance(&self, handle: InstanceHandle) -> anyhow::Result<()>;
}

/// Runtime that allocates handles without booting anything. Useful when the
/// dev server only serves static output, and as a test double.
#[derive(Debug, Default)]
pub struct NoopRuntime {
    next_id: AtomicU64,
}

#[async_trait]
impl FunctionRuntime for NoopRuntime {
    async fn create_instance(&self, _spec: InstanceSpec) -> anyhow::Result<InstanceHandle> {
        Ok(InstanceHandle(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    async fn destroy_instance(&self, _handle: InstanceHandle) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Slot identifying one function artifact of one build match.
type SlotKey = (String, String);

/// Keeps the emulated instances in sync with build output.
pub struct RuntimeEmulator {
    runtime: Arc<dyn FunctionRuntime>,
    project_env: HashMap<String, String>,
    override_env: HashMap<String, String>,
    instances: Mutex<HashMap<SlotKey, InstanceHandle>>,
}

impl RuntimeEmulator {
    pub fn new(
        runtime: Arc<dyn FunctionRuntime>,
        project_env: HashMap<String, String>,
        override_env: HashMap<String, String>,
    ) -> Self {
        Self {
            runtime,
            project_env,
            override_env,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Brings the instance registry in line with a successful build: every
    /// Lambda artifact gets a fresh instance, and any superseded instance
    /// for the same slot is destroyed only after the replacement is
    /// published.
    pub async fn sync_lambdas(
        &self,
        source_path: &str,
        output: &HashMap<String, Artifact>,
    ) -> anyhow::Result<()> {
        for (name, artifact) in output {
            let Artifact::Lambda(lambda) = artifact else {
                continue;
            };

            let spec = InstanceSpec {
                zip_payload: lambda.zip_payload.clone(),
                handler: lambda.handler.clone(),
                runtime_id: lambda.runtime_id.clone(),
                memory_mb: DEFAULT_MEMORY_MB,
                environment: self.merged_env(&lambda.environment),
            };
            let replacement = self.runtime.create_instance(spec).await?;

            let superseded = {
                let mut instances = self.instances.lock().expect("instance table poisoned");
                instances.insert(
                    (source_path.to_string(), name.clone()),
                    replacement,
                )
            };
            debug!(
                source = source_path,
                artifact = %name,
                instance = replacement.0,
                "Published emulated instance"
            );

            if let Some(old) = superseded {
                if let Err(err) = self.runtime.destroy_instance(old).await {
                    warn!(
                        source = source_path,
                        artifact = %name,
                        error = %err,
                        "Failed to destroy superseded instance"
                    );
                }
            }
        }
        Ok(())
    }

    /// The live instance for an artifact slot, if any.
    pub fn instance_for(&self, source_path: &str, artifact_name: &str) -> Option<InstanceHandle> {
        self.instances
            .lock()
            .expect("instance table poisoned")
            .get(&(source_path.to_string(), artifact_name.to_string()))
            .copied()
    }

    pub fn live_instances(&self) -> usize {
        self.instances.lock().expect("instance table poisoned").len()
    }

    /// Destroys every instance belonging to a match. Called when the match
    /// is dropped from the registry.
    pub async fn remove_instances_for(&self, source_path: &str) {
        let removed: Vec<(SlotKey, InstanceHandle)> = {
            let mut instances = self.instances.lock().expect("instance table poisoned");
            let keys: Vec<SlotKey> = instances
                .keys()
                .filter(|(source, _)| source == source_path)
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|key| instances.remove(&key).map(|handle| (key, handle)))
                .collect()
        };

        for ((source, artifact), handle) in removed {
            if let Err(err) = self.runtime.destroy_instance(handle).await {
                warn!(source = %source, artifact = %artifact, error = %err, "Failed to destroy instance");
            }
        }
    }

    /// Environment layering: project-level declarations, overlaid by the
    /// artifact's own environment, overlaid by dev-server overrides.
    fn merged_env(&self, artifact_env: &HashMap<String, String>) -> HashMap<String, String> {
        let mut env = self.project_env.clone();
        env.extend(artifact_env.clone());
        env.extend(self.override_env.clone());
        env
    }
}
