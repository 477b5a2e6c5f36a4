//! dockhand - local build orchestration and route synthesis
//!
//! This library emulates, on a developer's machine, the build/route pipeline
//! a deployment platform runs remotely. It matches project source files to
//! build plugins, supervises isolated worker processes, normalizes their
//! heterogeneous output into a canonical artifact/route model, emulates
//! serverless function execution locally, and synthesizes HTTP routes from
//! the file-system convention of an `api/` directory with bracketed dynamic
//! segments.
//!
//! # Core Concepts
//!
//! - **Build rule**: project configuration mapping a source glob to a
//!   builder id plus its configuration
//! - **Build match**: one concrete (rule, file) pairing owning an isolated
//!   scratch directory and a reusable worker process
//! - **Worker protocol**: newline-delimited JSON on the worker's
//!   stdin/stdout - `ready` once, then one `buildResult` per request
//! - **Artifact**: a build output unit, either a static file or a packaged
//!   function, swapped atomically between builds
//!
//! # Example Usage
//!
//! ```ignore
//! use dockhand::{
//!     BuilderDescriptor, DevEngine, EngineConfig, FsGlob, NoopRuntime,
//!     ProjectIgnore, StaticCatalog, synthesize_routes,
//! };
//! use std::sync::Arc;
//!
//! async fn serve(project_dir: &std::path::Path) -> anyhow::Result<()> {
//!     let mut catalog = StaticCatalog::new();
//!     catalog.register("node", BuilderDescriptor::new("builder-node", "/opt/builders/node"));
//!
//!     let engine = DevEngine::new(
//!         EngineConfig::default(),
//!         Arc::new(catalog),
//!         Arc::new(NoopRuntime::default()),
//!     );
//!
//!     let ignore = ProjectIgnore::load(project_dir)?;
//!     let matches = engine
//!         .resolve_matches(&[], project_dir, &FsGlob, &ignore)
//!         .await?;
//!
//!     for build_match in &matches {
//!         println!("match: {}", build_match.source_path());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Project Structure
//!
//! - [`routing`]: route compilation, conflict detection and synthesis
//! - [`build`]: match registry, worker supervision, output normalization
//! - [`emulator`]: local function-instance lifecycle
//! - [`fs`]: glob/ignore collaborator interfaces and defaults
//! - [`config`]: engine configuration
//! - [`util`]: logging setup

pub mod build;
pub mod config;
pub mod emulator;
pub mod fs;
pub mod routing;
pub mod util;

// Re-export key types for convenient access
pub use build::{
    Artifact, BuildMatch, BuildMatchRegistry, BuildResult, BuildRule, BuilderCatalog,
    BuilderDescriptor, CatalogError, DevEngine, FileRef, LambdaArtifact, NormalizeError,
    StaticCatalog, WorkerError, DEFAULT_MAX_LAMBDA_BYTES,
};
pub use config::{ConfigError, EngineConfig};
pub use emulator::{
    FunctionRuntime, InstanceHandle, InstanceSpec, NoopRuntime, RuntimeEmulator,
};
pub use fs::{FsGlob, GlobSource, IgnoreRules, ProjectIgnore};
pub use routing::{
    compile_route, synthesize_routes, ConflictError, Phase, PhaseMarker, RouteRule, Rule,
};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
