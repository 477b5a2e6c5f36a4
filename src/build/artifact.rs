//! Canonical build output model
//!
//! Workers return heterogeneous, version-tagged output; after normalization
//! everything in the engine speaks in terms of these types.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use crate::routing::RouteRule;

/// Reference to a file on disk, as exchanged with build workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub fs_path: PathBuf,
}

impl FileRef {
    pub fn new(fs_path: impl Into<PathBuf>) -> Self {
        Self {
            fs_path: fs_path.into(),
        }
    }
}

/// An executable function package produced by a build.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaArtifact {
    /// Zipped deployment package. Opaque to the engine.
    pub zip_payload: Bytes,
    /// Entry point inside the package, e.g. `index.handler`.
    pub handler: String,
    /// Identifier of the runtime the package targets, e.g. `nodejs8.10`.
    pub runtime_id: String,
    /// Environment declared by the builder for this function.
    pub environment: HashMap<String, String>,
}

/// One build output unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    StaticFile {
        content_ref: PathBuf,
        content_type: Option<String>,
    },
    Lambda(LambdaArtifact),
}

impl Artifact {
    pub fn is_lambda(&self) -> bool {
        matches!(self, Artifact::Lambda(_))
    }

    pub fn as_lambda(&self) -> Option<&LambdaArtifact> {
        match self {
            Artifact::Lambda(lambda) => Some(lambda),
            Artifact::StaticFile { .. } => None,
        }
    }
}

/// The canonical result of one build request, after normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildResult {
    /// Artifacts keyed by output name (usually a request path).
    pub output: HashMap<String, Artifact>,
    /// Routes contributed by the builder, in evaluation order.
    pub routes: Vec<RouteRule>,
    /// Paths whose changes invalidate this build. Always contains the
    /// build's own entrypoint.
    pub watch: BTreeSet<String>,
}
