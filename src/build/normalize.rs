//! Worker output normalization
//!
//! Raw worker responses are version-tagged: builders predating the versioned
//! protocol return a bare artifact map, newer ones a full result object.
//! Normalization resolves that split once, re-materializes Lambda payloads
//! from their transport encoding, cleans up watch paths, and enforces the
//! artifact size ceiling. Nothing downstream ever sees a raw response.

use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use thiserror::Error;

use super::artifact::{Artifact, BuildResult, LambdaArtifact};
use crate::routing::RouteRule;

/// Default ceiling for a Lambda zip payload.
pub const DEFAULT_MAX_LAMBDA_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum NormalizeError {
    /// A Lambda payload exceeded the configured ceiling. The build is
    /// aborted; previously published output stays untouched.
    #[error(
        "the function \"{name}\" is {actual} bytes which exceeds the \
         configured limit of {limit} bytes"
    )]
    ArtifactTooLarge {
        name: String,
        actual: usize,
        limit: usize,
    },

    #[error("malformed builder output: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct WireResult {
    output: HashMap<String, WireArtifact>,
    #[serde(default)]
    routes: Vec<RouteRule>,
    #[serde(default)]
    watch: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireArtifact {
    Lambda(WireLambda),
    FileFsRef(WireFsRef),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireLambda {
    zip_buffer: WireBuffer,
    handler: String,
    runtime: String,
    #[serde(default)]
    environment: HashMap<String, String>,
}

/// Serialized form of a binary payload (`{"type":"Buffer","data":[...]}`).
#[derive(Debug, Deserialize)]
struct WireBuffer {
    #[serde(default)]
    data: Vec<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFsRef {
    fs_path: PathBuf,
    #[serde(default)]
    content_type: Option<String>,
}

impl From<WireArtifact> for Artifact {
    fn from(wire: WireArtifact) -> Self {
        match wire {
            WireArtifact::Lambda(lambda) => Artifact::Lambda(LambdaArtifact {
                zip_payload: Bytes::from(lambda.zip_buffer.data),
                handler: lambda.handler,
                runtime_id: lambda.runtime,
                environment: lambda.environment,
            }),
            WireArtifact::FileFsRef(file) => Artifact::StaticFile {
                content_ref: file.fs_path,
                content_type: file.content_type,
            },
        }
    }
}

/// Canonicalizes a raw worker response.
///
/// `protocol_version` is the builder's declared version: `None` means the
/// response is a bare output map and gets wrapped with empty routes/watch.
/// The entrypoint is always added to the watch set - a build's invalidation
/// set must never be narrower than its own input.
pub fn normalize_result(
    raw: Value,
    protocol_version: Option<u32>,
    entrypoint: &str,
    max_lambda_bytes: usize,
) -> Result<BuildResult, NormalizeError> {
    let wire: WireResult = if protocol_version.is_none() {
        WireResult {
            output: serde_json::from_value(raw)?,
            routes: Vec::new(),
            watch: Vec::new(),
        }
    } else {
        serde_json::from_value(raw)?
    };

    let output: HashMap<String, Artifact> = wire
        .output
        .into_iter()
        .map(|(name, artifact)| (name, Artifact::from(artifact)))
        .collect();

    for (name, artifact) in &output {
        if let Artifact::Lambda(lambda) = artifact {
            let actual = lambda.zip_payload.len();
            if actual > max_lambda_bytes {
                return Err(NormalizeError::ArtifactTooLarge {
                    name: name.clone(),
                    actual,
                    limit: max_lambda_bytes,
                });
            }
        }
    }

    let mut watch: BTreeSet<String> = wire
        .watch
        .into_iter()
        .map(|path| match path.strip_prefix("./") {
            Some(stripped) => stripped.to_string(),
            None => path,
        })
        .collect();
    watch.insert(entrypoint.to_string());

    Ok(BuildResult {
        output,
        routes: wire.routes,
        watch,
    })
}

/// Resolves the Lambda size ceiling from the builder's declared config
/// overlaid with the match config. Accepts a byte count or a string such as
/// `"5mb"`; anything unparseable falls back to the engine default.
pub fn resolve_max_lambda_size(
    builder_config: &Map<String, Value>,
    match_config: &Map<String, Value>,
    default_bytes: usize,
) -> usize {
    match_config
        .get("maxLambdaSize")
        .or_else(|| builder_config.get("maxLambdaSize"))
        .and_then(parse_size)
        .unwrap_or(default_bytes)
}

/// Parses a size given as a plain byte count or a `"<n><unit>"` string with
/// `b`, `kb`, `mb` or `gb` suffix.
fn parse_size(value: &Value) -> Option<usize> {
    match value {
        Value::Number(number) => number.as_u64().map(|n| n as usize),
        Value::String(text) => {
            let text = text.trim().to_lowercase();
            let digits_end = text
                .find(|c: char| !c.is_ascii_digit() && c != '.')
                .unwrap_or(text.len());
            let amount: f64 = text[..digits_end].parse().ok()?;
            let multiplier: f64 = match text[digits_end..].trim() {
                "" | "b" => 1.0,
                "kb" => 1024.0,
                "mb" => 1024.0 * 1024.0,
                "gb" => 1024.0 * 1024.0 * 1024.0,
                _ => return None,
            };
            Some((amount * multiplier) as usize)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lambda_value(payload: &[u8]) -> Value {
        json!({
            "type": "Lambda",
            "zipBuffer": { "type": "Buffer", "data": payload },
            "handler": "index.handler",
            "runtime": "nodejs8.10",
            "environment": { "STAGE": "dev" }
        })
    }

    #[test]
    fn test_v1_output_map_is_wrapped() {
        let raw = json!({ "api/user.js": lambda_value(b"PK\x03\x04") });
        let result = normalize_result(raw, None, "api/user.js", DEFAULT_MAX_LAMBDA_BYTES).unwrap();

        assert!(result.routes.is_empty());
        assert_eq!(result.watch.len(), 1);
        let lambda = result.output["api/user.js"].as_lambda().unwrap();
        assert_eq!(lambda.zip_payload.as_ref(), b"PK\x03\x04");
        assert_eq!(lambda.environment["STAGE"], "dev");
    }

    #[test]
    fn test_versioned_result_passes_through() {
        let raw = json!({
            "output": { "index.html": { "type": "FileFsRef", "fsPath": "/work/index.html", "contentType": "text/html" } },
            "routes": [{ "src": "^/old$", "dest": "/index.html" }],
            "watch": ["./src/index.html"]
        });
        let result = normalize_result(raw, Some(2), "src/index.html", DEFAULT_MAX_LAMBDA_BYTES).unwrap();

        assert_eq!(result.routes.len(), 1);
        match &result.output["index.html"] {
            Artifact::StaticFile {
                content_ref,
                content_type,
            } => {
                assert_eq!(content_ref, &PathBuf::from("/work/index.html"));
                assert_eq!(content_type.as_deref(), Some("text/html"));
            }
            other => panic!("expected static file, got {:?}", other),
        }
    }

    #[test]
    fn test_watch_paths_are_normalized() {
        let raw = json!({
            "output": {},
            "watch": ["./foo.js", "bar.js"]
        });
        let result = normalize_result(raw, Some(2), "api/entry.js", DEFAULT_MAX_LAMBDA_BYTES).unwrap();

        assert!(result.watch.contains("foo.js"));
        assert!(result.watch.contains("bar.js"));
        // The entrypoint is present even though the builder omitted it.
        assert!(result.watch.contains("api/entry.js"));
        assert!(!result.watch.iter().any(|w| w.starts_with("./")));
    }

    #[test]
    fn test_oversized_lambda_is_rejected() {
        let payload = vec![0u8; 64];
        let raw = json!({ "api/big.js": lambda_value(&payload) });
        let err = normalize_result(raw, None, "api/big.js", 32).unwrap_err();

        match err {
            NormalizeError::ArtifactTooLarge {
                name,
                actual,
                limit,
            } => {
                assert_eq!(name, "api/big.js");
                assert_eq!(actual, 64);
                assert_eq!(limit, 32);
            }
            other => panic!("expected size error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_artifact_type_is_malformed() {
        let raw = json!({ "thing": { "type": "FileBlob", "data": "..." } });
        let err = normalize_result(raw, None, "thing", DEFAULT_MAX_LAMBDA_BYTES).unwrap_err();
        assert!(matches!(err, NormalizeError::Malformed(_)));
    }

    #[test]
    fn test_resolve_max_lambda_size() {
        let empty = Map::new();
        assert_eq!(
            resolve_max_lambda_size(&empty, &empty, DEFAULT_MAX_LAMBDA_BYTES),
            DEFAULT_MAX_LAMBDA_BYTES
        );

        let mut builder = Map::new();
        builder.insert("maxLambdaSize".to_string(), json!("1mb"));
        assert_eq!(
            resolve_max_lambda_size(&builder, &empty, DEFAULT_MAX_LAMBDA_BYTES),
            1024 * 1024
        );

        // The match config wins over the builder's declared default.
        let mut match_config = Map::new();
        match_config.insert("maxLambdaSize".to_string(), json!(2048));
        assert_eq!(
            resolve_max_lambda_size(&builder, &match_config, DEFAULT_MAX_LAMBDA_BYTES),
            2048
        );
    }

    #[test]
    fn test_parse_size_strings() {
        assert_eq!(parse_size(&json!("512")), Some(512));
        assert_eq!(parse_size(&json!("4kb")), Some(4096));
        assert_eq!(parse_size(&json!("5mb")), Some(5 * 1024 * 1024));
        assert_eq!(parse_size(&json!("1.5kb")), Some(1536));
        assert_eq!(parse_size(&json!("many")), None);
        assert_eq!(parse_size(&json!(true)), None);
    }
}
