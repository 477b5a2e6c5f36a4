//! Route synthesis from the API directory convention
//!
//! Runs at project-load time (or whenever the file set changes) to produce
//! the default route list when a project declares no explicit routing
//! configuration. Candidate files are ordered most-specific-first, checked
//! for conflicts, compiled, and terminated with an API 404 catch-all plus an
//! optional rewrite into the detected static output directory.

use std::cmp::Ordering;
use tracing::debug;

use super::conflict::{check_conflicts, ConflictError};
use super::path::{compile_route, dynamic_segment_count};
use super::rule::{Rule, RouteRule};
use crate::build::registry::BuildRule;

/// Builder id of the plain static-file builder.
pub const STATIC_BUILDER_ID: &str = "static";

/// Catch-all answering unmatched API paths with a 404, so the API directory
/// never falls through to a listing.
const API_CATCH_ALL: &str = "^/api(/.*)?$";

/// Synthesizes the default ordered route list for a project file set.
///
/// `handle_miss` selects the output mode: the legacy flat list, or the
/// miss-handling phase where rules chain with explicit `check`/`continue`
/// semantics. Output is deterministic for a fixed file set and flag value.
pub fn synthesize_routes(
    files: &[String],
    builders: &[BuildRule],
    handle_miss: bool,
) -> Result<Vec<RouteRule>, ConflictError> {
    let mut candidates: Vec<String> = files
        .iter()
        .filter(|file| is_function_candidate(file, builders))
        .cloned()
        .collect();
    candidates.sort_by(|a, b| compare_candidates(a, b));

    let mut routes: Vec<RouteRule> = Vec::new();
    for file in &candidates {
        check_conflicts(file, &candidates)?;
        let compiled = compile_route(file);
        debug!(file = %file, src = %compiled.rule.src, "Compiled API route");
        routes.push(compiled.rule.into());
    }

    let has_api_routes = !routes.is_empty();
    if has_api_routes {
        routes.push(Rule::with_status(API_CATCH_ALL, 404).into());
    }

    if let Some(directory) = detect_output_directory(builders) {
        routes.push(Rule::rewrite("/(.*)", format!("/{}/$1", directory)).into());
    }

    if handle_miss && has_api_routes {
        for route in &mut routes {
            if let RouteRule::Rule(rule) = route {
                if rule.dest.is_some() {
                    rule.is_check = true;
                } else {
                    rule.is_continue = true;
                }
            }
        }
        routes.insert(0, RouteRule::miss());
    }

    debug!(
        candidates = candidates.len(),
        routes = routes.len(),
        handle_miss,
        "Route synthesis completed"
    );
    Ok(routes)
}

/// A file is routed as a function when it lives in the API directory, or
/// when a build rule pins it directly and tags it for function treatment.
fn is_function_candidate(file: &str, builders: &[BuildRule]) -> bool {
    if file.starts_with("api/") {
        return true;
    }
    builders.iter().any(|rule| {
        rule.source_pattern == file && rule.config.get("functions").is_some_and(|v| !v.is_null())
    })
}

/// Deeper paths are evaluated first; at equal depth the more literal path
/// wins, so a literal route shadows a same-depth dynamic sibling. Among
/// equally-dynamic paths, the one whose placeholders appear later (a longer
/// literal prefix) is tried first. The final lexicographic tiebreak keeps
/// the output deterministic.
fn compare_candidates(a: &str, b: &str) -> Ordering {
    let depth_a = a.split('/').count();
    let depth_b = b.split('/').count();

    depth_b
        .cmp(&depth_a)
        .then_with(|| dynamic_segment_count(a).cmp(&dynamic_segment_count(b)))
        .then_with(|| dynamic_positions(b).cmp(&dynamic_positions(a)))
        .then_with(|| a.cmp(b))
}

/// Indices of the bracket segments within a path.
fn dynamic_positions(path: &str) -> Vec<usize> {
    path.split('/')
        .enumerate()
        .filter(|(_, segment)| crate::routing::path::segment_name(segment).is_some())
        .map(|(index, _)| index)
        .collect()
}

/// Detects the static output directory from the builder list: a zero-config
/// static builder whose pattern covers a whole directory tree.
pub fn detect_output_directory(builders: &[BuildRule]) -> Option<String> {
    builders
        .iter()
        .find(|rule| {
            rule.builder_id == STATIC_BUILDER_ID
                && rule.source_pattern.ends_with("/**/*")
                && rule.config.get("zeroConfig").and_then(|v| v.as_bool()) == Some(true)
        })
        .and_then(|rule| rule.source_pattern.strip_suffix("/**/*"))
        .map(str::to_string)
}
