//! Conflict detection for API route candidates
//!
//! Two fatal checks run before any route is compiled: a placeholder name may
//! not repeat within one path, and no two files may resolve to the same
//! request path once placeholders are substituted. Either finding aborts
//! synthesis for the whole file set.

use std::collections::HashSet;
use thiserror::Error;

use super::path::{segment_name, split_extension};

/// Route synthesis error. Carries the machine-readable code expected by
/// callers alongside the human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    #[error(
        "The segment \"{segment}\" occurs more than one time in your path \
         \"{path}\". Please make sure that every segment in a path is unique"
    )]
    ConflictingPathSegment { segment: String, path: String },

    #[error(
        "Two or more files have conflicting paths or names. Please make sure \
         path segments and filenames, without their extension, are unique. \
         The path \"{path}\" has conflicts with {others}"
    )]
    ConflictingFilePath { path: String, others: String },
}

impl ConflictError {
    /// Stable error code for structured reporting.
    pub fn code(&self) -> &'static str {
        match self {
            ConflictError::ConflictingPathSegment { .. } => "conflicting_path_segment",
            ConflictError::ConflictingFilePath { .. } => "conflicting_file_path",
        }
    }
}

/// Runs both conflict checks for `file_path` against the full candidate set.
pub fn check_conflicts(file_path: &str, files: &[String]) -> Result<(), ConflictError> {
    if let Some(segment) = conflicting_segment(file_path) {
        return Err(ConflictError::ConflictingPathSegment {
            segment: segment.to_string(),
            path: file_path.to_string(),
        });
    }

    let occurrences = path_occurrences(file_path, files);
    if !occurrences.is_empty() {
        let quoted: Vec<String> = occurrences
            .iter()
            .map(|name| format!("\"{}\"", name))
            .collect();
        return Err(ConflictError::ConflictingFilePath {
            path: file_path.to_string(),
            others: concat_prose(quoted),
        });
    }

    Ok(())
}

/// Returns the first placeholder name used more than once in `file_path`.
fn conflicting_segment(file_path: &str) -> Option<&str> {
    let mut seen = HashSet::new();
    for segment in file_path.split('/') {
        if let Some(name) = segment_name(segment) {
            if !seen.insert(name) {
                return Some(name);
            }
        }
    }
    None
}

/// Collects every other file that either resolves to the same literal path
/// as `file_path` or partially matches it.
fn path_occurrences(file_path: &str, files: &[String]) -> Vec<String> {
    let current = resolved_path(file_path);

    files
        .iter()
        .filter(|file| file.as_str() != file_path)
        .filter(|file| resolved_path(file) == current || partially_matches(file_path, file))
        .cloned()
        .collect()
}

/// Substitutes every placeholder with a fixed literal and strips the file
/// extension, yielding the request path the file would answer.
fn resolved_path(file_path: &str) -> String {
    let (dir, file) = match file_path.rsplit_once('/') {
        Some((dir, file)) => (dir, file),
        None => ("", file_path),
    };
    let (stem, _) = split_extension(file);
    let joined = if dir.is_empty() {
        stem.to_string()
    } else {
        format!("{}/{}", dir, stem)
    };

    joined
        .split('/')
        .map(substitute_placeholder)
        .collect::<Vec<_>>()
        .join("/")
}

/// Replaces the bracketed span of a segment with the literal `1`
/// (`x[id]y` → `x1y`, `[id]` → `1`).
fn substitute_placeholder(segment: &str) -> String {
    match (segment.find('['), segment.rfind(']')) {
        (Some(open), Some(close)) if close > open => {
            format!("{}1{}", &segment[..open], &segment[close + 1..])
        }
        _ => segment.to_string(),
    }
}

/// Walks the shorter path against the longer one segment by segment. The
/// paths partially match when every compared segment agrees (literally or by
/// placeholder name) until two placeholders with different names meet - the
/// same request could then route to either file depending on resolution
/// order. A literal meeting a placeholder is not a partial match; ordering
/// resolves that case (the more literal path shadows the dynamic one).
fn partially_matches(path_a: &str, path_b: &str) -> bool {
    let parts_a: Vec<&str> = path_a.split('/').collect();
    let parts_b: Vec<&str> = path_b.split('/').collect();

    let (long, short) = if parts_a.len() > parts_b.len() {
        (&parts_a, &parts_b)
    } else {
        (&parts_b, &parts_a)
    };

    for (index, segment_short) in short.iter().enumerate() {
        let segment_long = long[index];
        let name_long = segment_name(segment_long);
        let name_short = segment_name(segment_short);

        if segment_short != &segment_long && (name_long.is_none() || name_short.is_none()) {
            return false;
        }

        if name_long != name_short {
            return true;
        }
    }

    false
}

/// Joins items into readable prose: `a`, `a and b`, `a, b, and c`.
fn concat_prose(mut texts: Vec<String>) -> String {
    if texts.len() <= 2 {
        return texts.join(" and ");
    }

    let last = texts.pop().unwrap_or_default();
    format!("{}, and {}", texts.join(", "), last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_no_brackets_no_conflicts() {
        let set = files(&["api/a.js", "api/b.js", "api/a/c.js"]);
        for file in &set {
            assert!(check_conflicts(file, &set).is_ok());
        }
    }

    #[test]
    fn test_duplicate_placeholder_in_one_path() {
        let set = files(&["api/[id]/[id].js"]);
        let err = check_conflicts("api/[id]/[id].js", &set).unwrap_err();
        assert_eq!(err.code(), "conflicting_path_segment");
        assert!(err.to_string().contains("\"id\""));
    }

    #[test]
    fn test_same_position_different_names_conflict() {
        let set = files(&["api/[id].js", "api/[slug].js"]);
        let err = check_conflicts("api/[id].js", &set).unwrap_err();
        assert_eq!(err.code(), "conflicting_file_path");
        assert!(err.to_string().contains("api/[slug].js"));
    }

    #[test]
    fn test_dynamic_file_and_index_do_not_conflict() {
        // `a/[id].js` and `a/[id]/index.js` share a name at the same
        // position, which is compatible.
        let set = files(&["api/a/[id].js", "api/a/[id]/index.js"]);
        assert!(check_conflicts("api/a/[id].js", &set).is_ok());
        assert!(check_conflicts("api/a/[id]/index.js", &set).is_ok());
    }

    #[test]
    fn test_literal_and_dynamic_sibling_do_not_conflict() {
        let set = files(&["api/a/b.js", "api/a/[x].js", "api/[y]/b.js"]);
        for file in &set {
            assert!(check_conflicts(file, &set).is_ok(), "{} conflicted", file);
        }
    }

    #[test]
    fn test_mismatched_names_across_depths_conflict() {
        let set = files(&["api/[id].js", "api/[slug]/b.js"]);
        let err = check_conflicts("api/[id].js", &set).unwrap_err();
        assert_eq!(err.code(), "conflicting_file_path");
    }

    #[test]
    fn test_same_stem_different_extension_conflicts() {
        let set = files(&["api/user.js", "api/user.go"]);
        let err = check_conflicts("api/user.js", &set).unwrap_err();
        assert_eq!(err.code(), "conflicting_file_path");
    }

    #[test]
    fn test_resolved_path_substitution() {
        assert_eq!(resolved_path("api/[id].js"), "api/1");
        assert_eq!(resolved_path("api/x[id]y/b.js"), "api/x1y/b");
        assert_eq!(resolved_path("api/a/b.js"), "api/a/b");
    }

    #[test]
    fn test_prose_concatenation() {
        assert_eq!(concat_prose(vec!["a".into()]), "a");
        assert_eq!(concat_prose(vec!["a".into(), "b".into()]), "a and b");
        assert_eq!(
            concat_prose(vec!["a".into(), "b".into(), "c".into()]),
            "a, b, and c"
        );
    }
}
