//! Path tokenizer and route compiler
//!
//! Turns a project-relative file path following the API directory convention
//! (bracketed segments such as `api/user/[id].js` mark dynamic captures) into
//! an anchored regex rule plus the query-string bindings for every capture.

use super::rule::Rule;

/// Characters that carry meaning inside a regex and must be escaped when a
/// path segment is used literally.
const SPECIAL: &[char] = &['[', ']', '^', '$', '.', '|', '?', '*', '+', '(', ')'];

/// A compiled route for a single source file.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRoute {
    pub rule: Rule,
    /// True when the path contains at least one bracket segment.
    pub is_dynamic: bool,
}

/// Splits a path segment into its stem and extension, mirroring how the
/// routing convention strips extensions (`index.js` → `("index", ".js")`,
/// `[id]` → `("[id]", "")`, `.env` → `(".env", "")`).
pub(crate) fn split_extension(segment: &str) -> (&str, &str) {
    match segment.rfind('.') {
        Some(0) | None => (segment, ""),
        Some(idx) => (&segment[..idx], &segment[idx..]),
    }
}

/// Returns the capture name of a bracket segment, with any extension
/// stripped first. `[id].js` and `[id]` both yield `Some("id")`; a literal
/// segment yields `None`.
pub(crate) fn segment_name(segment: &str) -> Option<&str> {
    let (stem, _) = split_extension(segment);
    if stem.len() >= 2 && stem.starts_with('[') && stem.ends_with(']') {
        Some(&stem[1..stem.len() - 1])
    } else {
        None
    }
}

/// Escapes regex metacharacters so the name matches only itself.
pub(crate) fn escape_segment(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for ch in name.chars() {
        if SPECIAL.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Number of bracket segments in a path.
pub(crate) fn dynamic_segment_count(file_path: &str) -> usize {
    file_path
        .split('/')
        .filter(|segment| segment_name(segment).is_some())
        .count()
}

/// Compiles a source file path into an anchored route rule.
///
/// Every non-final bracket segment becomes a `([^/]+)` capture bound to an
/// ordered `name=$n` query parameter. The final segment matches the file with
/// or without its extension; an `index` file additionally matches its parent
/// directory with or without a trailing slash, so `a/index.js` answers both
/// `/a` and `/a/`. The destination is the literal source path plus the query
/// string assembled from the captures.
pub fn compile_route(file_path: &str) -> CompiledRoute {
    let parts: Vec<&str> = file_path.split('/').collect();
    let last_index = parts.len() - 1;

    let mut query: Vec<String> = Vec::new();
    let mut counter = 1;
    let mut is_dynamic = false;

    let src_parts: Vec<String> = parts
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            if let Some(name) = segment_name(segment) {
                query.push(format!("{}=${}", name, counter));
                counter += 1;
                is_dynamic = true;
                "([^/]+)".to_string()
            } else if i == last_index {
                compile_final_segment(segment)
            } else {
                escape_segment(segment)
            }
        })
        .collect();

    let (last_stem, _) = split_extension(parts[last_index]);
    let src = if last_stem == "index" {
        // The optional-suffix alternation already carries its own leading
        // slash, so the parent path joins onto it directly.
        format!(
            "^/{}{}$",
            src_parts[..last_index].join("/"),
            src_parts[last_index]
        )
    } else {
        format!("^/{}$", src_parts.join("/"))
    };

    let dest = if query.is_empty() {
        format!("/{}", file_path)
    } else {
        format!("/{}?{}", file_path, query.join("&"))
    };

    CompiledRoute {
        rule: Rule::rewrite(src, dest),
        is_dynamic,
    }
}

/// The final segment accepts the filename with or without its extension,
/// or - for `index` files - nothing at all.
fn compile_final_segment(segment: &str) -> String {
    let (stem, ext) = split_extension(segment);
    let is_index = stem == "index";
    let prefix = if is_index { "\\/" } else { "" };
    let stem = escape_segment(stem);
    let ext = escape_segment(ext);

    let first = if is_index {
        prefix.to_string()
    } else {
        format!("{}\\/", stem)
    };
    let names = [
        first,
        format!("{}{}", prefix, stem),
        format!("{}{}{}", prefix, stem, ext),
    ];

    format!(
        "({}){}",
        names.join("|"),
        if is_index { "?" } else { "" }
    )
}
