//! File-system collaborators
//!
//! The registry consumes two narrow interfaces: a glob expander and an
//! ignore predicate. The default implementations cover the common case - a
//! real project directory with the standard ignore set plus an optional
//! `.devignore` file - while tests and embedders can substitute their own.

use anyhow::{Context, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::collections::BTreeMap;
use std::path::Path;

use crate::build::artifact::FileRef;

/// Name of the optional project-level ignore file.
pub const IGNORE_FILE: &str = ".devignore";

/// Paths that are never treated as project sources.
pub const DEFAULT_IGNORES: &[&str] = &[
    ".hg",
    ".git",
    ".gitmodules",
    ".svn",
    ".cache",
    ".next",
    ".npmignore",
    ".dockerignore",
    ".gitignore",
    ".*.swp",
    ".DS_Store",
    ".wafpickle-*",
    ".lock-wscript",
    ".env",
    ".env.*",
    ".venv",
    "npm-debug.log",
    "config.gypi",
    "node_modules",
    "__pycache__",
    "venv",
    "CVS",
    IGNORE_FILE,
];

/// Predicate deciding whether a project-relative path is excluded from
/// builds.
pub trait IgnoreRules: Send + Sync {
    fn is_ignored(&self, path: &str) -> bool;
}

/// Expands a glob pattern against a base directory, returning
/// project-relative paths mapped to file references.
pub trait GlobSource: Send + Sync {
    fn glob(&self, pattern: &str, base_dir: &Path) -> Result<BTreeMap<String, FileRef>>;
}

/// Ignore rules built from [`DEFAULT_IGNORES`] plus the project's optional
/// [`IGNORE_FILE`]. A missing ignore file means no extra ignores; any other
/// read failure propagates.
pub struct ProjectIgnore {
    matcher: Gitignore,
}

impl ProjectIgnore {
    pub fn load(project_dir: &Path) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(project_dir);
        for pattern in DEFAULT_IGNORES {
            builder
                .add_line(None, pattern)
                .with_context(|| format!("invalid default ignore pattern: {}", pattern))?;
        }

        let ignore_path = project_dir.join(IGNORE_FILE);
        match std::fs::read_to_string(&ignore_path) {
            Ok(contents) => {
                for line in contents.lines() {
                    builder.add_line(None, line).with_context(|| {
                        format!("invalid pattern in {}: {}", IGNORE_FILE, line)
                    })?;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read {}", ignore_path.display()))
            }
        }

        let matcher = builder.build().context("failed to build ignore rules")?;
        Ok(Self { matcher })
    }
}

impl IgnoreRules for ProjectIgnore {
    fn is_ignored(&self, path: &str) -> bool {
        self.matcher
            .matched_path_or_any_parents(path, false)
            .is_ignore()
    }
}

/// Glob expansion over the real file system.
pub struct FsGlob;

impl GlobSource for FsGlob {
    fn glob(&self, pattern: &str, base_dir: &Path) -> Result<BTreeMap<String, FileRef>> {
        let full_pattern = base_dir.join(pattern);
        let full_pattern = full_pattern.to_string_lossy();

        let mut files = BTreeMap::new();
        let paths = glob::glob(&full_pattern)
            .with_context(|| format!("invalid glob pattern: {}", pattern))?;
        for entry in paths {
            let path = entry.context("failed to read glob entry")?;
            if !path.is_file() {
                continue;
            }
            let relative = path
                .strip_prefix(base_dir)
                .context("glob entry escaped the base directory")?
                .to_string_lossy()
                .replace('\\', "/");
            files.insert(relative, FileRef::new(path));
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project_with(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "content").unwrap();
        }
        dir
    }

    #[test]
    fn test_default_ignores() {
        let project = project_with(&["api/a.js"]);
        let rules = ProjectIgnore::load(project.path()).unwrap();

        assert!(rules.is_ignored("node_modules/dep/index.js"));
        assert!(rules.is_ignored(".git/HEAD"));
        assert!(rules.is_ignored(".env"));
        assert!(rules.is_ignored(".env.production"));
        assert!(!rules.is_ignored("api/a.js"));
        assert!(!rules.is_ignored("public/index.html"));
    }

    #[test]
    fn test_project_ignore_file_extends_defaults() {
        let project = project_with(&["api/a.js"]);
        fs::write(project.path().join(IGNORE_FILE), "secret/\n*.tmp\n").unwrap();
        let rules = ProjectIgnore::load(project.path()).unwrap();

        assert!(rules.is_ignored("secret/key.pem"));
        assert!(rules.is_ignored("scratch.tmp"));
        assert!(!rules.is_ignored("api/a.js"));
        // The ignore file itself is never a build input.
        assert!(rules.is_ignored(IGNORE_FILE));
    }

    #[test]
    fn test_missing_ignore_file_is_fine() {
        let project = project_with(&["api/a.js"]);
        assert!(ProjectIgnore::load(project.path()).is_ok());
    }

    #[test]
    fn test_glob_returns_relative_paths() {
        let project = project_with(&["api/a.js", "api/sub/b.js", "other.txt"]);
        let files = FsGlob.glob("api/**/*.js", project.path()).unwrap();

        let keys: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["api/a.js", "api/sub/b.js"]);
        assert!(files["api/a.js"].fs_path.ends_with("api/a.js"));
    }

    #[test]
    fn test_glob_skips_directories() {
        let project = project_with(&["api/sub/b.js"]);
        let files = FsGlob.glob("**", project.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files.contains_key("api/sub/b.js"));
    }
}
