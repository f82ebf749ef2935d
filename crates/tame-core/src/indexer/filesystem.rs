//! Filesystem helpers: document discovery, path normalization, tracked-file
//! glob expansion, and content hashing.

use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::errors::{TameError, TameResult};
use crate::models::ROOT_FILE_NAME;

/// Per-directory ignore file honored alongside `.gitignore`.
pub const IGNORE_FILE_NAME: &str = ".tameignore";

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Find every file under `root` whose extension is in `extensions`.
///
/// Hidden entries, `.gitignore`/`.tameignore` matches, and `ignore_patterns`
/// are skipped, as is the root `tame.yaml` itself. An unreadable root fails;
/// unreadable entries below it are logged with their path and skipped. The
/// result is sorted.
pub fn discover(
    root: &Path,
    extensions: &[String],
    ignore_patterns: &[String],
) -> TameResult<Vec<PathBuf>> {
    std::fs::read_dir(root).map_err(|e| TameError::io(root, e))?;

    let mut overrides = OverrideBuilder::new(root);
    for pattern in ignore_patterns {
        let stripped = pattern.trim();
        if stripped.is_empty() {
            continue;
        }
        let stripped = stripped.strip_prefix("./").unwrap_or(stripped);
        overrides
            .add(&format!("!{stripped}"))
            .map_err(|e| TameError::Config {
                path: root.join(ROOT_FILE_NAME),
                message: format!("bad ignore pattern {stripped:?}: {e}"),
            })?;
    }
    let overrides = overrides.build().map_err(|e| TameError::Config {
        path: root.join(ROOT_FILE_NAME),
        message: e.to_string(),
    })?;

    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_exclude(false)
        .git_global(false)
        .require_git(false)
        .add_custom_ignore_filename(IGNORE_FILE_NAME)
        .overrides(overrides)
        .follow_links(false)
        .build();

    let root_file = root.join(ROOT_FILE_NAME);
    let mut result = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!("skipping unreadable entry under {}: {err}", root.display());
                continue;
            }
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.into_path();
        if path == root_file || !has_extension(&path, extensions) {
            continue;
        }
        result.push(path);
    }
    result.sort();
    debug!(
        "discovered {} metadata files under {}",
        result.len(),
        root.display()
    );
    Ok(result)
}

pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let ext = match path.extension() {
        Some(e) => e.to_string_lossy().to_lowercase(),
        None => return false,
    };
    extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
}

// ---------------------------------------------------------------------------
// Path normalization
// ---------------------------------------------------------------------------

/// Resolve `.` and `..` without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut stack: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match stack.last() {
                Some(Component::Normal(_)) => {
                    stack.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => stack.push(component),
            },
            other => stack.push(other),
        }
    }
    stack.iter().collect()
}

/// Anchor `path` at `base_dir` unless it is already absolute.
pub fn anchor(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_lexically(path)
    } else {
        normalize_lexically(&base_dir.join(path))
    }
}

/// Canonical form used as document identity: symlinks resolved when the
/// path exists, lexical normalization otherwise.
pub fn canonical_path(path: &Path) -> PathBuf {
    match std::fs::canonicalize(path) {
        Ok(p) => p,
        Err(_) => {
            if path.is_absolute() {
                normalize_lexically(path)
            } else {
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
                normalize_lexically(&cwd.join(path))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tracked-file globs
// ---------------------------------------------------------------------------

const GLOB_CHARS: [char; 3] = ['*', '?', '['];

pub fn is_glob_pattern(path: &Path) -> bool {
    path.to_string_lossy().contains(GLOB_CHARS)
}

/// Compile an absolute glob. `*`, `?` and `[...]` stay within one path
/// component and `**` spans any number of them. A malformed pattern matches
/// nothing.
fn compile_pattern(pattern: &Path) -> Option<GlobMatcher> {
    let text = normalize_lexically(pattern).to_string_lossy().to_string();
    match GlobBuilder::new(&text).literal_separator(true).build() {
        Ok(glob) => Some(glob.compile_matcher()),
        Err(err) => {
            debug!("ignoring malformed glob {text:?}: {err}");
            None
        }
    }
}

/// True when absolute `candidate` matches the absolute glob `pattern`.
pub fn path_matches_pattern(candidate: &Path, pattern: &Path) -> bool {
    if !is_glob_pattern(pattern) {
        return normalize_lexically(candidate) == normalize_lexically(pattern);
    }
    compile_pattern(pattern).is_some_and(|m| m.is_match(normalize_lexically(candidate)))
}

/// Expand an absolute tracked-file entry to the existing files it names.
///
/// A plain path yields itself when it exists. A pattern is matched by walking
/// from its longest literal prefix. Results are sorted.
pub fn expand_tracked(entry: &Path) -> Vec<PathBuf> {
    if !is_glob_pattern(entry) {
        return if entry.exists() {
            vec![entry.to_path_buf()]
        } else {
            vec![]
        };
    }

    let mut base = PathBuf::new();
    let mut remaining = 0usize;
    let mut recursive = false;
    let mut in_pattern = false;
    for component in entry.components() {
        let text = component.as_os_str().to_string_lossy();
        if !in_pattern && !text.contains(GLOB_CHARS) {
            base.push(component);
            continue;
        }
        in_pattern = true;
        remaining += 1;
        if text == "**" {
            recursive = true;
        }
    }
    if !base.is_dir() {
        return vec![];
    }
    let Some(matcher) = compile_pattern(entry) else {
        return vec![];
    };

    let mut walker = WalkDir::new(&base).min_depth(1).follow_links(true);
    if !recursive {
        walker = walker.max_depth(remaining);
    }
    let mut matches: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| matcher.is_match(p))
        .collect();
    matches.sort();
    matches
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

pub fn compute_content_hash(path: &Path) -> TameResult<String> {
    let mut hasher = Sha256::new();
    let data = std::fs::read(path).map_err(|e| TameError::io(path, e))?;
    hasher.update(&data);
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exts() -> Vec<String> {
        vec!["yaml".to_string(), "yml".to_string()]
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, "\n").unwrap();
    }

    #[test]
    fn test_discover_filters_extensions_and_root_file() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(&root.join(ROOT_FILE_NAME));
        touch(&root.join("a.yaml"));
        touch(&root.join("nested/b.YML"));
        touch(&root.join("nested/data.gb"));
        touch(&root.join(".hidden/c.yaml"));

        let found = discover(root, &exts(), &[]).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.yaml", "nested/b.YML"]);
    }

    #[test]
    fn test_discover_honors_ignore_files_and_patterns() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(&root.join("keep.yaml"));
        touch(&root.join("build/out.yaml"));
        touch(&root.join("scratch/tmp.yaml"));
        std::fs::write(root.join(IGNORE_FILE_NAME), "build/\n").unwrap();

        let found = discover(root, &exts(), &["scratch/".to_string()]).unwrap();
        assert_eq!(found, vec![root.join("keep.yaml")]);
    }

    #[test]
    fn test_discover_unreadable_root_fails() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        let err = discover(&missing, &exts(), &[]).unwrap_err();
        assert!(matches!(err, TameError::Io { .. }));
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/a/b/../c/./d.yaml")),
            PathBuf::from("/a/c/d.yaml")
        );
        assert_eq!(
            normalize_lexically(Path::new("/../x")),
            PathBuf::from("/x")
        );
        assert_eq!(
            anchor(Path::new("/repo/sub"), Path::new("../p.yaml")),
            PathBuf::from("/repo/p.yaml")
        );
        assert_eq!(
            anchor(Path::new("/repo/sub"), Path::new("/abs/p.yaml")),
            PathBuf::from("/abs/p.yaml")
        );
    }

    #[test]
    fn test_path_matches_pattern() {
        assert!(path_matches_pattern(Path::new("/r/first.gb"), Path::new("/r/*.gb")));
        assert!(path_matches_pattern(Path::new("/r/a1.gb"), Path::new("/r/a?.gb")));
        assert!(!path_matches_pattern(Path::new("/r/first.fa"), Path::new("/r/*.gb")));
        assert!(path_matches_pattern(Path::new("/r/b.gb"), Path::new("/r/[ab].gb")));
        assert!(!path_matches_pattern(Path::new("/r/c.gb"), Path::new("/r/[ab].gb")));
        assert!(!path_matches_pattern(Path::new("/r/c.gb"), Path::new("/r/[c.gb")));
        assert!(path_matches_pattern(
            Path::new("/r/valid/first.gb"),
            Path::new("/r/valid/*.gb")
        ));
        assert!(!path_matches_pattern(
            Path::new("/r/valid/deep/first.gb"),
            Path::new("/r/valid/*.gb")
        ));
        assert!(path_matches_pattern(
            Path::new("/r/valid/deep/first.gb"),
            Path::new("/r/**/*.gb")
        ));
    }

    #[test]
    fn test_expand_tracked() {
        let tmp = TempDir::new().unwrap();
        let root = std::fs::canonicalize(tmp.path()).unwrap();
        touch(&root.join("valid/first.gb"));
        touch(&root.join("valid/second.gb"));
        touch(&root.join("valid/notes.txt"));
        std::fs::create_dir_all(root.join("invalid")).unwrap();

        let hits = expand_tracked(&root.join("valid/*.gb"));
        assert_eq!(
            hits,
            vec![root.join("valid/first.gb"), root.join("valid/second.gb")]
        );
        assert!(expand_tracked(&root.join("invalid/*.gb")).is_empty());
        assert_eq!(
            expand_tracked(&root.join("valid/notes.txt")),
            vec![root.join("valid/notes.txt")]
        );
        assert!(expand_tracked(&root.join("valid/absent.txt")).is_empty());
        assert!(is_glob_pattern(Path::new("valid/[fs]*.gb")));
        assert_eq!(
            expand_tracked(&root.join("valid/[f]*.gb")),
            vec![root.join("valid/first.gb")]
        );
    }

    #[test]
    fn test_content_hash_is_stable() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        std::fs::write(&a, "same").unwrap();
        std::fs::write(&b, "same").unwrap();
        assert_eq!(
            compute_content_hash(&a).unwrap(),
            compute_content_hash(&b).unwrap()
        );
    }
}
