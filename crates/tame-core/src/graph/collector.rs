//! Collection: gather a document, its ancestors, and their tracked files
//! into a destination directory.
//!
//! Planning is deterministic and sequential; only the copy step runs on the
//! worker pool.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::cancel::CancelToken;
use crate::errors::{TameError, TameResult};
use crate::graph::validator::ensure_acyclic_from;
use crate::graph::Graph;
use crate::indexer::filesystem::{
    canonical_path, compute_content_hash, expand_tracked, is_glob_pattern,
};
use crate::indexer::pipeline::{parallel_map, Corpus};
use crate::models::DocumentId;

/// Directory under the destination for sources outside the repository root.
pub const EXTERNAL_DIR: &str = "_external";

const HASH_SUFFIX_LEN: usize = 8;

/// Where each collected file lands under the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Layout {
    /// Keep the path relative to the repository root.
    #[default]
    Mirror,
    /// Place every file directly in the destination.
    Flatten,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Document that first claimed the source.
    pub document: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CopyPlan {
    pub entries: Vec<CopyEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectReport {
    /// Collected documents, descendants before ancestors.
    pub documents: Vec<PathBuf>,
    pub files_copied: usize,
    pub plan: CopyPlan,
}

// ---------------------------------------------------------------------------
// Closure
// ---------------------------------------------------------------------------

/// Documents reachable from `root` over parent edges, root included, in
/// topological order: every document precedes its parents, ties broken by
/// ascending id.
///
/// Fails fast on the first link error inside the closure and on any cycle.
pub fn closure_order(
    corpus: &Corpus,
    graph: &Graph,
    root: DocumentId,
) -> TameResult<Vec<DocumentId>> {
    let reachable = graph.ancestors_closure(&[root]);
    for &id in &reachable {
        if let Some(err) = graph.link_errors(id).first() {
            return Err(err.replicate());
        }
    }
    ensure_acyclic_from(corpus, graph, root)?;

    let members: HashSet<DocumentId> = reachable.iter().copied().collect();
    // Number of unprocessed children inside the closure, per document.
    let mut pending_children: HashMap<DocumentId, usize> =
        reachable.iter().map(|id| (*id, 0)).collect();
    for &id in &reachable {
        for parent in graph.parents(id) {
            if members.contains(parent) {
                *pending_children.entry(*parent).or_default() += 1;
            }
        }
    }

    let mut ready: BTreeSet<DocumentId> = pending_children
        .iter()
        .filter(|(_, n)| **n == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(reachable.len());
    while let Some(id) = ready.pop_first() {
        order.push(id);
        for parent in graph.parents(id) {
            if let Some(n) = pending_children.get_mut(parent) {
                *n -= 1;
                if *n == 0 {
                    ready.insert(*parent);
                }
            }
        }
    }
    Ok(order)
}

/// Refuse to collect from an index holding (type, uid) collisions.
pub fn ensure_unique(corpus: &Corpus) -> TameResult<()> {
    match corpus.duplicates.first() {
        Some(err) => Err(err.replicate()),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Concrete files named by one `files` entry: a file, every file under a
/// directory, or every match of a glob.
fn concrete_files(document: &Path, entry: &Path) -> TameResult<Vec<PathBuf>> {
    let missing = || TameError::MissingFile {
        document: document.to_path_buf(),
        file: entry.to_path_buf(),
    };
    if is_glob_pattern(entry) {
        let matches = expand_tracked(entry);
        if matches.is_empty() {
            return Err(missing());
        }
        return Ok(matches);
    }
    if entry.is_file() {
        return Ok(vec![entry.to_path_buf()]);
    }
    if entry.is_dir() {
        let mut files = Vec::new();
        for item in WalkDir::new(entry).follow_links(true).sort_by_file_name() {
            let item = item.map_err(|e| TameError::Io {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| entry.to_path_buf()),
                source: e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            })?;
            if item.file_type().is_file() {
                files.push(item.into_path());
            }
        }
        return Ok(files);
    }
    Err(missing())
}

/// Destination of `source` under the mirror layout.
fn mirror_destination(repo_root: &Path, destination: &Path, source: &Path) -> PathBuf {
    match source.strip_prefix(repo_root) {
        Ok(relative) => destination.join(relative),
        Err(_) => {
            let mut target = destination.join(EXTERNAL_DIR);
            for component in source.components() {
                if let Component::Normal(part) = component {
                    target.push(part);
                }
            }
            target
        }
    }
}

fn with_hash_suffix(path: &Path, hash: &str) -> PathBuf {
    let suffix = &hash[..HASH_SUFFIX_LEN.min(hash.len())];
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}-{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{suffix}"),
    };
    path.with_file_name(name)
}

/// Map every document of `order` and its tracked files to their destinations.
///
/// Each document's own file precedes its tracked files. Sources are
/// deduplicated by canonical path. Two sources may share a
/// destination only when their contents are identical, in which case the
/// first one wins.
pub fn plan_copies(
    corpus: &Corpus,
    order: &[DocumentId],
    destination: &Path,
    layout: Layout,
) -> TameResult<CopyPlan> {
    let mut sources: IndexMap<PathBuf, PathBuf> = IndexMap::new();
    for &id in order {
        let doc = corpus.document(id);
        sources
            .entry(doc.path.clone())
            .or_insert_with(|| doc.path.clone());
        for entry in &doc.files {
            for file in concrete_files(&doc.path, entry)? {
                sources
                    .entry(canonical_path(&file))
                    .or_insert_with(|| doc.path.clone());
            }
        }
    }

    let mut taken: HashMap<PathBuf, PathBuf> = HashMap::new();
    let mut hashes: HashMap<PathBuf, String> = HashMap::new();
    let mut hash_of = |path: &Path| -> TameResult<String> {
        if let Some(h) = hashes.get(path) {
            return Ok(h.clone());
        }
        let h = compute_content_hash(path)?;
        hashes.insert(path.to_path_buf(), h.clone());
        Ok(h)
    };

    let mut plan = CopyPlan::default();
    for (source, document) in sources {
        let mut target = match layout {
            Layout::Mirror => mirror_destination(&corpus.root, destination, &source),
            Layout::Flatten => destination.join(source.file_name().unwrap_or_default()),
        };

        if let Some(holder) = taken.get(&target).cloned() {
            let source_hash = hash_of(&source)?;
            if hash_of(&holder)? == source_hash {
                debug!(
                    "{} has the same contents as {}, copying once",
                    source.display(),
                    holder.display()
                );
                continue;
            }
            let suffixed = with_hash_suffix(&target, &source_hash);
            if let Some(other) = taken.get(&suffixed).cloned() {
                if hash_of(&other)? == source_hash {
                    continue;
                }
                return Err(TameError::OutputCollision {
                    destination: suffixed,
                    first: other,
                    second: source,
                });
            }
            target = suffixed;
        }
        if canonical_path(&target) == source {
            return Err(TameError::UnsafeDestination {
                destination: target,
                message: format!("it is the source file {}", source.display()),
            });
        }

        taken.insert(target.clone(), source.clone());
        plan.entries.push(CopyEntry {
            source,
            destination: target,
            document,
        });
    }
    Ok(plan)
}

// ---------------------------------------------------------------------------
// Materialization
// ---------------------------------------------------------------------------

/// Copy every planned file. Each destination is written at most once.
pub fn materialize(plan: &CopyPlan, workers: usize, cancel: &CancelToken) -> TameResult<usize> {
    let written: Mutex<HashSet<PathBuf>> = Mutex::new(HashSet::new());
    let results: Vec<TameResult<bool>> = parallel_map(&plan.entries, workers, |entry| {
        cancel.check()?;
        if !written.lock().insert(entry.destination.clone()) {
            return Ok(false);
        }
        if let Some(parent) = entry.destination.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TameError::io(parent, e))?;
        }
        std::fs::copy(&entry.source, &entry.destination)
            .map_err(|e| TameError::io(&entry.source, e))?;
        Ok(true)
    });

    let mut copied = 0;
    for result in results {
        if result? {
            copied += 1;
        }
    }
    Ok(copied)
}

/// Refuse a destination inside the repository: collected documents would be
/// indexed again and tracked files could be overwritten in place.
pub fn ensure_outside_repository(repo_root: &Path, destination: &Path) -> TameResult<()> {
    let resolved = canonical_path(destination);
    if resolved.starts_with(repo_root) {
        return Err(TameError::UnsafeDestination {
            destination: resolved,
            message: format!("it lies inside the repository {}", repo_root.display()),
        });
    }
    Ok(())
}

/// Options for one collection run.
#[derive(Debug, Clone)]
pub struct CollectOptions<'a> {
    pub layout: Layout,
    pub workers: usize,
    pub cancel: &'a CancelToken,
}

/// Collect `root` and its ancestors' files into `destination`.
pub fn collect(
    corpus: &Corpus,
    graph: &Graph,
    root: DocumentId,
    destination: &Path,
    options: &CollectOptions<'_>,
) -> TameResult<CollectReport> {
    ensure_unique(corpus)?;
    ensure_outside_repository(&corpus.root, destination)?;
    let order = closure_order(corpus, graph, root)?;
    let plan = plan_copies(corpus, &order, destination, options.layout)?;
    options.cancel.check()?;

    let files_copied = materialize(&plan, options.workers, options.cancel)?;
    info!(
        "collected {} documents and {} files into {}",
        order.len(),
        files_copied,
        destination.display()
    );
    Ok(CollectReport {
        documents: order
            .iter()
            .map(|id| corpus.document(*id).path.clone())
            .collect(),
        files_copied,
        plan,
    })
}
