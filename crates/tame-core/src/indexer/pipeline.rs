//! Corpus build pipeline with Rayon-based parallelism.
//!
//! Discovery and loading fan out over a bounded pool; the loaded documents
//! are then merged into the [`Index`] serially, in ascending path order.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::RepoConfig;
use crate::errors::{TameError, TameResult};
use crate::indexer::filesystem::{canonical_path, discover};
use crate::indexer::index::Index;
use crate::indexer::loader::{load_path, LoadOptions};
use crate::models::{DocumentId, MetadataDocument};

// ---------------------------------------------------------------------------
// Worker pool
// ---------------------------------------------------------------------------

/// Map `f` over `items` on a pool of `workers` threads, preserving order.
///
/// Falls back to a sequential pass when the pool cannot be built.
pub fn parallel_map<T, R, F>(items: &[T], workers: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if items.is_empty() {
        return vec![];
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build();

    match pool {
        Ok(pool) => pool.install(|| items.par_iter().map(&f).collect()),
        Err(e) => {
            warn!("failed to build worker pool, running sequentially: {e}");
            items.iter().map(&f).collect()
        }
    }
}

// ---------------------------------------------------------------------------
// Corpus
// ---------------------------------------------------------------------------

/// Every document of one repository, loaded and indexed.
#[derive(Debug)]
pub struct Corpus {
    pub root: PathBuf,
    /// Indexed by [`DocumentId`].
    pub documents: Vec<MetadataDocument>,
    pub index: Index,
    /// Files that could not be read, parsed, or loaded.
    pub load_errors: Vec<TameError>,
    /// (type, uid) collisions found during the merge.
    pub duplicates: Vec<TameError>,
}

impl Corpus {
    pub fn document(&self, id: DocumentId) -> &MetadataDocument {
        &self.documents[id.index()]
    }

    pub fn id_of(&self, path: &Path) -> Option<DocumentId> {
        self.index.by_path(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocumentId, &MetadataDocument)> {
        self.documents
            .iter()
            .enumerate()
            .map(|(i, doc)| (DocumentId(i), doc))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Discover, load, and index every metadata document under `root`.
///
/// Per-file failures are kept in the corpus; only an unreadable root, a bad
/// config pattern, or cancellation fail the whole build.
pub fn build_corpus(
    root: &Path,
    config: &RepoConfig,
    options: &LoadOptions,
    workers: usize,
    cancel: &CancelToken,
) -> TameResult<Corpus> {
    let started = Instant::now();
    let paths = discover(root, &config.extensions, &config.ignore)?;
    cancel.check()?;

    let results: Vec<TameResult<MetadataDocument>> = parallel_map(&paths, workers, |path| {
        cancel.check()?;
        load_path(&canonical_path(path), options)
    });
    cancel.check()?;

    let mut loaded = Vec::with_capacity(results.len());
    let mut load_errors = Vec::new();
    for result in results {
        match result {
            Ok(doc) => loaded.push(doc),
            Err(TameError::Cancelled) => return Err(TameError::Cancelled),
            Err(err) => {
                debug!("failed to load document: {err}");
                load_errors.push(err);
            }
        }
    }
    loaded.sort_by(|a, b| a.path.cmp(&b.path));
    loaded.dedup_by(|a, b| a.path == b.path);

    let mut index = Index::new();
    let mut duplicates = Vec::new();
    for doc in &loaded {
        let (_, outcome) = index.insert(doc);
        if let Err(err) = outcome {
            warn!("{err}");
            duplicates.push(err);
        }
    }

    info!(
        "indexed {} of {} metadata files under {} in {} ms ({} failed, {} duplicate uids)",
        loaded.len(),
        paths.len(),
        root.display(),
        started.elapsed().as_millis(),
        load_errors.len(),
        duplicates.len()
    );

    Ok(Corpus {
        root: root.to_path_buf(),
        documents: loaded,
        index,
        load_errors,
        duplicates,
    })
}
