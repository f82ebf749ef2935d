//! The engine: one indexed repository and the operations run against it.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::config::{find_root, EngineOptions, RepoConfig};
use crate::errors::{TameError, TameResult};
use crate::graph::collector::{self, CollectOptions, CollectReport};
use crate::graph::resolver::build_graph;
use crate::graph::validator::{self, ValidateOptions, ValidationReport};
use crate::graph::Graph;
use crate::indexer::filesystem::canonical_path;
use crate::indexer::loader::LoadOptions;
use crate::indexer::pipeline::{build_corpus, parallel_map, Corpus};
use crate::models::{DocumentId, MetadataDocument, ROOT_FILE_NAME};
use crate::plugins::{DescriberRegistry, DocumentView, LocatorRegistry, Matcher};

/// An indexed repository. Owns its corpus, graph, and plugin registries.
#[derive(Debug)]
pub struct Engine {
    root: PathBuf,
    config: RepoConfig,
    options: EngineOptions,
    workers: usize,
    corpus: Corpus,
    graph: Graph,
    describers: DescriberRegistry,
    locators: LocatorRegistry,
}

impl Engine {
    /// Find the repository containing `start` and index it.
    pub fn open(start: &Path, options: EngineOptions) -> TameResult<Self> {
        let root = find_root(start)?;
        Self::open_root(&root, options)
    }

    /// Index the repository rooted at `root`, which must hold a `tame.yaml`.
    pub fn open_root(root: &Path, options: EngineOptions) -> TameResult<Self> {
        let started = Instant::now();
        let root = canonical_path(root);
        let config = RepoConfig::load(&root.join(ROOT_FILE_NAME))?;
        let workers = options.effective_workers(&config);
        let load_options = LoadOptions {
            metadata_only: options.metadata_only,
            metadata_only_types: config.metadata_only_types.iter().cloned().collect(),
        };

        let corpus = build_corpus(&root, &config, &load_options, workers, &options.cancel)?;
        let graph = build_graph(&corpus, workers, &options.cancel)?;
        let describers = DescriberRegistry::from_templates(&config.describers);

        info!(
            "opened {} ({} documents, {} workers) in {} ms",
            root.display(),
            corpus.len(),
            workers,
            started.elapsed().as_millis()
        );
        Ok(Self {
            root,
            config,
            options,
            workers,
            corpus,
            graph,
            describers,
            locators: LocatorRegistry::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn describers_mut(&mut self) -> &mut DescriberRegistry {
        &mut self.describers
    }

    pub fn locators_mut(&mut self) -> &mut LocatorRegistry {
        &mut self.locators
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    fn absolute(path: &Path) -> PathBuf {
        canonical_path(path)
    }

    /// Id of the document loaded from `path`.
    ///
    /// A file that failed to load reports its load error instead.
    pub fn document_id(&self, path: &Path) -> TameResult<DocumentId> {
        let path = Self::absolute(path);
        if let Some(id) = self.corpus.id_of(&path) {
            return Ok(id);
        }
        match self
            .corpus
            .load_errors
            .iter()
            .find(|e| e.document() == Some(path.as_path()))
        {
            Some(err) => Err(err.replicate()),
            None => Err(TameError::UnknownDocument { path }),
        }
    }

    pub fn document(&self, path: &Path) -> TameResult<&MetadataDocument> {
        Ok(self.corpus.document(self.document_id(path)?))
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Validate every document under `scope` (file or directory) and all of
    /// their ancestors.
    pub fn validate(&self, scope: &Path) -> TameResult<ValidationReport> {
        let scope = Self::absolute(scope);
        if !scope.starts_with(&self.root) {
            return Err(TameError::UnknownDocument { path: scope });
        }
        if !scope.is_dir()
            && self.corpus.id_of(&scope).is_none()
            && !self
                .corpus
                .load_errors
                .iter()
                .any(|e| e.document() == Some(scope.as_path()))
        {
            return Err(TameError::UnknownDocument { path: scope });
        }

        let report = validator::validate(
            &self.corpus,
            &self.graph,
            &ValidateOptions {
                scope: &scope,
                verify_files: self.options.verify_files && !self.options.metadata_only,
                workers: self.workers,
                cancel: &self.options.cancel,
            },
        )?;
        debug!(
            "validation of {} finished with {} violations",
            scope.display(),
            report.violations().len()
        );
        Ok(report)
    }

    /// Describe the document at `path` with its type's describer.
    pub fn describe(&self, path: &Path) -> TameResult<String> {
        let id = self.document_id(path)?;
        let parents: Vec<&MetadataDocument> = self
            .graph
            .parents(id)
            .iter()
            .map(|p| self.corpus.document(*p))
            .collect();
        let view = DocumentView {
            document: self.corpus.document(id),
            parents: &parents,
        };
        Ok(self.describers.describe(&view))
    }

    /// Copy the tracked files of the document at `path` and all of its
    /// ancestors into `destination`.
    pub fn collect(&self, path: &Path, destination: &Path) -> TameResult<CollectReport> {
        let id = self.document_id(path)?;
        let destination = if destination.is_absolute() {
            destination.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| TameError::io(destination, e))?
                .join(destination)
        };
        collector::collect(
            &self.corpus,
            &self.graph,
            id,
            &destination,
            &CollectOptions {
                layout: self.options.layout,
                workers: self.workers,
                cancel: &self.options.cancel,
            },
        )
    }

    /// Paths of every document claiming the data file `file`, in path order.
    pub fn locate(&self, file: &Path) -> TameResult<Vec<PathBuf>> {
        let file = Self::absolute(file);
        self.options.cancel.check()?;
        Ok(self
            .corpus
            .iter()
            .filter(|(_, doc)| self.locators.claims(doc, &file))
            .map(|(_, doc)| doc.path.clone())
            .collect())
    }

    /// Paths of the documents under `scope` that `matcher` accepts, in path
    /// order. Each document is matched together with all of its ancestors.
    pub fn search(&self, scope: &Path, matcher: &dyn Matcher) -> TameResult<Vec<PathBuf>> {
        let scope = Self::absolute(scope);
        let candidates: Vec<DocumentId> = self
            .corpus
            .iter()
            .filter(|(_, doc)| doc.path.starts_with(&scope))
            .map(|(id, _)| id)
            .collect();

        let hits = parallel_map(&candidates, self.workers, |&id| {
            self.options.cancel.check()?;
            let ancestors: Vec<&MetadataDocument> = self
                .graph
                .ancestors_closure(&[id])
                .into_iter()
                .filter(|a| *a != id)
                .map(|a| self.corpus.document(a))
                .collect();
            let doc = self.corpus.document(id);
            Ok::<_, TameError>(matcher.matches(doc, &ancestors).then(|| doc.path.clone()))
        });

        let mut found = Vec::new();
        for hit in hits {
            found.extend(hit?);
        }
        debug!(
            "search under {} matched {} of {} documents",
            scope.display(),
            found.len(),
            candidates.len()
        );
        Ok(found)
    }
}
