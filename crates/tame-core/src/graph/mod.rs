//! Parent graph over the indexed corpus, and the passes that walk it.

pub mod collector;
pub mod resolver;
pub mod validator;

use std::collections::{BTreeSet, VecDeque};

use crate::errors::TameError;
use crate::models::DocumentId;

/// Resolved parent edges per document, plus the links that failed to resolve.
///
/// Edges point from a document to its parents. Immutable once built.
#[derive(Debug, Default)]
pub struct Graph {
    parents: Vec<Vec<DocumentId>>,
    link_errors: Vec<Vec<TameError>>,
}

impl Graph {
    pub fn new(parents: Vec<Vec<DocumentId>>, link_errors: Vec<Vec<TameError>>) -> Self {
        debug_assert_eq!(parents.len(), link_errors.len());
        Self {
            parents,
            link_errors,
        }
    }

    /// Graph with no link errors; handy for synthetic inputs.
    pub fn from_parents(parents: Vec<Vec<DocumentId>>) -> Self {
        let link_errors = parents.iter().map(|_| Vec::new()).collect();
        Self::new(parents, link_errors)
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = DocumentId> {
        (0..self.parents.len()).map(DocumentId)
    }

    pub fn parents(&self, id: DocumentId) -> &[DocumentId] {
        &self.parents[id.index()]
    }

    pub fn link_errors(&self, id: DocumentId) -> &[TameError] {
        &self.link_errors[id.index()]
    }

    /// `seeds` plus every document reachable from them over parent edges,
    /// in ascending id order. Safe on cyclic graphs.
    pub fn ancestors_closure(&self, seeds: &[DocumentId]) -> Vec<DocumentId> {
        let mut seen: BTreeSet<DocumentId> = BTreeSet::new();
        let mut queue: VecDeque<DocumentId> = VecDeque::new();
        for &seed in seeds {
            if seen.insert(seed) {
                queue.push_back(seed);
            }
        }
        while let Some(current) = queue.pop_front() {
            for &parent in self.parents(current) {
                if seen.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        seen.into_iter().collect()
    }
}
