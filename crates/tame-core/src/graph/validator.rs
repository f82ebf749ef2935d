//! Validation pass: cycle policy, tracked-file checks, and report assembly.
//!
//! Validation accumulates every violation it finds; it never stops early and
//! never mutates the corpus or the graph.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::errors::{TameError, TameResult, Violation};
use crate::graph::Graph;
use crate::indexer::filesystem::{expand_tracked, is_glob_pattern};
use crate::indexer::pipeline::{parallel_map, Corpus};
use crate::models::{DocumentId, MetadataDocument};

// ---------------------------------------------------------------------------
// Cycle detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Depth-first white/gray/black search from `roots`, in the given order.
///
/// Every gray-to-gray edge yields one cycle, written as the path from the
/// re-entered document back to itself (`A, B, A`).
fn detect_cycles(graph: &Graph, roots: &[DocumentId]) -> Vec<Vec<DocumentId>> {
    let mut color = vec![Color::White; graph.len()];
    let mut cycles = Vec::new();
    let mut stack: Vec<(DocumentId, usize)> = Vec::new();

    for &start in roots {
        if color[start.index()] != Color::White {
            continue;
        }
        color[start.index()] = Color::Gray;
        stack.push((start, 0));

        loop {
            let (node, next) = match stack.last_mut() {
                Some(top) => {
                    let current = (top.0, top.1);
                    top.1 += 1;
                    current
                }
                None => break,
            };
            let parents = graph.parents(node);
            if next >= parents.len() {
                color[node.index()] = Color::Black;
                stack.pop();
                continue;
            }
            let parent = parents[next];
            match color[parent.index()] {
                Color::White => {
                    color[parent.index()] = Color::Gray;
                    stack.push((parent, 0));
                }
                Color::Gray => {
                    let from = stack
                        .iter()
                        .position(|(id, _)| *id == parent)
                        .unwrap_or(0);
                    let mut cycle: Vec<DocumentId> =
                        stack[from..].iter().map(|(id, _)| *id).collect();
                    cycle.push(parent);
                    cycles.push(cycle);
                }
                Color::Black => {}
            }
        }
    }
    cycles
}

/// Every cycle in the graph, searched from each document in id order.
pub fn find_cycles(graph: &Graph) -> Vec<Vec<DocumentId>> {
    let roots: Vec<DocumentId> = graph.ids().collect();
    detect_cycles(graph, &roots)
}

/// Fail with [`TameError::Cycle`] when a cycle is reachable from `root`.
pub fn ensure_acyclic_from(corpus: &Corpus, graph: &Graph, root: DocumentId) -> TameResult<()> {
    match detect_cycles(graph, &[root]).into_iter().next() {
        Some(cycle) => Err(cycle_error(corpus, &cycle)),
        None => Ok(()),
    }
}

fn cycle_error(corpus: &Corpus, cycle: &[DocumentId]) -> TameError {
    TameError::Cycle {
        cycle: cycle
            .iter()
            .map(|id| corpus.document(*id).path.clone())
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Tracked files
// ---------------------------------------------------------------------------

/// Check that each `files` entry exists, or, for a glob, matches a file.
pub fn verify_files(doc: &MetadataDocument) -> Vec<TameError> {
    doc.files
        .iter()
        .filter(|entry| {
            if is_glob_pattern(entry) {
                expand_tracked(entry).is_empty()
            } else {
                !entry.exists()
            }
        })
        .map(|entry| TameError::MissingFile {
            document: doc.path.clone(),
            file: entry.clone(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Terminal state of a validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "violations")]
pub enum ValidationReport {
    Valid,
    Invalid(Vec<Violation>),
}

impl ValidationReport {
    /// Sort and deduplicate `violations`; an empty list is `Valid`.
    pub fn from_violations(mut violations: Vec<Violation>) -> Self {
        if violations.is_empty() {
            return ValidationReport::Valid;
        }
        violations.sort();
        violations.dedup();
        ValidationReport::Invalid(violations)
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationReport::Valid)
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            ValidationReport::Valid => &[],
            ValidationReport::Invalid(v) => v,
        }
    }
}

/// Options for one validation pass.
#[derive(Debug, Clone)]
pub struct ValidateOptions<'a> {
    /// File or directory the report is restricted to (canonical).
    pub scope: &'a Path,
    pub verify_files: bool,
    pub workers: usize,
    pub cancel: &'a CancelToken,
}

/// Validate the documents under `options.scope` and everything they inherit
/// from.
pub fn validate(
    corpus: &Corpus,
    graph: &Graph,
    options: &ValidateOptions<'_>,
) -> TameResult<ValidationReport> {
    let scope = options.scope;
    let seeds: Vec<DocumentId> = corpus
        .iter()
        .filter(|(_, doc)| doc.path.starts_with(scope))
        .map(|(id, _)| id)
        .collect();
    let closure = graph.ancestors_closure(&seeds);
    let in_closure: BTreeSet<DocumentId> = closure.iter().copied().collect();
    let closure_paths: BTreeSet<&Path> = closure
        .iter()
        .map(|id| corpus.document(*id).path.as_path())
        .collect();
    debug!(
        "validating {} documents ({} in scope) under {}",
        closure.len(),
        seeds.len(),
        scope.display()
    );

    let mut violations: Vec<Violation> = Vec::new();

    for err in &corpus.load_errors {
        if err.document().is_some_and(|p| p.starts_with(scope)) {
            violations.push(Violation::from(err));
        }
    }

    for err in &corpus.duplicates {
        if let TameError::DuplicateUid { first, second, .. } = err {
            if closure_paths.contains(first.as_path()) || closure_paths.contains(second.as_path())
            {
                violations.push(Violation::from(err));
            }
        }
    }

    for &id in &closure {
        violations.extend(graph.link_errors(id).iter().map(Violation::from));
    }
    options.cancel.check()?;

    for cycle in find_cycles(graph) {
        if cycle.iter().any(|id| in_closure.contains(id)) {
            violations.push(Violation::from(&cycle_error(corpus, &cycle)));
        }
    }

    if options.verify_files {
        let missing: Vec<TameResult<Vec<TameError>>> =
            parallel_map(&closure, options.workers, |id| {
                options.cancel.check()?;
                Ok(verify_files(corpus.document(*id)))
            });
        for entry in missing {
            violations.extend(entry?.iter().map(Violation::from));
        }
    }

    Ok(ValidationReport::from_violations(violations))
}
