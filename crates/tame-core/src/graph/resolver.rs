//! Parent link resolution against a finished index.
//!
//! Runs only after every document has been merged into the index, and then
//! resolves all documents in parallel.

use tracing::debug;

use crate::cancel::CancelToken;
use crate::errors::{TameError, TameResult};
use crate::graph::Graph;
use crate::indexer::filesystem::{anchor, canonical_path};
use crate::indexer::index::Index;
use crate::indexer::pipeline::{parallel_map, Corpus};
use crate::models::{DocumentId, LinkSpec, MetadataDocument};

/// Resolve the link at `position` of `doc`'s `parent` list.
pub fn resolve_link(
    index: &Index,
    doc: &MetadataDocument,
    position: usize,
    link: &LinkSpec,
) -> TameResult<DocumentId> {
    let unresolved = || TameError::UnresolvedLink {
        document: doc.path.clone(),
        position,
        rule: link.rule(),
        target: link.target_label(),
    };

    match link {
        LinkSpec::ByFile(path) => {
            let target = canonical_path(&anchor(doc.dir(), path));
            index.by_path(&target).ok_or_else(unresolved)
        }
        LinkSpec::ByTypeUid { doc_type, uid } => {
            index.by_type_uid(doc_type, uid).ok_or_else(unresolved)
        }
        LinkSpec::ByTypeName { doc_type, name } => match index.by_type_name(doc_type, name) {
            [] => Err(unresolved()),
            [only] => Ok(*only),
            many => Err(TameError::AmbiguousLink {
                document: doc.path.clone(),
                position,
                rule: link.rule(),
                target: link.target_label(),
                candidates: many
                    .iter()
                    .map(|id| index.path_of(*id).to_path_buf())
                    .collect(),
            }),
        },
    }
}

/// Resolve every link of `doc`. Parents keep authored order, without repeats.
pub fn resolve_links(index: &Index, doc: &MetadataDocument) -> (Vec<DocumentId>, Vec<TameError>) {
    let mut parents = Vec::with_capacity(doc.parent_links.len());
    let mut errors = Vec::new();
    for (position, link) in doc.parent_links.iter().enumerate() {
        match resolve_link(index, doc, position, link) {
            Ok(id) if !parents.contains(&id) => parents.push(id),
            Ok(_) => {}
            Err(err) => errors.push(err),
        }
    }
    (parents, errors)
}

/// Resolve the whole corpus into a [`Graph`].
pub fn build_graph(corpus: &Corpus, workers: usize, cancel: &CancelToken) -> TameResult<Graph> {
    let resolved: Vec<TameResult<(Vec<DocumentId>, Vec<TameError>)>> =
        parallel_map(&corpus.documents, workers, |doc| {
            cancel.check()?;
            Ok(resolve_links(&corpus.index, doc))
        });

    let mut parents = Vec::with_capacity(resolved.len());
    let mut link_errors = Vec::with_capacity(resolved.len());
    for entry in resolved {
        let (p, e) = entry?;
        parents.push(p);
        link_errors.push(e);
    }
    let failed: usize = link_errors.iter().map(Vec::len).sum();
    debug!(
        "resolved parent links of {} documents ({} unresolved or ambiguous)",
        parents.len(),
        failed
    );
    Ok(Graph::new(parents, link_errors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LinkRule;
    use indexmap::IndexMap;
    use std::path::{Path, PathBuf};

    fn doc(path: &str, doc_type: &str, name: Option<&str>, uid: Option<&str>) -> MetadataDocument {
        MetadataDocument {
            path: PathBuf::from(path),
            doc_type: doc_type.to_string(),
            name: name.map(str::to_string),
            uid: uid.map(str::to_string),
            files: vec![],
            parent_links: vec![],
            extra: IndexMap::new(),
            metadata_only: true,
        }
    }

    fn index_of(docs: &[MetadataDocument]) -> Index {
        let mut index = Index::new();
        for d in docs {
            let _ = index.insert(d);
        }
        index
    }

    #[test]
    fn test_by_file_is_anchored_at_document_dir() {
        let docs = vec![
            doc("/nonexistent-tame/r/root.yaml", "project", None, None),
            doc("/nonexistent-tame/r/sub/child.yaml", "sample", None, None),
        ];
        let index = index_of(&docs);
        let link = LinkSpec::ByFile(PathBuf::from("../root.yaml"));
        assert_eq!(
            resolve_link(&index, &docs[1], 0, &link).unwrap(),
            DocumentId(0)
        );
        let link = LinkSpec::ByFile(PathBuf::from("/nonexistent-tame/r/./root.yaml"));
        assert_eq!(
            resolve_link(&index, &docs[1], 0, &link).unwrap(),
            DocumentId(0)
        );
    }

    #[test]
    fn test_missing_file_link_is_unresolved() {
        let docs = vec![doc("/nonexistent-tame/r/child.yaml", "sample", None, None)];
        let index = index_of(&docs);
        let link = LinkSpec::ByFile(PathBuf::from("missing.yaml"));
        match resolve_link(&index, &docs[0], 3, &link) {
            Err(TameError::UnresolvedLink {
                document,
                position,
                rule,
                ..
            }) => {
                assert_eq!(document, Path::new("/nonexistent-tame/r/child.yaml"));
                assert_eq!(position, 3);
                assert_eq!(rule, LinkRule::ByFile);
            }
            other => panic!("expected unresolved link, got {other:?}"),
        }
    }

    #[test]
    fn test_name_resolution_never_guesses() {
        let docs = vec![
            doc("/x/a.yaml", "plasmid", Some("pUC19"), None),
            doc("/x/b.yaml", "plasmid", Some("pUC19"), None),
            doc("/x/c.yaml", "plasmid", Some("pBR322"), None),
        ];
        let index = index_of(&docs);
        let child = doc("/x/child.yaml", "sample", None, None);

        let unique = LinkSpec::ByTypeName {
            doc_type: "plasmid".into(),
            name: "pBR322".into(),
        };
        assert_eq!(
            resolve_link(&index, &child, 0, &unique).unwrap(),
            DocumentId(2)
        );

        let ambiguous = LinkSpec::ByTypeName {
            doc_type: "plasmid".into(),
            name: "pUC19".into(),
        };
        match resolve_link(&index, &child, 1, &ambiguous) {
            Err(TameError::AmbiguousLink { candidates, .. }) => {
                assert_eq!(
                    candidates,
                    vec![PathBuf::from("/x/a.yaml"), PathBuf::from("/x/b.yaml")]
                );
            }
            other => panic!("expected ambiguous link, got {other:?}"),
        }

        let absent = LinkSpec::ByTypeName {
            doc_type: "strain".into(),
            name: "pUC19".into(),
        };
        assert!(matches!(
            resolve_link(&index, &child, 2, &absent),
            Err(TameError::UnresolvedLink { .. })
        ));
    }

    #[test]
    fn test_uid_resolution_is_unique_or_unresolved() {
        let docs = vec![doc("/x/a.yaml", "plasmid", None, Some("p001"))];
        let index = index_of(&docs);
        let child = doc("/x/child.yaml", "sample", None, None);
        let hit = LinkSpec::ByTypeUid {
            doc_type: "plasmid".into(),
            uid: "p001".into(),
        };
        let miss = LinkSpec::ByTypeUid {
            doc_type: "plasmid".into(),
            uid: "p002".into(),
        };
        assert_eq!(resolve_link(&index, &child, 0, &hit).unwrap(), DocumentId(0));
        assert!(matches!(
            resolve_link(&index, &child, 1, &miss),
            Err(TameError::UnresolvedLink { .. })
        ));
    }

    #[test]
    fn test_resolve_links_keeps_going_after_errors() {
        let docs = vec![doc("/x/a.yaml", "plasmid", None, Some("p001"))];
        let index = index_of(&docs);
        let mut child = doc("/x/child.yaml", "sample", None, None);
        child.parent_links = vec![
            LinkSpec::ByFile(PathBuf::from("missing.yaml")),
            LinkSpec::ByTypeUid {
                doc_type: "plasmid".into(),
                uid: "p001".into(),
            },
            LinkSpec::ByFile(PathBuf::from("a.yaml")),
        ];
        let (parents, errors) = resolve_links(&index, &child);
        assert_eq!(parents, vec![DocumentId(0)]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].link_position(), Some(0));
    }
}
