//! Lookup tables over the loaded corpus: by path, by (type, uid), and by
//! (type, name).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::errors::{TameError, TameResult};
use crate::models::{DocumentId, MetadataDocument};

#[derive(Debug, Default)]
pub struct Index {
    paths: Vec<PathBuf>,
    by_path: HashMap<PathBuf, DocumentId>,
    by_type_uid: HashMap<(String, String), DocumentId>,
    /// Ids per key in ascending order; several documents may share a name.
    by_type_name: HashMap<(String, String), Vec<DocumentId>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `doc` under the next dense id and return that id.
    ///
    /// The document is always reachable by path and by name afterwards. When
    /// its (type, uid) is already taken the first holder keeps the uid slot
    /// and the collision is returned as [`TameError::DuplicateUid`].
    pub fn insert(&mut self, doc: &MetadataDocument) -> (DocumentId, TameResult<()>) {
        let id = DocumentId(self.paths.len());
        self.paths.push(doc.path.clone());
        self.by_path.insert(doc.path.clone(), id);

        if let Some(name) = &doc.name {
            self.by_type_name
                .entry((doc.doc_type.clone(), name.clone()))
                .or_default()
                .push(id);
        }

        let outcome = match &doc.uid {
            Some(uid) => {
                let key = (doc.doc_type.clone(), uid.clone());
                match self.by_type_uid.get(&key) {
                    Some(first) => Err(TameError::DuplicateUid {
                        doc_type: doc.doc_type.clone(),
                        uid: uid.clone(),
                        first: self.paths[first.index()].clone(),
                        second: doc.path.clone(),
                    }),
                    None => {
                        self.by_type_uid.insert(key, id);
                        Ok(())
                    }
                }
            }
            None => Ok(()),
        };
        (id, outcome)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn path_of(&self, id: DocumentId) -> &Path {
        &self.paths[id.index()]
    }

    pub fn by_path(&self, path: &Path) -> Option<DocumentId> {
        self.by_path.get(path).copied()
    }

    pub fn by_type_uid(&self, doc_type: &str, uid: &str) -> Option<DocumentId> {
        self.by_type_uid
            .get(&(doc_type.to_string(), uid.to_string()))
            .copied()
    }

    pub fn by_type_name(&self, doc_type: &str, name: &str) -> &[DocumentId] {
        self.by_type_name
            .get(&(doc_type.to_string(), name.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
