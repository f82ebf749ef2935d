//! Reverse lookup: which documents claim a given data file.

use std::collections::HashMap;
use std::path::Path;

use crate::indexer::filesystem::{canonical_path, is_glob_pattern, path_matches_pattern};
use crate::models::MetadataDocument;

/// Decides whether a document claims a data file.
pub trait Locator: Send + Sync {
    /// `file` is absolute and canonical.
    fn claims(&self, doc: &MetadataDocument, file: &Path) -> bool;
}

/// Matches the document's `files` entries: exact paths, globs, and
/// directories containing the file.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilesLocator;

impl Locator for FilesLocator {
    fn claims(&self, doc: &MetadataDocument, file: &Path) -> bool {
        doc.files.iter().any(|entry| {
            if is_glob_pattern(entry) {
                return path_matches_pattern(file, entry);
            }
            let entry = canonical_path(entry);
            file == entry || (entry.is_dir() && file.starts_with(&entry))
        })
    }
}

/// Locators keyed by metadata type, with [`FilesLocator`] as fallback.
pub struct LocatorRegistry {
    by_type: HashMap<String, Box<dyn Locator>>,
    fallback: FilesLocator,
}

impl Default for LocatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LocatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&String> = self.by_type.keys().collect();
        types.sort();
        f.debug_struct("LocatorRegistry")
            .field("types", &types)
            .finish()
    }
}

impl LocatorRegistry {
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            fallback: FilesLocator,
        }
    }

    pub fn register<L: Locator + 'static>(&mut self, doc_type: impl Into<String>, locator: L) {
        self.by_type.insert(doc_type.into(), Box::new(locator));
    }

    pub fn claims(&self, doc: &MetadataDocument, file: &Path) -> bool {
        match self.by_type.get(&doc.doc_type) {
            Some(locator) => locator.claims(doc, file),
            None => self.fallback.claims(doc, file),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn doc(doc_type: &str, files: Vec<PathBuf>) -> MetadataDocument {
        MetadataDocument {
            path: PathBuf::from("/r/meta.yaml"),
            doc_type: doc_type.to_string(),
            name: None,
            uid: None,
            files,
            parent_links: vec![],
            extra: Default::default(),
            metadata_only: false,
        }
    }

    #[test]
    fn test_files_locator_matches_exact_glob_and_directory() {
        let tmp = TempDir::new().unwrap();
        let root = std::fs::canonicalize(tmp.path()).unwrap();
        std::fs::create_dir_all(root.join("run/lane1")).unwrap();
        std::fs::write(root.join("run/lane1/r1.fastq"), "x").unwrap();
        std::fs::write(root.join("seq.gb"), "x").unwrap();

        let exact = doc("plasmid", vec![root.join("seq.gb")]);
        let glob = doc("reads", vec![root.join("run/*/*.fastq")]);
        let dir = doc("run", vec![root.join("run")]);

        let locator = FilesLocator;
        assert!(locator.claims(&exact, &root.join("seq.gb")));
        assert!(!locator.claims(&exact, &root.join("run/lane1/r1.fastq")));
        assert!(locator.claims(&glob, &root.join("run/lane1/r1.fastq")));
        assert!(!locator.claims(&glob, &root.join("seq.gb")));
        assert!(locator.claims(&dir, &root.join("run/lane1/r1.fastq")));
    }

    struct ClaimsEverything;

    impl Locator for ClaimsEverything {
        fn claims(&self, _doc: &MetadataDocument, _file: &Path) -> bool {
            true
        }
    }

    #[test]
    fn test_registry_dispatches_by_type() {
        let mut registry = LocatorRegistry::new();
        registry.register("archive", ClaimsEverything);
        let file = Path::new("/nonexistent-tame/anything.bin");
        assert!(registry.claims(&doc("archive", vec![]), file));
        assert!(!registry.claims(&doc("plasmid", vec![]), file));
    }
}
