//! Turn a parsed generic tree into a typed [`MetadataDocument`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_yaml::Mapping;

use crate::errors::{TameError, TameResult};
use crate::indexer::filesystem::anchor;
use crate::indexer::parser::parse_file;
use crate::models::{
    LinkSpec, MetadataDocument, Value, KEY_FILES, KEY_NAME, KEY_PARENT, KEY_TYPE, KEY_UID,
};

const LINK_KEY_FILE: &str = "file";

/// Which documents may omit `files`.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Run-wide opt-in: every document may omit `files`.
    pub metadata_only: bool,
    /// Per-type opt-in from the repository config.
    pub metadata_only_types: HashSet<String>,
}

impl LoadOptions {
    fn allows_missing_files(&self, doc_type: &str) -> bool {
        self.metadata_only || self.metadata_only_types.contains(doc_type)
    }
}

/// Read, parse, and load the document at `path` (already canonical).
pub fn load_path(path: &Path, options: &LoadOptions) -> TameResult<MetadataDocument> {
    let node = parse_file(path)?;
    load_document(path, node, options)
}

/// Build a document from its parsed tree.
pub fn load_document(
    path: &Path,
    node: Value,
    options: &LoadOptions,
) -> TameResult<MetadataDocument> {
    let mapping = match node {
        Value::Mapping(m) => m,
        Value::Null => {
            return Err(TameError::schema(
                path,
                "document is empty; the 'type' key is required",
            ))
        }
        _ => {
            return Err(TameError::schema(
                path,
                "top level of a metadata document must be a mapping",
            ))
        }
    };

    let base_dir = path.parent().unwrap_or_else(|| Path::new("/"));
    let mut doc_type: Option<String> = None;
    let mut name = None;
    let mut uid = None;
    let mut files: Option<Vec<PathBuf>> = None;
    let mut parent_links = Vec::new();
    let mut extra = IndexMap::new();

    for (key, value) in mapping {
        let key = match key {
            Value::String(k) => k,
            other => {
                return Err(TameError::schema(
                    path,
                    format!("keys must be strings, found {other:?}"),
                ))
            }
        };
        match key.as_str() {
            KEY_TYPE => doc_type = Some(expect_string(path, KEY_TYPE, value)?),
            KEY_NAME => name = Some(expect_string(path, KEY_NAME, value)?),
            KEY_UID => uid = Some(expect_string(path, KEY_UID, value)?),
            KEY_FILES => files = Some(load_files(path, base_dir, value)?),
            KEY_PARENT => parent_links = load_parents(path, value)?,
            _ => {
                extra.insert(key, value);
            }
        }
    }

    let doc_type = doc_type.ok_or_else(|| {
        TameError::schema(path, "type of metadata must be provided as a string")
    })?;
    if doc_type.trim().is_empty() {
        return Err(TameError::schema(path, "type must not be empty"));
    }

    let (files, metadata_only) = match files {
        Some(files) => (files, false),
        None if options.allows_missing_files(&doc_type) => (Vec::new(), true),
        None => {
            return Err(TameError::schema(
                path,
                "files key is required unless the document is metadata-only",
            ))
        }
    };

    Ok(MetadataDocument {
        path: path.to_path_buf(),
        doc_type,
        name,
        uid,
        files,
        parent_links,
        extra,
        metadata_only,
    })
}

fn expect_string(path: &Path, key: &str, value: Value) -> TameResult<String> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(TameError::schema(
            path,
            format!("{key} key is special: value must be provided as a string"),
        )),
    }
}

fn load_files(path: &Path, base_dir: &Path, value: Value) -> TameResult<Vec<PathBuf>> {
    let items = match value {
        Value::Sequence(items) => items,
        _ => {
            return Err(TameError::schema(
                path,
                "files key is special: value must be provided as a list",
            ))
        }
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) if !s.trim().is_empty() => Ok(anchor(base_dir, Path::new(s.trim()))),
            _ => Err(TameError::schema(
                path,
                format!("files entry #{i} must be a non-empty path string"),
            )),
        })
        .collect()
}

fn load_parents(path: &Path, value: Value) -> TameResult<Vec<LinkSpec>> {
    let items = match value {
        Value::Sequence(items) => items,
        _ => {
            return Err(TameError::schema(
                path,
                "parent key is special: value must be provided as a list",
            ))
        }
    };
    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| parse_link_spec(path, position, item))
        .collect()
}

/// Parse one `parent` entry: `{file}`, `{type, name}`, `{type, uid}`, or a
/// bare path string as shorthand for `{file}`.
pub fn parse_link_spec(path: &Path, position: usize, item: Value) -> TameResult<LinkSpec> {
    let malformed = |detail: &str| {
        TameError::schema(
            path,
            format!(
                "parent #{position} {detail}; expected {{file: <path>}}, \
                 {{type: <t>, name: <n>}} or {{type: <t>, uid: <u>}}"
            ),
        )
    };

    let map: Mapping = match item {
        Value::String(s) if !s.trim().is_empty() => {
            return Ok(LinkSpec::ByFile(PathBuf::from(s.trim())))
        }
        Value::Mapping(m) => m,
        _ => return Err(malformed("is neither a mapping nor a path")),
    };

    let mut file = None;
    let mut doc_type = None;
    let mut name = None;
    let mut uid = None;
    for (key, value) in map {
        let key = match key {
            Value::String(k) => k,
            _ => return Err(malformed("has a non-string key")),
        };
        let value = match value {
            Value::String(v) => v,
            _ => return Err(malformed(&format!("has a non-string value for '{key}'"))),
        };
        match key.as_str() {
            LINK_KEY_FILE => file = Some(value),
            KEY_TYPE => doc_type = Some(value),
            KEY_NAME => name = Some(value),
            KEY_UID => uid = Some(value),
            _ => return Err(malformed(&format!("has unknown key '{key}'"))),
        }
    }

    match (file, doc_type, name, uid) {
        (Some(file), None, None, None) => Ok(LinkSpec::ByFile(PathBuf::from(file))),
        (None, Some(doc_type), Some(name), None) => Ok(LinkSpec::ByTypeName { doc_type, name }),
        (None, Some(doc_type), None, Some(uid)) => Ok(LinkSpec::ByTypeUid { doc_type, uid }),
        (None, Some(_), Some(_), Some(_)) => Err(malformed("gives both name and uid")),
        _ => Err(malformed("does not match any link form")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(yaml: &str) -> TameResult<MetadataDocument> {
        load_with(yaml, &LoadOptions::default())
    }

    fn load_with(yaml: &str, options: &LoadOptions) -> TameResult<MetadataDocument> {
        let node: Value = serde_yaml::from_str(yaml).unwrap();
        load_document(Path::new("/repo/plasmids/meta.yaml"), node, options)
    }

    fn permissive() -> LoadOptions {
        LoadOptions {
            metadata_only: true,
            ..LoadOptions::default()
        }
    }

    #[test]
    fn test_special_keys_recognized() {
        let doc = load(
            "type: test\nname: foo\nuid: bar\nfiles:\n  - test_file.gb\n  - /abs/x.gb\n\
             parent:\n  - ../root.yaml\n  - {type: strain, uid: s1}\n",
        )
        .unwrap();
        assert_eq!(doc.doc_type, "test");
        assert_eq!(doc.name.as_deref(), Some("foo"));
        assert_eq!(doc.uid.as_deref(), Some("bar"));
        assert_eq!(
            doc.files,
            vec![
                PathBuf::from("/repo/plasmids/test_file.gb"),
                PathBuf::from("/abs/x.gb")
            ]
        );
        assert_eq!(
            doc.parent_links,
            vec![
                LinkSpec::ByFile(PathBuf::from("../root.yaml")),
                LinkSpec::ByTypeUid {
                    doc_type: "strain".into(),
                    uid: "s1".into()
                },
            ]
        );
        assert!(doc.extra.is_empty());
        assert!(!doc.metadata_only);
    }

    #[test]
    fn test_type_required() {
        let err = load("name: foo\nuid: bar\nfiles: []\n").unwrap_err();
        assert!(matches!(err, TameError::Schema { .. }));
    }

    #[test]
    fn test_files_required_unless_metadata_only() {
        let err = load("type: test\n").unwrap_err();
        assert!(matches!(err, TameError::Schema { .. }));

        let doc = load_with("type: test\n", &permissive()).unwrap();
        assert!(doc.metadata_only);
        assert!(doc.files.is_empty());

        let mut by_type = LoadOptions::default();
        by_type.metadata_only_types.insert("test".to_string());
        assert!(load_with("type: test\n", &by_type).unwrap().metadata_only);
    }

    #[test]
    fn test_wrong_shapes_are_schema_errors() {
        for yaml in [
            "type: test\nname: [foo, bar]\nfiles: []\n",
            "type: test\nuid: [foo]\nfiles: []\n",
            "type: test\nfiles: foobar\n",
            "type: test\nfiles: []\nparent: foobar\n",
            "type: [x]\nfiles: []\n",
            "- just\n- a list\n",
        ] {
            let err = load_with(yaml, &permissive()).unwrap_err();
            assert!(
                matches!(err, TameError::Schema { .. }),
                "expected schema error for {yaml:?}"
            );
        }
    }

    #[test]
    fn test_user_keys_preserved_in_order() {
        let doc = load("type: test\nzeta: 1\nalpha: userval\nfiles: []\n").unwrap();
        let keys: Vec<&str> = doc.extra.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(doc.extra["alpha"], Value::String("userval".into()));
    }

    #[test]
    fn test_link_forms() {
        let p = Path::new("/r/a.yaml");
        let parse = |yaml: &str| parse_link_spec(p, 0, serde_yaml::from_str(yaml).unwrap());

        assert_eq!(
            parse("{file: missing.yaml}").unwrap(),
            LinkSpec::ByFile(PathBuf::from("missing.yaml"))
        );
        assert_eq!(
            parse("{type: plasmid, name: pUC19}").unwrap(),
            LinkSpec::ByTypeName {
                doc_type: "plasmid".into(),
                name: "pUC19".into()
            }
        );
        assert!(parse("{type: plasmid, name: a, uid: b}").is_err());
        assert!(parse("{file: a.yaml, type: plasmid}").is_err());
        assert!(parse("{type: plasmid}").is_err());
        assert!(parse("{name: orphan}").is_err());
        assert!(parse("{type: plasmid, name: a, colour: red}").is_err());
        assert!(parse("42").is_err());
    }

    #[test]
    fn test_malformed_link_names_position() {
        let err = load("type: t\nfiles: []\nparent:\n  - a.yaml\n  - {type: x}\n").unwrap_err();
        assert!(err.to_string().contains("parent #1"));
    }
}
