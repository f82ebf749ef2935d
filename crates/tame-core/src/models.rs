//! Shared typed models used across loading, indexing, and graph passes.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

/// Generic, opaque value of a user-defined metadata field.
pub type Value = serde_yaml::Value;

// ---------------------------------------------------------------------------
// Reserved keys
// ---------------------------------------------------------------------------

pub const KEY_TYPE: &str = "type";
pub const KEY_NAME: &str = "name";
pub const KEY_UID: &str = "uid";
pub const KEY_FILES: &str = "files";
pub const KEY_PARENT: &str = "parent";

/// Name of the repository marker file at the tracked root.
pub const ROOT_FILE_NAME: &str = "tame.yaml";

// ---------------------------------------------------------------------------
// DocumentId
// ---------------------------------------------------------------------------

/// Dense handle of a loaded document, assigned in ascending path order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DocumentId(pub usize);

impl DocumentId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Parent links
// ---------------------------------------------------------------------------

/// The resolution rule a link is addressed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LinkRule {
    ByFile,
    ByTypeName,
    ByTypeUid,
}

impl fmt::Display for LinkRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LinkRule::ByFile => "by file",
            LinkRule::ByTypeName => "by type/name",
            LinkRule::ByTypeUid => "by type/uid",
        };
        f.write_str(label)
    }
}

/// One entry of a document's `parent` list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LinkSpec {
    /// Path as authored; relative paths are anchored at the referencing
    /// document's directory during resolution.
    ByFile(PathBuf),
    ByTypeName { doc_type: String, name: String },
    ByTypeUid { doc_type: String, uid: String },
}

impl LinkSpec {
    pub fn rule(&self) -> LinkRule {
        match self {
            LinkSpec::ByFile(_) => LinkRule::ByFile,
            LinkSpec::ByTypeName { .. } => LinkRule::ByTypeName,
            LinkSpec::ByTypeUid { .. } => LinkRule::ByTypeUid,
        }
    }

    /// Human-readable description of what the link points at.
    pub fn target_label(&self) -> String {
        match self {
            LinkSpec::ByFile(path) => format!("file={}", path.display()),
            LinkSpec::ByTypeName { doc_type, name } => format!("type={doc_type}, name={name}"),
            LinkSpec::ByTypeUid { doc_type, uid } => format!("type={doc_type}, uid={uid}"),
        }
    }
}

// ---------------------------------------------------------------------------
// MetadataDocument
// ---------------------------------------------------------------------------

/// A single loaded metadata document.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataDocument {
    /// Canonical absolute path of the source file; the document's identity.
    pub path: PathBuf,
    pub doc_type: String,
    pub name: Option<String>,
    pub uid: Option<String>,
    /// Tracked files, absolute. Entries may still be glob patterns.
    pub files: Vec<PathBuf>,
    pub parent_links: Vec<LinkSpec>,
    /// Every non-reserved field, in authored order.
    pub extra: IndexMap<String, Value>,
    /// Set when the document was accepted without a `files` key.
    pub metadata_only: bool,
}

impl MetadataDocument {
    /// Directory the document's relative references are anchored at.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }

    /// Short label for listings: name, then uid, then file name.
    pub fn label(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        if let Some(uid) = &self.uid {
            return uid.clone();
        }
        self.path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Look up a field by key, reserved keys included.
    pub fn field(&self, key: &str) -> Option<String> {
        match key {
            KEY_TYPE => Some(self.doc_type.clone()),
            KEY_NAME => self.name.clone(),
            KEY_UID => self.uid.clone(),
            "path" => Some(self.path.display().to_string()),
            _ => self.extra.get(key).map(render_value),
        }
    }
}

/// Render a generic value on one line: scalars plain, collections as JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Tagged(tagged) => render_value(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => {
            serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: Option<&str>, uid: Option<&str>) -> MetadataDocument {
        MetadataDocument {
            path: PathBuf::from("/repo/plasmids/p1.yaml"),
            doc_type: "plasmid".to_string(),
            name: name.map(str::to_string),
            uid: uid.map(str::to_string),
            files: vec![],
            parent_links: vec![],
            extra: IndexMap::new(),
            metadata_only: true,
        }
    }

    #[test]
    fn label_prefers_name_then_uid_then_file() {
        assert_eq!(doc(Some("pUC19"), Some("p001")).label(), "pUC19");
        assert_eq!(doc(None, Some("p001")).label(), "p001");
        assert_eq!(doc(None, None).label(), "p1.yaml");
    }

    #[test]
    fn render_value_inlines_collections() {
        let value: Value = serde_yaml::from_str("[1, two, {k: v}]").unwrap();
        assert_eq!(render_value(&value), r#"[1,"two",{"k":"v"}]"#);
        assert_eq!(render_value(&Value::Bool(true)), "true");
        assert_eq!(render_value(&Value::String("x y".into())), "x y");
    }

    #[test]
    fn link_labels_name_the_rule_inputs() {
        let by_uid = LinkSpec::ByTypeUid {
            doc_type: "plasmid".into(),
            uid: "p001".into(),
        };
        assert_eq!(by_uid.rule(), LinkRule::ByTypeUid);
        assert_eq!(by_uid.target_label(), "type=plasmid, uid=p001");
        let by_file = LinkSpec::ByFile(PathBuf::from("../a.yaml"));
        assert_eq!(by_file.target_label(), "file=../a.yaml");
    }

    #[test]
    fn field_reaches_reserved_and_extra_keys() {
        let mut d = doc(Some("pUC19"), None);
        d.extra
            .insert("backbone".to_string(), Value::String("pMB1".into()));
        assert_eq!(d.field("type").as_deref(), Some("plasmid"));
        assert_eq!(d.field("backbone").as_deref(), Some("pMB1"));
        assert_eq!(d.field("uid"), None);
    }
}
