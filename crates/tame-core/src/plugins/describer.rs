//! Type-specific describers and the dispatcher that picks one.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{render_value, MetadataDocument};

/// Read-only view handed to a describer: the document and its resolved
/// parents, in authored order.
#[derive(Debug, Clone, Copy)]
pub struct DocumentView<'a> {
    pub document: &'a MetadataDocument,
    pub parents: &'a [&'a MetadataDocument],
}

/// Renders a human-readable description of one document.
///
/// Implement this to give a metadata type its own description. The returned
/// text is printed verbatim.
pub trait Describer: Send + Sync {
    fn describe(&self, view: &DocumentView<'_>) -> String;
}

// ---------------------------------------------------------------------------
// Built-in describers
// ---------------------------------------------------------------------------

/// Fallback: every user-defined field as `key: value`, keys sorted.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDescriber;

impl Describer for DefaultDescriber {
    fn describe(&self, view: &DocumentView<'_>) -> String {
        let mut pairs: Vec<(&String, String)> = view
            .document
            .extra
            .iter()
            .map(|(k, v)| (k, render_value(v)))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs
            .into_iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// Template placeholders, compiled once
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_.-]+)\}").unwrap());

/// Describer driven by a template with `{field}` placeholders.
///
/// `{type}`, `{name}`, `{uid}`, `{path}` and any user-defined key are
/// substituted; `{parents}` becomes a comma-separated list of parent labels.
/// Unknown placeholders render as an empty string.
#[derive(Debug, Clone)]
pub struct TemplateDescriber {
    template: String,
}

impl TemplateDescriber {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl Describer for TemplateDescriber {
    fn describe(&self, view: &DocumentView<'_>) -> String {
        PLACEHOLDER_RE
            .replace_all(&self.template, |caps: &regex::Captures<'_>| {
                let key = &caps[1];
                if key == "parents" {
                    return view
                        .parents
                        .iter()
                        .map(|p| p.label())
                        .collect::<Vec<_>>()
                        .join(", ");
                }
                view.document.field(key).unwrap_or_default()
            })
            .into_owned()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Describers keyed by metadata type, with [`DefaultDescriber`] as fallback.
pub struct DescriberRegistry {
    by_type: HashMap<String, Box<dyn Describer>>,
    fallback: DefaultDescriber,
}

impl Default for DescriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DescriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&String> = self.by_type.keys().collect();
        types.sort();
        f.debug_struct("DescriberRegistry")
            .field("types", &types)
            .finish()
    }
}

impl DescriberRegistry {
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            fallback: DefaultDescriber,
        }
    }

    /// Registry with one [`TemplateDescriber`] per `(type, template)` pair.
    pub fn from_templates<'a>(
        templates: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Self {
        let mut registry = Self::new();
        for (doc_type, template) in templates {
            registry.register(doc_type.clone(), TemplateDescriber::new(template.clone()));
        }
        registry
    }

    /// Register `describer` for `doc_type`, replacing any previous one.
    pub fn register<D: Describer + 'static>(&mut self, doc_type: impl Into<String>, describer: D) {
        self.by_type.insert(doc_type.into(), Box::new(describer));
    }

    pub fn get(&self, doc_type: &str) -> Option<&dyn Describer> {
        self.by_type.get(doc_type).map(|d| &**d)
    }

    /// Describe with the type's describer, or the default renderer.
    pub fn describe(&self, view: &DocumentView<'_>) -> String {
        match self.get(&view.document.doc_type) {
            Some(describer) => describer.describe(view),
            None => self.fallback.describe(view),
        }
    }
}
