//! Metadata search: key/value matchers evaluated against a document and the
//! documents it inherits from.
//!
//! A term is written `key=value`, `key<value`, `key<=value`, `key>value`,
//! `key>=value`, or `key~regex`. A term with no operator searches every key.
//!
//! `=` is a wildcard match: the value is implicitly wrapped in `*`, so
//! `organism=yeast` matches `S. cerevisiae (yeast)`. When the value reads as a
//! number or date, `=` compares numerically instead. The ordering operators
//! accept only numbers and dates, compared as `document OP query`.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::errors::{TameError, TameResult};
use crate::models::{MetadataDocument, Value, KEY_NAME, KEY_TYPE, KEY_UID};

/// Decides whether a document matches a query.
pub trait Matcher: Send + Sync {
    /// `ancestors` holds every document `doc` inherits from, in id order.
    fn matches(&self, doc: &MetadataDocument, ancestors: &[&MetadataDocument]) -> bool;
}

// ---------------------------------------------------------------------------
// Match types and comparable values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchType {
    Equal,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Regex,
}

impl MatchType {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            MatchType::Equal => ordering == Ordering::Equal,
            MatchType::Less => ordering == Ordering::Less,
            MatchType::LessEqual => ordering != Ordering::Greater,
            MatchType::Greater => ordering == Ordering::Greater,
            MatchType::GreaterEqual => ordering != Ordering::Less,
            MatchType::Regex => false,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            MatchType::Equal => "=",
            MatchType::Less => "<",
            MatchType::LessEqual => "<=",
            MatchType::Greater => ">",
            MatchType::GreaterEqual => ">=",
            MatchType::Regex => "~",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A value that supports ordering: a timestamp or a number.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Comparable {
    Date(NaiveDateTime),
    Number(f64),
}

impl Comparable {
    /// Dates win over numbers; anything else is not comparable.
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(date) = parse_date(text) {
            return Some(Comparable::Date(date));
        }
        text.parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Comparable::Number)
    }

    fn compare(&self, other: &Comparable) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Date(a), Comparable::Date(b)) => Some(a.cmp(b)),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

fn parse_date(text: &str) -> Option<NaiveDateTime> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(text, format) {
            return Some(stamp);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
}

/// Regex for a shell-style wildcard, implicitly extended with `*` on both
/// sides.
fn wildcard_regex(value: &str) -> String {
    let mut out = String::from("^(?s:.*");
    let mut literal = String::new();
    for ch in value.chars() {
        match ch {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if ch == '*' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }
    out.push_str(&regex::escape(&literal));
    out.push_str(".*)$");
    out
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// FieldMatcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Predicate {
    Pattern(Regex),
    Compare(MatchType, Comparable),
}

/// Matches one key/value condition anywhere in a document's fields.
///
/// Nested mappings are searched by their inner keys, and sequences by their
/// elements under the enclosing key.
#[derive(Debug, Clone)]
pub struct FieldMatcher {
    key: Option<String>,
    include_parents: bool,
    predicate: Predicate,
}

impl FieldMatcher {
    /// Build a matcher for `value` under `key`, or under any key when `key`
    /// is `None`. Parents are searched by default.
    pub fn new(key: Option<&str>, value: &str, match_type: MatchType) -> TameResult<Self> {
        let term = match key {
            Some(key) => format!("{key}{match_type}{value}"),
            None => value.to_string(),
        };
        let invalid = |message: String| TameError::InvalidQuery {
            term: term.clone(),
            message,
        };

        let comparable = Comparable::parse(value);
        let predicate = match (match_type, comparable) {
            (MatchType::Regex, _) => {
                let re = Regex::new(&format!("^(?:{value})"))
                    .map_err(|e| invalid(e.to_string()))?;
                Predicate::Pattern(re)
            }
            (MatchType::Equal, None) => {
                let re = Regex::new(&wildcard_regex(value)).map_err(|e| invalid(e.to_string()))?;
                Predicate::Pattern(re)
            }
            (_, Some(target)) => Predicate::Compare(match_type, target),
            (_, None) => {
                return Err(invalid(format!(
                    "'{match_type}' needs a number or a date, got '{value}'"
                )))
            }
        };

        Ok(Self {
            key: key.map(str::to_string),
            include_parents: true,
            predicate,
        })
    }

    pub fn include_parents(mut self, include: bool) -> Self {
        self.include_parents = include;
        self
    }

    /// Parse a single search term such as `temperature>=30`.
    pub fn parse(term: &str) -> TameResult<Self> {
        let Some(at) = term.find(['=', '<', '>', '~']) else {
            return Self::new(None, term, MatchType::Equal);
        };
        let key = term[..at].trim();
        let rest = &term[at..];
        let (match_type, width) = if rest.starts_with("<=") {
            (MatchType::LessEqual, 2)
        } else if rest.starts_with(">=") {
            (MatchType::GreaterEqual, 2)
        } else {
            match rest.as_bytes()[0] {
                b'<' => (MatchType::Less, 1),
                b'>' => (MatchType::Greater, 1),
                b'~' => (MatchType::Regex, 1),
                _ => (MatchType::Equal, 1),
            }
        };
        if key.is_empty() {
            return Err(TameError::InvalidQuery {
                term: term.to_string(),
                message: "missing key before the operator".to_string(),
            });
        }
        Self::new(Some(key), rest[width..].trim(), match_type)
    }

    fn key_selected(&self, key: &str) -> bool {
        self.key.as_deref().map_or(true, |k| k == key)
    }

    fn value_matches(&self, text: &str) -> bool {
        match &self.predicate {
            Predicate::Pattern(re) => re.is_match(text),
            Predicate::Compare(match_type, target) => Comparable::parse(text)
                .and_then(|value| value.compare(target))
                .is_some_and(|ordering| match_type.accepts(ordering)),
        }
    }

    fn entry_matches(&self, key: &str, value: &Value) -> bool {
        match value {
            Value::Mapping(map) => map
                .iter()
                .any(|(k, v)| k.as_str().is_some_and(|k| self.entry_matches(k, v))),
            Value::Sequence(items) => items.iter().any(|item| self.entry_matches(key, item)),
            Value::Tagged(tagged) => self.entry_matches(key, &tagged.value),
            scalar => {
                self.key_selected(key)
                    && scalar_text(scalar).is_some_and(|text| self.value_matches(&text))
            }
        }
    }

    fn document_matches(&self, doc: &MetadataDocument) -> bool {
        let reserved = [
            (KEY_TYPE, Some(doc.doc_type.as_str())),
            (KEY_NAME, doc.name.as_deref()),
            (KEY_UID, doc.uid.as_deref()),
        ];
        reserved.iter().any(|(key, value)| {
            value.is_some_and(|v| self.key_selected(key) && self.value_matches(v))
        }) || doc.extra.iter().any(|(k, v)| self.entry_matches(k, v))
    }
}

impl Matcher for FieldMatcher {
    fn matches(&self, doc: &MetadataDocument, ancestors: &[&MetadataDocument]) -> bool {
        self.document_matches(doc)
            || (self.include_parents && ancestors.iter().any(|a| self.document_matches(a)))
    }
}

// ---------------------------------------------------------------------------
// Combinators
// ---------------------------------------------------------------------------

/// Matches when every inner matcher matches. Empty matches everything.
#[derive(Default)]
pub struct AllOf(pub Vec<Box<dyn Matcher>>);

/// Matches when any inner matcher matches. Empty matches everything.
#[derive(Default)]
pub struct AnyOf(pub Vec<Box<dyn Matcher>>);

impl Matcher for AllOf {
    fn matches(&self, doc: &MetadataDocument, ancestors: &[&MetadataDocument]) -> bool {
        self.0.iter().all(|m| m.matches(doc, ancestors))
    }
}

impl Matcher for AnyOf {
    fn matches(&self, doc: &MetadataDocument, ancestors: &[&MetadataDocument]) -> bool {
        self.0.is_empty() || self.0.iter().any(|m| m.matches(doc, ancestors))
    }
}

impl fmt::Debug for AllOf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllOf").field("matchers", &self.0.len()).finish()
    }
}

impl fmt::Debug for AnyOf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyOf").field("matchers", &self.0.len()).finish()
    }
}
