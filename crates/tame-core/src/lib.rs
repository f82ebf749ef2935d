//! tame core library: loads YAML metadata documents from a repository, links
//! them into a parent graph, and validates, describes, searches, and collects them.
//!
//! The entry point is [`Engine`]; the passes it runs are also usable on their
//! own through the `indexer` and `graph` modules.

pub mod cancel;
pub mod config;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod indexer;
pub mod models;
pub mod plugins;

pub use cancel::CancelToken;
pub use config::{find_root, EngineOptions, RepoConfig};
pub use engine::Engine;
pub use errors::{ErrorKind, TameError, TameResult, Violation};
pub use graph::collector::{CollectReport, CopyEntry, CopyPlan, Layout};
pub use graph::validator::ValidationReport;
pub use models::{DocumentId, LinkRule, LinkSpec, MetadataDocument, Value};
pub use plugins::{
    AllOf, AnyOf, Describer, DescriberRegistry, DocumentView, FieldMatcher, Locator,
    LocatorRegistry, MatchType, Matcher,
};
