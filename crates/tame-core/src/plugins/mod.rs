//! Extension points: per-type describers and locators, and search matchers.

pub mod describer;
pub mod locator;
pub mod matcher;

pub use describer::{
    DefaultDescriber, Describer, DescriberRegistry, DocumentView, TemplateDescriber,
};
pub use locator::{FilesLocator, Locator, LocatorRegistry};
pub use matcher::{AllOf, AnyOf, FieldMatcher, MatchType, Matcher};
