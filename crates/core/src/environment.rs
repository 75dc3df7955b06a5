//! Wire model for resolved configuration.
//!
//! [`Environment`] is the JSON payload returned to clients: an ordered list
//! of property sources plus the label and commit that produced them.
//! [`Locations`] is the internal resolution result mapping a request to
//! filesystem search paths on a specific revision.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// Placeholder for `/` in path segments.
///
/// `(_)` is uncommon in a git ref name, but `/` cannot appear in a single
/// HTTP path segment, so clients send `feature(_)x` for `feature/x`.
pub const SLASH_PLACEHOLDER: &str = "(_)";

/// Replace the `(_)` placeholder with `/` in a name or label.
pub fn normalize(s: &str) -> String {
    s.replace(SLASH_PLACEHOLDER, "/")
}

/// Replace `/` with the `(_)` placeholder in a name or label.
pub fn denormalize(s: &str) -> String {
    s.replace('/', SLASH_PLACEHOLDER)
}

/// A named bag of configuration keys contributed by one property file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PropertySource {
    pub name: String,
    #[schema(value_type = Object)]
    pub source: serde_json::Map<String, serde_json::Value>,
}

/// Resolved configuration for an (application, profiles, label) request.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub name: String,
    pub profiles: Vec<String>,
    pub label: Option<String>,
    pub version: Option<String>,
    pub state: Option<String>,
    pub property_sources: Vec<PropertySource>,
}

impl Environment {
    pub fn new(name: impl Into<String>, profiles: Vec<String>) -> Self {
        Self {
            name: name.into(),
            profiles,
            label: None,
            version: None,
            state: None,
            property_sources: Vec::new(),
        }
    }

    pub fn add(&mut self, property_source: PropertySource) {
        self.property_sources.push(property_source);
    }
}

/// The search locations for an (application, profile, label) triple.
///
/// `version` is the full hex SHA of `HEAD` after the working copy was
/// brought to `label`.
#[derive(Clone, Debug)]
pub struct Locations {
    pub application: String,
    pub profile: String,
    pub label: String,
    pub version: String,
    pub search_paths: Vec<PathBuf>,
}
