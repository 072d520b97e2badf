//! Collection names

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

static COLLECTION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,62}$").expect("Invalid regex"));

/// Tables of the CRM that take part in synchronization, in sync order.
pub const DEFAULT_COLLECTIONS: [&str; 21] = [
    "users",
    "tenders",
    "estimates",
    "works",
    "employees",
    "employee_assignments",
    "employee_reviews",
    "employee_permits",
    "work_expenses",
    "office_expenses",
    "customers",
    "contracts",
    "seals",
    "seal_transfers",
    "bonus_requests",
    "correspondence",
    "proxies",
    "calendar_events",
    "notifications",
    "documents",
    "audit_log",
];

/// A validated collection name.
///
/// Names are lowercase identifiers so they can be used verbatim as a URL
/// path segment and as a key in the local store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Collection(String);

impl Collection {
    /// Validate and wrap a collection name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if COLLECTION_NAME.is_match(&name) {
            Ok(Self(name))
        } else {
            Err(Error::InvalidInput(format!(
                "invalid collection name '{name}': expected a lowercase identifier"
            )))
        }
    }

    /// The collection name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The full default collection list.
    pub fn defaults() -> Vec<Self> {
        DEFAULT_COLLECTIONS
            .iter()
            .map(|name| Self((*name).to_string()))
            .collect()
    }

    /// Whether this is one of the default collections.
    pub fn is_default(&self) -> bool {
        DEFAULT_COLLECTIONS.contains(&self.0.as_str())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl AsRef<str> for Collection {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Collection {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Collection> for String {
    fn from(value: Collection) -> Self {
        value.0
    }
}
