//! Inbound query documents.
//!
//! ```json
//! {
//!   "selections": [
//!     { "field": "Query.catById", "alias": "misu", "args": { "id": "…" }, "select": ["owner"] },
//!     { "field": "Query.users" }
//!   ]
//! }
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};

/// A request: a flat list of root field selections.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryDocument {
    pub selections: Vec<Selection>,
}

/// One root field to resolve.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Selection {
    /// `Query.fieldName` or `Mutation.fieldName`.
    pub field: String,
    /// Response key; defaults to the field name.
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub args: Map<String, Value>,
    /// Child fields of the returned cat(s) to resolve, e.g. `owner`.
    #[serde(default)]
    pub select: Vec<String>,
}
