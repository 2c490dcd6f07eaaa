//! Lock information exchanged with Terraform's HTTP backend client

use serde::{Deserialize, Serialize};

/// Information about a state lock
///
/// Field names match what Terraform sends and expects back. Apart from
/// `id`, every field is diagnostic and stored verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockInfo {
    /// Client-generated identifier for one lock acquisition
    #[serde(rename = "ID")]
    pub id: String,
    /// The operation being performed (e.g., "OperationTypeApply")
    #[serde(rename = "Operation")]
    pub operation: String,
    #[serde(rename = "Info")]
    pub info: String,
    /// Who acquired the lock (user@hostname, as reported by Terraform)
    #[serde(rename = "Who")]
    pub who: String,
    /// Terraform version of the lock holder
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Created")]
    pub created: String,
    #[serde(rename = "Path")]
    pub path: String,
}

impl LockInfo {
    /// Create a lock carrying only an ID and an operation
    pub fn new(id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            operation: operation.into(),
            ..Default::default()
        }
    }

    /// Whether the lock carries a usable ID
    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }
}
