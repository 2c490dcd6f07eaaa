//! Resource keys identifying one remote state file

use std::fmt;

/// Identity of one lockable state file, scoped per principal and project
///
/// The same string is the blob key of the state file and the routing key
/// of its lock actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Suffix appended to the project name
    pub const STATE_SUFFIX: &'static str = ".tfstate";

    pub fn new(principal: &str, project: &str) -> Self {
        Self(format!("{}/{}{}", principal, project, Self::STATE_SUFFIX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Object name of the lock record stored next to the state under `key`
    pub fn lock_key(key: &str) -> String {
        format!("{}.lock", key)
    }

    /// Check that a key component cannot escape its namespace
    ///
    /// Rejects empty strings, path separators, `.`/`..` and control characters.
    pub fn is_valid_component(component: &str) -> bool {
        !component.is_empty()
            && component != "."
            && component != ".."
            && !component
                .chars()
                .any(|c| c == '/' || c == '\\' || c.is_control())
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
