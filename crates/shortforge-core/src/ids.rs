//! Run identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one pipeline run. Random per run; the short form names the
/// run workspace and tags log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Leading eight hex digits of the id.
    #[must_use]
    pub fn short(&self) -> String {
        let mut hex = self.0.simple().to_string();
        hex.truncate(8);
        hex
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_run_gets_a_fresh_id() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn short_form_leads_the_hyphenated_display() {
        let id = RunId::new();
        let short = id.short();
        assert_eq!(short.len(), 8);
        assert!(id.to_string().starts_with(&short));
    }

    #[test]
    fn serializes_as_a_bare_uuid_string() {
        let id = RunId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: RunId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
