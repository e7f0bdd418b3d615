use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a kind of resource by its API group, version, and kind.
///
/// The core API group is represented by an empty `group`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct Gvk {
    pub group: String,
    pub version: String,
    pub kind: String,
}

// === impl Gvk ===

impl Gvk {
    pub fn new(group: impl ToString, version: impl ToString, kind: impl ToString) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        }
    }

    /// Returns the `apiVersion` string for this kind, e.g. `apps/v1` or `v1`.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

/// Renders as `group/version:kind`.
impl fmt::Display for Gvk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.group, self.version, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Gvk::new("apps", "v1", "Deployment").to_string(), "apps/v1:Deployment");
        assert_eq!(Gvk::new("", "v1", "Pod").to_string(), "/v1:Pod");
    }

    #[test]
    fn api_version() {
        assert_eq!(Gvk::new("apps", "v1", "Deployment").api_version(), "apps/v1");
        assert_eq!(Gvk::new("", "v1", "Pod").api_version(), "v1");
    }

    #[test]
    fn ordering() {
        let mut gvks = vec![
            Gvk::new("b", "v1", "X"),
            Gvk::new("a", "v2", "X"),
            Gvk::new("a", "v1", "Y"),
            Gvk::new("a", "v1", "X"),
        ];
        gvks.sort();
        assert_eq!(
            gvks,
            vec![
                Gvk::new("a", "v1", "X"),
                Gvk::new("a", "v1", "Y"),
                Gvk::new("a", "v2", "X"),
                Gvk::new("b", "v1", "X"),
            ]
        );
    }
}
