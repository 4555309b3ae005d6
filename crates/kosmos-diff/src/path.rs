use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Address of a node inside a JSON value: the sequence of object keys
/// leading to it. The empty path is the root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValuePath(Vec<String>);

impl ValuePath {
    /// The root path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from its segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// A new path one level deeper.
    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.to_string());
        Self(segments)
    }

    /// The path segments.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Returns `true` for the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if `self` equals `other` or is one of its ancestors.
    pub fn is_prefix_of(&self, other: &ValuePath) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Returns `true` if one path contains the other.
    pub fn overlaps(&self, other: &ValuePath) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }

    /// Look up the node at this path.
    pub fn lookup<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        self.0
            .iter()
            .try_fold(value, |node, key| node.as_object()?.get(key))
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("$");
        }
        write!(f, "$.{}", self.0.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefix_and_overlap() {
        let a = ValuePath::from_segments(["stats"]);
        let ab = a.child("hp");
        assert!(a.is_prefix_of(&ab));
        assert!(!ab.is_prefix_of(&a));
        assert!(a.overlaps(&ab) && ab.overlaps(&a));
        assert!(ValuePath::root().is_prefix_of(&ab));
        assert!(!ab.overlaps(&ValuePath::from_segments(["stats", "mp"])));
    }

    #[test]
    fn lookup_walks_objects_only() {
        let v = json!({"a": {"b": 1}, "list": [1, 2]});
        assert_eq!(ValuePath::from_segments(["a", "b"]).lookup(&v), Some(&json!(1)));
        assert_eq!(ValuePath::root().lookup(&v), Some(&v));
        assert_eq!(ValuePath::from_segments(["list", "0"]).lookup(&v), None);
        assert_eq!(ValuePath::from_segments(["missing"]).lookup(&v), None);
    }

    #[test]
    fn display_and_serde() {
        let p = ValuePath::from_segments(["a", "b"]);
        assert_eq!(p.to_string(), "$.a.b");
        assert_eq!(ValuePath::root().to_string(), "$");
        assert_eq!(serde_json::to_value(&p).unwrap(), json!(["a", "b"]));
    }
}
