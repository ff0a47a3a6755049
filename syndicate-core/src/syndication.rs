//! Data model shared by the reconciliation engine and the orchestrator:
//! posts, syndication ids and the per-run accumulator of new ids.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::frontmatter::{is_truthy, Frontmatter};

/// Frontmatter key under which a silo's remote id is recorded.
pub fn syndicate_key_for(silo: &str) -> String {
    format!("{}_syndicate_id", silo.to_lowercase())
}

/// A remote post identifier. Silos hand out either integers or strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SyndicationId {
    Int(i64),
    Str(String),
}

impl SyndicationId {
    /// Zero and the empty string are not usable ids.
    pub fn is_valid(&self) -> bool {
        match self {
            SyndicationId::Int(n) => *n != 0,
            SyndicationId::Str(s) => !s.is_empty(),
        }
    }

    /// Read an id back out of a JSON value as returned by a silo API.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(SyndicationId::Int),
            serde_json::Value::String(s) => Some(SyndicationId::Str(s.clone())),
            _ => None,
        }
        .filter(SyndicationId::is_valid)
    }

    pub fn to_yaml(&self) -> Value {
        match self {
            SyndicationId::Int(n) => Value::from(*n),
            SyndicationId::Str(s) => Value::from(s.as_str()),
        }
    }
}

impl From<i64> for SyndicationId {
    fn from(n: i64) -> Self {
        SyndicationId::Int(n)
    }
}

impl From<&str> for SyndicationId {
    fn from(s: &str) -> Self {
        SyndicationId::Str(s.to_owned())
    }
}

impl std::str::FromStr for SyndicationId {
    type Err = std::convert::Infallible;

    /// Numeric input becomes [`SyndicationId::Int`], anything else a string id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<i64>()
            .map(SyndicationId::Int)
            .unwrap_or_else(|_| SyndicationId::Str(s.to_owned())))
    }
}

impl fmt::Display for SyndicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyndicationId::Int(n) => write!(f, "{n}"),
            SyndicationId::Str(s) => f.write_str(s),
        }
    }
}

/// A post file, keyed by its path in the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub path: String,
    pub frontmatter: Frontmatter,
}

impl Post {
    pub fn new(path: impl Into<String>, frontmatter: Frontmatter) -> Self {
        Self {
            path: path.into(),
            frontmatter,
        }
    }

    /// The header `title`, or the file stem when there is none.
    pub fn title(&self) -> String {
        self.frontmatter
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| {
                Path::new(&self.path)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| self.path.clone())
            })
    }

    /// The recorded id for `silo`, if the header holds a truthy one.
    pub fn syndicate_id_for(&self, silo: &str) -> Option<&Value> {
        self.frontmatter
            .get(&syndicate_key_for(silo))
            .filter(|v| is_truthy(v))
    }

    pub fn is_syndicated_to(&self, silo: &str) -> bool {
        self.syndicate_id_for(silo).is_some()
    }
}

/// New ids for one run, `path -> silo -> id`.
///
/// Entries are only ever added; a `(path, silo)` pair that already holds an
/// id keeps it. Serialises to the JSON carried between steps of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingUpdate(BTreeMap<String, BTreeMap<String, SyndicationId>>);

impl PendingUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id` for `(path, silo)` unless one is already present.
    /// Returns whether the entry was added.
    pub fn record(&mut self, path: &str, silo: &str, id: SyndicationId) -> bool {
        let by_silo = self.0.entry(path.to_owned()).or_default();
        if by_silo.contains_key(silo) {
            return false;
        }
        by_silo.insert(silo.to_owned(), id);
        true
    }

    /// Fold another accumulator in without overwriting.
    pub fn merge(&mut self, other: PendingUpdate) {
        for (path, by_silo) in other.0 {
            for (silo, id) in by_silo {
                self.record(&path, &silo, id);
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&BTreeMap<String, SyndicationId>> {
        self.0.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, SyndicationId>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(raw: &str) -> Post {
        Post::new("posts/a.md", Frontmatter::parse(raw).unwrap())
    }

    #[test]
    fn syndicate_key_is_lowercased() {
        assert_eq!(syndicate_key_for("DEV"), "dev_syndicate_id");
        assert_eq!(syndicate_key_for("Medium"), "medium_syndicate_id");
    }

    #[test]
    fn falsy_records_count_as_absent() {
        assert!(post("---\ndev_syndicate_id: 42\n---\n").is_syndicated_to("dev"));
        assert!(post("---\ndev_syndicate_id: abc\n---\n").is_syndicated_to("DEV"));
        assert!(!post("---\ndev_syndicate_id: null\n---\n").is_syndicated_to("dev"));
        assert!(!post("---\ndev_syndicate_id: 0\n---\n").is_syndicated_to("dev"));
        assert!(!post("---\ntitle: x\n---\n").is_syndicated_to("dev"));
    }

    #[test]
    fn title_falls_back_to_file_stem() {
        assert_eq!(post("---\ntitle: Hello\n---\n").title(), "Hello");
        assert_eq!(post("---\n---\n").title(), "a");
    }

    #[test]
    fn ids_from_json_reject_falsy_values() {
        assert_eq!(
            SyndicationId::from_json(&serde_json::json!(42)),
            Some(SyndicationId::Int(42))
        );
        assert_eq!(
            SyndicationId::from_json(&serde_json::json!("x1")),
            Some(SyndicationId::from("x1"))
        );
        assert_eq!(SyndicationId::from_json(&serde_json::json!(0)), None);
        assert_eq!(SyndicationId::from_json(&serde_json::json!(null)), None);
    }

    #[test]
    fn pending_update_merges_without_overwriting() {
        let mut acc = PendingUpdate::new();
        assert!(acc.record("posts/a.md", "dev", 1.into()));
        assert!(!acc.record("posts/a.md", "dev", 2.into()));

        let mut later = PendingUpdate::new();
        later.record("posts/a.md", "dev", 3.into());
        later.record("posts/b.md", "dev", 4.into());
        acc.merge(later);

        assert_eq!(acc.get("posts/a.md").unwrap()["dev"], SyndicationId::Int(1));
        assert_eq!(acc.get("posts/b.md").unwrap()["dev"], SyndicationId::Int(4));
    }

    #[test]
    fn pending_update_json_is_carried_between_steps() {
        let mut acc = PendingUpdate::new();
        acc.record("posts/a.md", "dev", 42.into());
        acc.record("posts/a.md", "medium", "abc".into());
        let json = acc.to_json().unwrap();
        assert_eq!(json, r#"{"posts/a.md":{"dev":42,"medium":"abc"}}"#);
        assert_eq!(PendingUpdate::from_json(&json).unwrap(), acc);
        assert!(PendingUpdate::from_json("").unwrap().is_empty());
    }
}
