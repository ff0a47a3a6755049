//! # frontmatter: metadata header + body codec for post documents
//!
//! A post document is a YAML mapping fenced by `---` lines, followed by an
//! opaque body:
//!
//! ```text
//! ---
//! title: Hello
//! tags: [rust]
//! ---
//! Body text, kept byte for byte.
//! ```
//!
//! [`Frontmatter::parse`] and [`Frontmatter::serialize`] round-trip any header
//! expressible in YAML together with any body text. The header is a
//! [`serde_yaml::Mapping`], which keeps keys in insertion order, so untouched
//! keys come back exactly where they were and merged keys are appended.

use serde_yaml::{Mapping, Value};

use crate::error::FrontmatterError;

const DELIMITER: &str = "---\n";

/// A parsed post document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frontmatter {
    pub header: Mapping,
    pub body: String,
}

impl Frontmatter {
    pub fn new(header: Mapping, body: impl Into<String>) -> Self {
        Self {
            header,
            body: body.into(),
        }
    }

    /// Split `raw` into header and body.
    ///
    /// The first line must be a delimiter (three or more dashes). Everything up
    /// to the next delimiter line is the header; everything after it is the
    /// body, verbatim.
    pub fn parse(raw: &str) -> Result<Self, FrontmatterError> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let mut lines = raw.split_inclusive('\n');

        let opening = lines.next().ok_or(FrontmatterError::MissingHeader)?;
        if !is_delimiter(opening) {
            return Err(FrontmatterError::MissingHeader);
        }

        let header_start = opening.len();
        let mut offset = header_start;
        for line in lines {
            if is_delimiter(line) {
                let header = decode_header(&raw[header_start..offset])?;
                let body = &raw[offset + line.len()..];
                return Ok(Self::new(header, body));
            }
            offset += line.len();
        }
        Err(FrontmatterError::UnterminatedHeader)
    }

    /// Render the document back to text.
    pub fn serialize(&self) -> Result<String, FrontmatterError> {
        let mut out = String::from(DELIMITER);
        if !self.header.is_empty() {
            out.push_str(&serde_yaml::to_string(&self.header)?);
        }
        out.push_str(DELIMITER);
        out.push_str(&self.body);
        Ok(out)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.header.get(key)
    }

    /// True when there is no header and the body is blank.
    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.body.trim().is_empty()
    }

    /// Merge `entries` into the header without disturbing existing values.
    ///
    /// A key already holding a truthy value is left alone. A key holding a
    /// falsy placeholder (`null`, `false`, `0`, `""`) is filled in place. New
    /// keys are appended in iteration order. Returns the keys that were written.
    pub fn merge_new_keys<I>(&mut self, entries: I) -> Vec<String>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut written = Vec::new();
        for (key, value) in entries {
            match self.header.get_mut(key.as_str()) {
                Some(existing) if is_truthy(existing) => continue,
                Some(existing) => *existing = value,
                None => {
                    self.header.insert(Value::String(key.clone()), value);
                }
            }
            written.push(key);
        }
        written
    }
}

/// YAML truthiness: null, false, zero and empty strings/collections are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Sequence(seq) => !seq.is_empty(),
        Value::Mapping(map) => !map.is_empty(),
        Value::Tagged(tagged) => is_truthy(&tagged.value),
    }
}

fn is_delimiter(line: &str) -> bool {
    let line = line.trim_end();
    line.len() >= 3 && line.bytes().all(|b| b == b'-')
}

fn decode_header(yaml: &str) -> Result<Mapping, FrontmatterError> {
    if yaml.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(yaml)? {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        _ => Err(FrontmatterError::NotAMapping),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(fm: &Frontmatter) -> Vec<String> {
        fm.header
            .keys()
            .filter_map(|k| k.as_str().map(str::to_owned))
            .collect()
    }

    #[test]
    fn parses_header_and_body() {
        let raw = "---\ntitle: Hello\ndraft: true\n---\nFirst line\n\nSecond line\n";
        let fm = Frontmatter::parse(raw).unwrap();
        assert_eq!(fm.get("title"), Some(&Value::from("Hello")));
        assert_eq!(fm.get("draft"), Some(&Value::Bool(true)));
        assert_eq!(fm.body, "First line\n\nSecond line\n");
    }

    #[test]
    fn round_trips_nested_values_and_awkward_bodies() {
        let header: Mapping = serde_yaml::from_str(
            "title: \"42\"\ncount: 7\nratio: 0.5\nok: false\ntags: [a, b]\nauthor:\n  name: Ada\n  links: [x]\n",
        )
        .unwrap();
        for body in ["", "\n\nleading blank lines", "ends without newline", "a\n---\nb\n"] {
            let fm = Frontmatter::new(header.clone(), body);
            let text = fm.serialize().unwrap();
            assert_eq!(Frontmatter::parse(&text).unwrap(), fm, "body {body:?}");
        }
    }

    #[test]
    fn empty_header_round_trips() {
        let fm = Frontmatter::new(Mapping::new(), "just a body");
        let text = fm.serialize().unwrap();
        assert_eq!(text, "---\n---\njust a body");
        assert_eq!(Frontmatter::parse(&text).unwrap(), fm);
    }

    #[test]
    fn rejects_documents_without_a_header() {
        assert!(matches!(
            Frontmatter::parse("# Just markdown\n"),
            Err(FrontmatterError::MissingHeader)
        ));
        assert!(matches!(
            Frontmatter::parse(""),
            Err(FrontmatterError::MissingHeader)
        ));
        assert!(matches!(
            Frontmatter::parse("---\ntitle: x\nno closing fence"),
            Err(FrontmatterError::UnterminatedHeader)
        ));
        assert!(matches!(
            Frontmatter::parse("---\n- a\n- b\n---\nbody"),
            Err(FrontmatterError::NotAMapping)
        ));
    }

    #[test]
    fn merge_appends_new_keys_and_preserves_order() {
        let mut fm = Frontmatter::parse("---\ntitle: T\ntags: [x]\nzeta: 1\n---\nbody").unwrap();
        let written = fm.merge_new_keys([("dev_syndicate_id".to_string(), Value::from(42))]);
        assert_eq!(written, vec!["dev_syndicate_id"]);
        assert_eq!(keys(&fm), vec!["title", "tags", "zeta", "dev_syndicate_id"]);
        assert_eq!(fm.get("zeta"), Some(&Value::from(1)));
    }

    #[test]
    fn merge_never_overwrites_existing_values() {
        let mut fm = Frontmatter::parse("---\ndev_syndicate_id: 7\nslot: null\n---\n").unwrap();
        let written = fm.merge_new_keys([
            ("dev_syndicate_id".to_string(), Value::from(99)),
            ("slot".to_string(), Value::from("filled")),
        ]);
        assert_eq!(written, vec!["slot"]);
        assert_eq!(fm.get("dev_syndicate_id"), Some(&Value::from(7)));
        assert_eq!(fm.get("slot"), Some(&Value::from("filled")));
        assert_eq!(keys(&fm), vec!["dev_syndicate_id", "slot"]);
    }

    #[test]
    fn truthiness_follows_yaml_scalars() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&Value::from(0)));
        assert!(!is_truthy(&Value::from("")));
        assert!(is_truthy(&Value::from(13)));
        assert!(is_truthy(&Value::from("abc")));
    }
}
