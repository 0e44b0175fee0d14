use std::collections::BTreeMap;
use std::fmt::Write as _;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use thiserror::Error;

/// Mandatory label scoping every query
pub const NAMESPACE_LABEL: &str = "namespace";

/// Active label matchers plus free-text search, combined with AND
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelFilter {
    namespace: String,
    /// Extra matchers; never contains `namespace`
    labels: BTreeMap<String, String>,
    search: String,
}

impl LabelFilter {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            labels: BTreeMap::new(),
            search: String::new(),
        }
    }

    /// Seed a filter from flat key/value pairs (e.g. URL query parameters).
    /// A `namespace` pair overrides the given default.
    pub fn from_params<I, K, V>(namespace: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut filter = Self::new(namespace);
        for (name, value) in params {
            filter.add_label(name, value);
        }
        filter
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_label(name, value);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    /// Value matched for `name`, including the namespace
    pub fn label(&self, name: &str) -> Option<&str> {
        if name == NAMESPACE_LABEL {
            Some(&self.namespace)
        } else {
            self.labels.get(name).map(String::as_str)
        }
    }

    /// Add or replace a matcher; `namespace` retargets the filter
    pub fn add_label(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if name == NAMESPACE_LABEL {
            self.namespace = value.into();
        } else {
            self.labels.insert(name, value.into());
        }
    }

    /// Remove a matcher. The namespace matcher cannot be removed.
    pub fn remove_label(&mut self, name: &str) -> bool {
        self.labels.remove(name).is_some()
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    /// Drop all extra matchers and the search, keeping the namespace
    pub fn clear(&mut self) {
        self.labels.clear();
        self.search.clear();
    }

    pub fn has_search(&self) -> bool {
        !self.search.trim().is_empty()
    }

    /// Compile the search clause for local highlighting / validation
    pub fn search_regex(&self) -> Result<Option<Regex>, regex::Error> {
        if !self.has_search() {
            return Ok(None);
        }
        RegexBuilder::new(&self.search)
            .case_insensitive(true)
            .build()
            .map(Some)
    }

    /// Serialize to the backend selector syntax
    pub fn to_query(&self) -> String {
        build_query(self)
    }

    /// Toggle a saved filter: apply it, or clear labels and search if it is already active.
    /// Returns whether the preset is active afterwards.
    pub fn toggle_preset(&mut self, preset: &SavedFilter) -> bool {
        if preset.is_selected(self) {
            self.clear();
            false
        } else {
            preset.apply(self);
            true
        }
    }
}

/// `{namespace="ns",name="value",...}` followed by ` |~ "search"` when search is not blank
pub fn build_query(filter: &LabelFilter) -> String {
    let mut query = String::with_capacity(64);
    query.push('{');
    let _ = write!(query, "{}=\"{}\"", NAMESPACE_LABEL, escape(&filter.namespace));
    for (name, value) in &filter.labels {
        let _ = write!(query, ",{}=\"{}\"", name, escape(value));
    }
    query.push('}');

    if filter.has_search() {
        let _ = write!(query, " |~ \"{}\"", escape(&filter.search));
    }

    query
}

/// Escape a value for embedding in a double-quoted literal
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`
pub fn is_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Selector parse failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("selector must start with '{{'")]
    MissingOpenBrace,

    #[error("selector is missing its closing '}}'")]
    MissingCloseBrace,

    #[error("invalid label name {0:?}")]
    InvalidLabelName(String),

    #[error("unsupported matcher for {0:?}, only '=' is supported")]
    UnsupportedOperator(String),

    #[error("expected a quoted string at position {0}")]
    ExpectedString(usize),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unexpected input at position {0}")]
    Unexpected(usize),

    #[error("duplicate label {0:?}")]
    DuplicateLabel(String),

    #[error("selector has no namespace matcher")]
    MissingNamespace,
}

/// Parse `{name1="value1",...}[ |~ "search"]` back into a filter
pub fn parse_selector(input: &str) -> Result<LabelFilter, SelectorError> {
    let mut parser = Parser { src: input, pos: 0 };
    let mut namespace = None;
    let mut labels = BTreeMap::new();

    parser.skip_ws();
    if !parser.eat('{') {
        return Err(SelectorError::MissingOpenBrace);
    }

    parser.skip_ws();
    if !parser.eat('}') {
        loop {
            parser.skip_ws();
            let (name, value) = parser.matcher()?;
            if name == NAMESPACE_LABEL {
                if namespace.replace(value).is_some() {
                    return Err(SelectorError::DuplicateLabel(name));
                }
            } else if labels.insert(name.clone(), value).is_some() {
                return Err(SelectorError::DuplicateLabel(name));
            }

            parser.skip_ws();
            if parser.eat(',') {
                continue;
            }
            if parser.eat('}') {
                break;
            }
            return Err(match parser.peek() {
                None => SelectorError::MissingCloseBrace,
                Some(_) => SelectorError::Unexpected(parser.pos),
            });
        }
    }

    parser.skip_ws();
    let search = if parser.eat_str("|~") {
        parser.skip_ws();
        parser.string()?
    } else {
        String::new()
    };

    parser.skip_ws();
    if parser.peek().is_some() {
        return Err(SelectorError::Unexpected(parser.pos));
    }

    let namespace = namespace.ok_or(SelectorError::MissingNamespace)?;
    Ok(LabelFilter {
        namespace,
        labels,
        search,
    })
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, expected: &str) -> bool {
        if self.src[self.pos..].starts_with(expected) {
            self.pos += expected.len();
            true
        } else {
            false
        }
    }

    fn matcher(&mut self) -> Result<(String, String), SelectorError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.bump();
        }
        let name = &self.src[start..self.pos];
        if !is_label_name(name) {
            return Err(SelectorError::InvalidLabelName(name.to_string()));
        }

        self.skip_ws();
        match self.peek() {
            Some('=') => {
                self.bump();
                if self.peek() == Some('~') {
                    return Err(SelectorError::UnsupportedOperator(name.to_string()));
                }
            }
            Some('!') => return Err(SelectorError::UnsupportedOperator(name.to_string())),
            None => return Err(SelectorError::MissingCloseBrace),
            Some(_) => return Err(SelectorError::Unexpected(self.pos)),
        }

        self.skip_ws();
        let value = self.string()?;
        Ok((name.to_string(), value))
    }

    fn string(&mut self) -> Result<String, SelectorError> {
        if !self.eat('"') {
            return Err(SelectorError::ExpectedString(self.pos));
        }

        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(SelectorError::UnterminatedString),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    None => return Err(SelectorError::UnterminatedString),
                    Some(c @ ('"' | '\\')) => out.push(c),
                    // regex escapes such as \d pass through untouched
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                },
                Some(c) => out.push(c),
            }
        }
    }
}

/// A named, reusable filter preset
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SavedFilter {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub query: Option<String>,
}

impl SavedFilter {
    /// Active when the search matches exactly and every preset label matches
    pub fn is_selected(&self, filter: &LabelFilter) -> bool {
        if self.query.as_deref().unwrap_or("") != filter.search() {
            return false;
        }

        self.labels
            .iter()
            .all(|(name, value)| filter.label(name) == Some(value.as_str()))
    }

    /// Replace the filter's labels (when the preset has any) and search
    pub fn apply(&self, filter: &mut LabelFilter) {
        if !self.labels.is_empty() {
            filter.labels.clear();
            for (name, value) in &self.labels {
                filter.add_label(name.clone(), value.clone());
            }
        }
        filter.search = self.query.clone().unwrap_or_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_with_search() {
        let filter = LabelFilter::new("prod")
            .with_label("pod", "api-1")
            .with_search("timeout");
        assert_eq!(filter.to_query(), r#"{namespace="prod",pod="api-1"} |~ "timeout""#);
    }

    #[test]
    fn test_build_query_omits_blank_search() {
        assert_eq!(LabelFilter::new("prod").to_query(), r#"{namespace="prod"}"#);
        let blank = LabelFilter::new("prod").with_search("   ");
        assert_eq!(blank.to_query(), r#"{namespace="prod"}"#);
    }

    #[test]
    fn test_namespace_always_first() {
        let filter = LabelFilter::new("prod")
            .with_label("app", "web")
            .with_label("container", "nginx");
        assert_eq!(
            filter.to_query(),
            r#"{namespace="prod",app="web",container="nginx"}"#
        );
    }

    #[test]
    fn test_values_are_escaped() {
        let filter = LabelFilter::new("prod")
            .with_label("msg", r#"say "hi""#)
            .with_search(r"C:\temp");
        assert_eq!(
            filter.to_query(),
            r#"{namespace="prod",msg="say \"hi\""} |~ "C:\\temp""#
        );
    }

    #[test]
    fn test_from_params() {
        let filter = LabelFilter::from_params(
            "default",
            [("pod", "api-1"), ("namespace", "prod")],
        );
        assert_eq!(filter.namespace(), "prod");
        assert_eq!(filter.label("pod"), Some("api-1"));
        assert!(!filter.labels().contains_key(NAMESPACE_LABEL));
    }

    #[test]
    fn test_namespace_cannot_be_removed() {
        let mut filter = LabelFilter::new("prod").with_label("pod", "a");
        assert!(!filter.remove_label(NAMESPACE_LABEL));
        assert!(filter.remove_label("pod"));
        assert_eq!(filter.to_query(), r#"{namespace="prod"}"#);
    }

    #[test]
    fn test_parse_selector_round_trip() {
        let filter = LabelFilter::new("prod")
            .with_label("pod", r#"we"ird\name"#)
            .with_search(r"timeout \d+");
        let parsed = parse_selector(&filter.to_query()).unwrap();
        assert_eq!(parsed, filter);
    }

    #[test]
    fn test_parse_selector_tolerates_whitespace() {
        let parsed = parse_selector(r#" { pod = "a" , namespace="prod" }  |~  "x" "#).unwrap();
        assert_eq!(parsed.namespace(), "prod");
        assert_eq!(parsed.label("pod"), Some("a"));
        assert_eq!(parsed.search(), "x");
    }

    #[test]
    fn test_parse_selector_errors() {
        assert_eq!(
            parse_selector(r#"namespace="prod""#),
            Err(SelectorError::MissingOpenBrace)
        );
        assert_eq!(
            parse_selector(r#"{namespace="prod""#),
            Err(SelectorError::MissingCloseBrace)
        );
        assert_eq!(
            parse_selector(r#"{pod="a"}"#),
            Err(SelectorError::MissingNamespace)
        );
        assert_eq!(
            parse_selector(r#"{namespace=~"prod"}"#),
            Err(SelectorError::UnsupportedOperator("namespace".to_string()))
        );
        assert_eq!(
            parse_selector(r#"{namespace="prod}"#),
            Err(SelectorError::UnterminatedString)
        );
        assert_eq!(
            parse_selector(r#"{9pod="a"}"#),
            Err(SelectorError::InvalidLabelName("9pod".to_string()))
        );
        assert_eq!(
            parse_selector(r#"{namespace="a",namespace="b"}"#),
            Err(SelectorError::DuplicateLabel("namespace".to_string()))
        );
    }

    #[test]
    fn test_search_regex_validation() {
        let ok = LabelFilter::new("prod").with_search("time(out|d)");
        assert!(ok.search_regex().unwrap().unwrap().is_match("TIMEOUT"));

        let bad = LabelFilter::new("prod").with_search("(unclosed");
        assert!(bad.search_regex().is_err());

        assert!(LabelFilter::new("prod").search_regex().unwrap().is_none());
    }

    #[test]
    fn test_saved_filter_toggle() {
        let preset = SavedFilter {
            name: "errors".to_string(),
            labels: BTreeMap::from([("app".to_string(), "api".to_string())]),
            query: Some("error".to_string()),
            ..Default::default()
        };

        let mut filter = LabelFilter::new("prod").with_label("pod", "api-1");
        assert!(!preset.is_selected(&filter));

        assert!(filter.toggle_preset(&preset));
        assert!(preset.is_selected(&filter));
        assert_eq!(filter.label("pod"), None);
        assert_eq!(filter.to_query(), r#"{namespace="prod",app="api"} |~ "error""#);

        assert!(!filter.toggle_preset(&preset));
        assert_eq!(filter, LabelFilter::new("prod"));
    }

    #[test]
    fn test_saved_filter_without_labels_keeps_labels() {
        let preset = SavedFilter {
            name: "timeouts".to_string(),
            query: Some("timeout".to_string()),
            ..Default::default()
        };
        let mut filter = LabelFilter::new("prod").with_label("pod", "api-1");
        preset.apply(&mut filter);
        assert_eq!(filter.label("pod"), Some("api-1"));
        assert_eq!(filter.search(), "timeout");
    }

    #[test]
    fn test_saved_filter_from_toml() {
        let preset: SavedFilter = toml::from_str(
            r#"
            name = "ingress errors"
            description = "5xx from the edge"
            query = "status=5"
            [labels]
            app = "ingress"
            "#,
        )
        .unwrap();
        assert_eq!(preset.labels.get("app").map(String::as_str), Some("ingress"));
        assert_eq!(preset.query.as_deref(), Some("status=5"));
    }
}
