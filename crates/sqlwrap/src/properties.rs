//! Property-file parsing for the wrapper configuration.
//!
//! The configuration is plain Java-properties text:
//!
//! ```text
//! # tag.attribute = value
//! pg.connection.wrapper = sqlwrap::instrument::MeasuringConnection
//! pg.connection.listeners = sqlwrap::instrument::StatsListener, sqlwrap::instrument::LoggingStatementListener
//! ```
//!
//! [`WrapperProperties`] holds the flat key/value pairs; [`NestedProperties`]
//! groups them by connection-type tag (the part of the key before the first `.`).

use crate::error::{WrapError, WrapResult};
use std::collections::BTreeMap;
use std::io::Read;

/// Separates the connection-type tag from the attribute name in a key.
pub const IDENTIFIER_SEPARATOR: char = '.';

/// Attribute naming the decorator type.
pub const WRAPPER_ATTRIBUTE: &str = "connection.wrapper";

/// Attribute listing the listener types, comma separated.
pub const LISTENERS_ATTRIBUTE: &str = "connection.listeners";

/// Flat key/value configuration, immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrapperProperties {
    entries: BTreeMap<String, String>,
}

impl WrapperProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse property-file text. Later duplicates of a key win.
    pub fn parse(text: &str) -> WrapResult<Self> {
        let mut entries = BTreeMap::new();
        for line in logical_lines(text) {
            let (key, value) = split_entry(&line);
            entries.insert(unescape(key)?, unescape(value)?);
        }
        Ok(Self { entries })
    }

    /// Read and parse a UTF-8 stream.
    ///
    /// Read or parse failures are not fatal: they are logged and produce an
    /// empty configuration.
    pub fn load(reader: impl Read) -> Self {
        match Self::try_load(reader) {
            Ok(props) => props,
            Err(e) => {
                tracing::warn!(error = %e, "error reading wrapper properties, defaults assumed");
                Self::default()
            }
        }
    }

    fn try_load(mut reader: impl Read) -> WrapResult<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::parse(&text)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Group entries by connection-type tag.
    pub fn nested(&self) -> NestedProperties {
        let mut nested = NestedProperties::default();
        for (key, value) in self.iter() {
            let (identifier, attribute) = split_key(key);
            nested.insert(identifier, attribute, value);
        }
        nested
    }
}

/// Properties grouped as tag → (attribute → value).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NestedProperties {
    groups: BTreeMap<String, BTreeMap<String, String>>,
}

impl NestedProperties {
    pub fn insert(&mut self, identifier: &str, attribute: &str, value: &str) {
        self.groups
            .entry(identifier.to_string())
            .or_default()
            .insert(attribute.to_string(), value.to_string());
    }

    /// All attributes of one tag.
    pub fn get(&self, identifier: &str) -> Option<&BTreeMap<String, String>> {
        self.groups.get(identifier)
    }

    pub fn attribute(&self, identifier: &str, attribute: &str) -> Option<&str> {
        self.get(identifier)?.get(attribute).map(String::as_str)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Split a key at the first separator into `(identifier, attribute)`.
///
/// Without a separator the whole key is the identifier and the attribute is empty.
pub fn split_key(key: &str) -> (&str, &str) {
    match key.split_once(IDENTIFIER_SEPARATOR) {
        Some((identifier, attribute)) => (identifier, attribute),
        None => (key, ""),
    }
}

/// Split a `connection.listeners` value into type names.
///
/// Surrounding whitespace is ignored and empty segments are skipped.
pub fn split_list(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{c}')
}

/// Join natural lines into logical lines, dropping blanks and comments.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Option<String> = None;

    for raw in text.lines() {
        let natural = raw.strip_suffix('\r').unwrap_or(raw);
        let trimmed = natural.trim_start_matches(is_blank);

        let mut line = match current.take() {
            Some(mut pending) => {
                pending.push_str(trimmed);
                pending
            }
            None => {
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                trimmed.to_string()
            }
        };

        if ends_with_continuation(&line) {
            line.pop();
            current = Some(line);
        } else {
            lines.push(line);
        }
    }

    if let Some(pending) = current {
        lines.push(pending);
    }
    lines
}

/// An odd number of trailing backslashes continues the line.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

/// Split a logical line into raw (still escaped) key and value.
fn split_entry(line: &str) -> (&str, &str) {
    let mut key_end = line.len();
    let mut escaped = false;
    for (idx, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = idx;
                break;
            }
            c if is_blank(c) => {
                key_end = idx;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start_matches(is_blank);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches(is_blank);
    }
    (key, rest)
}

fn unescape(raw: &str) -> WrapResult<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| WrapError::config(format!("malformed \\uxxxx escape: \\u{hex}")))?;
                out.push(decoded);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_separators() {
        let props = WrapperProperties::parse("a=1\nb: 2\nc 3\nd   =   4\n").unwrap();
        assert_eq!(props.get("a"), Some("1"));
        assert_eq!(props.get("b"), Some("2"));
        assert_eq!(props.get("c"), Some("3"));
        assert_eq!(props.get("d"), Some("4"));
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let text = "# comment\n! also a comment\n\n   \nkey=value\n";
        let props = WrapperProperties::parse(text).unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("key"), Some("value"));
    }

    #[test]
    fn joins_continuation_lines() {
        let text = "pg.connection.listeners=a.A, \\\n    b.B\nnext=1";
        let props = WrapperProperties::parse(text).unwrap();
        assert_eq!(props.get("pg.connection.listeners"), Some("a.A, b.B"));
        assert_eq!(props.get("next"), Some("1"));
    }

    #[test]
    fn escaped_backslash_does_not_continue() {
        let props = WrapperProperties::parse("path=C:\\\\\nnext=1").unwrap();
        assert_eq!(props.get("path"), Some("C:\\"));
        assert_eq!(props.get("next"), Some("1"));
    }

    #[test]
    fn unescapes_keys_and_values() {
        let props = WrapperProperties::parse("my\\ key=tab\\there\nu=\\u0041\\u00e9").unwrap();
        assert_eq!(props.get("my key"), Some("tab\there"));
        assert_eq!(props.get("u"), Some("Aé"));
    }

    #[test]
    fn malformed_unicode_escape_is_an_error() {
        let err = WrapperProperties::parse("x=\\u12").unwrap_err();
        assert!(matches!(err, WrapError::Config(_)));
    }

    #[test]
    fn later_duplicates_win() {
        let props = WrapperProperties::parse("k=1\nk=2").unwrap();
        assert_eq!(props.get("k"), Some("2"));
    }

    #[test]
    fn values_keep_inner_and_trailing_text() {
        let props = WrapperProperties::parse("k = a = b ").unwrap();
        assert_eq!(props.get("k"), Some("a = b "));
    }

    #[test]
    fn load_from_reader() {
        let text = b"pg.connection.wrapper=X\n";
        let props = WrapperProperties::load(&text[..]);
        assert_eq!(props.get("pg.connection.wrapper"), Some("X"));
    }

    #[test]
    fn load_with_invalid_utf8_yields_empty() {
        let bytes: &[u8] = &[b'k', b'=', 0xff, 0xfe];
        assert!(WrapperProperties::load(bytes).is_empty());
    }

    #[test]
    fn load_with_parse_error_yields_empty() {
        assert!(WrapperProperties::load(&b"a=1\nb=\\uZZZZ"[..]).is_empty());
    }

    #[test]
    fn empty_input_is_not_an_error() {
        assert!(WrapperProperties::parse("").unwrap().is_empty());
        assert!(WrapperProperties::load(std::io::empty()).is_empty());
    }

    #[test]
    fn split_key_at_first_separator() {
        assert_eq!(split_key("pg.connection.wrapper"), ("pg", "connection.wrapper"));
        assert_eq!(split_key("pg"), ("pg", ""));
        assert_eq!(split_key("pg."), ("pg", ""));
        assert_eq!(split_key(".x"), ("", "x"));
    }

    #[test]
    fn nested_groups_by_identifier() {
        let props = WrapperProperties::new()
            .with("pg.connection.wrapper", "X")
            .with("pg.connection.listeners", "A, B")
            .with("mysql.connection.wrapper", "Y")
            .with("bare", "v");
        let nested = props.nested();

        assert_eq!(nested.len(), 3);
        assert_eq!(nested.attribute("pg", WRAPPER_ATTRIBUTE), Some("X"));
        assert_eq!(nested.attribute("pg", LISTENERS_ATTRIBUTE), Some("A, B"));
        assert_eq!(nested.attribute("mysql", WRAPPER_ATTRIBUTE), Some("Y"));
        assert_eq!(nested.attribute("bare", ""), Some("v"));
        assert_eq!(nested.attribute("missing", WRAPPER_ATTRIBUTE), None);
    }

    #[test]
    fn nested_identifiers_are_case_sensitive() {
        let nested = WrapperProperties::new()
            .with("PG.connection.wrapper", "X")
            .with("pg.connection.wrapper", "Y")
            .nested();
        assert_eq!(nested.attribute("PG", WRAPPER_ATTRIBUTE), Some("X"));
        assert_eq!(nested.attribute("pg", WRAPPER_ATTRIBUTE), Some("Y"));
    }

    #[test]
    fn split_list_trims_and_skips_empty() {
        assert_eq!(split_list("a.A, b.B,c.C"), vec!["a.A", "b.B", "c.C"]);
        assert_eq!(split_list("a.A,   b.B , "), vec!["a.A", "b.B"]);
        assert!(split_list("").is_empty());
        assert!(split_list(" , ").is_empty());
    }
}
