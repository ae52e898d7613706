//! Topic specifiers and matching.
//!
//! A subscription names its topic either literally or with a pattern. Both
//! are normalized into a [`TopicKey`], which groups identical specifiers in
//! the registry, and a [`Matcher`], which tests concrete topics.
//!
//! Literal topics are escaped and anchored before compilation, so a literal
//! such as `"a.*"` only ever matches the topic `"a.*"`. The key of a literal
//! is that anchored form, which makes it the textual form of its own
//! predicate just like a pattern's key.

use crate::error::{HeraldError, Result};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// A topic specifier: a literal topic name or a pattern.
#[derive(Debug, Clone)]
pub enum Topic {
    /// Matches exactly one topic name.
    Literal(String),
    /// Matches every topic the pattern matches.
    Pattern(Pattern),
}

/// A compiled pattern specifier.
///
/// Built only from pattern source by [`Topic::pattern`], so its source text
/// fully determines what it matches. Flags must be written inline (`(?i)`).
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Source text of the pattern.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Topic {
    /// Create a literal specifier.
    #[must_use]
    pub fn literal(name: impl Into<String>) -> Self {
        Self::Literal(name.into())
    }

    /// Compile a pattern specifier.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::InvalidPattern`] if the pattern does not compile.
    pub fn pattern(pattern: &str) -> Result<Self> {
        Ok(Self::Pattern(Pattern(Regex::new(pattern)?)))
    }

    /// The specifier as the caller wrote it.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(name) => name,
            Self::Pattern(pattern) => pattern.as_str(),
        }
    }

    /// Whether this is a pattern specifier.
    #[must_use]
    pub fn is_pattern(&self) -> bool {
        matches!(self, Self::Pattern(_))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(name) => write!(f, "{name}"),
            Self::Pattern(pattern) => write!(f, "/{}/", pattern.as_str()),
        }
    }
}

impl From<&str> for Topic {
    fn from(name: &str) -> Self {
        Self::Literal(name.to_string())
    }
}

impl From<String> for Topic {
    fn from(name: String) -> Self {
        Self::Literal(name)
    }
}

impl From<&String> for Topic {
    fn from(name: &String) -> Self {
        Self::Literal(name.clone())
    }
}

impl From<&Topic> for Topic {
    fn from(topic: &Topic) -> Self {
        topic.clone()
    }
}

/// Canonical registry key of a specifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicKey(Arc<str>);

impl TopicKey {
    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TopicKey {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for TopicKey {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

/// Match predicate for concrete topics.
#[derive(Debug, Clone)]
pub struct Matcher(Regex);

impl Matcher {
    /// Test a concrete topic.
    #[must_use]
    pub fn is_match(&self, topic: &str) -> bool {
        self.0.is_match(topic)
    }

    /// Textual form of the predicate.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

fn anchored_literal(name: &str) -> String {
    format!("^{}$", regex::escape(name))
}

/// Compute the registry key of a specifier without compiling anything.
#[must_use]
pub fn key_of(topic: &Topic) -> TopicKey {
    match topic {
        Topic::Literal(name) => TopicKey::from(anchored_literal(name)),
        Topic::Pattern(pattern) => TopicKey::from(pattern.as_str()),
    }
}

/// Normalize a specifier into its key and match predicate.
///
/// # Errors
///
/// Returns an error if a literal's anchored form exceeds the regex size limit.
pub fn normalize(topic: &Topic) -> Result<(TopicKey, Matcher)> {
    match topic {
        Topic::Literal(name) => {
            let anchored = anchored_literal(name);
            let re = Regex::new(&anchored)?;
            Ok((TopicKey::from(anchored), Matcher(re)))
        }
        Topic::Pattern(pattern) => Ok((
            TopicKey::from(pattern.as_str()),
            Matcher(pattern.0.clone()),
        )),
    }
}

/// Validate a specifier against a length limit. A limit of `0` disables it.
///
/// # Errors
///
/// Returns [`HeraldError::TopicTooLong`] if the specifier is too long.
pub fn validate_topic(topic: &Topic, max_len: usize) -> Result<()> {
    let len = topic.as_str().len();
    if max_len > 0 && len > max_len {
        return Err(HeraldError::TopicTooLong { len, max: max_len });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_is_exact() {
        let (_, matcher) = normalize(&Topic::from("orders.created")).unwrap();
        assert!(matcher.is_match("orders.created"));
        assert!(!matcher.is_match("orders_created"));
        assert!(!matcher.is_match("orders.created.v2"));
        assert!(!matcher.is_match("x.orders.created"));
    }

    #[test]
    fn test_literal_metacharacters_escaped() {
        let (key, matcher) = normalize(&Topic::from("^part1.*")).unwrap();
        assert!(matcher.is_match("^part1.*"));
        assert!(!matcher.is_match("part1.anything"));
        assert_eq!(key.as_str(), r"^\^part1\.\*$");
    }

    #[test]
    fn test_empty_literal() {
        let (_, matcher) = normalize(&Topic::from("")).unwrap();
        assert!(matcher.is_match(""));
        assert!(!matcher.is_match("a"));
    }

    #[test]
    fn test_pattern_uses_own_anchoring() {
        let topic = Topic::pattern(r"\.part3$").unwrap();
        let (key, matcher) = normalize(&topic).unwrap();
        assert_eq!(key.as_str(), r"\.part3$");
        assert!(matcher.is_match("a.part3"));
        assert!(matcher.is_match("a.b.part3"));
        assert!(!matcher.is_match("part3"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            Topic::pattern("(unclosed"),
            Err(HeraldError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_identical_specifiers_share_key() {
        assert_eq!(key_of(&"a.b".into()), key_of(&"a.b".into()));
        let p1 = Topic::pattern("^a").unwrap();
        let p2 = Topic::pattern("^a").unwrap();
        assert_eq!(key_of(&p1), key_of(&p2));
    }

    #[test]
    fn test_literal_and_loose_pattern_do_not_collide() {
        let literal = key_of(&Topic::from("a.b"));
        let pattern = key_of(&Topic::pattern(r"a\.b").unwrap());
        assert_ne!(literal, pattern);

        // Same textual predicate, same semantics, same key.
        let anchored = key_of(&Topic::pattern(r"^a\.b$").unwrap());
        assert_eq!(literal, anchored);
    }

    #[test]
    fn test_inline_flags_are_part_of_the_key() {
        let literal = key_of(&Topic::from("a"));
        let insensitive = Topic::pattern("(?i)^a$").unwrap();
        assert_ne!(literal, key_of(&insensitive));

        let (_, matcher) = normalize(&insensitive).unwrap();
        assert!(matcher.is_match("A"));
    }

    #[test]
    fn test_key_of_matches_normalize() {
        for topic in [Topic::from("x.y"), Topic::pattern("x+").unwrap()] {
            let (key, _) = normalize(&topic).unwrap();
            assert_eq!(key, key_of(&topic));
        }
    }

    #[test]
    fn test_validate_topic() {
        assert!(validate_topic(&Topic::from("short"), 256).is_ok());
        assert!(validate_topic(&Topic::from("a".repeat(257)), 256).is_err());
        assert!(validate_topic(&Topic::from("a".repeat(10_000)), 0).is_ok());
        assert!(validate_topic(&Topic::pattern(&"b".repeat(300)).unwrap(), 256).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Topic::from("t").to_string(), "t");
        assert_eq!(Topic::pattern("t.*").unwrap().to_string(), "/t.*/");
    }
}
