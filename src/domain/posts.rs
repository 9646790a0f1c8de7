//! Post content rules.
//!
//! Content is validated into a [`PostContent`] before it reaches a repository.
//! Rejections are reported as [`FieldErrors`] keyed by input field so callers
//! can surface the exact message next to the offending field.

use std::collections::BTreeMap;
use std::fmt;

use super::emoji;

pub const CONTENT_FIELD: &str = "content";
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 280;

pub const EMPTY_CONTENT_MESSAGE: &str = "Content must not be empty";
pub const CONTENT_TOO_LONG_MESSAGE: &str = "Content too long";
pub const EMOJI_ONLY_MESSAGE: &str = "Only emojis are allowed";

/// Validation failures grouped by input field, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn first(&self, field: &str) -> Option<&str> {
        self.get(field)?.first().map(String::as_str)
    }

    pub fn into_map(self) -> BTreeMap<String, Vec<String>> {
        self.fields
    }
}

impl From<BTreeMap<String, Vec<String>>> for FieldErrors {
    fn from(fields: BTreeMap<String, Vec<String>>) -> Self {
        Self { fields }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRules {
    pub max_chars: usize,
}

impl Default for ContentRules {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }
}

/// Post body that passed [`ContentRules`]: non-empty, emoji-only, bounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostContent(String);

impl PostContent {
    pub fn parse(raw: &str, rules: &ContentRules) -> Result<Self, FieldErrors> {
        if raw.is_empty() {
            return Err(FieldErrors::single(CONTENT_FIELD, EMPTY_CONTENT_MESSAGE));
        }

        let mut errors = FieldErrors::new();
        if !emoji::is_emoji_only(raw) {
            errors.push(CONTENT_FIELD, EMOJI_ONLY_MESSAGE);
        }
        if raw.chars().count() > rules.max_chars {
            errors.push(CONTENT_FIELD, CONTENT_TOO_LONG_MESSAGE);
        }

        if errors.is_empty() {
            Ok(Self(raw.to_string()))
        } else {
            Err(errors)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_single_emoji() {
        let content = PostContent::parse("👍", &ContentRules::default()).expect("valid");
        assert_eq!(content.as_str(), "👍");
    }

    #[test]
    fn rejects_empty_with_single_message() {
        let errors = PostContent::parse("", &ContentRules::default()).unwrap_err();
        assert_eq!(
            errors.get(CONTENT_FIELD),
            Some(&[EMPTY_CONTENT_MESSAGE.to_string()][..])
        );
    }

    #[test]
    fn rejects_plain_text() {
        let errors = PostContent::parse("hello", &ContentRules::default()).unwrap_err();
        assert_eq!(errors.first(CONTENT_FIELD), Some(EMOJI_ONLY_MESSAGE));
    }

    #[test]
    fn rejects_content_over_the_limit() {
        let rules = ContentRules { max_chars: 3 };
        let errors = PostContent::parse("🎉🎉🎉🎉", &rules).unwrap_err();
        assert_eq!(errors.first(CONTENT_FIELD), Some(CONTENT_TOO_LONG_MESSAGE));
    }

    #[test]
    fn reports_every_broken_rule_in_order() {
        let rules = ContentRules { max_chars: 2 };
        let errors = PostContent::parse("abc", &rules).unwrap_err();
        assert_eq!(
            errors.get(CONTENT_FIELD),
            Some(
                &[
                    EMOJI_ONLY_MESSAGE.to_string(),
                    CONTENT_TOO_LONG_MESSAGE.to_string()
                ][..]
            )
        );
    }

    #[test]
    fn display_joins_fields_and_messages() {
        let mut errors = FieldErrors::single(CONTENT_FIELD, "a");
        errors.push(CONTENT_FIELD, "b");
        assert_eq!(errors.to_string(), "content: a; content: b");
    }
}
