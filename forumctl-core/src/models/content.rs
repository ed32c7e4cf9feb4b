//! Validated text inputs: post content, thread titles, category names

use super::ValidationError;

/// Default maximum length for post and thread bodies, in characters
pub const DEFAULT_MAX_CONTENT_LEN: usize = 10_000;

/// Maximum length for thread titles
const MAX_TITLE_LEN: usize = 200;

/// Maximum length for category names
const MAX_CATEGORY_NAME_LEN: usize = 64;

/// Maximum length for category descriptions
const MAX_DESCRIPTION_LEN: usize = 1_000;

fn non_empty_bounded(
    s: &str,
    field: &'static str,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = s.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }

    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }

    Ok(trimmed.to_owned())
}

/// Validated post (or thread body) content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostContent(String);

impl PostContent {
    /// Create post content with the configured length limit.
    ///
    /// # Rules
    /// - Non-empty after trimming whitespace
    /// - At most `max_len` characters (not bytes)
    ///
    /// # Example
    /// ```
    /// use forumctl_core::models::PostContent;
    ///
    /// assert!(PostContent::new("Nice find!", 100).is_ok());
    /// assert!(PostContent::new("   ", 100).is_err());
    /// assert!(PostContent::new("abc", 2).is_err());
    /// ```
    pub fn new(s: &str, max_len: usize) -> Result<Self, ValidationError> {
        non_empty_bounded(s, "content", max_len).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for PostContent {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validated thread title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadTitle(String);

impl ThreadTitle {
    /// Create a new thread title.
    ///
    /// # Rules
    /// - Non-empty (after trimming whitespace)
    /// - Max 200 characters
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        non_empty_bounded(s, "title", MAX_TITLE_LEN).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for ThreadTitle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validated category name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        non_empty_bounded(s, "name", MAX_CATEGORY_NAME_LEN).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Category description; empty is allowed.
pub fn validate_description(s: &str) -> Result<String, ValidationError> {
    let trimmed = s.trim();
    if trimmed.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::TooLong {
            field: "description",
            max: MAX_DESCRIPTION_LEN,
        });
    }
    Ok(trimmed.to_owned())
}
