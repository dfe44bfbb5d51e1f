//! Literal placeholder substitution for generated project files.
//!
//! Substitution goes through `regex`, so both sides are escaped: the pattern
//! with `regex::escape` and the replacement with `NoExpand`. A replacement
//! like `https://github.com/o/r.git` or `pa$$w0rd` lands in the file
//! byte-for-byte.

use regex::{NoExpand, Regex};

use crate::domain::error::TemplateError;

/// Replace every occurrence of the literal `pattern` in `text` with the
/// literal `replacement`.
///
/// Returns the rewritten text and the number of replacements made.
///
/// # Errors
///
/// Returns [`TemplateError::EmptyPattern`] for an empty pattern.
pub fn substitute_literal(
    text: &str,
    pattern: &str,
    replacement: &str,
) -> Result<(String, usize), TemplateError> {
    if pattern.is_empty() {
        return Err(TemplateError::EmptyPattern);
    }
    let re = Regex::new(&regex::escape(pattern))?;
    let count = re.find_iter(text).count();
    if count == 0 {
        return Ok((text.to_string(), 0));
    }
    let rewritten = re.replace_all(text, NoExpand(replacement)).into_owned();
    Ok((rewritten, count))
}

/// Live values substituted into configuration files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderValues {
    pub hostname: String,
    pub project: String,
    pub clone_url: String,
}

impl PlaceholderValues {
    /// Expand `{hostname}`, `{project}`, and `{clone_url}` in a configured
    /// replacement string.
    #[must_use]
    pub fn expand(&self, replacement: &str) -> String {
        replacement
            .replace("{hostname}", &self.hostname)
            .replace("{project}", &self.project)
            .replace("{clone_url}", &self.clone_url)
    }
}
