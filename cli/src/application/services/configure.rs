//! Application service: rewrite a generated project with live values.

use std::path::Path;

use anyhow::{Context, Result};

use crate::application::ports::{LocalFs, ProgressReporter};
use crate::domain::config::{CopyRule, RewriteRule};
use crate::domain::template::{PlaceholderValues, substitute_literal};

/// Replace every literal `pattern` in `file` with the literal `replacement`,
/// in place. Returns the number of replacements; the file is left untouched
/// when there are none.
///
/// # Errors
///
/// Returns an error if the file cannot be read or written, or the pattern is
/// empty.
pub fn substitute(
    fs: &impl LocalFs,
    file: &Path,
    pattern: &str,
    replacement: &str,
) -> Result<usize> {
    let text = fs.read_to_string(file)?;
    let (rewritten, count) = substitute_literal(&text, pattern, replacement)
        .with_context(|| format!("substituting in {}", file.display()))?;
    if count > 0 {
        fs.write(file, &rewritten)?;
    }
    Ok(count)
}

/// Apply all rewrites, then all copies, relative to `project_dir`.
///
/// A rewrite whose pattern is absent is reported as a warning, not an error:
/// templates drift, and the health check is the real verdict.
///
/// # Errors
///
/// Returns an error if any file cannot be read, written, or copied.
pub fn configure_project(
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    project_dir: &Path,
    rewrites: &[RewriteRule],
    copies: &[CopyRule],
    values: &PlaceholderValues,
) -> Result<()> {
    for rule in rewrites {
        let file = project_dir.join(&rule.file);
        let replacement = values.expand(&rule.replacement);
        let count = substitute(fs, &file, &rule.pattern, &replacement)?;
        tracing::debug!(file = %rule.file.display(), pattern = %rule.pattern, count, "rewrite applied");
        if count == 0 {
            reporter.warn(&format!(
                "'{}' not found in {}",
                rule.pattern,
                rule.file.display()
            ));
        }
    }
    for copy in copies {
        let from = project_dir.join(&copy.from);
        let to = project_dir.join(&copy.to);
        fs.copy(&from, &to)
            .with_context(|| format!("copying {} to {}", copy.from.display(), copy.to.display()))?;
    }
    Ok(())
}
