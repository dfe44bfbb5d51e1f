//! Scoped installation of hosting credentials into `$HOME/.netrc`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::LocalFs;
use crate::domain::HostCredentials;
use crate::domain::credentials::{NETRC_BACKUP, NETRC_FILE};

/// Credentials installed for the lifetime of the value.
///
/// `enter` moves any existing `.netrc` aside and writes a fresh one; `exit`
/// (or drop, on early return or unwind) deletes it and restores the backup.
/// Restoration runs exactly once. Without a prior file, no credential file
/// remains afterwards.
#[must_use = "credentials are removed when the scope is dropped"]
pub struct CredentialScope<'a, F: LocalFs> {
    fs: &'a F,
    netrc: PathBuf,
    backup: Option<PathBuf>,
    restored: bool,
}

impl<'a, F: LocalFs> CredentialScope<'a, F> {
    /// Install `credentials` under `home`.
    ///
    /// # Errors
    ///
    /// Returns an error if the existing file cannot be moved aside or the new
    /// one cannot be written. A backup made before the failure is restored.
    pub fn enter(fs: &'a F, home: &Path, credentials: &HostCredentials) -> Result<Self> {
        let netrc = home.join(NETRC_FILE);
        let backup = if fs.exists(&netrc) {
            let backup = home.join(NETRC_BACKUP);
            fs.rename(&netrc, &backup)
                .with_context(|| format!("backing up {}", netrc.display()))?;
            Some(backup)
        } else {
            None
        };
        let scope = Self {
            fs,
            netrc,
            backup,
            restored: false,
        };
        scope
            .fs
            .write_private(&scope.netrc, &credentials.netrc_entry())
            .with_context(|| format!("writing {}", scope.netrc.display()))?;
        tracing::debug!(path = %scope.netrc.display(), backed_up = scope.backup.is_some(), "credentials installed");
        Ok(scope)
    }

    /// Remove the credentials and restore the previous file.
    ///
    /// # Errors
    ///
    /// Returns an error if removal or restoration fails.
    pub fn exit(mut self) -> Result<()> {
        self.restore()
    }

    fn restore(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        if self.fs.exists(&self.netrc) {
            self.fs
                .remove_file(&self.netrc)
                .with_context(|| format!("removing {}", self.netrc.display()))?;
        }
        if let Some(backup) = &self.backup {
            self.fs
                .rename(backup, &self.netrc)
                .with_context(|| format!("restoring {}", self.netrc.display()))?;
        }
        tracing::debug!(path = %self.netrc.display(), "credentials removed");
        Ok(())
    }
}

impl<F: LocalFs> Drop for CredentialScope<'_, F> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!(error = %format!("{e:#}"), "failed to restore credential file");
        }
    }
}
