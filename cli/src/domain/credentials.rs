//! Hosting credentials and their `.netrc` rendering.

use std::fmt;

/// File name the VCS client reads credentials from, relative to `$HOME`.
pub const NETRC_FILE: &str = ".netrc";

/// Backup name for a pre-existing credential file while a scope is active.
pub const NETRC_BACKUP: &str = ".netrc.bak";

/// Credentials for the hosting API and for pushing over HTTPS.
#[derive(Clone, PartialEq, Eq)]
pub struct HostCredentials {
    /// Host the credentials apply to, e.g. `github.com`.
    pub machine: String,
    pub login: String,
    secret: String,
}

impl HostCredentials {
    #[must_use]
    pub fn new(
        machine: impl Into<String>,
        login: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            machine: machine.into(),
            login: login.into(),
            secret: secret.into(),
        }
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// The `.netrc` entry in the line format git's credential lookup expects.
    #[must_use]
    pub fn netrc_entry(&self) -> String {
        format!(
            "machine {}\nlogin {}\npassword {}\n",
            self.machine, self.login, self.secret
        )
    }
}

impl fmt::Debug for HostCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCredentials")
            .field("machine", &self.machine)
            .field("login", &self.login)
            .field("secret", &"<redacted>")
            .finish()
    }
}
