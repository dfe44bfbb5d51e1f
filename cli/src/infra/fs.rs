//! Filesystem infrastructure: implements `LocalFs` over `std::fs`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::application::ports::LocalFs;

/// Production filesystem implementation of `LocalFs`.
pub struct StdFs;

impl LocalFs for StdFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("reading file {}", path.display()))
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        std::fs::write(path, content).with_context(|| format!("writing file {}", path.display()))
    }

    fn write_private(&self, path: &Path, content: &str) -> Result<()> {
        write_private(path, content.as_bytes())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        std::fs::copy(from, to)
            .with_context(|| format!("copying {} to {}", from.display(), to.display()))?;
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        std::fs::rename(from, to)
            .with_context(|| format!("renaming {} to {}", from.display(), to.display()))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).with_context(|| format!("removing file {}", path.display()))
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        let meta = match std::fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e).with_context(|| format!("inspecting {}", path.display()));
            }
        };
        if meta.is_dir() {
            std::fs::remove_dir_all(path)
                .with_context(|| format!("removing directory {}", path.display()))
        } else {
            self.remove_file(path)
        }
    }
}

/// Create or truncate `path` with owner-only permissions (0600 on unix).
///
/// # Errors
///
/// Returns an error if the file cannot be written or its mode set.
pub fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("writing file {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("setting permissions on {}", path.display()))?;
    }
    Ok(())
}
