//! Transient transfer-support files with guaranteed cleanup.
//!
//! The exclusion patterns and the transfer auth secret are configuration
//! values, but rsync consumes them as files. They are materialized in the
//! staging directory for the duration of the pass and removed on every
//! exit path, success or failure, via `Drop`.
//!
//! The exclude file always carries a `.ringmirror-*` pattern so the
//! scratch files themselves (the secret in particular) never ride along
//! when the staging directory is mirrored.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

const EXCLUDE_FILE: &str = ".ringmirror-excludes";
const SECRET_FILE: &str = ".ringmirror-secret";

/// Scratch files for one pass. Removed on drop.
#[derive(Debug)]
pub struct ScratchFiles {
    exclude_path: PathBuf,
    secret_path: Option<PathBuf>,
}

impl ScratchFiles {
    /// Writes the scratch files under `staging_dir`.
    ///
    /// The exclude file is always written (it at least hides the scratch
    /// files themselves); the secret file only when a secret is configured,
    /// with owner-only permissions.
    pub fn materialize(
        staging_dir: &Path,
        excludes: &[String],
        auth_secret: Option<&str>,
    ) -> io::Result<ScratchFiles> {
        fs::create_dir_all(staging_dir)?;

        let exclude_path = staging_dir.join(EXCLUDE_FILE);
        let mut file = fs::File::create(&exclude_path)?;
        writeln!(file, ".ringmirror-*")?;
        for pattern in excludes {
            writeln!(file, "{pattern}")?;
        }

        let secret_path = match auth_secret {
            Some(secret) => {
                let path = staging_dir.join(SECRET_FILE);
                let mut file = fs::File::create(&path)?;
                file.write_all(secret.as_bytes())?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
                }
                Some(path)
            }
            None => None,
        };

        Ok(ScratchFiles {
            exclude_path,
            secret_path,
        })
    }

    /// Path of the exclude-patterns file.
    pub fn exclude_file(&self) -> &Path {
        &self.exclude_path
    }

    /// Path of the auth secret file, when a secret is configured.
    pub fn password_file(&self) -> Option<&Path> {
        self.secret_path.as_deref()
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in std::iter::once(&self.exclude_path).chain(self.secret_path.iter()) {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to remove scratch file");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn exclude_file_contains_self_pattern_and_config_patterns() {
        let dir = tempdir().unwrap();
        let scratch = ScratchFiles::materialize(
            dir.path(),
            &["*.tmp".to_string(), "lost+found/".to_string()],
            None,
        )
        .unwrap();

        let contents = fs::read_to_string(scratch.exclude_file()).unwrap();
        assert_eq!(contents, ".ringmirror-*\n*.tmp\nlost+found/\n");
        assert!(scratch.password_file().is_none());
    }

    #[test]
    fn secret_file_written_with_owner_only_permissions() {
        let dir = tempdir().unwrap();
        let scratch = ScratchFiles::materialize(dir.path(), &[], Some("hunter2")).unwrap();

        let path = scratch.password_file().unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "hunter2");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn removed_on_drop() {
        let dir = tempdir().unwrap();
        let exclude_path;
        let secret_path;
        {
            let scratch = ScratchFiles::materialize(dir.path(), &[], Some("s")).unwrap();
            exclude_path = scratch.exclude_file().to_path_buf();
            secret_path = scratch.password_file().unwrap().to_path_buf();
            assert!(exclude_path.exists());
            assert!(secret_path.exists());
        }
        assert!(!exclude_path.exists());
        assert!(!secret_path.exists());
    }

    #[test]
    fn drop_tolerates_already_removed_files() {
        let dir = tempdir().unwrap();
        let scratch = ScratchFiles::materialize(dir.path(), &[], None).unwrap();
        fs::remove_file(scratch.exclude_file()).unwrap();
        // Drop must not panic.
    }
}
