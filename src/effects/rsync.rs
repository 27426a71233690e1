//! rsync-backed interpreter for sync effects.
//!
//! Each effect becomes one synchronous rsync invocation. Slot retention
//! uses rsync's `--backup`/`--backup-dir`: files about to be overwritten or
//! deleted are moved into the tier's slot directory instead of discarded.
//!
//! # Exit code handling
//!
//! - 0: complete.
//! - 24 ("some files vanished before they could be transferred"): a benign
//!   race between enumeration and dispatch; filtered, reported as complete.
//! - 23 (partial transfer): reported as [`SyncOutcome::Partial`] so the
//!   affected tier is not signed off, without failing the whole pass.
//! - Anything else: an error carrying rsync's stderr.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, warn};

use super::interpreter::SyncInterpreter;
use super::{SyncEffect, SyncOutcome};

/// rsync exit code for a partial transfer due to per-file errors.
const EXIT_PARTIAL: i32 = 23;

/// rsync exit code for source files vanishing mid-transfer.
const EXIT_VANISHED: i32 = 24;

/// Errors that can occur while running rsync.
#[derive(Debug, Error)]
pub enum RsyncError {
    /// rsync could not be launched at all.
    #[error("failed to launch rsync: {0}")]
    Launch(#[from] io::Error),

    /// rsync ran and failed outright.
    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
}

/// Result type for rsync operations.
pub type Result<T> = std::result::Result<T, RsyncError>;

/// Executes [`SyncEffect`]s against a remote target by shelling out to
/// rsync.
pub struct RsyncTransport {
    /// The program to invoke. Normally `rsync`; injectable so exit-code
    /// handling is testable without a real transfer.
    program: String,

    /// The remote target root, e.g. `backup@mirror:/vault`.
    remote: String,

    /// Local directory in which the remote skeleton is staged for
    /// [`SyncEffect::EnsureTree`].
    skeleton_dir: PathBuf,

    /// `--exclude-from` file, when exclusion patterns are configured.
    exclude_file: Option<PathBuf>,

    /// `--password-file` for rsync daemon authentication.
    password_file: Option<PathBuf>,
}

impl RsyncTransport {
    pub fn new(
        remote: impl Into<String>,
        skeleton_dir: impl Into<PathBuf>,
        exclude_file: Option<PathBuf>,
        password_file: Option<PathBuf>,
    ) -> Self {
        RsyncTransport {
            program: "rsync".to_string(),
            remote: remote.into().trim_end_matches('/').to_string(),
            skeleton_dir: skeleton_dir.into(),
            exclude_file,
            password_file,
        }
    }

    fn remote_dest(&self, dest: &str) -> String {
        format!("{}/{}", self.remote, dest)
    }

    fn common_flags(&self, args: &mut Vec<String>) {
        args.push("-a".to_string());
        if let Some(ref file) = self.exclude_file {
            args.push(format!("--exclude-from={}", file.display()));
        }
        if let Some(ref file) = self.password_file {
            args.push(format!("--password-file={}", file.display()));
        }
    }

    /// Builds the argument list for a mirror transfer.
    fn mirror_args(
        &self,
        source: &Path,
        dest: &str,
        retain_dir: Option<&str>,
        delete_extraneous: bool,
    ) -> Vec<String> {
        let mut args = Vec::new();
        self.common_flags(&mut args);

        if delete_extraneous {
            args.push("--delete".to_string());
        }
        if let Some(retain) = retain_dir {
            args.push("--backup".to_string());
            args.push(format!("--backup-dir={}", retain_relative(dest, retain)));
        }

        args.push(contents_of(source));
        args.push(self.remote_dest(dest));
        args
    }

    /// Builds the argument list for a skeleton sync. No `--delete`, and
    /// `--ignore-existing` so nothing already on the remote is touched.
    fn ensure_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        self.common_flags(&mut args);
        args.push("--ignore-existing".to_string());
        args.push(contents_of(&self.skeleton_dir));
        args.push(format!("{}/", self.remote));
        args
    }

    fn run(&self, args: &[String]) -> Result<SyncOutcome> {
        let output = Command::new(&self.program).args(args).output()?;
        let command = format!("{} {}", self.program, args.join(" "));

        match output.status.code() {
            Some(0) => Ok(SyncOutcome::Complete),
            Some(EXIT_VANISHED) => {
                // Known benign race in enumerate-then-transfer protocols.
                debug!(%command, "files vanished during transfer, ignoring");
                Ok(SyncOutcome::Complete)
            }
            Some(EXIT_PARTIAL) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let failed_paths: Vec<String> =
                    stderr.lines().map(|l| l.to_string()).collect();
                warn!(%command, failed = failed_paths.len(), "partial transfer");
                Ok(SyncOutcome::Partial { failed_paths })
            }
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                Err(RsyncError::CommandFailed { command, stderr })
            }
        }
    }
}

impl SyncInterpreter for RsyncTransport {
    type Error = RsyncError;

    fn interpret(&self, effect: SyncEffect) -> Result<SyncOutcome> {
        match effect {
            SyncEffect::Mirror {
                source,
                dest,
                retain_dir,
                delete_extraneous,
            } => {
                let args =
                    self.mirror_args(&source, &dest, retain_dir.as_deref(), delete_extraneous);
                self.run(&args)
            }
            SyncEffect::EnsureTree { dests } => {
                for dest in &dests {
                    std::fs::create_dir_all(self.skeleton_dir.join(dest))?;
                }
                self.run(&self.ensure_args())
            }
        }
    }
}

/// Source path with trailing-slash ("copy the contents") semantics.
fn contents_of(path: &Path) -> String {
    let s = path.display().to_string();
    format!("{}/", s.trim_end_matches('/'))
}

/// Rewrites a remote-root-relative retain directory so rsync resolves it
/// correctly: `--backup-dir` is interpreted relative to the destination
/// directory, so step up once per destination component.
fn retain_relative(dest: &str, retain: &str) -> String {
    let depth = dest.split('/').filter(|c| !c.is_empty()).count();
    format!("{}{}", "../".repeat(depth), retain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> RsyncTransport {
        RsyncTransport::new("backup@mirror:/vault", "/tmp/skel", None, None)
    }

    #[test]
    fn retain_relative_steps_up_per_component() {
        assert_eq!(
            retain_relative("current/etc", "daily/3/etc"),
            "../../daily/3/etc"
        );
        assert_eq!(retain_relative("current", "daily/0/x"), "../daily/0/x");
    }

    #[test]
    fn contents_of_appends_single_slash() {
        assert_eq!(contents_of(Path::new("/etc")), "/etc/");
        assert_eq!(contents_of(Path::new("/var/mail/")), "/var/mail/");
    }

    #[test]
    fn mirror_args_shape() {
        let args = transport().mirror_args(
            Path::new("/etc"),
            "current/etc",
            Some("daily/3/etc"),
            true,
        );
        assert_eq!(
            args,
            vec![
                "-a",
                "--delete",
                "--backup",
                "--backup-dir=../../daily/3/etc",
                "/etc/",
                "backup@mirror:/vault/current/etc",
            ]
        );
    }

    #[test]
    fn mirror_without_retain_has_no_backup_flags() {
        let args = transport().mirror_args(Path::new("/etc"), "current/etc", None, false);
        assert!(!args.iter().any(|a| a.starts_with("--backup")));
        assert!(!args.contains(&"--delete".to_string()));
    }

    #[test]
    fn ensure_args_never_delete() {
        let args = transport().ensure_args();
        assert!(args.contains(&"--ignore-existing".to_string()));
        assert!(!args.contains(&"--delete".to_string()));
        assert_eq!(args.last().unwrap(), "backup@mirror:/vault/");
    }

    /// Writes an executable that emits `stderr_lines` and exits with
    /// `exit_code`, standing in for rsync.
    #[cfg(unix)]
    fn fake_rsync(dir: &Path, exit_code: i32, stderr_lines: &[&str]) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-rsync");
        let mut script = String::from("#!/bin/sh\n");
        for line in stderr_lines {
            script.push_str(&format!("echo \"{line}\" >&2\n"));
        }
        script.push_str(&format!("exit {exit_code}\n"));
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn transport_running(program: PathBuf, skeleton_dir: PathBuf) -> RsyncTransport {
        let mut transport = RsyncTransport::new("backup@mirror:/vault", skeleton_dir, None, None);
        transport.program = program.display().to_string();
        transport
    }

    #[cfg(unix)]
    fn mirror_effect() -> SyncEffect {
        SyncEffect::Mirror {
            source: PathBuf::from("/etc"),
            dest: "current/etc".to_string(),
            retain_dir: Some("daily/0/etc".to_string()),
            delete_extraneous: true,
        }
    }

    #[test]
    #[cfg(unix)]
    fn vanished_exit_code_is_filtered_as_complete() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_rsync(dir.path(), 24, &["file has vanished: /etc/mtab"]);
        let transport = transport_running(program, dir.path().join("skel"));

        let outcome = transport.interpret(mirror_effect()).unwrap();
        assert!(outcome.is_complete());
    }

    #[test]
    #[cfg(unix)]
    fn partial_exit_code_reports_failed_paths_without_erroring() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_rsync(
            dir.path(),
            23,
            &[
                "rsync: send_files failed to open /etc/shadow: Permission denied (13)",
                "rsync error: some files/attrs were not transferred (code 23)",
            ],
        );
        let transport = transport_running(program, dir.path().join("skel"));

        match transport.interpret(mirror_effect()).unwrap() {
            SyncOutcome::Partial { failed_paths } => {
                assert_eq!(failed_paths.len(), 2);
                assert!(failed_paths[0].contains("/etc/shadow"));
            }
            other => panic!("expected partial outcome, got {other:?}"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn other_exit_codes_are_command_failures() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_rsync(dir.path(), 12, &["rsync: connection unexpectedly closed"]);
        let transport = transport_running(program, dir.path().join("skel"));

        let err = transport.interpret(mirror_effect()).unwrap_err();
        match err {
            RsyncError::CommandFailed { stderr, .. } => {
                assert!(stderr.contains("connection unexpectedly closed"));
            }
            other => panic!("expected command failure, got {other}"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn ensure_tree_stages_every_dest_locally() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_rsync(dir.path(), 0, &[]);
        let skeleton = dir.path().join("skel");
        let transport = transport_running(program, skeleton.clone());

        let outcome = transport
            .interpret(SyncEffect::EnsureTree {
                dests: vec!["current/etc".to_string(), "daily/0/etc".to_string()],
            })
            .unwrap();
        assert!(outcome.is_complete());
        assert!(skeleton.join("current/etc").is_dir());
        assert!(skeleton.join("daily/0/etc").is_dir());
    }

    #[test]
    fn exclude_and_password_files_propagate() {
        let transport = RsyncTransport::new(
            "rsync://mirror/vault/",
            "/tmp/skel",
            Some(PathBuf::from("/staging/.excludes")),
            Some(PathBuf::from("/staging/.secret")),
        );
        let args = transport.mirror_args(Path::new("/etc"), "current/etc", None, false);
        assert!(args.contains(&"--exclude-from=/staging/.excludes".to_string()));
        assert!(args.contains(&"--password-file=/staging/.secret".to_string()));
        // Trailing slash on the configured remote is normalized away.
        assert_eq!(args.last().unwrap(), "rsync://mirror/vault/current/etc");
    }
}
