//! Thin wrapper over the system `git` binary.
//!
//! Every invocation runs with `--literal-pathspecs`, so paths handed over
//! after `--` are matched byte for byte and never expanded as globs.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::error::{ActuatorError, Result};

/// One entry of `git diff --cached --name-status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedChange {
    /// Status letter (`A`, `M`, `D`, `T`, `U`, ...).
    pub status: char,
    pub path: String,
}

impl StagedChange {
    /// Whether the path does not exist in `HEAD`.
    pub fn is_addition(&self) -> bool {
        self.status == 'A'
    }

    /// Whether the path exists in `HEAD` but not in the index.
    pub fn is_deletion(&self) -> bool {
        self.status == 'D'
    }

    /// Whether the path has unresolved merge conflicts.
    pub fn is_unmerged(&self) -> bool {
        self.status == 'U'
    }
}

/// Runs `git` inside one working tree.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn output(&self, args: &[&str], input: Option<&[u8]>) -> Result<Output> {
        if !self.workdir.is_dir() {
            return Err(ActuatorError::MissingWorkdir(self.workdir.clone()));
        }
        debug!(workdir = %self.workdir.display(), ?args, "running git");
        let spawn_error = |source| ActuatorError::Spawn {
            command: describe(args),
            source,
        };

        let mut command = Command::new("git");
        command
            .arg("--literal-pathspecs")
            .args(args)
            .current_dir(&self.workdir);
        let Some(input) = input else {
            return command.output().map_err(spawn_error);
        };

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input).map_err(spawn_error)?;
        }
        child.wait_with_output().map_err(spawn_error)
    }

    fn checked(&self, args: &[&str], input: Option<&[u8]>) -> Result<Vec<u8>> {
        let output = self.output(args, input)?;
        if !output.status.success() {
            return Err(ActuatorError::GitFailed {
                command: describe(args),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// Run `git` and return stdout, failing on a non-zero exit.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        let stdout = self.checked(args, None)?;
        String::from_utf8(stdout).map_err(|e| ActuatorError::UnexpectedOutput {
            command: describe(args),
            message: e.to_string(),
        })
    }

    /// Run a `git` subcommand followed by `--` and a list of paths.
    pub fn run_with_paths(&self, args: &[&str], paths: &[&str]) -> Result<String> {
        self.run(&with_paths(args, paths))
    }

    /// Staged changes of `paths` as a binary-safe patch with no context
    /// lines, suitable for `git apply --unidiff-zero`.
    pub fn staged_patch(&self, paths: &[&str]) -> Result<Vec<u8>> {
        let args = [
            "diff",
            "--cached",
            "--binary",
            "--no-renames",
            "--no-color",
            "--no-ext-diff",
            "--src-prefix=a/",
            "--dst-prefix=b/",
            "-U0",
        ];
        self.checked(&with_paths(&args, paths), None)
    }

    /// Apply `patch` in reverse to the working tree only. The index is left
    /// as it is. Nothing is written unless every hunk applies.
    pub fn reverse_apply(&self, patch: &[u8]) -> Result<()> {
        let args = ["apply", "-R", "--unidiff-zero", "--whitespace=nowarn"];
        self.checked(&args, Some(patch)).map(drop)
    }

    /// Paths whose working-tree content differs from the index.
    pub fn unstaged_paths(&self) -> Result<Vec<String>> {
        let raw = self.run(&["diff", "--no-renames", "--name-only", "-z"])?;
        Ok(raw
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Paths staged in the index relative to `HEAD` (or the empty tree on an
    /// unborn branch). Renames are reported as a deletion plus an addition.
    pub fn staged_changes(&self) -> Result<Vec<StagedChange>> {
        let args = ["diff", "--cached", "--no-renames", "--name-status", "-z"];
        let raw = self.run(&args)?;
        parse_name_status(&raw).map_err(|message| ActuatorError::UnexpectedOutput {
            command: describe(&args),
            message,
        })
    }

    /// Whether `HEAD` points at a commit, i.e. the branch is not unborn.
    pub fn has_head(&self) -> Result<bool> {
        let output = self.output(&["rev-parse", "--verify", "-q", "HEAD"], None)?;
        Ok(output.status.success())
    }

    /// The current branch's upstream ref name, if one is configured.
    pub fn upstream(&self) -> Result<Option<String>> {
        let args = ["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"];
        let output = self.output(&args, None)?;
        if !output.status.success() {
            debug!(
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "no upstream"
            );
            return Ok(None);
        }
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!name.is_empty()).then_some(name))
    }

    /// Abbreviated hash of a revision.
    pub fn short_rev(&self, rev: &str) -> Result<String> {
        Ok(self.run(&["rev-parse", "--short", rev])?.trim().to_string())
    }
}

fn with_paths<'a>(args: &[&'a str], paths: &[&'a str]) -> Vec<&'a str> {
    let mut full = args.to_vec();
    full.push("--");
    full.extend_from_slice(paths);
    full
}

fn describe(args: &[&str]) -> String {
    args.iter()
        .take_while(|a| **a != "--")
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_name_status(raw: &str) -> std::result::Result<Vec<StagedChange>, String> {
    let fields: Vec<&str> = raw.split('\0').filter(|f| !f.is_empty()).collect();
    if fields.len() % 2 != 0 {
        return Err(format!("odd number of fields ({})", fields.len()));
    }
    fields
        .chunks(2)
        .map(|pair| {
            let status = pair[0]
                .chars()
                .next()
                .ok_or_else(|| "empty status".to_string())?;
            Ok(StagedChange {
                status,
                path: pair[1].to_string(),
            })
        })
        .collect()
}
