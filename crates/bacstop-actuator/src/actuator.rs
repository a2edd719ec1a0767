//! Carries out a policy [`Decision`] against a git working tree.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use bacstop_policy::{Decision, HookKind, PolicyConfig};

use crate::error::Result;
use crate::git::{Git, StagedChange};

/// Which side effect was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    NoAction,
    /// Staged changes reversed in the index and working copy.
    RestoredStagedFiles,
    /// Branch reset to its upstream, dropping unpushed commits.
    HardResetToUpstream,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionKind::NoAction => "no action",
            ActionKind::RestoredStagedFiles => "restored staged files",
            ActionKind::HardResetToUpstream => "hard reset to upstream",
        })
    }
}

/// Report of one [`RepositoryActuator::apply`] call.
///
/// `executed` names the action that was attempted; `succeeded` tells whether
/// it completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub executed: ActionKind,
    pub succeeded: bool,
    pub detail: String,
}

impl ActionResult {
    fn done(executed: ActionKind, detail: impl Into<String>) -> Self {
        Self {
            executed,
            succeeded: true,
            detail: detail.into(),
        }
    }

    fn failed(executed: ActionKind, detail: impl Into<String>) -> Self {
        Self {
            executed,
            succeeded: false,
            detail: detail.into(),
        }
    }
}

/// Applies decisions to one working tree.
///
/// The caller, normally a git hook, is expected to hold the tree exclusively
/// while `apply` runs.
#[derive(Debug, Clone)]
pub struct RepositoryActuator {
    git: Git,
}

impl RepositoryActuator {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            git: Git::new(workdir),
        }
    }

    pub fn workdir(&self) -> &Path {
        self.git.workdir()
    }

    /// Carry out `decision`. Never panics and never retries; git failures come
    /// back as `succeeded: false`.
    pub fn apply(&self, decision: Decision, config: &PolicyConfig) -> ActionResult {
        match decision {
            Decision::Allow => ActionResult::done(ActionKind::NoAction, "operation allowed"),
            Decision::Block => ActionResult::done(ActionKind::NoAction, "operation blocked"),
            Decision::Destroy => {
                let (kind, attempt) = match config.hook {
                    HookKind::PreCommit => {
                        (ActionKind::RestoredStagedFiles, self.restore_staged())
                    }
                    HookKind::PrePush => {
                        (ActionKind::HardResetToUpstream, self.reset_to_upstream())
                    }
                };
                attempt.unwrap_or_else(|e| {
                    error!(action = %kind, error = %e, "destructive action failed");
                    ActionResult::failed(kind, e.to_string())
                })
            }
        }
    }

    fn restore_staged(&self) -> Result<ActionResult> {
        let kind = ActionKind::RestoredStagedFiles;
        let staged = self.git.staged_changes()?;
        if staged.is_empty() {
            info!("nothing staged, nothing to restore");
            return Ok(ActionResult::done(kind, "nothing staged"));
        }

        let unstaged = self.git.unstaged_paths()?;
        let (reverted, kept): (Vec<_>, Vec<_>) = staged
            .iter()
            .partition(|c| self.worktree_carries_staged(c, &unstaged));
        let reverted: Vec<&str> = reverted.iter().map(|c| c.path.as_str()).collect();
        let kept: Vec<&str> = kept.iter().map(|c| c.path.as_str()).collect();
        let all: Vec<&str> = staged.iter().map(|c| c.path.as_str()).collect();

        warn!(
            workdir = %self.workdir().display(),
            ?reverted,
            unstaged_only = ?kept,
            "destroying staged changes"
        );
        if !reverted.is_empty() {
            let patch = self.git.staged_patch(&reverted)?;
            self.git.reverse_apply(&patch)?;
        }
        if self.git.has_head()? {
            self.git.run_with_paths(&["reset", "-q"], &all)?;
        } else {
            self.git.run_with_paths(&["rm", "-q", "--cached", "-f"], &all)?;
        }

        Ok(ActionResult::done(
            kind,
            format!(
                "reverted {} staged path(s), only unstaged {} path(s)",
                reverted.len(),
                kept.len()
            ),
        ))
    }

    /// Whether the working copy of `change` still holds the staged side of
    /// the change, so the staged delta can be reversed there. Paths that fail
    /// this are only unstaged.
    fn worktree_carries_staged(&self, change: &StagedChange, unstaged: &[String]) -> bool {
        let on_disk = self.workdir().join(&change.path).symlink_metadata().is_ok();
        if change.is_unmerged() {
            false
        } else if change.is_deletion() {
            !on_disk
        } else if change.is_addition() {
            on_disk && !unstaged.contains(&change.path)
        } else {
            on_disk
        }
    }

    fn reset_to_upstream(&self) -> Result<ActionResult> {
        let kind = ActionKind::HardResetToUpstream;
        let Some(upstream) = self.git.upstream()? else {
            warn!(workdir = %self.workdir().display(), "no upstream configured, cannot reset");
            return Ok(ActionResult::failed(
                kind,
                "no upstream configured for the current branch",
            ));
        };

        let previous = self.git.short_rev("HEAD")?;
        warn!(
            workdir = %self.workdir().display(),
            %upstream,
            %previous,
            "hard reset to upstream"
        );
        self.git.run(&["reset", "-q", "--hard", &upstream])?;

        Ok(ActionResult::done(
            kind,
            format!("reset to {upstream} (was {previous})"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bacstop_policy::Spice;
    use bacstop_protocol::Bac;
    use std::fs;
    use std::process::Command;

    fn git(dir: &Path, args: &[&str]) -> String {
        let out = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(
            out.status.success(),
            "git {args:?}: {}",
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8(out.stdout).unwrap()
    }

    fn init_repo(dir: &Path) {
        git(dir, &["init", "-q"]);
        git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(dir, &["config", "user.name", "Test"]);
        git(dir, &["config", "user.email", "test@example.com"]);
        git(dir, &["config", "commit.gpgsign", "false"]);
    }

    fn commit_file(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
        git(dir, &["add", name]);
        git(dir, &["commit", "-q", "-m", name]);
    }

    fn config(hook: HookKind) -> PolicyConfig {
        PolicyConfig {
            threshold: Bac::from_raw(200),
            spice: Spice::Diablo,
            hook,
        }
    }

    fn staged(dir: &Path) -> String {
        git(dir, &["diff", "--cached", "--name-only"])
    }

    #[test]
    fn allow_and_block_touch_nothing() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        commit_file(dir.path(), "a.txt", "one");
        fs::write(dir.path().join("a.txt"), "two").unwrap();
        git(dir.path(), &["add", "a.txt"]);

        let actuator = RepositoryActuator::new(dir.path());
        for decision in [Decision::Allow, Decision::Block] {
            for hook in HookKind::ALL {
                let result = actuator.apply(decision, &config(hook));
                assert_eq!(result.executed, ActionKind::NoAction);
                assert!(result.succeeded);
            }
        }
        assert_eq!(staged(dir.path()).trim(), "a.txt");
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "two");
    }

    #[test]
    fn pre_commit_destroy_restores_staged_modification() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        commit_file(dir.path(), "a.txt", "one");
        fs::write(dir.path().join("a.txt"), "two").unwrap();
        git(dir.path(), &["add", "a.txt"]);

        let result = RepositoryActuator::new(dir.path())
            .apply(Decision::Destroy, &config(HookKind::PreCommit));
        assert_eq!(result.executed, ActionKind::RestoredStagedFiles);
        assert!(result.succeeded, "{}", result.detail);
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "one");
        assert!(staged(dir.path()).is_empty());
    }

    #[test]
    fn pre_commit_destroy_spares_unstaged_and_untracked() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        commit_file(dir.path(), "a.txt", "one");
        commit_file(dir.path(), "b.txt", "bee");
        fs::write(dir.path().join("a.txt"), "staged").unwrap();
        git(dir.path(), &["add", "a.txt"]);
        fs::write(dir.path().join("b.txt"), "unstaged edit").unwrap();
        fs::write(dir.path().join("c.txt"), "untracked").unwrap();

        let result = RepositoryActuator::new(dir.path())
            .apply(Decision::Destroy, &config(HookKind::PreCommit));
        assert!(result.succeeded, "{}", result.detail);
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "one");
        assert_eq!(
            fs::read_to_string(dir.path().join("b.txt")).unwrap(),
            "unstaged edit"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("c.txt")).unwrap(),
            "untracked"
        );
    }

    #[test]
    fn pre_commit_destroy_removes_new_files() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        commit_file(dir.path(), "a.txt", "one");
        fs::write(dir.path().join("new.txt"), "fresh").unwrap();
        git(dir.path(), &["add", "new.txt"]);

        let result = RepositoryActuator::new(dir.path())
            .apply(Decision::Destroy, &config(HookKind::PreCommit));
        assert!(result.succeeded, "{}", result.detail);
        assert!(!dir.path().join("new.txt").exists());
        assert!(staged(dir.path()).is_empty());
        assert!(result.detail.starts_with("reverted 1 staged path(s)"));
    }

    #[test]
    fn pre_commit_destroy_keeps_unstaged_edits_of_partly_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        commit_file(dir.path(), "a.txt", "line1\nline2\n");
        fs::write(dir.path().join("a.txt"), "STAGED\nline2\n").unwrap();
        git(dir.path(), &["add", "a.txt"]);
        fs::write(dir.path().join("a.txt"), "STAGED\nUNSTAGED\n").unwrap();

        let result = RepositoryActuator::new(dir.path())
            .apply(Decision::Destroy, &config(HookKind::PreCommit));
        assert!(result.succeeded, "{}", result.detail);
        assert_eq!(
            fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "line1\nUNSTAGED\n"
        );
        assert!(staged(dir.path()).is_empty());
        assert_eq!(git(dir.path(), &["diff", "--name-only"]).trim(), "a.txt");
    }

    #[test]
    fn pre_commit_destroy_restores_staged_deletion() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        commit_file(dir.path(), "a.txt", "one\n");
        commit_file(dir.path(), "b.txt", "bee\n");
        git(dir.path(), &["rm", "-q", "a.txt"]);
        assert!(!dir.path().join("a.txt").exists());

        let result = RepositoryActuator::new(dir.path())
            .apply(Decision::Destroy, &config(HookKind::PreCommit));
        assert!(result.succeeded, "{}", result.detail);
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "one\n");
        assert!(staged(dir.path()).is_empty());
        assert!(git(dir.path(), &["status", "--porcelain"]).is_empty());
    }

    #[test]
    fn pre_commit_destroy_keeps_edited_new_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        commit_file(dir.path(), "a.txt", "one");
        fs::write(dir.path().join("new.txt"), "fresh\n").unwrap();
        git(dir.path(), &["add", "new.txt"]);
        fs::write(dir.path().join("new.txt"), "fresh\nmore\n").unwrap();

        let result = RepositoryActuator::new(dir.path())
            .apply(Decision::Destroy, &config(HookKind::PreCommit));
        assert!(result.succeeded, "{}", result.detail);
        assert_eq!(
            fs::read_to_string(dir.path().join("new.txt")).unwrap(),
            "fresh\nmore\n"
        );
        assert!(staged(dir.path()).is_empty());
        assert_eq!(
            git(dir.path(), &["status", "--porcelain"]).trim(),
            "?? new.txt"
        );
    }

    #[test]
    fn pre_commit_destroy_fails_without_change_on_conflicting_edit() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        commit_file(dir.path(), "a.txt", "line1\n");
        fs::write(dir.path().join("a.txt"), "STAGED\n").unwrap();
        git(dir.path(), &["add", "a.txt"]);
        fs::write(dir.path().join("a.txt"), "OTHER\n").unwrap();

        let result = RepositoryActuator::new(dir.path())
            .apply(Decision::Destroy, &config(HookKind::PreCommit));
        assert_eq!(result.executed, ActionKind::RestoredStagedFiles);
        assert!(!result.succeeded);
        assert!(result.detail.contains("git apply"), "{}", result.detail);
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "OTHER\n");
        assert_eq!(staged(dir.path()).trim(), "a.txt");
    }

    #[test]
    fn pre_commit_destroy_treats_paths_literally() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        commit_file(dir.path(), "a.txt", "one");
        fs::write(dir.path().join("a.txt"), "dirty").unwrap();
        fs::write(dir.path().join("[a].txt"), "glob").unwrap();
        git(dir.path(), &["--literal-pathspecs", "add", "--", "[a].txt"]);

        let result = RepositoryActuator::new(dir.path())
            .apply(Decision::Destroy, &config(HookKind::PreCommit));
        assert!(result.succeeded, "{}", result.detail);
        assert!(!dir.path().join("[a].txt").exists());
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "dirty");
        assert!(staged(dir.path()).is_empty());
    }

    #[test]
    fn pre_commit_destroy_works_before_first_commit() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        fs::write(dir.path().join("first.txt"), "hello").unwrap();
        git(dir.path(), &["add", "first.txt"]);

        let result = RepositoryActuator::new(dir.path())
            .apply(Decision::Destroy, &config(HookKind::PreCommit));
        assert!(result.succeeded, "{}", result.detail);
        assert!(!dir.path().join("first.txt").exists());
    }

    #[test]
    fn pre_commit_destroy_is_idempotent_on_clean_tree() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        commit_file(dir.path(), "a.txt", "one");
        let actuator = RepositoryActuator::new(dir.path());

        for _ in 0..2 {
            let result = actuator.apply(Decision::Destroy, &config(HookKind::PreCommit));
            assert_eq!(result.executed, ActionKind::RestoredStagedFiles);
            assert!(result.succeeded);
            assert_eq!(result.detail, "nothing staged");
        }
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "one");
    }

    #[test]
    fn pre_push_destroy_without_upstream_fails() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        commit_file(dir.path(), "a.txt", "one");

        let result = RepositoryActuator::new(dir.path())
            .apply(Decision::Destroy, &config(HookKind::PrePush));
        assert_eq!(result.executed, ActionKind::HardResetToUpstream);
        assert!(!result.succeeded);
        assert!(result.detail.contains("no upstream"));
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "one");
    }

    #[test]
    fn pre_push_destroy_discards_unpushed_commits() {
        let root = tempfile::tempdir().unwrap();
        let remote = root.path().join("remote.git");
        let work = root.path().join("work");
        fs::create_dir(&work).unwrap();
        git(root.path(), &["init", "-q", "--bare", "remote.git"]);

        init_repo(&work);
        commit_file(&work, "a.txt", "one");
        git(&work, &["remote", "add", "origin", remote.to_str().unwrap()]);
        git(&work, &["push", "-q", "-u", "origin", "main"]);
        let pushed = git(&work, &["rev-parse", "HEAD"]);

        commit_file(&work, "local.txt", "unpushed");
        fs::write(work.join("a.txt"), "dirty").unwrap();

        let result =
            RepositoryActuator::new(&work).apply(Decision::Destroy, &config(HookKind::PrePush));
        assert_eq!(result.executed, ActionKind::HardResetToUpstream);
        assert!(result.succeeded, "{}", result.detail);
        assert!(result.detail.contains("origin/main"));
        assert_eq!(git(&work, &["rev-parse", "HEAD"]), pushed);
        assert!(!work.join("local.txt").exists());
        assert_eq!(fs::read_to_string(work.join("a.txt")).unwrap(), "one");
    }

    #[test]
    fn missing_workdir_reports_failure() {
        let result = RepositoryActuator::new("/nonexistent/bacstop/repo")
            .apply(Decision::Destroy, &config(HookKind::PreCommit));
        assert!(!result.succeeded);
        assert_eq!(result.executed, ActionKind::RestoredStagedFiles);
    }

    #[test]
    fn result_serializes_snake_case() {
        let result = ActionResult::done(ActionKind::HardResetToUpstream, "reset");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["executed"], "hard_reset_to_upstream");
        assert_eq!(json["succeeded"], true);
        assert_eq!(json["detail"], "reset");
    }
}
