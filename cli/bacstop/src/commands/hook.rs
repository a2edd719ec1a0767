//! The git hook script and how to recognise it.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use bacstop_policy::HookKind;

/// Text that marks a hook file as ours.
pub const MARKER: &str = "BACstop";

/// Hooks directory of a repository, after checking it has a `.git` directory.
pub fn hooks_dir(repo: &Path) -> Result<PathBuf> {
    let git_dir = repo.join(".git");
    if !git_dir.is_dir() {
        anyhow::bail!("not a git repository: {}", repo.display());
    }
    Ok(git_dir.join("hooks"))
}

/// Shell script for `hook` that runs `program check`.
pub fn script(hook: HookKind, program: &str) -> String {
    format!(
        "#!/bin/sh\n\
         # {MARKER} {hook} hook. Installed by `bacstop install`, removed by `bacstop uninstall`.\n\
         exec {} check --hook {hook} --repo \"$(git rev-parse --show-toplevel)\"\n",
        shell_quote(program)
    )
}

/// Whether the file at `path` is a BACstop hook. Missing or non-text files are not.
pub fn is_bacstop_hook(path: &Path) -> Result<bool> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content.contains(MARKER)),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::InvalidData) => Ok(false),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+".contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_runs_check_for_its_hook() {
        let text = script(HookKind::PrePush, "/usr/local/bin/bacstop");
        assert!(text.starts_with("#!/bin/sh\n"));
        assert!(text.contains(MARKER));
        assert!(text.contains("exec /usr/local/bin/bacstop check --hook pre-push --repo "));
        assert!(text.contains("\"$(git rev-parse --show-toplevel)\""));
    }

    #[test]
    fn program_path_is_quoted() {
        assert_eq!(shell_quote("bacstop"), "bacstop");
        assert_eq!(shell_quote("/opt/my tools/bacstop"), "'/opt/my tools/bacstop'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn recognises_own_hooks_only() {
        let dir = tempfile::tempdir().unwrap();
        let ours = dir.path().join("pre-push");
        let theirs = dir.path().join("pre-commit");
        fs::write(&ours, script(HookKind::PrePush, "bacstop")).unwrap();
        fs::write(&theirs, "#!/bin/sh\ncargo fmt --check\n").unwrap();

        assert!(is_bacstop_hook(&ours).unwrap());
        assert!(!is_bacstop_hook(&theirs).unwrap());
        assert!(!is_bacstop_hook(&dir.path().join("missing")).unwrap());
    }

    #[test]
    fn hooks_dir_requires_git_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(hooks_dir(dir.path()).is_err());
        fs::create_dir(dir.path().join(".git")).unwrap();
        assert_eq!(
            hooks_dir(dir.path()).unwrap(),
            dir.path().join(".git").join("hooks")
        );
    }
}
