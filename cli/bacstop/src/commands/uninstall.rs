//! `bacstop uninstall`: remove our hooks and `.bacstop`, leave everything else.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use bacstop_policy::{HookKind, PolicyConfig};

use super::hook;

/// What an uninstall removed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Removed {
    pub hooks: Vec<HookKind>,
    pub config: bool,
}

pub fn run(repo: &Path) -> Result<()> {
    let removed = uninstall(repo)?;
    for hook in &removed.hooks {
        println!("  Removed BACstop {hook} hook.");
    }
    if removed.hooks.is_empty() {
        println!("  No BACstop hooks found.");
    }
    if removed.config {
        println!("  Removed .bacstop config.");
    }
    Ok(())
}

pub fn uninstall(repo: &Path) -> Result<Removed> {
    let hooks_dir = hook::hooks_dir(repo)?;
    let mut removed = Removed::default();

    for kind in HookKind::ALL {
        let path = hooks_dir.join(kind.as_str());
        if hook::is_bacstop_hook(&path)? {
            fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
            removed.hooks.push(kind);
        }
    }

    let config = PolicyConfig::path_in(repo);
    if config.is_file() {
        fs::remove_file(&config).with_context(|| format!("removing {}", config.display()))?;
        removed.config = true;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::install::install;

    #[test]
    fn removes_what_install_wrote() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        install(dir.path(), &PolicyConfig::default(), "bacstop").unwrap();

        let removed = uninstall(dir.path()).unwrap();
        assert_eq!(
            removed,
            Removed {
                hooks: vec![HookKind::PrePush],
                config: true,
            }
        );
        assert!(!dir.path().join(".git/hooks/pre-push").exists());
        assert!(!dir.path().join(".bacstop").exists());
    }

    #[test]
    fn leaves_foreign_hooks() {
        let dir = tempfile::tempdir().unwrap();
        let hooks = dir.path().join(".git/hooks");
        fs::create_dir_all(&hooks).unwrap();
        fs::write(hooks.join("pre-commit"), "#!/bin/sh\nmake lint\n").unwrap();

        let removed = uninstall(dir.path()).unwrap();
        assert_eq!(removed, Removed::default());
        assert!(hooks.join("pre-commit").exists());
    }

    #[test]
    fn second_uninstall_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        install(dir.path(), &PolicyConfig::default(), "bacstop").unwrap();
        uninstall(dir.path()).unwrap();
        assert_eq!(uninstall(dir.path()).unwrap(), Removed::default());
    }
}
