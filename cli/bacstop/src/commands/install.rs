//! `bacstop install`: put the hook and `.bacstop` in place.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use bacstop_policy::{HookKind, PolicyConfig, Spice};

use super::hook;

/// What an install changed.
#[derive(Debug)]
pub struct Installed {
    pub hook_path: PathBuf,
    pub config_path: PathBuf,
    /// A non-BACstop hook, or an older BACstop one, was replaced.
    pub overwrote: bool,
    /// Our hook was removed from the other slot.
    pub removed_other: Option<HookKind>,
}

/// Install and print a summary.
pub fn run(repo: &Path, config: &PolicyConfig) -> Result<()> {
    let repo = repo
        .canonicalize()
        .with_context(|| format!("repository not found: {}", repo.display()))?;
    let program = std::env::current_exe()
        .ok()
        .and_then(|p| p.to_str().map(str::to_string))
        .unwrap_or_else(|| "bacstop".to_string());

    let installed = install(&repo, config, &program)?;

    if let Some(other) = installed.removed_other {
        println!("  Removed old BACstop {other} hook.");
    }
    if installed.overwrote {
        println!("  Overwrote existing {} hook.", config.hook);
    }
    println!();
    println!("  BACstop installed!");
    println!("  Hook:      {}", installed.hook_path.display());
    println!("  Config:    {}", installed.config_path.display());
    println!("  Threshold: {}", config.threshold);
    println!("  Spice:     {} ({})", config.spice, config.spice.description());
    println!();
    if config.spice == Spice::Diablo {
        println!("  !! DIABLO MODE: failing the check will DESTROY your changes !!");
        println!();
    }
    Ok(())
}

/// Write the hook for `config.hook`, drop ours from the other slot, and save
/// `.bacstop`.
pub fn install(repo: &Path, config: &PolicyConfig, program: &str) -> Result<Installed> {
    let hooks_dir = hook::hooks_dir(repo)?;
    fs::create_dir_all(&hooks_dir)
        .with_context(|| format!("creating {}", hooks_dir.display()))?;

    let other = config.hook.other();
    let other_path = hooks_dir.join(other.as_str());
    let removed_other = if hook::is_bacstop_hook(&other_path)? {
        fs::remove_file(&other_path)
            .with_context(|| format!("removing {}", other_path.display()))?;
        Some(other)
    } else {
        None
    };

    let hook_path = hooks_dir.join(config.hook.as_str());
    let overwrote = hook_path.exists();
    fs::write(&hook_path, hook::script(config.hook, program))
        .with_context(|| format!("writing {}", hook_path.display()))?;
    make_executable(&hook_path)?;

    let config_path = config
        .save(repo)
        .with_context(|| format!("writing config in {}", repo.display()))?;

    info!(hook = %config.hook, spice = %config.spice, threshold = %config.threshold, "installed");
    Ok(Installed {
        hook_path,
        config_path,
        overwrote,
        removed_other,
    })
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o755);
    fs::set_permissions(path, perms).with_context(|| format!("chmod {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bacstop_protocol::Bac;

    fn repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        dir
    }

    fn config(spice: Spice, hook: HookKind) -> PolicyConfig {
        PolicyConfig {
            threshold: Bac::from_raw(200),
            spice,
            hook,
        }
    }

    #[test]
    fn install_writes_hook_and_config() {
        let dir = repo();
        let cfg = config(Spice::Diablo, HookKind::PreCommit);
        let installed = install(dir.path(), &cfg, "bacstop").unwrap();

        assert_eq!(installed.hook_path, dir.path().join(".git/hooks/pre-commit"));
        assert!(!installed.overwrote);
        assert_eq!(installed.removed_other, None);
        assert!(hook::is_bacstop_hook(&installed.hook_path).unwrap());
        assert_eq!(PolicyConfig::load(dir.path()).unwrap(), cfg);
    }

    #[cfg(unix)]
    #[test]
    fn hook_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = repo();
        let installed = install(dir.path(), &PolicyConfig::default(), "bacstop").unwrap();
        let mode = fs::metadata(&installed.hook_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn install_rejects_non_repository() {
        let dir = tempfile::tempdir().unwrap();
        let err = install(dir.path(), &PolicyConfig::default(), "bacstop").unwrap_err();
        assert!(err.to_string().contains("not a git repository"));
        assert!(!dir.path().join(".bacstop").exists());
    }

    #[test]
    fn switching_slots_removes_old_hook() {
        let dir = repo();
        install(dir.path(), &config(Spice::Hot, HookKind::PrePush), "bacstop").unwrap();
        let installed =
            install(dir.path(), &config(Spice::Hot, HookKind::PreCommit), "bacstop").unwrap();

        assert_eq!(installed.removed_other, Some(HookKind::PrePush));
        assert!(!dir.path().join(".git/hooks/pre-push").exists());
        assert!(dir.path().join(".git/hooks/pre-commit").exists());
    }

    #[test]
    fn foreign_hook_in_other_slot_survives() {
        let dir = repo();
        let hooks = dir.path().join(".git/hooks");
        fs::create_dir_all(&hooks).unwrap();
        fs::write(hooks.join("pre-commit"), "#!/bin/sh\ncargo test\n").unwrap();

        let installed = install(dir.path(), &PolicyConfig::default(), "bacstop").unwrap();
        assert_eq!(installed.removed_other, None);
        assert_eq!(
            fs::read_to_string(hooks.join("pre-commit")).unwrap(),
            "#!/bin/sh\ncargo test\n"
        );
    }

    #[test]
    fn overwriting_is_reported() {
        let dir = repo();
        let hooks = dir.path().join(".git/hooks");
        fs::create_dir_all(&hooks).unwrap();
        fs::write(hooks.join("pre-push"), "#!/bin/sh\nexit 0\n").unwrap();

        let installed = install(dir.path(), &PolicyConfig::default(), "bacstop").unwrap();
        assert!(installed.overwrote);
        assert!(hook::is_bacstop_hook(&installed.hook_path).unwrap());
    }
}
