//! Policy configuration and the `.bacstop` file.
//!
//! The file lives at the repository root and is plain TOML:
//!
//! ```toml
//! threshold = 0.02
//! spice = "hot"
//! hook = "pre-push"
//! ```
//!
//! Missing keys fall back to defaults; `BACSTOP_THRESHOLD`, `BACSTOP_SPICE`
//! and `BACSTOP_HOOK` override the file. Unknown values are errors, never
//! silently replaced by a default.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use bacstop_protocol::Bac;

use crate::error::{PolicyError, Result};

/// Name of the per-repository config file.
pub const CONFIG_FILE_NAME: &str = ".bacstop";

/// Environment variable overriding the threshold.
pub const ENV_THRESHOLD: &str = "BACSTOP_THRESHOLD";
/// Environment variable overriding the spice level.
pub const ENV_SPICE: &str = "BACSTOP_SPICE";
/// Environment variable overriding the hook type.
pub const ENV_HOOK: &str = "BACSTOP_HOOK";

/// How hard a failed threshold check hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spice {
    /// Informational only; always allows.
    Verde,
    /// Blocks when BAC is below the threshold.
    Hot,
    /// Blocks and destroys the pending change set.
    Diablo,
}

impl Spice {
    pub const ALL: [Spice; 3] = [Spice::Verde, Spice::Hot, Spice::Diablo];

    pub fn as_str(&self) -> &'static str {
        match self {
            Spice::Verde => "verde",
            Spice::Hot => "hot",
            Spice::Diablo => "diablo",
        }
    }

    /// One-line description for humans.
    pub fn description(&self) -> &'static str {
        match self {
            Spice::Verde => "informational only, always allows",
            Spice::Hot => "blocks if BAC below threshold",
            Spice::Diablo => "blocks AND destroys your changes",
        }
    }
}

impl fmt::Display for Spice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Spice {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Spice::ALL
            .into_iter()
            .find(|spice| spice.as_str() == wanted)
            .ok_or_else(|| PolicyError::UnknownSpice {
                value: s.to_string(),
            })
    }
}

/// The git hook being gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookKind {
    PreCommit,
    PrePush,
}

impl HookKind {
    pub const ALL: [HookKind; 2] = [HookKind::PreCommit, HookKind::PrePush];

    /// The hook's file name under `.git/hooks`.
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::PreCommit => "pre-commit",
            HookKind::PrePush => "pre-push",
        }
    }

    /// The other hook slot.
    pub fn other(&self) -> HookKind {
        match self {
            HookKind::PreCommit => HookKind::PrePush,
            HookKind::PrePush => HookKind::PreCommit,
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookKind {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        HookKind::ALL
            .into_iter()
            .find(|hook| hook.as_str() == wanted)
            .ok_or_else(|| PolicyError::UnknownHook {
                value: s.to_string(),
            })
    }
}

/// Parse a threshold percentage from text.
pub fn parse_threshold(s: &str) -> Result<Bac> {
    let percent: f64 = s
        .trim()
        .parse()
        .map_err(|e: std::num::ParseFloatError| PolicyError::InvalidThreshold {
            value: s.to_string(),
            reason: e.to_string(),
        })?;
    Ok(Bac::from_percent(percent)?)
}

/// Policy inputs for one gated operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PolicyConfig {
    /// Minimum BAC that counts as passing.
    pub threshold: Bac,
    pub spice: Spice,
    pub hook: HookKind,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            threshold: Bac::ZERO,
            spice: Spice::Hot,
            hook: HookKind::PrePush,
        }
    }
}

/// On-disk shape; every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    threshold: Option<f64>,
    spice: Option<String>,
    hook: Option<String>,
}

impl PolicyConfig {
    /// Parse `.bacstop` content. `origin` is only used in error messages.
    pub fn parse(content: &str, origin: &Path) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content).map_err(|source| PolicyError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;

        let mut config = PolicyConfig::default();
        if let Some(threshold) = file.threshold {
            config.threshold = Bac::from_percent(threshold)?;
        }
        if let Some(spice) = file.spice {
            config.spice = spice.parse()?;
        }
        if let Some(hook) = file.hook {
            config.hook = hook.parse()?;
        }
        Ok(config)
    }

    /// Path of the config file for a repository root.
    pub fn path_in(repo_root: &Path) -> PathBuf {
        repo_root.join(CONFIG_FILE_NAME)
    }

    /// Load `.bacstop` from a repository root; defaults when absent.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let path = Self::path_in(repo_root);
        if !path.is_file() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        Self::parse(&content, &path)
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(ENV_THRESHOLD) {
            self.threshold = parse_threshold(&value)?;
        }
        if let Some(value) = lookup(ENV_SPICE) {
            self.spice = value.parse()?;
        }
        if let Some(value) = lookup(ENV_HOOK) {
            self.hook = value.parse()?;
        }
        Ok(self)
    }

    /// Load the file and apply environment overrides.
    pub fn resolve(repo_root: &Path) -> Result<Self> {
        let config = Self::load(repo_root)?.with_overrides(|key| std::env::var(key).ok())?;
        debug!(?config, "resolved policy config");
        Ok(config)
    }

    /// Render as `.bacstop` TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Write `.bacstop` into a repository root.
    pub fn save(&self, repo_root: &Path) -> Result<PathBuf> {
        let path = Self::path_in(repo_root);
        fs::write(&path, self.to_toml()?)?;
        Ok(path)
    }
}
