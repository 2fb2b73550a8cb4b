//! Selection and directory resolution plus the optional TOML config file.
//!
//! A context is addressed by an `ecosystem:network:provider` selector.
//! Every part can come from an explicit argument or from the `ETHMAN_*`
//! environment; resolution fails fast naming whatever is missing.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tempfile::TempDir;

use crate::error::{Error, Result};

/// Parsed `ecosystem:network:provider` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub ecosystem: String,
    pub network: String,
    pub provider: String,
}

impl Selection {
    /// Parse a full selector string. All three parts must be non-empty.
    pub fn parse(selector: &str) -> Result<Self> {
        let parts: Vec<&str> = selector.splitn(3, ':').collect();
        match parts.as_slice() {
            [ecosystem, network, provider]
                if !ecosystem.is_empty() && !network.is_empty() && !provider.is_empty() =>
            {
                Ok(Self {
                    ecosystem: ecosystem.to_string(),
                    network: network.to_string(),
                    provider: provider.to_string(),
                })
            }
            _ => Err(Error::Config(format!(
                "malformed selector '{selector}', expected ecosystem:network:provider"
            ))),
        }
    }

    /// Resolve the selection with the documented precedence: explicit
    /// selector, then `ETHMAN_SELECTOR`, then per-part argument or
    /// `ETHMAN_ECOSYSTEM` / `ETHMAN_NETWORK` / `ETHMAN_PROVIDER`.
    pub fn resolve(
        ecosystem: Option<&str>,
        network: Option<&str>,
        provider: Option<&str>,
        selector: Option<&str>,
    ) -> Result<Self> {
        Self::resolve_with(ecosystem, network, provider, selector, |name| {
            std::env::var(name).ok()
        })
    }

    /// Same as [`Selection::resolve`] with an injected environment lookup.
    pub fn resolve_with(
        ecosystem: Option<&str>,
        network: Option<&str>,
        provider: Option<&str>,
        selector: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        if let Some(selector) = selector {
            return Self::parse(selector);
        }
        if let Some(selector) = env("ETHMAN_SELECTOR") {
            return Self::parse(&selector);
        }
        let part = |explicit: Option<&str>, var: &str| -> Result<String> {
            if let Some(value) = explicit {
                return Ok(value.to_string());
            }
            env(var).ok_or_else(|| {
                Error::Config(format!("selection incomplete: pass it explicitly or set {var}"))
            })
        };
        Ok(Self {
            ecosystem: part(ecosystem, "ETHMAN_ECOSYSTEM")?,
            network: part(network, "ETHMAN_NETWORK")?,
            provider: part(provider, "ETHMAN_PROVIDER")?,
        })
    }

    /// The combined selector string.
    pub fn selector(&self) -> String {
        format!("{}:{}:{}", self.ecosystem, self.network, self.provider)
    }
}

/// A directory the context owns for its lifetime.
///
/// Explicit paths are created with mode 0700 and kept; when nothing is
/// supplied the context falls back to a temporary directory that is
/// removed on drop, which doubles as the process-exit cleanup net for
/// any keyfiles left inside.
#[derive(Debug)]
pub enum WorkDir {
    Explicit(PathBuf),
    Temp(TempDir),
}

impl WorkDir {
    /// Resolve a working directory: explicit argument, then the given
    /// environment variable, then a fresh temp dir.
    pub fn resolve(explicit: Option<PathBuf>, env_var: &str) -> Result<Self> {
        let configured = explicit.or_else(|| std::env::var_os(env_var).map(PathBuf::from));
        match configured {
            Some(path) => {
                fs::create_dir_all(&path)?;
                restrict_permissions(&path)?;
                Ok(WorkDir::Explicit(path))
            }
            None => Ok(WorkDir::Temp(tempfile::tempdir()?)),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            WorkDir::Explicit(path) => path,
            WorkDir::Temp(dir) => dir.path(),
        }
    }
}

/// Create `parent/name` with owner-only permissions if it does not exist.
pub fn secure_subdir(parent: &Path, name: &str) -> Result<PathBuf> {
    let path = parent.join(name);
    fs::create_dir_all(&path)?;
    restrict_permissions(&path)?;
    Ok(path)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub name: Option<String>,
    pub rpc: Option<String>,
    pub ipc: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl Config {
    /// Look up a named endpoint from the config file.
    pub fn endpoint_named(&self, name: &str) -> Option<&EndpointConfig> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.name.as_deref() == Some(name))
    }
}

pub fn load() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return Config::default(),
    };
    toml::from_str::<Config>(&content).unwrap_or_default()
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("ETHMAN_CONFIG").map(PathBuf::from) {
        return Some(path);
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        return Some(xdg.join("ethman").join("config.toml"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".config").join("ethman").join("config.toml"));
    }

    directories::ProjectDirs::from("io", "ethman", "ethman")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Lowercased `0x`-prefixed form used as the ABI cache key.
pub fn normalize_address(address: &str) -> String {
    let trimmed = address.trim();
    let payload = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    format!("0x{}", payload.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_selector() {
        let selection = Selection::parse("ethereum:sepolia:node").unwrap();
        assert_eq!(selection.ecosystem, "ethereum");
        assert_eq!(selection.network, "sepolia");
        assert_eq!(selection.provider, "node");
        assert_eq!(selection.selector(), "ethereum:sepolia:node");
    }

    #[test]
    fn provider_part_may_contain_colons() {
        let selection = Selection::parse("ethereum:local:http://127.0.0.1:8545").unwrap();
        assert_eq!(selection.provider, "http://127.0.0.1:8545");
    }

    #[test]
    fn rejects_malformed_selectors() {
        for bad in ["", "ethereum", "ethereum:sepolia", "ethereum::node", ":sepolia:node"] {
            assert!(matches!(Selection::parse(bad), Err(Error::Config(_))), "{bad}");
        }
    }

    #[test]
    fn explicit_selector_beats_environment() {
        let env = |name: &str| match name {
            "ETHMAN_SELECTOR" => Some("ethereum:mainnet:node".to_string()),
            _ => None,
        };
        let selection =
            Selection::resolve_with(None, None, None, Some("ethereum:sepolia:anvil"), env).unwrap();
        assert_eq!(selection.network, "sepolia");
    }

    #[test]
    fn environment_selector_beats_parts() {
        let env = |name: &str| match name {
            "ETHMAN_SELECTOR" => Some("ethereum:holesky:node".to_string()),
            "ETHMAN_NETWORK" => Some("mainnet".to_string()),
            _ => None,
        };
        let selection = Selection::resolve_with(Some("ethereum"), None, None, None, env).unwrap();
        assert_eq!(selection.network, "holesky");
    }

    #[test]
    fn missing_part_names_the_variable() {
        let env = |name: &str| match name {
            "ETHMAN_ECOSYSTEM" => Some("ethereum".to_string()),
            _ => None,
        };
        let err = Selection::resolve_with(None, None, Some("node"), None, env).unwrap_err();
        match err {
            Error::Config(msg) => assert!(msg.contains("ETHMAN_NETWORK"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn temp_workdir_is_removed_on_drop() {
        let dir = WorkDir::resolve(None, "ETHMAN_TEST_UNSET_DIR").unwrap();
        let path = dir.path().to_path_buf();
        assert!(path.is_dir());
        drop(dir);
        assert!(!path.exists());
    }

    #[test]
    fn explicit_workdir_is_created_and_kept() {
        let scratch = tempfile::tempdir().unwrap();
        let target = scratch.path().join("project");
        let dir = WorkDir::resolve(Some(target.clone()), "ETHMAN_TEST_UNSET_DIR").unwrap();
        assert!(target.is_dir());
        drop(dir);
        assert!(target.is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&target).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn normalizes_addresses_for_cache_keys() {
        assert_eq!(
            normalize_address(" 0XAbC123 "),
            "0xabc123".to_string()
        );
        assert_eq!(normalize_address("abc"), "0xabc".to_string());
    }
}
