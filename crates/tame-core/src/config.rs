//! Repository configuration: root discovery, `tame.yaml` settings, and
//! environment overrides.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::cancel::CancelToken;
use crate::errors::{TameError, TameResult};
use crate::graph::collector::Layout;
use crate::models::ROOT_FILE_NAME;

const DEFAULT_EXTENSIONS: &[&str] = &["yaml", "yml"];

const ENV_WORKERS: &str = "TAME_WORKERS";
const ENV_METADATA_ONLY: &str = "TAME_METADATA_ONLY";

// ---------------------------------------------------------------------------
// RepoConfig
// ---------------------------------------------------------------------------

/// Settings read from the root `tame.yaml`. Every key is optional and an
/// empty file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Extensions (without the dot) of files treated as metadata documents.
    pub extensions: Vec<String>,
    pub workers: Option<usize>,
    /// Extra ignore globs applied during discovery, gitignore-style.
    pub ignore: Vec<String>,
    /// Types allowed to omit `files`.
    pub metadata_only_types: Vec<String>,
    /// Per-type describer templates.
    pub describers: IndexMap<String, String>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            workers: None,
            ignore: Vec::new(),
            metadata_only_types: Vec::new(),
            describers: IndexMap::new(),
        }
    }
}

impl RepoConfig {
    pub fn load(path: &Path) -> TameResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TameError::io(path, e))?;
        Self::from_yaml(&content, path)
    }

    pub fn from_yaml(content: &str, path: &Path) -> TameResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| TameError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        if value.is_null() {
            return Ok(Self::default());
        }
        let mut config: RepoConfig =
            serde_yaml::from_value(value).map_err(|e| TameError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.extensions = config
            .extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        if config.extensions.is_empty() {
            return Err(TameError::Config {
                path: path.to_path_buf(),
                message: "extensions must name at least one file extension".to_string(),
            });
        }
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Root discovery
// ---------------------------------------------------------------------------

/// Walk up from `start` (file or directory) to the nearest directory holding
/// a `tame.yaml`. Returns that directory, canonicalized.
pub fn find_root(start: &Path) -> TameResult<PathBuf> {
    let absolute = if start.is_absolute() {
        start.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| TameError::io(start, e))?
            .join(start)
    };
    let first_dir = if absolute.is_dir() {
        absolute.clone()
    } else {
        absolute
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| absolute.clone())
    };
    let mut current = std::fs::canonicalize(&first_dir).map_err(|e| TameError::io(&first_dir, e))?;
    loop {
        if current.join(ROOT_FILE_NAME).is_file() {
            return Ok(current);
        }
        match current.parent() {
            Some(up) => current = up.to_path_buf(),
            None => {
                return Err(TameError::UntrackedRepository {
                    start: start.to_path_buf(),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Run options
// ---------------------------------------------------------------------------

/// Effective settings of one engine run.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Worker count override; falls back to env, then config, then CPU count.
    pub workers: Option<usize>,
    /// Accept every document without `files` and skip tracked-file checks.
    pub metadata_only: bool,
    pub verify_files: bool,
    pub layout: Layout,
    pub cancel: CancelToken,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            workers: None,
            metadata_only: env_flag(ENV_METADATA_ONLY).unwrap_or(false),
            verify_files: true,
            layout: Layout::Mirror,
            cancel: CancelToken::new(),
        }
    }
}

impl EngineOptions {
    pub fn effective_workers(&self, config: &RepoConfig) -> usize {
        self.workers
            .or_else(workers_from_env)
            .or(config.workers)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4)
            })
            .max(1)
    }
}

fn workers_from_env() -> Option<usize> {
    std::env::var(ENV_WORKERS)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
}

fn env_flag(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    match val.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
