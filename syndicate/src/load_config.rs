/// `load_config` module: resolves the job's environment, an optional YAML file and
/// command-line overrides into the typed [`RunConfig`] the core consumes.
///
/// This is the only place that reads process-wide state. Everything below it
/// receives explicit values.
///
/// # Precedence
/// Command-line flags win over the YAML file, which wins over the environment.
///
/// # Environment
/// - `GITHUB_TOKEN`, `GITHUB_REPOSITORY`, `GITHUB_REF`, `GITHUB_SHA` (required for a run)
/// - `SYNDICATE_SHA`: commit cursor left by an earlier step, defaults to `GITHUB_SHA`
/// - `SYNDICATE_POST_DIR`: posts directory, defaults to `posts`
/// - `SYNDICATE_POSTS`: JSON accumulator of ids from earlier steps
/// - `INPUT_SILOS`: comma or newline separated silo names
/// - `<SILO>_API_KEY` / `<SILO>_API_URL`: per-silo credential and endpoint
/// - `GITHUB_API_URL`: GitHub API base
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use syndicate_core::config::{RunConfig, SiloConfig, DEFAULT_POSTS_DIR};
use syndicate_core::syndication::PendingUpdate;
use tracing::{error, info};

use crate::github::{GithubSettings, DEFAULT_API_URL};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SiloEntry {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        base_url: Option<String>,
    },
}

impl SiloEntry {
    fn name(&self) -> &str {
        match self {
            SiloEntry::Name(name) | SiloEntry::Detailed { name, .. } => name,
        }
    }

    fn base_url(&self) -> Option<&str> {
        match self {
            SiloEntry::Name(_) => None,
            SiloEntry::Detailed { base_url, .. } => base_url.as_deref(),
        }
    }
}

/// The YAML config file. Secrets never live here.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub posts_dir: Option<String>,
    #[serde(default)]
    pub silos: Vec<SiloEntry>,
}

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub posts_dir: Option<String>,
    pub silos: Vec<String>,
}

/// Everything `syndicate run` needs.
#[derive(Debug)]
pub struct Settings {
    pub run: RunConfig,
    pub github: GithubSettings,
    /// Ids recorded by earlier steps of the same job.
    pub prior: PendingUpdate,
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required_env(key: &str) -> Result<String> {
    match optional_env(key) {
        Some(value) => Ok(value),
        None => {
            error!(var = key, "Required environment variable not set");
            Err(anyhow::anyhow!("missing {key}"))
        }
    }
}

/// Environment prefix for a silo's settings: `dev.to` -> `DEV_TO`.
fn env_prefix(silo: &str) -> String {
    silo.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Parse the YAML config file at `path`.
pub fn load_file_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    match serde_yaml::from_str::<Option<FileConfig>>(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf.unwrap_or_default())
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

fn file_config(overrides: &Overrides) -> Result<FileConfig> {
    match &overrides.config {
        Some(path) => load_file_config(path),
        None => Ok(FileConfig::default()),
    }
}

fn silo_config(name: &str, file_base_url: Option<&str>) -> SiloConfig {
    let prefix = env_prefix(name);
    SiloConfig {
        name: name.to_string(),
        api_key: optional_env(&format!("{prefix}_API_KEY")),
        base_url: file_base_url
            .map(str::to_owned)
            .or_else(|| optional_env(&format!("{prefix}_API_URL"))),
    }
}

/// Resolve the configured silos with their credentials.
pub fn load_silos(overrides: &Overrides) -> Result<Vec<SiloConfig>> {
    let file = file_config(overrides)?;
    resolve_silos(overrides, &file)
}

fn resolve_silos(overrides: &Overrides, file: &FileConfig) -> Result<Vec<SiloConfig>> {
    let silos: Vec<SiloConfig> = if !overrides.silos.is_empty() {
        overrides
            .silos
            .iter()
            .map(|name| {
                let base_url = file
                    .silos
                    .iter()
                    .find(|s| s.name().eq_ignore_ascii_case(name))
                    .and_then(SiloEntry::base_url);
                silo_config(name, base_url)
            })
            .collect()
    } else if !file.silos.is_empty() {
        file.silos
            .iter()
            .map(|s| silo_config(s.name(), s.base_url()))
            .collect()
    } else {
        optional_env("INPUT_SILOS")
            .unwrap_or_default()
            .split([',', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|name| silo_config(name, None))
            .collect()
    };

    if silos.is_empty() {
        error!("No silos configured");
        anyhow::bail!("no silos configured: pass --silo, list them in the config file, or set INPUT_SILOS");
    }
    info!(silos = ?silos.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), "Resolved silos");
    Ok(silos)
}

/// Resolve the full run configuration.
pub fn load_config(overrides: &Overrides) -> Result<Settings> {
    let file = file_config(overrides)?;

    let token = required_env("GITHUB_TOKEN")?;
    let repository = required_env("GITHUB_REPOSITORY")?;
    let branch_ref = required_env("GITHUB_REF")?;
    let trigger_sha = required_env("GITHUB_SHA")?;
    let parent_sha = optional_env("SYNDICATE_SHA").unwrap_or_else(|| trigger_sha.clone());

    let posts_dir = overrides
        .posts_dir
        .clone()
        .or(file.posts_dir.clone())
        .or_else(|| optional_env("SYNDICATE_POST_DIR"))
        .unwrap_or_else(|| DEFAULT_POSTS_DIR.to_string());

    let silos = resolve_silos(overrides, &file)?;

    let prior = match optional_env("SYNDICATE_POSTS") {
        Some(raw) => PendingUpdate::from_json(&raw).context("SYNDICATE_POSTS is not valid JSON")?,
        None => PendingUpdate::default(),
    };

    let github = GithubSettings {
        token,
        api_url: optional_env("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
    };

    info!(
        repository = %repository,
        posts_dir = %posts_dir,
        silos_count = silos.len(),
        "Config loaded and merged successfully"
    );

    Ok(Settings {
        run: RunConfig {
            repository,
            branch_ref,
            trigger_sha,
            parent_sha,
            posts_dir,
            silos,
        },
        github,
        prior,
    })
}
