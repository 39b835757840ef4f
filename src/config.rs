//! Configuration for reelshelf.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (REELSHELF_HOME, REELSHELF_SNAPSHOT,
//!    REELSHELF_OWNER_ID, TELEGRAM_BOT_TOKEN)
//! 2. Config file (.reelshelf/config.yaml)
//! 3. Defaults (~/.reelshelf)
//!
//! Config file discovery:
//! - Searches current directory and parents for .reelshelf/config.yaml
//! - Paths in config file are relative to the .reelshelf/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".reelshelf";
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub bot: BotConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to config file)
    pub home: Option<String>,
    /// Catalog snapshot file (relative to config file)
    pub snapshot: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessConfig {
    /// Only this sender may add media
    pub owner_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotConfig {
    pub poll_timeout_seconds: Option<u64>,
    /// Appended to delivered media captions
    pub footer: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to reelshelf home
    pub home: PathBuf,
    /// Catalog snapshot file
    pub snapshot: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub owner_id: Option<i64>,
    pub bot_token: Option<String>,
    pub poll_timeout_seconds: u64,
    pub footer: Option<String>,
}

impl ResolvedConfig {
    /// Bot token, or an error naming the variable to set
    pub fn require_bot_token(&self) -> Result<&str> {
        self.bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .context("TELEGRAM_BOT_TOKEN is not set")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve everything given an optional config file
fn resolve(config_file: Option<PathBuf>, default_home: PathBuf) -> Result<ResolvedConfig> {
    let file = match config_file {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    // Relative paths in the file are anchored at .reelshelf/
    let config_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));

    let home = if let Some(env_home) = env_var("REELSHELF_HOME") {
        PathBuf::from(env_home)
    } else if let Some(ref home_path) = file.paths.home {
        resolve_path(config_dir, home_path)
    } else {
        default_home
    };

    let snapshot = if let Some(env_snapshot) = env_var("REELSHELF_SNAPSHOT") {
        PathBuf::from(env_snapshot)
    } else if let Some(ref snapshot_path) = file.paths.snapshot {
        resolve_path(config_dir, snapshot_path)
    } else {
        home.join("catalog.json")
    };

    let owner_id = match env_var("REELSHELF_OWNER_ID") {
        Some(raw) => Some(
            raw.trim()
                .parse::<i64>()
                .with_context(|| format!("REELSHELF_OWNER_ID is not an integer: {}", raw))?,
        ),
        None => file.access.owner_id,
    };

    Ok(ResolvedConfig {
        home,
        snapshot,
        config_file,
        owner_id,
        bot_token: env_var("TELEGRAM_BOT_TOKEN"),
        poll_timeout_seconds: file
            .bot
            .poll_timeout_seconds
            .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
        footer: file.bot.footer,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    resolve(find_config_file(), default_home)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the catalog snapshot path
pub fn snapshot_path() -> Result<PathBuf> {
    Ok(config()?.snapshot.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();

        let config_path = config_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
paths:
  home: ./state
  snapshot: ../catalog.json
access:
  owner_id: 123456
bot:
  poll_timeout_seconds: 50
  footer: "💖 Powered by reelshelf"
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.paths.home, Some("./state".to_string()));
        assert_eq!(config.paths.snapshot, Some("../catalog.json".to_string()));
        assert_eq!(config.access.owner_id, Some(123456));
        assert_eq!(config.bot.poll_timeout_seconds, Some(50));
        assert_eq!(config.bot.footer.as_deref(), Some("💖 Powered by reelshelf"));
    }

    #[test]
    fn test_empty_sections_default() {
        let config: ConfigFile = serde_yaml::from_str("bot: {}\n").unwrap();
        assert!(config.paths.home.is_none());
        assert!(config.access.owner_id.is_none());
        assert!(config.bot.footer.is_none());
    }

    #[test]
    fn test_resolve_defaults_without_file() {
        if env_var("REELSHELF_HOME").is_some() || env_var("REELSHELF_SNAPSHOT").is_some() {
            return;
        }

        let home = PathBuf::from("/tmp/reelshelf-home");
        let config = resolve(None, home.clone()).unwrap();
        assert_eq!(config.home, home);
        assert_eq!(config.snapshot, home.join("catalog.json"));
        assert_eq!(config.poll_timeout_seconds, DEFAULT_POLL_TIMEOUT_SECS);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_resolve_paths_relative_to_config_dir() {
        if env_var("REELSHELF_HOME").is_some() || env_var("REELSHELF_SNAPSHOT").is_some() {
            return;
        }

        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        let config_path = config_dir.join("config.yaml");
        std::fs::write(&config_path, "paths:\n  home: ./state\n").unwrap();

        let config = resolve(Some(config_path.clone()), PathBuf::from("/unused")).unwrap();
        assert_eq!(config.home, config_dir.join("./state"));
        assert_eq!(config.snapshot, config.home.join("catalog.json"));
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }

    #[test]
    fn test_missing_token_is_reported() {
        let config = ResolvedConfig {
            home: PathBuf::from("/h"),
            snapshot: PathBuf::from("/h/catalog.json"),
            config_file: None,
            owner_id: None,
            bot_token: None,
            poll_timeout_seconds: 30,
            footer: None,
        };
        let err = config.require_bot_token().unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));
    }
}
