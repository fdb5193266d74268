use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::engine::llm_client::{
    Backend, GeminiClient, OpenAiCompatibleClient, DEFAULT_GEMINI_MODEL, LOCAL_BASE_URL,
};

const APP_DIR: &str = "willow";
const DEFAULT_LOCAL_MODEL: &str = "local-model";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config directory available on this platform; pass --config-root")]
    NoConfigRoot,

    #[error("cannot create config root {path}: {source}")]
    CreateRoot {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("credential file {path} is missing or unreadable: {source}")]
    CredentialUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("credential file {0} is empty")]
    CredentialEmpty(PathBuf),

    #[error("username {0:?} is taken by the agent; pick another with --username")]
    UsernameTaken(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Gemini,
    OpenaiCompatible,
}

/// Terminal chat with a remote language model.
#[derive(Debug, Parser)]
#[command(name = "willow", version, about)]
pub struct Cli {
    /// Directory holding instructions, history, credentials and UI settings
    #[arg(long, env = "CONFIG_ROOT")]
    pub config_root: Option<PathBuf>,

    #[arg(long, env = "INSTRUCTIONS_FILE", default_value = "instructions.txt")]
    pub instructions_file: PathBuf,

    #[arg(long, env = "HISTORY_FILE", default_value = "history.json")]
    pub history_file: PathBuf,

    /// File containing the API key
    #[arg(long, env = "GEMINI_KEY_FILE", default_value = "gemini.key")]
    pub key_file: PathBuf,

    /// Asked for on stdin when absent
    #[arg(long)]
    pub username: Option<String>,

    #[arg(long, default_value = "Willow")]
    pub agent_name: String,

    #[arg(long, value_enum, default_value_t = Provider::Gemini)]
    pub provider: Provider,

    #[arg(long)]
    pub model: Option<String>,

    /// Base URL override for the selected backend
    #[arg(long)]
    pub endpoint: Option<String>,

    #[arg(long, default_value_t = 10)]
    pub save_interval_secs: u64,

    #[arg(long, default_value_t = 100)]
    pub poll_interval_ms: u64,

    #[arg(long)]
    pub no_color: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub config_root: PathBuf,
    pub instructions_file: PathBuf,
    pub history_file: PathBuf,
    pub key_file: PathBuf,
    pub username: Option<String>,
    pub agent_name: String,
    pub provider: Provider,
    pub model: String,
    pub endpoint: Option<String>,
    pub save_interval: Duration,
    pub poll_interval: Duration,
    pub no_color: bool,
}

impl AppConfig {
    /// Resolves every path against the config root and creates the root.
    pub fn resolve(cli: Cli) -> Result<Self, ConfigError> {
        let config_root = match cli.config_root {
            Some(root) => root,
            None => dirs::config_dir()
                .ok_or(ConfigError::NoConfigRoot)?
                .join(APP_DIR),
        };
        fs::create_dir_all(&config_root).map_err(|source| ConfigError::CreateRoot {
            path: config_root.clone(),
            source,
        })?;

        let model = cli.model.unwrap_or_else(|| match cli.provider {
            Provider::Gemini => DEFAULT_GEMINI_MODEL.to_string(),
            Provider::OpenaiCompatible => DEFAULT_LOCAL_MODEL.to_string(),
        });

        let config = Self {
            instructions_file: under(&config_root, cli.instructions_file),
            history_file: under(&config_root, cli.history_file),
            key_file: under(&config_root, cli.key_file),
            config_root,
            username: cli
                .username
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            agent_name: cli.agent_name,
            provider: cli.provider,
            model,
            endpoint: cli.endpoint,
            save_interval: Duration::from_secs(cli.save_interval_secs.max(1)),
            poll_interval: Duration::from_millis(cli.poll_interval_ms.max(1)),
            no_color: cli.no_color,
        };
        if let Some(name) = &config.username {
            config.check_username(name)?;
        }
        Ok(config)
    }

    /// The agent never answers its own name, so a human using it would
    /// never get a reply.
    pub fn check_username(&self, name: &str) -> Result<(), ConfigError> {
        if name.trim().eq_ignore_ascii_case(self.agent_name.trim()) {
            return Err(ConfigError::UsernameTaken(name.to_string()));
        }
        Ok(())
    }

    pub fn backend(&self, api_key: String) -> Backend {
        match self.provider {
            Provider::Gemini => {
                let mut client = GeminiClient::new(api_key, self.model.clone());
                if let Some(url) = &self.endpoint {
                    client = client.with_base_url(url.clone());
                }
                Backend::Gemini(client)
            }
            Provider::OpenaiCompatible => {
                let url = self.endpoint.as_deref().unwrap_or(LOCAL_BASE_URL);
                Backend::OpenAiCompatible(
                    OpenAiCompatibleClient::new(url, self.model.clone()).with_api_key(api_key),
                )
            }
        }
    }
}

fn under(root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

/// Reads the API key once. Surrounding whitespace is stripped.
pub fn load_credential(path: &Path) -> Result<String, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::CredentialUnreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let key = raw.trim();
    if key.is_empty() {
        return Err(ConfigError::CredentialEmpty(path.to_path_buf()));
    }
    Ok(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["willow"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn relative_paths_land_under_the_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nested/root");
        let abs = dir.path().join("elsewhere.json");

        let config = AppConfig::resolve(cli(&[
            "--config-root",
            root.to_str().unwrap(),
            "--history-file",
            abs.to_str().unwrap(),
        ]))
        .unwrap();

        assert!(root.is_dir());
        assert_eq!(config.instructions_file, root.join("instructions.txt"));
        assert_eq!(config.key_file, root.join("gemini.key"));
        assert_eq!(config.history_file, abs);
        assert_eq!(config.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.save_interval, Duration::from_secs(10));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn local_provider_gets_its_own_default_model() {
        let dir = tempdir().unwrap();
        let config = AppConfig::resolve(cli(&[
            "--config-root",
            dir.path().to_str().unwrap(),
            "--provider",
            "openai-compatible",
            "--username",
            "  ",
        ]))
        .unwrap();

        assert_eq!(config.provider, Provider::OpenaiCompatible);
        assert_eq!(config.model, "local-model");
        assert!(config.username.is_none());
        assert!(matches!(
            config.backend(String::new()),
            Backend::OpenAiCompatible(_)
        ));
    }

    #[test]
    fn agent_name_cannot_be_the_username() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_str().unwrap();

        let err = AppConfig::resolve(cli(&["--config-root", root, "--username", "willow"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UsernameTaken(_)));

        let config = AppConfig::resolve(cli(&[
            "--config-root",
            root,
            "--agent-name",
            "Ada",
            "--username",
            " JJ ",
        ]))
        .unwrap();
        assert_eq!(config.username.as_deref(), Some("JJ"));
        assert!(config.check_username("ada").is_err());
        assert!(config.check_username("Willow").is_ok());
    }

    #[test]
    fn credential_must_exist_and_be_non_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gemini.key");

        assert!(matches!(
            load_credential(&path),
            Err(ConfigError::CredentialUnreadable { .. })
        ));

        fs::write(&path, " \n").unwrap();
        assert!(matches!(
            load_credential(&path),
            Err(ConfigError::CredentialEmpty(_))
        ));

        fs::write(&path, "abc123\n").unwrap();
        assert_eq!(load_credential(&path).unwrap(), "abc123");
    }
}
