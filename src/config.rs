use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::gpt::{GptClientOption, OpenAIKey, OpenAIModel};

pub const IMPORTANT_INFO_FILE: &str = "important_information.txt";
pub const CONVERSATION_LOG_FILE: &str = "conversations.log";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("home directory not found, pass --important-info and --log-file explicitly")]
    NoHomeDirectory,
}

/// Everything a session needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub key: OpenAIKey,
    pub model: OpenAIModel,
    pub endpoint: String,
    pub important_info: PathBuf,
    pub log_file: PathBuf,
    pub client_option: GptClientOption,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    model: OpenAIModel,
    endpoint: Option<String>,
    important_info: Option<PathBuf>,
    log_file: Option<PathBuf>,
    timeout: Option<Duration>,
    proxy: Option<String>,
    home: Option<PathBuf>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            home: dirs::home_dir(),
            ..Default::default()
        }
    }
    pub fn model(mut self, model: OpenAIModel) -> Self {
        self.model = model;
        self
    }
    pub fn endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint;
        self
    }
    pub fn important_info(mut self, path: Option<PathBuf>) -> Self {
        self.important_info = path;
        self
    }
    pub fn log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
    pub fn proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }
    pub fn home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }
    pub fn build(self, key: OpenAIKey, client_option: GptClientOption) -> Result<Config, ConfigError> {
        let important_info = resolve(self.important_info, self.home.as_deref(), IMPORTANT_INFO_FILE)?;
        let log_file = resolve(self.log_file, self.home.as_deref(), CONVERSATION_LOG_FILE)?;
        Ok(Config {
            key,
            model: self.model,
            endpoint: self
                .endpoint
                .unwrap_or_else(|| crate::gpt::GptClient::URL.to_string()),
            important_info,
            log_file,
            client_option: GptClientOption {
                timeout: self.timeout.or(client_option.timeout),
                proxy: self.proxy.or(client_option.proxy),
                ..client_option
            },
        })
    }
}

fn resolve(explicit: Option<PathBuf>, home: Option<&Path>, file: &str) -> Result<PathBuf, ConfigError> {
    match (explicit, home) {
        (Some(path), _) => Ok(path),
        (None, Some(home)) => Ok(home.join(file)),
        (None, None) => Err(ConfigError::NoHomeDirectory),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn 既定ではhomeディレクトリ配下の両ファイルを使う() {
        let config = ConfigBuilder::new()
            .home(Some(PathBuf::from("/home/kai")))
            .build(OpenAIKey::new("key"), GptClientOption::default())
            .unwrap();

        assert_eq!(config.important_info, PathBuf::from("/home/kai/important_information.txt"));
        assert_eq!(config.log_file, PathBuf::from("/home/kai/conversations.log"));
        assert_eq!(config.endpoint, crate::gpt::GptClient::URL);
        assert_eq!(config.model, OpenAIModel::Gpt3Dot5Turbo);
    }
    #[test]
    fn 明示したパスが優先される() {
        let config = ConfigBuilder::new()
            .home(Some(PathBuf::from("/home/kai")))
            .important_info(Some(PathBuf::from("/tmp/info.txt")))
            .log_file(Some(PathBuf::from("/tmp/chat.log")))
            .build(OpenAIKey::new("key"), GptClientOption::default())
            .unwrap();

        assert_eq!(config.important_info, PathBuf::from("/tmp/info.txt"));
        assert_eq!(config.log_file, PathBuf::from("/tmp/chat.log"));
    }
    #[test]
    fn homeがなくパス指定もなければエラー() {
        let result = ConfigBuilder::new()
            .home(None)
            .important_info(Some(PathBuf::from("/tmp/info.txt")))
            .build(OpenAIKey::new("key"), GptClientOption::default());

        assert!(matches!(result, Err(ConfigError::NoHomeDirectory)));
    }
    #[test]
    fn timeoutは環境由来の設定より優先される() {
        let config = ConfigBuilder::new()
            .home(Some(PathBuf::from("/home/kai")))
            .timeout(Some(Duration::from_secs(10)))
            .build(
                OpenAIKey::new("key"),
                GptClientOption {
                    proxy: Some("http://localhost:8080".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(config.client_option.timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.client_option.proxy.as_deref(), Some("http://localhost:8080"));
    }
    #[test]
    fn 明示したproxyはno_proxyと一緒に渡される() {
        let config = ConfigBuilder::new()
            .home(Some(PathBuf::from("/home/kai")))
            .proxy(Some("http://proxy.internal:3128".to_string()))
            .build(
                OpenAIKey::new("key"),
                GptClientOption {
                    no_proxy: Some("localhost".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(
            config.client_option.proxy.as_deref(),
            Some("http://proxy.internal:3128")
        );
        assert_eq!(config.client_option.no_proxy.as_deref(), Some("localhost"));
    }
    #[test]
    fn proxyを指定しなければreqwestの既定に任せる() {
        let config = ConfigBuilder::new()
            .home(Some(PathBuf::from("/home/kai")))
            .build(OpenAIKey::new("key"), GptClientOption::default())
            .unwrap();

        assert_eq!(config.client_option.proxy, None);
    }
}
