use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tracing::{info, warn};

use crate::{
    config::{Config, ConfigBuilder, ConfigError},
    gpt::{GptClient, GptClientError, GptClientOption, OpenAIKey, OpenAIModel},
    repl::ChatRepl,
    store::{ConversationLog, ImportantInformation},
};

/// Chat with an OpenAI model from the terminal. Type `exit` to finish and
/// keep a summary of what was said for the next run.
#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    #[clap(short = 'm', long = "model", env = "MEMCHAT_MODEL", default_value = "gpt-3.5-turbo")]
    model: OpenAIModel,
    #[clap(long = "endpoint", env = "MEMCHAT_ENDPOINT")]
    endpoint: Option<String>,
    /// File of remembered facts, read at startup and appended on exit.
    #[clap(long = "important-info", env = "MEMCHAT_IMPORTANT_INFO")]
    important_info: Option<PathBuf>,
    #[clap(long = "log-file", env = "MEMCHAT_LOG_FILE")]
    log_file: Option<PathBuf>,
    /// Seconds to wait for each response. Waits forever when unset.
    #[clap(long = "timeout", env = "MEMCHAT_TIMEOUT")]
    timeout: Option<u64>,
    /// Proxy for every request, still honoring `NO_PROXY`. Defaults to the
    /// standard proxy variables.
    #[clap(long = "proxy", env = "MEMCHAT_PROXY")]
    proxy: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] GptClientError),
    #[error("Error on terminal io: {0}")]
    Io(#[from] std::io::Error),
}

impl Cli {
    pub fn new() -> Self {
        Self::parse()
    }
    pub fn config(&self) -> Result<Config, ConfigError> {
        let key = OpenAIKey::from_env();
        if key.is_empty() {
            warn!("Please set the {} in your Environment Variables", OpenAIKey::ENV);
        }
        self.builder().build(key, GptClientOption::from_env())
    }
    fn builder(&self) -> ConfigBuilder {
        ConfigBuilder::new()
            .model(self.model)
            .endpoint(self.endpoint.clone())
            .important_info(self.important_info.clone())
            .log_file(self.log_file.clone())
            .timeout(self.timeout.map(Duration::from_secs))
            .proxy(self.proxy.clone())
    }
    pub fn run(&self) -> Result<(), CliError> {
        let config = self.config()?;
        info!(
            model = %config.model,
            important_info = %config.important_info.display(),
            log_file = %config.log_file.display(),
            "starting chat"
        );
        let client = GptClient::with_url(
            config.key,
            config.model,
            config.endpoint,
            config.client_option,
        )?;
        let mut repl = ChatRepl::new(
            client,
            ImportantInformation::new(config.important_info),
            ConversationLog::new(config.log_file),
        );
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        repl.repl(stdin.lock(), &mut stdout)?;
        Ok(())
    }
}
