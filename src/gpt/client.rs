use std::{
    fmt::{Debug, Display},
    str::FromStr,
    time::Duration,
};

use reqwest::{
    blocking::{Client, RequestBuilder, Response},
    header::CONTENT_TYPE,
    Certificate, NoProxy, Proxy,
};
use tracing::debug;

/// Anything that can turn an ordered message history into the next reply.
pub trait Chat {
    fn chat(&self, messages: &[Message]) -> Result<String>;
}

impl<T: Chat + ?Sized> Chat for &T {
    fn chat(&self, messages: &[Message]) -> Result<String> {
        (**self).chat(messages)
    }
}

#[derive(Debug, PartialEq, Clone, Default, Eq)]
pub struct GptClientOption {
    /// Explicit proxy. Without one reqwest reads `HTTPS_PROXY`/`HTTP_PROXY` itself.
    pub proxy: Option<String>,
    /// Hosts that skip the explicit proxy, in `NO_PROXY` syntax.
    pub no_proxy: Option<String>,
    pub ca_path: Option<String>,
    pub timeout: Option<Duration>,
}
impl GptClientOption {
    pub fn from_env() -> Self {
        Self {
            proxy: None,
            no_proxy: no_proxy_from_env(),
            ca_path: root_ca_from_env(),
            timeout: None,
        }
    }
}

pub struct GptClient {
    key: OpenAIKey,
    model: OpenAIModel,
    url: String,
    http: Client,
}
impl GptClient {
    pub const URL: &'static str = "https://api.openai.com/v1/chat/completions";
    pub fn new(key: OpenAIKey, model: OpenAIModel, option: GptClientOption) -> Result<Self> {
        Self::with_url(key, model, Self::URL, option)
    }
    pub fn with_url(
        key: OpenAIKey,
        model: OpenAIModel,
        url: impl Into<String>,
        option: GptClientOption,
    ) -> Result<Self> {
        // blocking clients otherwise default to a 30s timeout
        let mut builder = Client::builder().timeout(option.timeout);
        if let Some(proxy) = option.proxy {
            let proxy = Proxy::all(&proxy)
                .map_err(|e| {
                    GptClientError::new(
                        format!("invalid proxy url: {}", e),
                        GptClientErrorKind::InvalidUrl(proxy.clone()),
                    )
                })?
                .no_proxy(option.no_proxy.as_deref().and_then(NoProxy::from_string));
            builder = builder.proxy(proxy);
        }
        if let Some(ca) = option.ca_path {
            builder = builder.add_root_certificate(Self::load_ca(&ca)?);
        }
        let http = builder.build().map_err(|e| {
            GptClientError::new(
                "Cause Error at GptClient::new".to_string(),
                GptClientErrorKind::RequestError(e.to_string()),
            )
        })?;
        Ok(Self {
            key,
            model,
            url: url.into(),
            http,
        })
    }
    pub fn from_env(model: OpenAIModel) -> Result<Self> {
        Self::new(OpenAIKey::from_env(), model, GptClientOption::from_env())
    }
    fn load_ca(path: &str) -> Result<Certificate> {
        let invalid_ca = |message: String| {
            GptClientError::new(message, GptClientErrorKind::NotFoundCAFile(path.to_string()))
        };
        let pem = std::fs::read(path).map_err(|e| invalid_ca(format!("invalid ca: {}", e)))?;
        Certificate::from_pem(&pem).map_err(|e| invalid_ca(format!("invalid ca: {}", e)))
    }
    fn make_chat_body(&self, messages: &[Message]) -> Result<String> {
        serde_json::to_string(&ChatRequest::new(self.model, messages.to_vec())).map_err(|e| {
            GptClientError::new(
                "Cause generate api json body".to_string(),
                GptClientErrorKind::NotMakeChatBody(e.to_string()),
            )
        })
    }
    fn post(&self, body: String) -> Result<Response> {
        self.make_post_request(body).send().map_err(|e| {
            GptClientError::new(
                "Cause Error at GptClient::post".to_string(),
                GptClientErrorKind::RequestError(e.to_string()),
            )
        })
    }
    fn make_post_request(&self, body: String) -> RequestBuilder {
        self.http
            .post(self.url.as_str())
            .body(body)
            .bearer_auth(self.key.key())
            .header(CONTENT_TYPE, "application/json")
    }
}

impl Chat for GptClient {
    fn chat(&self, messages: &[Message]) -> Result<String> {
        let body = self.make_chat_body(messages)?;
        debug!(model = self.model.as_str(), messages = messages.len(), "sending chat request");
        let response = self.post(body)?;
        let status = response.status();
        let text = response.text().map_err(|e| {
            GptClientError::new(
                "Cause Error at reading response body".to_string(),
                GptClientErrorKind::RequestError(e.to_string()),
            )
        })?;
        debug!(%status, bytes = text.len(), "received chat response");
        if !status.is_success() {
            return Err(GptClientError::new(
                format!("status {}", status),
                GptClientErrorKind::ResponseError(text),
            ));
        }
        ChatCompletion::from_json(&text)?.first_content()
    }
}

fn root_ca_from_env() -> Option<String> {
    std::env::var("CA_BUNDLE")
        .or_else(|_| std::env::var("ca_bundle"))
        .ok()
}

fn no_proxy_from_env() -> Option<String> {
    std::env::var("NO_PROXY")
        .or_else(|_| std::env::var("no_proxy"))
        .ok()
}

#[derive(Debug, Clone, serde::Deserialize, PartialEq, Eq)]
pub struct ChatCompletion {
    #[serde(default)]
    id: String,
    choices: Vec<ChatChoice>,
}
#[derive(Debug, Clone, serde::Deserialize, PartialEq, Eq)]
struct ChatChoice {
    message: Message,
}
impl ChatCompletion {
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| {
            GptClientError::new(
                format!("Failed to parse chat response: {}", e),
                GptClientErrorKind::ResponseDeserializeError(body.to_string()),
            )
        })
    }
    pub fn first_content(mut self) -> Result<String> {
        if self.choices.is_empty() {
            return Err(GptClientError::new(
                "Response has no choices".to_string(),
                GptClientErrorKind::NoChoices(self.id),
            ));
        }
        Ok(self.choices.swap_remove(0).message.content)
    }
}

#[derive(Clone, Default)]
pub struct OpenAIKey(String);

impl OpenAIKey {
    pub const ENV: &'static str = "OPENAI_API_KEY";
    /// Missing variables yield an empty key; the service rejects it on the first call.
    pub fn from_env() -> Self {
        Self(std::env::var(Self::ENV).unwrap_or_default())
    }
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
    fn key(&self) -> &str {
        self.0.as_str()
    }
}
impl Debug for OpenAIKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", "x".repeat(self.0.len()))
    }
}
impl Display for OpenAIKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", "x".repeat(self.0.len()))
    }
}

#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq)]
pub struct ChatRequest {
    model: OpenAIModel,
    messages: Vec<Message>,
}
impl ChatRequest {
    pub fn new(model: OpenAIModel, messages: Vec<Message>) -> Self {
        Self { model, messages }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Message {
    role: Role,
    pub(crate) content: String,
}
impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
    pub fn role(&self) -> Role {
        self.role
    }
    pub fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    System,
    Assistant,
}
impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OpenAIModel {
    #[default]
    Gpt3Dot5Turbo,
    Gpt4,
    Gpt4Turbo,
    Gpt4o,
    Gpt4oMini,
}
impl serde::Serialize for OpenAIModel {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl OpenAIModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt3Dot5Turbo => "gpt-3.5-turbo",
            Self::Gpt4 => "gpt-4",
            Self::Gpt4Turbo => "gpt-4-turbo",
            Self::Gpt4o => "gpt-4o",
            Self::Gpt4oMini => "gpt-4o-mini",
        }
    }
}
impl FromStr for OpenAIModel {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "gpt3" | "3" | "gpt-3.5-turbo" => Ok(Self::Gpt3Dot5Turbo),
            "gpt4" | "4" | "gpt-4" => Ok(Self::Gpt4),
            "gpt-4-turbo" => Ok(Self::Gpt4Turbo),
            "gpt-4o" => Ok(Self::Gpt4o),
            "gpt-4o-mini" => Ok(Self::Gpt4oMini),
            _ => Err(format!("{} is not supported", s)),
        }
    }
}
impl Display for OpenAIModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
#[error("kind : {kind}\n message : {message}")]
pub struct GptClientError {
    message: String,
    pub kind: GptClientErrorKind,
}
impl GptClientError {
    pub fn new(message: String, kind: GptClientErrorKind) -> Self {
        Self { message, kind }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum GptClientErrorKind {
    #[error("Not found CA File. File is : {0}")]
    NotFoundCAFile(String),
    #[error("Invalid Url. Url is : {0}")]
    InvalidUrl(String),
    #[error("Not make chat body from {0}")]
    NotMakeChatBody(String),
    #[error("Request Error to {0}")]
    RequestError(String),
    #[error("Response Error. Error is : {0}")]
    ResponseError(String),
    #[error("Not Deserialize response. Body is : {0}")]
    ResponseDeserializeError(String),
    #[error("No choices in response. Id is : {0}")]
    NoChoices(String),
}
pub type Result<T> = std::result::Result<T, GptClientError>;


#[cfg(test)]
pub mod fakes {
    use std::{cell::RefCell, collections::VecDeque};

    use super::*;

    /// Replays scripted replies in order and records every request it receives.
    pub struct StubChat {
        replies: RefCell<VecDeque<Result<String>>>,
        requests: RefCell<Vec<Vec<Message>>>,
    }
    impl StubChat {
        pub fn new() -> Self {
            Self {
                replies: RefCell::new(VecDeque::new()),
                requests: RefCell::new(Vec::new()),
            }
        }
        pub fn reply(self, message: impl Into<String>) -> Self {
            self.replies.borrow_mut().push_back(Ok(message.into()));
            self
        }
        pub fn fail(self, kind: GptClientErrorKind) -> Self {
            self.replies
                .borrow_mut()
                .push_back(Err(GptClientError::new("stub".to_string(), kind)));
            self
        }
        pub fn requests(&self) -> Vec<Vec<Message>> {
            self.requests.borrow().clone()
        }
        pub fn called_time(&self) -> usize {
            self.requests.borrow().len()
        }
    }
    impl Chat for StubChat {
        fn chat(&self, messages: &[Message]) -> Result<String> {
            self.requests.borrow_mut().push(messages.to_vec());
            match self.replies.borrow_mut().pop_front() {
                Some(reply) => reply,
                None => Ok(messages
                    .last()
                    .map(|m| m.content().to_string())
                    .unwrap_or_default()),
            }
        }
    }
}
