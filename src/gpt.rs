pub mod chat;
pub mod client;

pub use client::{
    Chat, GptClient, GptClientError, GptClientErrorKind, GptClientOption, Message, OpenAIKey,
    OpenAIModel, Role,
};
