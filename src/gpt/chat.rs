use super::client::{Chat, GptClientErrorKind, Message, Result, Role};

pub const SUMMARY_INSTRUCTION: &str = "This is a conversation between an AI chat bot and a human, please extract the important information within the conversation in a format best suited for a chatbot, remove any duplicated information";
pub const NO_SUMMARY: &str = "No summary returned";

/// Messages of one session in conversation order. Only ever appended to.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatHistory {
    inner: Vec<Message>,
}
impl ChatHistory {
    pub fn new() -> Self {
        Self { inner: Vec::new() }
    }
    pub fn seeded(messages: Vec<Message>) -> Self {
        Self { inner: messages }
    }
    pub fn all(&self) -> &[Message] {
        &self.inner
    }
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    pub fn push_response(&mut self, message: impl Into<String>) {
        self.inner.push(Message::new(Role::Assistant, message));
    }
    pub fn push_request(&mut self, message: impl Into<String>, role: Role) {
        self.inner.push(Message::new(role, message));
    }
}

/// The summarization call: the whole history plus one trailing instruction.
pub fn summary_request(history: &ChatHistory) -> Vec<Message> {
    let mut messages = history.all().to_vec();
    messages.push(Message::new(Role::User, SUMMARY_INSTRUCTION));
    messages
}

pub fn summarize<C: Chat + ?Sized>(chat: &C, history: &ChatHistory) -> Result<String> {
    match chat.chat(&summary_request(history)) {
        Err(e) if matches!(e.kind, GptClientErrorKind::NoChoices(_)) => Ok(NO_SUMMARY.to_string()),
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use crate::gpt::client::fakes::StubChat;

    use super::*;

    fn sample_history() -> ChatHistory {
        let mut history = ChatHistory::seeded(vec![Message::new(Role::System, "name is kai")]);
        history.push_request("hello", Role::User);
        history.push_response("hello,i am gpt");
        history
    }

    #[test]
    fn historyは追加順に保持される() {
        let mut chat_history = ChatHistory::new();
        chat_history.push_request("hello", Role::User);
        chat_history.push_response("hello,i am gpt");
        chat_history.push_request("thanks", Role::User);
        chat_history.push_response("thanks too.");
        assert_eq!(
            chat_history.all(),
            vec![
                Message::new(Role::User, "hello"),
                Message::new(Role::Assistant, "hello,i am gpt"),
                Message::new(Role::User, "thanks"),
                Message::new(Role::Assistant, "thanks too."),
            ]
        );
    }
    #[test]
    fn 要約リクエストは全履歴と末尾の指示を含む() {
        let history = sample_history();

        let request = summary_request(&history);

        assert_eq!(request.len(), history.len() + 1);
        assert_eq!(&request[..history.len()], history.all());
        assert_eq!(
            request.last(),
            Some(&Message::new(Role::User, SUMMARY_INSTRUCTION))
        );
    }
    #[test]
    fn 要約はhistoryを変更しない() {
        let history = sample_history();
        let before = history.clone();
        let chat = StubChat::new().reply("- name is kai");

        let summary = summarize(&chat, &history).unwrap();

        assert_eq!(summary, "- name is kai");
        assert_eq!(history, before);
        assert_eq!(chat.requests(), vec![summary_request(&history)]);
    }
    #[test]
    fn 空の会話でも要約できる() {
        let chat = StubChat::new().reply("");

        let summary = summarize(&chat, &ChatHistory::new()).unwrap();

        assert_eq!(summary, "");
        assert_eq!(
            chat.requests(),
            vec![vec![Message::new(Role::User, SUMMARY_INSTRUCTION)]]
        );
    }
    #[test]
    fn choicesが空の要約は定型文になる() {
        let chat = StubChat::new().fail(GptClientErrorKind::NoChoices("1".to_string()));

        assert_eq!(summarize(&chat, &sample_history()).unwrap(), NO_SUMMARY);
    }
    #[test]
    fn 通信エラーはそのまま返す() {
        let chat = StubChat::new().fail(GptClientErrorKind::RequestError("dns".to_string()));

        let err = summarize(&chat, &sample_history()).unwrap_err();

        assert_eq!(err.kind, GptClientErrorKind::RequestError("dns".to_string()));
    }
}
