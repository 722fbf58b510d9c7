use std::io::{BufRead, Write};

use tracing::{info, warn};

use crate::{
    gpt::{
        chat::{summarize, ChatHistory},
        Chat, Role,
    },
    store::{read_line_lossy, ConversationLog, ImportantInformation},
};

/// Interactive session: owns the history and replays it on every turn.
pub struct ChatRepl<T: Chat> {
    chat: T,
    history: ChatHistory,
    important_info: ImportantInformation,
    log: ConversationLog,
}

impl<T: Chat> ChatRepl<T> {
    const USER_LABEL: &'static str = "You: ";
    const BOT_LABEL: &'static str = "Bot: ";
    const EXIT: &'static str = "exit";

    pub fn new(chat: T, important_info: ImportantInformation, log: ConversationLog) -> Self {
        let history = ChatHistory::seeded(important_info.load());
        Self {
            chat,
            history,
            important_info,
            log,
        }
    }
    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn repl<R: BufRead, W: Write>(&mut self, mut input: R, output: &mut W) -> std::io::Result<()> {
        loop {
            Self::user_first(output)?;
            let message = match Self::user_input(&mut input) {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(e) => {
                    warn!("Error reading input: {}", e);
                    break;
                }
            };
            if Self::is_exit(&message) {
                break;
            }
            self.turn(message, output)?;
        }
        self.finish(output)
    }

    /// One user turn. A failed call keeps the user message and skips the log.
    pub fn turn<W: Write>(&mut self, message: String, output: &mut W) -> std::io::Result<()> {
        self.history.push_request(message.as_str(), Role::User);
        match self.chat.chat(self.history.all()) {
            Ok(response) => {
                writeln!(output, "{}{}", Self::BOT_LABEL, response)?;
                self.history.push_response(response.as_str());
                if let Err(e) = self.log.record(&message, &response) {
                    warn!(path = %self.log.path().display(), "Error writing to log file: {}", e);
                }
            }
            Err(e) => writeln!(output, "Error getting response: {}", e)?,
        }
        Ok(())
    }

    /// Summarizes the session and appends the summary, empty on failure.
    pub fn finish<W: Write>(&mut self, output: &mut W) -> std::io::Result<()> {
        info!(messages = self.history.len(), "summarizing conversation");
        let summary = match summarize(&self.chat, &self.history) {
            Ok(summary) => {
                writeln!(output, "Conversation Summary:\n{}", summary)?;
                summary
            }
            Err(e) => {
                writeln!(output, "Error summarizing conversation: {}", e)?;
                String::new()
            }
        };
        if let Err(e) = self.important_info.append(&summary) {
            warn!(path = %self.important_info.path().display(), "Error writing important information: {}", e);
        }
        output.flush()
    }

    fn user_first<W: Write>(output: &mut W) -> std::io::Result<()> {
        write!(output, "{}", Self::USER_LABEL)?;
        output.flush()
    }
    fn user_input<R: BufRead>(input: &mut R) -> std::io::Result<Option<String>> {
        read_line_lossy(input)
    }
    fn is_exit(message: &str) -> bool {
        message == Self::EXIT
    }
}
