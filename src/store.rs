use std::{
    fs::OpenOptions,
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local, TimeZone};
use tracing::{debug, info, warn};

use crate::gpt::{Message, Role};

/// Go's RFC822Z layout, `02 Jan 06 15:04 -0700`.
pub const RFC822: &str = "%d %b %y %H:%M %z";

/// Facts distilled from earlier sessions, one per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportantInformation {
    path: PathBuf,
}

impl ImportantInformation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    /// Seeds the next session. An unreadable file only costs the context.
    pub fn load(&self) -> Vec<Message> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %self.path.display(), "Error opening important information file: {}", e);
                return Vec::new();
            }
        };
        let mut reader = BufReader::new(file);
        let mut messages = Vec::new();
        loop {
            match read_line_lossy(&mut reader) {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => messages.push(Message::new(Role::System, line)),
                Ok(None) => break,
                Err(e) => {
                    warn!(path = %self.path.display(), "Error reading important information file: {}", e);
                    break;
                }
            }
        }
        info!(path = %self.path.display(), lines = messages.len(), "loaded important information");
        messages
    }
    pub fn append(&self, summary: &str) -> std::io::Result<()> {
        append_to(&self.path, &format!("{}\n", summary))
    }
}

/// Write-only transcript of every completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationLog {
    path: PathBuf,
}

impl ConversationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    pub fn record(&self, you: &str, bot: &str) -> std::io::Result<()> {
        self.append(&Local::now(), you, bot)
    }
    pub fn append<Tz>(&self, at: &DateTime<Tz>, you: &str, bot: &str) -> std::io::Result<()>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        append_to(&self.path, &Self::entry(at, you, bot))
    }
    fn entry<Tz>(at: &DateTime<Tz>, you: &str, bot: &str) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        format!("{}\nYou: {}\nBot: {}\n\n", at.format(RFC822), you, bot)
    }
}

/// Reads one line without its `\n` or `\r\n`. Bytes that are not UTF-8
/// become U+FFFD instead of failing the read. `None` at end of input.
pub(crate) fn read_line_lossy<R: BufRead>(reader: &mut R) -> std::io::Result<Option<String>> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

// one open, one write, one close per record
fn append_to(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(content.as_bytes())?;
    debug!(path = %path.display(), bytes = content.len(), "appended record");
    Ok(())
}
