use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;

/// Messages kept when no explicit size is given.
pub const DEFAULT_LOG_SIZE: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    Error,
    Warning,
    Info,
    Priority,
    Status,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message_type_str = match self {
            MessageType::Error => "Error",
            MessageType::Warning => "Warning",
            MessageType::Info => "Info",
            MessageType::Priority => "Priority",
            MessageType::Status => "Status",
        };
        write!(f, "{}", message_type_str)
    }
}

impl MessageType {
    fn color(&self) -> &'static str {
        match self {
            MessageType::Error => "\x1b[31m",
            MessageType::Warning => "\x1b[33m",
            MessageType::Info => "\x1b[0m",
            MessageType::Priority => "\x1b[32m",
            MessageType::Status => "\x1b[36m",
        }
    }
}

#[derive(Clone, Debug)]
pub struct StatusMessage {
    pub timestamp: DateTime<Utc>,
    pub message_type: MessageType,
    pub content: String,
}

impl StatusMessage {
    pub fn new(message_type: MessageType, content: String) -> Self {
        StatusMessage {
            timestamp: Utc::now(),
            message_type,
            content,
        }
    }
}

/// Bounded log of what the engine did. The oldest message goes first once full.
pub struct MessageLog {
    messages: VecDeque<StatusMessage>,
    headless: bool,
    max_size: usize,
}

impl Default for MessageLog {
    fn default() -> Self {
        MessageLog::new(false, None)
    }
}

impl MessageLog {
    pub fn new(headless: bool, max_size: Option<usize>) -> Self {
        let max_size = max_size.unwrap_or(DEFAULT_LOG_SIZE).max(1);
        MessageLog {
            messages: VecDeque::with_capacity(max_size.min(64)),
            headless,
            max_size,
        }
    }

    pub fn add_message(&mut self, message: StatusMessage) {
        if self.messages.len() == self.max_size {
            self.messages.pop_front();
        }

        if self.headless {
            let white = "\x1b[0m";
            println!(
                "{}{} | {:^8} | {}{}",
                message.message_type.color(),
                message.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                message.message_type,
                message.content,
                white,
            )
        }

        self.messages.push_back(message);
    }

    pub fn error(&mut self, content: impl Into<String>) {
        self.add_message(StatusMessage::new(MessageType::Error, content.into()));
    }

    pub fn warning(&mut self, content: impl Into<String>) {
        self.add_message(StatusMessage::new(MessageType::Warning, content.into()));
    }

    pub fn info(&mut self, content: impl Into<String>) {
        self.add_message(StatusMessage::new(MessageType::Info, content.into()));
    }

    pub fn priority(&mut self, content: impl Into<String>) {
        self.add_message(StatusMessage::new(MessageType::Priority, content.into()));
    }

    pub fn status(&mut self, content: impl Into<String>) {
        self.add_message(StatusMessage::new(MessageType::Status, content.into()));
    }

    pub fn set_headless(&mut self, headless: bool) {
        self.headless = headless;
    }

    pub fn get_all_messages(&self) -> Vec<StatusMessage> {
        self.messages.iter().cloned().collect()
    }

    /// Hand the buffered messages over, leaving the log empty.
    pub fn drain(&mut self) -> Vec<StatusMessage> {
        self.messages.drain(..).collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.content.contains(needle))
    }

    pub fn size(&self) -> usize {
        self.messages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oldest_message_dropped() {
        let mut log = MessageLog::new(false, Some(2));
        log.info("one");
        log.warning("two");
        log.error("three");

        let messages = log.get_all_messages();
        assert_eq!(log.size(), 2);
        assert_eq!(messages[0].content, "two");
        assert_eq!(messages[1].message_type, MessageType::Error);
    }
}
