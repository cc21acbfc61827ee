//! The request/UI contract
//!
//! The dispatcher never talks to a terminal. When a command needs a
//! string, a file name, a number, a character or a confirmation, it
//! asks through this trait; the outer shell implements it with its
//! input line and requesters, and tests plug in canned answers.

use crate::error::Status;

/// Reply to a number request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberReply {
    Value(i64),
    /// The user aborted; maps to `Ok` at the dispatcher.
    Abort,
    /// The input was not a number.
    Invalid,
}

pub trait Request {
    /// Asks for a string; `None` means aborted.
    fn request_string(&mut self, prompt: &str, default: Option<&str>) -> Option<String>;

    /// Asks for a number.
    fn request_number(&mut self, prompt: &str, default: i64) -> NumberReply;

    /// Asks for a file name, possibly through a file requester.
    fn request_file(&mut self, prompt: &str, default: Option<&str>) -> Option<String>;

    /// Asks a yes/no question.
    fn request_response(&mut self, prompt: &str, default: bool) -> bool;

    /// Asks for one character out of the prompt's choices.
    fn request_char(&mut self, prompt: &str, default: char) -> Option<char>;

    /// Asks the user to pick one of the open documents by index.
    fn request_document(&mut self, names: &[String]) -> Option<usize>;

    /// Shows an informational message on the status line.
    fn message(&mut self, msg: &str);

    /// Shows an error. The default rendering goes through `message`.
    fn error(&mut self, status: Status) {
        let text = status.to_string();
        if !text.is_empty() {
            self.message(&text);
        }
    }
}

/// A request handler that aborts every question; used headless and in
/// tests that must not prompt.
#[derive(Default)]
pub struct NullRequest;

impl Request for NullRequest {
    fn request_string(&mut self, _prompt: &str, _default: Option<&str>) -> Option<String> {
        None
    }

    fn request_number(&mut self, _prompt: &str, _default: i64) -> NumberReply {
        NumberReply::Abort
    }

    fn request_file(&mut self, _prompt: &str, _default: Option<&str>) -> Option<String> {
        None
    }

    fn request_response(&mut self, _prompt: &str, default: bool) -> bool {
        default
    }

    fn request_char(&mut self, _prompt: &str, _default: char) -> Option<char> {
        None
    }

    fn request_document(&mut self, _names: &[String]) -> Option<usize> {
        None
    }

    fn message(&mut self, _msg: &str) {}
}
