use log::debug;
use std::io::Write;
use std::sync::Arc;

use crate::models::chat::{ RenderedMessage, Sender };

/// Where a chat turn is displayed. The most recent bot message is the one
/// updated in place by status, error and rendered output.
pub trait ChatSurface: Send + Sync {
    /// Adds a new message showing `text` literally.
    fn append_message(&self, sender: Sender, text: &str);
    /// Replaces the pending bot message with plain text.
    fn update_bot_text(&self, text: &str);
    /// Replaces the pending bot message with rendered HTML.
    fn update_bot_html(&self, message: &RenderedMessage);
}

impl<S: ChatSurface + ?Sized> ChatSurface for Arc<S> {
    fn append_message(&self, sender: Sender, text: &str) {
        (**self).append_message(sender, text)
    }

    fn update_bot_text(&self, text: &str) {
        (**self).update_bot_text(text)
    }

    fn update_bot_html(&self, message: &RenderedMessage) {
        (**self).update_bot_html(message)
    }
}

/// Line-oriented surface for the interactive `ask` command. Updates are
/// printed as new lines since a terminal cannot rewrite earlier output.
#[derive(Debug, Default)]
pub struct TerminalSurface;

impl TerminalSurface {
    pub fn new() -> Self {
        Self
    }

    fn print(&self, prefix: &str, text: &str) {
        write_line(&mut std::io::stdout().lock(), prefix, text);
    }
}

/// A closed or broken stdout must not abort the turn, so failures are only logged.
fn write_line<W: Write>(out: &mut W, prefix: &str, text: &str) -> bool {
    match writeln!(out, "{} {}", prefix, text).and_then(|_| out.flush()) {
        Ok(()) => true,
        Err(e) => {
            debug!("Failed to write to terminal: {}", e);
            false
        }
    }
}

impl ChatSurface for TerminalSurface {
    fn append_message(&self, sender: Sender, text: &str) {
        match sender {
            // Typed input is already on screen.
            Sender::User => {}
            Sender::Bot => self.print("bot>", text),
        }
    }

    fn update_bot_text(&self, text: &str) {
        self.print("bot>", text);
    }

    fn update_bot_html(&self, message: &RenderedMessage) {
        self.print("bot>", &message.html);
    }
}
