//! Context reporting
//!
//! Whenever the shown page or the selected line changes, the viewer sends a
//! plain-text summary of what the user is looking at to a host collaborator.
//! Reports are fire-and-forget: failures are logged and never retried.

use log::{debug, info, warn};

use crate::settings::ContextConfig;
use crate::viewer::PageData;

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Context reporter unavailable: {0}")]
    Unavailable(String),
    #[error("Context rejected by host: {0}")]
    Rejected(String),
}

/// Receives context summaries
pub trait ContextReporter {
    fn send(&self, session_id: &str, text: &str) -> Result<(), ContextError>;
}

impl<T: ContextReporter + ?Sized> ContextReporter for Box<T> {
    fn send(&self, session_id: &str, text: &str) -> Result<(), ContextError> {
        (**self).send(session_id, text)
    }
}

impl<T: ContextReporter + ?Sized> ContextReporter for std::sync::Arc<T> {
    fn send(&self, session_id: &str, text: &str) -> Result<(), ContextError> {
        (**self).send(session_id, text)
    }
}

/// Writes summaries to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ContextReporter for LogReporter {
    fn send(&self, session_id: &str, text: &str) -> Result<(), ContextError> {
        info!("Context [{session_id}]:\n{text}");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSummary {
    /// 1-based
    pub page_number: usize,
    pub total_pages: usize,
    pub label: Option<String>,
    pub selected_text: Option<String>,
    pub transcription: String,
}

impl ContextSummary {
    pub fn for_page(
        page: &PageData,
        total_pages: usize,
        label: Option<&str>,
        selected_line: Option<&str>,
    ) -> Self {
        let selected_text = selected_line
            .and_then(|id| page.text_layer.line(id))
            .map(|line| line.transcription.clone());

        Self {
            page_number: page.index + 1,
            total_pages,
            label: label.map(str::to_string),
            selected_text,
            transcription: page.text_layer.full_text(),
        }
    }

    pub fn render(&self, max_transcription_chars: usize) -> String {
        let mut text = format!("Viewing page {} of {}", self.page_number, self.total_pages);
        if let Some(label) = &self.label {
            text.push_str(&format!(" ({label})"));
        }
        text.push('\n');

        if let Some(selected) = &self.selected_text {
            text.push_str(&format!("Selected line: \"{selected}\"\n"));
        }

        if self.transcription.trim().is_empty() {
            text.push_str("Page transcription: (none)");
        } else {
            text.push_str("Page transcription:\n");
            text.push_str(&truncate_chars(&self.transcription, max_transcription_chars));
        }
        text
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}\n[... truncated]", &text[..cut]),
        None => text.to_string(),
    }
}

/// Owns the session id and the last report so duplicates are suppressed
pub struct ContextSession<R: ContextReporter> {
    reporter: R,
    session_id: String,
    last_sent: Option<String>,
    max_transcription_chars: usize,
}

impl<R: ContextReporter> ContextSession<R> {
    pub fn new(reporter: R, config: &ContextConfig) -> Self {
        Self::with_session_id(reporter, new_session_id(), config)
    }

    pub fn with_session_id(
        reporter: R,
        session_id: impl Into<String>,
        config: &ContextConfig,
    ) -> Self {
        Self {
            reporter,
            session_id: session_id.into(),
            last_sent: None,
            max_transcription_chars: config.max_transcription_chars,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn last_sent(&self) -> Option<&str> {
        self.last_sent.as_deref()
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Send the summary unless it matches the previous report.
    ///
    /// Returns whether the reporter accepted a new report.
    pub fn report(&mut self, summary: &ContextSummary) -> bool {
        let text = summary.render(self.max_transcription_chars);
        if self.last_sent.as_deref() == Some(text.as_str()) {
            debug!("Context unchanged, not reporting");
            return false;
        }

        match self.reporter.send(&self.session_id, &text) {
            Ok(()) => {
                self.last_sent = Some(text);
                true
            }
            Err(e) => {
                warn!("Failed to report context: {e}");
                false
            }
        }
    }

    /// Forget the previous report and start a new session id
    pub fn reset(&mut self) {
        self.last_sent = None;
        self.session_id = new_session_id();
    }
}

fn new_session_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}
