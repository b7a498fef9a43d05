//! UI-agnostic conversation state
//!
//! The [`ConversationStore`] owns the transcript and the lifecycle of the
//! outstanding completion request. Front ends drive it with [`submit`] and
//! feed settled completions back through [`reconcile`].
//!
//! [`submit`]: ConversationStore::submit
//! [`reconcile`]: ConversationStore::reconcile

use tracing::{debug, warn};

use crate::completion::CompletionError;

/// Text of the bot entry shown while a reply is outstanding.
pub const PLACEHOLDER_TEXT: &str = "Typing...";

/// Text shown in place of a reply when the completion call failed or timed out.
pub const UNREACHABLE_TEXT: &str = "Error: could not reach the assistant";

/// Text left behind when a newer message abandons an outstanding request.
pub const SUPERSEDED_TEXT: &str = "Error: request cancelled by a newer message";

/// A single transcript entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub is_bot: bool,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_bot: false,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_bot: true,
        }
    }

    fn placeholder() -> Self {
        Self::bot(PLACEHOLDER_TEXT)
    }
}

/// Identifies one submission. Tokens increase monotonically per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// What the caller needs to schedule the completion call for a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub token: RequestToken,
    pub query: String,
}

/// Result of feeding a settled completion back into the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The placeholder was replaced.
    Applied,
    /// The token was not the outstanding one; nothing changed.
    Stale,
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    transcript: Vec<Message>,
    pending: Option<RequestToken>,
    draft: String,
    last_token: u64,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.transcript
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_token(&self) -> Option<RequestToken> {
        self.pending
    }

    /// Index of the placeholder entry, if a request is outstanding
    pub fn placeholder_index(&self) -> Option<usize> {
        self.pending
            .and_then(|_| self.transcript.len().checked_sub(1))
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut String {
        &mut self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Submit the current draft.
    pub fn submit_draft(&mut self) -> Option<Submission> {
        let text = self.draft.clone();
        self.submit(text)
    }

    /// Append a user message followed by the placeholder.
    ///
    /// Whitespace-only input is ignored and returns `None`. If a request is
    /// already outstanding its placeholder (always the last entry) is resolved
    /// to [`SUPERSEDED_TEXT`] first, so its late reply can never land.
    pub fn submit(&mut self, text: impl Into<String>) -> Option<Submission> {
        let text = text.into();
        if text.trim().is_empty() {
            return None;
        }

        if let Some(previous) = self.pending.take() {
            debug!(token = previous.value(), "superseding outstanding request");
            self.replace_last(Message::bot(SUPERSEDED_TEXT));
        }

        self.last_token += 1;
        let token = RequestToken(self.last_token);

        self.transcript.push(Message::user(text.clone()));
        self.transcript.push(Message::placeholder());
        self.pending = Some(token);
        self.draft.clear();

        debug!(token = token.value(), "submitted message");
        Some(Submission { token, query: text })
    }

    /// Replace the placeholder with the settled outcome of `token`'s request.
    ///
    /// Only the most recently issued outstanding token is honoured; anything
    /// else is reported as [`Reconciliation::Stale`] and dropped.
    pub fn reconcile(
        &mut self,
        token: RequestToken,
        outcome: Result<String, CompletionError>,
    ) -> Reconciliation {
        if self.pending != Some(token) {
            debug!(token = token.value(), "dropping stale completion");
            return Reconciliation::Stale;
        }

        let reply = match outcome {
            Ok(text) => Message::bot(text),
            Err(e) => {
                warn!(token = token.value(), error = %e, "completion failed");
                Message::bot(UNREACHABLE_TEXT)
            }
        };
        self.replace_last(reply);
        self.pending = None;

        Reconciliation::Applied
    }

    fn replace_last(&mut self, message: Message) {
        match self.transcript.last_mut() {
            Some(last) => *last = message,
            None => self.transcript.push(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_submit_whitespace_is_noop() {
        let mut store = ConversationStore::new();
        store.set_draft("  \n\t ");

        assert!(store.submit("").is_none());
        assert!(store.submit("   \n").is_none());
        assert!(store.submit_draft().is_none());

        assert!(store.messages().is_empty());
        assert!(!store.is_pending());
        assert_eq!(store.draft(), "  \n\t ");
    }

    #[test]
    fn test_submit_appends_user_message_and_placeholder() {
        let mut store = ConversationStore::new();
        store.set_draft("hello");

        let submission = store.submit_draft().unwrap();

        assert_eq!(submission.query, "hello");
        assert_eq!(
            store.messages(),
            &[Message::user("hello"), Message::bot(PLACEHOLDER_TEXT)]
        );
        assert!(store.is_pending());
        assert_eq!(store.pending_token(), Some(submission.token));
        assert_eq!(store.placeholder_index(), Some(1));
        assert!(store.draft().is_empty());
    }

    #[test]
    fn test_reconcile_replaces_placeholder() {
        let mut store = ConversationStore::new();
        let submission = store.submit("hi").unwrap();

        let result = store.reconcile(submission.token, Ok("hello there".to_string()));

        assert_eq!(result, Reconciliation::Applied);
        assert_eq!(
            store.messages(),
            &[Message::user("hi"), Message::bot("hello there")]
        );
        assert!(!store.is_pending());
        assert_eq!(store.placeholder_index(), None);
    }

    #[test]
    fn test_reconcile_failure_shows_error_message() {
        let mut store = ConversationStore::new();
        let submission = store.submit("hi").unwrap();

        let result = store.reconcile(
            submission.token,
            Err(CompletionError::Timeout(Duration::from_secs(30))),
        );

        assert_eq!(result, Reconciliation::Applied);
        assert_eq!(store.messages().last(), Some(&Message::bot(UNREACHABLE_TEXT)));
        assert!(!store.is_pending());
    }

    #[test]
    fn test_stale_completion_is_dropped() {
        let mut store = ConversationStore::new();
        let a = store.submit("first").unwrap();
        let b = store.submit("second").unwrap();
        assert!(b.token > a.token);

        let result = store.reconcile(a.token, Ok("answer to first".to_string()));

        assert_eq!(result, Reconciliation::Stale);
        assert_eq!(store.messages().last(), Some(&Message::bot(PLACEHOLDER_TEXT)));
        assert_eq!(store.pending_token(), Some(b.token));

        assert_eq!(
            store.reconcile(b.token, Ok("answer to second".to_string())),
            Reconciliation::Applied
        );
        assert_eq!(
            store.messages(),
            &[
                Message::user("first"),
                Message::bot(SUPERSEDED_TEXT),
                Message::user("second"),
                Message::bot("answer to second"),
            ]
        );
    }

    #[test]
    fn test_reconcile_twice_is_stale() {
        let mut store = ConversationStore::new();
        let submission = store.submit("hi").unwrap();

        store.reconcile(submission.token, Ok("one".to_string()));
        let again = store.reconcile(submission.token, Ok("two".to_string()));

        assert_eq!(again, Reconciliation::Stale);
        assert_eq!(store.messages().last(), Some(&Message::bot("one")));
    }

    #[test]
    fn test_submit_keeps_text_untrimmed() {
        let mut store = ConversationStore::new();
        let submission = store.submit("  spaced  ").unwrap();
        assert_eq!(submission.query, "  spaced  ");
        assert_eq!(store.messages()[0].text, "  spaced  ");
    }
}
