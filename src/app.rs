use std::sync::Arc;
use std::time::Duration;

use jarvis_core::completion::{self, Completion, CompletionService};
use jarvis_core::format::code_sources;
use jarvis_core::{Config, ConversationStore, Reconciliation, SyntectHighlighter};
use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Conversation
    pub store: ConversationStore,
    pub input_cursor: usize, // char index into the draft

    // Transcript viewport
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub total_chat_lines: u16,
    pub follow_bottom: bool,
    pub chat_area: Option<Rect>,

    // Code block selection, indexed across the whole transcript
    pub selected_block: Option<usize>,
    pub status: Option<String>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    highlighter: SyntectHighlighter,
    completion: Arc<dyn CompletionService>,
    timeout: Duration,
    events: UnboundedSender<AppEvent>,
    in_flight: Option<JoinHandle<()>>,
}

impl App {
    pub fn new(
        config: &Config,
        completion: Arc<dyn CompletionService>,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            store: ConversationStore::new(),
            input_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            total_chat_lines: 0,
            follow_bottom: true,
            chat_area: None,

            selected_block: None,
            status: None,

            animation_frame: 0,

            highlighter: SyntectHighlighter::new(&config.theme),
            completion,
            timeout: config.timeout(),
            events,
            in_flight: None,
        }
    }

    pub fn highlighter(&self) -> &SyntectHighlighter {
        &self.highlighter
    }

    /// Send the draft and start its completion call in the background.
    ///
    /// A call still running for an earlier message is aborted; the store has
    /// already retired its placeholder.
    pub fn submit(&mut self) {
        let Some(submission) = self.store.submit_draft() else {
            return;
        };

        if let Some(task) = self.in_flight.take() {
            task.abort();
        }

        self.input_cursor = 0;
        self.follow_bottom = true;
        self.status = None;

        let service = Arc::clone(&self.completion);
        let timeout = self.timeout;
        let events = self.events.clone();
        self.in_flight = Some(tokio::spawn(async move {
            let completion = completion::run(service.as_ref(), submission, timeout).await;
            if events.send(AppEvent::Completion(completion)).is_err() {
                debug!("event loop gone, dropping completion");
            }
        }));
    }

    pub fn on_completion(&mut self, completion: Completion) {
        if self.store.reconcile(completion.token, completion.outcome) == Reconciliation::Applied {
            self.in_flight = None;
            self.follow_bottom = true;
        }
    }

    pub fn code_block_count(&self) -> usize {
        self.store
            .messages()
            .iter()
            .map(|msg| code_sources(&msg.text).len())
            .sum()
    }

    /// Raw body of the `index`th code block in the transcript
    pub fn code_block_source(&self, index: usize) -> Option<&str> {
        self.store
            .messages()
            .iter()
            .flat_map(|msg| code_sources(&msg.text))
            .nth(index)
    }

    pub fn select_next_block(&mut self) {
        let count = self.code_block_count();
        if count == 0 {
            self.selected_block = None;
            return;
        }
        self.selected_block = Some(match self.selected_block {
            Some(i) => (i + 1) % count,
            None => 0,
        });
    }

    pub fn select_prev_block(&mut self) {
        let count = self.code_block_count();
        if count == 0 {
            self.selected_block = None;
            return;
        }
        self.selected_block = Some(match self.selected_block {
            Some(0) | None => count - 1,
            Some(i) => (i - 1).min(count - 1),
        });
    }

    /// Text to put on the clipboard for the selected block, updating the status line
    pub fn copy_selected_block(&mut self) -> Option<String> {
        let index = self.selected_block?;
        let text = self.code_block_source(index)?.to_string();
        self.status = Some(format!("Copied code block {}", index + 1));
        Some(text)
    }

    // Transcript scrolling
    fn max_scroll(&self) -> u16 {
        self.total_chat_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll());
        self.follow_bottom = self.chat_scroll >= self.max_scroll();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down((self.chat_height / 2).max(1));
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up((self.chat_height / 2).max(1));
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
        self.follow_bottom = false;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_bottom = true;
        self.chat_scroll = self.max_scroll();
    }

    /// Record the rendered transcript height; keeps the view pinned when following
    pub fn set_chat_metrics(&mut self, total_lines: u16, visible_height: u16) {
        self.total_chat_lines = total_lines;
        self.chat_height = visible_height;
        if self.follow_bottom {
            self.chat_scroll = self.max_scroll();
        } else {
            self.chat_scroll = self.chat_scroll.min(self.max_scroll());
        }
    }

    /// Tick animation frame (called by Tick event). Returns whether anything
    /// visible changed.
    pub fn tick_animation(&mut self) -> bool {
        if !self.store.is_pending() {
            return false;
        }
        self.animation_frame = (self.animation_frame + 1) % 3;
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use jarvis_core::state::{Message, PLACEHOLDER_TEXT, UNREACHABLE_TEXT};
    use jarvis_core::CompletionError;
    use tokio::sync::mpsc;

    pub(crate) struct Canned(pub &'static str);

    #[async_trait]
    impl CompletionService for Canned {
        async fn complete(&self, _query: &str) -> Result<String, CompletionError> {
            Ok(self.0.to_string())
        }
    }

    struct NeverReplies;

    #[async_trait]
    impl CompletionService for NeverReplies {
        async fn complete(&self, _query: &str) -> Result<String, CompletionError> {
            std::future::pending().await
        }
    }

    pub(crate) fn test_app(
        service: Arc<dyn CompletionService>,
    ) -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (App::new(&Config::new(), service, tx), rx)
    }

    async fn next_completion(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> Completion {
        match rx.recv().await {
            Some(AppEvent::Completion(completion)) => completion,
            other => panic!("expected completion event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_round_trip() {
        let (mut app, mut rx) = test_app(Arc::new(Canned("pong")));
        app.store.set_draft("ping");
        app.input_cursor = 4;

        app.submit();

        assert_eq!(app.input_cursor, 0);
        assert!(app.store.draft().is_empty());
        assert_eq!(app.store.messages()[1], Message::bot(PLACEHOLDER_TEXT));

        let completion = next_completion(&mut rx).await;
        app.on_completion(completion);

        assert_eq!(
            app.store.messages(),
            &[Message::user("ping"), Message::bot("pong")]
        );
        assert!(!app.store.is_pending());
    }

    #[tokio::test]
    async fn test_blank_draft_does_not_submit() {
        let (mut app, mut rx) = test_app(Arc::new(Canned("pong")));
        app.store.set_draft("   ");

        app.submit();

        assert!(app.store.messages().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_service_times_out() {
        let (mut app, mut rx) = test_app(Arc::new(NeverReplies));
        app.store.set_draft("hello?");

        app.submit();
        let completion = next_completion(&mut rx).await;
        app.on_completion(completion);

        assert_eq!(app.store.messages().last(), Some(&Message::bot(UNREACHABLE_TEXT)));
        assert!(!app.store.is_pending());
    }

    #[tokio::test]
    async fn test_code_block_selection_and_copy() {
        let (mut app, _rx) = test_app(Arc::new(Canned("")));
        let a = app.store.submit("show me").unwrap();
        app.store.reconcile(a.token, Ok("```sh\nls -la\n```\nand\n```\nplain\n```".to_string()));

        assert_eq!(app.code_block_count(), 2);
        assert_eq!(app.copy_selected_block(), None);

        app.select_next_block();
        app.select_next_block();
        assert_eq!(app.selected_block, Some(1));
        assert_eq!(app.copy_selected_block().as_deref(), Some("\nplain\n"));
        assert_eq!(app.status.as_deref(), Some("Copied code block 2"));

        app.select_next_block();
        assert_eq!(app.selected_block, Some(0));
        app.select_prev_block();
        assert_eq!(app.selected_block, Some(1));
        assert_eq!(app.code_block_source(0), Some("ls -la\n"));
    }

    #[tokio::test]
    async fn test_scrolling_tracks_bottom() {
        let (mut app, _rx) = test_app(Arc::new(Canned("")));

        app.set_chat_metrics(50, 10);
        assert_eq!(app.chat_scroll, 40);

        app.scroll_up(5);
        assert!(!app.follow_bottom);
        app.set_chat_metrics(60, 10);
        assert_eq!(app.chat_scroll, 35);

        app.scroll_down(100);
        assert_eq!(app.chat_scroll, 50);
        assert!(app.follow_bottom);

        app.scroll_to_top();
        assert_eq!(app.chat_scroll, 0);
        app.scroll_to_bottom();
        assert_eq!(app.chat_scroll, 50);
    }
}
