pub mod completion;
pub mod config;
pub mod format;
pub mod highlight;
pub mod state;

// Re-export main types for convenience
pub use completion::{Completion, CompletionError, CompletionService, HttpCompletionClient};
pub use config::Config;
pub use format::{format_message, CodeBlock, Segment};
pub use highlight::{Highlight, Highlighted, SyntectHighlighter};
pub use state::{ConversationStore, Message, Reconciliation, RequestToken, Submission};
