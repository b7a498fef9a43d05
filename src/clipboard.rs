use tracing::{debug, warn};

/// Put `text` on the system clipboard without blocking the UI.
///
/// Failures are logged only; a missing clipboard (e.g. headless session) is
/// not an error the user needs to see.
pub fn copy_to_clipboard(text: String) {
    tokio::task::spawn_blocking(move || {
        let result = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text));
        match result {
            Ok(()) => debug!("copied code block to clipboard"),
            Err(e) => warn!(error = %e, "clipboard write failed"),
        }
    });
}
