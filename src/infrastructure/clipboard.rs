use arboard::Clipboard;
use tracing::debug;

/// System clipboard access for share codes.
pub struct ClipboardService;

impl ClipboardService {
    pub fn copy(text: &str) -> Result<(), String> {
        let mut clipboard = Clipboard::new().map_err(|e| format!("Clipboard error: {}", e))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| format!("Clipboard error: {}", e))?;
        debug!(bytes = text.len(), "copied to clipboard");
        Ok(())
    }

    pub fn paste() -> Result<String, String> {
        let mut clipboard = Clipboard::new().map_err(|e| format!("Clipboard error: {}", e))?;
        match clipboard.get_text() {
            Ok(text) if text.trim().is_empty() => Err("Clipboard is empty".to_string()),
            Ok(text) => Ok(text.trim().to_string()),
            Err(e) => Err(format!("Clipboard error: {}", e)),
        }
    }
}
