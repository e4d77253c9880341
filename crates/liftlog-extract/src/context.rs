//! Conversation context passed along with the text being analyzed.

use liftlog_types::ChatMessage;

/// History entries included by default.
pub const DEFAULT_MAX_HISTORY: usize = 3;

/// Characters kept from each history entry.
pub const HISTORY_CONTENT_LIMIT: usize = 150;

/// Render the last `max_history` entries as a `Recent conversation:` block.
///
/// Returns an empty string when there is nothing to include. Each entry is
/// cut to [`HISTORY_CONTENT_LIMIT`] characters on a char boundary.
pub fn render_context(history: &[ChatMessage], max_history: usize) -> String {
    if history.is_empty() || max_history == 0 {
        return String::new();
    }

    let start = history.len().saturating_sub(max_history);
    let mut context = String::from("Recent conversation:\n");
    for message in &history[start..] {
        let content: String = message.content.chars().take(HISTORY_CONTENT_LIMIT).collect();
        context.push_str(message.role.as_str());
        context.push_str(": ");
        context.push_str(&content);
        context.push('\n');
    }
    context.push('\n');
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_history() {
        assert_eq!(render_context(&[], 3), "");
        assert_eq!(render_context(&[ChatMessage::user("hi")], 0), "");
    }

    #[test]
    fn test_keeps_last_entries() {
        let history = vec![
            ChatMessage::user("one"),
            ChatMessage::assistant("two"),
            ChatMessage::user("three"),
            ChatMessage::assistant("four"),
        ];
        assert_eq!(
            render_context(&history, 3),
            "Recent conversation:\nassistant: two\nuser: three\nassistant: four\n\n"
        );
    }

    #[test]
    fn test_truncates_on_char_boundary() {
        let long = "é".repeat(200);
        let context = render_context(&[ChatMessage::user(long)], 3);
        let line = context.lines().nth(1).unwrap();
        assert_eq!(line.chars().count(), "user: ".len() + HISTORY_CONTENT_LIMIT);
    }
}
