use tracing::debug;

use crate::models::Message;

fn text_len(message: &Message) -> usize {
    message.text().chars().count()
}

/// Bounds the conversation to `budget` characters before it is encoded.
///
/// A leading system turn is always kept and charged against the budget
/// first. The remaining budget is filled greedily from the newest turn
/// backwards; turns that do not fit (and empty turns) are skipped whole.
/// Kept turns stay in their original order. A `budget` of zero disables
/// truncation.
pub fn truncate_history(messages: Vec<Message>, budget: usize) -> Vec<Message> {
    if messages.is_empty() || budget == 0 {
        return messages;
    }

    let lengths: Vec<usize> = messages.iter().map(text_len).collect();
    let total: usize = lengths.iter().sum();
    if total <= budget {
        return messages;
    }

    let mut remaining = budget;
    let mut keep = vec![false; messages.len()];
    let mut start = 0;

    if messages[0].is_system() {
        keep[0] = true;
        remaining = remaining.saturating_sub(lengths[0]);
        start = 1;
    }

    for i in (start..messages.len()).rev() {
        let len = lengths[i];
        if len == 0 || len > remaining {
            continue;
        }
        keep[i] = true;
        remaining -= len;
    }

    let original = messages.len();
    let kept: Vec<Message> = messages
        .into_iter()
        .zip(keep)
        .filter_map(|(message, keep)| keep.then_some(message))
        .collect();

    debug!(
        total_chars = total,
        budget,
        kept = kept.len(),
        dropped = original - kept.len(),
        "truncated conversation history"
    );
    kept
}
