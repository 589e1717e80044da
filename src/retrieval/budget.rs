use crate::types::ContextItem;

/// Rough characters-per-token ratio used to turn a token budget into characters
pub const CHARS_PER_TOKEN: usize = 4;

/// Character budget for the context handed to the generation service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudget {
    max_chars: usize,
}

impl ContextBudget {
    pub fn from_tokens(token_budget: usize) -> Self {
        Self {
            max_chars: token_budget.saturating_mul(CHARS_PER_TOKEN),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Keep a rank-ordered prefix of the non-blank items that fits the budget
    ///
    /// The first non-blank item is always kept, even when it alone exceeds the
    /// budget. After that, items are added in order until the next one would
    /// push the total over the budget.
    pub fn trim(&self, items: Vec<ContextItem>) -> Vec<ContextItem> {
        let mut kept = Vec::new();
        let mut total = 0usize;

        for item in items.into_iter().filter(|i| !i.text.trim().is_empty()) {
            let len = item.text.chars().count();
            if !kept.is_empty() && total + len > self.max_chars {
                break;
            }
            total += len;
            kept.push(item);
        }

        kept
    }
}

/// Render items as `[1] text`, `[2] text`, … one per line
pub fn render_numbered(items: &[ContextItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("[{}] {}", i + 1, item.text))
        .collect::<Vec<_>>()
        .join("\n")
}
