//! The cached completion set and its local filtering.

use liaison_protocol::payloads::CompletionItem;

/// Completions fetched for one anchor, reused while the user keeps typing
/// word characters at that anchor.
///
/// Replaced wholesale whenever a fresh fetch completes; never merged.
#[derive(Debug, Clone)]
pub struct CachedCompletionSet {
    anchor: usize,
    items: Vec<CompletionItem>,
    caret_at_fetch: usize,
}

impl CachedCompletionSet {
    #[must_use]
    pub fn new(anchor: usize, items: Vec<CompletionItem>, caret_at_fetch: usize) -> Self {
        Self {
            anchor,
            items,
            caret_at_fetch,
        }
    }

    /// The offset the fetched completions are valid for.
    #[must_use]
    pub fn anchor(&self) -> usize {
        self.anchor
    }

    /// Caret offset when the set was fetched.
    #[must_use]
    pub fn caret_at_fetch(&self) -> usize {
        self.caret_at_fetch
    }

    #[must_use]
    pub fn items(&self) -> &[CompletionItem] {
        &self.items
    }

    /// Filter the set against the narrowed fragment, case-insensitively,
    /// preserving the service's ordering.
    #[must_use]
    pub fn filter(&self, fragment: &str) -> Vec<CompletionItem> {
        if fragment.is_empty() {
            return self.items.clone();
        }
        let needle = fragment.to_lowercase();
        self.items
            .iter()
            .filter(|item| item.label.to_lowercase().starts_with(&needle))
            .cloned()
            .collect()
    }
}
