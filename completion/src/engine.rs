//! Edit classification and the fetch/accept state machine.

use liaison_protocol::payloads::{CompletionItem, CompletionTriggerKind};

use crate::cache::CachedCompletionSet;
use crate::trigger::{
    TriggerContext, find_anchor, is_word_char, replacement_span, trigger_sequence,
};

/// A request the engine wants issued. Only the most recently issued ticket
/// is live; results for older tickets are discarded on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub id: u64,
    /// Anchor offset at issue time — acceptance requires the document's
    /// anchor to still be here when the result lands.
    pub anchor: usize,
    pub context: TriggerContext,
}

/// Completions ready to show, with the span they replace.
#[derive(Debug, Clone, PartialEq)]
pub struct Completions {
    pub items: Vec<CompletionItem>,
    pub replace: std::ops::Range<usize>,
}

/// What an edit should lead to.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// No completion activity: an ordinary keystroke outside any
    /// member-access or call context.
    Quiet,
    /// The cached set still covers this anchor — show it filtered against
    /// the narrowed fragment, no remote traffic.
    Continuation(Completions),
    /// Issue exactly one remote request for this ticket.
    Fetch(FetchTicket),
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    ticket_id: u64,
    anchor: usize,
}

/// Per-document completion state machine. Owns the cache exclusively.
#[derive(Debug, Default)]
pub struct CompletionEngine {
    cache: Option<CachedCompletionSet>,
    in_flight: Option<InFlight>,
    next_ticket: u64,
}

impl CompletionEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify an edit and decide the completion action.
    ///
    /// `caret` is a byte offset into `text`; `explicit` marks a manual
    /// completion invocation rather than a keystroke.
    pub fn on_edit(&mut self, text: &str, caret: usize, explicit: bool) -> EditOutcome {
        let Some(prefix) = text.get(..caret) else {
            tracing::debug!(caret, "caret not on a char boundary, ignoring edit");
            return EditOutcome::Quiet;
        };
        let just_typed = prefix.chars().next_back();
        let anchor_match = find_anchor(prefix);

        // Continuation: the cache still covers this anchor and the user
        // typed another word character — narrow locally, ask nothing.
        if !explicit
            && let (Some(cache), Some(found), Some(c)) = (&self.cache, anchor_match, just_typed)
            && cache.anchor() == found.start
            && is_word_char(c)
        {
            let items = cache.filter(found.fragment(prefix));
            return EditOutcome::Continuation(Completions {
                items,
                replace: replacement_span(text, caret),
            });
        }

        // Every other edit is fresh: whatever was cached is now wrong.
        self.cache = None;

        let trigger = trigger_sequence(prefix);
        if trigger.is_none() && !explicit && anchor_match.is_none() {
            // An ordinary keystroke in prose — stay quiet.
            return EditOutcome::Quiet;
        }

        let kind = if trigger.is_some() {
            CompletionTriggerKind::TriggerCharacter
        } else {
            CompletionTriggerKind::Invoked
        };
        let anchor = anchor_match.map_or(caret, |m| m.start);
        let id = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight = Some(InFlight {
            ticket_id: id,
            anchor,
        });

        EditOutcome::Fetch(FetchTicket {
            id,
            anchor,
            context: TriggerContext {
                caret,
                kind,
                trigger,
            },
        })
    }

    /// Accept a returned item set — or refuse it.
    ///
    /// The result is cached and surfaced only when the ticket is still the
    /// live one and the document's anchor sits where it was at issue time.
    /// Anything else (superseded ticket, caret moved on) is discarded:
    /// never cached, never shown.
    pub fn accept_result(
        &mut self,
        ticket_id: u64,
        items: Vec<CompletionItem>,
        text: &str,
        caret: usize,
    ) -> Option<Completions> {
        let live = self.in_flight?;
        if live.ticket_id != ticket_id {
            tracing::debug!(ticket_id, "dropping result for superseded fetch");
            return None;
        }
        self.in_flight = None;

        let prefix = text.get(..caret)?;
        let current_anchor = find_anchor(prefix).map_or(caret, |m| m.start);
        if current_anchor != live.anchor {
            tracing::debug!(
                requested = live.anchor,
                current = current_anchor,
                "dropping result whose anchor moved"
            );
            return None;
        }

        let cache = CachedCompletionSet::new(live.anchor, items, caret);
        let fragment = find_anchor(prefix).map_or("", |m| m.fragment(prefix));
        let shown = cache.filter(fragment);
        self.cache = Some(cache);

        Some(Completions {
            items: shown,
            replace: replacement_span(text, caret),
        })
    }

    /// Forget an in-flight fetch that failed or timed out, so a stray
    /// success for the same ticket can't land later.
    pub fn fetch_failed(&mut self, ticket_id: u64) {
        if self.in_flight.is_some_and(|f| f.ticket_id == ticket_id) {
            self.in_flight = None;
        }
    }

    /// Whether a fetched set is currently cached (test and introspection
    /// hook; the decision logic goes through [`Self::on_edit`]).
    #[must_use]
    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }
}
