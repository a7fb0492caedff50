//! Anchor heuristics and trigger-character detection.
//!
//! An anchor is the offset where a completion match begins; it doubles as
//! the cache-validity key and the start of the replacement range. Matching
//! runs over the text up to the caret only.

use std::sync::LazyLock;

use liaison_protocol::payloads::CompletionTriggerKind;
use regex::Regex;

/// Member access ending at the caret: a literal `.` plus any word characters.
static DOT_ACCESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\w*\z").expect("dot-access pattern"));

/// Call opening ending at the caret: `(`, optionally a space, any word chars.
static PAREN_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\( ?\w*\z").expect("paren-open pattern"));

/// Contiguous word characters ending at the caret.
static BARE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+\z").expect("bare-word pattern"));

/// Which heuristic produced an anchor, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorKind {
    DotAccess,
    ParenOpen,
    BareWord,
}

/// A non-empty anchor match ending at the caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorMatch {
    pub kind: AnchorKind,
    /// Byte offset where the match (and the replacement span) starts.
    pub start: usize,
    /// Byte offset one past the match — always the caret.
    pub end: usize,
}

impl AnchorMatch {
    /// The typed fragment to filter completions against: the match text
    /// minus its trigger prefix (`.`, `(`, or `( `).
    #[must_use]
    pub fn fragment<'t>(&self, prefix: &'t str) -> &'t str {
        let matched = &prefix[self.start..self.end];
        match self.kind {
            AnchorKind::DotAccess => &matched[1..],
            AnchorKind::ParenOpen => {
                let rest = &matched[1..];
                rest.strip_prefix(' ').unwrap_or(rest)
            }
            AnchorKind::BareWord => matched,
        }
    }
}

/// Find the highest-priority anchor match ending at the caret.
///
/// Priority: dot-access, then paren-open, then bare word.
#[must_use]
pub fn find_anchor(prefix: &str) -> Option<AnchorMatch> {
    let candidates: [(AnchorKind, &Regex); 3] = [
        (AnchorKind::DotAccess, &*DOT_ACCESS),
        (AnchorKind::ParenOpen, &*PAREN_OPEN),
        (AnchorKind::BareWord, &*BARE_WORD),
    ];
    for (kind, pattern) in candidates {
        if let Some(found) = pattern.find(prefix) {
            return Some(AnchorMatch {
                kind,
                start: found.start(),
                end: found.end(),
            });
        }
    }
    None
}

/// The trigger sequence the caret sits right after, if any.
///
/// `( ` is detected before `(` so the two-character sequence wins.
#[must_use]
pub fn trigger_sequence(prefix: &str) -> Option<&'static str> {
    if prefix.ends_with("( ") {
        Some("( ")
    } else if prefix.ends_with('.') {
        Some(".")
    } else if prefix.ends_with('(') {
        Some("(")
    } else {
        None
    }
}

/// Word characters keep a cached completion set alive: letters, digits,
/// underscore.
#[must_use]
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// How and where a completion request was provoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerContext {
    /// Caret offset at issue time.
    pub caret: usize,
    pub kind: CompletionTriggerKind,
    /// The trigger sequence, for `CharacterTriggered` requests.
    pub trigger: Option<&'static str>,
}

/// The span a chosen completion replaces: from the start of the most
/// specific non-empty match through the caret. When the caret sits right
/// after a freshly typed `.`, nothing is consumed — the range collapses to
/// a pure insertion after the dot.
#[must_use]
pub fn replacement_span(text: &str, caret: usize) -> std::ops::Range<usize> {
    let Some(prefix) = text.get(..caret) else {
        return caret..caret;
    };
    match find_anchor(prefix) {
        Some(anchor) if !prefix.ends_with('.') => anchor.start..caret,
        _ => caret..caret,
    }
}
