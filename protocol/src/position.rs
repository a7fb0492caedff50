//! Offset ↔ (line, character) mapping.
//!
//! Lines are delimited by `\n`; offsets and columns are byte-based. Both
//! directions clamp out-of-range input instead of failing: the service and
//! the editor are only eventually consistent, so a position referring to
//! text that has since shrunk must degrade to the nearest valid location.

use serde::{Deserialize, Serialize};

/// A zero-indexed (line, character) location in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    #[must_use]
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Map a byte offset into a [`Position`].
///
/// Offsets past the end of the document clamp to the final position.
#[must_use]
pub fn offset_to_position(text: &str, offset: usize) -> Position {
    let offset = offset.min(text.len());
    let before = &text.as_bytes()[..offset];
    let line = before.iter().filter(|b| **b == b'\n').count() as u32;
    let line_start = before
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    Position {
        line,
        character: (offset - line_start) as u32,
    }
}

/// Map a [`Position`] back to a byte offset.
///
/// Sums each preceding line's length plus one for its terminator, then adds
/// the character column. A line past the last clamps to the document end; a
/// column past the line end clamps to the line end.
#[must_use]
pub fn position_to_offset(text: &str, position: &Position) -> usize {
    let mut offset = 0usize;
    let mut rest = text;
    for _ in 0..position.line {
        match rest.find('\n') {
            Some(nl) => {
                offset += nl + 1;
                rest = &rest[nl + 1..];
            }
            None => return text.len(),
        }
    }
    let line_len = rest.find('\n').unwrap_or(rest.len());
    offset + (position.character as usize).min(line_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_to_position_first_line() {
        assert_eq!(offset_to_position("Patient.name", 8), Position::new(0, 8));
    }

    #[test]
    fn test_offset_to_position_later_line() {
        let text = "first\nsecond\nthird";
        assert_eq!(offset_to_position(text, 6), Position::new(1, 0));
        assert_eq!(offset_to_position(text, 12), Position::new(1, 6));
        assert_eq!(offset_to_position(text, 13), Position::new(2, 0));
    }

    #[test]
    fn test_offset_to_position_clamps_past_end() {
        let text = "ab\ncd";
        assert_eq!(offset_to_position(text, 999), Position::new(1, 2));
    }

    #[test]
    fn test_offset_to_position_empty_document() {
        assert_eq!(offset_to_position("", 0), Position::new(0, 0));
        assert_eq!(offset_to_position("", 5), Position::new(0, 0));
    }

    #[test]
    fn test_position_to_offset_basic() {
        let text = "first\nsecond\nthird";
        assert_eq!(position_to_offset(text, &Position::new(0, 0)), 0);
        assert_eq!(position_to_offset(text, &Position::new(1, 3)), 9);
        assert_eq!(position_to_offset(text, &Position::new(2, 5)), 18);
    }

    #[test]
    fn test_position_to_offset_clamps_column_to_line_end() {
        let text = "ab\ncd";
        assert_eq!(position_to_offset(text, &Position::new(0, 99)), 2);
    }

    #[test]
    fn test_position_to_offset_clamps_line_to_document_end() {
        let text = "ab\ncd";
        assert_eq!(position_to_offset(text, &Position::new(7, 0)), 5);
    }

    #[test]
    fn test_roundtrip_every_offset() {
        let samples = [
            "",
            "x",
            "Patient.name.given",
            "one\ntwo\nthree",
            "trailing newline\n",
            "\n\n\n",
            "blank\n\nline",
        ];
        for text in samples {
            for offset in 0..=text.len() {
                let pos = offset_to_position(text, offset);
                assert_eq!(
                    position_to_offset(text, &pos),
                    offset,
                    "offset {offset} in {text:?}"
                );
            }
        }
    }

    #[test]
    fn test_position_serde_shape() {
        let json = serde_json::json!({"line": 3, "character": 14});
        let pos: Position = serde_json::from_value(json.clone()).expect("deserialize");
        assert_eq!(pos, Position::new(3, 14));
        assert_eq!(serde_json::to_value(pos).expect("serialize"), json);
    }
}
