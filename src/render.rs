//! Pure per-character display tagging, derived only from the text length and
//! the cursor position. The TUI layer maps these tags onto styles; keeping
//! the derivation separate makes the display contract testable without a
//! terminal.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharTag {
    /// Already typed correctly.
    Correct,
    /// The next character the session expects.
    Current,
    /// Not reached yet.
    Untyped,
}

/// Tag every character position of a text of `len` characters for a given
/// cursor: indices below the cursor are correct, the cursor index (when in
/// bounds) is current, the rest untyped. Idempotent for a given input.
pub fn char_tags(len: usize, cursor: usize) -> Vec<CharTag> {
    (0..len)
        .map(|idx| {
            if idx < cursor {
                CharTag::Correct
            } else if idx == cursor {
                CharTag::Current
            } else {
                CharTag::Untyped
            }
        })
        .collect()
}
