use scribe_core::EditMode;
use scribe_core::History;

use crate::document::byte_offset;
use crate::document::char_len;
use crate::document::DocumentAccessor;
use crate::document::Rewrite;
use crate::error::MutationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditOutcome {
    pub previous_length: usize,
    pub new_length: usize,
    /// Where the caret was placed, for the modes that move it.
    pub cursor: Option<usize>,
}

/// Builds the edited text. `bounds` is `[start, end)` in characters and is only
/// consulted by the selection-based modes.
pub fn compose(
    old: &str,
    mode: EditMode,
    text: &str,
    bounds: (usize, usize),
    separator: &str,
) -> Result<String, MutationError> {
    match mode {
        EditMode::Replace => Ok(text.to_string()),
        EditMode::Append => Ok(format!("{old}{separator}{text}")),
        EditMode::Insert | EditMode::ReplaceSelection => {
            let (start, end) = bounds;
            if start > end {
                return Err(MutationError::InvertedSelection { start, end });
            }
            let len = char_len(old);
            if end > len {
                return Err(MutationError::SelectionOutOfBounds { start, end, len });
            }
            let head = &old[..byte_offset(old, start)];
            let tail = &old[byte_offset(old, end)..];
            Ok(format!("{head}{text}{tail}"))
        }
    }
}

/// Applies one edit to the document and records the result as a single
/// history entry.
pub fn apply_edit<D>(
    document: &mut D,
    history: &mut History,
    mode: EditMode,
    text: &str,
    separator: &str,
) -> Result<EditOutcome, MutationError>
where
    D: DocumentAccessor + ?Sized,
{
    let (previous, next) = document.edit(&mut |current, selection| {
        let bounds = selection.map_or((0, 0), |selection| (selection.start, selection.end));
        Ok(Rewrite {
            text: compose(current, mode, text, bounds, separator)?,
            cursor: mode.uses_selection().then(|| bounds.0 + char_len(text)),
        })
    })?;
    let new_length = char_len(&next.text);
    history.push(next.text);

    Ok(EditOutcome {
        previous_length: char_len(&previous),
        new_length,
        cursor: next.cursor,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::document::DocumentBuffer;
    use crate::error::DocumentError;

    const SEP: &str = "\n\n";

    #[test]
    fn replace_discards_old_text() {
        assert_eq!(
            compose("old", EditMode::Replace, "new", (0, 0), SEP).as_deref(),
            Ok("new")
        );
    }

    #[test]
    fn append_joins_with_separator_even_when_empty() {
        assert_eq!(
            compose("", EditMode::Append, "Hello", (0, 0), SEP).as_deref(),
            Ok("\n\nHello")
        );
    }

    #[test]
    fn selection_modes_splice_by_character() {
        assert_eq!(
            compose("añbc", EditMode::ReplaceSelection, "Ñ", (1, 2), SEP).as_deref(),
            Ok("aÑbc")
        );
        assert_eq!(
            compose("abc", EditMode::Insert, "-", (3, 3), SEP).as_deref(),
            Ok("abc-")
        );
    }

    #[test]
    fn bad_bounds_are_rejected() {
        assert_eq!(
            compose("abc", EditMode::Insert, "x", (2, 1), SEP),
            Err(MutationError::InvertedSelection { start: 2, end: 1 })
        );
        assert_eq!(
            compose("abc", EditMode::ReplaceSelection, "x", (1, 4), SEP),
            Err(MutationError::SelectionOutOfBounds {
                start: 1,
                end: 4,
                len: 3
            })
        );
    }

    #[test]
    fn append_reports_lengths() {
        let mut doc = DocumentBuffer::new("World");
        let mut history = History::default();
        let outcome =
            apply_edit(&mut doc, &mut history, EditMode::Append, "Hello", SEP).expect("edit");

        assert_eq!(doc.as_str(), "World\n\nHello");
        assert_eq!(
            outcome,
            EditOutcome {
                previous_length: 5,
                new_length: 12,
                cursor: None,
            }
        );
        assert_eq!(history.current(), Some("World\n\nHello"));
    }

    #[test]
    fn replace_selection_moves_cursor_past_new_text() {
        let mut doc = DocumentBuffer::new("abcdef");
        doc.select(1, 3);
        let mut history = History::default();
        let outcome = apply_edit(&mut doc, &mut history, EditMode::ReplaceSelection, "XY", SEP)
            .expect("edit");

        assert_eq!(doc.as_str(), "aXYdef");
        assert_eq!(outcome.cursor, Some(3));
        assert_eq!(doc.cursor(), Some(3));
    }

    #[test]
    fn insert_into_empty_document_without_selection() {
        let mut doc = DocumentBuffer::new("");
        let mut history = History::default();
        apply_edit(&mut doc, &mut history, EditMode::Insert, "Z", SEP).expect("edit");

        assert_eq!(doc.as_str(), "Z");
        assert_eq!(doc.cursor(), Some(1));
    }

    #[test]
    fn failed_write_leaves_history_alone() {
        let mut doc = DocumentBuffer::new("keep");
        doc.set_read_only(true);
        let mut history = History::default();
        history.push("keep".to_string());

        let err = apply_edit(&mut doc, &mut history, EditMode::Replace, "lose", SEP)
            .expect_err("read-only");
        assert_eq!(err, MutationError::Document(DocumentError::ReadOnly));
        assert_eq!(history.len(), 1);
        assert_eq!(doc.as_str(), "keep");
    }
}
