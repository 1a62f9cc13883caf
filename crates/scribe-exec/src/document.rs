use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use serde::Serialize;

use crate::error::DocumentError;
use crate::error::MutationError;

/// Offsets count characters, not bytes. A caret is a zero-width selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl Selection {
    pub fn caret(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
            text: String::new(),
        }
    }

    pub fn is_caret(&self) -> bool {
        self.start == self.end
    }
}

/// Replacement text for an edit, and where to leave the caret afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub text: String,
    pub cursor: Option<usize>,
}

/// The editor surface the engine reads from and writes to.
pub trait DocumentAccessor {
    fn content(&self) -> String;

    fn selection(&self) -> Option<Selection>;

    fn set_cursor_position(&mut self, offset: usize);

    fn write(&mut self, text: String) -> Result<(), DocumentError>;

    /// Reads the text and selection, builds the replacement and stores it as
    /// one step. Returns the text that was replaced along with the rewrite.
    ///
    /// Surfaces shared with other writers must override this so nothing can
    /// land between the read and the write.
    fn edit(
        &mut self,
        rewrite: &mut dyn FnMut(&str, Option<Selection>) -> Result<Rewrite, MutationError>,
    ) -> Result<(String, Rewrite), MutationError> {
        let previous = self.content();
        let next = rewrite(&previous, self.selection())?;
        self.write(next.text.clone())?;
        if let Some(offset) = next.cursor {
            self.set_cursor_position(offset);
        }
        Ok((previous, next))
    }
}

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte index of the `chars`-th character, or the end of `text`.
pub(crate) fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(index, _)| index)
}

pub(crate) fn char_slice(text: &str, start: usize, end: usize) -> &str {
    &text[byte_offset(text, start)..byte_offset(text, end)]
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentBuffer {
    text: String,
    /// `(anchor, head)`; `None` until something places a caret.
    range: Option<(usize, usize)>,
    read_only: bool,
}

impl DocumentBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            range: None,
            read_only: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len_chars(&self) -> usize {
        char_len(&self.text)
    }

    /// Selects `[start, end)`, clamped to the document. Reversed bounds are kept
    /// as anchor and head and normalized on read.
    pub fn select(&mut self, start: usize, end: usize) {
        let len = self.len_chars();
        self.range = Some((start.min(len), end.min(len)));
    }

    pub fn clear_selection(&mut self) {
        self.range = None;
    }

    pub fn cursor(&self) -> Option<usize> {
        self.range.map(|(_, head)| head)
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl DocumentAccessor for DocumentBuffer {
    fn content(&self) -> String {
        self.text.clone()
    }

    fn selection(&self) -> Option<Selection> {
        let (anchor, head) = self.range?;
        let (start, end) = if anchor <= head {
            (anchor, head)
        } else {
            (head, anchor)
        };
        Some(Selection {
            start,
            end,
            text: char_slice(&self.text, start, end).to_string(),
        })
    }

    fn set_cursor_position(&mut self, offset: usize) {
        let offset = offset.min(self.len_chars());
        self.range = Some((offset, offset));
    }

    fn write(&mut self, text: String) -> Result<(), DocumentError> {
        if self.read_only {
            return Err(DocumentError::ReadOnly);
        }
        self.text = text;
        if let Some((anchor, head)) = self.range {
            let len = self.len_chars();
            self.range = Some((anchor.min(len), head.min(len)));
        }
        Ok(())
    }
}

/// A buffer shared with other threads. Writes and whole edits each hold the
/// lock for their full duration, so writers never interleave.
#[derive(Debug, Clone, Default)]
pub struct SharedDocument {
    inner: Arc<Mutex<DocumentBuffer>>,
}

impl SharedDocument {
    pub fn new(buffer: DocumentBuffer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(buffer)),
        }
    }

    /// Reads tolerate poisoning; the buffer is always left whole by a write.
    pub fn lock(&self) -> MutexGuard<'_, DocumentBuffer> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentAccessor for SharedDocument {
    fn content(&self) -> String {
        self.lock().content()
    }

    fn selection(&self) -> Option<Selection> {
        self.lock().selection()
    }

    fn set_cursor_position(&mut self, offset: usize) {
        self.lock().set_cursor_position(offset);
    }

    fn write(&mut self, text: String) -> Result<(), DocumentError> {
        let mut guard = self.inner.lock().map_err(|_| DocumentError::Poisoned)?;
        guard.write(text)
    }

    fn edit(
        &mut self,
        rewrite: &mut dyn FnMut(&str, Option<Selection>) -> Result<Rewrite, MutationError>,
    ) -> Result<(String, Rewrite), MutationError> {
        let mut guard = self.inner.lock().map_err(|_| DocumentError::Poisoned)?;
        guard.edit(rewrite)
    }
}
