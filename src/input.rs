use bstr::ByteSlice;
use camino::{Utf8Path, Utf8PathBuf};
use memchr::memchr2;

use crate::error::{Error, Result};

/// A single line of the source log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    /// The content of the line, excluding the line terminator.
    content: String,
    /// Whether the line ended with a terminator in the source.
    terminated: bool,
}

impl LogLine {
    /// Create a new LogLine from raw bytes, expected to be a complete line.
    ///
    /// A trailing `\n`, `\r\n` or lone `\r` is stripped and remembered as a
    /// single terminator. Invalid UTF-8 is replaced lossily.
    #[inline]
    pub fn new(full: &[u8]) -> LogLine {
        let (content, terminated) = match full.strip_suffix(b"\n") {
            Some(rest) => (rest.strip_suffix(b"\r").unwrap_or(rest), true),
            None => match full.strip_suffix(b"\r") {
                Some(rest) => (rest, true),
                None => (full, false),
            },
        };
        LogLine {
            content: content.to_str_lossy().into_owned(),
            terminated,
        }
    }

    /// Get the content of the line, excluding the line terminator.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether the line was followed by a terminator.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// The text after the first `": "`, with the final raw character removed.
    ///
    /// The removed character is the terminator when the line has one, so
    /// only unterminated lines lose a visible character. Returns `None`
    /// when the delimiter is absent.
    pub fn timestamp_field(&self) -> Option<&str> {
        let (_, rest) = self.content.split_once(": ")?;
        if self.terminated {
            return Some(rest);
        }
        let cut = rest.char_indices().last().map_or(0, |(i, _)| i);
        Some(&rest[..cut])
    }
}

/// Split on `\n`, `\r\n` or a lone `\r`, keeping each terminator with its line.
fn split_lines(bytes: &[u8]) -> Vec<LogLine> {
    let mut lines = Vec::new();
    let mut start = 0;
    while start < bytes.len() {
        let end = match memchr2(b'\n', b'\r', &bytes[start..]) {
            Some(i) => {
                let at = start + i;
                if bytes[at] == b'\r' && bytes.get(at + 1) == Some(&b'\n') {
                    at + 2
                } else {
                    at + 1
                }
            }
            None => bytes.len(),
        };
        lines.push(LogLine::new(&bytes[start..end]));
        start = end;
    }
    lines
}

/// The whole source log, materialized as an indexable sequence of lines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineStore {
    path: Option<Utf8PathBuf>,
    lines: Vec<LogLine>,
}

impl LineStore {
    /// Read every line of the file at `path`.
    pub fn open(path: impl AsRef<Utf8Path>) -> Result<LineStore> {
        let path = path.as_ref();
        let access = |source| Error::FileAccess {
            path: path.to_owned(),
            source,
        };

        let content = std::fs::read(path).map_err(access)?;
        let lines = split_lines(&content);
        log::info!("loaded {} lines from {}", lines.len(), path);

        Ok(LineStore {
            path: Some(path.to_owned()),
            lines,
        })
    }

    /// Build a store from in-memory lines.
    ///
    /// Each item is taken as-is: items containing no terminator are
    /// treated as unterminated lines.
    pub fn from_lines<I, S>(lines: I) -> LineStore
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        LineStore {
            path: None,
            lines: lines
                .into_iter()
                .map(|s| LogLine::new(s.as_ref().as_bytes()))
                .collect(),
        }
    }

    /// Split a block of text into lines the same way `open` does.
    pub fn from_text(text: &str) -> LineStore {
        LineStore {
            path: None,
            lines: split_lines(text.as_bytes()),
        }
    }

    /// The file this store was loaded from, if any.
    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&LogLine> {
        self.lines.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LogLine> {
        self.lines.iter()
    }
}

impl<'a> IntoIterator for &'a LineStore {
    type Item = &'a LogLine;
    type IntoIter = std::slice::Iter<'a, LogLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}
