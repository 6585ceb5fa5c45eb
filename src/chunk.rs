use crate::error::PatchError;
use crate::model::Chunk;
use crate::parser::{is_end_of_file_marker, is_section_boundary, CHUNK_DELIMITER};
use log::{debug, trace};

/// One hunk of an update directive, as scanned from the patch text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// The lines the hunk expects to find in the original file (context and
    /// deleted lines, in order). Used to locate the hunk.
    pub context: Vec<String>,
    /// The edits of the hunk. Their `orig_index` is relative to `context`.
    pub chunks: Vec<Chunk>,
    /// Index of the first patch line after the hunk.
    pub next_index: usize,
    /// Whether the hunk was closed by an end-of-file marker.
    pub is_eof: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Keep,
    Add,
    Delete,
}

/// Splits a hunk line into its mode and the text after the marker.
///
/// A line without a recognized marker is context, kept whole.
fn classify(line: &str) -> (Mode, &str) {
    if let Some(rest) = line.strip_prefix('+') {
        (Mode::Add, rest)
    } else if let Some(rest) = line.strip_prefix('-') {
        (Mode::Delete, rest)
    } else if let Some(rest) = line.strip_prefix(' ') {
        (Mode::Keep, rest)
    } else {
        (Mode::Keep, line)
    }
}

/// Accumulates the pending edit of a hunk while its lines are scanned.
#[derive(Debug, Default)]
struct SectionBuilder {
    old: Vec<String>,
    del_lines: Vec<String>,
    ins_lines: Vec<String>,
    chunks: Vec<Chunk>,
}

impl SectionBuilder {
    fn push(&mut self, mode: Mode, text: &str) {
        match mode {
            Mode::Delete => {
                self.del_lines.push(text.to_string());
                self.old.push(text.to_string());
            }
            Mode::Add => self.ins_lines.push(text.to_string()),
            Mode::Keep => self.old.push(text.to_string()),
        }
    }

    /// Closes the pending deletions and insertions into a chunk.
    fn flush(&mut self) {
        if self.del_lines.is_empty() && self.ins_lines.is_empty() {
            return;
        }
        let chunk = Chunk {
            orig_index: self.old.len() - self.del_lines.len(),
            del_lines: std::mem::take(&mut self.del_lines),
            ins_lines: std::mem::take(&mut self.ins_lines),
        };
        debug!(
            "      Chunk at local line {}: -{} +{}",
            chunk.orig_index,
            chunk.del_lines.len(),
            chunk.ins_lines.len()
        );
        self.chunks.push(chunk);
    }
}

/// Scans one hunk starting at `lines[index]`.
///
/// Lines are consumed until a hunk, file or patch boundary (which is left in
/// place). Each line is classified by its first character: `+` inserts, `-`
/// deletes, anything else is context. Every switch back to context closes the
/// pending edit into a [`Chunk`]. An end-of-file marker right after the hunk is
/// consumed and reported through [`Section::is_eof`].
///
/// # Errors
///
/// - [`PatchError::InvalidLine`] for a `***` line that is not a known boundary.
/// - [`PatchError::EmptySection`] if the hunk contains no lines at all.
///
/// # Example
///
/// ```
/// # use apatch::{peek_next_section, Chunk};
/// let lines = ["@@", " one", "-two", "+2", " three", "*** End Patch"];
/// let section = peek_next_section(&lines, 1).unwrap();
///
/// assert_eq!(section.context, vec!["one", "two", "three"]);
/// assert_eq!(section.chunks, vec![Chunk {
///     orig_index: 1,
///     del_lines: vec!["two".to_string()],
///     ins_lines: vec!["2".to_string()],
/// }]);
/// assert_eq!(section.next_index, 5);
/// assert!(!section.is_eof);
/// ```
pub fn peek_next_section<S: AsRef<str>>(lines: &[S], index: usize) -> Result<Section, PatchError> {
    let start = index;
    let mut index = index;
    let mut builder = SectionBuilder::default();
    let mut mode = Mode::Keep;

    while index < lines.len() {
        let line: &str = lines[index].as_ref();
        if is_section_boundary(line) || line == CHUNK_DELIMITER {
            break;
        }
        if line.starts_with(CHUNK_DELIMITER) {
            return Err(PatchError::InvalidLine {
                line_number: index + 1,
                line: line.to_string(),
            });
        }
        index += 1;

        let last_mode = mode;
        let (next_mode, text) = classify(line);
        mode = next_mode;
        trace!("      {:?}: '{}'", mode, text);

        if mode == Mode::Keep && last_mode != Mode::Keep {
            builder.flush();
        }
        builder.push(mode, text);
    }
    builder.flush();

    let is_eof = index < lines.len() && is_end_of_file_marker(lines[index].as_ref());
    if is_eof {
        index += 1;
    } else if index == start {
        return Err(PatchError::EmptySection {
            line_number: start + 1,
        });
    }

    Ok(Section {
        context: builder.old,
        chunks: builder.chunks,
        next_index: index,
        is_eof,
    })
}
