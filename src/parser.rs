use crate::chunk::peek_next_section;
use crate::error::PatchError;
use crate::matcher::find_context;
use crate::model::{ActionType, Chunk, Originals, Patch, PatchAction};
use log::{debug, info, trace, warn};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const BEGIN_PATCH: &str = "*** Begin Patch";
pub const END_PATCH: &str = "*** End Patch";
pub const ADD_FILE: &str = "*** Add File: ";
pub const DELETE_FILE: &str = "*** Delete File: ";
pub const UPDATE_FILE: &str = "*** Update File: ";
pub const MOVE_TO: &str = "*** Move to: ";
/// Closes a hunk that applies to the end of the file.
pub const END_OF_FILE: &str = "*** End of File";
/// Short form of [`END_OF_FILE`].
pub const END_OF_FILE_SHORT: &str = "*** EOF";
/// A bare delimiter that ends a hunk without starting anything else.
pub const CHUNK_DELIMITER: &str = "***";

const SECTION_MARKER: &str = "@@";

/// Lines that end an add section or the list of hunks of an update.
const FILE_BOUNDARIES: [&str; 4] = [
    END_PATCH,
    "*** Update File:",
    "*** Delete File:",
    "*** Add File:",
];

pub(crate) fn is_end_of_file_marker(line: &str) -> bool {
    line == END_OF_FILE || line == END_OF_FILE_SHORT
}

fn starts_with_end_of_file_marker(line: &str) -> bool {
    line.starts_with(END_OF_FILE) || line.starts_with(END_OF_FILE_SHORT)
}

fn is_file_boundary(line: &str) -> bool {
    FILE_BOUNDARIES.iter().any(|p| line.starts_with(p))
}

/// Whether `line` ends the hunk that precedes it.
pub(crate) fn is_section_boundary(line: &str) -> bool {
    line.starts_with(SECTION_MARKER) || is_file_boundary(line) || starts_with_end_of_file_marker(line)
}

/// Extracts the path from a `*** <Action> File: <path>` style header.
fn header_path<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix)
        .map(str::trim)
        .filter(|path| !path.is_empty())
}

/// The state of one parse: the patch lines, a cursor into them, the running
/// fuzz total and the patch built so far. Owned by a single
/// [`text_to_patch`] call.
struct Parser<'a> {
    originals: &'a Originals,
    lines: Vec<&'a str>,
    index: usize,
    patch: Patch,
    fuzz: usize,
}

impl<'a> Parser<'a> {
    fn new(originals: &'a Originals, lines: Vec<&'a str>) -> Self {
        Self {
            originals,
            lines,
            // Line 0 is the begin marker, already validated.
            index: 1,
            patch: Patch::default(),
            fuzz: 0,
        }
    }

    fn current(&self) -> Option<&'a str> {
        self.lines.get(self.index).copied()
    }

    fn is_done(&self, boundary: impl Fn(&str) -> bool) -> bool {
        self.current().map_or(true, boundary)
    }

    /// Consumes the current line if it is a header with `prefix`, returning its path.
    fn read_header(&mut self, prefix: &str) -> Option<PathBuf> {
        let path = header_path(self.current()?, prefix)?;
        self.index += 1;
        Some(PathBuf::from(path))
    }

    fn parse(mut self) -> Result<(Patch, usize), PatchError> {
        while !self.is_done(|line| line.starts_with(END_PATCH)) {
            if let Some(path) = self.read_header(UPDATE_FILE) {
                self.parse_update_directive(path)?;
                continue;
            }
            if let Some(path) = self.read_header(DELETE_FILE) {
                self.parse_delete_directive(path)?;
                continue;
            }
            if let Some(path) = self.read_header(ADD_FILE) {
                self.parse_add_directive(path)?;
                continue;
            }
            return Err(PatchError::UnknownLine {
                line_number: self.index + 1,
                line: self.current().unwrap_or_default().to_string(),
            });
        }

        if !self.current().is_some_and(|line| line.starts_with(END_PATCH)) {
            return Err(PatchError::MissingEndPatch);
        }
        Ok((self.patch, self.fuzz))
    }

    fn ensure_unique(&self, action: ActionType, path: &Path) -> Result<(), PatchError> {
        if self.patch.actions.contains_key(path) {
            return Err(PatchError::DuplicatePath {
                action,
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    fn parse_update_directive(&mut self, path: PathBuf) -> Result<(), PatchError> {
        self.ensure_unique(ActionType::Update, &path)?;
        let move_path = self.read_header(MOVE_TO);
        let originals = self.originals;
        let Some(text) = originals.get(&path) else {
            return Err(PatchError::MissingFile {
                action: ActionType::Update,
                path,
            });
        };
        info!("Parsing update of '{}'", path.display());
        let chunks = self.parse_update_file(&path, text)?;
        if let Some(move_path) = &move_path {
            debug!("  Moving to '{}'", move_path.display());
        }
        self.patch
            .actions
            .insert(path, PatchAction::update(chunks, move_path));
        Ok(())
    }

    fn parse_delete_directive(&mut self, path: PathBuf) -> Result<(), PatchError> {
        self.ensure_unique(ActionType::Delete, &path)?;
        if !self.originals.contains_key(&path) {
            return Err(PatchError::MissingFile {
                action: ActionType::Delete,
                path,
            });
        }
        info!("Parsing delete of '{}'", path.display());
        self.patch.actions.insert(path, PatchAction::delete());
        Ok(())
    }

    fn parse_add_directive(&mut self, path: PathBuf) -> Result<(), PatchError> {
        self.ensure_unique(ActionType::Add, &path)?;
        if self.originals.contains_key(&path) {
            return Err(PatchError::FileAlreadyExists { path });
        }
        info!("Parsing add of '{}'", path.display());
        let mut content = Vec::new();
        while !self.is_done(is_file_boundary) {
            let line = self.current().unwrap_or_default();
            let Some(text) = line.strip_prefix('+') else {
                return Err(PatchError::InvalidAddFileLine {
                    path,
                    line: line.to_string(),
                });
            };
            content.push(text);
            self.index += 1;
        }
        self.patch
            .actions
            .insert(path, PatchAction::add(content.join("\n")));
        Ok(())
    }

    /// Parses the hunks of an update directive against the file's content.
    fn parse_update_file(&mut self, path: &Path, text: &str) -> Result<Vec<Chunk>, PatchError> {
        let file_lines: Vec<&str> = text.split('\n').collect();
        let mut chunks = Vec::new();
        // Number of file lines already matched by previous hunks.
        let mut position = 0;
        let mut first_section = true;

        while !self.is_done(|line| is_file_boundary(line) || starts_with_end_of_file_marker(line)) {
            let line = self.current().unwrap_or_default();
            if let Some(hint) = line.strip_prefix(SECTION_MARKER) {
                if !hint.is_empty() && !hint.starts_with(' ') {
                    return Err(self.invalid_line());
                }
                self.index += 1;
                if !hint.trim().is_empty() {
                    position = self.seek_hint(&file_lines, &hint[1..], position);
                }
            } else if !first_section {
                return Err(self.invalid_line());
            }
            first_section = false;

            let section = peek_next_section(&self.lines, self.index)?;
            let Some(found) = find_context(&file_lines, &section.context, position, section.is_eof)
            else {
                let context = section.context.join("\n");
                warn!(
                    "  Could not find context in '{}' from line {}",
                    path.display(),
                    position + 1
                );
                return Err(if section.is_eof {
                    PatchError::EofContextNotFound {
                        path: path.to_path_buf(),
                        position,
                        context,
                    }
                } else {
                    PatchError::ContextNotFound {
                        path: path.to_path_buf(),
                        position,
                        context,
                    }
                });
            };
            if found.fuzz > 0 {
                warn!(
                    "  Hunk for '{}' matched at line {} with fuzz {} ({:?})",
                    path.display(),
                    found.index + 1,
                    found.fuzz,
                    found.tier
                );
            } else {
                debug!("  Hunk matched exactly at line {}", found.index + 1);
            }
            self.fuzz += found.fuzz;
            chunks.extend(section.chunks.iter().map(|chunk| chunk.rebased(found.index)));
            position = found.index + section.context.len();
            self.index = section.next_index;
        }

        Ok(chunks)
    }

    /// Moves `position` past the line named by an `@@ <hint>` marker.
    ///
    /// A hint line that already occurs before `position` is ignored, as is
    /// one that cannot be found. A hint found only after trimming whitespace
    /// costs one point of fuzz.
    fn seek_hint(&mut self, file_lines: &[&str], hint: &str, position: usize) -> usize {
        let split = position.min(file_lines.len());
        let (before, after) = file_lines.split_at(split);

        if !before.iter().any(|line| *line == hint) {
            if let Some(offset) = after.iter().position(|line| *line == hint) {
                trace!("    Hint '{}' found at line {}", hint, split + offset + 1);
                return split + offset + 1;
            }
        }

        let trimmed = hint.trim();
        if !before.iter().any(|line| line.trim() == trimmed) {
            if let Some(offset) = after.iter().position(|line| line.trim() == trimmed) {
                trace!(
                    "    Hint '{}' found at line {} ignoring whitespace",
                    trimmed,
                    split + offset + 1
                );
                self.fuzz += 1;
                return split + offset + 1;
            }
        }

        debug!("    Hint '{}' not found after line {}, ignoring it", hint, position);
        position
    }

    fn invalid_line(&self) -> PatchError {
        PatchError::InvalidLine {
            line_number: self.index + 1,
            line: self.current().unwrap_or_default().to_string(),
        }
    }
}

/// Parses patch text into a [`Patch`], locating every hunk in `originals`.
///
/// Returns the patch together with the total fuzz accumulated while
/// locating hunks. The fuzz is informational: 0 means every hunk matched
/// exactly.
///
/// # Errors
///
/// Fails on the first malformed directive, duplicate or missing path, or
/// hunk whose context cannot be found. See [`PatchError`].
///
/// # Example
///
/// ```
/// # use apatch::{text_to_patch, ActionType, Originals};
/// # use std::path::PathBuf;
/// let mut originals = Originals::new();
/// originals.insert(PathBuf::from("a.txt"), "one\ntwo\nthree".to_string());
///
/// let text = "*** Begin Patch\n*** Update File: a.txt\n one\n-two\n three\n*** End Patch";
/// let (patch, fuzz) = text_to_patch(text, &originals).unwrap();
///
/// assert_eq!(fuzz, 0);
/// let action = patch.get("a.txt").unwrap();
/// assert_eq!(action.kind, ActionType::Update);
/// assert_eq!(action.chunks[0].orig_index, 1);
/// assert_eq!(action.chunks[0].del_lines, vec!["two"]);
/// ```
pub fn text_to_patch(text: &str, originals: &Originals) -> Result<(Patch, usize), PatchError> {
    let lines: Vec<&str> = text.trim().split('\n').collect();
    if lines.len() < 2 {
        return Err(PatchError::InvalidPatchText {
            reason: "expected at least two lines".to_string(),
        });
    }
    if lines[0] != BEGIN_PATCH {
        return Err(PatchError::InvalidPatchText {
            reason: format!("first line must be '{}'", BEGIN_PATCH),
        });
    }
    if lines[lines.len() - 1] != END_PATCH {
        return Err(PatchError::InvalidPatchText {
            reason: format!("last line must be '{}'", END_PATCH),
        });
    }

    trace!("text_to_patch called with {} patch lines.", lines.len());
    let (patch, fuzz) = Parser::new(originals, lines).parse()?;
    debug!("Parsed {} file action(s) with total fuzz {}.", patch.len(), fuzz);
    Ok((patch, fuzz))
}

fn scan_headers(text: &str, prefixes: &[&str]) -> BTreeSet<PathBuf> {
    text.trim()
        .split('\n')
        .filter_map(|line| prefixes.iter().find_map(|p| header_path(line, p)))
        .map(PathBuf::from)
        .collect()
}

/// Lists the files a patch updates or deletes, without parsing it.
///
/// These are the files that must be read before [`text_to_patch`] runs.
///
/// # Example
///
/// ```
/// # use apatch::identify_files_needed;
/// # use std::path::PathBuf;
/// let text = "*** Begin Patch\n*** Delete File: old.txt\n*** Add File: new.txt\n+x\n*** End Patch";
/// let needed: Vec<_> = identify_files_needed(text).into_iter().collect();
/// assert_eq!(needed, vec![PathBuf::from("old.txt")]);
/// ```
pub fn identify_files_needed(text: &str) -> BTreeSet<PathBuf> {
    scan_headers(text, &[UPDATE_FILE, DELETE_FILE])
}

/// Lists the files a patch adds, without parsing it.
pub fn identify_files_added(text: &str) -> BTreeSet<PathBuf> {
    scan_headers(text, &[ADD_FILE])
}
