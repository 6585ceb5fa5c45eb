use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A snapshot of original file contents, keyed by path.
pub type Originals = BTreeMap<PathBuf, String>;

/// The kind of operation a directive performs on a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    /// Create a new file from `+` lines.
    Add,
    /// Remove an existing file.
    Delete,
    /// Edit an existing file in place, optionally moving it.
    Update,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionType::Add => "Add",
            ActionType::Delete => "Delete",
            ActionType::Update => "Update",
        };
        f.write_str(name)
    }
}

/// The edit-bearing part of a hunk: the lines removed and inserted at one
/// position of the original file.
///
/// `orig_index` is the 0-based line index into the original file where the
/// edit begins. While a hunk is being built it is relative to the hunk's own
/// context block; the parser rebases it onto the file once the hunk has been
/// located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub orig_index: usize,
    pub del_lines: Vec<String>,
    pub ins_lines: Vec<String>,
}

impl Chunk {
    /// Returns `true` if the chunk only adds lines.
    ///
    /// # Example
    ///
    /// ```
    /// # use apatch::Chunk;
    /// let chunk = Chunk {
    ///     orig_index: 3,
    ///     del_lines: vec![],
    ///     ins_lines: vec!["new".to_string()],
    /// };
    /// assert!(chunk.is_pure_insertion());
    /// assert!(!chunk.is_pure_deletion());
    /// ```
    pub fn is_pure_insertion(&self) -> bool {
        self.del_lines.is_empty() && !self.ins_lines.is_empty()
    }

    /// Returns `true` if the chunk only removes lines.
    pub fn is_pure_deletion(&self) -> bool {
        self.ins_lines.is_empty() && !self.del_lines.is_empty()
    }

    /// Returns a copy of this chunk moved `offset` lines further into the file.
    pub(crate) fn rebased(&self, offset: usize) -> Chunk {
        Chunk {
            orig_index: self.orig_index + offset,
            del_lines: self.del_lines.clone(),
            ins_lines: self.ins_lines.clone(),
        }
    }
}

/// Everything a single directive asks to do to one file.
///
/// Only the fields meaningful for [`PatchAction::kind`] are populated:
/// `new_file` for adds, `chunks` and `move_path` for updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchAction {
    pub kind: ActionType,
    pub new_file: Option<String>,
    pub chunks: Vec<Chunk>,
    pub move_path: Option<PathBuf>,
}

impl PatchAction {
    pub fn add(new_file: String) -> Self {
        Self {
            kind: ActionType::Add,
            new_file: Some(new_file),
            chunks: Vec::new(),
            move_path: None,
        }
    }

    pub fn delete() -> Self {
        Self {
            kind: ActionType::Delete,
            new_file: None,
            chunks: Vec::new(),
            move_path: None,
        }
    }

    pub fn update(chunks: Vec<Chunk>, move_path: Option<PathBuf>) -> Self {
        Self {
            kind: ActionType::Update,
            new_file: None,
            chunks,
            move_path,
        }
    }
}

/// The parsed form of one patch text: every file it touches, keyed by the
/// file's original path.
///
/// A path appears at most once. Produced by [`text_to_patch`](crate::text_to_patch)
/// and never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    pub actions: BTreeMap<PathBuf, PatchAction>,
}

impl Patch {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&PatchAction> {
        self.actions.get(path.as_ref())
    }

    /// Iterates over the actions in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &PatchAction)> {
        self.actions.iter()
    }
}

/// The materialized result for one file: what it contained before and what
/// it will contain after the patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub kind: ActionType,
    /// Present for deletes and updates.
    pub old_content: Option<String>,
    /// Present for adds and updates.
    pub new_content: Option<String>,
    /// Present only when an update also renames the file.
    pub move_path: Option<PathBuf>,
}

impl FileChange {
    /// Returns the path that receives `new_content`, or `None` for a delete.
    ///
    /// # Example
    ///
    /// ```
    /// # use apatch::{ActionType, FileChange};
    /// # use std::path::{Path, PathBuf};
    /// let change = FileChange {
    ///     kind: ActionType::Update,
    ///     old_content: Some("a".to_string()),
    ///     new_content: Some("b".to_string()),
    ///     move_path: Some(PathBuf::from("renamed.txt")),
    /// };
    /// assert_eq!(change.destination(Path::new("orig.txt")), Some(Path::new("renamed.txt")));
    /// ```
    pub fn destination<'a>(&'a self, path: &'a Path) -> Option<&'a Path> {
        match self.kind {
            ActionType::Delete => None,
            ActionType::Add => Some(path),
            ActionType::Update => Some(self.move_path.as_deref().unwrap_or(path)),
        }
    }
}

/// The fully materialized set of file changes, ready to be applied.
///
/// Independent of any parsing state: it only knows original paths, old
/// content and new content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Commit {
    pub changes: BTreeMap<PathBuf, FileChange>,
}

impl Commit {
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&FileChange> {
        self.changes.get(path.as_ref())
    }

    /// Iterates over the changes in the order they are applied.
    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &FileChange)> {
        self.changes.iter()
    }
}
