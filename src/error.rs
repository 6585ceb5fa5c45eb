use crate::model::ActionType;
use std::path::PathBuf;
use thiserror::Error;

/// Represents every way parsing, building or applying a patch can fail.
///
/// The first error aborts the whole call. Nothing is retried, and a failure
/// during [`apply_commit`](crate::apply_commit) leaves the entries that were
/// already written or removed in place.
#[derive(Error, Debug)]
pub enum PatchError {
    /// The patch envelope is malformed (too short, or missing the
    /// `*** Begin Patch` / `*** End Patch` lines).
    #[error("Invalid patch text: {reason}")]
    InvalidPatchText { reason: String },

    /// A top-level line that is not one of the file directives.
    #[error("Unknown line {line_number}: {line}")]
    UnknownLine { line_number: usize, line: String },

    /// A line inside an update section that cannot be interpreted.
    #[error("Invalid line {line_number}: {line}")]
    InvalidLine { line_number: usize, line: String },

    /// An update section that contains no lines at all.
    #[error("Nothing in this section (line {line_number})")]
    EmptySection { line_number: usize },

    /// The directives ended without a closing `*** End Patch` line.
    #[error("Missing End Patch")]
    MissingEndPatch,

    /// The same path was named by more than one directive.
    #[error("{action} File Error: Duplicate Path: {}", .path.display())]
    DuplicatePath { action: ActionType, path: PathBuf },

    /// An update or delete targets a file that is not among the originals.
    #[error("{action} File Error: Missing File: {}", .path.display())]
    MissingFile { action: ActionType, path: PathBuf },

    /// An add targets a file that already exists.
    #[error("Add File Error: File already exists: {}", .path.display())]
    FileAlreadyExists { path: PathBuf },

    /// A line in an add section that does not start with `+`.
    #[error("Invalid Add File line in {}: {line}", .path.display())]
    InvalidAddFileLine { path: PathBuf, line: String },

    /// The context lines of a hunk could not be located in the file.
    #[error("Invalid Context in {} (searching from line {position}):\n{context}", .path.display())]
    ContextNotFound {
        path: PathBuf,
        position: usize,
        context: String,
    },

    /// Same as [`PatchError::ContextNotFound`], for a hunk closed by an
    /// end-of-file marker.
    #[error("Invalid EOF Context in {} (searching from line {position}):\n{context}", .path.display())]
    EofContextNotFound {
        path: PathBuf,
        position: usize,
        context: String,
    },

    /// A chunk starts past the end of the original file.
    #[error("{}: chunk starts at line {orig_index} but the file has {line_count} lines", .path.display())]
    ChunkOutOfBounds {
        path: PathBuf,
        orig_index: usize,
        line_count: usize,
    },

    /// A chunk starts before the end of the previous chunk.
    #[error("{}: chunk starts at line {orig_index}, before line {cursor} already consumed", .path.display())]
    ChunkOverlap {
        path: PathBuf,
        cursor: usize,
        orig_index: usize,
    },

    /// A file that the patch needs could not be read.
    #[error("File not found: {}", .path.display())]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing or removing a file failed while applying a commit.
    #[error("I/O error while processing {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
